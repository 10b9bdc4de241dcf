use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use kbridge_core::types::{ProcessId, RemotePointer, ThreadId};
use kbridge_core::{DeviceTransport, DriverClient, ObfuscationKey};
use kbridge_utils::{info, init_logging, init_logging_with_level, ClientConfig, LogLevel};

/// Command-line client for the kbridge device-control backend.
#[derive(Parser, Debug)]
#[command(name = "kbridge")]
#[command(version)]
#[command(about = "Issue obfuscated device-control requests to the kbridge backend", long_about = None)]
struct Cli
{
    /// Session key (0x-prefixed hex or decimal); overrides KBRIDGE_KEY
    #[arg(long, global = true)]
    key: Option<ObfuscationKey>,
    /// Device path; overrides KBRIDGE_DEVICE
    #[arg(long, global = true)]
    device: Option<String>,
    /// Log level; overrides KBRIDGE_LOG_LEVEL and RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the image name of a process
    Name
    {
        /// Process ID (PID)
        pid: u32,
    },
    /// Print the image base address of a process
    Base
    {
        /// Process ID (PID)
        pid: u32,
    },
    /// Print creation, exit, kernel and user times of a process
    Times
    {
        /// Process ID (PID)
        pid: u32,
    },
    /// Print the exit status of a process
    ExitStatus
    {
        /// Process ID (PID)
        pid: u32,
    },
    /// Read process memory and print it as a hexdump
    Read
    {
        /// Process ID (PID)
        pid: u32,
        /// Address to read from (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: RemotePointer,
        /// Number of bytes to read
        #[arg(short, long, default_value_t = 64)]
        length: usize,
        /// Bytes per hexdump line
        #[arg(short, long, default_value_t = 16)]
        width: usize,
    },
    /// Describe the memory region containing an address
    Query
    {
        /// Process ID (PID)
        pid: u32,
        /// Address inside the region (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: RemotePointer,
    },
    /// Print the file mapped at an address
    MappedFile
    {
        /// Process ID (PID)
        pid: u32,
        /// Address inside the mapping (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: RemotePointer,
    },
    /// Print the thread environment block address of a thread
    Teb
    {
        /// Thread ID
        tid: u64,
    },
    /// Allocate nonpaged kernel memory
    AllocNonpaged
    {
        /// Size in bytes
        size: u64,
    },
    /// Protect a process against external termination
    Protect
    {
        /// Process ID (PID)
        pid: u32,
    },
    /// Remove the protection set by `protect`
    Unprotect,
    /// Print the mouse cursor position
    Cursor,
}

fn main()
{
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    // --log-level wins over KBRIDGE_LOG_LEVEL, which wins over RUST_LOG
    let logging = match cli.log_level.or(config.log_level) {
        Some(level) => init_logging_with_level(level, config.log_format),
        None => init_logging(),
    };
    let guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let result = run(cli, config);
    // Flush file logs before exiting
    drop(guard);
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn Error>>
{
    let key = match cli.key {
        Some(key) => key,
        None => config.require_key()?,
    };
    let device = cli.device.unwrap_or(config.device);

    info!(device = %device, "connecting to backend");
    let transport = open_device(&device)?;
    let client = DriverClient::new(transport, key);
    execute(&client, cli.command)
}

#[cfg(windows)]
fn open_device(path: &str) -> kbridge_core::Result<kbridge_core::DeviceHandle>
{
    kbridge_core::DeviceHandle::open(path)
}

/// Transport that cannot exist: there is no device to open on this host
#[cfg(not(windows))]
enum NoDevice {}

#[cfg(not(windows))]
impl DeviceTransport for NoDevice
{
    fn send(
        &self,
        _opcode: kbridge_core::Opcode,
        _request: &[u8],
        _response: Option<&mut [u8]>,
    ) -> Result<usize, kbridge_core::TransportError>
    {
        match *self {}
    }
}

#[cfg(not(windows))]
fn open_device(path: &str) -> kbridge_core::Result<NoDevice>
{
    kbridge_utils::debug!(path, "no native device transport on this host");
    Err(kbridge_core::DriverError::Unsupported(
        "opening the device (only Windows hosts have a native transport)",
    ))
}

fn execute<T: DeviceTransport>(client: &DriverClient<T>, command: Commands) -> Result<(), Box<dyn Error>>
{
    match command {
        Commands::Name { pid } => {
            println!("{}", client.process_name(ProcessId::from(pid))?);
        }
        Commands::Base { pid } => {
            println!("{}", client.process_base(ProcessId::from(pid))?);
        }
        Commands::Times { pid } => {
            let times = client.process_times(ProcessId::from(pid))?;
            println!("Process {pid} times (100ns units):");
            println!("  Created: {}", times.creation_time);
            if times.has_exited() {
                println!("  Exited:  {}", times.exit_time);
            } else {
                println!("  Exited:  still running");
            }
            println!("  Kernel:  {}", times.kernel_time);
            println!("  User:    {}", times.user_time);
        }
        Commands::ExitStatus { pid } => {
            let status = client.process_exit_status(ProcessId::from(pid))?;
            println!("{status}");
        }
        Commands::Read {
            pid,
            address,
            length,
            width,
        } => {
            let mut buffer = vec![0u8; length];
            client.read_process_memory(ProcessId::from(pid), address, &mut buffer)?;
            print!("{}", format_hexdump(address, &buffer, width));
        }
        Commands::Query { pid, address } => {
            let region = client.virtual_query(ProcessId::from(pid), address)?;
            println!("Region containing {address}:");
            println!("  Base:            {}", region.base);
            println!("  End:             {}", region.end());
            println!("  Size:            0x{:x}", region.size);
            println!("  Allocation base: {}", region.allocation_base);
            println!("  Protection:      {}", region.protection);
            println!("  Initial:         {}", region.allocation_protection);
            println!("  State:           0x{:x}", region.state.bits());
            println!("  Type:            0x{:x}", region.kind.bits());
        }
        Commands::MappedFile { pid, address } => {
            println!("{}", client.mapped_file_name(ProcessId::from(pid), address)?);
        }
        Commands::Teb { tid } => {
            println!("{}", client.thread_environment_block(ThreadId::from(tid))?);
        }
        Commands::AllocNonpaged { size } => {
            let pointer = client.allocate_nonpaged_memory(size)?;
            println!("{pointer}");
        }
        Commands::Protect { pid } => {
            client.protect_process(ProcessId::from(pid))?;
            println!("Process {pid} protected");
        }
        Commands::Unprotect => {
            client.unprotect_process()?;
            println!("Protection cleared");
        }
        Commands::Cursor => {
            let cursor = client.cursor_position()?;
            println!("{},{}", cursor.x, cursor.y);
        }
    }
    Ok(())
}

/// Parse an address in `0x` hex or decimal.
fn parse_address(s: &str) -> Result<RemotePointer, String>
{
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    value
        .map(RemotePointer::new)
        .map_err(|e| format!("invalid address '{s}': {e}"))
}

/// Formats bytes into a traditional hex + ASCII view.
fn format_hexdump(base: RemotePointer, bytes: &[u8], width: usize) -> String
{
    use std::fmt::Write;

    let width = width.clamp(8, 32);
    let mut out = String::new();
    for (line, chunk) in bytes.chunks(width).enumerate() {
        let addr = base.saturating_add((line * width) as u64);
        let _ = write!(out, "{:016x}: ", addr.value());

        for i in 0..width {
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, "{byte:02x} ");
                }
                None => out.push_str("   "),
            }
        }

        out.push(' ');
        out.extend(chunk.iter().map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
