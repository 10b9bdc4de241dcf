//! Build script for kbridge-core
//!
//! This script checks build requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//!
//! Non-Windows targets build without a native transport; see the
//! `platform` module docs.

fn main()
{
    // Edition 2021 requires Rust 1.56.0
    match (rustc_version::version(), rustc_version::Version::parse("1.56.0")) {
        (Ok(found), Ok(minimum)) => {
            if found < minimum {
                panic!("kbridge-core requires Rust {minimum} or newer (Edition 2021), found {found}");
            }
        }
        _ => println!("cargo:warning=could not verify Rust version"),
    }

    println!("cargo:rerun-if-changed=build.rs");
}
