//! Build script for dynaplay
//!
//! Captures build identification logged at startup:
//! - Git commit hash (short form)
//! - Build timestamp
//! - Build profile (debug/release)
//!
//! With the `native-engine` feature, also adds `DYNAPLAY_COMPRESSOR_LIB_DIR`
//! to the native library search path so `libcompressor` can be found.

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    if std::env::var_os("CARGO_FEATURE_NATIVE_ENGINE").is_some() {
        if let Ok(dir) = std::env::var("DYNAPLAY_COMPRESSOR_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
    }
}
