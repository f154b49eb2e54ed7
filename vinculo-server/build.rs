//! Build script for vinculo-server
//!
//! Captures build identification for the startup log:
//! - Git commit hash (short form), or `VINCULO_GIT_HASH` when building outside a checkout
//! - Build timestamp
//! - Build profile (debug/release) and target triple

use std::process::Command;

const GIT_HASH_ENV: &str = "VINCULO_GIT_HASH";

fn git_hash() -> String {
    // Container builds copy the sources without .git and pass the hash in
    if let Ok(hash) = std::env::var(GIT_HASH_ENV) {
        let hash = hash.trim();
        if !hash.is_empty() {
            return hash.chars().take(8).collect();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    // ISO 8601 with local offset, e.g. 2025-10-26T14:30:45-05:00
    let build_timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=BUILD_TARGET={}", target);

    // Rerun when HEAD moves or the hash override changes. The timestamp then marks the
    // last build that picked up a new commit rather than every incremental rebuild.
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs/heads");
    println!("cargo:rerun-if-env-changed={}", GIT_HASH_ENV);
}
