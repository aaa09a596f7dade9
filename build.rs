//! Build script for Crystal
//!
//! Embeds build-time information into the binary:
//! - Git commit hash, branch and dirty flag
//! - Build timestamp
//! - Target and host triples
//! - Rust version

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = command_output("git", &["rev-parse", "--short=8", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    let git_branch = command_output("git", &["rev-parse", "--abbrev-ref", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    let git_dirty = match command_output("git", &["status", "--porcelain"]) {
        Some(status) if !status.is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };
    let rustc_version =
        command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env_or_unknown("TARGET");
    let profile = env_or_unknown("PROFILE");
    let host = env_or_unknown("HOST");

    let embedded = [
        ("CRYSTAL_GIT_HASH", git_hash.as_str()),
        ("CRYSTAL_GIT_BRANCH", git_branch.as_str()),
        ("CRYSTAL_GIT_DIRTY", git_dirty),
        ("CRYSTAL_BUILD_TIMESTAMP", build_timestamp.as_str()),
        ("CRYSTAL_TARGET", target.as_str()),
        ("CRYSTAL_PROFILE", profile.as_str()),
        ("CRYSTAL_RUSTC_VERSION", rustc_version.as_str()),
        ("CRYSTAL_BUILD_HOST", host.as_str()),
    ];
    for (key, value) in embedded {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Run a command and return its trimmed stdout, if it succeeded
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn env_or_unknown(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| "unknown".to_string())
}
