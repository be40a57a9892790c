// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-changed=i18n");
    println!("cargo::rerun-if-env-changed=CAPSCREENS_VERSION");

    // Packagers may pin the version explicitly
    let version = match std::env::var("CAPSCREENS_VERSION") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` output, or None outside a checkout
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if described.is_empty() {
        return None;
    }

    // Tags are "v0.1.0"; commit-only output is a bare hash
    Some(match described.strip_prefix('v') {
        Some(rest) => rest.to_string(),
        None => format!("{}+{}", env!("CARGO_PKG_VERSION"), described),
    })
}
