// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

/// Emits `GIT_VERSION` for `ping --version`
///
/// Packagers can pin it with `PING_VERSION`. Otherwise it is the crate version
/// followed by the short commit, with `+dirty` when the tree has changes.
fn main() {
    println!("cargo::rerun-if-env-changed=PING_VERSION");
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/index");

    let version = std::env::var("PING_VERSION").unwrap_or_else(|_| describe());
    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn describe() -> String {
    let package = env!("CARGO_PKG_VERSION");
    match git(&["rev-parse", "--short", "HEAD"]) {
        Some(commit) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.is_empty());
            if dirty {
                format!("{}-{}+dirty", package, commit)
            } else {
                format!("{}-{}", package, commit)
            }
        }
        None => package.to_string(),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
