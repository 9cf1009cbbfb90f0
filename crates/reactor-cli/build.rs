use std::process::Command;

fn git(args: &[&str]) -> Option<std::process::Output> {
    Command::new("git").args(args).output().ok()
}

fn main() {
    let version = env!("CARGO_PKG_VERSION");

    // Release builds report the plain package version
    if std::env::var("PROFILE").as_deref() == Ok("release") {
        println!("cargo:rustc-env=REACTOR_VERSION={}", version);
        return;
    }

    let hash = git(&["rev-parse", "--short", "HEAD"])
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let dirty = git(&["diff-index", "--quiet", "HEAD"])
        .map(|output| !output.status.success())
        .unwrap_or(false);

    let suffix = if dirty { "-dirty" } else { "" };
    println!("cargo:rustc-env=REACTOR_VERSION={}+{}{}", version, hash, suffix);
}
