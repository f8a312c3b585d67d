use std::process::Command;

/// Embed the short git revision as `TASKDASH_BUILD_SHA` for the startup log.
/// An explicit `TASKDASH_BUILD_SHA` in the build environment wins, which
/// covers builds from a source tarball.
fn main() {
    println!("cargo:rerun-if-env-changed=TASKDASH_BUILD_SHA");
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let sha = std::env::var("TASKDASH_BUILD_SHA")
        .ok()
        .or_else(git_short_sha)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TASKDASH_BUILD_SHA={sha}");
}

fn git_short_sha() -> Option<String> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").ok()?;
    let out = Command::new("git")
        .args(["-C", &manifest_dir, "rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}
