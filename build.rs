use std::process::Command;

fn main() {
    let git_sha = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map_or(String::from("unknown"), |output| {
            String::from_utf8_lossy(&output.stdout).trim().to_owned()
        });
    println!("cargo:rustc-env=NMPATH_GIT_SHA={git_sha}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
