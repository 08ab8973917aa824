use std::env;

fn main() {
    // Cargo sets the target env var for build scripts, but not for crates:
    // https://doc.rust-lang.org/cargo/reference/environment-variables.html#environment-variables-cargo-sets-for-build-scripts
    // `Platform::current` needs it to find the OS we were compiled for.
    println!(
        "cargo:rustc-env=TARGET={}",
        env::var("TARGET").unwrap_or_default()
    );
    println!("cargo:rerun-if-changed-env=TARGET");
}
