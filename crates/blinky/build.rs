//! Build script for the `blinky` firmware crate.
//!
//! Bare-metal builds only: hosted builds run the simulator and need none of this.
//!
//! - Configures and builds the native `platform` static library (vendor board support and
//!   FreeRTOS kernel) with CMake, from `platform/CMakeLists.txt`.
//! - Copies `config/memory.x` into `OUT_DIR` so `cortex-m-rt`'s `link.x` can include it.
//! - Sets the linker arguments required by `cortex-m-rt` and links `libplatform.a`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn run(p_command: &mut Command, p_what: &str) {
    let l_status = p_command
        .status()
        .unwrap_or_else(|e| panic!("failed to run {}: {}", p_what, e));
    if !l_status.success() {
        panic!("{} failed with exit status: {}", p_what, l_status);
    }
}

fn build_platform(p_workspace_root: &Path) -> PathBuf {
    let l_platform_dir = p_workspace_root.join("platform");
    let l_config_dir = p_workspace_root.join("config");
    let l_build_dir = l_platform_dir.join("build");
    println!("cargo:rerun-if-changed={}", l_platform_dir.join("CMakeLists.txt").display());
    println!(
        "cargo:rerun-if-changed={}",
        l_config_dir.join("FreeRTOSConfig.h").display()
    );

    run(
        Command::new("cmake")
            .arg("-S")
            .arg(&l_platform_dir)
            .arg("-B")
            .arg(&l_build_dir)
            .arg("-DCMAKE_BUILD_TYPE=Release")
            .arg(format!("-DPLATFORM_CONFIG_DIR={}", l_config_dir.display())),
        "cmake configure",
    );
    run(
        Command::new("cmake")
            .arg("--build")
            .arg(&l_build_dir)
            .arg("--config")
            .arg("Release"),
        "cmake build",
    );

    l_build_dir
}

fn main() {
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    let l_crate_dir =
        PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let l_workspace_root = l_crate_dir
        .parent()
        .and_then(Path::parent)
        .expect("blinky crate must live two levels under the workspace root")
        .to_path_buf();

    let l_platform_lib_dir = build_platform(&l_workspace_root);

    // ---- Ensure the linker can find memory.x ----
    let l_memory_x_src = l_workspace_root.join("config").join("memory.x");
    if !l_memory_x_src.exists() {
        panic!(
            "Expected linker memory script at {:?}. \
             Make sure `memory.x` exists in config folder.",
            l_memory_x_src
        );
    }

    let l_out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR not set"));
    let l_memory_x_dst = l_out_dir.join("memory.x");
    fs::copy(&l_memory_x_src, &l_memory_x_dst).unwrap_or_else(|e| {
        panic!(
            "Failed to copy {:?} to {:?}: {}",
            l_memory_x_src, l_memory_x_dst, e
        )
    });
    println!("cargo:rustc-link-search={}", l_out_dir.display());
    println!("cargo:rerun-if-changed={}", l_memory_x_src.display());

    // ---- Linker arguments required for cortex-m-rt embedded targets ----
    println!("cargo:rustc-link-arg=--nmagic");
    println!("cargo:rustc-link-arg=-Tlink.x");

    // ---- Link the native platform static library ----
    println!(
        "cargo:rustc-link-search=native={}",
        l_platform_lib_dir.display()
    );
    println!("cargo:rustc-link-lib=static=platform");
}
