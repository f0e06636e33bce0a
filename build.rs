use std::env;
use std::path::PathBuf;

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "windows" && env::var_os("FFMPEG_DIR").is_none() {
        check_vcpkg_ffmpeg();
    }
}

/// On Windows `ffmpeg-sys-next` finds FFmpeg through `FFMPEG_DIR`. Point
/// users at a vcpkg install when they have one but forgot the variable.
fn check_vcpkg_ffmpeg() {
    let Some(ffmpeg_dir) = vcpkg_ffmpeg_dir() else {
        println!(
            "cargo:warning=FFMPEG_DIR is not set. Install FFmpeg (e.g. with vcpkg) and set FFMPEG_DIR so framegrab can link against it."
        );
        return;
    };

    if !ffmpeg_dir.exists() {
        println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist; install ffmpeg for this triplet.",
            ffmpeg_dir.display(),
        );
        return;
    }

    println!(
        "cargo:warning=Found vcpkg FFmpeg at {0}. Set FFMPEG_DIR={0} to use it explicitly.",
        ffmpeg_dir.display(),
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Set VCPKGRS_DYNAMIC=1 when linking a dynamic vcpkg FFmpeg build.");
    }
}

fn vcpkg_ffmpeg_dir() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}
