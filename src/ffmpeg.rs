//! FFmpeg library setup.
//!
//! FFmpeg prints its own diagnostics to stderr, independently of the `log`
//! crate. [`FfmpegLogLevel`] selects how much of that output survives;
//! [`init_ffmpeg`] initializes the libraries and applies a level in one
//! call.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{FfmpegLogLevel, FramegrabError};
//!
//! framegrab::init_ffmpeg(FfmpegLogLevel::Error)?;
//! # Ok::<(), FramegrabError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::util::log::Level;

use crate::error::FramegrabError;

/// Verbosity of FFmpeg's own console output, quietest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FfmpegLogLevel {
    /// No output at all.
    #[default]
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings, FFmpeg's own default.
    Warning,
    /// Informational messages.
    Info,
    /// Decoder debugging output.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "debug" => Ok(FfmpegLogLevel::Debug),
            other => Err(format!("unknown FFmpeg log level '{other}'")),
        }
    }
}

/// Set FFmpeg's console verbosity. Does not affect `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Initialize the FFmpeg libraries and apply `level`.
///
/// Safe to call more than once.
///
/// # Errors
///
/// Returns [`FramegrabError::FfmpegError`] if initialization fails.
pub fn init_ffmpeg(level: FfmpegLogLevel) -> Result<(), FramegrabError> {
    ffmpeg_next::init()?;
    set_ffmpeg_log_level(level);
    Ok(())
}
