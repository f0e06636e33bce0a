//! Error types for the `framegrab` crate.
//!
//! This module defines [`FramegrabError`], the unified error type returned by
//! every fallible operation in the crate, and [`ErrorCategory`], which sorts
//! those errors by how far their effect reaches: a setup error stops the run
//! before any thread is spawned, while decode, persist and external-process
//! errors only affect the packet, frame or stage that produced them.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framegrab` operations.
///
/// Every public method that can fail returns `Result<T, FramegrabError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramegrabError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// Neither the stream header nor the duration gives a frame count, and
    /// the selection needs one to find its upper bound.
    #[error("Cannot determine the number of frames in the video")]
    UnknownFrameCount,

    /// The requested selection resolved to no frames at all.
    #[error("No frames to extract")]
    EmptySelection,

    /// A range's start value is greater than its end value.
    #[error("Invalid range: start ({start}) must not exceed end ({end})")]
    InvalidRange {
        /// The start of the range.
        start: String,
        /// The end of the range.
        end: String,
    },

    /// A step of zero was provided.
    #[error("Step must be greater than zero")]
    InvalidStep,

    /// The output path template cannot be used for this run.
    #[error("Invalid output template: {0}")]
    InvalidTemplate(String),

    /// A single packet could not be decoded.
    #[error("Failed to decode video packet: {0}")]
    VideoDecodeError(String),

    /// A decoded frame could not be converted to the output representation.
    #[error("Failed to convert frame {frame_index}: {reason}")]
    FrameConversion {
        /// Decode-order index of the frame.
        frame_index: u64,
        /// What went wrong.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// A [`FrameSink`](crate::FrameSink) panicked while saving a frame.
    #[error("Frame sink panicked: {0}")]
    SinkPanicked(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An external program could not be started.
    #[error("{program} not found or not runnable: {reason}")]
    ToolNotFound {
        /// Program name, e.g. `ffmpeg` or `yt-dlp`.
        program: String,
        /// Reason reported by the operating system.
        reason: String,
    },

    /// An external program ran but exited unsuccessfully.
    #[error("{program} failed with exit code {code:?}")]
    ProcessFailed {
        /// Program name.
        program: String,
        /// Exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
    },

    /// The downloader reported success but no downloaded file was found.
    #[error("No downloaded file found in {0}")]
    DownloadMissing(PathBuf),
}

/// How far the effect of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal: the pipeline never starts and the process exits non-zero.
    Setup,
    /// A single packet failed to decode; the producer skips it.
    Decode,
    /// A single frame failed to convert or write; its worker moves on.
    Persist,
    /// An external program is missing or failed; only its stage aborts.
    ExternalProcess,
}

impl FramegrabError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FramegrabError::FileOpen { .. }
            | FramegrabError::NoVideoStream
            | FramegrabError::UnknownFrameCount
            | FramegrabError::EmptySelection
            | FramegrabError::InvalidRange { .. }
            | FramegrabError::InvalidStep
            | FramegrabError::InvalidTemplate(_) => ErrorCategory::Setup,
            FramegrabError::VideoDecodeError(_) | FramegrabError::FfmpegError(_) => {
                ErrorCategory::Decode
            }
            FramegrabError::FrameConversion { .. }
            | FramegrabError::IoError(_)
            | FramegrabError::ImageError(_)
            | FramegrabError::SinkPanicked(_) => ErrorCategory::Persist,
            FramegrabError::ToolNotFound { .. }
            | FramegrabError::ProcessFailed { .. }
            | FramegrabError::DownloadMissing(_) => ErrorCategory::ExternalProcess,
        }
    }

    /// Returns `true` for errors that prevent the pipeline from starting.
    pub fn is_setup_error(&self) -> bool {
        self.category() == ErrorCategory::Setup
    }
}

impl From<FfmpegError> for FramegrabError {
    fn from(error: FfmpegError) -> Self {
        FramegrabError::FfmpegError(error.to_string())
    }
}
