//! Media metadata types.
//!
//! This module defines the metadata returned by
//! [`MediaFile::video_info`](crate::MediaFile::video_info) and
//! [`MediaFile::streams`](crate::MediaFile::streams). Metadata is read once
//! when the file is opened.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// Metadata for the video stream frames are extracted from.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoInfo {
    /// Index of the stream inside the container.
    pub stream_index: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second (may be approximate for variable-frame-rate
    /// content).
    pub frames_per_second: f64,
    /// Total number of frames.
    ///
    /// Taken from the stream header when present, otherwise computed as
    /// `ceil(duration × fps)`. `None` when neither is available.
    pub frame_count: Option<u64>,
    /// Duration of the video, container duration first, then stream duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
    /// Decoder pixel format name (e.g. `"YUV420P"`).
    pub pixel_format: String,
}

impl VideoInfo {
    /// Frame count computed from duration and frame rate, rounded up.
    pub(crate) fn estimate_frame_count(duration: Duration, frames_per_second: f64) -> Option<u64> {
        let exact = duration.as_secs_f64() * frames_per_second;
        (exact > 0.0).then(|| exact.ceil() as u64)
    }
}

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Video frames.
    Video,
    /// Audio samples.
    Audio,
    /// Subtitles.
    Subtitle,
    /// Anything else (data, attachments).
    Other,
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StreamKind::Video => write!(f, "VIDEO"),
            StreamKind::Audio => write!(f, "AUDIO"),
            StreamKind::Subtitle => write!(f, "SUBTITLE"),
            StreamKind::Other => write!(f, "OTHER"),
        }
    }
}

/// One entry of the container's stream list.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    /// Index of the stream inside the container.
    pub index: usize,
    /// Media kind.
    pub kind: StreamKind,
    /// Codec name, `"unknown"` when FFmpeg has none.
    pub codec: String,
}
