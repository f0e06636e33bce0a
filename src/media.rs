//! Opening media files.
//!
//! [`MediaFile`] opens a container, lists its streams, picks the first video
//! stream and caches its [`VideoInfo`]. It then hands its demuxer and decoder
//! over to an [`FfmpegFrameSource`] for the decode loop.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    codec::context::Context as CodecContext, decoder::Video as VideoDecoder,
    format::context::Input, media::Type,
};

use crate::{
    error::FramegrabError,
    metadata::{StreamKind, StreamSummary, VideoInfo},
    source::FfmpegFrameSource,
};

/// An opened media file.
///
/// # Example
///
/// ```no_run
/// use framegrab::{FramegrabError, MediaFile};
///
/// let media = MediaFile::open("input.mp4")?;
/// let video = media.video_info();
/// println!("{}x{} at {:.2} fps", video.width, video.height, video.frames_per_second);
/// # Ok::<(), FramegrabError>(())
/// ```
pub struct MediaFile {
    pub(crate) input_context: Input,
    pub(crate) decoder: VideoDecoder,
    video: VideoInfo,
    streams: Vec<StreamSummary>,
    file_path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("video", &self.video)
            .field("streams", &self.streams)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a media file and locate its first video stream.
    ///
    /// Initializes FFmpeg (idempotent) before opening.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::FileOpen`] if the file cannot be opened or
    /// its video decoder cannot be created, and
    /// [`FramegrabError::NoVideoStream`] if the container has no video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramegrabError> {
        let file_path = path.as_ref().to_path_buf();
        log::debug!("Opening media file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| FramegrabError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| FramegrabError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let streams: Vec<StreamSummary> = input_context
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                let kind = match parameters.medium() {
                    Type::Video => StreamKind::Video,
                    Type::Audio => StreamKind::Audio,
                    Type::Subtitle => StreamKind::Subtitle,
                    _ => StreamKind::Other,
                };
                let codec = match parameters.id().name() {
                    "" => "unknown".to_string(),
                    name => name.to_string(),
                };
                StreamSummary {
                    index: stream.index(),
                    kind,
                    codec,
                }
            })
            .collect();

        let stream_index = streams
            .iter()
            .find(|summary| summary.kind == StreamKind::Video)
            .map(|summary| summary.index)
            .ok_or(FramegrabError::NoVideoStream)?;
        let stream = input_context
            .stream(stream_index)
            .ok_or(FramegrabError::NoVideoStream)?;

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| FramegrabError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to create video decoder for stream {stream_index}: {error}"),
            })?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            f64::from(frame_rate)
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                f64::from(rate)
            } else {
                0.0
            }
        };

        let container_duration = input_context.duration();
        let duration = if container_duration > 0 {
            Duration::from_micros(container_duration as u64)
        } else if stream.duration() > 0 {
            Duration::from_secs_f64(stream.duration() as f64 * f64::from(stream.time_base()))
        } else {
            Duration::ZERO
        };

        let frame_count = if stream.frames() > 0 {
            Some(stream.frames() as u64)
        } else {
            VideoInfo::estimate_frame_count(duration, frames_per_second)
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let video = VideoInfo {
            stream_index,
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            pixel_format: format!("{:?}", decoder.format()),
        };

        log::info!(
            "Opened media file: {} (format={}, duration={:.2}s, streams={})",
            file_path.display(),
            input_context.format().name(),
            duration.as_secs_f64(),
            streams.len(),
        );
        log::debug!(
            "Video stream: index={}, {}x{}, {:.2} fps, codec={}, frames={:?}",
            video.stream_index,
            video.width,
            video.height,
            video.frames_per_second,
            video.codec,
            video.frame_count,
        );

        Ok(Self {
            input_context,
            decoder,
            video,
            streams,
            file_path,
        })
    }

    /// Metadata of the video stream frames are taken from.
    pub fn video_info(&self) -> &VideoInfo {
        &self.video
    }

    /// Every stream in the container, in container order.
    pub fn streams(&self) -> &[StreamSummary] {
        &self.streams
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Consume the file and start decoding its video stream from the
    /// beginning.
    pub fn into_frame_source(self) -> FfmpegFrameSource {
        FfmpegFrameSource::new(self.input_context, self.decoder, self.video.stream_index)
    }
}
