//! # framegrab
//!
//! Extract selected frames from a video as image files, with optional audio
//! transcoding and remote download.
//!
//! Frames are decoded by FFmpeg (through
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)) on the calling
//! thread, filtered against the requested selection, and handed through a
//! bounded queue to a fixed pool of worker threads that convert and save
//! them. The queue bounds memory use no matter how far decoding outruns
//! saving. A shared [`ProgressTracker`] reports throttled progress.
//!
//! ## Quick Start
//!
//! ### Every 10th frame of the first 100
//!
//! ```no_run
//! use framegrab::{FrameExtractor, FrameRequest, OutputTemplate};
//!
//! let report = FrameExtractor::new("input.mp4", OutputTemplate::parse("frame_%03d.png").unwrap())
//!     .with_request(FrameRequest::new().with_range(0, 99).with_step(10))
//!     .run()
//!     .unwrap();
//! assert_eq!(report.pipeline.saved, 10);
//! ```
//!
//! ### A thumbnail at 1:30 plus the soundtrack
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use framegrab::{
//!     AudioExtraction, AudioFormat, ConsoleProgress, ExtractOptions, FrameExtractor,
//!     FrameRequest, OutputTemplate,
//! };
//!
//! let report = FrameExtractor::new("input.mp4", OutputTemplate::parse("thumbnail.jpg").unwrap())
//!     .with_request(FrameRequest::new().with_time(Duration::from_secs(90)))
//!     .with_options(ExtractOptions::new().with_progress(Arc::new(ConsoleProgress::new())))
//!     .with_audio(AudioExtraction::new("input.mp4", "soundtrack").with_format(AudioFormat::Aac))
//!     .run()
//!     .unwrap();
//! ```
//!
//! ## Building blocks
//!
//! - [`BoundedQueue`]: blocking fixed-capacity FIFO with a finish signal
//! - [`run_pipeline`]: producer plus worker pool over any [`FrameSource`]
//!   and [`FrameSink`]
//! - [`FrameRequest`] / [`TargetFrameSet`]: frame selection
//! - [`FrameWriter`]: template-named PNG/JPEG/BMP or raw plane output
//! - [`AudioExtraction`] and [`Download`]: `ffmpeg` and `yt-dlp` stages
//!   behind the [`ProcessRunner`] trait
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build. The audio and
//! download stages additionally need the `ffmpeg` and `yt-dlp` executables
//! on `PATH`.

pub mod audio;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod frame;
pub mod media;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod queue;
pub mod selection;
pub mod source;
mod utilities;

pub use audio::{AudioExtraction, AudioFormat};
pub use config::ExtractOptions;
pub use download::{Download, DownloadIntent, DownloadedMedia};
pub use error::{ErrorCategory, FramegrabError};
pub use extract::{ExtractionReport, FrameExtractor};
pub use ffmpeg::{FfmpegLogLevel, init_ffmpeg, set_ffmpeg_log_level};
pub use ffmpeg_next::format::Pixel;
pub use frame::{DecodedFrame, Plane};
pub use media::MediaFile;
pub use metadata::{StreamKind, StreamSummary, VideoInfo};
pub use output::{FrameSink, FrameWriter, OutputFormat, OutputTemplate, SaveMode};
pub use pipeline::{FrameFailure, PipelineOptions, PipelineReport, PipelineStage, run_pipeline};
pub use process::{CommandSpec, OutputStream, ProcessRunner, SystemRunner};
pub use progress::{
    ConsoleProgress, NoOpProgress, ProgressCallback, ProgressInfo, ProgressTracker,
};
pub use queue::BoundedQueue;
pub use selection::{FrameRequest, TargetFrameSet};
pub use source::{Advance, FfmpegFrameSource, FrameSource};
pub use utilities::timestamp_to_frame_number;
