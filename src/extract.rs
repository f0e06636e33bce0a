//! End-to-end extraction runs.
//!
//! [`FrameExtractor`] wires the pieces together: it opens the media,
//! resolves the frame request, prepares the writer and progress tracker,
//! then runs the frame pipeline with the optional audio stage alongside it.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{FrameExtractor, FrameRequest, FramegrabError, OutputTemplate};
//!
//! let report = FrameExtractor::new("input.mp4", OutputTemplate::parse("frames/%04d.png")?)
//!     .with_request(FrameRequest::new().with_range(0, 99).with_step(10))
//!     .run()?;
//! println!("Saved {} frames", report.pipeline.saved);
//! # Ok::<(), FramegrabError>(())
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
    thread,
};

use crate::{
    audio::{AudioExtraction, FFMPEG_PROGRAM},
    config::ExtractOptions,
    error::FramegrabError,
    media::MediaFile,
    metadata::VideoInfo,
    output::{FrameWriter, OutputTemplate},
    pipeline::{PipelineReport, run_pipeline},
    process::{ProcessRunner, SystemRunner},
    progress::{ProgressInfo, ProgressTracker},
    selection::FrameRequest,
};

/// Result of [`FrameExtractor::run`].
#[derive(Debug)]
pub struct ExtractionReport {
    /// Metadata of the video that was read.
    pub video: VideoInfo,
    /// Frame pipeline outcome.
    pub pipeline: PipelineReport,
    /// Audio stage outcome, when one was configured.
    pub audio: Option<Result<PathBuf, FramegrabError>>,
    /// Final progress snapshot.
    pub progress: ProgressInfo,
}

/// One configured extraction run.
pub struct FrameExtractor {
    input: PathBuf,
    template: OutputTemplate,
    request: FrameRequest,
    options: ExtractOptions,
    audio: Option<AudioExtraction>,
    runner: Arc<dyn ProcessRunner>,
}

impl FrameExtractor {
    /// Extract every frame of `input` to paths rendered from `template`.
    pub fn new(input: impl Into<PathBuf>, template: OutputTemplate) -> Self {
        Self {
            input: input.into(),
            template,
            request: FrameRequest::new(),
            options: ExtractOptions::new(),
            audio: None,
            runner: Arc::new(SystemRunner),
        }
    }

    /// Select which frames to extract.
    #[must_use]
    pub fn with_request(mut self, request: FrameRequest) -> Self {
        self.request = request;
        self
    }

    /// Set pipeline and output options.
    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Transcode audio concurrently with frame extraction.
    #[must_use]
    pub fn with_audio(mut self, audio: AudioExtraction) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Run external programs through `runner` instead of spawning them.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Run the extraction to completion.
    ///
    /// A failed audio stage is reported in
    /// [`ExtractionReport::audio`] and does not fail the run.
    ///
    /// # Errors
    ///
    /// Returns a setup error (see
    /// [`ErrorCategory::Setup`](crate::ErrorCategory::Setup)) if the media
    /// cannot be opened, the selection is invalid or empty, or the output
    /// template does not fit the selection.
    pub fn run(self) -> Result<ExtractionReport, FramegrabError> {
        let media = MediaFile::open(&self.input)?;
        let video = media.video_info().clone();

        let targets = self.request.resolve(&video)?;
        log::info!(
            "Selected {} of {} frames",
            targets.len(),
            video
                .frame_count
                .map_or_else(|| "?".to_string(), |count| count.to_string())
        );

        let writer = FrameWriter::new(
            self.template,
            self.options.output_format,
            self.options.save_mode,
            targets.len(),
        )?;
        let tracker = ProgressTracker::new(targets.len(), Arc::clone(&self.options.progress));
        let mut source = media.into_frame_source();
        let runner = self.runner.as_ref();

        let (pipeline, audio) = thread::scope(|scope| {
            let audio_handle = self.audio.as_ref().map(|audio| {
                thread::Builder::new()
                    .name("framegrab-audio".to_string())
                    .spawn_scoped(scope, || audio.run(runner, Some(&tracker)))
            });

            let pipeline = run_pipeline(
                &mut source,
                &targets,
                &writer,
                &tracker,
                self.options.pipeline_options(),
            );

            let audio = audio_handle.map(|spawned| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    Err(FramegrabError::ProcessFailed {
                        program: FFMPEG_PROGRAM.to_string(),
                        code: None,
                    })
                }),
                Err(error) => Err(FramegrabError::IoError(error)),
            });
            (pipeline, audio)
        });
        let pipeline = pipeline?;

        match &audio {
            Some(Ok(path)) => log::info!("Audio saved to {}", path.display()),
            Some(Err(error)) => log::warn!("Audio extraction failed: {error}"),
            None => {}
        }

        let progress = tracker.finish();
        Ok(ExtractionReport {
            video,
            pipeline,
            audio,
            progress,
        })
    }
}
