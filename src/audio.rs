//! Audio extraction through the `ffmpeg` executable.
//!
//! Audio is transcoded by a child process while the frame pipeline runs.
//! The child's stderr is scraped for `time=` progress tokens, each of which
//! bumps the tracker's auxiliary counter.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{AudioExtraction, AudioFormat, FramegrabError, SystemRunner};
//!
//! let extraction = AudioExtraction::new("input.mp4", "soundtrack")
//!     .with_format(AudioFormat::Wav)
//!     .with_bitrate(192);
//! let written = extraction.run(&SystemRunner, None)?;
//! println!("Audio saved to {}", written.display());
//! # Ok::<(), FramegrabError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{
    error::FramegrabError,
    process::{CommandSpec, OutputStream, ProcessRunner, ensure_available},
    progress::ProgressTracker,
};

/// Program used for transcoding.
pub const FFMPEG_PROGRAM: &str = "ffmpeg";

/// Bitrate used when none is configured, in kbit/s.
pub const DEFAULT_AUDIO_BITRATE: u32 = 128;

const MIN_BITRATE: u32 = 32;
const MAX_BITRATE: u32 = 320;

/// Target audio encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioFormat {
    /// MPEG-1 Layer III via LAME.
    #[default]
    Mp3,
    /// AAC in an MPEG-4 container.
    Aac,
    /// 16-bit PCM WAV.
    Wav,
    /// Vorbis in Ogg.
    Ogg,
}

impl AudioFormat {
    /// FFmpeg encoder name.
    pub fn codec(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Aac => "aac",
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::Ogg => "libvorbis",
        }
    }

    /// File extension for the output container.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::Aac => write!(f, "aac"),
            AudioFormat::Wav => write!(f, "wav"),
            AudioFormat::Ogg => write!(f, "ogg"),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" | "m4a" => Ok(AudioFormat::Aac),
            "wav" => Ok(AudioFormat::Wav),
            "ogg" => Ok(AudioFormat::Ogg),
            other => Err(format!(
                "unknown audio format '{other}' (expected mp3, aac, wav or ogg)"
            )),
        }
    }
}

/// One audio transcoding job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    input: PathBuf,
    output: PathBuf,
    format: AudioFormat,
    bitrate_kbps: u32,
    window: Option<(Duration, Duration)>,
}

impl AudioExtraction {
    /// Transcode the audio of `input` to `output` as MP3 at 128 kbit/s.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format: AudioFormat::default(),
            bitrate_kbps: DEFAULT_AUDIO_BITRATE,
            window: None,
        }
    }

    /// Set the output encoding.
    #[must_use]
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the bitrate in kbit/s, clamped to 32–320.
    #[must_use]
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps.clamp(MIN_BITRATE, MAX_BITRATE);
        self
    }

    /// Only extract audio between `start` and `end`. Ignored unless
    /// `end > start`.
    #[must_use]
    pub fn with_window(mut self, start: Duration, end: Duration) -> Self {
        self.window = Some((start, end));
        self
    }

    /// Effective bitrate in kbit/s.
    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    /// Output encoding.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Path the audio is written to, with the format's extension added when
    /// the configured output has none.
    pub fn output_path(&self) -> PathBuf {
        if self.output.extension().is_some() {
            return self.output.clone();
        }
        self.output.with_extension(self.format.extension())
    }

    /// The `ffmpeg` invocation for this job.
    pub fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(FFMPEG_PROGRAM)
            .scraping(OutputStream::Stderr)
            .arg("-i")
            .arg(self.input.as_os_str());

        if let Some((start, end)) = self.window.filter(|(start, end)| end > start) {
            spec = spec
                .arg("-ss")
                .arg(format!("{:.3}", start.as_secs_f64()))
                .arg("-t")
                .arg(format!("{:.3}", (end - start).as_secs_f64()));
        }

        spec.arg("-vn")
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps))
            .arg("-acodec")
            .arg(self.format.codec())
            .arg("-y")
            .arg(self.output_path().into_os_string())
    }

    /// Run the job to completion.
    ///
    /// Each progress line adds one to `tracker`'s auxiliary count.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::ToolNotFound`] if `ffmpeg` cannot be
    /// started and [`FramegrabError::ProcessFailed`] if it exits with a
    /// non-zero status.
    pub fn run(
        &self,
        runner: &dyn ProcessRunner,
        tracker: Option<&ProgressTracker>,
    ) -> Result<PathBuf, FramegrabError> {
        ensure_available(runner, FFMPEG_PROGRAM, "-version")?;

        let output = self.output_path();
        log::info!(
            "Extracting {} audio at {} kbit/s to {}",
            self.format,
            self.bitrate_kbps,
            output.display()
        );

        let code = runner.run(&self.command(), &mut |line| {
            if let Some(position) = parse_time_token(line) {
                log::debug!("Audio progress: {:.2}s", position.as_secs_f64());
                if let Some(tracker) = tracker {
                    tracker.update(0, 1);
                }
            }
        })?;

        match code {
            Some(0) => Ok(output),
            code => Err(FramegrabError::ProcessFailed {
                program: FFMPEG_PROGRAM.to_string(),
                code,
            }),
        }
    }

    /// Input media path.
    pub fn input(&self) -> &Path {
        &self.input
    }
}

/// Parse the `time=HH:MM:SS.ss` token of an `ffmpeg` progress line.
///
/// ```
/// use std::time::Duration;
///
/// use framegrab::audio::parse_time_token;
///
/// let line = "size=     512kB time=00:01:02.50 bitrate= 128.0kbits/s speed=42x";
/// assert_eq!(parse_time_token(line), Some(Duration::from_millis(62_500)));
/// assert_eq!(parse_time_token("time=N/A"), None);
/// ```
pub fn parse_time_token(line: &str) -> Option<Duration> {
    let (_, rest) = line.split_once("time=")?;
    let token = rest.split_whitespace().next()?;

    let mut seconds = 0.0;
    for part in token.split(':') {
        let value: f64 = part.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(Duration::from_secs_f64(seconds))
}
