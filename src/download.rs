//! Fetching remote videos with `yt-dlp`.
//!
//! The downloader runs in a chosen directory and names its output
//! `ytdl_<title>.<ext>`. The result is the path `yt-dlp` prints after the
//! final move, or failing that the `ytdl_*` file that was not in the
//! directory before the run.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::FramegrabError,
    process::{CommandSpec, OutputStream, ProcessRunner, ensure_available},
};

/// Program used for downloading.
pub const YTDL_PROGRAM: &str = "yt-dlp";

/// Prefix of every downloaded file name.
pub const DOWNLOAD_PREFIX: &str = "ytdl_";

/// What the downloaded media will be used for. Picks the automatic format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownloadIntent {
    /// Only the audio track is needed.
    AudioOnly,
    /// Specific frames are selected; only video is needed.
    SelectedFrames,
    /// Frames plus the audio track.
    VideoWithAudio,
    /// Anything else.
    #[default]
    Default,
}

impl DownloadIntent {
    /// Derive the intent from the run's flags. Audio-only wins over a frame
    /// selection, which wins over audio extraction.
    pub fn from_flags(audio_only: bool, selects_frames: bool, extract_audio: bool) -> Self {
        if audio_only {
            DownloadIntent::AudioOnly
        } else if selects_frames {
            DownloadIntent::SelectedFrames
        } else if extract_audio {
            DownloadIntent::VideoWithAudio
        } else {
            DownloadIntent::Default
        }
    }

    /// `yt-dlp` format selector for this intent.
    pub fn auto_format(self) -> &'static str {
        match self {
            DownloadIntent::AudioOnly => "bestaudio",
            DownloadIntent::SelectedFrames => "bestvideo[ext=mp4]",
            DownloadIntent::VideoWithAudio => "bestvideo+bestaudio",
            DownloadIntent::Default => "best[ext=mp4]",
        }
    }
}

/// One download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    url: String,
    intent: DownloadIntent,
    format: Option<String>,
    directory: PathBuf,
}

impl Download {
    /// Download `url` into `directory`.
    pub fn new(url: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            intent: DownloadIntent::default(),
            format: None,
            directory: directory.into(),
        }
    }

    /// Set the intent used to choose the automatic format.
    #[must_use]
    pub fn with_intent(mut self, intent: DownloadIntent) -> Self {
        self.intent = intent;
        self
    }

    /// Use an explicit `yt-dlp` format selector instead of the automatic
    /// one.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Format selector passed to `-f`.
    pub fn format(&self) -> &str {
        self.format
            .as_deref()
            .unwrap_or_else(|| self.intent.auto_format())
    }

    /// The `yt-dlp` invocation for this job.
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(YTDL_PROGRAM)
            .scraping(OutputStream::Stdout)
            .in_dir(&self.directory)
            .arg("-f")
            .arg(self.format())
            .arg("--newline")
            .arg("--progress")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(format!("{DOWNLOAD_PREFIX}%(title)s.%(ext)s"))
            .arg(&self.url)
    }

    /// Run the download and locate the file it produced.
    ///
    /// `on_percent` receives every progress percentage reported. Files
    /// already in the directory are never mistaken for the result.
    ///
    /// # Errors
    ///
    /// - [`FramegrabError::ToolNotFound`] if `yt-dlp` cannot be started.
    /// - [`FramegrabError::ProcessFailed`] if it exits unsuccessfully.
    /// - [`FramegrabError::DownloadMissing`] if no downloaded file is found.
    pub fn run(
        &self,
        runner: &dyn ProcessRunner,
        on_percent: &mut dyn FnMut(f64),
    ) -> Result<DownloadedMedia, FramegrabError> {
        ensure_available(runner, YTDL_PROGRAM, "--version")?;
        log::info!("Downloading {} (format {})", self.url, self.format());

        let previous = list_downloads(&self.directory)?;
        let mut reported = None;
        let code = runner.run(&self.command(), &mut |line| {
            if let Some(percent) = parse_percentage(line) {
                on_percent(percent);
                return;
            }
            let candidate = self.directory.join(line.trim());
            if !line.starts_with('[') && candidate.is_file() {
                reported = Some(candidate);
            }
        })?;
        if code != Some(0) {
            return Err(FramegrabError::ProcessFailed {
                program: YTDL_PROGRAM.to_string(),
                code,
            });
        }

        let path = match reported {
            Some(path) => path,
            None => find_downloaded(&self.directory, &previous)?,
        };
        let fresh = !previous.contains(&path);
        log::info!("Downloaded {}", path.display());
        Ok(DownloadedMedia { path, fresh })
    }
}

/// A file fetched by [`Download::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    path: PathBuf,
    fresh: bool,
}

impl DownloadedMedia {
    /// Location of the downloaded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `false` if `yt-dlp` reused a file that existed before the
    /// run.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Delete the downloaded file. A reused file is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::IoError`] if the file cannot be removed.
    pub fn remove(self) -> Result<(), FramegrabError> {
        if !self.fresh {
            log::debug!("Leaving reused download {}", self.path.display());
            return Ok(());
        }
        fs::remove_file(&self.path)?;
        log::debug!("Removed {}", self.path.display());
        Ok(())
    }
}

/// Percentage from a `[download]  42.7% of ...` progress line.
///
/// ```
/// use framegrab::download::parse_percentage;
///
/// assert_eq!(parse_percentage("[download]  42.7% of 10.00MiB at 1.2MiB/s"), Some(42.7));
/// assert_eq!(parse_percentage("[info] Downloading 1 format(s)"), None);
/// ```
pub fn parse_percentage(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once("[download]")?;
    rest.split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|number| number.parse().ok())
}

/// Every complete `ytdl_*` file in `directory`.
///
/// Partial downloads (`.part`) are ignored.
///
/// # Errors
///
/// Returns [`FramegrabError::IoError`] if the directory cannot be read.
pub fn list_downloads(directory: &Path) -> Result<HashSet<PathBuf>, FramegrabError> {
    Ok(fs::read_dir(directory)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(DOWNLOAD_PREFIX) && !name.ends_with(".part"))
        })
        .collect())
}

/// First `ytdl_*` file in `directory`, in name order, that is not in
/// `previous`.
///
/// # Errors
///
/// Returns [`FramegrabError::DownloadMissing`] if there is none, and
/// [`FramegrabError::IoError`] if the directory cannot be read.
pub fn find_downloaded(
    directory: &Path,
    previous: &HashSet<PathBuf>,
) -> Result<PathBuf, FramegrabError> {
    list_downloads(directory)?
        .into_iter()
        .filter(|path| !previous.contains(path))
        .min()
        .ok_or_else(|| FramegrabError::DownloadMissing(directory.to_path_buf()))
}
