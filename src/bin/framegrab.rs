use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use framegrab::{
    AudioExtraction, AudioFormat, ConsoleProgress, Download, DownloadIntent, DownloadedMedia,
    ExtractOptions, ExtractionReport, FfmpegLogLevel, FrameExtractor, FrameRequest,
    NoOpProgress, OutputFormat, OutputTemplate, ProgressCallback, ProgressInfo, ProgressTracker,
    SystemRunner, progress::render_summary,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framegrab input.mp4 --frames 10,20,30 --output frame_%03d.png\n  framegrab input.mp4 --range 100 200 --step 5 --output frames/%04d.jpg --format jpg\n  framegrab input.mp4 --time 00:01:30 --output thumbnail.png\n  framegrab input.mp4 --time-range 10 20 --extract-audio --audio-format wav\n  framegrab --ytdl https://example.com/watch?v=abc --audio-only --output-audio song\n  framegrab --completions zsh > _framegrab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// Animated progress bar.
    Bar,
    /// Single-line text progress.
    Plain,
    /// No progress output.
    None,
}

#[derive(Debug, Parser)]
#[command(
    name = "framegrab",
    version,
    about = "Extract frames and audio from video files with a multi-threaded pipeline",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input video path.
    #[arg(required_unless_present_any = ["ytdl", "completions"])]
    input: Option<PathBuf>,

    /// Download the input with yt-dlp first.
    #[arg(long, value_name = "URL", conflicts_with = "input")]
    ytdl: Option<String>,

    /// yt-dlp format selector (default: chosen from the other options).
    #[arg(long, value_name = "FORMAT", requires = "ytdl")]
    ytdl_format: Option<String>,

    /// Output path pattern; %d or %0Nd is replaced by the frame index.
    #[arg(long, short = 'o', default_value = "frame_%d.png")]
    output: String,

    /// Extract a single frame.
    #[arg(long, conflicts_with = "frames")]
    frame: Option<u64>,

    /// Extract a comma-separated list of frames.
    #[arg(long, value_delimiter = ',')]
    frames: Option<Vec<u64>>,

    /// Extract frames START through END.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    range: Option<Vec<u64>>,

    /// Take every Nth frame of the range.
    #[arg(long, default_value_t = 1)]
    step: u64,

    /// Extract the frame at this time (SS, MM:SS or HH:MM:SS.fff).
    #[arg(long, value_parser = parse_timecode, conflicts_with = "time_range")]
    time: Option<Duration>,

    /// Extract frames between two times.
    #[arg(long, num_args = 2, value_names = ["START", "END"], value_parser = parse_timecode)]
    time_range: Option<Vec<Duration>>,

    /// Image format for saved frames (png, jpg, bmp).
    #[arg(long, default_value = "png")]
    format: OutputFormat,

    /// Write raw decoder planes (.yuv) instead of encoded images.
    #[arg(long)]
    fast: bool,

    /// Extract audio alongside the frames.
    #[arg(long, conflicts_with = "audio_only")]
    extract_audio: bool,

    /// Extract only the audio.
    #[arg(long)]
    audio_only: bool,

    /// Audio output path; the format's extension is added when missing.
    #[arg(long, default_value = "audio")]
    output_audio: PathBuf,

    /// Audio format (mp3, aac, wav, ogg).
    #[arg(long, default_value = "mp3")]
    audio_format: AudioFormat,

    /// Audio bitrate in kbit/s (32-320).
    #[arg(long, default_value_t = framegrab::audio::DEFAULT_AUDIO_BITRATE)]
    audio_bitrate: u32,

    /// Number of save worker threads.
    #[arg(long, default_value_t = framegrab::pipeline::DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum number of decoded frames waiting to be saved.
    #[arg(long, default_value_t = framegrab::queue::DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Progress display.
    #[arg(long, value_enum, default_value_t = ProgressMode::Bar)]
    progress: ProgressMode,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, default_value = "quiet")]
    ffmpeg_log_level: FfmpegLogLevel,

    /// Show debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Print a machine-readable summary.
    #[arg(long)]
    json: bool,

    /// Keep the file downloaded with --ytdl.
    #[arg(long)]
    keep_download: bool,

    /// Print shell completions and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Cli {
    fn selects_frames(&self) -> bool {
        self.frame.is_some()
            || self.frames.is_some()
            || self.range.is_some()
            || self.time.is_some()
            || self.time_range.is_some()
    }

    fn frame_request(&self) -> FrameRequest {
        let mut request = FrameRequest::new().with_step(self.step);
        if let Some(frame) = self.frame {
            request = request.with_frame(frame);
        }
        if let Some(frames) = &self.frames {
            request = request.with_frames(frames.iter().copied());
        }
        if let Some([start, end]) = self.range.as_deref() {
            request = request.with_range(*start, *end);
        }
        if let Some(time) = self.time {
            request = request.with_time(time);
        }
        if let Some([start, end]) = self.time_range.as_deref() {
            request = request.with_time_range(*start, *end);
        }
        request
    }

    fn audio_extraction(&self, input: &Path) -> AudioExtraction {
        let mut extraction = AudioExtraction::new(input, &self.output_audio)
            .with_format(self.audio_format)
            .with_bitrate(self.audio_bitrate);
        if let Some([start, end]) = self.time_range.as_deref() {
            extraction = extraction.with_window(*start, *end);
        }
        extraction
    }

    fn progress_callback(&self) -> Arc<dyn ProgressCallback> {
        match self.progress {
            ProgressMode::Bar if !self.json => Arc::new(BarProgress::new()),
            ProgressMode::Plain if !self.json => Arc::new(ConsoleProgress::new()),
            _ => Arc::new(NoOpProgress),
        }
    }
}

/// `indicatif` renderer for the frame pipeline.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        Self { bar }
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.processed);
        let mut message = format!("{:.1} fps", info.rate);
        if info.aux > 0 {
            message.push_str(&format!(" | audio: {} updates", info.aux));
        }
        self.bar.set_message(message);
    }

    fn on_finish(&self, info: &ProgressInfo) {
        self.on_progress(info);
        self.bar.finish_with_message(render_summary(info));
    }
}

fn parse_timecode(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".to_string());
    }

    let invalid = || format!("invalid time format: {trimmed}");

    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        return Ok(Duration::from_secs_f64(seconds));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds_str) = match parts.as_slice() {
        [hours, minutes, seconds] => (
            hours.parse::<u64>().map_err(|_| invalid())?,
            minutes.parse::<u64>().map_err(|_| invalid())?,
            *seconds,
        ),
        [minutes, seconds] => (0, minutes.parse::<u64>().map_err(|_| invalid())?, *seconds),
        _ => return Err(invalid()),
    };

    let seconds = seconds_str.parse::<f64>().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(Duration::from_secs_f64(total_seconds))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn download_input(cli: &Cli, url: &str) -> Result<DownloadedMedia, Box<dyn std::error::Error>> {
    let intent = DownloadIntent::from_flags(cli.audio_only, cli.selects_frames(), cli.extract_audio);
    let mut download = Download::new(url, std::env::current_dir()?).with_intent(intent);
    if let Some(format) = &cli.ytdl_format {
        download = download.with_format(format);
    }

    let show_progress = cli.progress != ProgressMode::None && !cli.json;
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{msg} {bar:40.green/white} {pos}%") {
        bar.set_style(style.progress_chars("##-"));
    }
    bar.set_message("downloading");
    if !show_progress {
        bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let media = download.run(&SystemRunner, &mut |percent| {
        bar.set_position(percent.clamp(0.0, 100.0) as u64);
    })?;
    bar.finish_and_clear();

    if !cli.json {
        println!(
            "{} {}",
            "downloaded".green().bold(),
            media.path().display()
        );
    }
    Ok(media)
}

fn extract_audio_only(cli: &Cli, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let extraction = cli.audio_extraction(input);
    let tracker = ProgressTracker::new(0, cli.progress_callback());
    let written = extraction.run(&SystemRunner, Some(&tracker))?;
    let progress = tracker.finish();

    if cli.json {
        let payload = json!({
            "input": input.display().to_string(),
            "audio": written.display().to_string(),
            "audio_updates": progress.aux,
            "elapsed_seconds": progress.elapsed.as_secs_f64(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} {}", "saved".green().bold(), written.display());
    }
    Ok(())
}

fn print_report(cli: &Cli, input: &Path, report: &ExtractionReport) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = &report.pipeline;

    if cli.json {
        let payload = json!({
            "input": input.display().to_string(),
            "video": {
                "width": report.video.width,
                "height": report.video.height,
                "frames_per_second": report.video.frames_per_second,
                "frame_count": report.video.frame_count,
                "duration_seconds": report.video.duration.as_secs_f64(),
                "codec": report.video.codec,
                "pixel_format": report.video.pixel_format,
            },
            "selected": report.progress.total,
            "saved": pipeline.saved,
            "decoded": pipeline.decoded,
            "skipped_packets": pipeline.skipped_packets,
            "missing": pipeline.missing,
            "peak_queue_len": pipeline.peak_queue_len,
            "failures": pipeline.failures.iter().map(|failure| json!({
                "frame": failure.index,
                "error": failure.message,
            })).collect::<Vec<_>>(),
            "audio": report.audio.as_ref().map(|result| match result {
                Ok(path) => json!({ "path": path.display().to_string() }),
                Err(error) => json!({ "error": error.to_string() }),
            }),
            "elapsed_seconds": report.progress.elapsed.as_secs_f64(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for failure in &pipeline.failures {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("frame {}: {}", failure.index, failure.message).yellow()
        );
    }
    if pipeline.missing > 0 {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("video ended before {} selected frame(s)", pipeline.missing).yellow()
        );
    }
    match &report.audio {
        Some(Ok(path)) => println!("{} {}", "saved".green().bold(), path.display()),
        Some(Err(error)) => eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("audio extraction failed: {error}").yellow()
        ),
        None => {}
    }

    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Extracted {} frame(s) using {} workers in {:.2}s",
            pipeline.saved,
            cli.workers.max(1),
            report.progress.elapsed.as_secs_f64()
        )
        .green()
    );
    Ok(())
}

fn extract(cli: &Cli, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if cli.audio_only {
        return extract_audio_only(cli, input);
    }

    let template = OutputTemplate::parse(&cli.output)?;
    let options = ExtractOptions::new()
        .with_workers(cli.workers)
        .with_queue_capacity(cli.queue_capacity)
        .with_output_format(cli.format)
        .with_fast_mode(cli.fast)
        .with_progress(cli.progress_callback());

    let mut extractor = FrameExtractor::new(input, template)
        .with_request(cli.frame_request())
        .with_options(options);
    if cli.extract_audio {
        extractor = extractor.with_audio(cli.audio_extraction(input));
    }

    let report = extractor.run()?;
    print_report(cli, input, &report)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "framegrab", &mut std::io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    framegrab::init_ffmpeg(cli.ffmpeg_log_level)?;

    let downloaded = match &cli.ytdl {
        Some(url) => Some(download_input(&cli, url)?),
        None => None,
    };
    let input = match (&downloaded, &cli.input) {
        (Some(media), _) => media.path().to_path_buf(),
        (None, Some(path)) => path.clone(),
        (None, None) => return Err("no input given (pass a file or --ytdl URL)".into()),
    };

    let outcome = extract(&cli, &input);

    if let Some(media) = downloaded {
        if cli.keep_download {
            log::info!("Keeping downloaded file {}", media.path().display());
        } else if let Err(error) = media.remove() {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("could not remove downloaded file: {error}").yellow()
            );
        }
    }

    outcome
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
