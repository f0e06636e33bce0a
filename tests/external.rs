//! External process integration tests: audio extraction and downloads.
//!
//! A scripted [`ProcessRunner`] stands in for `ffmpeg` and `yt-dlp`, so
//! neither program needs to be installed.

use std::{collections::HashSet, fs, path::PathBuf, sync::Arc, time::Duration};

use framegrab::{
    AudioExtraction, AudioFormat, CommandSpec, Download, DownloadIntent, FramegrabError,
    NoOpProgress, OutputStream, ProcessRunner, ProgressTracker,
    audio::parse_time_token,
    download::{find_downloaded, list_downloads, parse_percentage},
    process::split_lines,
};
use parking_lot::Mutex;

/// Replays canned output and records every command it is asked to run.
struct ScriptedRunner {
    installed: bool,
    version_code: Option<i32>,
    exit_code: Option<i32>,
    lines: Vec<&'static str>,
    /// File created in the command's working directory before any output.
    creates: Option<&'static str>,
    commands: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    fn new(lines: Vec<&'static str>) -> Self {
        Self {
            installed: true,
            version_code: Some(0),
            exit_code: Some(0),
            lines,
            creates: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<i32>, FramegrabError> {
        self.commands.lock().push(spec.clone());
        if !self.installed {
            return Err(FramegrabError::ToolNotFound {
                program: spec.program.clone(),
                reason: "No such file or directory".to_string(),
            });
        }
        let is_version_probe = spec.args_lossy().iter().any(|arg| arg.ends_with("version"));
        if is_version_probe {
            return Ok(self.version_code);
        }

        if let (Some(name), Some(directory)) = (self.creates, &spec.working_dir) {
            fs::write(directory.join(name), b"media")?;
        }
        for line in &self.lines {
            on_line(line);
        }
        Ok(self.exit_code)
    }
}

// ── Audio command ──────────────────────────────────────────────────

#[test]
fn audio_command_defaults() {
    let extraction = AudioExtraction::new("movie.mp4", "soundtrack");
    let spec = extraction.command();

    assert_eq!(spec.program, "ffmpeg");
    assert_eq!(spec.scrape, OutputStream::Stderr);
    assert_eq!(
        spec.args_lossy(),
        vec![
            "-i", "movie.mp4", "-vn", "-b:a", "128k", "-acodec", "libmp3lame", "-y",
            "soundtrack.mp3"
        ]
    );
}

#[test]
fn audio_command_with_window_and_format() {
    let extraction = AudioExtraction::new("movie.mp4", "clip.wav")
        .with_format(AudioFormat::Wav)
        .with_window(Duration::from_millis(1500), Duration::from_secs(4));
    let args = extraction.command().args_lossy();

    assert_eq!(&args[2..6], ["-ss", "1.500", "-t", "2.500"]);
    assert!(args.contains(&"pcm_s16le".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("clip.wav"));
}

#[test]
fn audio_window_is_ignored_when_empty() {
    let extraction = AudioExtraction::new("movie.mp4", "out")
        .with_window(Duration::from_secs(3), Duration::from_secs(3));
    assert!(!extraction.command().args_lossy().contains(&"-ss".to_string()));
}

#[test]
fn audio_bitrate_is_clamped() {
    assert_eq!(AudioExtraction::new("a", "b").with_bitrate(8).bitrate_kbps(), 32);
    assert_eq!(AudioExtraction::new("a", "b").with_bitrate(1000).bitrate_kbps(), 320);
    assert_eq!(AudioExtraction::new("a", "b").with_bitrate(192).bitrate_kbps(), 192);
}

#[test]
fn audio_output_extension_follows_format() {
    let aac = AudioExtraction::new("in.mp4", "track").with_format(AudioFormat::Aac);
    assert_eq!(aac.output_path(), PathBuf::from("track.m4a"));

    let ogg = AudioExtraction::new("in.mp4", "track").with_format(AudioFormat::Ogg);
    assert_eq!(ogg.command().args_lossy()[6], "libvorbis");
}

#[test]
fn audio_format_parsing() {
    assert_eq!("MP3".parse::<AudioFormat>(), Ok(AudioFormat::Mp3));
    assert_eq!("m4a".parse::<AudioFormat>(), Ok(AudioFormat::Aac));
    assert_eq!("wav".parse::<AudioFormat>(), Ok(AudioFormat::Wav));
    assert!("flac".parse::<AudioFormat>().is_err());
}

// ── Audio run ──────────────────────────────────────────────────────

#[test]
fn audio_progress_lines_bump_aux_counter() {
    let runner = ScriptedRunner::new(vec![
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'movie.mp4':",
        "size=     128kB time=00:00:01.00 bitrate= 128.0kbits/s speed=10x",
        "size=     256kB time=00:00:02.00 bitrate= 128.0kbits/s speed=10x",
        "size=     384kB time=00:00:03.00 bitrate= 128.0kbits/s speed=10x",
    ]);
    let tracker = ProgressTracker::new(10, Arc::new(NoOpProgress));
    let extraction = AudioExtraction::new("movie.mp4", "out.mp3");

    let written = extraction.run(&runner, Some(&tracker)).unwrap();

    assert_eq!(written, PathBuf::from("out.mp3"));
    assert_eq!(tracker.snapshot().aux, 3);
    assert_eq!(tracker.snapshot().processed, 0);

    let commands = runner.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].args_lossy(), vec!["-version"]);
    assert_eq!(commands[1], extraction.command());
}

#[test]
fn audio_failure_reports_exit_code() {
    let runner = ScriptedRunner {
        exit_code: Some(1),
        ..ScriptedRunner::new(vec!["Output file #0 does not contain any stream"])
    };
    let result = AudioExtraction::new("silent.mp4", "out.mp3").run(&runner, None);

    assert!(matches!(
        result,
        Err(FramegrabError::ProcessFailed { ref program, code: Some(1) }) if program == "ffmpeg"
    ));
}

#[test]
fn audio_needs_a_working_ffmpeg() {
    let missing = ScriptedRunner {
        installed: false,
        ..ScriptedRunner::new(Vec::new())
    };
    let result = AudioExtraction::new("movie.mp4", "out.mp3").run(&missing, None);
    assert!(matches!(result, Err(FramegrabError::ToolNotFound { .. })));
    assert_eq!(missing.commands().len(), 1, "stops after the probe");

    let broken = ScriptedRunner {
        version_code: Some(127),
        ..ScriptedRunner::new(Vec::new())
    };
    let result = AudioExtraction::new("movie.mp4", "out.mp3").run(&broken, None);
    assert!(matches!(result, Err(FramegrabError::ToolNotFound { .. })));
}

#[test]
fn time_token_parsing() {
    assert_eq!(
        parse_time_token("frame=  10 time=01:00:00.25 bitrate=N/A"),
        Some(Duration::from_secs_f64(3600.25))
    );
    assert_eq!(parse_time_token("time=12.5"), Some(Duration::from_millis(12_500)));
    assert_eq!(parse_time_token("no progress here"), None);
    assert_eq!(parse_time_token("time=-5.00"), None);
}

// ── Download command ───────────────────────────────────────────────

#[test]
fn download_intent_from_flags() {
    assert_eq!(DownloadIntent::from_flags(true, true, true), DownloadIntent::AudioOnly);
    assert_eq!(
        DownloadIntent::from_flags(false, true, true),
        DownloadIntent::SelectedFrames
    );
    assert_eq!(
        DownloadIntent::from_flags(false, false, true),
        DownloadIntent::VideoWithAudio
    );
    assert_eq!(DownloadIntent::from_flags(false, false, false), DownloadIntent::Default);
}

#[test]
fn download_automatic_formats() {
    let cases = [
        (DownloadIntent::AudioOnly, "bestaudio"),
        (DownloadIntent::SelectedFrames, "bestvideo[ext=mp4]"),
        (DownloadIntent::VideoWithAudio, "bestvideo+bestaudio"),
        (DownloadIntent::Default, "best[ext=mp4]"),
    ];
    for (intent, expected) in cases {
        let download = Download::new("https://example.com/v", ".").with_intent(intent);
        assert_eq!(download.format(), expected, "{intent:?}");
    }
}

#[test]
fn explicit_download_format_wins() {
    let download = Download::new("https://example.com/v", ".")
        .with_intent(DownloadIntent::AudioOnly)
        .with_format("worst");
    assert_eq!(download.format(), "worst");
}

#[test]
fn download_command_layout() {
    let download = Download::new("https://example.com/v", "/tmp/work");
    let spec = download.command();

    assert_eq!(spec.program, "yt-dlp");
    assert_eq!(spec.scrape, OutputStream::Stdout);
    assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp/work")));
    assert_eq!(
        spec.args_lossy(),
        vec![
            "-f",
            "best[ext=mp4]",
            "--newline",
            "--progress",
            "--print",
            "after_move:filepath",
            "-o",
            "ytdl_%(title)s.%(ext)s",
            "https://example.com/v"
        ]
    );
}

#[test]
fn percentage_parsing() {
    assert_eq!(parse_percentage("[download] 100% of 3.00MiB"), Some(100.0));
    assert_eq!(parse_percentage("[download]   0.5% of ~1GiB at 2MiB/s ETA 08:00"), Some(0.5));
    assert_eq!(parse_percentage("[download] Destination: ytdl_clip.mp4"), None);
    assert_eq!(parse_percentage("42%"), None);
}

// ── Download run ───────────────────────────────────────────────────

#[test]
fn download_reports_percentages_and_finds_file() {
    let directory = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner {
        creates: Some("ytdl_clip.mp4"),
        ..ScriptedRunner::new(vec![
            "[youtube] abc: Downloading webpage",
            "[download]  10.0% of 5.00MiB",
            "[download]  55.5% of 5.00MiB",
            "[download] 100% of 5.00MiB",
        ])
    };
    let mut percentages = Vec::new();

    let media = Download::new("https://example.com/v", directory.path())
        .run(&runner, &mut |percent| percentages.push(percent))
        .unwrap();

    assert_eq!(percentages, vec![10.0, 55.5, 100.0]);
    assert_eq!(media.path(), directory.path().join("ytdl_clip.mp4"));
    assert_eq!(runner.commands()[0].args_lossy(), vec!["--version"]);
    assert!(media.is_fresh());

    media.clone().remove().unwrap();
    assert!(!media.path().exists());
}

#[test]
fn failed_download_is_process_failure() {
    let directory = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner {
        exit_code: Some(1),
        ..ScriptedRunner::new(vec!["ERROR: Unsupported URL"])
    };
    let result = Download::new("not a url", directory.path()).run(&runner, &mut |_| {});
    assert!(matches!(
        result,
        Err(FramegrabError::ProcessFailed { code: Some(1), .. })
    ));
}

#[test]
fn successful_download_without_file_is_missing() {
    let directory = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(Vec::new());
    let result = Download::new("https://example.com/v", directory.path()).run(&runner, &mut |_| {});
    assert!(matches!(result, Err(FramegrabError::DownloadMissing(_))));
}

#[test]
fn earlier_downloads_are_not_mistaken_for_the_new_one() {
    let directory = tempfile::tempdir().unwrap();
    let kept = directory.path().join("ytdl_Aaa old.mp4");
    fs::write(&kept, b"kept from an earlier run").unwrap();
    let runner = ScriptedRunner {
        creates: Some("ytdl_Zzz new.mp4"),
        ..ScriptedRunner::new(vec!["[download] 100% of 1.00MiB"])
    };

    let media = Download::new("https://example.com/v", directory.path())
        .run(&runner, &mut |_| {})
        .unwrap();

    assert_eq!(media.path(), directory.path().join("ytdl_Zzz new.mp4"));
    media.remove().unwrap();
    assert!(kept.exists(), "the earlier download is untouched");
}

#[test]
fn printed_path_identifies_a_reused_download() {
    let directory = tempfile::tempdir().unwrap();
    let existing = directory.path().join("ytdl_clip.mp4");
    fs::write(&existing, b"downloaded before").unwrap();
    fs::write(directory.path().join("ytdl_another.mp4"), b"").unwrap();
    let runner = ScriptedRunner::new(vec![
        "[download] ytdl_clip.mp4 has already been downloaded",
        "ytdl_clip.mp4",
    ]);

    let media = Download::new("https://example.com/v", directory.path())
        .run(&runner, &mut |_| {})
        .unwrap();

    assert_eq!(media.path(), existing);
    assert!(!media.is_fresh());
    media.remove().unwrap();
    assert!(existing.exists(), "reused files are not deleted");
}

#[test]
fn find_downloaded_picks_first_new_complete_file() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(directory.path().join("ytdl_a.mp4"), b"").unwrap();
    let previous: HashSet<PathBuf> = [directory.path().join("ytdl_a.mp4")].into();

    fs::write(directory.path().join("ytdl_c.webm"), b"").unwrap();
    fs::write(directory.path().join("ytdl_b.mp4.part"), b"").unwrap();
    fs::write(directory.path().join("other.mp4"), b"").unwrap();
    fs::write(directory.path().join("ytdl_d.mp4"), b"").unwrap();

    let found = find_downloaded(directory.path(), &previous).unwrap();
    assert_eq!(found, directory.path().join("ytdl_c.webm"));

    let everything = list_downloads(directory.path()).unwrap();
    assert!(matches!(
        find_downloaded(directory.path(), &everything),
        Err(FramegrabError::DownloadMissing(_))
    ));
}

// ── Line splitting ─────────────────────────────────────────────────

#[test]
fn split_lines_handles_carriage_returns() {
    let output = b"first\nsecond\rthird\r\n\n\xfffourth";
    let mut lines = Vec::new();
    split_lines(&output[..], &mut |line| lines.push(line.to_string())).unwrap();

    assert_eq!(lines, vec!["first", "second", "third", "\u{fffd}fourth"]);
}
