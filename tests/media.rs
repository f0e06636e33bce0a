//! Media opening and end-to-end extraction tests.
//!
//! Tests that need real video skip themselves when
//! `tests/fixtures/sample_video.mp4` is absent.

use std::{path::Path, sync::Arc};

use framegrab::{
    Advance, ExtractOptions, FrameExtractor, FrameRequest, FrameSource, FramegrabError,
    MediaFile, NoOpProgress, OutputFormat, OutputTemplate, StreamKind,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn open_nonexistent_file() {
    let result = MediaFile::open("this_file_does_not_exist.mp4");
    let error = result.unwrap_err();
    assert!(matches!(error, FramegrabError::FileOpen { .. }));
    assert!(error.is_setup_error());
    assert!(
        error.to_string().contains("this_file_does_not_exist.mp4"),
        "message should name the path: {error}"
    );
}

#[test]
fn open_invalid_file() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("invalid.mp4");
    std::fs::write(&path, b"this is not a media file").unwrap();

    let error = MediaFile::open(&path).unwrap_err();
    assert!(error.is_setup_error(), "unexpected error: {error}");
}

#[test]
fn sample_video_metadata() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let media = MediaFile::open(path).expect("open");
    let video = media.video_info();
    assert!(video.width > 0 && video.height > 0);
    assert!(video.frames_per_second > 0.0);
    assert!(video.frame_count.is_some_and(|count| count > 0));
    assert!(!video.codec.is_empty());

    let streams = media.streams();
    assert!(
        streams
            .iter()
            .any(|stream| stream.index == video.stream_index && stream.kind == StreamKind::Video)
    );
    assert_eq!(media.path(), Path::new(path));
}

// ── Decoding ───────────────────────────────────────────────────────

#[test]
fn frame_source_decodes_in_order() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let media = MediaFile::open(path).expect("open");
    let (width, height) = (media.video_info().width, media.video_info().height);
    let mut source = media.into_frame_source();

    let mut decoded = 0u64;
    while decoded < 5 {
        match source.advance() {
            Advance::Frame => {
                let frame = source.copy_current(decoded).expect("copy");
                assert_eq!(frame.index(), decoded);
                assert_eq!((frame.width(), frame.height()), (width, height));
                assert!(frame.byte_len() > 0);
                decoded += 1;
            }
            Advance::Skipped(_) => {}
            Advance::Exhausted => break,
        }
    }
    assert_eq!(decoded, 5);
}

// ── End to end ─────────────────────────────────────────────────────

#[test]
fn extract_selected_frames_to_directory() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let directory = tempfile::tempdir().unwrap();
    let pattern = directory.path().join("frames").join("frame_%03d.png");
    let template = OutputTemplate::parse(pattern.to_str().unwrap()).unwrap();

    let report = FrameExtractor::new(path, template)
        .with_request(FrameRequest::new().with_frames([0, 2, 4]))
        .with_options(ExtractOptions::new().with_progress(Arc::new(NoOpProgress)))
        .run()
        .expect("extract");

    assert_eq!(report.pipeline.saved, 3);
    assert!(report.pipeline.is_complete());
    assert!(report.audio.is_none());
    assert_eq!(report.progress.processed, 3);

    for index in [0, 2, 4] {
        let saved = directory.path().join("frames").join(format!("frame_{index:03}.png"));
        let image = image::open(&saved).expect("readable png");
        assert_eq!(image.width(), report.video.width);
    }
}

#[test]
fn extract_in_fast_mode_writes_raw_planes() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let directory = tempfile::tempdir().unwrap();
    let pattern = directory.path().join("raw_%d");
    let template = OutputTemplate::parse(pattern.to_str().unwrap()).unwrap();

    let report = FrameExtractor::new(path, template)
        .with_request(FrameRequest::new().with_frame(1))
        .with_options(
            ExtractOptions::new()
                .with_output_format(OutputFormat::Jpeg)
                .with_fast_mode(true)
                .with_workers(1),
        )
        .run()
        .expect("extract");

    assert_eq!(report.pipeline.saved, 1);
    let raw = std::fs::metadata(directory.path().join("raw_1.yuv")).expect("raw dump");
    assert!(raw.len() > 0);
}

#[test]
fn extract_rejects_selection_past_the_end() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let directory = tempfile::tempdir().unwrap();
    let pattern = directory.path().join("%d.png");
    let template = OutputTemplate::parse(pattern.to_str().unwrap()).unwrap();

    let result = FrameExtractor::new(path, template)
        .with_request(FrameRequest::new().with_frames([10_000_000]))
        .run();
    assert!(matches!(result, Err(FramegrabError::EmptySelection)));
    assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
}
