//! Frame pipeline integration tests.
//!
//! These run the producer and worker pool against a synthetic frame source,
//! so no fixture files are needed.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use framegrab::{
    Advance, DecodedFrame, FrameSink, FrameSource, FramegrabError, NoOpProgress, PipelineOptions,
    Pixel, Plane, ProgressTracker, TargetFrameSet, run_pipeline,
};
use parking_lot::Mutex;

/// Produces `frames` tiny RGB24 frames, optionally failing some packets and
/// copies.
struct SyntheticSource {
    frames: u64,
    produced: u64,
    calls: u64,
    broken_packets: HashSet<u64>,
    broken_copies: HashSet<u64>,
}

impl SyntheticSource {
    fn new(frames: u64) -> Self {
        Self {
            frames,
            produced: 0,
            calls: 0,
            broken_packets: HashSet::new(),
            broken_copies: HashSet::new(),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn advance(&mut self) -> Advance {
        let call = self.calls;
        self.calls += 1;
        if self.broken_packets.contains(&call) {
            return Advance::Skipped(FramegrabError::VideoDecodeError("corrupt packet".into()));
        }
        if self.produced == self.frames {
            return Advance::Exhausted;
        }
        self.produced += 1;
        Advance::Frame
    }

    fn copy_current(&self, index: u64) -> Result<DecodedFrame, FramegrabError> {
        if self.broken_copies.contains(&index) {
            return Err(FramegrabError::FrameConversion {
                frame_index: index,
                reason: "copy failed".into(),
            });
        }
        let pixel = (self.produced - 1) as u8;
        let plane = Plane::new(vec![pixel; 2 * 2 * 3], 6, 2)?;
        Ok(DecodedFrame::new(index, 2, 2, Pixel::RGB24, vec![plane]))
    }
}

/// Records every persisted frame as `(index, first pixel byte)`.
#[derive(Default)]
struct RecordingSink {
    saved: Mutex<Vec<(u64, u8)>>,
    failing: HashSet<u64>,
    panicking: HashSet<u64>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FrameSink for RecordingSink {
    fn persist(&self, frame: DecodedFrame) -> Result<PathBuf, FramegrabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.panicking.contains(&frame.index()) {
            panic!("encoder crashed on frame {}", frame.index());
        }
        if self.failing.contains(&frame.index()) {
            return Err(FramegrabError::IoError(std::io::Error::other("disk full")));
        }
        let first = frame.planes()[0].data()[0];
        self.saved.lock().push((frame.index(), first));
        Ok(PathBuf::from(format!("frame_{}.png", frame.index())))
    }
}

impl RecordingSink {
    fn saved_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.saved.lock().iter().map(|(index, _)| *index).collect();
        indices.sort_unstable();
        indices
    }
}

fn tracker(total: u64) -> ProgressTracker {
    ProgressTracker::new(total, Arc::new(NoOpProgress))
}

fn options(workers: usize, queue_capacity: usize) -> PipelineOptions {
    PipelineOptions {
        workers,
        queue_capacity,
    }
}

// ── Selection ──────────────────────────────────────────────────────

#[test]
fn explicit_targets_are_saved_and_decoding_stops_early() {
    let mut source = SyntheticSource::new(100);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit([10, 20, 30]);
    let tracker = tracker(targets.len());

    let report = run_pipeline(&mut source, &targets, &sink, &tracker, options(4, 32)).unwrap();

    assert_eq!(sink.saved_indices(), vec![10, 20, 30]);
    assert_eq!(report.saved, 3);
    assert_eq!(report.enqueued, 3);
    assert_eq!(report.decoded, 31, "nothing decoded after the last target");
    assert_eq!(report.missing, 0);
    assert!(report.is_complete());
    assert_eq!(tracker.snapshot().processed, 3);
}

#[test]
fn frames_carry_their_own_pixels() {
    let mut source = SyntheticSource::new(50);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit([3, 17, 42]);

    run_pipeline(&mut source, &targets, &sink, &tracker(3), options(2, 1)).unwrap();

    let mut saved = sink.saved.lock().clone();
    saved.sort_unstable();
    assert_eq!(saved, vec![(3, 3), (17, 17), (42, 42)]);
}

#[test]
fn stride_targets() {
    let mut source = SyntheticSource::new(10);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::stride(0, 9, 2).unwrap();

    let report = run_pipeline(&mut source, &targets, &sink, &tracker(5), options(4, 32)).unwrap();

    assert_eq!(sink.saved_indices(), vec![0, 2, 4, 6, 8]);
    assert_eq!(report.saved, 5);
}

#[test]
fn empty_targets_fail_before_any_work() {
    let mut source = SyntheticSource::new(10);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit(Vec::<u64>::new());

    let result = run_pipeline(&mut source, &targets, &sink, &tracker(0), options(4, 32));

    assert!(matches!(result, Err(FramegrabError::EmptySelection)));
    assert_eq!(source.calls, 0, "the source was never advanced");
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn targets_beyond_the_end_are_reported_missing() {
    let mut source = SyntheticSource::new(15);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit([5, 10, 20, 25]);

    let report = run_pipeline(&mut source, &targets, &sink, &tracker(4), options(2, 4)).unwrap();

    assert_eq!(sink.saved_indices(), vec![5, 10]);
    assert_eq!(report.missing, 2);
    assert_eq!(report.decoded, 15);
    assert!(!report.is_complete());
}

// ── Concurrency ────────────────────────────────────────────────────

#[test]
fn every_frame_is_persisted_exactly_once() {
    for workers in [1, 3, 4, 8] {
        let mut source = SyntheticSource::new(37);
        let sink = RecordingSink::default();
        let targets = TargetFrameSet::stride(0, 36, 1).unwrap();

        let report =
            run_pipeline(&mut source, &targets, &sink, &tracker(37), options(workers, 5)).unwrap();

        assert_eq!(sink.saved_indices(), (0..37).collect::<Vec<_>>(), "{workers} workers");
        assert_eq!(sink.calls.load(Ordering::SeqCst), 37);
        assert_eq!(report.saved, 37);
    }
}

#[test]
fn slow_workers_never_overfill_the_queue() {
    let mut source = SyntheticSource::new(60);
    let sink = RecordingSink {
        delay: Some(Duration::from_millis(2)),
        ..RecordingSink::default()
    };
    let targets = TargetFrameSet::stride(0, 59, 1).unwrap();

    let report = run_pipeline(&mut source, &targets, &sink, &tracker(60), options(2, 3)).unwrap();

    assert!(report.peak_queue_len <= 3, "peak {}", report.peak_queue_len);
    assert_eq!(report.saved, 60);
}

#[test]
fn zero_workers_and_capacity_are_raised_to_one() {
    let mut source = SyntheticSource::new(5);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::stride(0, 4, 1).unwrap();

    let report = run_pipeline(&mut source, &targets, &sink, &tracker(5), options(0, 0)).unwrap();

    assert_eq!(report.saved, 5);
    assert_eq!(report.peak_queue_len, 1);
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn failed_save_does_not_stop_the_run() {
    let mut source = SyntheticSource::new(10);
    let sink = RecordingSink {
        failing: HashSet::from([4]),
        ..RecordingSink::default()
    };
    let targets = TargetFrameSet::stride(0, 9, 1).unwrap();
    let tracker = tracker(10);

    let report = run_pipeline(&mut source, &targets, &sink, &tracker, options(3, 4)).unwrap();

    assert_eq!(report.saved, 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 4);
    assert!(report.failures[0].message.contains("disk full"));
    assert_eq!(tracker.snapshot().processed, 10, "failures count as processed");
}

#[test]
fn panicking_sink_does_not_stall_the_producer() {
    let mut source = SyntheticSource::new(12);
    let sink = RecordingSink {
        panicking: HashSet::from([1, 2, 3, 4]),
        ..RecordingSink::default()
    };
    let targets = TargetFrameSet::stride(0, 11, 1).unwrap();
    let tracker = tracker(12);

    let report = run_pipeline(&mut source, &targets, &sink, &tracker, options(1, 1)).unwrap();

    assert_eq!(report.saved, 8);
    assert_eq!(
        report.failures.iter().map(|failure| failure.index).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(report.failures[0].message.contains("encoder crashed on frame 1"));
    assert_eq!(tracker.snapshot().processed, 12);
}

#[test]
fn failed_copy_is_recorded_and_counted() {
    let mut source = SyntheticSource::new(10);
    source.broken_copies.insert(2);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit([1, 2, 3]);
    let tracker = tracker(3);

    let report = run_pipeline(&mut source, &targets, &sink, &tracker, options(2, 2)).unwrap();

    assert_eq!(sink.saved_indices(), vec![1, 3]);
    assert_eq!(report.enqueued, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(tracker.snapshot().processed, 3);
}

#[test]
fn undecodable_packets_do_not_advance_the_frame_counter() {
    let mut source = SyntheticSource::new(10);
    source.broken_packets.extend([0, 3, 4]);
    let sink = RecordingSink::default();
    let targets = TargetFrameSet::explicit([0, 5]);

    let report = run_pipeline(&mut source, &targets, &sink, &tracker(2), options(2, 4)).unwrap();

    let mut saved = sink.saved.lock().clone();
    saved.sort_unstable();
    assert_eq!(saved, vec![(0, 0), (5, 5)]);
    assert_eq!(report.skipped_packets, 3);
    assert_eq!(report.decoded, 6);
}
