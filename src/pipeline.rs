//! The concurrent extraction pipeline.
//!
//! One producer (the calling thread) pulls frames from a [`FrameSource`],
//! keeps the ones in the [`TargetFrameSet`] and pushes owned copies into a
//! [`BoundedQueue`]. A fixed pool of scoped worker threads pops frames and
//! hands each to a [`FrameSink`], reporting to a shared
//! [`ProgressTracker`]. The queue's capacity bounds how many decoded frames
//! are in memory at once.
//!
//! Failures stay local: an undecodable packet is skipped without advancing
//! the frame counter, and a frame that cannot be saved is recorded in the
//! [`PipelineReport`] while its worker moves on.

use std::{
    any::Any,
    fmt::{Display, Formatter, Result as FmtResult},
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    error::FramegrabError,
    frame::DecodedFrame,
    output::FrameSink,
    progress::ProgressTracker,
    queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY},
    selection::TargetFrameSet,
    source::{Advance, FrameSource},
};

/// Number of save workers used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Sizing of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Save worker threads. Zero is raised to one.
    pub workers: usize,
    /// Queue capacity. Zero is raised to one.
    pub queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Queue and workers are being set up.
    Init,
    /// The producer is decoding.
    Running,
    /// The producer is done; workers are emptying the queue.
    Draining,
    /// Every worker has exited.
    Done,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineStage::Init => write!(f, "INIT"),
            PipelineStage::Running => write!(f, "RUNNING"),
            PipelineStage::Draining => write!(f, "DRAINING"),
            PipelineStage::Done => write!(f, "DONE"),
        }
    }
}

/// A selected frame that was not saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    /// Decode-order index of the frame.
    pub index: u64,
    /// Error message.
    pub message: String,
}

/// Outcome of [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Frames decoded by the producer, selected or not.
    pub decoded: u64,
    /// Frames pushed into the queue.
    pub enqueued: u64,
    /// Frames the sink persisted successfully.
    pub saved: u64,
    /// Selected frames that could not be copied or saved, by index.
    pub failures: Vec<FrameFailure>,
    /// Packets that failed to decode.
    pub skipped_packets: u64,
    /// Highest queue occupancy reached.
    pub peak_queue_len: usize,
    /// Selected frames the source ended before reaching.
    pub missing: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Returns `true` if every selected frame was saved.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.missing == 0
    }
}

/// Marks the queue finished when dropped, so workers exit even if the
/// producer unwinds.
struct FinishOnDrop<'a, T>(&'a BoundedQueue<T>);

impl<T> Drop for FinishOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

#[derive(Default)]
struct ProducerStats {
    decoded: u64,
    matched: u64,
    enqueued: u64,
    skipped_packets: u64,
}

fn enter(stage: PipelineStage) {
    log::debug!("Pipeline stage: {stage}");
}

/// Extract `targets` from `source` into `sink`.
///
/// Blocks until the producer has stopped and every worker has exited. Each
/// handled frame, saved or failed, adds one to `tracker`.
///
/// # Errors
///
/// Returns [`FramegrabError::EmptySelection`] before any thread is spawned
/// if `targets` is empty, and [`FramegrabError::IoError`] if a worker
/// thread cannot be spawned. Per-packet and per-frame failures are not
/// errors; they are listed in the report.
pub fn run_pipeline<S, K>(
    source: &mut S,
    targets: &TargetFrameSet,
    sink: &K,
    tracker: &ProgressTracker,
    options: PipelineOptions,
) -> Result<PipelineReport, FramegrabError>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    enter(PipelineStage::Init);
    if targets.is_empty() {
        return Err(FramegrabError::EmptySelection);
    }

    let start_time = Instant::now();
    let worker_count = options.workers.max(1);
    let queue: BoundedQueue<DecodedFrame> = BoundedQueue::new(options.queue_capacity);
    let saved = AtomicU64::new(0);
    let failures: Mutex<Vec<FrameFailure>> = Mutex::new(Vec::new());

    log::debug!(
        "Starting pipeline: {} targets, {worker_count} workers, queue capacity {}",
        targets.len(),
        queue.capacity()
    );

    let stats = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let spawned = thread::Builder::new()
                .name(format!("framegrab-worker-{worker_id}"))
                .spawn_scoped(scope, || save_frames(&queue, sink, tracker, &saved, &failures));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    queue.mark_finished();
                    return Err(FramegrabError::IoError(error));
                }
            }
        }

        enter(PipelineStage::Running);
        let stats = {
            let _finish = FinishOnDrop(&queue);
            produce(source, targets, &queue, tracker, &failures)
        };

        enter(PipelineStage::Draining);
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("A save worker panicked");
            }
        }
        Ok(stats)
    })?;
    enter(PipelineStage::Done);

    let mut failures = failures.into_inner();
    failures.sort_by_key(|failure| failure.index);

    let report = PipelineReport {
        decoded: stats.decoded,
        enqueued: stats.enqueued,
        saved: saved.into_inner(),
        failures,
        skipped_packets: stats.skipped_packets,
        peak_queue_len: queue.peak_len(),
        missing: targets.len() - stats.matched,
        elapsed: start_time.elapsed(),
    };

    if report.missing > 0 {
        log::warn!(
            "Video ended before {} of the selected frames were reached",
            report.missing
        );
    }
    log::info!(
        "Pipeline finished: {} saved, {} failed, {} decoded in {:.2}s",
        report.saved,
        report.failures.len(),
        report.decoded,
        report.elapsed.as_secs_f64()
    );

    Ok(report)
}

fn produce<S: FrameSource + ?Sized>(
    source: &mut S,
    targets: &TargetFrameSet,
    queue: &BoundedQueue<DecodedFrame>,
    tracker: &ProgressTracker,
    failures: &Mutex<Vec<FrameFailure>>,
) -> ProducerStats {
    let wanted = targets.len();
    let mut stats = ProducerStats::default();

    while stats.matched < wanted {
        match source.advance() {
            Advance::Frame => {
                let index = stats.decoded;
                stats.decoded += 1;
                if !targets.contains(index) {
                    continue;
                }
                stats.matched += 1;

                match source.copy_current(index) {
                    Ok(frame) => {
                        queue.push(frame);
                        stats.enqueued += 1;
                    }
                    Err(error) => {
                        log::warn!("Failed to copy frame {index}: {error}");
                        failures.lock().push(FrameFailure {
                            index,
                            message: error.to_string(),
                        });
                        tracker.update(1, 0);
                    }
                }
            }
            Advance::Skipped(error) => {
                stats.skipped_packets += 1;
                log::warn!("Skipping packet: {error}");
            }
            Advance::Exhausted => break,
        }
    }

    stats
}

fn save_frames<K: FrameSink + ?Sized>(
    queue: &BoundedQueue<DecodedFrame>,
    sink: &K,
    tracker: &ProgressTracker,
    saved: &AtomicU64,
    failures: &Mutex<Vec<FrameFailure>>,
) {
    while let Some(frame) = queue.pop() {
        let index = frame.index();
        // A panic in the sink counts as a failed save; the worker keeps draining.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.persist(frame)))
            .unwrap_or_else(|payload| {
                Err(FramegrabError::SinkPanicked(panic_message(&*payload)))
            });
        match outcome {
            Ok(_) => {
                saved.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                log::warn!("Failed to save frame {index}: {error}");
                failures.lock().push(FrameFailure {
                    index,
                    message: error.to_string(),
                });
            }
        }
        tracker.update(1, 0);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
