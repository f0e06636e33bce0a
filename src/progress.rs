//! Progress tracking shared by the decoder, the save workers and the audio
//! stage.
//!
//! [`ProgressTracker`] owns the counters for one run behind a single mutex.
//! Every [`update`](ProgressTracker::update) adds to those counters and, at
//! most once per render interval, hands a [`ProgressInfo`] snapshot to a
//! [`ProgressCallback`]. [`ConsoleProgress`] is the stock renderer: a
//! one-line text bar on stderr.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use framegrab::{ProgressCallback, ProgressInfo, ProgressTracker};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}/{} frames", info.processed, info.total);
//!     }
//! }
//!
//! let tracker = ProgressTracker::new(10, Arc::new(PrintProgress));
//! tracker.update(3, 0);
//! let summary = tracker.finish();
//! assert_eq!(summary.processed, 10);
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Minimum wall time between two non-final renders.
pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// Width of the text bar drawn by [`ConsoleProgress`].
const BAR_WIDTH: usize = 50;

/// A snapshot of extraction progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames handled so far (saved or failed).
    pub processed: u64,
    /// Frames expected in total.
    pub total: u64,
    /// Informational count of auxiliary work units (audio progress updates).
    pub aux: u64,
    /// Completion fraction in `0.0..=1.0`.
    pub fraction: f64,
    /// Wall-clock time elapsed since the tracker was created.
    pub elapsed: Duration,
    /// Frames processed per second.
    pub rate: f64,
    /// Estimated time remaining, when the rate is known.
    pub estimated_remaining: Option<Duration>,
}

/// Receiver for progress snapshots.
///
/// Implementations must be [`Send`] and [`Sync`] because the tracker is
/// updated from worker threads. Callbacks run while the tracker lock is
/// held, so they must not call back into the tracker.
pub trait ProgressCallback: Send + Sync {
    /// Called with a throttled snapshot during the run.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called once when the run completes. Defaults to
    /// [`on_progress`](ProgressCallback::on_progress).
    fn on_finish(&self, info: &ProgressInfo) {
        self.on_progress(info);
    }
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Draws a single-line text progress bar on stderr.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// Create a new console renderer.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}", render_bar(info, BAR_WIDTH));
        let _ = stderr.flush();
    }

    fn on_finish(&self, info: &ProgressInfo) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\r{}", render_bar(info, BAR_WIDTH));
        let _ = writeln!(stderr, "\n{}", render_summary(info));
    }
}

/// Format a progress bar line such as
/// `[=====>    ]  45.0% | Frames: 9/20 | 12.3 fps | ETA: 4s`.
pub fn render_bar(info: &ProgressInfo, width: usize) -> String {
    let filled = (width as f64 * info.fraction) as usize;
    let mut line = String::with_capacity(width + 64);

    line.push('[');
    for position in 0..width {
        line.push(match position.cmp(&filled) {
            std::cmp::Ordering::Less => '=',
            std::cmp::Ordering::Equal => '>',
            std::cmp::Ordering::Greater => ' ',
        });
    }
    line.push_str(&format!("] {:5.1}%", info.fraction * 100.0));

    if info.total > 0 {
        line.push_str(&format!(" | Frames: {}/{}", info.processed, info.total));
    }
    if info.aux > 0 {
        line.push_str(&format!(" | Audio: {} updates", info.aux));
    }
    if info.rate > 1000.0 {
        line.push_str(&format!(" | {:.1} Kfps", info.rate / 1000.0));
    } else if info.rate > 0.0 {
        line.push_str(&format!(" | {:.1} fps", info.rate));
    }
    if let Some(remaining) = info.estimated_remaining.filter(|r| !r.is_zero()) {
        line.push_str(&format!(" | ETA: {}", format_eta(remaining)));
    }

    line
}

/// Format the final summary, e.g. `Completed in 1.25 seconds (20 frames)`.
pub fn render_summary(info: &ProgressInfo) -> String {
    let mut line = format!("Completed in {:.2} seconds", info.elapsed.as_secs_f64());
    if info.total > 0 {
        line.push_str(&format!(" ({} frames)", info.total));
    }
    if info.aux > 0 {
        line.push_str(&format!(", {} audio updates", info.aux));
    }
    line
}

fn format_eta(remaining: Duration) -> String {
    let seconds = remaining.as_secs_f64();
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

struct ProgressState {
    processed: u64,
    aux: u64,
    last_render: Option<Instant>,
    finished: bool,
}

/// Thread-safe progress counters for one extraction run.
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    start_time: Instant,
    render_interval: Duration,
}

impl ProgressTracker {
    /// Create a tracker expecting `total` frames.
    pub fn new(total: u64, callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                processed: 0,
                aux: 0,
                last_render: None,
                finished: false,
            }),
            callback,
            total,
            start_time: Instant::now(),
            render_interval: RENDER_INTERVAL,
        }
    }

    /// Override the minimum time between renders.
    #[must_use]
    pub fn with_render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    /// Add to the processed and auxiliary counters.
    ///
    /// The processed count saturates at the total. A render happens when the
    /// render interval has elapsed since the previous one, or when the
    /// processed count first reaches the total.
    pub fn update(&self, processed: u64, aux: u64) {
        let mut state = self.state.lock();
        let previous = state.processed;
        state.processed = previous.saturating_add(processed).min(self.total);
        state.aux = state.aux.saturating_add(aux);

        let now = Instant::now();
        let due = state
            .last_render
            .is_none_or(|last| now.duration_since(last) >= self.render_interval);
        let reached_total = previous < self.total && state.processed == self.total;
        if !due && !reached_total {
            return;
        }
        state.last_render = Some(now);

        let info = self.info_for(&state, now);
        self.callback.on_progress(&info);
    }

    /// Take a snapshot without rendering.
    pub fn snapshot(&self) -> ProgressInfo {
        let state = self.state.lock();
        self.info_for(&state, Instant::now())
    }

    /// Force the processed count to the total and render the final summary.
    ///
    /// Only the first call renders; later calls just return the snapshot.
    pub fn finish(&self) -> ProgressInfo {
        let mut state = self.state.lock();
        let info = {
            state.processed = self.total;
            self.info_for(&state, Instant::now())
        };
        if !state.finished {
            state.finished = true;
            self.callback.on_finish(&info);
        }
        info
    }

    /// Frames expected in total.
    pub fn total(&self) -> u64 {
        self.total
    }

    fn info_for(&self, state: &ProgressState, now: Instant) -> ProgressInfo {
        let elapsed = now.duration_since(self.start_time);

        let fraction = if self.total > 0 {
            (state.processed as f64 / self.total as f64).min(1.0)
        } else {
            0.0
        };

        let seconds = elapsed.as_secs_f64();
        let rate = if seconds > 0.001 {
            state.processed as f64 / seconds
        } else {
            0.0
        };

        let estimated_remaining = (rate > 0.0).then(|| {
            let remaining = self.total.saturating_sub(state.processed);
            Duration::from_secs_f64(remaining as f64 / rate)
        });

        ProgressInfo {
            processed: state.processed,
            total: self.total,
            aux: state.aux,
            fraction,
            elapsed,
            rate,
            estimated_remaining,
        }
    }
}
