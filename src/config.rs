//! Extraction configuration.
//!
//! [`ExtractOptions`] collects the operational settings of a run (pipeline
//! sizing, progress reporting, output encoding) so that
//! [`FrameExtractor`](crate::FrameExtractor) takes one value instead of a
//! long argument list.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use framegrab::{ConsoleProgress, ExtractOptions, OutputFormat};
//!
//! let options = ExtractOptions::new()
//!     .with_workers(8)
//!     .with_queue_capacity(64)
//!     .with_output_format(OutputFormat::Jpeg)
//!     .with_progress(Arc::new(ConsoleProgress::new()));
//! assert_eq!(options.workers(), 8);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::{
    output::{OutputFormat, SaveMode},
    pipeline::{DEFAULT_WORKERS, PipelineOptions},
    progress::{NoOpProgress, ProgressCallback},
    queue::DEFAULT_QUEUE_CAPACITY,
};

/// Settings for one extraction run.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) workers: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) output_format: OutputFormat,
    pub(crate) save_mode: SaveMode,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("output_format", &self.output_format)
            .field("save_mode", &self.save_mode)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: Arc::new(NoOpProgress),
            output_format: OutputFormat::default(),
            save_mode: SaveMode::default(),
        }
    }
}

impl ExtractOptions {
    /// Defaults: 4 workers, capacity 32, no progress output, PNG.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of save worker threads. Zero is raised to one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Maximum number of decoded frames held in the queue.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Receiver for progress snapshots.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Image encoding for saved frames.
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Write raw planes instead of encoded images.
    #[must_use]
    pub fn with_fast_mode(mut self, fast: bool) -> Self {
        self.save_mode = if fast { SaveMode::Raw } else { SaveMode::Encoded };
        self
    }

    /// Configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Configured image encoding.
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Configured save mode.
    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub(crate) fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }
}
