//! Frame selection.
//!
//! A [`FrameRequest`] describes which frames the caller wants: an explicit
//! list, a frame range with a step, a single timestamp, or a time range.
//! [`FrameRequest::resolve`] turns it into a [`TargetFrameSet`] for a
//! concrete video.
//!
//! Precedence when several are given: a single timestamp beats a time
//! range, which beats a frame range. An explicit list is then filtered by
//! whatever bounds resulted.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{FrameRequest, FramegrabError, MediaFile};
//!
//! let media = MediaFile::open("input.mp4")?;
//! let targets = FrameRequest::new()
//!     .with_range(100, 200)
//!     .with_step(5)
//!     .resolve(media.video_info())?;
//! assert_eq!(targets.len(), 21);
//! # Ok::<(), FramegrabError>(())
//! ```

use std::time::Duration;

use crate::{error::FramegrabError, metadata::VideoInfo, utilities::timestamp_to_frame_number};

/// The frames a caller asked for, before they are checked against a video.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    frames: Option<Vec<u64>>,
    range_start: Option<u64>,
    range_end: Option<u64>,
    step: u64,
    time: Option<Duration>,
    time_range: Option<(Duration, Duration)>,
}

impl Default for FrameRequest {
    fn default() -> Self {
        Self {
            frames: None,
            range_start: None,
            range_end: None,
            step: 1,
            time: None,
            time_range: None,
        }
    }
}

impl FrameRequest {
    /// A request for every frame of the video.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select exactly these frame indices (subject to any bounds).
    #[must_use]
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.frames = Some(frames.into_iter().collect());
        self
    }

    /// Select a single frame.
    #[must_use]
    pub fn with_frame(self, frame: u64) -> Self {
        self.with_frames([frame])
    }

    /// Restrict to frames `start..=end`.
    #[must_use]
    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range_start = Some(start);
        self.range_end = Some(end);
        self
    }

    /// Restrict to frames from `start` onwards.
    #[must_use]
    pub fn with_start(mut self, start: u64) -> Self {
        self.range_start = Some(start);
        self
    }

    /// Restrict to frames up to and including `end`.
    #[must_use]
    pub fn with_end(mut self, end: u64) -> Self {
        self.range_end = Some(end);
        self
    }

    /// Take every `step`-th frame of the range.
    #[must_use]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Select the frame shown at `time`.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    /// Restrict to the frames shown between `start` and `end`.
    #[must_use]
    pub fn with_time_range(mut self, start: Duration, end: Duration) -> Self {
        self.time_range = Some((start, end));
        self
    }

    /// Resolve the request against a video.
    ///
    /// # Errors
    ///
    /// - [`FramegrabError::InvalidStep`] if the step is zero.
    /// - [`FramegrabError::InvalidRange`] if a range starts after it ends.
    /// - [`FramegrabError::UnknownFrameCount`] if the video's frame count is
    ///   unknown and nothing bounds the selection from above.
    /// - [`FramegrabError::EmptySelection`] if no frame remains.
    pub fn resolve(&self, video: &VideoInfo) -> Result<TargetFrameSet, FramegrabError> {
        if self.step == 0 {
            return Err(FramegrabError::InvalidStep);
        }

        let last_frame = video.frame_count.map(|count| count.checked_sub(1));
        if last_frame == Some(None) {
            return Err(FramegrabError::EmptySelection);
        }
        let last_frame = last_frame.flatten();

        let mut start = 0;
        let mut end = last_frame;

        if let Some(time) = self.time {
            let frame = timestamp_to_frame_number(time, video.frames_per_second);
            start = frame;
            end = Some(frame);
        } else if let Some((start_time, end_time)) = self.time_range {
            if start_time > end_time {
                return Err(FramegrabError::InvalidRange {
                    start: format!("{:.3}s", start_time.as_secs_f64()),
                    end: format!("{:.3}s", end_time.as_secs_f64()),
                });
            }
            start = timestamp_to_frame_number(start_time, video.frames_per_second);
            end = Some(timestamp_to_frame_number(end_time, video.frames_per_second));
        } else {
            if let (Some(range_start), Some(range_end)) = (self.range_start, self.range_end) {
                if range_start > range_end {
                    return Err(FramegrabError::InvalidRange {
                        start: range_start.to_string(),
                        end: range_end.to_string(),
                    });
                }
            }
            if let Some(range_start) = self.range_start {
                start = range_start;
            }
            if let Some(range_end) = self.range_end {
                end = Some(range_end);
            }
        }

        if let (Some(bound), Some(last)) = (end, last_frame) {
            end = Some(bound.min(last));
        }

        let set = match (&self.frames, end) {
            (Some(frames), end) => TargetFrameSet::explicit(
                frames
                    .iter()
                    .copied()
                    .filter(|&frame| frame >= start && end.is_none_or(|end| frame <= end)),
            ),
            (None, Some(end)) if start <= end => TargetFrameSet::stride(start, end, self.step)?,
            (None, Some(_)) => return Err(FramegrabError::EmptySelection),
            (None, None) => return Err(FramegrabError::UnknownFrameCount),
        };

        if set.is_empty() {
            return Err(FramegrabError::EmptySelection);
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Targets {
    Explicit(Vec<u64>),
    Stride { start: u64, end: u64, step: u64 },
}

/// The resolved set of decode-order frame indices to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFrameSet {
    targets: Targets,
}

impl TargetFrameSet {
    /// An explicit set of indices. Duplicates are removed.
    pub fn explicit(frames: impl IntoIterator<Item = u64>) -> Self {
        let mut frames: Vec<u64> = frames.into_iter().collect();
        frames.sort_unstable();
        frames.dedup();
        Self {
            targets: Targets::Explicit(frames),
        }
    }

    /// Every `step`-th index from `start` through `end` inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::InvalidStep`] if `step` is zero and
    /// [`FramegrabError::InvalidRange`] if `start > end` or the range holds
    /// more than `u64::MAX` frames.
    pub fn stride(start: u64, end: u64, step: u64) -> Result<Self, FramegrabError> {
        if step == 0 {
            return Err(FramegrabError::InvalidStep);
        }
        let count = end
            .checked_sub(start)
            .and_then(|span| (span / step).checked_add(1));
        if count.is_none() {
            return Err(FramegrabError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            targets: Targets::Stride { start, end, step },
        })
    }

    /// Returns `true` if `index` is selected.
    pub fn contains(&self, index: u64) -> bool {
        match &self.targets {
            Targets::Explicit(frames) => frames.binary_search(&index).is_ok(),
            Targets::Stride { start, end, step } => {
                (*start..=*end).contains(&index) && (index - start) % step == 0
            }
        }
    }

    /// Number of selected frames.
    pub fn len(&self) -> u64 {
        match &self.targets {
            Targets::Explicit(frames) => frames.len() as u64,
            Targets::Stride { start, end, step } => (end - start) / step + 1,
        }
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest selected index.
    pub fn last(&self) -> Option<u64> {
        match &self.targets {
            Targets::Explicit(frames) => frames.last().copied(),
            Targets::Stride { start, end, step } => Some(start + (end - start) / step * step),
        }
    }

    /// Selected indices in ascending order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        match &self.targets {
            Targets::Explicit(frames) => Box::new(frames.iter().copied()),
            Targets::Stride { start, end, step } => {
                let (end, step) = (*end, *step);
                Box::new(std::iter::successors(Some(*start), move |&index| {
                    index.checked_add(step).filter(|&next| next <= end)
                }))
            }
        }
    }
}
