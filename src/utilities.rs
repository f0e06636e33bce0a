//! Internal utility functions.
//!
//! Helpers for pixel-data copying and timestamp conversion that do not
//! belong in any single public module.

use std::time::Duration;

/// Copy `rows` rows of `row_bytes` bytes out of a strided buffer into a
/// tightly packed one.
///
/// FFmpeg frames frequently carry per-row padding (stride > row width).
pub(crate) fn pack_rows(data: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let row_start = row * stride;
        buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    buffer
}

/// Inverse of [`pack_rows`]: spread packed rows into a strided buffer.
pub(crate) fn unpack_rows(packed: &[u8], row_bytes: usize, destination: &mut [u8], stride: usize) {
    if row_bytes == 0 {
        return;
    }
    for (row, source) in packed.chunks_exact(row_bytes).enumerate() {
        let row_start = row * stride;
        let Some(target) = destination.get_mut(row_start..row_start + row_bytes) else {
            break;
        };
        target.copy_from_slice(source);
    }
}

/// Convert a [`Duration`] to a frame number using the video's frame rate.
pub fn timestamp_to_frame_number(timestamp: Duration, frames_per_second: f64) -> u64 {
    (timestamp.as_secs_f64() * frames_per_second) as u64
}
