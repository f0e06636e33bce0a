//! Owned decoded frames.
//!
//! FFmpeg reuses its internal frame buffers on every decode call, so a frame
//! that has to outlive the next decode is copied into a [`DecodedFrame`]:
//! plain `Vec<u8>` planes with the row padding stripped. A `DecodedFrame`
//! owns all of its memory and can be moved to a worker thread freely.

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};

use crate::error::FramegrabError;

/// One tightly packed image plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    row_bytes: usize,
    rows: usize,
}

impl Plane {
    /// Wrap tightly packed plane data.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::FrameConversion`] if `data` is not exactly
    /// `row_bytes × rows` bytes long.
    pub fn new(data: Vec<u8>, row_bytes: usize, rows: usize) -> Result<Self, FramegrabError> {
        if data.len() != row_bytes * rows {
            return Err(FramegrabError::FrameConversion {
                frame_index: 0,
                reason: format!(
                    "plane holds {} bytes, expected {row_bytes} x {rows}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            data,
            row_bytes,
            rows,
        })
    }

    /// Pixel bytes, row after row, without padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of meaningful bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// A decoded picture that owns its pixel data.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    index: u64,
    width: u32,
    height: u32,
    format: Pixel,
    planes: Vec<Plane>,
}

impl DecodedFrame {
    /// Assemble a frame from already packed planes.
    pub fn new(index: u64, width: u32, height: u32, format: Pixel, planes: Vec<Plane>) -> Self {
        Self {
            index,
            width,
            height,
            format,
            planes,
        }
    }

    /// Deep-copy an FFmpeg frame, dropping per-row padding.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::FrameConversion`] if FFmpeg cannot describe
    /// the line size of one of the frame's planes.
    pub fn copy_from(frame: &VideoFrame, index: u64) -> Result<Self, FramegrabError> {
        let format = frame.format();
        let width = frame.width();
        let height = frame.height();

        let mut planes = Vec::with_capacity(frame.planes());
        for plane_index in 0..frame.planes() {
            let row_bytes = plane_row_bytes(format, width, plane_index).ok_or_else(|| {
                FramegrabError::FrameConversion {
                    frame_index: index,
                    reason: format!("unsupported layout for plane {plane_index} of {format:?}"),
                }
            })?;
            let rows = frame.plane_height(plane_index) as usize;
            let data = crate::utilities::pack_rows(
                frame.data(plane_index),
                frame.stride(plane_index),
                row_bytes,
                rows,
            );
            planes.push(Plane {
                data,
                row_bytes,
                rows,
            });
        }

        Ok(Self::new(index, width, height, format, planes))
    }

    /// Rebuild an FFmpeg frame holding a copy of this frame's pixels.
    ///
    /// Used to feed the software scaler.
    pub(crate) fn to_video_frame(&self) -> Result<VideoFrame, FramegrabError> {
        let mut frame = VideoFrame::new(self.format, self.width, self.height);
        if frame.planes() < self.planes.len() {
            return Err(FramegrabError::FrameConversion {
                frame_index: self.index,
                reason: format!(
                    "{:?} frame has {} planes, decoder produced {}",
                    self.format,
                    frame.planes(),
                    self.planes.len()
                ),
            });
        }

        for (plane_index, plane) in self.planes.iter().enumerate() {
            let stride = frame.stride(plane_index);
            let destination = frame.data_mut(plane_index);
            crate::utilities::unpack_rows(plane.data(), plane.row_bytes(), destination, stride);
        }

        Ok(frame)
    }

    /// Decode-order index of this frame.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format the decoder produced.
    pub fn format(&self) -> Pixel {
        self.format
    }

    /// The frame's planes, in FFmpeg plane order.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Total number of pixel bytes across all planes.
    pub fn byte_len(&self) -> usize {
        self.planes.iter().map(|plane| plane.data.len()).sum()
    }
}

/// Visible bytes per row of `plane` for a frame of `width` pixels.
fn plane_row_bytes(format: Pixel, width: u32, plane: usize) -> Option<usize> {
    let pixel_format: ffmpeg_sys_next::AVPixelFormat = format.into();
    // SAFETY: `av_image_get_linesize` only reads the static pixel format
    // descriptor table and returns a negative value for invalid input.
    let line_size =
        unsafe { ffmpeg_sys_next::av_image_get_linesize(pixel_format, width as i32, plane as i32) };
    usize::try_from(line_size).ok().filter(|&bytes| bytes > 0)
}
