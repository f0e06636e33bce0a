//! Sequential frame sources.
//!
//! The producer pulls decoded frames through the [`FrameSource`] trait.
//! [`FfmpegFrameSource`] is the real implementation; tests substitute
//! synthetic sources.

use ffmpeg_next::{decoder::Video as VideoDecoder, format::context::Input, frame::Video as VideoFrame};

use crate::{error::FramegrabError, frame::DecodedFrame};

/// Outcome of one [`FrameSource::advance`] call.
#[derive(Debug)]
pub enum Advance {
    /// A new frame is current and can be copied with
    /// [`FrameSource::copy_current`].
    Frame,
    /// A packet failed to decode. No frame was produced; the source can
    /// still be advanced.
    Skipped(FramegrabError),
    /// The source has no more frames.
    Exhausted,
}

/// A stream of decoded frames in decode order.
pub trait FrameSource {
    /// Move to the next decoded frame.
    fn advance(&mut self) -> Advance;

    /// Copy the current frame into an owned [`DecodedFrame`] tagged with
    /// `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::FrameConversion`] if the frame cannot be
    /// copied.
    fn copy_current(&self, index: u64) -> Result<DecodedFrame, FramegrabError>;
}

/// Decodes one video stream of an FFmpeg input from start to end.
pub struct FfmpegFrameSource {
    input_context: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    current: VideoFrame,
    draining: bool,
    exhausted: bool,
}

impl FfmpegFrameSource {
    pub(crate) fn new(input_context: Input, decoder: VideoDecoder, stream_index: usize) -> Self {
        Self {
            input_context,
            decoder,
            stream_index,
            current: VideoFrame::empty(),
            draining: false,
            exhausted: false,
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn advance(&mut self) -> Advance {
        loop {
            if self.exhausted {
                return Advance::Exhausted;
            }

            if self.decoder.receive_frame(&mut self.current).is_ok() {
                return Advance::Frame;
            }

            if self.draining {
                self.exhausted = true;
                continue;
            }

            let next_packet = self
                .input_context
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            match next_packet {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        return Advance::Skipped(FramegrabError::VideoDecodeError(
                            error.to_string(),
                        ));
                    }
                }
                None => {
                    // Flush frames still buffered in the decoder.
                    self.draining = true;
                    if let Err(error) = self.decoder.send_eof() {
                        log::warn!("Failed to flush video decoder: {error}");
                        self.exhausted = true;
                    }
                }
            }
        }
    }

    fn copy_current(&self, index: u64) -> Result<DecodedFrame, FramegrabError> {
        DecodedFrame::copy_from(&self.current, index)
    }
}
