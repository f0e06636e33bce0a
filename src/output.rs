//! Writing frames to disk.
//!
//! [`OutputTemplate`] turns a frame index into a file path using a
//! printf-style placeholder (`frame_%04d.png`). [`FrameWriter`] is the
//! stock [`FrameSink`]: it converts each frame to RGB24 and encodes it as
//! PNG, JPEG or BMP, or in fast mode dumps the decoder's planes unchanged.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{ImageFormat, RgbImage};

use crate::{error::FramegrabError, frame::DecodedFrame};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Index { width: usize },
}

/// A file name pattern with at most one frame-index placeholder.
///
/// Supported placeholders are `%d` and zero-padded `%0Nd`; `%%` is a literal
/// percent sign.
///
/// ```
/// use framegrab::OutputTemplate;
///
/// let template = OutputTemplate::parse("out/frame_%04d.png").unwrap();
/// assert_eq!(template.render(42).to_str(), Some("out/frame_0042.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl OutputTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::InvalidTemplate`] for an empty pattern, an
    /// unsupported `%` sequence, or more than one placeholder.
    pub fn parse(pattern: &str) -> Result<Self, FramegrabError> {
        if pattern.is_empty() {
            return Err(FramegrabError::InvalidTemplate(
                "output pattern is empty".to_string(),
            ));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut characters = pattern.chars().peekable();

        while let Some(character) = characters.next() {
            if character != '%' {
                literal.push(character);
                continue;
            }

            let mut digits = String::new();
            while let Some(&digit) = characters.peek().filter(|c| c.is_ascii_digit()) {
                digits.push(digit);
                characters.next();
            }

            match characters.next() {
                Some('%') if digits.is_empty() => literal.push('%'),
                Some('d') if digits.is_empty() || digits.starts_with('0') => {
                    let width = if digits.is_empty() {
                        0
                    } else {
                        digits.parse().map_err(|_| {
                            FramegrabError::InvalidTemplate(format!(
                                "padding width %{digits}d is too large"
                            ))
                        })?
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Index { width });
                }
                other => {
                    let sequence = other.map(String::from).unwrap_or_default();
                    return Err(FramegrabError::InvalidTemplate(format!(
                        "unsupported sequence %{digits}{sequence} in {pattern:?}"
                    )));
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self {
            pattern: pattern.to_string(),
            segments,
        };
        if template.placeholder_count() > 1 {
            return Err(FramegrabError::InvalidTemplate(format!(
                "{pattern:?} has more than one frame placeholder"
            )));
        }
        Ok(template)
    }

    /// Returns `true` if the template contains a frame-index placeholder.
    pub fn has_placeholder(&self) -> bool {
        self.placeholder_count() > 0
    }

    fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Index { .. }))
            .count()
    }

    /// Substitute `index` into the template.
    pub fn render(&self, index: u64) -> PathBuf {
        let mut rendered = String::with_capacity(self.pattern.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Index { width } => {
                    rendered.push_str(&format!("{index:0width$}"));
                }
            }
        }
        PathBuf::from(rendered)
    }

    /// The pattern as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if the placeholder sits in a directory component.
    fn varies_parent(&self) -> bool {
        self.render(0).parent() != self.render(1).parent()
    }
}

impl Display for OutputTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.pattern)
    }
}

/// Image encoding for saved frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// Baseline JPEG.
    Jpeg,
    /// Uncompressed Windows bitmap.
    Bmp,
}

impl OutputFormat {
    /// Extension appended to paths that do not already carry one.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Bmp => "bmp",
        }
    }

    fn accepts_extension(self, extension: &str) -> bool {
        match self {
            OutputFormat::Png => extension.eq_ignore_ascii_case("png"),
            OutputFormat::Jpeg => {
                extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg")
            }
            OutputFormat::Bmp => extension.eq_ignore_ascii_case("bmp"),
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "bmp" => Ok(OutputFormat::Bmp),
            other => Err(format!("unknown image format '{other}' (expected png, jpg or bmp)")),
        }
    }
}

/// How frame pixels reach the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Convert to RGB24 and encode with the configured [`OutputFormat`].
    #[default]
    Encoded,
    /// Write the decoder's planes back-to-back without conversion
    /// (`.yuv` files).
    Raw,
}

/// Extension used for raw plane dumps.
pub const RAW_EXTENSION: &str = "yuv";

/// Destination for frames leaving the queue.
///
/// Called concurrently from every worker thread.
pub trait FrameSink: Sync {
    /// Persist one frame and return the path written.
    ///
    /// # Errors
    ///
    /// Any error is recorded against this frame only.
    fn persist(&self, frame: DecodedFrame) -> Result<PathBuf, FramegrabError>;
}

/// Writes frames to paths produced by an [`OutputTemplate`].
#[derive(Debug, Clone)]
pub struct FrameWriter {
    template: OutputTemplate,
    format: OutputFormat,
    mode: SaveMode,
}

impl FrameWriter {
    /// Prepare a writer for a run that will save `selected` frames.
    ///
    /// Creates the output directory when the template names a fixed one.
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::InvalidTemplate`] if the template has no
    /// placeholder but more than one frame is selected, and
    /// [`FramegrabError::IoError`] if the output directory cannot be created.
    pub fn new(
        template: OutputTemplate,
        format: OutputFormat,
        mode: SaveMode,
        selected: u64,
    ) -> Result<Self, FramegrabError> {
        if !template.has_placeholder() && selected > 1 {
            return Err(FramegrabError::InvalidTemplate(format!(
                "{template} has no frame placeholder but {selected} frames are selected"
            )));
        }

        if !template.varies_parent() {
            if let Some(parent) = template.render(0).parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            template,
            format,
            mode,
        })
    }

    /// Path the frame with decode index `index` is written to.
    pub fn path_for(&self, index: u64) -> PathBuf {
        let path = self.template.render(index);
        let (accepted, extension) = match self.mode {
            SaveMode::Raw => (
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(RAW_EXTENSION)),
                RAW_EXTENSION,
            ),
            SaveMode::Encoded => (
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| self.format.accepts_extension(ext)),
                self.format.extension(),
            ),
        };
        if accepted {
            return path;
        }

        let mut with_extension = path.into_os_string();
        with_extension.push(".");
        with_extension.push(extension);
        PathBuf::from(with_extension)
    }

    /// Template in use.
    pub fn template(&self) -> &OutputTemplate {
        &self.template
    }

    /// Save mode in use.
    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    fn write_raw(&self, frame: &DecodedFrame, path: &Path) -> Result<(), FramegrabError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for plane in frame.planes() {
            writer.write_all(plane.data())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_encoded(&self, frame: DecodedFrame, path: &Path) -> Result<(), FramegrabError> {
        let index = frame.index();
        let (width, height) = (frame.width(), frame.height());
        let buffer = rgb_buffer(frame)?;
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            FramegrabError::FrameConversion {
                frame_index: index,
                reason: "RGB buffer does not match the frame dimensions".to_string(),
            }
        })?;
        image.save_with_format(path, self.format.image_format())?;
        Ok(())
    }
}

impl FrameSink for FrameWriter {
    fn persist(&self, frame: DecodedFrame) -> Result<PathBuf, FramegrabError> {
        let path = self.path_for(frame.index());
        if self.template.varies_parent() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        match self.mode {
            SaveMode::Raw => self.write_raw(&frame, &path)?,
            SaveMode::Encoded => self.write_encoded(frame, &path)?,
        }

        log::debug!("Saved frame to {}", path.display());
        Ok(path)
    }
}

/// Tightly packed RGB24 pixels of `frame`.
///
/// RGB24 input is passed through; anything else goes through the software
/// scaler.
pub(crate) fn rgb_buffer(frame: DecodedFrame) -> Result<Vec<u8>, FramegrabError> {
    let index = frame.index();
    let (width, height) = (frame.width(), frame.height());

    if frame.format() == Pixel::RGB24 && frame.planes().len() == 1 {
        return Ok(frame.planes()[0].data().to_vec());
    }

    let conversion_error = |error: ffmpeg_next::Error| FramegrabError::FrameConversion {
        frame_index: index,
        reason: error.to_string(),
    };

    let source = frame.to_video_frame()?;
    let mut scaler = ScalingContext::get(
        frame.format(),
        width,
        height,
        Pixel::RGB24,
        width,
        height,
        ScalingFlags::BILINEAR,
    )
    .map_err(conversion_error)?;

    let mut rgb_frame = VideoFrame::empty();
    scaler.run(&source, &mut rgb_frame).map_err(conversion_error)?;

    Ok(crate::utilities::pack_rows(
        rgb_frame.data(0),
        rgb_frame.stride(0),
        width as usize * 3,
        height as usize,
    ))
}
