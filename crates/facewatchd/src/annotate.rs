//! Frame annotation and live view.

use ab_glyph::FontVec;
use facewatch_core::{BoundingBox, Frame, PixelRect, UNKNOWN_LABEL};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BORDER_PX: u32 = 2;
const LABEL_HEIGHT_PX: u32 = 16;
const LABEL_SCALE: f32 = 14.0;
const LABEL_PADDING_PX: u32 = 2;

/// Fonts tried, in order, when no label font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
];

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("cannot write preview {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("cannot replace preview {path}: {source}")]
    Rename {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read font {path}: {source}")]
    FontRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not a usable font: {source}")]
    FontParse {
        path: PathBuf,
        source: ab_glyph::InvalidFont,
    },
}

/// Load a TrueType/OpenType font for label text.
pub fn read_font(path: &Path) -> Result<FontVec, ViewError> {
    let bytes = std::fs::read(path)
        .map_err(|source| ViewError::FontRead { path: path.to_path_buf(), source })?;
    FontVec::try_from_vec(bytes)
        .map_err(|source| ViewError::FontParse { path: path.to_path_buf(), source })
}

/// The configured label font, else the first installed system font.
///
/// `None` when nothing loads; labels are then drawn as plain colored tabs.
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = configured {
        match read_font(path) {
            Ok(font) => return Some(font),
            Err(e) => tracing::warn!(error = %e, "configured label font unusable"),
        }
    }

    let found = SYSTEM_FONTS.iter().map(Path::new).find_map(|path| read_font(path).ok());
    if found.is_none() {
        tracing::warn!("no label font found; set label_font to draw names");
    }
    found
}

/// A labelled face region to draw on a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub label: String,
}

impl Annotation {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Copy of `frame` with a box and a name tab around every annotated face.
///
/// Boxes are clamped to the frame; a box entirely outside it is not drawn.
/// The tab sits on top of the box, or just inside it when the box touches
/// the top edge. Without a font the tab is drawn without text.
pub fn annotate(frame: &Frame, annotations: &[Annotation], font: Option<&FontVec>) -> RgbImage {
    let mut canvas = frame.image.clone();
    for annotation in annotations {
        let Some(rect) = annotation.bbox.pixel_rect(frame.width(), frame.height()) else {
            continue;
        };
        let color = if annotation.is_unknown() { UNKNOWN_COLOR } else { KNOWN_COLOR };

        for inset in 0..BORDER_PX {
            let w = rect.width.saturating_sub(2 * inset);
            let h = rect.height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let outline = Rect::at((rect.x + inset) as i32, (rect.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, outline, color);
        }

        draw_label(&mut canvas, &rect, &annotation.label, color, font);
    }
    canvas
}

fn draw_label(
    canvas: &mut RgbImage,
    rect: &PixelRect,
    label: &str,
    color: Rgb<u8>,
    font: Option<&FontVec>,
) {
    let (frame_width, frame_height) = canvas.dimensions();

    let wanted = match font {
        Some(font) => text_size(LABEL_SCALE, font, label).0 + 2 * LABEL_PADDING_PX,
        None => rect.width,
    };
    let top = rect.y.checked_sub(LABEL_HEIGHT_PX).unwrap_or(rect.y);
    let width = wanted.min(frame_width - rect.x);
    let height = LABEL_HEIGHT_PX.min(frame_height - top);
    if width == 0 || height == 0 {
        return;
    }

    let tab = Rect::at(rect.x as i32, top as i32).of_size(width, height);
    draw_filled_rect_mut(canvas, tab, color);

    if let Some(font) = font {
        let x = (rect.x + LABEL_PADDING_PX) as i32;
        let y = (top + 1) as i32;
        draw_text_mut(canvas, LABEL_TEXT_COLOR, x, y, LABEL_SCALE, font, label);
    }
}

/// Where annotated frames go.
pub trait FrameView {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), ViewError>;
}

impl<V: FrameView + ?Sized> FrameView for Box<V> {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), ViewError> {
        (**self).show(frame, annotations)
    }
}

/// No display; labels are traced at `debug`.
#[derive(Debug, Default)]
pub struct Headless;

impl FrameView for Headless {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), ViewError> {
        if !annotations.is_empty() {
            let labels: Vec<&str> = annotations.iter().map(|a| a.label.as_str()).collect();
            tracing::debug!(frame = frame.sequence, ?labels, "faces in frame");
        }
        Ok(())
    }
}

/// Rewrites one annotated JPEG per frame, for an external viewer to poll.
///
/// The image is written beside the target and renamed over it, so readers
/// never see a partial file.
pub struct PreviewFile {
    path: PathBuf,
    staging: PathBuf,
    font: Option<FontVec>,
}

impl PreviewFile {
    pub fn new(path: &Path, font: Option<FontVec>) -> Self {
        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        Self { path: path.to_path_buf(), staging: PathBuf::from(staging), font }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameView for PreviewFile {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), ViewError> {
        annotate(frame, annotations, self.font.as_ref())
            .save_with_format(&self.staging, ImageFormat::Jpeg)
            .map_err(|source| ViewError::Write { path: self.staging.clone(), source })?;
        std::fs::rename(&self.staging, &self.path)
            .map_err(|source| ViewError::Rename { path: self.path.clone(), source })
    }
}
