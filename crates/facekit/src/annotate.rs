//! Drawing detection boxes and text labels onto a copy of the input image.
//!
//! Text is rendered with the TrueType font from the weights directory, which
//! has to cover CJK for the gender and unmatched labels.

use crate::error::FaceKitError;
use crate::record::{FaceRecord, MatchResult, MATCH_THRESHOLD};
use ab_glyph::{FontArc, PxScale};
use facekit_core::{BoundingBox, Point};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

/// Label drawn for faces without a match.
pub const UNMATCHED_LABEL: &str = "未匹配";

const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const BOX_LINE_WIDTH: i32 = 2;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 128]);
const FONT_SIZE: f32 = 16.0;
const TEXT_PADDING: u32 = 4;
const JPEG_QUALITY: u8 = 90;

/// Produces canvases sharing one annotation font.
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
}

impl Annotator {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// Load the annotation font. A missing file is a load failure like a missing model.
    pub fn from_font_file(path: &Path) -> Result<Self, FaceKitError> {
        if !path.is_file() {
            return Err(FaceKitError::load(path, "annotation font not found"));
        }
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| FaceKitError::Font(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "loaded annotation font");
        Ok(Self::new(font))
    }

    /// Start a canvas from a copy of `image`.
    pub fn canvas(&self, image: &RgbImage) -> Canvas {
        Canvas {
            image: DynamicImage::ImageRgb8(image.clone()).to_rgba8(),
            font: self.font.clone(),
        }
    }

    /// Canvas with numbered detection boxes and age/gender fields.
    pub fn draw_detections(&self, image: &RgbImage, faces: &[FaceRecord]) -> Canvas {
        let mut canvas = self.canvas(image);
        for (i, face) in faces.iter().enumerate() {
            canvas.draw_box(&face.detection.bbox, Some(&detection_label(i, face.detection.score)));
        }
        for face in faces {
            canvas.draw_text_field(&attribute_lines(face), face.detection.bbox.bottom_left(), TEXT_BACKGROUND);
        }
        canvas
    }

    /// Canvas with match labels and age/gender fields.
    pub fn draw_matches(&self, image: &RgbImage, matches: &[MatchResult]) -> Canvas {
        let mut canvas = self.canvas(image);
        for m in matches {
            let bbox = &m.detection.detection.bbox;
            canvas.draw_box(bbox, Some(&match_label(m)));
            canvas.draw_text_field(&attribute_lines(&m.detection), bbox.bottom_left(), TEXT_BACKGROUND);
        }
        canvas
    }
}

/// An annotated copy of an input image; encodes to JPEG on demand.
#[derive(Clone)]
pub struct Canvas {
    image: RgbaImage,
    font: FontArc,
}

impl Canvas {
    /// Draw a box outline, with `label` in a filled field above its top-left corner.
    pub fn draw_box(&mut self, bbox: &BoundingBox, label: Option<&str>) {
        let x = bbox.x.round() as i32;
        let y = bbox.y.round() as i32;
        let w = bbox.width.round() as i32;
        let h = bbox.height.round() as i32;

        for i in 0..BOX_LINE_WIDTH {
            let (rw, rh) = (w - 2 * i, h - 2 * i);
            if rw < 1 || rh < 1 {
                break;
            }
            let rect = Rect::at(x + i, y + i).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(&mut self.image, rect, BOX_COLOR);
        }

        if let Some(label) = label {
            let lines = [label.to_string()];
            let field_height = field_size(&self.font, &lines).1 as f32;
            let anchor = Point::new(bbox.x, bbox.y - field_height);
            self.draw_text_field(&lines, anchor, BOX_COLOR);
        }
    }

    /// Draw `lines` on a filled background with its top-left corner at `anchor`.
    pub fn draw_text_field(&mut self, lines: &[String], anchor: Point, background: Rgba<u8>) {
        if lines.is_empty() {
            return;
        }

        let (width, height) = field_size(&self.font, lines);
        let max_y = self.image.height().saturating_sub(height) as f32;
        let x = anchor.x.round().max(0.0) as i32;
        let y = anchor.y.min(max_y).round().max(0.0) as i32;

        fill_blended(&mut self.image, x, y, width, height, background);

        let scale = PxScale::from(FONT_SIZE);
        let line_height = FONT_SIZE.ceil() as i32;
        for (i, line) in lines.iter().enumerate() {
            let ty = y + TEXT_PADDING as i32 + i as i32 * line_height;
            draw_text_mut(&mut self.image, TEXT_COLOR, x + TEXT_PADDING as i32, ty, scale, &self.font, line);
        }
    }

    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.image.clone()).to_rgb8()
    }

    /// Encode the canvas as JPEG.
    pub fn jpeg_buffer(&self) -> Result<Vec<u8>, FaceKitError> {
        let rgb = self.to_rgb();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
        Ok(buf)
    }
}

fn field_size(font: &FontArc, lines: &[String]) -> (u32, u32) {
    let scale = PxScale::from(FONT_SIZE);
    let text_width = lines.iter().map(|l| text_size(scale, font, l).0).max().unwrap_or(0);
    let text_height = FONT_SIZE.ceil() as u32 * lines.len() as u32;
    (text_width + 2 * TEXT_PADDING, text_height + 2 * TEXT_PADDING)
}

/// Alpha-blend `color` over a rectangle, clipped to the image.
fn fill_blended(image: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
    let alpha = color[3] as f32 / 255.0;
    let x_end = (x + width as i32).min(image.width() as i32);
    let y_end = (y + height as i32).min(image.height() as i32);

    for py in y.max(0)..y_end {
        for px in x.max(0)..x_end {
            let pixel = image.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                pixel[c] = (pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha).round() as u8;
            }
        }
    }
}

/// `#1 (0.98)` style label for the n-th detection.
pub(crate) fn detection_label(index: usize, score: f32) -> String {
    format!("#{} ({score:.2})", index + 1)
}

/// Age and gender lines shown under each face.
pub(crate) fn attribute_lines(face: &FaceRecord) -> Vec<String> {
    vec![
        format!("{} years", face.age.round() as i64),
        format!("{} ({}%)", face.gender_label(), (face.gender_confidence * 100.0).round() as i64),
    ]
}

/// Matched label with its similarity percentage, or the unmatched marker.
///
/// Strictly below the threshold only: a face at exactly 0.5 keeps its label
/// in the result record but is drawn as unmatched.
pub(crate) fn match_label(m: &MatchResult) -> String {
    if m.distance < MATCH_THRESHOLD {
        format!("{} ({:.2}%)", m.matched_label, (1.0 - m.distance) * 100.0)
    } else {
        UNMATCHED_LABEL.to_string()
    }
}
