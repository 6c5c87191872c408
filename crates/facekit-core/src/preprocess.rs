//! Image → tensor preprocessing shared by all networks.
//!
//! Every net takes a square input. Frames are resized to fit (aspect ratio
//! kept), padded, then normalized per channel into a float tensor.

use crate::types::{BoundingBox, Point};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point in network input space back to the source frame.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Where the resized frame sits inside the square input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Pad evenly on both sides of the short dimension.
    Centered,
    /// Frame at the origin, padding on the right/bottom.
    TopLeft,
}

/// Tensor memory layout expected by a network's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Nchw,
    Nhwc,
}

/// Per-channel `(pixel - mean) / scale` normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub scale: f32,
}

impl Normalization {
    pub const fn new(mean: [f32; 3], scale: f32) -> Self {
        Self { mean, scale }
    }

    fn apply(&self, channel: usize, value: u8) -> f32 {
        (value as f32 - self.mean[channel]) / self.scale
    }
}

/// Resize `image` to fit a `size`×`size` square and pad the remainder with `fill`.
pub fn letterbox(image: &RgbImage, size: u32, padding: Padding, fill: Rgb<u8>) -> (RgbImage, Letterbox) {
    let (width, height) = image.dimensions();
    let mut canvas = RgbImage::from_pixel(size, size, fill);

    if width == 0 || height == 0 {
        return (canvas, Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 });
    }

    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    let (pad_x, pad_y) = match padding {
        Padding::Centered => ((size - new_w) / 2, (size - new_h) / 2),
        Padding::TopLeft => (0, 0),
    };

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Convert an RGB image into a normalized batch-of-one float tensor.
pub fn to_tensor(image: &RgbImage, norm: Normalization, layout: Layout) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut tensor = match layout {
        Layout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
        Layout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
    };

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = norm.apply(c, pixel[c]);
            match layout {
                Layout::Nchw => tensor[[0, c, y, x]] = v,
                Layout::Nhwc => tensor[[0, y, x, c]] = v,
            }
        }
    }

    tensor
}

/// Cut `region` out of `image`, clipped to the image bounds.
///
/// Returns the crop and its top-left corner in source coordinates, or `None`
/// when nothing of the region lies inside the image.
pub fn crop(image: &RgbImage, region: &BoundingBox) -> Option<(RgbImage, Point)> {
    let clipped = region.clip(image.width(), image.height());
    let x = clipped.x.floor() as u32;
    let y = clipped.y.floor() as u32;
    let w = (clipped.right().ceil() as u32).min(image.width()).saturating_sub(x);
    let h = (clipped.bottom().ceil() as u32).min(image.height()).saturating_sub(y);
    if w == 0 || h == 0 {
        return None;
    }

    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    Some((cropped, Point::new(x as f32, y as f32)))
}
