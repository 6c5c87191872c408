//! Face alignment from 68-point landmarks.
//!
//! The age/gender and recognition nets expect a crop around the landmarks
//! rather than the raw detector box: the tight landmark bounding box,
//! padded by a fixed fraction of its size and clipped to the frame.

use crate::preprocess;
use crate::types::{BoundingBox, Point};
use image::RgbImage;

/// Total padding added to the landmark box, as a fraction of its size.
const ALIGNMENT_PADDING: f32 = 0.2;

/// Compute the aligned face box for a set of landmarks inside a `width`×`height` frame.
pub fn aligned_box(landmarks: &[Point], width: u32, height: u32) -> Option<BoundingBox> {
    let tight = BoundingBox::enclosing(landmarks)?;
    let aligned = tight
        .pad(tight.width * ALIGNMENT_PADDING, tight.height * ALIGNMENT_PADDING)
        .clip(width, height);
    (aligned.area() > 0.0).then_some(aligned)
}

/// Crop the aligned face out of `image`.
pub fn extract_aligned(image: &RgbImage, aligned: &BoundingBox) -> Option<RgbImage> {
    preprocess::crop(image, aligned).map(|(face, _)| face)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_box_pads_landmarks() {
        let pts = [Point::new(40.0, 40.0), Point::new(60.0, 40.0), Point::new(50.0, 90.0)];
        let b = aligned_box(&pts, 200, 200).unwrap();
        // tight box 20x50 → padded by 4x10
        assert_eq!(b, BoundingBox::new(38.0, 35.0, 24.0, 60.0));
    }

    #[test]
    fn test_aligned_box_clipped_to_frame() {
        let pts = [Point::new(0.0, 0.0), Point::new(100.0, 100.0)];
        let b = aligned_box(&pts, 100, 100).unwrap();
        assert_eq!(b, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_aligned_box_degenerate() {
        assert!(aligned_box(&[], 100, 100).is_none());
        let single = [Point::new(10.0, 10.0)];
        assert!(aligned_box(&single, 100, 100).is_none());
    }

    #[test]
    fn test_extract_aligned_size() {
        let img = RgbImage::new(100, 100);
        let face = extract_aligned(&img, &BoundingBox::new(10.0, 20.0, 30.0, 40.0)).unwrap();
        assert_eq!(face.dimensions(), (30, 40));
    }
}
