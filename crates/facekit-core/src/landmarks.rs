//! 68-point facial landmark net.
//!
//! Runs on the detector's face crop (padded to a centered square) and
//! predicts 68 points as fractions of the square input.

use crate::model::{self, ModelError};
use crate::preprocess::{self, Layout, Letterbox, Normalization, Padding};
use crate::types::{BoundingBox, Point};
use image::{Rgb, RgbImage};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// File name of the landmark weights inside the weights directory.
pub const LANDMARK_WEIGHTS: &str = "face_landmark_68.onnx";

pub const LANDMARK_COUNT: usize = 68;
const LANDMARK_INPUT_SIZE: u32 = 112;
const LANDMARK_NORM: Normalization = Normalization::new([122.782, 117.001, 104.298], 255.0);

pub struct LandmarkNet {
    session: Session,
}

impl LandmarkNet {
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let session = model::load_session(model_path, "landmark68")?;
        Ok(Self { session })
    }

    /// Predict the 68 landmarks of the face inside `face` (source coordinates).
    pub fn detect(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Vec<Point>, ModelError> {
        let (face_crop, origin) = preprocess::crop(image, face).ok_or(ModelError::EmptyRegion)?;
        let (boxed, letterbox) =
            preprocess::letterbox(&face_crop, LANDMARK_INPUT_SIZE, Padding::Centered, Rgb([0, 0, 0]));
        let input = preprocess::to_tensor(&boxed, LANDMARK_NORM, Layout::Nhwc);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("landmark extraction: {e}")))?;

        decode_landmarks(raw, &letterbox, origin)
    }
}

/// Map `[x0, y0, x1, y1, ...]` fractions of the input square back to source coordinates.
fn decode_landmarks(raw: &[f32], letterbox: &Letterbox, origin: Point) -> Result<Vec<Point>, ModelError> {
    if raw.len() != LANDMARK_COUNT * 2 {
        return Err(ModelError::InferenceFailed(format!(
            "expected {} landmark values, got {}",
            LANDMARK_COUNT * 2,
            raw.len()
        )));
    }

    let size = LANDMARK_INPUT_SIZE as f32;
    Ok(raw
        .chunks_exact(2)
        .map(|xy| {
            let (x, y) = letterbox.to_source(xy[0] * size, xy[1] * size);
            Point::new(x + origin.x, y + origin.y)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_landmarks_maps_to_source() {
        // A 56x112 crop at (10, 20) is scaled by 1.0 and centered with 28px padding.
        let lb = Letterbox { scale: 1.0, pad_x: 28.0, pad_y: 0.0 };
        let mut raw = vec![0.5f32; LANDMARK_COUNT * 2];
        raw[0] = 0.25; // x of first point → 28px in input → 0 in crop
        raw[1] = 0.0;

        let pts = decode_landmarks(&raw, &lb, Point::new(10.0, 20.0)).unwrap();
        assert_eq!(pts.len(), LANDMARK_COUNT);
        assert_eq!(pts[0], Point::new(10.0, 20.0));
        assert_eq!(pts[1], Point::new(10.0 + 28.0, 20.0 + 56.0));
    }

    #[test]
    fn test_decode_landmarks_rejects_wrong_length() {
        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let err = decode_landmarks(&[0.0; 10], &lb, Point::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ModelError::InferenceFailed(_)));
    }
}
