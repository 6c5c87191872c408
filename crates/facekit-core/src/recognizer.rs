//! Face recognition net via ONNX Runtime.
//!
//! Extracts 128-dimensional face descriptors from aligned face crops.
//! Descriptors are compared by Euclidean distance; same-person pairs
//! typically land below 0.6.

use crate::model::{self, ModelError};
use crate::preprocess::{self, Layout, Normalization, Padding};
use crate::types::{Descriptor, DESCRIPTOR_DIM};
use image::{Rgb, RgbImage};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// File name of the recognition weights inside the weights directory.
pub const RECOGNITION_WEIGHTS: &str = "face_recognition.onnx";

const RECOGNITION_INPUT_SIZE: u32 = 150;
const RECOGNITION_NORM: Normalization = Normalization::new([122.782, 117.001, 104.298], 256.0);

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the recognition model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let session = model::load_session(model_path, "recognition")?;
        Ok(Self { session })
    }

    /// Extract a descriptor from an aligned face crop.
    pub fn extract(&mut self, face: &RgbImage) -> Result<Descriptor, ModelError> {
        let (boxed, _) = preprocess::letterbox(face, RECOGNITION_INPUT_SIZE, Padding::Centered, Rgb([0, 0, 0]));
        let input = preprocess::to_tensor(&boxed, RECOGNITION_NORM, Layout::Nhwc);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("descriptor extraction: {e}")))?;

        if raw.len() != DESCRIPTOR_DIM {
            return Err(ModelError::InferenceFailed(format!(
                "expected {DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        Ok(Descriptor::new(raw.to_vec()))
    }
}
