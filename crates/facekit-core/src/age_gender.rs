//! Age and gender estimation on aligned face crops.

use crate::model::{self, ModelError};
use crate::preprocess::{self, Layout, Normalization, Padding};
use crate::types::{AgeGender, Gender};
use image::{Rgb, RgbImage};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// File name of the age/gender weights inside the weights directory.
pub const AGE_GENDER_WEIGHTS: &str = "age_gender.onnx";

const AGE_GENDER_INPUT_SIZE: u32 = 112;
const AGE_GENDER_NORM: Normalization = Normalization::new([122.782, 117.001, 104.298], 255.0);

pub struct AgeGenderNet {
    session: Session,
    age_idx: usize,
    gender_idx: usize,
}

impl AgeGenderNet {
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let session = model::load_session(model_path, "age/gender")?;
        let names = model::output_names(&session);
        if names.len() < 2 {
            return Err(ModelError::InferenceFailed(format!(
                "age/gender model requires age and gender outputs, got {}",
                names.len()
            )));
        }

        let (age_idx, gender_idx) = match (model::find_output(&names, "age"), model::find_output(&names, "gender")) {
            (Some(a), Some(g)) => (a, g),
            _ => {
                tracing::info!(?names, "age/gender: output names not recognized, using positional mapping [0]=age, [1]=gender");
                (0, 1)
            }
        };

        Ok(Self {
            session,
            age_idx,
            gender_idx,
        })
    }

    /// Estimate age and gender for an aligned face crop.
    pub fn predict(&mut self, face: &RgbImage) -> Result<AgeGender, ModelError> {
        let (age_idx, gender_idx) = (self.age_idx, self.gender_idx);
        let (boxed, _) = preprocess::letterbox(face, AGE_GENDER_INPUT_SIZE, Padding::Centered, Rgb([0, 0, 0]));
        let input = preprocess::to_tensor(&boxed, AGE_GENDER_NORM, Layout::Nhwc);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, age) = outputs[age_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("age: {e}")))?;
        let (_, gender) = outputs[gender_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("gender: {e}")))?;

        decode_age_gender(age, gender)
    }
}

/// Turn the raw `age` scalar and `[male, female]` gender output into an estimate.
fn decode_age_gender(age: &[f32], gender: &[f32]) -> Result<AgeGender, ModelError> {
    let age = *age
        .first()
        .ok_or_else(|| ModelError::InferenceFailed("empty age output".into()))?;
    if gender.len() != 2 {
        return Err(ModelError::InferenceFailed(format!(
            "expected 2 gender values, got {}",
            gender.len()
        )));
    }

    let probs = gender_probabilities([gender[0], gender[1]]);
    let prob_male = probs[0];
    let (gender, probability) = if prob_male > 0.5 {
        (Gender::Male, prob_male)
    } else {
        (Gender::Female, 1.0 - prob_male)
    };

    Ok(AgeGender {
        age: age.max(0.0),
        gender,
        probability: probability.clamp(0.0, 1.0),
    })
}

/// Use the output as probabilities when it already is a distribution, else softmax it.
fn gender_probabilities(raw: [f32; 2]) -> [f32; 2] {
    let is_distribution = raw.iter().all(|p| (0.0..=1.0).contains(p)) && (raw[0] + raw[1] - 1.0).abs() < 1e-3;
    if is_distribution {
        raw
    } else {
        let p = model::softmax(&raw);
        [p[0], p[1]]
    }
}
