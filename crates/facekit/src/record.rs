//! Result records returned to callers.

use facekit_core::{BestMatch, BoundingBox, Descriptor, FaceDetection, Gender, Point};
use serde::{Deserialize, Serialize};

/// Distance above which a face is reported as unmatched.
pub const MATCH_THRESHOLD: f32 = 0.5;

/// Distance reported for unmatched faces.
pub const UNMATCHED_DISTANCE: f32 = 1.0;

/// Localized display name of a gender string: "male" → "男", "female" → "女", else "未知".
pub fn translate_gender(gender: Option<&str>) -> &'static str {
    match gender {
        Some("male") => "男",
        Some("female") => "女",
        _ => "未知",
    }
}

/// Everything known about one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceRecord {
    pub detection: FaceDetection,
    /// 68 facial landmarks in source image coordinates.
    pub landmarks: Vec<Point>,
    /// Crop used for age/gender and the descriptor.
    pub aligned_box: BoundingBox,
    pub age: f32,
    pub gender: Gender,
    pub gender_confidence: f32,
    pub descriptor: Descriptor,
}

impl FaceRecord {
    pub fn gender_label(&self) -> &'static str {
        translate_gender(Some(self.gender.as_str()))
    }
}

/// Simplified per-face view of [`FaceRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSummary {
    pub gender: Gender,
    pub gender_label: String,
    #[serde(rename = "genderProbability")]
    pub gender_confidence: f32,
    pub age: f32,
}

impl From<&FaceRecord> for FaceSummary {
    fn from(face: &FaceRecord) -> Self {
        Self {
            gender: face.gender,
            gender_label: face.gender_label().to_string(),
            gender_confidence: face.gender_confidence,
            age: face.age,
        }
    }
}

/// A detected face and the label it was matched to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub detection: FaceRecord,
    /// Matched label; empty when the nearest label is farther than [`MATCH_THRESHOLD`].
    pub matched_label: String,
    /// Distance to the matched label; [`UNMATCHED_DISTANCE`] when unmatched.
    pub distance: f32,
    /// The true nearest label and distance, kept even when unmatched.
    pub nearest: BestMatch,
}

impl MatchResult {
    /// Apply the match threshold to the nearest label of `face`.
    pub fn from_nearest(face: FaceRecord, nearest: BestMatch) -> Self {
        // Negated so a NaN distance counts as unmatched.
        let (matched_label, distance) = if !(nearest.distance <= MATCH_THRESHOLD) {
            (String::new(), UNMATCHED_DISTANCE)
        } else {
            (nearest.label.clone(), nearest.distance)
        };

        Self {
            detection: face,
            matched_label,
            distance,
            nearest,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.distance <= MATCH_THRESHOLD
    }
}

/// Simplified per-face view of [`MatchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub label: String,
    pub best_match_distance: f32,
    pub nearest_label: String,
    pub nearest_distance: f32,
}

impl From<&MatchResult> for MatchSummary {
    fn from(m: &MatchResult) -> Self {
        Self {
            label: m.matched_label.clone(),
            best_match_distance: m.distance,
            nearest_label: m.nearest.label.clone(),
            nearest_distance: m.nearest.distance,
        }
    }
}
