use crate::error::FaceKitError;
use facekit_core::age_gender::AGE_GENDER_WEIGHTS;
use facekit_core::landmarks::LANDMARK_WEIGHTS;
use facekit_core::recognizer::RECOGNITION_WEIGHTS;
use facekit_core::DetectionNetwork;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum detector score reported as a face unless overridden.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Name of the weights directory, resolved next to the running executable.
pub const WEIGHTS_DIR_NAME: &str = "weights";

/// Optional TrueType font for annotation text, inside the weights directory.
pub const FONT_FILE: &str = "font.ttf";

/// Options applied when the models are prepared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareOptions {
    /// Detector network to load (default: SSD MobileNet v1).
    pub detection_network: DetectionNetwork,
    /// Minimum detector score, in (0, 1] (default: 0.5).
    pub min_confidence: f32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            detection_network: DetectionNetwork::default(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl PrepareOptions {
    pub fn new(detection_network: DetectionNetwork, min_confidence: f32) -> Result<Self, FaceKitError> {
        let options = Self {
            detection_network,
            min_confidence,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), FaceKitError> {
        if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
            return Err(FaceKitError::InvalidArgument(format!(
                "min_confidence must be in (0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// The fixed weights directory: `weights/` next to the running executable.
pub fn default_weights_dir() -> Result<PathBuf, FaceKitError> {
    let exe = std::env::current_exe().map_err(|e| FaceKitError::load(WEIGHTS_DIR_NAME, e))?;
    let dir = exe.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    Ok(dir.join(WEIGHTS_DIR_NAME))
}

/// What a network is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRole {
    Detector,
    Landmarks,
    AgeGender,
    Recognition,
}

/// A network known to this build and the weights file it loads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub name: &'static str,
    pub role: NetworkRole,
    pub weights_file: &'static str,
}

/// Every network this build can load.
pub fn available_networks() -> Vec<NetworkInfo> {
    let detectors = DetectionNetwork::ALL.into_iter().map(|n| NetworkInfo {
        name: n.name(),
        role: NetworkRole::Detector,
        weights_file: n.weights_file(),
    });

    detectors
        .chain([
            NetworkInfo {
                name: "face_landmark_68",
                role: NetworkRole::Landmarks,
                weights_file: LANDMARK_WEIGHTS,
            },
            NetworkInfo {
                name: "age_gender",
                role: NetworkRole::AgeGender,
                weights_file: AGE_GENDER_WEIGHTS,
            },
            NetworkInfo {
                name: "face_recognition",
                role: NetworkRole::Recognition,
                weights_file: RECOGNITION_WEIGHTS,
            },
        ])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = PrepareOptions::default();
        assert_eq!(o.detection_network, DetectionNetwork::SsdMobilenetV1);
        assert_eq!(o.min_confidence, 0.5);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(PrepareOptions::new(DetectionNetwork::Scrfd, 0.7).is_ok());
        assert!(PrepareOptions::new(DetectionNetwork::Scrfd, 0.0).is_err());
        assert!(PrepareOptions::new(DetectionNetwork::Scrfd, 1.5).is_err());
        assert!(PrepareOptions::new(DetectionNetwork::Scrfd, f32::NAN).is_err());
    }

    #[test]
    fn test_partial_options_fill_defaults() {
        let o: PrepareOptions = serde_json::from_str(r#"{"detection_network":"tiny_face_detector"}"#).unwrap();
        assert_eq!(o.detection_network, DetectionNetwork::TinyFaceDetector);
        assert_eq!(o.min_confidence, DEFAULT_MIN_CONFIDENCE);
    }

    #[test]
    fn test_available_networks() {
        let nets = available_networks();
        assert_eq!(nets.len(), 6);
        assert_eq!(nets.iter().filter(|n| n.role == NetworkRole::Detector).count(), 3);
        assert!(nets.iter().any(|n| n.weights_file == RECOGNITION_WEIGHTS));
    }

    #[test]
    fn test_weights_dir_next_to_exe() {
        let dir = default_weights_dir().unwrap();
        assert!(dir.ends_with(WEIGHTS_DIR_NAME));
    }
}
