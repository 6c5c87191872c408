//! The full per-face pipeline: detect → landmarks → align → age/gender → descriptor.

use crate::config::PrepareOptions;
use crate::error::FaceKitError;
use crate::record::FaceRecord;
use facekit_core::age_gender::AGE_GENDER_WEIGHTS;
use facekit_core::landmarks::LANDMARK_WEIGHTS;
use facekit_core::recognizer::RECOGNITION_WEIGHTS;
use facekit_core::{alignment, AgeGenderNet, FaceDetection, FaceDetector, FaceRecognizer, LandmarkNet, ModelError};
use image::RgbImage;
use std::path::Path;

/// Source of face records for an image.
///
/// Implemented by [`FaceApi`] over the loaded models; the operations in this
/// crate are written against the trait.
pub trait FaceAnalyzer {
    /// Every face in the image, in detection order.
    fn detect_all(&mut self, image: &RgbImage) -> Result<Vec<FaceRecord>, FaceKitError>;

    /// The highest-scoring face in the image, if any.
    fn detect_single(&mut self, image: &RgbImage) -> Result<Option<FaceRecord>, FaceKitError> {
        let faces = self.detect_all(image)?;
        Ok(faces.into_iter().reduce(|best, f| {
            if f.detection.score > best.detection.score {
                f
            } else {
                best
            }
        }))
    }
}

/// The four loaded networks plus the detection options they run with.
pub struct FaceApi {
    options: PrepareOptions,
    detector: FaceDetector,
    landmarks: LandmarkNet,
    age_gender: AgeGenderNet,
    recognizer: FaceRecognizer,
}

impl FaceApi {
    /// Load every network from `weights_dir`. Fails fast on the first missing model.
    pub fn load(weights_dir: &Path, options: PrepareOptions) -> Result<Self, FaceKitError> {
        options.validate()?;
        if !weights_dir.is_dir() {
            return Err(FaceKitError::load(weights_dir, "weights directory not found"));
        }

        let network = options.detection_network;
        let detector = load_model(weights_dir, network.weights_file(), |p| FaceDetector::load(p, network))?;
        let landmarks = load_model(weights_dir, LANDMARK_WEIGHTS, LandmarkNet::load)?;
        let age_gender = load_model(weights_dir, AGE_GENDER_WEIGHTS, AgeGenderNet::load)?;
        let recognizer = load_model(weights_dir, RECOGNITION_WEIGHTS, FaceRecognizer::load)?;

        tracing::info!(
            dir = %weights_dir.display(),
            network = %network,
            min_confidence = options.min_confidence,
            "face models loaded"
        );

        Ok(Self {
            options,
            detector,
            landmarks,
            age_gender,
            recognizer,
        })
    }

    fn describe(&mut self, image: &RgbImage, detection: FaceDetection) -> Result<FaceRecord, ModelError> {
        let landmarks = self.landmarks.detect(image, &detection.bbox)?;
        let aligned_box = alignment::aligned_box(&landmarks, image.width(), image.height())
            .ok_or(ModelError::EmptyRegion)?;
        let face = alignment::extract_aligned(image, &aligned_box).ok_or(ModelError::EmptyRegion)?;

        let attributes = self.age_gender.predict(&face)?;
        let descriptor = self.recognizer.extract(&face)?;

        Ok(FaceRecord {
            detection,
            landmarks,
            aligned_box,
            age: attributes.age,
            gender: attributes.gender,
            gender_confidence: attributes.probability,
            descriptor,
        })
    }
}

impl FaceAnalyzer for FaceApi {
    fn detect_all(&mut self, image: &RgbImage) -> Result<Vec<FaceRecord>, FaceKitError> {
        let detections = self.detector.detect(image, self.options.min_confidence)?;
        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            if let Some(face) = skip_empty_region(detection, self.describe(image, detection))? {
                faces.push(face);
            }
        }
        Ok(faces)
    }

    fn detect_single(&mut self, image: &RgbImage) -> Result<Option<FaceRecord>, FaceKitError> {
        // Detections come back sorted by score; describe until one has a usable region.
        let detections = self.detector.detect(image, self.options.min_confidence)?;
        for detection in detections {
            if let Some(face) = skip_empty_region(detection, self.describe(image, detection))? {
                return Ok(Some(face));
            }
        }
        Ok(None)
    }
}

/// Drop a detection whose face region has no pixels in the image; other failures propagate.
fn skip_empty_region(
    detection: FaceDetection,
    described: Result<FaceRecord, ModelError>,
) -> Result<Option<FaceRecord>, FaceKitError> {
    match described {
        Ok(face) => Ok(Some(face)),
        Err(ModelError::EmptyRegion) => {
            tracing::warn!(bbox = ?detection.bbox, score = detection.score, "skipping detection outside the image");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load one network, reporting any failure as a load failure for its file.
fn load_model<T>(
    dir: &Path,
    file: &str,
    load: impl FnOnce(&Path) -> Result<T, ModelError>,
) -> Result<T, FaceKitError> {
    let path = dir.join(file);
    load(&path).map_err(|e| FaceKitError::load(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face_record, FakeAnalyzer};

    #[test]
    fn test_load_missing_dir() {
        let err = FaceApi::load(Path::new("/nonexistent/weights"), PrepareOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, FaceKitError::LoadFailure { .. }));
    }

    #[test]
    fn test_load_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FaceApi::load(dir.path(), PrepareOptions::default()).err().unwrap();
        match err {
            FaceKitError::LoadFailure { path, .. } => assert!(path.ends_with("ssd_mobilenetv1.onnx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_invalid_options() {
        let mut options = PrepareOptions::default();
        options.min_confidence = 2.0;
        let err = FaceApi::load(Path::new("/nonexistent"), options).err().unwrap();
        assert!(matches!(err, FaceKitError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_region_skips_only_that_face() {
        let face = face_record(0.1);
        let detection = face.detection;

        let kept = skip_empty_region(detection, Ok(face.clone())).unwrap();
        assert_eq!(kept, Some(face));

        assert_eq!(skip_empty_region(detection, Err(ModelError::EmptyRegion)).unwrap(), None);

        let err = skip_empty_region(detection, Err(ModelError::InferenceFailed("bad shape".into())))
            .err()
            .unwrap();
        assert!(matches!(err, FaceKitError::Inference(_)));
    }

    #[test]
    fn test_default_detect_single_picks_best_score() {
        let mut low = face_record(0.1);
        low.detection.score = 0.6;
        let mut high = face_record(0.2);
        high.detection.score = 0.95;
        let mut analyzer = FakeAnalyzer::always(vec![low, high.clone()]);

        let best = analyzer.detect_single(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(best, Some(high));
    }
}
