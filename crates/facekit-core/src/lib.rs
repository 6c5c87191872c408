//! facekit-core — Face detection, landmarks, attributes and descriptors.
//!
//! Wraps pretrained detector, 68-point landmark, age/gender and recognition
//! networks running via ONNX Runtime, plus the Euclidean descriptor matcher.

pub mod age_gender;
pub mod alignment;
pub mod detector;
pub mod landmarks;
pub mod matcher;
pub mod model;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use age_gender::AgeGenderNet;
pub use detector::{DetectionNetwork, FaceDetector, UnknownNetwork};
pub use landmarks::LandmarkNet;
pub use matcher::{Matcher, MeanEuclideanMatcher};
pub use model::ModelError;
pub use recognizer::FaceRecognizer;
pub use types::{
    AgeGender, BestMatch, BoundingBox, Descriptor, FaceDetection, Gender, LabeledDescriptors, Point,
    DESCRIPTOR_DIM,
};
