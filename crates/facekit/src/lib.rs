//! facekit — Face detection, age/gender annotation and recognition on image files.
//!
//! Models are loaded once per process from the `weights/` directory next to
//! the executable, either explicitly via [`prepare`] or lazily by the first
//! operation. Every operation also has a `*_with` form that runs against a
//! caller-supplied [`FaceAnalyzer`] and [`Annotator`].

pub mod annotate;
pub mod config;
pub mod descriptors;
pub mod detect;
pub mod engine;
pub mod error;
pub mod loader;
pub mod record;
pub mod recognize;

#[cfg(test)]
mod testing;

pub use annotate::{Annotator, Canvas, UNMATCHED_LABEL};
pub use config::{available_networks, NetworkInfo, NetworkRole, PrepareOptions};
pub use descriptors::{
    build_descriptors, build_descriptors_with, DescriptorReport, FaceEntry, ReferenceReport, ReferenceStatus,
};
pub use detect::{detect_faces, detect_faces_with, Detections};
pub use engine::{FaceAnalyzer, FaceApi};
pub use error::FaceKitError;
pub use loader::{prepare, Prepared};
pub use record::{
    translate_gender, FaceRecord, FaceSummary, MatchResult, MatchSummary, MATCH_THRESHOLD, UNMATCHED_DISTANCE,
};
pub use recognize::{recognize, recognize_with, Recognition};

pub use facekit_core::{
    BestMatch, BoundingBox, Descriptor, DetectionNetwork, FaceDetection, Gender, LabeledDescriptors, Point,
    DESCRIPTOR_DIM,
};
