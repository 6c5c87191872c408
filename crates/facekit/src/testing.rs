//! Test fixtures: a scripted analyzer, a bundled font and on-disk PNG images.

use crate::annotate::Annotator;
use crate::engine::FaceAnalyzer;
use crate::error::FaceKitError;
use crate::record::FaceRecord;
use ab_glyph::FontArc;
use facekit_core::{BoundingBox, Descriptor, FaceDetection, Gender, Point, DESCRIPTOR_DIM};
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A face whose descriptor is `fill` in every dimension.
pub(crate) fn face_record(fill: f32) -> FaceRecord {
    face_with_descriptor(Descriptor::new(vec![fill; DESCRIPTOR_DIM]))
}

pub(crate) fn face_with_descriptor(descriptor: Descriptor) -> FaceRecord {
    FaceRecord {
        detection: FaceDetection {
            bbox: BoundingBox::new(4.0, 4.0, 16.0, 16.0),
            score: 0.9,
        },
        landmarks: vec![Point::new(8.0, 8.0), Point::new(16.0, 16.0)],
        aligned_box: BoundingBox::new(6.0, 6.0, 12.0, 12.0),
        age: 30.0,
        gender: Gender::Male,
        gender_confidence: 0.9,
        descriptor,
    }
}

/// Descriptor that is zero except for `value` in the first dimension.
pub(crate) fn offset_descriptor(value: f32) -> Descriptor {
    let mut values = vec![0.0; DESCRIPTOR_DIM];
    values[0] = value;
    Descriptor::new(values)
}

/// Analyzer returning scripted faces keyed by image width.
pub(crate) struct FakeAnalyzer {
    by_width: HashMap<u32, Vec<FaceRecord>>,
    fallback: Vec<FaceRecord>,
    pub(crate) calls: usize,
}

impl FakeAnalyzer {
    /// Same faces for every image.
    pub(crate) fn always(faces: Vec<FaceRecord>) -> Self {
        Self {
            by_width: HashMap::new(),
            fallback: faces,
            calls: 0,
        }
    }

    /// Faces chosen by the width of the analyzed image; other widths have none.
    pub(crate) fn by_width(entries: impl IntoIterator<Item = (u32, Vec<FaceRecord>)>) -> Self {
        Self {
            by_width: entries.into_iter().collect(),
            fallback: Vec::new(),
            calls: 0,
        }
    }
}

impl FaceAnalyzer for FakeAnalyzer {
    fn detect_all(&mut self, image: &RgbImage) -> Result<Vec<FaceRecord>, FaceKitError> {
        self.calls += 1;
        Ok(self
            .by_width
            .get(&image.width())
            .unwrap_or(&self.fallback)
            .clone())
    }
}

/// Annotator using the font checked in under `testdata/`.
pub(crate) fn test_annotator() -> Annotator {
    let font = FontArc::try_from_slice(include_bytes!("../testdata/DejaVuSansMono.ttf")).unwrap();
    Annotator::new(font)
}

/// Write a solid PNG of the given size into `dir` and return its path.
pub(crate) fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb([120, 110, 100]))
        .save(&path)
        .unwrap();
    path
}
