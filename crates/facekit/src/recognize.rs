use crate::annotate::{Annotator, Canvas};
use crate::detect::load_image;
use crate::engine::FaceAnalyzer;
use crate::error::{require_path, FaceKitError};
use crate::loader;
use crate::record::{MatchResult, MatchSummary};
use facekit_core::{LabeledDescriptors, Matcher, MeanEuclideanMatcher, DESCRIPTOR_DIM};
use std::path::Path;

/// Faces in a query image matched against labeled descriptor sets.
pub struct Recognition {
    pub raw: Vec<MatchResult>,
    pub summaries: Vec<MatchSummary>,
    canvas: Canvas,
}

impl Recognition {
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Annotated image as JPEG.
    pub fn jpeg_buffer(&self) -> Result<Vec<u8>, FaceKitError> {
        self.canvas.jpeg_buffer()
    }
}

/// Match every face in the query image against `sets`.
///
/// A face whose nearest label is farther than the match threshold comes back
/// with an empty label and distance 1.0; the nearest label is still reported.
pub fn recognize(sets: &[LabeledDescriptors], query_image_path: impl AsRef<Path>) -> Result<Recognition, FaceKitError> {
    let path = query_image_path.as_ref();
    require_path(path, "queryImagePath")?;
    validate_sets(sets)?;

    let prepared = loader::prepared()?;
    let mut api = prepared.api();
    recognize_with(&mut *api, prepared.annotator(), sets, path)
}

/// [`recognize`] against an explicit analyzer and annotator.
pub fn recognize_with<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    annotator: &Annotator,
    sets: &[LabeledDescriptors],
    query_image_path: &Path,
) -> Result<Recognition, FaceKitError> {
    require_path(query_image_path, "queryImagePath")?;
    validate_sets(sets)?;

    let image = load_image(query_image_path)?;
    let faces = analyzer.detect_all(&image)?;

    let matcher = MeanEuclideanMatcher;
    let mut raw = Vec::with_capacity(faces.len());
    for face in faces {
        // validate_sets guarantees a non-empty set, so a nearest label exists.
        let nearest = matcher
            .best_match(&face.descriptor, sets)
            .ok_or_else(|| FaceKitError::InvalidArgument("no labeled descriptors".into()))?;
        let result = MatchResult::from_nearest(face, nearest);
        tracing::debug!(
            label = %result.matched_label,
            distance = result.distance,
            nearest = %result.nearest.label,
            "matched face"
        );
        raw.push(result);
    }

    let summaries = raw.iter().map(MatchSummary::from).collect();
    let canvas = annotator.draw_matches(&image, &raw);

    Ok(Recognition { raw, summaries, canvas })
}

fn validate_sets(sets: &[LabeledDescriptors]) -> Result<(), FaceKitError> {
    if sets.is_empty() {
        return Err(FaceKitError::InvalidArgument("please input labeled descriptors".into()));
    }
    if sets.iter().all(|s| s.descriptors.is_empty()) {
        return Err(FaceKitError::InvalidArgument(
            "labeled descriptors contain no descriptors".into(),
        ));
    }
    for set in sets {
        if let Some(bad) = set.descriptors.iter().find(|d| !d.has_model_dim()) {
            return Err(FaceKitError::InvalidArgument(format!(
                "descriptor for label {:?} has {} values, expected {DESCRIPTOR_DIM}",
                set.label,
                bad.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face_with_descriptor, offset_descriptor, test_annotator, write_png, FakeAnalyzer};
    use facekit_core::Descriptor;

    fn probe_at(value: f32) -> FakeAnalyzer {
        FakeAnalyzer::always(vec![face_with_descriptor(offset_descriptor(value))])
    }

    fn run(analyzer: &mut FakeAnalyzer, sets: &[LabeledDescriptors]) -> Result<Recognition, FaceKitError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "query.png", 48, 48);
        recognize_with(analyzer, &test_annotator(), sets, &path)
    }

    #[test]
    fn test_identical_descriptor_matches() {
        let sets = vec![
            LabeledDescriptors::new("alice", vec![offset_descriptor(0.0)]),
            LabeledDescriptors::new("bob", vec![offset_descriptor(2.0)]),
        ];
        let out = run(&mut probe_at(0.0), &sets).unwrap();

        assert_eq!(out.raw.len(), 1);
        assert_eq!(out.summaries[0].label, "alice");
        assert_eq!(out.summaries[0].best_match_distance, 0.0);
    }

    #[test]
    fn test_far_face_is_unmatched() {
        let sets = vec![LabeledDescriptors::new("alice", vec![offset_descriptor(0.6)])];
        let out = run(&mut probe_at(0.0), &sets).unwrap();

        let s = &out.summaries[0];
        assert_eq!(s.label, "");
        assert_eq!(s.best_match_distance, 1.0);
        assert_eq!(s.nearest_label, "alice");
        assert!((s.nearest_distance - 0.6).abs() < 1e-6);
        assert!(!out.jpeg_buffer().unwrap().is_empty());
    }

    #[test]
    fn test_mean_distance_decides() {
        // alice: mean of 0.1 and 0.9 = 0.5; bob: single 0.45.
        let sets = vec![
            LabeledDescriptors::new("alice", vec![offset_descriptor(0.1), offset_descriptor(0.9)]),
            LabeledDescriptors::new("bob", vec![offset_descriptor(0.45)]),
        ];
        let out = run(&mut probe_at(0.0), &sets).unwrap();
        assert_eq!(out.summaries[0].label, "bob");
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let sets = vec![
            LabeledDescriptors::new("first", vec![offset_descriptor(0.3)]),
            LabeledDescriptors::new("second", vec![offset_descriptor(-0.3)]),
        ];
        let out = run(&mut probe_at(0.0), &sets).unwrap();
        assert_eq!(out.summaries[0].label, "first");
    }

    #[test]
    fn test_empty_sets_are_skipped() {
        let sets = vec![
            LabeledDescriptors::new("nobody", vec![]),
            LabeledDescriptors::new("carol", vec![offset_descriptor(0.2)]),
        ];
        let out = run(&mut probe_at(0.0), &sets).unwrap();
        assert_eq!(out.summaries[0].label, "carol");
    }

    #[test]
    fn test_no_faces_in_query() {
        let sets = vec![LabeledDescriptors::new("alice", vec![offset_descriptor(0.0)])];
        let out = run(&mut FakeAnalyzer::always(vec![]), &sets).unwrap();
        assert!(out.raw.is_empty());
        assert!(out.summaries.is_empty());
    }

    #[test]
    fn test_rejects_missing_gallery() {
        let mut analyzer = probe_at(0.0);
        for sets in [vec![], vec![LabeledDescriptors::new("a", vec![])]] {
            let err = run(&mut analyzer, &sets).err().unwrap();
            assert!(matches!(err, FaceKitError::InvalidArgument(_)));
        }
        assert_eq!(analyzer.calls, 0);
    }

    #[test]
    fn test_rejects_wrong_descriptor_length() {
        let sets = vec![LabeledDescriptors::new("a", vec![Descriptor::new(vec![0.0; 4])])];
        let err = run(&mut probe_at(0.0), &sets).err().unwrap();
        assert!(matches!(err, FaceKitError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_empty_query_path() {
        let sets = vec![LabeledDescriptors::new("a", vec![offset_descriptor(0.0)])];
        let err = recognize(&sets, "").err().unwrap();
        assert!(matches!(err, FaceKitError::InvalidArgument(_)));
    }
}
