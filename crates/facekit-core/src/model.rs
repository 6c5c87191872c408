//! Shared ONNX Runtime session plumbing for the face models.

use ort::session::Session;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0} — place the converted weights in the weights directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face region lies outside the image")]
    EmptyRegion,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Open an ONNX session for `model_path`, logging its input/output layout.
pub(crate) fn load_session(model_path: &Path, kind: &str) -> Result<Session, ModelError> {
    if !model_path.is_file() {
        return Err(ModelError::ModelNotFound(model_path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = %model_path.display(),
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded {kind} model"
    );

    Ok(session)
}

pub(crate) fn output_names(session: &Session) -> Vec<String> {
    session.outputs().iter().map(|o| o.name().to_string()).collect()
}

/// Index of the first output whose name contains `needle` (case-insensitive).
pub(crate) fn find_output(names: &[String], needle: &str) -> Option<usize> {
    let needle = needle.to_ascii_lowercase();
    names
        .iter()
        .position(|n| n.to_ascii_lowercase().contains(&needle))
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_output_case_insensitive() {
        let names: Vec<String> = ["Identity:0", "detection_boxes", "Detection_Scores"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(find_output(&names, "boxes"), Some(1));
        assert_eq!(find_output(&names, "scores"), Some(2));
        assert_eq!(find_output(&names, "kps"), None);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[2.0, 1.0, 0.1]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = load_session(Path::new("/nonexistent/model.onnx"), "test").err().unwrap();
        assert!(matches!(err, ModelError::ModelNotFound(_)));
    }
}
