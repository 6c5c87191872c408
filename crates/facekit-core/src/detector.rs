//! Face detector networks via ONNX Runtime.
//!
//! Three detectors are supported, all decoding into [`FaceDetection`] boxes
//! in source image coordinates followed by Non-Maximum Suppression:
//!
//! * SSD MobileNet v1 — graph emits decoded boxes and scores (default),
//! * Tiny face detector — YOLOv2-style grid with five anchors,
//! * SCRFD — 3-stride anchor-free decoding.

use crate::model::{self, ModelError};
use crate::preprocess::{self, Layout, Letterbox, Normalization, Padding};
use crate::types::{BoundingBox, FaceDetection};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const PAD_FILL: Rgb<u8> = Rgb([0, 0, 0]);

// --- SSD MobileNet v1 ---
const SSD_INPUT_SIZE: u32 = 512;
const SSD_NORM: Normalization = Normalization::new([127.5, 127.5, 127.5], 127.5);
const SSD_NMS_THRESHOLD: f32 = 0.5;
const SSD_MAX_RESULTS: usize = 100;

// --- Tiny face detector ---
const TINY_INPUT_SIZE: u32 = 416;
const TINY_NORM: Normalization = Normalization::new([117.001, 114.697, 97.404], 256.0);
const TINY_NMS_THRESHOLD: f32 = 0.4;
const TINY_BOX_VALUES: usize = 5;
/// Anchor (width, height) in grid cells.
const TINY_ANCHORS: [(f32, f32); 5] = [
    (1.603231, 2.094468),
    (6.041143, 7.080126),
    (2.882459, 3.518061),
    (4.266906, 5.178857),
    (9.041765, 10.66308),
];

// --- SCRFD ---
const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_NORM: Normalization = Normalization::new([127.5, 127.5, 127.5], 128.0);
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// Detector networks this build can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetectionNetwork {
    #[default]
    #[serde(rename = "ssd_mobilenetv1")]
    SsdMobilenetV1,
    #[serde(rename = "tiny_face_detector")]
    TinyFaceDetector,
    #[serde(rename = "scrfd")]
    Scrfd,
}

impl DetectionNetwork {
    pub const ALL: [DetectionNetwork; 3] = [
        DetectionNetwork::SsdMobilenetV1,
        DetectionNetwork::TinyFaceDetector,
        DetectionNetwork::Scrfd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectionNetwork::SsdMobilenetV1 => "ssd_mobilenetv1",
            DetectionNetwork::TinyFaceDetector => "tiny_face_detector",
            DetectionNetwork::Scrfd => "scrfd",
        }
    }

    /// File name of the network's weights inside the weights directory.
    pub fn weights_file(&self) -> &'static str {
        match self {
            DetectionNetwork::SsdMobilenetV1 => "ssd_mobilenetv1.onnx",
            DetectionNetwork::TinyFaceDetector => "tiny_face_detector.onnx",
            DetectionNetwork::Scrfd => "scrfd_10g.onnx",
        }
    }

    pub fn input_size(&self) -> u32 {
        match self {
            DetectionNetwork::SsdMobilenetV1 => SSD_INPUT_SIZE,
            DetectionNetwork::TinyFaceDetector => TINY_INPUT_SIZE,
            DetectionNetwork::Scrfd => SCRFD_INPUT_SIZE,
        }
    }
}

impl fmt::Display for DetectionNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown detection network: {0} (expected one of ssd_mobilenetv1, tiny_face_detector, scrfd)")]
pub struct UnknownNetwork(pub String);

impl FromStr for DetectionNetwork {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectionNetwork::ALL
            .into_iter()
            .find(|n| n.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

/// Output tensor indices for one SCRFD stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// Where each network keeps the tensors we decode.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputMapping {
    Ssd { boxes: usize, scores: usize },
    Tiny,
    Scrfd([StrideOutputIndices; 3]),
}

/// Face detector wrapping one of the supported networks.
pub struct FaceDetector {
    session: Session,
    network: DetectionNetwork,
    outputs: OutputMapping,
}

impl FaceDetector {
    /// Load a detector model from the given path.
    pub fn load(model_path: &Path, network: DetectionNetwork) -> Result<Self, ModelError> {
        let session = model::load_session(model_path, network.name())?;
        let names = model::output_names(&session);

        let outputs = match network {
            DetectionNetwork::SsdMobilenetV1 => {
                if names.len() < 2 {
                    return Err(ModelError::InferenceFailed(format!(
                        "SSD model requires box and score outputs, got {}",
                        names.len()
                    )));
                }
                discover_ssd_outputs(&names)
            }
            DetectionNetwork::TinyFaceDetector => {
                if names.is_empty() {
                    return Err(ModelError::InferenceFailed("tiny face detector has no outputs".into()));
                }
                OutputMapping::Tiny
            }
            DetectionNetwork::Scrfd => {
                if names.len() < 6 {
                    return Err(ModelError::InferenceFailed(format!(
                        "SCRFD model requires 6 outputs (3 strides × score/bbox), got {}",
                        names.len()
                    )));
                }
                OutputMapping::Scrfd(discover_scrfd_outputs(&names))
            }
        };
        tracing::debug!(network = %network, ?outputs, "detector output tensor mapping");

        Ok(Self {
            session,
            network,
            outputs,
        })
    }

    /// Detect faces in an RGB frame, returning boxes sorted by descending score.
    pub fn detect(&mut self, image: &RgbImage, min_confidence: f32) -> Result<Vec<FaceDetection>, ModelError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let size = self.network.input_size();
        let mapping = self.outputs;
        let (input, letterbox) = Self::preprocess(image, self.network);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut result = match mapping {
            OutputMapping::Ssd { boxes, scores } => {
                let (_, box_data) = outputs[boxes]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ModelError::InferenceFailed(format!("ssd boxes: {e}")))?;
                let (_, score_data) = outputs[scores]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ModelError::InferenceFailed(format!("ssd scores: {e}")))?;
                let dets = decode_ssd(box_data, score_data, size, &letterbox, min_confidence);
                nms(dets, SSD_NMS_THRESHOLD, SSD_MAX_RESULTS)
            }
            OutputMapping::Tiny => {
                let (_, grid) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ModelError::InferenceFailed(format!("tiny grid: {e}")))?;
                let dets = decode_tiny(grid, size, &letterbox, min_confidence)?;
                nms(dets, TINY_NMS_THRESHOLD, usize::MAX)
            }
            OutputMapping::Scrfd(stride_indices) => {
                let mut all_detections = Vec::new();
                for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
                    let (score_idx, bbox_idx) = stride_indices[stride_pos];
                    let (_, scores) = outputs[score_idx]
                        .try_extract_tensor::<f32>()
                        .map_err(|e| ModelError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
                    let (_, bboxes) = outputs[bbox_idx]
                        .try_extract_tensor::<f32>()
                        .map_err(|e| ModelError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
                    all_detections.extend(decode_stride(
                        scores,
                        bboxes,
                        stride,
                        size as usize,
                        &letterbox,
                        min_confidence,
                    ));
                }
                nms(all_detections, SCRFD_NMS_THRESHOLD, usize::MAX)
            }
        };

        result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        tracing::debug!(network = %self.network, faces = result.len(), "detection finished");
        Ok(result)
    }

    fn preprocess(image: &RgbImage, network: DetectionNetwork) -> (Array4<f32>, Letterbox) {
        let (padding, norm, layout) = match network {
            DetectionNetwork::SsdMobilenetV1 => (Padding::TopLeft, SSD_NORM, Layout::Nhwc),
            DetectionNetwork::TinyFaceDetector => (Padding::TopLeft, TINY_NORM, Layout::Nhwc),
            DetectionNetwork::Scrfd => (Padding::Centered, SCRFD_NORM, Layout::Nchw),
        };
        let (boxed, letterbox) = preprocess::letterbox(image, network.input_size(), padding, PAD_FILL);
        (preprocess::to_tensor(&boxed, norm, layout), letterbox)
    }
}

/// Find the SSD box/score outputs by name, falling back to positional [boxes, scores].
fn discover_ssd_outputs(names: &[String]) -> OutputMapping {
    match (model::find_output(names, "box"), model::find_output(names, "score")) {
        (Some(boxes), Some(scores)) => OutputMapping::Ssd { boxes, scores },
        _ => {
            tracing::info!(?names, "SSD: output names not recognized, using positional mapping [0]=boxes, [1]=scores");
            OutputMapping::Ssd { boxes: 0, scores: 1 }
        }
    }
}

/// Discover SCRFD output tensor ordering by name.
///
/// Named exports use "score_8", "bbox_16", ...; generic exports fall back to
/// the standard positional ordering [0-2] = scores, [3-5] = bboxes.
fn discover_scrfd_outputs(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match named {
        Some(indices) => {
            tracing::info!("SCRFD: using name-based output tensor mapping");
            [indices[0], indices[1], indices[2]]
        }
        None => {
            tracing::info!(
                ?names,
                "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
            );
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode SSD output: boxes are `[ymin, xmin, ymax, xmax]` relative to the input square.
fn decode_ssd(
    boxes: &[f32],
    scores: &[f32],
    input_size: u32,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceDetection> {
    let size = input_size as f32;
    let count = scores.len().min(boxes.len() / 4);

    let mut detections = Vec::new();
    for (i, &score) in scores.iter().take(count).enumerate() {
        if score <= threshold {
            continue;
        }
        let b = &boxes[i * 4..i * 4 + 4];
        let (x1, y1) = letterbox.to_source(b[1].clamp(0.0, 1.0) * size, b[0].clamp(0.0, 1.0) * size);
        let (x2, y2) = letterbox.to_source(b[3].clamp(0.0, 1.0) * size, b[2].clamp(0.0, 1.0) * size);
        detections.push(FaceDetection {
            bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
            score,
        });
    }
    detections
}

/// Decode the tiny detector's `[grid, grid, anchors × 5]` output.
fn decode_tiny(
    raw: &[f32],
    input_size: u32,
    letterbox: &Letterbox,
    threshold: f32,
) -> Result<Vec<FaceDetection>, ModelError> {
    let per_cell = TINY_ANCHORS.len() * TINY_BOX_VALUES;
    let grid = ((raw.len() / per_cell) as f32).sqrt().round() as usize;
    if grid == 0 || grid * grid * per_cell != raw.len() {
        return Err(ModelError::InferenceFailed(format!(
            "tiny face detector output of length {} is not a square grid of {per_cell}-value cells",
            raw.len()
        )));
    }

    let cell = input_size as f32 / grid as f32;
    let mut detections = Vec::new();

    for row in 0..grid {
        for col in 0..grid {
            for (a, &(anchor_w, anchor_h)) in TINY_ANCHORS.iter().enumerate() {
                let off = ((row * grid + col) * TINY_ANCHORS.len() + a) * TINY_BOX_VALUES;
                let score = model::sigmoid(raw[off + 4]);
                if score <= threshold {
                    continue;
                }

                let cx = (col as f32 + model::sigmoid(raw[off])) * cell;
                let cy = (row as f32 + model::sigmoid(raw[off + 1])) * cell;
                let w = raw[off + 2].exp() * anchor_w * cell;
                let h = raw[off + 3].exp() * anchor_h * cell;

                let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
                let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
                detections.push(FaceDetection {
                    bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
                    score,
                });
            }
        }
    }

    Ok(detections)
}

/// Decode SCRFD detections for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceDetection> {
    let grid = input_size / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid * stride) as f32;
        let anchor_cy = (anchor_idx / grid * stride) as f32;

        // [x1_offset, y1_offset, x2_offset, y2_offset] * stride
        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let s = stride as f32;
        let (x1, y1) = letterbox.to_source(anchor_cx - bboxes[off] * s, anchor_cy - bboxes[off + 1] * s);
        let (x2, y2) = letterbox.to_source(anchor_cx + bboxes[off + 2] * s, anchor_cy + bboxes[off + 3] * s);

        detections.push(FaceDetection {
            bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
            score,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections, keep at most `max_results`.
fn nms(mut detections: Vec<FaceDetection>, iou_threshold: f32, max_results: usize) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if keep.len() >= max_results {
            break;
        }
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i]);

        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i].bbox, &detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union_area = a.area() + b.area() - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: Letterbox = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };

    fn det(x: f32, y: f32, w: f32, h: f32, score: f32) -> FaceDetection {
        FaceDetection {
            bbox: BoundingBox::new(x, y, w, h),
            score,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
        assert!(iou(&a, &BoundingBox::new(20.0, 20.0, 5.0, 5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            det(5.0, 5.0, 100.0, 100.0, 0.8),
            det(0.0, 0.0, 100.0, 100.0, 0.9),
            det(200.0, 200.0, 50.0, 50.0, 0.7),
        ];
        let result = nms(detections, 0.4, usize::MAX);
        assert_eq!(result.len(), 2);
        assert!((result[0].score - 0.9).abs() < 1e-6);
        assert!((result[1].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_max_results() {
        let detections = (0..5).map(|i| det(i as f32 * 50.0, 0.0, 10.0, 10.0, 0.9)).collect();
        assert_eq!(nms(detections, 0.5, 3).len(), 3);
        assert!(nms(vec![], 0.4, 10).is_empty());
    }

    #[test]
    fn test_decode_ssd_filters_and_maps() {
        // Two candidates; only the first clears the threshold.
        let boxes = [0.25, 0.5, 0.75, 1.0, 0.0, 0.0, 0.1, 0.1];
        let scores = [0.9, 0.3];
        let lb = Letterbox { scale: 0.5, pad_x: 0.0, pad_y: 0.0 };
        let dets = decode_ssd(&boxes, &scores, 100, &lb, 0.5);
        assert_eq!(dets.len(), 1);
        // xmin 0.5*100 / 0.5 = 100, ymin 25 / 0.5 = 50
        assert_eq!(dets[0].bbox, BoundingBox::new(100.0, 50.0, 100.0, 100.0));
    }

    #[test]
    fn test_decode_tiny_single_cell() {
        // 1x1 grid: first anchor confident, rest suppressed.
        let mut raw = vec![-20.0f32; TINY_ANCHORS.len() * TINY_BOX_VALUES];
        raw[0] = 0.0; // sigmoid → 0.5 (cell center)
        raw[1] = 0.0;
        raw[2] = 0.0; // exp → 1 × anchor
        raw[3] = 0.0;
        raw[4] = 5.0;
        let dets = decode_tiny(&raw, 416, &IDENTITY, 0.5).unwrap();
        assert_eq!(dets.len(), 1);
        let b = dets[0].bbox;
        let (aw, ah) = TINY_ANCHORS[0];
        assert!((b.width - aw * 416.0).abs() < 1e-2);
        assert!((b.height - ah * 416.0).abs() < 1e-2);
        assert!((b.x + b.width / 2.0 - 208.0).abs() < 1e-2);
    }

    #[test]
    fn test_decode_tiny_rejects_bad_shape() {
        let raw = vec![0.0f32; 7];
        assert!(decode_tiny(&raw, 416, &IDENTITY, 0.5).is_err());
    }

    #[test]
    fn test_decode_stride_anchor_offsets() {
        // 64px input at stride 32 → 2x2 grid, 2 anchors per cell.
        let mut scores = vec![0.0f32; 8];
        scores[2] = 0.9; // cell (row 0, col 1), first anchor
        let mut bboxes = vec![0.0f32; 32];
        bboxes[8..12].copy_from_slice(&[0.5, 0.5, 0.5, 0.5]);
        let dets = decode_stride(&scores, &bboxes, 32, 64, &IDENTITY, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(16.0, -16.0, 32.0, 32.0));
    }

    #[test]
    fn test_discover_scrfd_outputs_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8",
            "bbox_16", "kps_16", "score_16",
            "bbox_32", "kps_32", "score_32",
        ].iter().map(|s| s.to_string()).collect();

        assert_eq!(discover_scrfd_outputs(&names), [(2, 0), (5, 3), (8, 6)]);
    }

    #[test]
    fn test_discover_scrfd_outputs_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_scrfd_outputs(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_ssd_outputs() {
        let named: Vec<String> = ["num_detections", "detection_scores", "detection_boxes"]
            .iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_ssd_outputs(&named), OutputMapping::Ssd { boxes: 2, scores: 1 });

        let generic: Vec<String> = vec!["out0".into(), "out1".into()];
        assert_eq!(discover_ssd_outputs(&generic), OutputMapping::Ssd { boxes: 0, scores: 1 });
    }

    #[test]
    fn test_network_names_roundtrip() {
        for net in DetectionNetwork::ALL {
            assert_eq!(net.name().parse::<DetectionNetwork>().unwrap(), net);
        }
        assert_eq!(DetectionNetwork::default(), DetectionNetwork::SsdMobilenetV1);
        assert!("yolo".parse::<DetectionNetwork>().is_err());
        assert_eq!(DetectionNetwork::Scrfd.weights_file(), "scrfd_10g.onnx");
    }
}
