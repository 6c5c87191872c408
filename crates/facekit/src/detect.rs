use crate::annotate::{Annotator, Canvas};
use crate::engine::FaceAnalyzer;
use crate::error::{require_path, FaceKitError};
use crate::loader;
use crate::record::{FaceRecord, FaceSummary};
use image::RgbImage;
use std::path::Path;

/// Faces found in one image, with the annotated rendering.
pub struct Detections {
    pub raw: Vec<FaceRecord>,
    pub summaries: Vec<FaceSummary>,
    canvas: Canvas,
}

impl Detections {
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Annotated image as JPEG.
    pub fn jpeg_buffer(&self) -> Result<Vec<u8>, FaceKitError> {
        self.canvas.jpeg_buffer()
    }
}

/// Detect and describe every face in the image at `image_path`.
///
/// Prepares the models with default options on first use. An image without
/// faces yields empty lists and an unannotated rendering.
pub fn detect_faces(image_path: impl AsRef<Path>) -> Result<Detections, FaceKitError> {
    let path = image_path.as_ref();
    require_path(path, "imagePath")?;

    let prepared = loader::prepared()?;
    let mut api = prepared.api();
    detect_faces_with(&mut *api, prepared.annotator(), path)
}

/// [`detect_faces`] against an explicit analyzer and annotator.
pub fn detect_faces_with<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    annotator: &Annotator,
    image_path: &Path,
) -> Result<Detections, FaceKitError> {
    require_path(image_path, "imagePath")?;

    let image = load_image(image_path)?;
    let raw = analyzer.detect_all(&image)?;
    tracing::debug!(path = %image_path.display(), faces = raw.len(), "detected faces");

    let summaries = raw.iter().map(FaceSummary::from).collect();
    let canvas = annotator.draw_detections(&image, &raw);

    Ok(Detections { raw, summaries, canvas })
}

pub(crate) fn load_image(path: &Path) -> Result<RgbImage, FaceKitError> {
    Ok(image::open(path)?.to_rgb8())
}
