use crate::detect::load_image;
use crate::engine::FaceAnalyzer;
use crate::error::FaceKitError;
use crate::loader;
use facekit_core::{Descriptor, LabeledDescriptors, DESCRIPTOR_DIM};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One identity to describe: reference images and/or known descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceEntry {
    pub label: String,
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
}

impl FaceEntry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.image_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_descriptors(mut self, descriptors: impl IntoIterator<Item = Descriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }
}

/// Outcome for one reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStatus {
    /// A face was found and its descriptor added.
    Described,
    /// No face was found; the image contributed nothing.
    NoFace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceReport {
    pub label: String,
    pub image_path: PathBuf,
    pub status: ReferenceStatus,
}

/// Labeled descriptor sets (same order as the input entries) plus per-image outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorReport {
    pub sets: Vec<LabeledDescriptors>,
    pub references: Vec<ReferenceReport>,
}

impl DescriptorReport {
    /// Reference images in which no face was found.
    pub fn missing(&self) -> impl Iterator<Item = &ReferenceReport> {
        self.references.iter().filter(|r| r.status == ReferenceStatus::NoFace)
    }
}

/// Build one labeled descriptor set per entry.
///
/// Each reference image contributes the descriptor of its highest-scoring
/// face; image descriptors come first, then the entry's precomputed ones.
pub fn build_descriptors(entries: &[FaceEntry]) -> Result<DescriptorReport, FaceKitError> {
    validate_entries(entries)?;
    let needs_models = entries.iter().any(|e| !e.image_paths.is_empty());
    if !needs_models {
        return build_descriptors_with(&mut NoImages, entries);
    }

    let prepared = loader::prepared()?;
    let mut api = prepared.api();
    build_descriptors_with(&mut *api, entries)
}

/// [`build_descriptors`] against an explicit analyzer.
pub fn build_descriptors_with<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    entries: &[FaceEntry],
) -> Result<DescriptorReport, FaceKitError> {
    validate_entries(entries)?;

    let mut sets = Vec::with_capacity(entries.len());
    let mut references = Vec::new();

    for entry in entries {
        let mut descriptors = Vec::with_capacity(entry.image_paths.len() + entry.descriptors.len());

        for path in &entry.image_paths {
            let image = load_image(path)?;
            let status = match analyzer.detect_single(&image)? {
                Some(face) => {
                    descriptors.push(face.descriptor);
                    ReferenceStatus::Described
                }
                None => {
                    tracing::warn!(label = %entry.label, path = %path.display(), "no face found in reference image");
                    ReferenceStatus::NoFace
                }
            };
            references.push(ReferenceReport {
                label: entry.label.clone(),
                image_path: path.clone(),
                status,
            });
        }

        descriptors.extend(entry.descriptors.iter().cloned());
        tracing::debug!(label = %entry.label, descriptors = descriptors.len(), "built labeled descriptors");
        sets.push(LabeledDescriptors::new(entry.label.clone(), descriptors));
    }

    Ok(DescriptorReport { sets, references })
}

fn validate_entries(entries: &[FaceEntry]) -> Result<(), FaceKitError> {
    for entry in entries {
        if let Some(bad) = entry.descriptors.iter().find(|d| !d.has_model_dim()) {
            return Err(FaceKitError::InvalidArgument(format!(
                "descriptor for label {:?} has {} values, expected {DESCRIPTOR_DIM}",
                entry.label,
                bad.len()
            )));
        }
        if entry.image_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(FaceKitError::InvalidArgument(format!(
                "empty image path for label {:?}",
                entry.label
            )));
        }
    }
    Ok(())
}

/// Analyzer for entries that only carry precomputed descriptors.
struct NoImages;

impl FaceAnalyzer for NoImages {
    fn detect_all(&mut self, _image: &image::RgbImage) -> Result<Vec<crate::record::FaceRecord>, FaceKitError> {
        Ok(Vec::new())
    }
}
