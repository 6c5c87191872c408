use crate::types::{BestMatch, Descriptor, LabeledDescriptors};

/// Strategy for finding the nearest labeled identity for a probe descriptor.
pub trait Matcher {
    /// Nearest label and its distance, or `None` when no label has descriptors.
    fn best_match(&self, probe: &Descriptor, gallery: &[LabeledDescriptors]) -> Option<BestMatch>;
}

/// Euclidean matcher scoring each label by the mean distance to its descriptors.
///
/// Labels without descriptors are skipped. On equal distances the label
/// that comes first in the gallery wins.
pub struct MeanEuclideanMatcher;

impl MeanEuclideanMatcher {
    /// Mean Euclidean distance from `probe` to every descriptor of `set`.
    pub fn mean_distance(probe: &Descriptor, set: &LabeledDescriptors) -> Option<f32> {
        if set.descriptors.is_empty() {
            return None;
        }
        let total: f32 = set.descriptors.iter().map(|d| probe.euclidean_distance(d)).sum();
        Some(total / set.descriptors.len() as f32)
    }
}

impl Matcher for MeanEuclideanMatcher {
    fn best_match(&self, probe: &Descriptor, gallery: &[LabeledDescriptors]) -> Option<BestMatch> {
        let mut best: Option<(usize, f32)> = None;

        for (i, set) in gallery.iter().enumerate() {
            let Some(distance) = Self::mean_distance(probe, set) else {
                continue;
            };
            // Strict comparison keeps the first label on ties.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        best.map(|(idx, distance)| BestMatch {
            label: gallery[idx].label.clone(),
            distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(values: &[f32]) -> Descriptor {
        Descriptor::new(values.to_vec())
    }

    #[test]
    fn test_best_match_picks_nearest() {
        let probe = d(&[1.0, 0.0, 0.0]);
        let gallery = vec![
            LabeledDescriptors::new("decoy1", vec![d(&[0.0, 1.0, 0.0])]),
            LabeledDescriptors::new("decoy2", vec![d(&[0.0, 0.0, 1.0])]),
            LabeledDescriptors::new("match", vec![d(&[1.0, 0.0, 0.0])]),
        ];

        let best = MeanEuclideanMatcher.best_match(&probe, &gallery).unwrap();
        assert_eq!(best.label, "match");
        assert_eq!(best.distance, 0.0);
    }

    #[test]
    fn test_label_distance_is_mean() {
        let probe = d(&[0.0, 0.0]);
        let set = LabeledDescriptors::new("a", vec![d(&[0.2, 0.0]), d(&[0.0, 0.6])]);
        let mean = MeanEuclideanMatcher::mean_distance(&probe, &set).unwrap();
        assert!((mean - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_first_label() {
        let probe = d(&[0.0, 0.0]);
        let gallery = vec![
            LabeledDescriptors::new("first", vec![d(&[0.3, 0.0])]),
            LabeledDescriptors::new("second", vec![d(&[0.0, 0.3])]),
        ];
        let best = MeanEuclideanMatcher.best_match(&probe, &gallery).unwrap();
        assert_eq!(best.label, "first");
    }

    #[test]
    fn test_empty_sets_skipped() {
        let probe = d(&[0.0, 0.0]);
        let gallery = vec![
            LabeledDescriptors::new("empty", vec![]),
            LabeledDescriptors::new("far", vec![d(&[3.0, 4.0])]),
        ];
        let best = MeanEuclideanMatcher.best_match(&probe, &gallery).unwrap();
        assert_eq!(best.label, "far");
        assert!((best.distance - 5.0).abs() < 1e-6);

        assert!(MeanEuclideanMatcher.best_match(&probe, &[]).is_none());
        assert!(MeanEuclideanMatcher
            .best_match(&probe, &[LabeledDescriptors::new("empty", vec![])])
            .is_none());
    }
}
