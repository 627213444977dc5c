//! Nearest-neighbour matching of a query descriptor against detected faces.

use crate::types::Descriptor;

/// Label returned when the closest descriptor is farther than the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Outcome of a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Label of the closest labeled descriptor, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Distance to the closest labeled descriptor (`f32::INFINITY` when empty).
    pub distance: f32,
}

impl BestMatch {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Matcher built from a set of labeled descriptors and a maximum distance.
///
/// `best_match` returns the label of the descriptor closest to the query;
/// if that distance exceeds the threshold the query is classified as
/// [`UNKNOWN_LABEL`]. A face that is present but not close enough is
/// therefore distinct from "no faces at all" (an empty matcher).
pub struct FaceMatcher {
    labeled: Vec<(String, Descriptor)>,
    max_distance: f32,
}

impl FaceMatcher {
    pub fn new(labeled: Vec<(String, Descriptor)>, max_distance: f32) -> Self {
        Self {
            labeled,
            max_distance,
        }
    }

    /// Label each descriptor by its position ("face 1", "face 2", ...).
    pub fn from_descriptors<I>(descriptors: I, max_distance: f32) -> Self
    where
        I: IntoIterator<Item = Descriptor>,
    {
        let labeled = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, d)| (format!("face {}", i + 1), d))
            .collect();
        Self::new(labeled, max_distance)
    }

    pub fn is_empty(&self) -> bool {
        self.labeled.is_empty()
    }

    pub fn best_match(&self, query: &Descriptor) -> BestMatch {
        let mut best_distance = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, (label, descriptor)) in self.labeled.iter().enumerate() {
            if descriptor.len() != query.len() {
                tracing::warn!(
                    %label,
                    len = descriptor.len(),
                    query_len = query.len(),
                    "descriptor length mismatch; skipped"
                );
                continue;
            }
            let distance = query.distance(descriptor);
            if distance < best_distance {
                best_distance = distance;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_distance <= self.max_distance => BestMatch {
                label: self.labeled[idx].0.clone(),
                distance: best_distance,
            },
            _ => BestMatch {
                label: UNKNOWN_LABEL.to_string(),
                distance: best_distance,
            },
        }
    }
}
