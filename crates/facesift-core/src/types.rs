use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Fixed-length face descriptor (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
    /// Model version that produced this descriptor (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Euclidean distance between two descriptors. Lower = more similar.
    ///
    /// Empty descriptors, or descriptors of different length, are infinitely
    /// far apart.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        if self.values.is_empty() || self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One face found in an image: where it is, and what it looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub descriptor: Descriptor,
}

/// The descriptor a search compares every candidate photo against.
///
/// Replaced wholesale whenever the user supplies a new image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFace {
    pub descriptor: Descriptor,
    /// Where the reference image came from (path or URL), for display only.
    pub source: String,
    /// Detector confidence for the chosen face.
    pub confidence: f32,
}
