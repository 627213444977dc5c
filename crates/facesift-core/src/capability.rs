//! The face capability the pipeline depends on: detection plus descriptors.

use crate::types::FaceDetection;
use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;

/// Default minimum detector confidence for `detect_all_faces`.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("detector error: {0}")]
    Detector(#[from] crate::detector::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] crate::recognizer::RecognizerError),
    #[error("face engine unavailable")]
    EngineUnavailable,
}

/// Options for multi-face detection.
#[derive(Debug, Clone, Copy)]
pub struct DetectOptions {
    pub min_confidence: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Given an image, find faces and compute a descriptor for each.
#[async_trait]
pub trait FaceCapability: Send + Sync {
    /// Detect the single most confident face, with landmarks and descriptor.
    async fn detect_best_face(
        &self,
        image: Arc<RgbImage>,
    ) -> Result<Option<FaceDetection>, CapabilityError>;

    /// Detect every face at or above `opts.min_confidence`.
    async fn detect_all_faces(
        &self,
        image: Arc<RgbImage>,
        opts: DetectOptions,
    ) -> Result<Vec<FaceDetection>, CapabilityError>;
}
