//! Per-file match evaluation: download, decode, detect, compare.

use facesift_core::{
    CapabilityError, DetectOptions, FaceCapability, FaceMatcher, ReferenceFace,
    DEFAULT_MIN_CONFIDENCE,
};
use facesift_drive::{CandidateFile, DriveError, StorageProvider};
use image::{imageops, RgbImage};
use std::sync::Arc;
use thiserror::Error;

/// Default maximum descriptor distance that still counts as the same face.
pub const DEFAULT_MAX_DISTANCE: f32 = 0.5;

/// Longest side of the preview kept with each match.
pub const PREVIEW_MAX_SIDE: u32 = 320;

#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("download failed: {0}")]
    FetchFailed(#[from] DriveError),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("face detection failed: {0}")]
    DetectionFailed(#[from] CapabilityError),
}

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Detector confidence floor for faces in candidate photos.
    pub min_confidence: f32,
    /// Maximum descriptor distance for a match.
    pub max_distance: f32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

/// A candidate photo that contains the reference face.
#[derive(Debug)]
pub struct MatchResult {
    pub file: CandidateFile,
    /// Original downloaded bytes, ready to save without re-fetching.
    pub content: Vec<u8>,
    /// Downscaled copy of the decoded photo for display.
    pub preview: RgbImage,
    /// Label of the matching face within the photo.
    pub face_label: String,
    pub distance: f32,
}

pub struct MatchEvaluator {
    storage: Arc<dyn StorageProvider>,
    capability: Arc<dyn FaceCapability>,
    options: MatchOptions,
}

impl MatchEvaluator {
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        capability: Arc<dyn FaceCapability>,
        options: MatchOptions,
    ) -> Self {
        Self {
            storage,
            capability,
            options,
        }
    }

    /// `Ok(None)` when the photo has no face, or no face close enough.
    pub async fn evaluate(
        &self,
        file: CandidateFile,
        reference: &ReferenceFace,
    ) -> Result<Option<MatchResult>, EvaluateError> {
        let content = self.storage.download_content(&file.id).await?;

        let (content, decoded) = tokio::task::spawn_blocking(move || {
            let decoded = image::load_from_memory(&content).map(|img| img.to_rgb8());
            (content, decoded)
        })
        .await
        .map_err(|e| EvaluateError::DecodeFailed(format!("decoder task: {e}")))?;
        let image = Arc::new(decoded.map_err(|e| EvaluateError::DecodeFailed(e.to_string()))?);

        let faces = self
            .capability
            .detect_all_faces(
                Arc::clone(&image),
                DetectOptions {
                    min_confidence: self.options.min_confidence,
                },
            )
            .await?;

        if faces.is_empty() {
            tracing::trace!(file = %file.name, "no faces");
            return Ok(None);
        }

        let face_count = faces.len();
        let matcher = FaceMatcher::from_descriptors(
            faces.into_iter().map(|f| f.descriptor),
            self.options.max_distance,
        );
        let best = matcher.best_match(&reference.descriptor);

        if best.is_unknown() {
            tracing::debug!(
                file = %file.name,
                faces = face_count,
                distance = best.distance,
                "faces present, none close enough"
            );
            return Ok(None);
        }

        tracing::info!(file = %file.name, label = %best.label, distance = best.distance, "match");
        Ok(Some(MatchResult {
            preview: preview(&image),
            file,
            content,
            face_label: best.label,
            distance: best.distance,
        }))
    }
}

fn preview(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= PREVIEW_MAX_SIDE {
        return image.clone();
    }
    let scale = PREVIEW_MAX_SIDE as f32 / longest as f32;
    let pw = ((w as f32 * scale).round() as u32).max(1);
    let ph = ((h as f32 * scale).round() as u32).max(1);
    imageops::thumbnail(image, pw, ph)
}
