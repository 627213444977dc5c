//! Reference descriptor extraction from a user-supplied photo.

use crate::capability::{CapabilityError, FaceCapability};
use crate::types::ReferenceFace;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot detect face in reference image: {0}")]
    ExtractionFailed(String),
}

impl From<image::ImageError> for ExtractError {
    fn from(err: image::ImageError) -> Self {
        ExtractError::ExtractionFailed(format!("decode: {err}"))
    }
}

impl From<CapabilityError> for ExtractError {
    fn from(err: CapabilityError) -> Self {
        ExtractError::ExtractionFailed(err.to_string())
    }
}

/// Turns one image into at most one reference descriptor.
#[derive(Clone)]
pub struct DescriptorExtractor {
    capability: Arc<dyn FaceCapability>,
}

impl DescriptorExtractor {
    pub fn new(capability: Arc<dyn FaceCapability>) -> Self {
        Self { capability }
    }

    /// Decode `bytes` off the async runtime and extract the best face.
    ///
    /// `Ok(None)` means the image was readable but contains no face.
    pub async fn extract_reference(
        &self,
        bytes: Vec<u8>,
        source: &str,
    ) -> Result<Option<ReferenceFace>, ExtractError> {
        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| img.to_rgb8())
        })
        .await
        .map_err(|e| ExtractError::ExtractionFailed(format!("decoder task: {e}")))??;
        self.extract_from_image(Arc::new(image), source).await
    }

    pub async fn extract_from_image(
        &self,
        image: Arc<image::RgbImage>,
        source: &str,
    ) -> Result<Option<ReferenceFace>, ExtractError> {
        let (width, height) = image.dimensions();
        let Some(face) = self.capability.detect_best_face(image).await? else {
            tracing::info!(source, width, height, "no face detected in reference image");
            return Ok(None);
        };

        tracing::info!(
            source,
            confidence = face.bbox.confidence,
            dim = face.descriptor.len(),
            "reference descriptor extracted"
        );

        Ok(Some(ReferenceFace {
            descriptor: face.descriptor,
            source: source.to_string(),
            confidence: face.bbox.confidence,
        }))
    }
}
