//! Dedicated inference thread serving the ONNX face capability.
//!
//! ONNX sessions need `&mut` access and run CPU-bound work, so both models
//! live on one OS thread. Async callers talk to it via [`EngineHandle`],
//! which implements [`FaceCapability`].

use crate::capability::{CapabilityError, DetectOptions, FaceCapability};
use crate::detector::{DetectorError, FaceDetector, SCRFD_DEFAULT_CONFIDENCE};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceDetection;
use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

type Reply<T> = oneshot::Sender<Result<T, CapabilityError>>;

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    DetectBest {
        image: Arc<RgbImage>,
        reply: Reply<Option<FaceDetection>>,
    },
    DetectAll {
        image: Arc<RgbImage>,
        min_confidence: f32,
        reply: Reply<Vec<FaceDetection>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

#[async_trait]
impl FaceCapability for EngineHandle {
    async fn detect_best_face(
        &self,
        image: Arc<RgbImage>,
    ) -> Result<Option<FaceDetection>, CapabilityError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectBest { image, reply })
            .await
            .map_err(|_| CapabilityError::EngineUnavailable)?;
        rx.await.map_err(|_| CapabilityError::EngineUnavailable)?
    }

    async fn detect_all_faces(
        &self,
        image: Arc<RgbImage>,
        opts: DetectOptions,
    ) -> Result<Vec<FaceDetection>, CapabilityError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectAll {
                image,
                min_confidence: opts.min_confidence,
                reply,
            })
            .await
            .map_err(|_| CapabilityError::EngineUnavailable)?;
        rx.await.map_err(|_| CapabilityError::EngineUnavailable)?
    }
}

/// Load both models and start the engine thread.
///
/// Fails fast if either model is missing or malformed.
pub fn spawn_engine(detector_path: &str, recognizer_path: &str) -> Result<EngineHandle, EngineError> {
    let mut detector = FaceDetector::load(detector_path)?;
    let mut recognizer = FaceRecognizer::load(recognizer_path)?;

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facesift-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::DetectBest { image, reply } => {
                        let result = detect_best(&mut detector, &mut recognizer, &image);
                        let _ = reply.send(result);
                    }
                    EngineRequest::DetectAll {
                        image,
                        min_confidence,
                        reply,
                    } => {
                        let result =
                            detect_all(&mut detector, &mut recognizer, &image, min_confidence);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

/// Highest-confidence face only, at the detector's default confidence.
fn detect_best(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    image: &RgbImage,
) -> Result<Option<FaceDetection>, CapabilityError> {
    let faces = detector.detect(image, SCRFD_DEFAULT_CONFIDENCE)?;
    let Some(best) = faces.into_iter().next() else {
        return Ok(None);
    };
    let descriptor = recognizer.describe(image, &best)?;
    Ok(Some(FaceDetection {
        bbox: best,
        descriptor,
    }))
}

fn detect_all(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    image: &RgbImage,
    min_confidence: f32,
) -> Result<Vec<FaceDetection>, CapabilityError> {
    let faces = detector.detect(image, min_confidence)?;
    let mut detections = Vec::with_capacity(faces.len());
    for face in faces {
        match recognizer.describe(image, &face) {
            Ok(descriptor) => detections.push(FaceDetection {
                bbox: face,
                descriptor,
            }),
            Err(RecognizerError::NoLandmarks) => {
                tracing::debug!(confidence = face.confidence, "skipping face without landmarks");
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::debug!(faces = detections.len(), min_confidence, "detect_all complete");
    Ok(detections)
}
