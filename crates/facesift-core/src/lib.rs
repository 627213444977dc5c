//! facesift-core — Face detection, descriptors and reference matching.
//!
//! Uses SCRFD for face detection and ArcFace for descriptors, both running
//! via ONNX Runtime on a dedicated engine thread. The pipeline only sees the
//! [`FaceCapability`] trait, so tests and alternative backends plug in there.

pub mod alignment;
pub mod capability;
pub mod detector;
pub mod engine;
pub mod extractor;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use capability::{CapabilityError, DetectOptions, FaceCapability, DEFAULT_MIN_CONFIDENCE};
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use extractor::{DescriptorExtractor, ExtractError};
pub use matcher::{BestMatch, FaceMatcher, UNKNOWN_LABEL};
pub use types::{BoundingBox, Descriptor, FaceDetection, ReferenceFace};

use std::path::PathBuf;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// `$XDG_DATA_HOME/facesift/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesift")
        .join("models")
}
