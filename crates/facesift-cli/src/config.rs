use facesift_core::{DEFAULT_MIN_CONFIDENCE, DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE};
use facesift_drive::DEFAULT_PAGE_SIZE;
use facesift_pipeline::{
    BatchOptions, MatchOptions, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_MAX_DISTANCE,
};
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Google API key for Drive access. Required by folder commands.
    pub api_key: Option<String>,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Minimum detector confidence for faces in candidate photos.
    pub min_confidence: f32,
    /// Maximum descriptor distance for a match.
    pub match_threshold: f32,
    /// Files evaluated concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    pub batch_delay_ms: u64,
    /// Entries requested per listing call.
    pub page_size: u32,
}

impl Config {
    /// Load configuration from `FACESIFT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACESIFT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facesift_core::default_model_dir());

        Self {
            api_key: std::env::var("GOOGLE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model_dir,
            min_confidence: env_f32("FACESIFT_MIN_CONFIDENCE", DEFAULT_MIN_CONFIDENCE),
            match_threshold: env_f32("FACESIFT_MATCH_THRESHOLD", DEFAULT_MAX_DISTANCE),
            batch_size: env_usize("FACESIFT_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            batch_delay_ms: env_u64(
                "FACESIFT_BATCH_DELAY_MS",
                DEFAULT_BATCH_DELAY.as_millis() as u64,
            ),
            page_size: env_u32("FACESIFT_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
        }
    }

    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    pub fn recognizer_model_path(&self) -> String {
        self.model_dir
            .join(RECOGNIZER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            min_confidence: self.min_confidence,
            max_distance: self.match_threshold,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
