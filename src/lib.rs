// Audio Analysis API Library
//
// This crate provides an HTTP API that transcribes remote audio files through
// the Sarvam speech-to-text-translate batch job service.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod file_utils;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod retention;
pub mod transcription;

// Re-export common types for easier access
pub use config::{HandlerConfig, MetricsConfig, OutputRetention, SarvamConfig, ServerConfig};
pub use error::HandlerError;
pub use handlers::{analyze_audio, home, metrics_handler};
pub use metrics::Metrics;
pub use models::ErrorResponse;
pub use pipeline::AnalysisContext;
pub use transcription::sarvam::SarvamClient;
pub use transcription::TranscriptionService;
