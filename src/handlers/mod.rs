// Audio Analysis API HTTP handlers
//
// This module contains the HTTP handlers for the Audio Analysis API.
// It provides the interface between HTTP requests and the analysis pipeline.

pub mod routes;

// Re-export handlers for easier access
pub use self::routes::{analyze_audio, home, metrics_handler};
