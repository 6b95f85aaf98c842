// Error handling for the Audio Analysis API
//
// This module defines the errors a request can end with and how each one
// is rendered as a `{"error": ...}` JSON response.

use std::io;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::transcription::ServiceError;

/// Errors that can occur while handling an analysis request
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Body is not a JSON object or has no `audio_url` key
    #[error("audio_url not provided")]
    MissingAudioUrl,

    /// The audio URL could not be fetched
    #[error("Failed to download audio file: {0}")]
    DownloadFailed(String),

    /// The transcription job ended in the failed state
    #[error("Transcription failed")]
    TranscriptionFailed,

    /// The job completed without a JSON output
    #[error("No transcription file found")]
    NoTranscriptionFile,

    /// The request pipeline exceeded its deadline
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Local file handling failed
    #[error("{0}")]
    FileError(#[from] io::Error),

    /// The transcription service reported an error
    #[error("{0}")]
    ServiceError(#[from] ServiceError),
}

impl HandlerError {
    /// Create a new DownloadFailed error
    pub fn download_failed<E: std::fmt::Display>(err: E) -> Self {
        Self::DownloadFailed(err.to_string())
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::MissingAudioUrl | HandlerError::DownloadFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
