// API route handlers for the Audio Analysis API
//
// This module contains the HTTP endpoints: a health message, the analysis
// endpoint and the metrics export.

use std::time::Instant;

use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use log::{error, info};
use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::metrics::Metrics;
use crate::pipeline::{self, AnalysisContext};

pub const HOME_MESSAGE: &str = "Audio Analysis API is running!";

const AUDIO_URL_FIELD: &str = "audio_url";

/// Health message
#[get("/")]
pub async fn home() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(HOME_MESSAGE)
}

/// Handler for analysis requests
///
/// Downloads the audio at `audio_url`, transcribes it and returns the
/// transcription JSON exactly as the service produced it. The body is parsed
/// whatever its declared content type.
#[post("/analyze_audio")]
pub async fn analyze_audio(
    body: web::Bytes,
    ctx: web::Data<AnalysisContext>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();

    let result = match requested_url(&body) {
        Ok(audio_url) => {
            info!("Analysis requested for {}", audio_url);
            pipeline::analyze_audio(&ctx, &audio_url).await
        }
        rejected => rejected,
    };

    let status = match &result {
        Ok(_) => "200".to_string(),
        Err(e) => {
            error!("Analysis failed: {}", e);
            e.status_code().as_u16().to_string()
        }
    };
    let duration = start_time.elapsed().as_secs_f64();
    ctx.metrics
        .record_http_request("POST", "/analyze_audio", &status, duration)
        .await;

    let transcription = result?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(transcription))
}

/// Extract `audio_url` from a JSON object body
///
/// A body that is not an object, or has no `audio_url` key, is a missing URL.
/// A value that is not a string can never be fetched and fails as a download.
fn requested_url(body: &[u8]) -> Result<String, HandlerError> {
    let mut fields: Map<String, Value> =
        serde_json::from_slice(body).map_err(|_| HandlerError::MissingAudioUrl)?;

    match fields.remove(AUDIO_URL_FIELD) {
        None => Err(HandlerError::MissingAudioUrl),
        Some(Value::String(url)) => Ok(url),
        Some(other) => Err(HandlerError::download_failed(format!(
            "Invalid URL '{}': No scheme supplied",
            other
        ))),
    }
}

/// Metrics endpoint handler
#[get("/metrics")]
pub async fn metrics_handler(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.export().await {
        Ok(data) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(data),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            HttpResponse::InternalServerError().json(format!("Failed to export metrics: {}", e))
        }
    }
}
