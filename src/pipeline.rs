//! Analysis pipeline
//!
//! Everything `POST /analyze_audio` does after validating its body: download the
//! audio, run it through a transcription job and read back the JSON result.
//! The downloaded file is owned by a [`TempAudioFile`], so it is removed on every
//! exit path, including when the pipeline future is dropped on timeout or
//! client disconnect.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::{HandlerConfig, OutputRetention};
use crate::error::HandlerError;
use crate::file_utils::{
    cleanup_folder, download_to_file, first_json_file, job_output_dir, TempAudioFile,
};
use crate::metrics::Metrics;
use crate::transcription::{wait_until_complete, TranscriptionJob, TranscriptionService};

/// Shared, read-only state used by every request
#[derive(Clone)]
pub struct AnalysisContext {
    /// Client used to fetch audio URLs
    pub http: reqwest::Client,
    /// Authenticated transcription service client
    pub service: Arc<dyn TranscriptionService>,
    pub config: HandlerConfig,
    pub metrics: Metrics,
}

impl AnalysisContext {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        config: HandlerConfig,
        metrics: Metrics,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()?;

        Ok(Self {
            http,
            service,
            config,
            metrics,
        })
    }
}

/// Run the pipeline for `audio_url`, under the configured request deadline
///
/// # Returns
///
/// * The raw text of the transcription JSON file
pub async fn analyze_audio(ctx: &AnalysisContext, audio_url: &str) -> Result<String, HandlerError> {
    let limit = ctx.config.request_timeout;
    if limit == 0 {
        return run_pipeline(ctx, audio_url).await;
    }

    tokio::time::timeout(Duration::from_secs(limit), run_pipeline(ctx, audio_url))
        .await
        .map_err(|_| {
            warn!("Analysis of {} timed out after {} seconds", audio_url, limit);
            HandlerError::Timeout(limit)
        })?
}

async fn run_pipeline(ctx: &AnalysisContext, audio_url: &str) -> Result<String, HandlerError> {
    let temp_file = TempAudioFile::new_in(&ctx.config.temp_dir);

    let size = download_to_file(&ctx.http, audio_url, temp_file.path()).await?;
    ctx.metrics.record_download_size(size as f64).await;

    let job = ctx.service.create_job(&ctx.config.job_options()).await?;
    info!("Job {} created for {}", job.job_id, temp_file.path().display());

    let started = Instant::now();
    ctx.service
        .upload_files(&job, &[temp_file.path().to_path_buf()])
        .await?;
    ctx.service.start(&job).await?;

    let state = wait_until_complete(
        ctx.service.as_ref(),
        &job,
        ctx.config.poll_interval,
        ctx.config.job_deadline(),
    )
    .await?;

    let duration = started.elapsed().as_secs_f64();
    if state.is_failed() {
        warn!("Job {} failed", job.job_id);
        ctx.metrics
            .record_job_completed(&ctx.config.model, "failed", duration)
            .await;
        return Err(HandlerError::TranscriptionFailed);
    }
    ctx.metrics
        .record_job_completed(&ctx.config.model, "success", duration)
        .await;
    info!("Job {} completed in {:.1}s", job.job_id, duration);

    let output_dir = job_output_dir(&ctx.config.output_dir, &job.job_id);
    let result = collect_result(ctx, &job, &output_dir).await;

    if ctx.config.retention == OutputRetention::DeleteAfterResponse {
        cleanup_folder(&output_dir);
    }

    result
}

/// Download the job outputs into `output_dir` and read the first JSON file
async fn collect_result(
    ctx: &AnalysisContext,
    job: &TranscriptionJob,
    output_dir: &Path,
) -> Result<String, HandlerError> {
    tokio::fs::create_dir_all(output_dir).await?;
    ctx.service.download_outputs(job, output_dir).await?;

    let json_file = first_json_file(output_dir)?.ok_or_else(|| {
        warn!("Job {} produced no JSON output", job.job_id);
        HandlerError::NoTranscriptionFile
    })?;

    Ok(tokio::fs::read_to_string(json_file).await?)
}
