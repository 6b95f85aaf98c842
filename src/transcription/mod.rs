//! Transcription service abstraction
//!
//! The speech-to-text work happens in an external batch service. This module
//! defines the operations the analysis pipeline needs from it (create a job,
//! upload its audio, start it, poll it, download its outputs) behind the
//! [`TranscriptionService`] trait, plus the polling loop that waits for a job
//! to reach a terminal state.

pub mod sarvam;

#[cfg(test)]
pub mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

pub use sarvam::SarvamClient;

/// Parameters of a new transcription job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Model identifier, e.g. "saaras:v2.5"
    pub model: String,
    /// Enable speaker diarization
    pub with_diarization: bool,
}

/// Job state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum JobState {
    #[default]
    Accepted,
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<String> for JobState {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "accepted" => JobState::Accepted,
            "pending" => JobState::Pending,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            _ => JobState::Running,
        }
    }
}

impl JobState {
    /// No further progress happens once a job is completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobState::Failed)
    }
}

/// Handle on a job created in the external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionJob {
    /// Identifier assigned by the service
    pub job_id: String,
    /// State returned when the job was created
    pub state: JobState,
}

/// Errors reported by a transcription service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport-level failure talking to the service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Transcription service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service did not return a transfer link for a file
    #[error("No transfer URL returned for file: {0}")]
    MissingUrl(String),

    /// Local file handling failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job did not reach a terminal state in time
    #[error("Transcription job did not complete within {0} seconds")]
    Timeout(u64),
}

/// Operations of a batch speech-to-text service
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Create a job with the given model and diarization setting
    async fn create_job(&self, options: &JobOptions) -> Result<TranscriptionJob, ServiceError>;

    /// Attach local audio files to the job
    async fn upload_files(
        &self,
        job: &TranscriptionJob,
        files: &[PathBuf],
    ) -> Result<(), ServiceError>;

    /// Start processing the uploaded files
    async fn start(&self, job: &TranscriptionJob) -> Result<JobState, ServiceError>;

    /// Current state of the job
    async fn job_status(&self, job: &TranscriptionJob) -> Result<JobState, ServiceError>;

    /// Download every output file of the job into `output_dir`
    ///
    /// Returns the paths written.
    async fn download_outputs(
        &self,
        job: &TranscriptionJob,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ServiceError>;
}

/// Poll the job every `poll_interval` until it is completed or failed
///
/// With a `timeout`, gives up with [`ServiceError::Timeout`] once it elapses.
pub async fn wait_until_complete(
    service: &dyn TranscriptionService,
    job: &TranscriptionJob,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<JobState, ServiceError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, poll_until_terminal(service, job, poll_interval))
            .await
            .map_err(|_| ServiceError::Timeout(limit.as_secs()))?,
        None => poll_until_terminal(service, job, poll_interval).await,
    }
}

async fn poll_until_terminal(
    service: &dyn TranscriptionService,
    job: &TranscriptionJob,
    poll_interval: Duration,
) -> Result<JobState, ServiceError> {
    loop {
        let state = service.job_status(job).await?;
        if state.is_terminal() {
            return Ok(state);
        }
        debug!("Job {} is {:?}, polling again", job.job_id, state);
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockService;
    use super::*;

    #[test]
    fn test_job_state_from_service_strings() {
        assert_eq!(JobState::from("Completed".to_string()), JobState::Completed);
        assert_eq!(JobState::from("FAILED".to_string()), JobState::Failed);
        assert_eq!(JobState::from("Pending".to_string()), JobState::Pending);
        assert_eq!(JobState::from("Uploading".to_string()), JobState::Running);

        let state: JobState = serde_json::from_str("\"Accepted\"").expect("valid state");
        assert_eq!(state, JobState::Accepted);
        assert!(!state.is_terminal());
        assert!(JobState::Failed.is_terminal() && JobState::Failed.is_failed());
        assert!(!JobState::Completed.is_failed());
    }

    #[tokio::test]
    async fn test_wait_returns_first_terminal_state() {
        let service = MockService::succeeding(vec![]).with_statuses(vec![
            JobState::Pending,
            JobState::Running,
            JobState::Completed,
        ]);
        let job = service.create_job(&test_options()).await.expect("job");

        let state = wait_until_complete(&service, &job, Duration::from_millis(1), None)
            .await
            .expect("job completes");

        assert_eq!(state, JobState::Completed);
        assert_eq!(service.status_calls(), 3);
    }

    #[tokio::test]
    async fn test_wait_reports_failure_state() {
        let service = MockService::failing();
        let job = service.create_job(&test_options()).await.expect("job");

        let state = wait_until_complete(&service, &job, Duration::from_millis(1), None)
            .await
            .expect("poll succeeds");

        assert!(state.is_failed());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let service = MockService::succeeding(vec![]).with_statuses(vec![JobState::Running]);
        let job = service.create_job(&test_options()).await.expect("job");

        let result = wait_until_complete(
            &service,
            &job,
            Duration::from_millis(5),
            Some(Duration::from_millis(30)),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Timeout(_))));
    }

    fn test_options() -> JobOptions {
        JobOptions {
            model: "saaras:v2.5".to_string(),
            with_diarization: true,
        }
    }
}
