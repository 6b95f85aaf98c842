// In-memory transcription service used by the tests

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{JobOptions, JobState, ServiceError, TranscriptionJob, TranscriptionService};

/// Scripted service: statuses are replayed in order, the last one repeats
pub struct MockService {
    statuses: Mutex<VecDeque<JobState>>,
    outputs: Vec<(String, String)>,
    create_error: Option<String>,
    status_delay: Option<Duration>,
    status_calls: AtomicUsize,
    created: Mutex<Vec<(String, JobOptions)>>,
    uploaded: Mutex<Vec<(PathBuf, Option<Vec<u8>>)>>,
}

impl MockService {
    /// Completes on the first poll and writes `outputs` as (file name, content)
    pub fn succeeding(outputs: Vec<(&str, &str)>) -> Self {
        Self {
            statuses: Mutex::new(VecDeque::from(vec![JobState::Completed])),
            outputs: outputs
                .into_iter()
                .map(|(name, content)| (name.to_string(), content.to_string()))
                .collect(),
            create_error: None,
            status_delay: None,
            status_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
        }
    }

    /// Fails on the first poll
    pub fn failing() -> Self {
        Self::succeeding(vec![]).with_statuses(vec![JobState::Failed])
    }

    /// Rejects job creation with the given message
    pub fn rejecting(body: &str) -> Self {
        let mut service = Self::succeeding(vec![]);
        service.create_error = Some(body.to_string());
        service
    }

    pub fn with_statuses(self, statuses: Vec<JobState>) -> Self {
        *self.statuses.lock().unwrap() = VecDeque::from(statuses);
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn created_jobs(&self) -> Vec<(String, JobOptions)> {
        self.created.lock().unwrap().clone()
    }

    /// Uploaded paths with the file content seen at upload time
    pub fn uploaded(&self) -> Vec<(PathBuf, Option<Vec<u8>>)> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionService for MockService {
    async fn create_job(&self, options: &JobOptions) -> Result<TranscriptionJob, ServiceError> {
        if let Some(body) = &self.create_error {
            return Err(ServiceError::Api {
                status: 503,
                body: body.clone(),
            });
        }
        let job_id = Uuid::new_v4().to_string();
        self.created
            .lock()
            .unwrap()
            .push((job_id.clone(), options.clone()));
        Ok(TranscriptionJob {
            job_id,
            state: JobState::Accepted,
        })
    }

    async fn upload_files(
        &self,
        _job: &TranscriptionJob,
        files: &[PathBuf],
    ) -> Result<(), ServiceError> {
        let mut uploaded = self.uploaded.lock().unwrap();
        for file in files {
            uploaded.push((file.clone(), std::fs::read(file).ok()));
        }
        Ok(())
    }

    async fn start(&self, _job: &TranscriptionJob) -> Result<JobState, ServiceError> {
        Ok(JobState::Pending)
    }

    async fn job_status(&self, _job: &TranscriptionJob) -> Result<JobState, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }
        let mut statuses = self.statuses.lock().unwrap();
        let state = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(state.unwrap_or(JobState::Running))
    }

    async fn download_outputs(
        &self,
        _job: &TranscriptionJob,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ServiceError> {
        let mut written = Vec::new();
        for (name, content) in &self.outputs {
            let path = output_dir.join(name);
            std::fs::write(&path, content)?;
            written.push(path);
        }
        Ok(written)
    }
}
