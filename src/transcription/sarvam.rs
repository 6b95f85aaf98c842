//! Sarvam AI batch speech-to-text-translate client
//!
//! Jobs go through the `speech-to-text-translate/job/v1` endpoints. Audio files
//! are not posted to the API itself: the API hands out pre-signed blob URLs for
//! uploads and downloads, and the client transfers the bytes there directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::{JobOptions, JobState, ServiceError, TranscriptionJob, TranscriptionService};
use crate::config::SarvamConfig;

const JOB_API_PATH: &str = "/speech-to-text-translate/job/v1";
const SUBSCRIPTION_KEY_HEADER: &str = "api-subscription-key";
const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    job_parameters: JobParameters<'a>,
}

#[derive(Serialize)]
struct JobParameters<'a> {
    model: &'a str,
    with_diarization: bool,
}

#[derive(Serialize)]
struct FilesRequest<'a> {
    job_id: &'a str,
    files: Vec<String>,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    job_id: String,
    #[serde(default)]
    job_state: JobState,
    #[serde(default)]
    job_details: Vec<JobDetail>,
}

#[derive(Deserialize)]
struct JobDetail {
    #[serde(default)]
    outputs: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    file_name: String,
}

#[derive(Deserialize)]
struct UploadUrlsResponse {
    upload_urls: HashMap<String, FileUrl>,
}

#[derive(Deserialize)]
struct DownloadUrlsResponse {
    download_urls: HashMap<String, FileUrl>,
}

#[derive(Deserialize)]
struct FileUrl {
    file_url: String,
}

/// Authenticated client, built once at startup and shared by all requests
pub struct SarvamClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SarvamClient {
    pub fn new(config: &SarvamConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, JOB_API_PATH, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn fetch_status(&self, job: &TranscriptionJob) -> Result<JobStatusResponse, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&format!("/{}/status", job.job_id)))
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// Turn a non-success response into [`ServiceError::Api`]
async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        status: status.as_u16(),
        body,
    })
}

fn file_name_of(path: &Path) -> Result<String, ServiceError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid file name: {}", path.display()),
            ))
        })
}

#[async_trait]
impl TranscriptionService for SarvamClient {
    async fn create_job(&self, options: &JobOptions) -> Result<TranscriptionJob, ServiceError> {
        let request = CreateJobRequest {
            job_parameters: JobParameters {
                model: &options.model,
                with_diarization: options.with_diarization,
            },
        };
        let response: JobStatusResponse = self.post_json("", &request).await?;
        info!("Created Sarvam job {}", response.job_id);

        Ok(TranscriptionJob {
            job_id: response.job_id,
            state: response.job_state,
        })
    }

    async fn upload_files(
        &self,
        job: &TranscriptionJob,
        files: &[PathBuf],
    ) -> Result<(), ServiceError> {
        let names = files
            .iter()
            .map(|path| file_name_of(path))
            .collect::<Result<Vec<_>, _>>()?;

        let links: UploadUrlsResponse = self
            .post_json(
                "/upload-files",
                &FilesRequest {
                    job_id: &job.job_id,
                    files: names.clone(),
                },
            )
            .await?;

        for (path, name) in files.iter().zip(names) {
            let link = links
                .upload_urls
                .get(&name)
                .ok_or_else(|| ServiceError::MissingUrl(name.clone()))?;
            let file = tokio::fs::File::open(path).await?;
            let size = file.metadata().await?.len();
            debug!("Uploading {} ({} bytes) for job {}", name, size, job.job_id);

            // Blob storage rejects chunked uploads, the length is sent up front
            let response = self
                .http
                .put(&link.file_url)
                .header(BLOB_TYPE_HEADER, "BlockBlob")
                .header(CONTENT_LENGTH, size)
                .body(Body::wrap_stream(ReaderStream::new(file)))
                .send()
                .await?;
            check_status(response).await?;
        }

        Ok(())
    }

    async fn start(&self, job: &TranscriptionJob) -> Result<JobState, ServiceError> {
        let response: JobStatusResponse = self
            .post_json(&format!("/{}/start", job.job_id), &serde_json::json!({}))
            .await?;
        info!("Started Sarvam job {}", job.job_id);
        Ok(response.job_state)
    }

    async fn job_status(&self, job: &TranscriptionJob) -> Result<JobState, ServiceError> {
        Ok(self.fetch_status(job).await?.job_state)
    }

    async fn download_outputs(
        &self,
        job: &TranscriptionJob,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ServiceError> {
        let status = self.fetch_status(job).await?;
        let names: Vec<String> = status
            .job_details
            .into_iter()
            .flat_map(|detail| detail.outputs)
            .map(|output| output.file_name)
            .collect();

        if names.is_empty() {
            return Ok(Vec::new());
        }

        let links: DownloadUrlsResponse = self
            .post_json(
                "/download-files",
                &FilesRequest {
                    job_id: &job.job_id,
                    files: names.clone(),
                },
            )
            .await?;

        let mut written = Vec::with_capacity(names.len());
        for name in names {
            let link = links
                .download_urls
                .get(&name)
                .ok_or_else(|| ServiceError::MissingUrl(name.clone()))?;
            // Only the final path component is used, outputs never escape `output_dir`
            let destination = output_dir.join(file_name_of(Path::new(&name))?);

            let response = check_status(self.http.get(&link.file_url).send().await?).await?;
            let mut file = tokio::fs::File::create(&destination).await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;

            debug!("Downloaded {} for job {}", destination.display(), job.job_id);
            written.push(destination);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> SarvamClient {
        SarvamClient::new(&SarvamConfig {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            connect_timeout: 5,
        })
        .expect("client builds")
    }

    fn job(job_id: &str) -> TranscriptionJob {
        TranscriptionJob {
            job_id: job_id.to_string(),
            state: JobState::Accepted,
        }
    }

    #[tokio::test]
    async fn create_job_sends_parameters_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/speech-to-text-translate/job/v1"))
            .and(header("api-subscription-key", "test-key"))
            .and(body_json(serde_json::json!({
                "job_parameters": { "model": "saaras:v2.5", "with_diarization": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_123",
                "job_state": "Accepted",
                "storage_container_type": "Azure"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let created = client
            .create_job(&JobOptions {
                model: "saaras:v2.5".to_string(),
                with_diarization: true,
            })
            .await
            .expect("job created");

        assert_eq!(created, job("job_123"));
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/speech-to-text-translate/job/v1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid subscription key"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client
            .create_job(&JobOptions {
                model: "saaras:v2.5".to_string(),
                with_diarization: false,
            })
            .await;

        match result {
            Err(ServiceError::Api { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "invalid subscription key");
            }
            other => panic!("expected API error, got {:?}", other.map(|j| j.job_id)),
        }
    }

    #[tokio::test]
    async fn upload_puts_bytes_to_presigned_url() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFFdata").expect("write audio");

        Mock::given(method("POST"))
            .and(path("/speech-to-text-translate/job/v1/upload-files"))
            .and(header("api-subscription-key", "test-key"))
            .and(body_json(serde_json::json!({ "job_id": "job_1", "files": ["clip.wav"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_1",
                "upload_urls": { "clip.wav": { "file_url": format!("{}/blob/clip.wav", server.uri()) } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/blob/clip.wav"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-length", "8"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .upload_files(&job("job_1"), &[audio])
            .await
            .expect("upload succeeds");

        let requests = server.received_requests().await.expect("recording enabled");
        let put = requests
            .iter()
            .find(|r| r.method.as_str() == "PUT")
            .expect("blob was uploaded");
        assert_eq!(put.body, b"RIFFdata");
    }

    #[tokio::test]
    async fn start_and_status_report_job_state() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/speech-to-text-translate/job/v1/job_2/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_2",
                "job_state": "Pending"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/speech-to-text-translate/job/v1/job_2/status"))
            .and(header("api-subscription-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_2",
                "job_state": "Failed",
                "job_details": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(client.start(&job("job_2")).await.expect("start"), JobState::Pending);
        assert_eq!(client.job_status(&job("job_2")).await.expect("status"), JobState::Failed);
    }

    #[tokio::test]
    async fn download_outputs_writes_files() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        Mock::given(method("GET"))
            .and(path("/speech-to-text-translate/job/v1/job_3/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_3",
                "job_state": "Completed",
                "job_details": [{
                    "inputs": [{ "file_name": "clip.wav" }],
                    "outputs": [{ "file_name": "clip.wav.json" }],
                    "state": "Success"
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/speech-to-text-translate/job/v1/download-files"))
            .and(body_json(serde_json::json!({ "job_id": "job_3", "files": ["clip.wav.json"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_3",
                "download_urls": {
                    "clip.wav.json": { "file_url": format!("{}/blob/out/clip.wav.json", server.uri()) }
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob/out/clip.wav.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"transcript":"namaste"}"#))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let written = client
            .download_outputs(&job("job_3"), dir.path())
            .await
            .expect("download succeeds");

        assert_eq!(written, vec![dir.path().join("clip.wav.json")]);
        let content = std::fs::read_to_string(&written[0]).expect("output written");
        assert_eq!(content, r#"{"transcript":"namaste"}"#);
    }

    #[tokio::test]
    async fn download_without_outputs_writes_nothing() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        Mock::given(method("GET"))
            .and(path("/speech-to-text-translate/job/v1/job_4/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_id": "job_4",
                "job_state": "Completed"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let written = client
            .download_outputs(&job("job_4"), dir.path())
            .await
            .expect("nothing to download");

        assert!(written.is_empty());
    }
}
