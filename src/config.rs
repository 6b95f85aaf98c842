// Audio Analysis API configuration
//
// This module contains configuration structures and constants for the Audio Analysis API.
// Every value is read from an environment variable and falls back to a default from `defaults`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::transcription::JobOptions;

/// Default values for configuration
pub mod defaults {
    // Bind address of the HTTP server
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 8080;

    // Keep-alive in seconds
    pub const KEEPALIVE: u64 = 75;

    // 0 = one worker per CPU core
    pub const WORKER_NUMBER: usize = 0;

    // Downloaded audio lands in the working directory
    pub const TEMP_DIR: &str = ".";

    // Parent directory of the per-job `transcriptions_<job_id>` folders
    pub const OUTPUT_DIR: &str = "outputs";

    // Speech-to-text-translate model
    pub const MODEL: &str = "saaras:v2.5";

    pub const DIARIZATION: bool = true;

    pub const POLL_INTERVAL_SECONDS: u64 = 5;

    // 0 = wait for the job without a deadline
    pub const JOB_TIMEOUT_SECONDS: u64 = 0;

    // 0 = no deadline for the whole request
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 0;

    pub const CONNECT_TIMEOUT_SECONDS: u64 = 30;

    pub const CLEANUP_INTERVAL_HOURS: u64 = 1;

    pub const SARVAM_BASE_URL: &str = "https://api.sarvam.ai";

    pub const METRICS_BACKEND: &str = "none";
}

// Environment variable names
pub const ENV_SARVAM_API_KEY: &str = "SARVAM_API_KEY";
pub const ENV_SARVAM_BASE_URL: &str = "SARVAM_API_BASE_URL";
const ENV_HOST: &str = "AUDIO_API_HOST";
const ENV_PORT: &str = "AUDIO_API_PORT";
const ENV_KEEPALIVE: &str = "AUDIO_API_KEEPALIVE";
const ENV_WORKER_NUMBER: &str = "HTTP_WORKER_NUMBER";
const ENV_TEMP_DIR: &str = "AUDIO_API_TMP_FILES";
const ENV_OUTPUT_DIR: &str = "AUDIO_API_OUTPUT_DIR";
const ENV_MODEL: &str = "TRANSCRIPTION_MODEL";
const ENV_DIARIZATION: &str = "TRANSCRIPTION_DIARIZATION";
const ENV_POLL_INTERVAL: &str = "JOB_POLL_INTERVAL_SECONDS";
const ENV_JOB_TIMEOUT: &str = "JOB_TIMEOUT_SECONDS";
const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECONDS";
const ENV_CONNECT_TIMEOUT: &str = "DOWNLOAD_CONNECT_TIMEOUT_SECONDS";
const ENV_OUTPUT_RETENTION: &str = "OUTPUT_RETENTION";
const ENV_CLEANUP_INTERVAL: &str = "CLEANUP_INTERVAL_HOURS";
const ENV_METRICS_BACKEND: &str = "AUDIO_API_METRICS_BACKEND";

/// Errors raised while building the startup configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty
    #[error("{0} environment variable not set.")]
    MissingVariable(&'static str),
}

/// What happens to `transcriptions_<job_id>` folders once a request is done
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputRetention {
    /// Never removed by the service
    Keep,
    /// Removed as soon as the result has been read
    DeleteAfterResponse,
    /// Removed by the background sweeper once older than the given number of hours
    MaxAge(u64),
}

impl FromStr for OutputRetention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "" => Ok(Self::Keep),
            "delete" => Ok(Self::DeleteAfterResponse),
            other => other
                .parse::<u64>()
                .map(Self::MaxAge)
                .map_err(|_| format!("expected 'keep', 'delete' or a number of hours, got '{}'", s)),
        }
    }
}

/// Read a typed value through `lookup`, falling back to `default` when absent or unparsable
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using default", raw, key);
                default
            }
        },
        None => default,
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Configuration for the analysis handler
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Directory receiving the downloaded audio files
    pub temp_dir: PathBuf,
    /// Parent of the per-job output folders
    pub output_dir: PathBuf,
    /// Model identifier sent to the transcription service
    pub model: String,
    /// Whether speaker diarization is requested
    pub with_diarization: bool,
    /// Delay between two job status polls
    pub poll_interval: Duration,
    /// Seconds to wait for a job before giving up (0 = no limit)
    pub job_timeout: u64,
    /// Seconds allowed for the whole request pipeline (0 = no limit)
    pub request_timeout: u64,
    /// Connect timeout of the outbound HTTP clients, in seconds
    pub connect_timeout: u64,
    /// Output folder retention policy
    pub retention: OutputRetention,
    /// Sweep interval in hours when `retention` is `MaxAge`
    pub cleanup_interval_hours: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::from_lookup(env_lookup)
    }
}

impl HandlerConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let retention = match lookup(ENV_OUTPUT_RETENTION) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Invalid {}: {}. Keeping output folders", ENV_OUTPUT_RETENTION, e);
                OutputRetention::Keep
            }),
            None => OutputRetention::Keep,
        };

        Self {
            temp_dir: lookup(ENV_TEMP_DIR)
                .unwrap_or_else(|| String::from(defaults::TEMP_DIR))
                .into(),
            output_dir: lookup(ENV_OUTPUT_DIR)
                .unwrap_or_else(|| String::from(defaults::OUTPUT_DIR))
                .into(),
            model: lookup(ENV_MODEL).unwrap_or_else(|| String::from(defaults::MODEL)),
            with_diarization: parse_or(&lookup, ENV_DIARIZATION, defaults::DIARIZATION),
            poll_interval: Duration::from_secs(parse_or(
                &lookup,
                ENV_POLL_INTERVAL,
                defaults::POLL_INTERVAL_SECONDS,
            )),
            job_timeout: parse_or(&lookup, ENV_JOB_TIMEOUT, defaults::JOB_TIMEOUT_SECONDS),
            request_timeout: parse_or(
                &lookup,
                ENV_REQUEST_TIMEOUT,
                defaults::REQUEST_TIMEOUT_SECONDS,
            ),
            connect_timeout: parse_or(
                &lookup,
                ENV_CONNECT_TIMEOUT,
                defaults::CONNECT_TIMEOUT_SECONDS,
            ),
            retention,
            cleanup_interval_hours: parse_or(
                &lookup,
                ENV_CLEANUP_INTERVAL,
                defaults::CLEANUP_INTERVAL_HOURS,
            ),
        }
    }

    /// Job parameters sent to the transcription service
    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            model: self.model.clone(),
            with_diarization: self.with_diarization,
        }
    }

    /// Deadline for the wait-until-complete step, if any
    pub fn job_deadline(&self) -> Option<Duration> {
        (self.job_timeout > 0).then(|| Duration::from_secs(self.job_timeout))
    }

    /// Ensures the temporary and output directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::create_dir_all(&self.output_dir)
    }
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive: u64,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(env_lookup)
    }
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup(ENV_HOST).unwrap_or_else(|| String::from(defaults::HOST)),
            port: parse_or(&lookup, ENV_PORT, defaults::PORT),
            keep_alive: parse_or(&lookup, ENV_KEEPALIVE, defaults::KEEPALIVE),
            workers: parse_or(&lookup, ENV_WORKER_NUMBER, defaults::WORKER_NUMBER),
        }
    }

    /// Number of actix workers to spawn
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Credentials and endpoint of the Sarvam AI API
#[derive(Clone)]
pub struct SarvamConfig {
    pub api_key: String,
    pub base_url: String,
    pub connect_timeout: u64,
}

impl std::fmt::Debug for SarvamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SarvamConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl SarvamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Builds the configuration; the API key is mandatory
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_SARVAM_API_KEY)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingVariable(ENV_SARVAM_API_KEY))?;

        Ok(Self {
            api_key,
            base_url: lookup(ENV_SARVAM_BASE_URL)
                .unwrap_or_else(|| String::from(defaults::SARVAM_BASE_URL)),
            connect_timeout: parse_or(
                &lookup,
                ENV_CONNECT_TIMEOUT,
                defaults::CONNECT_TIMEOUT_SECONDS,
            ),
        })
    }
}

/// Configuration for metrics collection and export
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Type of metrics exporter ("prometheus", "none")
    pub exporter_type: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporter_type: env::var(ENV_METRICS_BACKEND)
                .unwrap_or_else(|_| defaults::METRICS_BACKEND.to_string()),
        }
    }
}
