// File utilities for the Audio Analysis API
//
// This module contains the file operations used while handling a request:
// temporary audio files, streamed downloads and job output folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::error::HandlerError;

/// Write buffer used while streaming a download to disk
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// Extension given to every downloaded audio file
pub const AUDIO_EXTENSION: &str = "wav";

/// Prefix of per-job output folders
pub const OUTPUT_DIR_PREFIX: &str = "transcriptions_";

/// A uniquely named audio file that is removed when the value is dropped
///
/// The path is reserved at construction; the file itself only exists once
/// something writes to it.
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    /// Reserve `<dir>/<uuid>.wav`
    pub fn new_in(dir: &Path) -> Self {
        let path = dir.join(format!("{}.{}", Uuid::new_v4(), AUDIO_EXTENSION));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temp audio file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove temp audio file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Fetch `url` and stream its body into `destination`
///
/// Request and transfer failures become [`HandlerError::DownloadFailed`];
/// local I/O failures stay [`HandlerError::FileError`].
///
/// # Returns
///
/// * Number of bytes written
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
) -> Result<u64, HandlerError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(HandlerError::download_failed)?;

    let file = tokio::fs::File::create(destination).await?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(HandlerError::download_failed)?;
        writer.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    writer.flush().await?;

    info!("Saved {} bytes from {} to {}", total, url, destination.display());
    Ok(total)
}

/// Output folder of a job: `<output_dir>/transcriptions_<job_id>`
pub fn job_output_dir(output_dir: &Path, job_id: &str) -> PathBuf {
    output_dir.join(format!("{}{}", OUTPUT_DIR_PREFIX, job_id))
}

/// First `.json` file of `dir`, by file name
pub fn first_json_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut json_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".json"))
        })
        .collect();

    json_files.sort();
    Ok(json_files.into_iter().next())
}

/// Clean up a folder and its contents
///
/// This function logs errors but doesn't return them to the caller
pub fn cleanup_folder(folder_path: &Path) {
    if let Err(e) = fs::remove_dir_all(folder_path) {
        warn!("Failed to clean up folder {}: {}", folder_path.display(), e);
    } else {
        info!("Successfully cleaned up folder: {}", folder_path.display());
    }
}
