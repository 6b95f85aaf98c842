//! Output folder retention
//!
//! Job outputs are kept under `<output_dir>/transcriptions_<job_id>`. With the
//! `MaxAge` policy a background task periodically removes the folders whose
//! last modification is older than the retention period.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, error, info, warn};

use crate::file_utils::{cleanup_folder, OUTPUT_DIR_PREFIX};

/// Start the periodic sweep of expired output folders
pub fn start_cleanup_task(output_dir: PathBuf, max_age: Duration, interval: Duration) {
    info!(
        "Starting output cleanup task: retention {}s, interval {}s",
        max_age.as_secs(),
        interval.as_secs()
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;
            info!("Running scheduled cleanup of old transcription outputs");

            let dir = output_dir.clone();
            match tokio::task::spawn_blocking(move || sweep_expired_outputs(&dir, max_age)).await {
                Ok(Ok(count)) if count > 0 => info!("Cleaned up {} expired output folders", count),
                Ok(Ok(_)) => debug!("No expired output folders to clean up"),
                Ok(Err(e)) => error!("Error during scheduled cleanup: {}", e),
                Err(e) => error!("Cleanup task panicked: {}", e),
            }
        }
    });
}

/// Remove every `transcriptions_*` folder of `output_dir` at least `max_age` old
///
/// # Returns
///
/// * Number of folders removed
pub fn sweep_expired_outputs(output_dir: &Path, max_age: Duration) -> io::Result<usize> {
    if !output_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_job_folder = path.is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(OUTPUT_DIR_PREFIX));
        if !is_job_folder {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot read age of {}: {}", path.display(), e);
                continue;
            }
        };

        match now.duration_since(modified) {
            Ok(age) if age >= max_age => {
                cleanup_folder(&path);
                if !path.exists() {
                    removed += 1;
                }
            }
            _ => {}
        }
    }

    Ok(removed)
}
