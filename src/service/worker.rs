// Background conversion of uploaded files and cleanup of expired jobs.

use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use super::config::{self, ServerConfig};
use super::jobs::JobRegistry;

/// Runs `job_id` to completion on the blocking pool.
pub fn spawn_job(jobs: JobRegistry, config: Arc<ServerConfig>, job_id: String) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || run_job(&jobs, &config, &job_id))
}

/// Converts the uploaded input of `job_id` and records the outcome.
///
/// Progress moves 20, 50, 90 and the job ends either `completed` with a
/// download URL or `error` with the failure message. The input file is
/// removed on success. The output only ever exists complete.
pub fn run_job(jobs: &JobRegistry, config: &ServerConfig, job_id: &str) {
    jobs.advance(job_id, 20);
    let input = config.input_path(job_id);
    let output = config.output_path(job_id);

    match convert_file(jobs, job_id, &input, &output) {
        Ok(()) => {
            if let Err(err) = std::fs::remove_file(&input) {
                log::warn!("could not remove {}: {err}", input.display());
            }
            jobs.complete(job_id, config::download_url(job_id), output);
            log::info!("job {job_id} completed");
        }
        Err(err) => {
            log::warn!("job {job_id} failed: {err:#}");
            jobs.fail(job_id, format!("{err:#}"));
        }
    }
}

fn convert_file(jobs: &JobRegistry, job_id: &str, input: &Path, output: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("read {}", input.display()))?;
    jobs.advance(job_id, 50);

    let docx = crate::convert_bytes(&bytes)?;
    jobs.advance(job_id, 90);

    write_atomically(output, &docx).with_context(|| format!("write {}", output.display()))
}

/// Writes `bytes` beside `path` under a temporary name and renames it into
/// place, so a reader never sees a partially written file at `path`.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Drops finished jobs older than the retention period along with their
/// output files. Returns how many jobs were removed.
pub fn sweep_expired(jobs: &JobRegistry, config: &ServerConfig, now: Instant) -> usize {
    let Some(retention) = config.retention else {
        return 0;
    };
    let expired = jobs.expired(now, retention);
    for job in &expired {
        if let Some(path) = &job.output_file {
            if let Err(err) = std::fs::remove_file(path) {
                log::debug!("could not remove {}: {err}", path.display());
            }
        }
        jobs.remove(&job.job_id);
    }
    if !expired.is_empty() {
        log::info!("removed {} expired jobs", expired.len());
    }
    expired.len()
}

/// Sweeps on a fixed interval until the task is dropped.
pub async fn run_sweeper(jobs: JobRegistry, config: Arc<ServerConfig>) {
    let mut interval = tokio::time::interval(config.sweep_interval);
    loop {
        interval.tick().await;
        sweep_expired(&jobs, &config, Instant::now());
    }
}
