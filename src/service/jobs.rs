// Registry of asynchronous conversion jobs.
//
// One map behind one lock. Every read returns a snapshot clone and every
// write goes through a closure run under the lock, so the request handlers
// and the background conversions never lose each other's updates.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Converting,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub download_url: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    pub output_file: Option<PathBuf>,
    #[serde(skip)]
    pub updated_at: Instant,
}

impl Job {
    fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            download_url: None,
            error: None,
            output_file: None,
            updated_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending job under a fresh identifier.
    pub fn create(&self) -> Job {
        let job = Job::new(uuid::Uuid::new_v4().to_string());
        self.jobs.lock().insert(job.job_id.clone(), job.clone());
        job
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Applies `f` to the job under the lock. Returns false for unknown ids.
    pub fn update(&self, job_id: &str, f: impl FnOnce(&mut Job)) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(job_id) {
            Some(job) => {
                f(job);
                job.updated_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Moves an unfinished job to `converting` at `progress` percent.
    pub fn advance(&self, job_id: &str, progress: u8) {
        self.update(job_id, |job| {
            if !job.status.is_finished() {
                job.status = JobStatus::Converting;
                job.progress = progress.min(100);
            }
        });
    }

    pub fn complete(&self, job_id: &str, download_url: String, output_file: PathBuf) {
        self.update(job_id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.download_url = Some(download_url);
            job.output_file = Some(output_file);
            job.error = None;
        });
    }

    pub fn fail(&self, job_id: &str, message: String) {
        self.update(job_id, |job| {
            job.status = JobStatus::Error;
            job.error = Some(message);
            job.download_url = None;
        });
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().remove(job_id)
    }

    /// Finished jobs whose last update is older than `retention` at `now`.
    pub fn expired(&self, now: Instant, retention: Duration) -> Vec<Job> {
        self.jobs
            .lock()
            .values()
            .filter(|job| {
                job.status.is_finished() && now.saturating_duration_since(job.updated_at) >= retention
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending_and_serializes_camel_case() {
        let jobs = JobRegistry::new();
        let job = jobs.create();
        let v = serde_json::to_value(&job).unwrap();
        assert_eq!(v["jobId"], job.job_id.as_str());
        assert_eq!(v["status"], "pending");
        assert_eq!(v["progress"], 0);
        assert!(v["downloadUrl"].is_null());
        assert!(v["error"].is_null());
        assert!(v.get("outputFile").is_none());
    }

    #[test]
    fn ids_are_unique() {
        let jobs = JobRegistry::new();
        let a = jobs.create();
        let b = jobs.create();
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn lifecycle_to_completed() {
        let jobs = JobRegistry::new();
        let id = jobs.create().job_id;
        jobs.advance(&id, 20);
        assert_eq!(jobs.get(&id).unwrap().status, JobStatus::Converting);
        jobs.advance(&id, 90);
        jobs.complete(&id, "/api/download/x.docx".into(), PathBuf::from("x.docx"));
        let job = jobs.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.download_url.as_deref(), Some("/api/download/x.docx"));
    }

    #[test]
    fn failed_job_stays_failed() {
        let jobs = JobRegistry::new();
        let id = jobs.create().job_id;
        jobs.fail(&id, "boom".into());
        jobs.advance(&id, 50);
        let job = jobs.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let jobs = JobRegistry::new();
        assert!(!jobs.update("nope", |_| {}));
        assert!(jobs.get("nope").is_none());
    }

    #[test]
    fn only_finished_jobs_expire() {
        let jobs = JobRegistry::new();
        let done = jobs.create().job_id;
        let running = jobs.create().job_id;
        jobs.complete(&done, "u".into(), PathBuf::from("f"));
        jobs.advance(&running, 20);
        let later = Instant::now() + Duration::from_secs(120);
        let expired = jobs.expired(later, Duration::from_secs(60));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].job_id, done);
        assert!(jobs.expired(Instant::now(), Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let jobs = JobRegistry::new();
        let id = jobs.create().job_id;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let jobs = jobs.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        jobs.update(&id, |j| j.progress = j.progress.wrapping_add(1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 800 increments of a u8
        assert_eq!(jobs.get(&id).unwrap().progress, (800 % 256) as u8);
    }
}
