//! Job tracking for both orchestrators.
//!
//! An explicit registry object rather than module-level job maps: jobs
//! are inserted at submission, mutated at checkpoints, and finished
//! entries can be evicted after a retention window. Extraction jobs are
//! additionally persisted one file per job so history survives restarts;
//! enhancement jobs are memory-only.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use crate::{CoreError, EnhancementJob, ExtractionJob, JobStatus};

pub struct JobRegistry {
    extraction: DashMap<String, ExtractionJob>,
    enhancement: DashMap<String, EnhancementJob>,
    jobs_dir: PathBuf,
}

impl JobRegistry {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            extraction: DashMap::new(),
            enhancement: DashMap::new(),
            jobs_dir: jobs_dir.into(),
        }
    }

    // ── Extraction jobs (persisted) ────────────────────────────────────

    pub fn insert_extraction(&self, job: ExtractionJob) -> Result<(), CoreError> {
        self.persist(&job)?;
        self.extraction.insert(job.job_id.clone(), job);
        Ok(())
    }

    /// Record a progress checkpoint. Progress is clamped to be
    /// non-decreasing so a concurrent poll never observes it move
    /// backwards.
    pub fn checkpoint_extraction(&self, job_id: &str, progress: u8) -> Result<(), CoreError> {
        self.mutate_extraction(job_id, |job| {
            job.progress = job.progress.max(progress.min(100));
        })
    }

    pub fn complete_extraction(
        &self,
        job_id: &str,
        extracted: usize,
        total: usize,
    ) -> Result<(), CoreError> {
        self.mutate_extraction(job_id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.extracted_references = extracted;
            job.total_references = total;
            job.completed_at = Some(Utc::now());
        })
    }

    pub fn fail_extraction(&self, job_id: &str, error: String) {
        tracing::warn!(job_id, %error, "extraction job failed");
        // A persist failure here has nowhere better to go than the log.
        if let Err(e) = self.mutate_extraction(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.completed_at = Some(Utc::now());
        }) {
            tracing::error!(job_id, error = %e, "could not record job failure");
        }
    }

    fn mutate_extraction(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut ExtractionJob),
    ) -> Result<(), CoreError> {
        let snapshot = {
            let mut entry = self
                .extraction
                .get_mut(job_id)
                .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))?;
            f(entry.value_mut());
            entry.value().clone()
        };
        self.persist(&snapshot)
    }

    /// In-memory first, falling back to the persisted snapshot (jobs
    /// survive restarts).
    pub fn get_extraction(&self, job_id: &str) -> Option<ExtractionJob> {
        if let Some(job) = self.extraction.get(job_id) {
            return Some(job.value().clone());
        }
        self.load_persisted(job_id)
    }

    /// All persisted extraction jobs, newest first.
    pub fn list_extraction(&self) -> Result<Vec<ExtractionJob>, CoreError> {
        if !self.jobs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut jobs = Vec::new();
        for entry in std::fs::read_dir(&self.jobs_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(CoreError::from)
                .and_then(|c| serde_json::from_str(&c).map_err(CoreError::from))
            {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable job file")
                }
            }
        }
        jobs.sort_by(|a: &ExtractionJob, b: &ExtractionJob| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    pub fn delete_extraction(&self, job_id: &str) -> Result<(), CoreError> {
        self.extraction.remove(job_id);
        let path = self.job_path(job_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    // ── Enhancement jobs (memory only) ─────────────────────────────────

    pub fn insert_enhancement(&self, job: EnhancementJob) {
        self.enhancement.insert(job.job_id.clone(), job);
    }

    pub fn mutate_enhancement(&self, job_id: &str, f: impl FnOnce(&mut EnhancementJob)) {
        if let Some(mut entry) = self.enhancement.get_mut(job_id) {
            f(entry.value_mut());
        }
    }

    pub fn fail_enhancement(&self, job_id: &str, error: String) {
        tracing::warn!(job_id, %error, "enhancement job failed");
        self.mutate_enhancement(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.completed_at = Some(Utc::now());
        });
    }

    pub fn get_enhancement(&self, job_id: &str) -> Option<EnhancementJob> {
        self.enhancement.get(job_id).map(|j| j.value().clone())
    }

    // ── Eviction ───────────────────────────────────────────────────────

    /// Drop finished in-memory entries older than `retention`. Persisted
    /// snapshots are left in place; `delete_extraction` removes those.
    pub fn evict_finished(&self, retention: Duration) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
        self.extraction.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.is_some_and(|t| t < cutoff))
        });
        self.enhancement.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.is_some_and(|t| t < cutoff))
        });
    }

    // ── Persistence helpers ────────────────────────────────────────────

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{job_id}.json"))
    }

    fn persist(&self, job: &ExtractionJob) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.jobs_dir)?;
        let content = serde_json::to_string_pretty(job)?;
        std::fs::write(self.job_path(&job.job_id), content)?;
        Ok(())
    }

    fn load_persisted(&self, job_id: &str) -> Option<ExtractionJob> {
        let content = std::fs::read_to_string(self.job_path(job_id)).ok()?;
        serde_json::from_str(&content).ok()
    }
}
