//! Enhancement orchestration: walk the stored records and fill in first
//! author affiliations through the tiered resolver.
//!
//! The run is strictly sequential — one record, one resolver call — so
//! the per-tier rate limiters see a single caller. The collection is
//! loaded once at the start and saved once at the end; a record whose
//! resolution misses is counted as processed but left untouched.

use std::sync::Arc;

use chrono::Utc;
use refledger_affiliation::AffiliationResolver;

use crate::{CoreError, EnhancementJob, JobRegistry, JobStatus, RecordStore, new_job_id};

pub struct EnhancementOrchestrator {
    resolver: Arc<AffiliationResolver>,
    store: Arc<RecordStore>,
    registry: Arc<JobRegistry>,
}

impl EnhancementOrchestrator {
    pub fn new(
        resolver: Arc<AffiliationResolver>,
        store: Arc<RecordStore>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            resolver,
            store,
            registry,
        }
    }

    /// Start an enhancement run over every record that has a first author
    /// but no affiliation yet. Returns the job id immediately.
    pub fn start(&self) -> String {
        let job_id = new_job_id();
        self.registry
            .insert_enhancement(EnhancementJob::new(job_id.clone()));
        tracing::info!(job_id, "enhancement job started");

        let resolver = Arc::clone(&self.resolver);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = run_enhancement(&resolver, &store, &registry, &id).await {
                registry.fail_enhancement(&id, e.to_string());
            }
        });

        job_id
    }
}

async fn run_enhancement(
    resolver: &AffiliationResolver,
    store: &RecordStore,
    registry: &JobRegistry,
    job_id: &str,
) -> Result<(), CoreError> {
    let mut records = store.load()?;

    let pending: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            !r.first_author.trim().is_empty() && r.first_author_affiliation.is_none()
        })
        .map(|(i, _)| i)
        .collect();

    let total = pending.len();
    registry.mutate_enhancement(job_id, |job| job.total_references = total);

    if total == 0 {
        registry.mutate_enhancement(job_id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(Utc::now());
        });
        tracing::info!(job_id, "nothing to enhance");
        return Ok(());
    }

    let mut enhanced = 0usize;
    for (done, index) in pending.into_iter().enumerate() {
        let (author, title, year) = {
            let r = &records[index];
            (r.first_author.clone(), r.title.clone(), r.year.clone())
        };
        let resolution = resolver.resolve(&author, &title, &year).await;
        if let Some(affiliation) = resolution.affiliation {
            records[index].first_author_affiliation = Some(affiliation);
            enhanced += 1;
        }

        let processed = done + 1;
        registry.mutate_enhancement(job_id, |job| {
            job.processed_references = processed;
            job.enhanced_references = enhanced;
            job.progress = ((processed * 100) / total) as u8;
        });
    }

    store.save(&records)?;
    registry.mutate_enhancement(job_id, |job| {
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.completed_at = Some(Utc::now());
    });
    tracing::info!(job_id, total, enhanced, "enhancement complete");
    Ok(())
}
