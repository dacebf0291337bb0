//! Extraction orchestration: submit a document, get back a job id, poll.
//!
//! The submit call validates synchronously and then detaches the actual
//! work onto the runtime. The worker reports through the registry at
//! fixed checkpoints (text ready, model done, merge done) and records
//! any failure on the job rather than letting it vanish with the task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use refledger_llm::ReferenceExtractor;

use crate::{CoreError, ExtractionJob, JobRegistry, Record, RecordStore, new_job_id};

/// Text recovered from one page of a document.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// Anything that can turn a document into page text. The web layer
/// provides an implementation over uploaded files; tests script one.
pub trait PageTextSource: Send + Sync {
    fn name(&self) -> &str;

    fn page_text<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PageText>, CoreError>> + Send + 'a>>;
}

pub struct ExtractionOrchestrator {
    extractor: Arc<ReferenceExtractor>,
    store: Arc<RecordStore>,
    registry: Arc<JobRegistry>,
}

impl ExtractionOrchestrator {
    pub fn new(
        extractor: Arc<ReferenceExtractor>,
        store: Arc<RecordStore>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            extractor,
            store,
            registry,
        }
    }

    /// Submit already-extracted document text. Empty input is rejected
    /// here, synchronously, so the caller never gets a job id for a
    /// document that cannot possibly produce references.
    pub fn submit_text(&self, text: String) -> Result<String, CoreError> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "document contains no extractable text".to_string(),
            ));
        }

        let job_id = new_job_id();
        self.registry
            .insert_extraction(ExtractionJob::new(job_id.clone()))?;
        tracing::info!(job_id, chars = text.len(), "extraction job submitted");

        let extractor = Arc::clone(&self.extractor);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = run_extraction(&extractor, &store, &registry, &id, text).await {
                registry.fail_extraction(&id, e.to_string());
            }
        });

        Ok(job_id)
    }

    /// Submit a document through a page-text source. The job exists
    /// immediately; page-text recovery runs inside the detached worker,
    /// so a slow or failing source shows up as job progress or a failed
    /// job rather than blocking the caller.
    pub fn submit_source(&self, source: Arc<dyn PageTextSource>) -> Result<String, CoreError> {
        let job_id = new_job_id();
        self.registry
            .insert_extraction(ExtractionJob::new(job_id.clone()))?;
        tracing::info!(job_id, source = source.name(), "extraction job submitted");

        let extractor = Arc::clone(&self.extractor);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) =
                run_source_extraction(&extractor, &store, &registry, &id, source.as_ref()).await
            {
                registry.fail_extraction(&id, e.to_string());
            }
        });

        Ok(job_id)
    }
}

async fn run_source_extraction(
    extractor: &ReferenceExtractor,
    store: &RecordStore,
    registry: &JobRegistry,
    job_id: &str,
    source: &dyn PageTextSource,
) -> Result<(), CoreError> {
    let pages = source.page_text().await?;
    let text = join_pages(&pages);
    if text.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "no extractable text in {}",
            source.name()
        )));
    }
    run_extraction(extractor, store, registry, job_id, text).await
}

async fn run_extraction(
    extractor: &ReferenceExtractor,
    store: &RecordStore,
    registry: &JobRegistry,
    job_id: &str,
    text: String,
) -> Result<(), CoreError> {
    // Text is in hand.
    registry.checkpoint_extraction(job_id, 30)?;

    let extracted = extractor.extract(&text).await?;
    let records: Vec<Record> = extracted
        .into_iter()
        .map(Record::from_extracted)
        .filter(Record::is_valid)
        .collect();
    if records.is_empty() {
        return Err(CoreError::EmptyExtraction);
    }
    let extracted_count = records.len();
    registry.checkpoint_extraction(job_id, 90)?;

    let outcome = store.merge(records)?;
    tracing::info!(
        job_id,
        extracted = extracted_count,
        added = outcome.added,
        duplicates = outcome.duplicates,
        "extraction complete"
    );
    registry.complete_extraction(job_id, extracted_count, outcome.total)?;
    Ok(())
}

fn join_pages(pages: &[PageText]) -> String {
    let mut out = String::new();
    for page in pages {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&page.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobStatus;
    use refledger_llm::mock::MockModel;
    use std::time::Duration;

    fn orchestrator(
        model: Arc<MockModel>,
        dir: &tempfile::TempDir,
    ) -> ExtractionOrchestrator {
        let extractor = Arc::new(ReferenceExtractor::new(model, reqwest::Client::new()));
        let store = Arc::new(RecordStore::new(dir.path().join("records.json")));
        let registry = Arc::new(JobRegistry::new(dir.path().join("jobs")));
        ExtractionOrchestrator::new(extractor, store, registry)
    }

    async fn wait_terminal(orch: &ExtractionOrchestrator, job_id: &str) -> ExtractionJob {
        for _ in 0..200 {
            let job = orch.registry.get_extraction(job_id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(Arc::new(MockModel::always("[]".into())), &dir);
        let err = orch.submit_text("   \n ".into()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn successful_run_merges_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let response = r#"{"references": [
            {"citationKey": "Wiener'48", "firstAuthor": "N. Wiener", "title": "Cybernetics"}
        ]}"#;
        let orch = orchestrator(Arc::new(MockModel::always(response.into())), &dir);

        let job_id = orch.submit_text("References\n[1] N. Wiener...".into()).unwrap();
        let job = wait_terminal(&orch, &job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.extracted_references, 1);
        assert_eq!(job.total_references, 1);

        let records = orch.store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].citation_key, "Wiener'48");
    }

    #[tokio::test]
    async fn resubmission_counts_duplicates_in_total() {
        let dir = tempfile::tempdir().unwrap();
        let response = r#"[{"citationKey": "K1", "title": "T"}]"#;
        let orch = orchestrator(Arc::new(MockModel::always(response.into())), &dir);

        let first = orch.submit_text("doc one".into()).unwrap();
        wait_terminal(&orch, &first).await;
        let second = orch.submit_text("doc two".into()).unwrap();
        let job = wait_terminal(&orch, &second).await;

        assert_eq!(job.status, JobStatus::Completed);
        // One reference came back from the model, but the table is unchanged.
        assert_eq!(job.extracted_references, 1);
        assert_eq!(job.total_references, 1);
        assert_eq!(orch.store.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn model_failure_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            Arc::new(MockModel::with_sequence(vec![Err(
                refledger_llm::LlmError::Http("HTTP 500".into()),
            )])),
            &dir,
        );

        let job_id = orch.submit_text("some document".into()).unwrap();
        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("HTTP 500"));
        assert!(orch.store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_valid_references_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        // Parseable, but every entry is filtered out.
        let response = r#"[{"citationKey": "unknown-1"}]"#;
        let orch = orchestrator(Arc::new(MockModel::always(response.into())), &dir);

        let job_id = orch.submit_text("a page of prose".into()).unwrap();
        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
    }

    struct ScriptedSource {
        pages: Vec<PageText>,
        fail: Option<String>,
    }

    impl PageTextSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn page_text<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PageText>, CoreError>> + Send + 'a>> {
            Box::pin(async move {
                match &self.fail {
                    Some(msg) => Err(CoreError::PageText(msg.clone())),
                    None => Ok(self.pages.clone()),
                }
            })
        }
    }

    #[tokio::test]
    async fn source_pages_are_joined_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let response = r#"[{"citationKey": "K1", "title": "T"}]"#;
        let orch = orchestrator(Arc::new(MockModel::always(response.into())), &dir);

        let source = Arc::new(ScriptedSource {
            pages: vec![
                PageText { page_number: 1, text: "Body text".into() },
                PageText { page_number: 2, text: "References".into() },
            ],
            fail: None,
        });
        let job_id = orch.submit_source(source).unwrap();
        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn empty_source_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(Arc::new(MockModel::always("[]".into())), &dir);
        let source = Arc::new(ScriptedSource {
            pages: vec![PageText { page_number: 1, text: "  ".into() }],
            fail: None,
        });
        // The caller gets a job id immediately; the empty document is
        // discovered inside the worker.
        let job_id = orch.submit_source(source).unwrap();
        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("no extractable text"));
    }

    #[tokio::test]
    async fn source_failure_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(Arc::new(MockModel::always("[]".into())), &dir);
        let source = Arc::new(ScriptedSource {
            pages: Vec::new(),
            fail: Some("corrupt document".into()),
        });
        let job_id = orch.submit_source(source).unwrap();
        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("corrupt document"));
    }
}
