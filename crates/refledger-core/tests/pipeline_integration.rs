//! End-to-end pipeline tests: submit document text through the extraction
//! orchestrator, then enhance the stored records through a scripted
//! resolver tier. No HTTP requests are made — the model and the lookup
//! tier are both mocks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use refledger_affiliation::mock::MockTier;
use refledger_affiliation::{AffiliationResolver, ResolveConfidence};
use refledger_core::{
    EnhancementOrchestrator, ExtractionOrchestrator, JobRegistry, JobStatus, RecordStore,
};
use refledger_llm::ReferenceExtractor;
use refledger_llm::mock::MockModel;

struct Pipeline {
    _dir: tempfile::TempDir,
    store: Arc<RecordStore>,
    registry: Arc<JobRegistry>,
    extraction: ExtractionOrchestrator,
    enhancement: EnhancementOrchestrator,
}

fn pipeline(model: MockModel, tier: Arc<MockTier>) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordStore::new(dir.path().join("records.json")));
    let registry = Arc::new(JobRegistry::new(dir.path().join("jobs")));

    let extractor = Arc::new(ReferenceExtractor::new(
        Arc::new(model),
        reqwest::Client::new(),
    ));
    let extraction =
        ExtractionOrchestrator::new(extractor, Arc::clone(&store), Arc::clone(&registry));

    let resolver = Arc::new(AffiliationResolver::with_tiers(
        vec![tier],
        reqwest::Client::new(),
    ));
    let enhancement =
        EnhancementOrchestrator::new(resolver, Arc::clone(&store), Arc::clone(&registry));

    Pipeline {
        _dir: dir,
        store,
        registry,
        extraction,
        enhancement,
    }
}

fn scripted_tier(response: Result<Option<String>, String>) -> Arc<MockTier> {
    Arc::new(
        MockTier::new("semantic-scholar", response, Arc::new(Mutex::new(Vec::new())))
            .with_confidence(ResolveConfidence::High),
    )
}

async fn wait_extraction(p: &Pipeline, job_id: &str) -> refledger_core::ExtractionJob {
    for _ in 0..300 {
        let job = p.registry.get_extraction(job_id).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("extraction job never finished");
}

async fn wait_enhancement(p: &Pipeline, job_id: &str) -> refledger_core::EnhancementJob {
    for _ in 0..300 {
        let job = p.registry.get_enhancement(job_id).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("enhancement job never finished");
}

const MODEL_RESPONSE: &str = r#"{"references": [
    {"citationKey": "Wiener'48", "firstAuthor": "N. Wiener", "title": "Cybernetics", "year": "1948"},
    {"citationKey": "Turing'50", "firstAuthor": "A. M. Turing", "title": "Computing Machinery and Intelligence", "year": "1950"}
]}"#;

#[tokio::test]
async fn extract_then_enhance_fills_affiliations() {
    let tier = scripted_tier(Ok(Some("MIT (US)".into())));
    let p = pipeline(MockModel::always(MODEL_RESPONSE.into()), tier.clone());

    let job_id = p
        .extraction
        .submit_text("References\n[1] Wiener...\n[2] Turing...".into())
        .unwrap();
    let job = wait_extraction(&p, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.extracted_references, 2);
    assert_eq!(job.total_references, 2);

    let enh_id = p.enhancement.start();
    let enh = wait_enhancement(&p, &enh_id).await;
    assert_eq!(enh.status, JobStatus::Completed);
    assert_eq!(enh.total_references, 2);
    assert_eq!(enh.enhanced_references, 2);

    let records = p.store.load().unwrap();
    for record in &records {
        assert_eq!(record.first_author_affiliation.as_deref(), Some("MIT (US)"));
    }
}

#[tokio::test]
async fn resubmitting_the_same_document_adds_nothing() {
    let tier = scripted_tier(Ok(None));
    let p = pipeline(MockModel::always(MODEL_RESPONSE.into()), tier);

    let first = p.extraction.submit_text("doc".into()).unwrap();
    wait_extraction(&p, &first).await;
    let second = p.extraction.submit_text("doc again".into()).unwrap();
    let job = wait_extraction(&p, &second).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_references, 2);
    assert_eq!(p.store.load().unwrap().len(), 2);
}

#[tokio::test]
async fn second_enhancement_run_skips_already_enhanced_records() {
    let tier = scripted_tier(Ok(Some("ETH Zurich".into())));
    let p = pipeline(MockModel::always(MODEL_RESPONSE.into()), tier.clone());

    let job_id = p.extraction.submit_text("doc".into()).unwrap();
    wait_extraction(&p, &job_id).await;

    let first = p.enhancement.start();
    wait_enhancement(&p, &first).await;
    let calls_after_first = tier.call_count();
    assert_eq!(calls_after_first, 2);

    let second = p.enhancement.start();
    let enh = wait_enhancement(&p, &second).await;
    assert_eq!(enh.total_references, 0);
    assert_eq!(tier.call_count(), calls_after_first);
}

#[tokio::test]
async fn tier_misses_leave_records_unenhanced_but_complete() {
    let tier = scripted_tier(Ok(None));
    let p = pipeline(MockModel::always(MODEL_RESPONSE.into()), tier);

    let job_id = p.extraction.submit_text("doc".into()).unwrap();
    wait_extraction(&p, &job_id).await;

    let enh_id = p.enhancement.start();
    let enh = wait_enhancement(&p, &enh_id).await;
    assert_eq!(enh.status, JobStatus::Completed);
    assert_eq!(enh.processed_references, 2);
    assert_eq!(enh.enhanced_references, 0);
    assert!(p
        .store
        .load()
        .unwrap()
        .iter()
        .all(|r| r.first_author_affiliation.is_none()));
}
