use std::sync::Arc;

use refledger_core::{EnhancementOrchestrator, ExtractionOrchestrator, JobRegistry, RecordStore};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub registry: Arc<JobRegistry>,
    pub extraction: ExtractionOrchestrator,
    pub enhancement: EnhancementOrchestrator,
}
