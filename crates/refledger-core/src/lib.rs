//! Core types and orchestration for the reference ledger.
//!
//! The master table of extracted bibliographic records lives in the
//! [`store::RecordStore`]; asynchronous extraction and enhancement runs
//! are tracked by the [`registry::JobRegistry`] and driven by the two
//! orchestrators. Callers never block on a submission — they poll job
//! state through the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config_file;
pub mod enhancement;
pub mod extraction;
pub mod registry;
pub mod store;

pub use enhancement::EnhancementOrchestrator;
pub use extraction::{ExtractionOrchestrator, PageText, PageTextSource};
pub use registry::JobRegistry;
pub use store::{MergeOutcome, RecordPatch, RecordStore, StoreStats};

use refledger_llm::{ExtractedReference, LlmError};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("document text extraction failed: {0}")]
    PageText(String),
    #[error("no valid references were extracted")]
    EmptyExtraction,
    #[error("job not found: {0}")]
    JobNotFound(String),
}

/// Extraction confidence attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// How a record entered the ledger. Only model extraction exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[serde(rename = "llm")]
    Llm,
}

/// One bibliographic entry in the master table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub citation_key: String,
    pub first_author: String,
    /// Semicolon-joined remaining authors.
    pub other_authors: String,
    pub title: String,
    /// Kept as a string; years like "1999a" or "n.d." occur in the wild.
    pub year: String,
    pub publisher_journal: String,
    pub volume_issue: String,
    pub pages: String,
    pub extra_notes: String,
    pub isbn: String,
    /// Populated only by the enhancement orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_author_affiliation: Option<String>,
    /// Original source text, used as a dedup fallback.
    pub reference_raw: String,
    pub confidence: Confidence,
    pub extraction_method: ExtractionMethod,
}

impl Record {
    /// Model output becomes a record with confidence pinned to `high`.
    /// The model's self-assessment is currently discarded; downstream
    /// stats treat confidence as meaningful, so revisit before changing.
    pub fn from_extracted(e: ExtractedReference) -> Self {
        Self {
            citation_key: e.citation_key,
            first_author: e.first_author,
            other_authors: e.other_authors,
            title: e.title,
            year: e.year,
            publisher_journal: e.publisher_journal,
            volume_issue: e.volume_issue,
            pages: e.pages,
            extra_notes: e.extra_notes,
            isbn: e.isbn,
            first_author_affiliation: None,
            reference_raw: e.reference_raw,
            confidence: Confidence::High,
            extraction_method: ExtractionMethod::Llm,
        }
    }

    /// A record with neither title nor first author must never reach the
    /// store.
    pub fn is_valid(&self) -> bool {
        !(self.title.trim().is_empty() && self.first_author.trim().is_empty())
    }
}

/// Terminal and non-terminal job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Tracks one document's extraction run. Persisted so job history
/// survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionJob {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_references: usize,
    pub extracted_references: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExtractionJob {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            progress: 0,
            total_references: 0,
            extracted_references: 0,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Human-readable label for the current pipeline step, derived from
    /// the checkpoint progress values.
    pub fn step(&self) -> &'static str {
        match self.status {
            JobStatus::Failed => "failed",
            JobStatus::Completed => "done",
            JobStatus::Processing => match self.progress {
                0..30 => "reading document",
                30..90 => "extracting references",
                _ => "merging records",
            },
        }
    }
}

/// Tracks one enhancement run. In-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementJob {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_references: usize,
    pub processed_references: usize,
    pub enhanced_references: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnhancementJob {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            progress: 0,
            total_references: 0,
            processed_references: 0,
            enhanced_references: 0,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Opaque job token: millisecond timestamp plus random tail.
pub fn new_job_id() -> String {
    format!(
        "{:x}-{:08x}",
        Utc::now().timestamp_millis(),
        fastrand::u32(..)
    )
}
