//! The master table: a deduplicated, persisted collection of records.
//!
//! Persistence is write-through — every mutating call ends in a full
//! rewrite of the backing JSON file. There is no locking; two jobs whose
//! read-modify-write cycles interleave can lose updates (last writer
//! wins). Jobs are processed one at a time in practice, but testers
//! should be aware this is a weakness, not a guarantee.

use std::path::{Path, PathBuf};

use crate::{CoreError, Record};

/// Result of merging newly extracted records into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub duplicates: usize,
    /// Table size after the merge.
    pub total: usize,
}

/// Coarse heuristic counters over the table. The note buckets scan
/// `extraNotes` text, not the affiliation field; treat them as
/// placeholders, not authoritative numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub notes_mention_institution: usize,
    pub notes_empty: usize,
}

/// Fields the update path may overwrite on an existing record.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub first_author_affiliation: Option<String>,
    pub extra_notes: Option<String>,
}

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full collection; an absent file is an empty table.
    pub fn load(&self) -> Result<Vec<Record>, CoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Full rewrite of the persisted collection.
    pub fn save(&self, records: &[Record]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Merge new records into the table.
    ///
    /// A record is a duplicate when its citation key matches an existing
    /// one case-insensitively, or when its normalized raw reference text
    /// matches an existing record's. Duplicates are skipped outright —
    /// never merged into or overwritten.
    pub fn merge(&self, new_records: Vec<Record>) -> Result<MergeOutcome, CoreError> {
        let mut records = self.load()?;

        let mut keys: std::collections::HashSet<String> = records
            .iter()
            .map(|r| r.citation_key.to_lowercase())
            .collect();
        let mut raws: std::collections::HashSet<String> = records
            .iter()
            .map(|r| normalize_raw(&r.reference_raw))
            .filter(|s| !s.is_empty())
            .collect();

        let mut added = 0;
        let mut duplicates = 0;
        for record in new_records {
            let key = record.citation_key.to_lowercase();
            let raw = normalize_raw(&record.reference_raw);
            if keys.contains(&key) || (!raw.is_empty() && raws.contains(&raw)) {
                duplicates += 1;
                continue;
            }
            keys.insert(key);
            if !raw.is_empty() {
                raws.insert(raw);
            }
            records.push(record);
            added += 1;
        }

        self.save(&records)?;
        tracing::info!(added, duplicates, total = records.len(), "merged records");
        Ok(MergeOutcome {
            added,
            duplicates,
            total: records.len(),
        })
    }

    /// Shallow-merge `patch` into the record with the given citation key
    /// (case-insensitive). Returns `false` when no record matches.
    pub fn update_by_citation_key(
        &self,
        citation_key: &str,
        patch: RecordPatch,
    ) -> Result<bool, CoreError> {
        let mut records = self.load()?;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.citation_key.eq_ignore_ascii_case(citation_key))
        else {
            return Ok(false);
        };

        if let Some(affiliation) = patch.first_author_affiliation {
            record.first_author_affiliation = Some(affiliation);
        }
        if let Some(notes) = patch.extra_notes {
            record.extra_notes = notes;
        }

        self.save(&records)?;
        Ok(true)
    }

    /// Replace the table with an empty collection.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.save(&[])
    }

    pub fn stats(&self) -> Result<StoreStats, CoreError> {
        let records = self.load()?;
        let notes_mention_institution = records
            .iter()
            .filter(|r| {
                let notes = r.extra_notes.to_lowercase();
                notes.contains("university") || notes.contains("institute")
            })
            .count();
        let notes_empty = records
            .iter()
            .filter(|r| r.extra_notes.trim().is_empty())
            .count();
        Ok(StoreStats {
            total: records.len(),
            notes_mention_institution,
            notes_empty,
        })
    }
}

/// Dedup-fallback normalization of raw reference text: lowercase
/// alphanumerics with whitespace and punctuation collapsed away.
fn normalize_raw(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
