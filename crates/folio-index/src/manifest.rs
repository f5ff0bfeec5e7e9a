//! Build manifest: what went into an index and what was left out.
//!
//! The manifest is written next to the search artifact. It records each
//! indexed text with its content hash, every document that failed to load,
//! and the structural issues found while extracting.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::extractor::ExtractIssue;

/// Current manifest format.
pub const MANIFEST_VERSION: u32 = 1;

/// Manifest for one corpus build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Version of the manifest format
    pub version: u32,

    /// Unix seconds at build time
    pub built_at: u64,

    /// Abbreviation -> indexed text
    pub texts: BTreeMap<String, TextState>,

    /// Documents excluded from the corpus
    #[serde(default)]
    pub failures: Vec<BuildFailure>,

    /// Abbreviation -> issues found during extraction
    #[serde(default)]
    pub issues: BTreeMap<String, Vec<ExtractIssue>>,

    /// Total number of units in the index
    pub total_units: usize,
}

/// State of an indexed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextState {
    /// Source file name
    pub file: String,

    /// SHA256 hash of the file content
    pub content_hash: String,

    /// Number of units extracted
    pub unit_count: usize,
}

/// A document that could not be read, parsed or extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub file: String,
    pub error: String,
}

impl IndexManifest {
    /// Create a new empty manifest stamped with the current time.
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            built_at: now(),
            ..Self::default()
        }
    }

    /// Load manifest from a file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(ManifestError::Io)?;
        serde_json::from_str(&content).map_err(ManifestError::Parse)
    }

    /// Save manifest to a file.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)?;
        std::fs::write(path, content).map_err(ManifestError::Io)
    }

    /// Record that a text was indexed.
    pub fn record_text(&mut self, abbreviation: &str, file: String, content_hash: String, unit_count: usize) {
        // Replace any earlier record for the same text
        if let Some(old_state) = self.texts.get(abbreviation) {
            self.total_units -= old_state.unit_count;
        }
        self.total_units += unit_count;

        self.texts.insert(
            abbreviation.to_string(),
            TextState {
                file,
                content_hash,
                unit_count,
            },
        );
    }

    /// Record a document that was excluded.
    pub fn record_failure(&mut self, file: impl Into<String>, error: impl ToString) {
        self.failures.push(BuildFailure {
            file: file.into(),
            error: error.to_string(),
        });
    }

    /// Record extraction issues for a text. Empty lists are not kept.
    pub fn record_issues(&mut self, abbreviation: &str, issues: Vec<ExtractIssue>) {
        if !issues.is_empty() {
            self.issues.entry(abbreviation.to_string()).or_default().extend(issues);
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }
}

/// Hex-encoded SHA256 of some content.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Get current time as Unix timestamp.
fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors that can occur with manifest operations.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}
