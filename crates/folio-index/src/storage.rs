//! Persistence of search artifacts.
//!
//! A built corpus is stored as two JSON files in one directory:
//! - `index.json`: the [`SearchArtifact`], everything a query process needs
//! - `manifest.json`: the [`IndexManifest`] describing the build
//!
//! Writes are plain overwrites. A failed or interrupted build is recovered by
//! building again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::BuildOutput;
use crate::document::Persona;
use crate::manifest::IndexManifest;
use crate::registry::TextRegistry;
use crate::search::CorpusIndex;

/// Artifact file name.
pub const INDEX_FILE: &str = "index.json";

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current artifact format. Bumped whenever the persisted layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

/// Everything needed to answer queries without the source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchArtifact {
    pub version: u32,
    pub index: CorpusIndex,
    /// Registry of the indexed texts, for title filters and citations
    pub texts: TextRegistry,
    /// Sorted, de-duplicated speakers across all plays
    pub speakers: Vec<Persona>,
}

impl SearchArtifact {
    pub fn new(index: CorpusIndex, texts: TextRegistry, mut speakers: Vec<Persona>) -> Self {
        speakers.sort();
        speakers.dedup();
        Self {
            version: ARTIFACT_VERSION,
            index,
            texts,
            speakers,
        }
    }

    /// Speaker names for completion, without duplicates.
    pub fn speaker_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.speakers.iter().map(|p| p.name.as_str()).collect();
        names.dedup();
        names
    }
}

/// Reads and writes the files of one artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store for the given directory. Nothing is touched until
    /// [`save`](Self::save) or a load.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Check if a built artifact exists.
    pub fn exists(&self) -> bool {
        self.index_path().exists()
    }

    /// Write artifact and manifest.
    pub fn save(&self, output: &BuildOutput) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create artifact directory: {:?}", self.dir))?;

        let index_path = self.index_path();
        let index_json =
            serde_json::to_string(&output.artifact).context("Failed to serialize search artifact")?;
        fs::write(&index_path, index_json)
            .with_context(|| format!("Failed to write index file: {:?}", index_path))?;

        let manifest_path = self.manifest_path();
        output
            .manifest
            .save(&manifest_path)
            .with_context(|| format!("Failed to write manifest file: {:?}", manifest_path))?;

        info!(
            "Saved {} units from {} texts to {:?}",
            output.artifact.index.len(),
            output.manifest.texts.len(),
            self.dir
        );
        Ok(())
    }

    /// Load the search artifact, checking its version and internal consistency.
    pub fn load_artifact(&self) -> Result<SearchArtifact> {
        let index_path = self.index_path();
        let content = fs::read_to_string(&index_path)
            .with_context(|| format!("Failed to read index file: {:?}", index_path))?;

        let artifact: SearchArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse index JSON: {:?}", index_path))?;

        if artifact.version != ARTIFACT_VERSION {
            bail!(
                "Index {:?} has format version {}, expected {}; rebuild it",
                index_path,
                artifact.version,
                ARTIFACT_VERSION
            );
        }
        artifact
            .index
            .check_consistency()
            .with_context(|| format!("Index {:?} is inconsistent", index_path))?;

        debug!("Loaded {} units from {:?}", artifact.index.len(), index_path);
        Ok(artifact)
    }

    pub fn load_manifest(&self) -> Result<IndexManifest> {
        let manifest_path = self.manifest_path();
        IndexManifest::load(&manifest_path)
            .with_context(|| format!("Failed to load manifest: {:?}", manifest_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::BuildStats;
    use crate::registry::{TextEntry, TextKind};
    use crate::unit::{DraftUnit, Gender};
    use tempfile::tempdir;

    fn output() -> BuildOutput {
        let texts = TextRegistry::new(vec![TextEntry::new("Tmp", "The Tempest", TextKind::Play)]).unwrap();
        let units = vec![DraftUnit::plain("Tmp.0.0.0".to_string(), "Full fathom five".to_string()).with_id(0)];
        let index = CorpusIndex::build(units).unwrap();
        let speakers = vec![
            Persona {
                name: "Ariel".to_string(),
                gender: Some(Gender::M),
            },
            Persona {
                name: "Ariel".to_string(),
                gender: Some(Gender::M),
            },
        ];
        let mut manifest = IndexManifest::new();
        manifest.record_text("Tmp", "tempest_ps.xml".to_string(), "abc".to_string(), 1);
        BuildOutput {
            artifact: SearchArtifact::new(index, texts, speakers),
            manifest,
            stats: BuildStats::default(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"));
        assert!(!store.exists());

        store.save(&output()).unwrap();
        assert!(store.exists());

        let artifact = store.load_artifact().unwrap();
        assert_eq!(artifact.index.len(), 1);
        assert_eq!(artifact.texts.get("tmp").unwrap().title, "The Tempest");
        assert_eq!(artifact.speaker_names(), vec!["Ariel"]);

        let manifest = store.load_manifest().unwrap();
        assert_eq!(manifest.total_units, 1);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut output = output();
        output.artifact.version = ARTIFACT_VERSION + 1;
        store.save(&output).unwrap();

        let err = store.load_artifact().unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.load_artifact().is_err());
        assert!(store.load_manifest().is_err());
    }
}
