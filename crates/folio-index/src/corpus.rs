//! Corpus build: from source files to a search artifact.
//!
//! Each document is parsed and extracted on its own, possibly on a worker
//! thread, into a [`Corpus`] part with ids starting at zero. Parts are then
//! merged in a fixed order and renumbered into one dense id space, so the
//! final ids do not depend on which worker finished first.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{Persona, SourceDocument};
use crate::extractor::{ExtractIssue, ExtractOptions, Extractor};
use crate::manifest::{content_hash, IndexManifest};
use crate::registry::{SpeakerRegistry, TextEntry, TextRegistry};
use crate::search::{CorpusIndex, IndexError};
use crate::storage::SearchArtifact;
use crate::unit::{DraftUnit, TextUnit, UnitId};
use crate::xml::parse_document;

/// Extracted units plus the issues found on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub units: Vec<TextUnit>,
    /// Abbreviation -> issues
    pub issues: BTreeMap<String, Vec<ExtractIssue>>,
}

impl Corpus {
    /// Concatenate independently numbered parts, renumbering units into one
    /// dense id space in part order.
    pub fn merge(parts: impl IntoIterator<Item = Corpus>) -> Corpus {
        let mut merged = Corpus::default();
        for part in parts {
            let offset = merged.units.len() as UnitId;
            merged.units.extend(part.units.into_iter().map(|mut unit| {
                unit.id += offset;
                unit
            }));
            for (abbreviation, issues) in part.issues {
                merged.issues.entry(abbreviation).or_default().extend(issues);
            }
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_index(self) -> Result<CorpusIndex, IndexError> {
        CorpusIndex::build(self.units)
    }
}

/// Assigns dense ids to extracted units as they arrive.
#[derive(Debug, Default)]
pub struct UnitAccumulator {
    corpus: Corpus,
}

impl UnitAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next absorbed unit will get.
    pub fn next_id(&self) -> UnitId {
        self.corpus.units.len() as UnitId
    }

    /// Drain one document's extraction. Returns the number of units added.
    pub fn absorb(
        &mut self,
        abbreviation: &str,
        extraction: impl Iterator<Item = Result<DraftUnit, ExtractIssue>>,
    ) -> usize {
        let before = self.corpus.units.len();
        for item in extraction {
            match item {
                Ok(draft) => {
                    let id = self.next_id();
                    self.corpus.units.push(draft.with_id(id));
                }
                Err(issue) => {
                    debug!("{}", issue);
                    self.corpus
                        .issues
                        .entry(abbreviation.to_string())
                        .or_default()
                        .push(issue);
                }
            }
        }
        self.corpus.units.len() - before
    }

    pub fn finish(self) -> Corpus {
        self.corpus
    }
}

/// Statistics about a corpus build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of documents indexed
    pub documents_indexed: usize,
    /// Number of documents excluded after an error
    pub documents_failed: usize,
    /// Number of XML files with no registry entry
    pub files_skipped: usize,
    /// Number of units in the index
    pub units: usize,
    /// Total time in milliseconds
    pub duration_ms: u64,
}

/// Result of a corpus build, ready to be saved.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub artifact: SearchArtifact,
    pub manifest: IndexManifest,
    pub stats: BuildStats,
}

/// One extracted document.
#[derive(Debug)]
struct DocumentPart {
    entry: TextEntry,
    file: String,
    content_hash: String,
    corpus: Corpus,
    speakers: Vec<Persona>,
}

/// Builds a corpus from the texts of a registry.
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    registry: TextRegistry,
    options: ExtractOptions,
}

impl CorpusBuilder {
    pub fn new(registry: TextRegistry, options: ExtractOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &TextRegistry {
        &self.registry
    }

    /// Build from every registered `*.xml` file below `dir`.
    ///
    /// Documents are parsed and extracted in parallel on blocking worker
    /// threads. A document that cannot be read, parsed or extracted is
    /// logged, recorded in the manifest and left out.
    pub async fn build_dir(&self, dir: &Path) -> Result<BuildOutput> {
        let start = Instant::now();
        info!("Building corpus from {:?}", dir);

        let mut stats = BuildStats::default();
        let files = self.collect_files(dir, &mut stats)?;
        info!("Found {} registered texts", files.len());

        let handles: Vec<_> = files
            .into_iter()
            .map(|(path, entry)| {
                let options = self.options;
                let worker_path = path.clone();
                let handle = tokio::task::spawn_blocking(move || load_document(&worker_path, entry, options));
                (path, handle)
            })
            .collect();

        let mut manifest = IndexManifest::new();
        let mut parts = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = handle
                .await
                .with_context(|| format!("Worker for {:?} did not complete", path))
                .and_then(|loaded| loaded);
            match result {
                Ok(part) => parts.push(part),
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", path, e);
                    stats.documents_failed += 1;
                    manifest.record_failure(file_name(&path), format!("{:#}", e));
                }
            }
        }

        let mut output = self.assemble(parts, manifest, stats)?;
        output.stats.duration_ms = start.elapsed().as_millis() as u64;
        info!("Corpus build complete: {:?}", output.stats);
        Ok(output)
    }

    /// Build from documents already in memory, sequentially and in the
    /// given order.
    pub fn build_documents(&self, documents: &[(&str, &SourceDocument)]) -> Result<BuildOutput> {
        let mut parts = Vec::with_capacity(documents.len());
        for (abbreviation, document) in documents {
            let entry = self
                .registry
                .get(abbreviation)
                .with_context(|| format!("Unknown text: {}", abbreviation))?;
            parts.push(extract_part(entry.clone(), String::new(), String::new(), document, self.options));
        }
        self.assemble(parts, IndexManifest::new(), BuildStats::default())
    }

    fn collect_files(&self, dir: &Path, stats: &mut BuildStats) -> Result<Vec<(PathBuf, TextEntry)>> {
        if !dir.is_dir() {
            anyhow::bail!("Source directory not found: {:?}", dir);
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("xml"))
            .collect();
        // Sorted so that merge order, and with it every id, is reproducible
        paths.sort();

        let mut files = Vec::new();
        let mut seen = HashSet::new();
        for path in paths {
            match self.registry.by_file(&file_name(&path)) {
                Some(text) if seen.insert(text.abbreviation.clone()) => files.push((path, text.clone())),
                Some(text) => {
                    warn!("{:?} is a second copy of {}, skipping", path, text.abbreviation);
                    stats.files_skipped += 1;
                }
                None => {
                    warn!("No registry entry for {:?}, skipping", path);
                    stats.files_skipped += 1;
                }
            }
        }

        Ok(files)
    }

    fn assemble(&self, parts: Vec<DocumentPart>, mut manifest: IndexManifest, mut stats: BuildStats) -> Result<BuildOutput> {
        let mut texts = Vec::with_capacity(parts.len());
        let mut speakers = Vec::new();
        let mut corpora = Vec::with_capacity(parts.len());

        for part in parts {
            let abbreviation = part.entry.abbreviation.clone();
            manifest.record_text(&abbreviation, part.file, part.content_hash, part.corpus.len());
            speakers.extend(part.speakers);
            texts.push(part.entry);
            corpora.push(part.corpus);
        }

        let corpus = Corpus::merge(corpora);
        for (abbreviation, issues) in &corpus.issues {
            manifest.record_issues(abbreviation, issues.clone());
        }
        stats.documents_indexed = texts.len();
        stats.units = corpus.len();

        let index = corpus.into_index().context("Failed to build corpus index")?;
        let texts = TextRegistry::new(texts).context("Indexed texts do not form a valid registry")?;

        Ok(BuildOutput {
            artifact: SearchArtifact::new(index, texts, speakers),
            manifest,
            stats,
        })
    }
}

/// Read, parse and extract one source file. Runs on a worker thread.
fn load_document(path: &Path, entry: TextEntry, options: ExtractOptions) -> Result<DocumentPart> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let hash = content_hash(&bytes);
    let source = String::from_utf8(bytes).with_context(|| format!("{:?} is not valid UTF-8", path))?;
    let document =
        parse_document(&source, entry.kind).with_context(|| format!("Failed to parse {:?}", path))?;

    let part = extract_part(entry, file_name(path), hash, &document, options);
    debug!("Extracted {} units from {:?}", part.corpus.len(), path);
    Ok(part)
}

fn extract_part(
    entry: TextEntry,
    file: String,
    content_hash: String,
    document: &SourceDocument,
    options: ExtractOptions,
) -> DocumentPart {
    let (speakers, personae) = match document {
        SourceDocument::Play(play) => (SpeakerRegistry::from_play(play), play.personae.clone()),
        _ => (SpeakerRegistry::new(), Vec::new()),
    };

    let mut accumulator = UnitAccumulator::new();
    accumulator.absorb(
        &entry.abbreviation,
        Extractor::new(&entry, &speakers, options).extract(document),
    );

    DocumentPart {
        entry,
        file,
        content_hash,
        corpus: accumulator.finish(),
        speakers: personae,
    }
}

/// Find a registered source file anywhere below `dir`.
pub fn locate_source(dir: &Path, file: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == file)
        .map(|e| e.into_path())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
