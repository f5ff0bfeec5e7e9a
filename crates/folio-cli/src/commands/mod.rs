pub mod build;
pub mod lookup;
pub mod search;
pub mod show;
pub mod speakers;

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use folio_index::{ArtifactStore, Filters, Match, QueryEngine, SearchArtifact, SearchOptions, TextRegistry};

use crate::cli::FilterArgs;

/// Load the persisted artifact from `index`.
pub(crate) fn load_artifact(index: &Path) -> Result<SearchArtifact> {
    let store = ArtifactStore::new(index);
    if !store.exists() {
        bail!("No index found at {:?}; run `folio build` first", index);
    }
    store
        .load_artifact()
        .with_context(|| format!("Failed to load index from {:?}", index))
}

pub(crate) fn open_engine(index: &Path, options: SearchOptions) -> Result<QueryEngine> {
    Ok(QueryEngine::new(load_artifact(index)?, options))
}

impl FilterArgs {
    pub(crate) fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        if let Some(speaker) = &self.speaker {
            filters = filters.speaker(speaker.as_str());
        }
        if let Some(gender) = self.gender {
            filters = filters.gender(gender);
        }
        if let Some(title) = &self.title {
            filters = filters.title(title.as_str());
        }
        for &kind in &self.kinds {
            filters = filters.kind(kind);
        }
        filters
    }
}

/// One line per match: citation, speaker when there is one, text.
pub(crate) fn print_matches(
    out: &mut dyn Write,
    texts: &TextRegistry,
    matches: &[Match],
    as_json: bool,
) -> Result<()> {
    for m in matches {
        let citation = m.citation(texts);
        if as_json {
            let line = json!({
                "citation": citation,
                "location": m.unit.location,
                "text": m.unit.text,
                "speaker": m.unit.speaker,
                "gender": m.unit.gender,
                "score": m.score,
                "exact": m.exact,
            });
            writeln!(out, "{}", line)?;
        } else {
            match &m.unit.speaker {
                Some(speaker) => writeln!(out, "{:<14} {}: {}", citation, speaker, m.unit.text)?,
                None => writeln!(out, "{:<14} {}", citation, m.unit.text)?,
            }
        }
    }
    Ok(())
}
