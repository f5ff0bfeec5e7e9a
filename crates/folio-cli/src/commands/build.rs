use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use folio_config::Settings;
use folio_index::{ArtifactStore, CorpusBuilder, TextRegistry};

pub async fn run(
    settings: &Settings,
    source: &Path,
    registry: &Path,
    index: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    let registry = TextRegistry::load(registry)
        .with_context(|| format!("Failed to load text registry {:?}", registry))?;
    let builder = CorpusBuilder::new(registry, settings.extract);
    let output = builder.build_dir(source).await?;

    let store = ArtifactStore::new(index);
    store.save(&output)?;

    let stats = &output.stats;
    writeln!(
        out,
        "Indexed {} texts ({} units, {} warnings) in {} ms",
        stats.documents_indexed,
        stats.units,
        output.manifest.issue_count(),
        stats.duration_ms
    )?;
    for failure in &output.manifest.failures {
        writeln!(out, "  failed  {}: {}", failure.file, failure.error)?;
    }
    for issues in output.manifest.issues.values() {
        for issue in issues {
            writeln!(out, "  warning {}", issue)?;
        }
    }
    if stats.files_skipped > 0 {
        writeln!(out, "  skipped {} unregistered files", stats.files_skipped)?;
    }
    writeln!(out, "Index written to {}", store.dir().display())?;
    Ok(())
}
