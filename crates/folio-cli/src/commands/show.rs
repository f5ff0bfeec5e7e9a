use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use folio_config::Settings;
use folio_index::{locate_source, parse_document, render_document, resolve, Anchor, Citation};

use super::load_artifact;

pub fn run(
    settings: &Settings,
    index: &Path,
    source_dir: &Path,
    citation: &str,
    html: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let artifact = load_artifact(index)?;
    let location = match Citation::parse(&artifact.texts, citation) {
        Ok(location) => location,
        Err(e) => {
            debug!("Citation {:?} rejected: {}", citation, e);
            writeln!(out, "Citation {} not found", citation.trim())?;
            return Ok(());
        }
    };

    let entry = artifact
        .texts
        .get(&location.abbreviation)
        .ok_or_else(|| anyhow!("Unknown text: {}", location.abbreviation))?;
    let file = entry
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("No source file registered for {}", entry.abbreviation))?;
    let path = locate_source(source_dir, file)
        .ok_or_else(|| anyhow!("Source {} not found under {:?}", file, source_dir))?;
    debug!("Rendering {:?} for {}", path, citation);

    let source = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    let document =
        parse_document(&source, entry.kind).with_context(|| format!("Failed to parse {:?}", path))?;
    let mut rendered = render_document(&document, &settings.render);

    let anchor = Anchor::for_location(&location);
    let target = match resolve(&rendered, &location, anchor, settings.extract.direction_scope) {
        Ok(target) => target,
        Err(e) => {
            writeln!(out, "{}", e)?;
            return Ok(());
        }
    };
    rendered.highlight(&target);

    if html {
        writeln!(out, "{}", rendered.to_html())?;
    } else if let Some(node) = rendered.node(&target) {
        writeln!(out, "{}", node.text_content())?;
    }
    Ok(())
}
