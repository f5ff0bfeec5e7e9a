use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use folio_config::Settings;
use folio_index::{Citation, Coordinates, Lookup, QueryError, Role, TextUnit};

use super::{open_engine, print_matches};
use crate::cli::FilterArgs;

pub fn run(
    settings: &Settings,
    index: &Path,
    input: &str,
    filters: &FilterArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let engine = open_engine(index, settings.search.clone())?;
    let artifact = engine.artifact();
    let units = artifact.index.units();

    match Lookup::classify(input, &artifact.texts) {
        Lookup::Text(entry) => {
            let count = units
                .iter()
                .filter(|u| u.abbreviation() == entry.abbreviation)
                .count();
            writeln!(
                out,
                "{} ({}, {}): {} units",
                entry.title, entry.abbreviation, entry.kind, count
            )?;
        }
        Lookup::Citation(Ok(location)) => {
            let path = location.path();
            // An act has no units of its own: list its scene titles.
            let act_prefix = format!("{}.", path);
            let in_place = |unit: &&TextUnit| match location.coordinates {
                Coordinates::Act { .. } => unit.role == Some(Role::Title) && unit.location.starts_with(&act_prefix),
                _ => unit.location == path,
            };
            let mut found = false;
            for unit in units.iter().filter(in_place) {
                found = true;
                match &unit.speaker {
                    Some(speaker) => writeln!(out, "{}: {}", speaker, unit.text)?,
                    None => writeln!(out, "{}", unit.text)?,
                }
            }
            if !found {
                writeln!(out, "Citation {} not found", Citation::format(&location))?;
            }
        }
        Lookup::Citation(Err(e)) => {
            debug!("Citation {:?} rejected: {}", input, e);
            writeln!(out, "Citation {} not found", input.trim())?;
        }
        Lookup::Query(query) => match engine.search(&query, &filters.to_filters()) {
            Ok(matches) if matches.is_empty() => writeln!(out, "No matches for {:?}", query)?,
            Ok(matches) => print_matches(out, &artifact.texts, &matches, false)?,
            Err(e @ QueryError::TooShort { .. }) => writeln!(out, "{}", e)?,
        },
    }
    Ok(())
}
