use std::io::Write;
use std::path::Path;

use anyhow::Result;

use folio_config::Settings;
use folio_index::{BoolMode, QueryError};

use super::{open_engine, print_matches};
use crate::cli::SearchArgs;

pub fn run(settings: &Settings, index: &Path, args: &SearchArgs, out: &mut dyn Write) -> Result<()> {
    let mut options = settings.search.clone();
    if args.limit.is_some() {
        options.limit = args.limit;
    }
    if args.any {
        options.bool_mode = BoolMode::Or;
    }
    if args.exact_words {
        options.expand = false;
    }

    let engine = open_engine(index, options)?;
    match engine.search(&args.query, &args.filters.to_filters()) {
        Ok(matches) if matches.is_empty() => writeln!(out, "No matches for {:?}", args.query)?,
        Ok(matches) => print_matches(out, &engine.artifact().texts, &matches, args.json)?,
        Err(e @ QueryError::TooShort { .. }) => writeln!(out, "{}", e)?,
    }
    Ok(())
}
