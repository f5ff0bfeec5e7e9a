//! The `folio` command line: build an index from XML sources, search it,
//! and render cited passages.

pub mod cli;
mod commands;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio_config::Settings;

pub use cli::{Cli, Commands, FilterArgs, SearchArgs};

/// Entry point used by the `folio` binary.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut stdout = io::stdout();
    execute(cli, &mut stdout).await
}

/// Run a parsed command line, writing results to `out`.
///
/// Logs go to stderr; only results are written to `out`.
pub async fn execute(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let index = cli
        .index
        .clone()
        .unwrap_or_else(|| settings.corpus.artifact_dir());

    match cli.command {
        Commands::Build { source, registry } => {
            let source = source.unwrap_or_else(|| settings.corpus.source_dir());
            let registry = registry.unwrap_or_else(|| settings.corpus.registry());
            commands::build::run(&settings, &source, &registry, &index, out).await
        }
        Commands::Search(args) => commands::search::run(&settings, &index, &args, out),
        Commands::Lookup { input, filters } => {
            commands::lookup::run(&settings, &index, &input, &filters, out)
        }
        Commands::Show {
            citation,
            html,
            source,
        } => {
            let source: PathBuf = source.unwrap_or_else(|| settings.corpus.source_dir());
            commands::show::run(&settings, &index, &source, &citation, html, out)
        }
        Commands::Speakers => commands::speakers::run(&index, out),
        Commands::Config => {
            write!(out, "{}", settings.to_toml()?)?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "folio=debug" } else { "folio=info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}
