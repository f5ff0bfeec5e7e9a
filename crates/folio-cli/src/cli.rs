use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use folio_index::{Gender, TextKind};

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Search plays, poems and sonnets by word or citation", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact directory (overrides settings)
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the search index from a directory of XML sources
    Build {
        /// Source directory (overrides settings)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Text registry file (overrides settings)
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Search the index
    Search(SearchArgs),

    /// Open a text, go to a citation, or search, depending on the input
    Lookup {
        /// An abbreviation (`ham`), a title (`Hamlet`), a citation
        /// (`ham.3.1.56`) or search words
        input: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Render the passage at a citation, with the cited element highlighted
    Show {
        /// Citation such as `ham.3.1.56` or `son.18.1`
        citation: String,

        /// Print the whole rendered text as HTML
        #[arg(long)]
        html: bool,

        /// Source directory (overrides settings)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// List the speakers of all indexed plays
    Speakers,

    /// Print the effective settings as TOML
    Config,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search words
    pub query: String,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Match any word instead of all words
    #[arg(long)]
    pub any: bool,

    /// Match whole words only, without prefix expansion
    #[arg(long)]
    pub exact_words: bool,

    /// Print matches as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only lines whose speaker name contains this
    #[arg(long)]
    pub speaker: Option<String>,

    /// Only lines by speakers of this gender (m or f)
    #[arg(long)]
    pub gender: Option<Gender>,

    /// Only texts whose title contains this
    #[arg(long)]
    pub title: Option<String>,

    /// Only texts of this kind (play, sonnet, poem); repeatable
    #[arg(long = "kind")]
    pub kinds: Vec<TextKind>,
}
