//! Structural extraction, citation addressing and full-text search for
//! literary texts.
//!
//! This crate provides:
//! - A closed document model for plays, sonnet collections and poems, with a
//!   quick-xml parser adapter
//! - Structural extraction of those documents into flat, located text units
//! - Location paths and 1-based citations
//! - A BM25 inverted index with prefix expansion, exact-match preference and
//!   speaker, gender, title and kind filters
//! - Rendering into an element tree and resolving locations back to elements
//! - Parallel corpus builds and JSON persistence with a build manifest

pub mod corpus;
pub mod document;
pub mod extractor;
pub mod location;
pub mod lookup;
pub mod manifest;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod search;
pub mod storage;
pub mod unit;
pub mod xml;

// Re-exports
pub use corpus::{locate_source, BuildOutput, BuildStats, Corpus, CorpusBuilder, UnitAccumulator};
pub use document::{Persona, SourceDocument};
pub use extractor::{
    normalize_text, DirectionScope, ExtractIssue, ExtractOptions, Extractor, SpeakerAttribution,
};
pub use location::{decode, display_citation, encode, Citation, CitationError, Coordinates, Location};
pub use lookup::Lookup;
pub use manifest::IndexManifest;
pub use registry::{RegistryError, SpeakerRegistry, TextEntry, TextKind, TextRegistry};
pub use render::{render_document, NodePath, RenderOptions, RenderedDocument, RenderedNode};
pub use resolver::{resolve, Anchor, ResolveStep, UnresolvedLocation};
pub use search::{
    BoolMode, CorpusIndex, Filters, IndexError, Match, QueryEngine, QueryError, SearchOptions,
};
pub use storage::{ArtifactStore, SearchArtifact};
pub use unit::{DraftUnit, Gender, Role, TextUnit, UnitId};
pub use xml::{parse_document, ParseError};

/// Default artifact directory name.
pub const DEFAULT_ARTIFACT_DIR: &str = ".folio";
