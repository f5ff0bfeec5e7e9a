//! Full-text search over text units.
//!
//! [`CorpusIndex`] holds the inverted index and the stored units;
//! [`QueryEngine`] evaluates queries against it with BM25 ranking, prefix
//! expansion, exact-match preference and post-retrieval filters.

pub mod index;
pub mod query;

pub use index::{tokenize, CorpusIndex, IndexError, Posting};
pub use query::{BoolMode, Filters, Match, QueryEngine, QueryError, SearchOptions};
