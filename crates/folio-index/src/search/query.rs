//! Query evaluation over a built corpus.
//!
//! A query runs in four steps: the length guard, BM25 retrieval with optional
//! prefix expansion, a stable re-rank that lifts exact substring matches, and
//! the post-retrieval filters.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::index::tokenize;
use crate::extractor::normalize_text;
use crate::location::display_citation;
use crate::registry::{TextKind, TextRegistry};
use crate::storage::SearchArtifact;
use crate::unit::{Gender, TextUnit};

/// Errors that can occur when evaluating a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query too short: {length} characters, at least {minimum} required")]
    TooShort { length: usize, minimum: usize },
}

/// How the tokens of a multi-word query combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolMode {
    /// Every token must match
    #[default]
    And,
    /// Any token may match
    Or,
}

/// Configuration for query evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Shorter trimmed queries are rejected
    pub min_query_length: usize,
    pub bool_mode: BoolMode,
    /// Match every index term a query token prefixes
    pub expand: bool,
    /// Maximum number of results, applied after filtering
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            bool_mode: BoolMode::And,
            expand: true,
            limit: None,
        }
    }
}

/// Post-retrieval restrictions. All set filters must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Case-insensitive substring of the speaker name
    pub speaker: Option<String>,
    pub gender: Option<Gender>,
    /// Case-insensitive substring of the owning work's title
    pub title: Option<String>,
    /// Allowed text kinds; empty allows all
    pub kinds: Vec<TextKind>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn kind(mut self, kind: TextKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.speaker.is_none() && self.gender.is_none() && self.title.is_none() && self.kinds.is_empty()
    }

    /// Whether a unit passes every set filter.
    pub fn accepts(&self, unit: &TextUnit, texts: &TextRegistry) -> bool {
        if let Some(wanted) = &self.speaker {
            let wanted = wanted.to_lowercase();
            match &unit.speaker {
                Some(speaker) if speaker.to_lowercase().contains(&wanted) => {}
                _ => return false,
            }
        }
        if let Some(wanted) = self.gender {
            if unit.gender != Some(wanted) {
                return false;
            }
        }
        if let Some(wanted) = &self.title {
            let wanted = wanted.to_lowercase();
            match texts.title_of(&unit.location) {
                Some(title) if title.to_lowercase().contains(&wanted) => {}
                _ => return false,
            }
        }
        if !self.kinds.is_empty() {
            match texts.kind_of(&unit.location) {
                Some(kind) if self.kinds.contains(&kind) => {}
                _ => return false,
            }
        }
        true
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub unit: TextUnit,
    pub score: f64,
    /// Unit text contains the whole query (case-insensitive)
    pub exact: bool,
}

impl Match {
    /// Human citation for the matched unit.
    pub fn citation(&self, texts: &TextRegistry) -> String {
        display_citation(texts, &self.unit)
    }
}

/// Read-only query evaluator over one corpus.
#[derive(Debug)]
pub struct QueryEngine {
    artifact: SearchArtifact,
    options: SearchOptions,
}

impl QueryEngine {
    pub fn new(artifact: SearchArtifact, options: SearchOptions) -> Self {
        Self { artifact, options }
    }

    pub fn artifact(&self) -> &SearchArtifact {
        &self.artifact
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search the corpus.
    ///
    /// Results are ordered exact matches first, then by BM25 score, ties by
    /// unit id.
    pub fn search(&self, query: &str, filters: &Filters) -> Result<Vec<Match>, QueryError> {
        let trimmed = query.trim();
        let length = trimmed.chars().count();
        if length < self.options.min_query_length {
            return Err(QueryError::TooShort {
                length,
                minimum: self.options.min_query_length,
            });
        }

        let tokens = tokenize(trimmed);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let index = &self.artifact.index;
        let scored = index.score(&tokens, self.options.bool_mode, self.options.expand);
        let retrieved = scored.len();

        // Unit text is stored normalized, so the query must be too
        let needle = normalize_text(trimmed).to_lowercase();
        let mut matches: Vec<Match> = scored
            .into_iter()
            .filter_map(|(id, score)| index.get(id).map(|unit| (unit, score)))
            .filter(|(unit, _)| filters.accepts(unit, &self.artifact.texts))
            .map(|(unit, score)| Match {
                exact: unit.text.to_lowercase().contains(&needle),
                unit: unit.clone(),
                score,
            })
            .collect();

        // Stable, so each group keeps its score order
        matches.sort_by_key(|m| !m.exact);

        if let Some(limit) = self.options.limit {
            matches.truncate(limit);
        }

        debug!(
            "Query {:?}: {} retrieved, {} returned",
            trimmed,
            retrieved,
            matches.len()
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TextEntry;
    use crate::search::index::CorpusIndex;
    use crate::unit::DraftUnit;

    fn line(location: &str, text: &str, speaker: Option<(&str, Gender)>) -> DraftUnit {
        let mut draft = DraftUnit::plain(location.to_string(), text.to_string());
        if let Some((name, gender)) = speaker {
            draft.speaker = Some(name.to_string());
            draft.gender = Some(gender);
        }
        draft
    }

    fn engine(drafts: Vec<DraftUnit>, options: SearchOptions) -> QueryEngine {
        let texts = TextRegistry::new(vec![
            TextEntry::new("Ham", "Hamlet", TextKind::Play),
            TextEntry::new("Mac", "Macbeth", TextKind::Play),
            TextEntry::new("Son", "Sonnets", TextKind::Sonnet),
        ])
        .unwrap();
        let units = drafts
            .into_iter()
            .enumerate()
            .map(|(i, draft)| draft.with_id(i as u32))
            .collect();
        let index = CorpusIndex::build(units).unwrap();
        QueryEngine::new(SearchArtifact::new(index, texts, Vec::new()), options)
    }

    fn locations(matches: &[Match]) -> Vec<&str> {
        matches.iter().map(|m| m.unit.location.as_str()).collect()
    }

    #[test]
    fn test_too_short_query_rejected() {
        let engine = engine(vec![line("Ham.0.0.0", "a", None)], SearchOptions::default());
        assert_eq!(
            engine.search(" a ", &Filters::new()),
            Err(QueryError::TooShort {
                length: 1,
                minimum: 2
            })
        );
    }

    #[test]
    fn test_query_without_tokens_is_empty() {
        let engine = engine(vec![line("Ham.0.0.0", "to be", None)], SearchOptions::default());
        assert!(engine.search("?!", &Filters::new()).unwrap().is_empty());
    }

    #[test]
    fn test_exact_match_preferred() {
        // The second unit scores higher on BM25 (short, repeated terms) but
        // only the first contains the phrase.
        let engine = engine(
            vec![
                line("Ham.0.0.0", "to be or not to be that is the question of all", None),
                line("Ham.0.0.1", "to not be to not be", None),
            ],
            SearchOptions::default(),
        );
        let matches = engine.search("not to be", &Filters::new()).unwrap();
        assert_eq!(locations(&matches), vec!["Ham.0.0.0", "Ham.0.0.1"]);
        assert!(matches[0].exact);
        assert!(!matches[1].exact);
    }

    #[test]
    fn test_exact_match_ignores_case() {
        let engine = engine(vec![line("Ham.0.0.0", "To Be, or not", None)], SearchOptions::default());
        let matches = engine.search("to be", &Filters::new()).unwrap();
        assert!(matches[0].exact);
    }

    #[test]
    fn test_exact_match_normalizes_query() {
        let engine = engine(
            vec![
                line("Son.0.0", "Had ta’en his last leave of the weeping morn", None),
                line("Son.0.1", "his leave was ta’en", None),
            ],
            SearchOptions::default(),
        );
        let matches = engine.search("ta'en his", &Filters::new()).unwrap();
        assert_eq!(locations(&matches)[0], "Son.0.0");
        assert!(matches[0].exact);
        assert!(!matches[1].exact);
    }

    #[test]
    fn test_filters_combine() {
        let engine = engine(
            vec![
                line("Ham.0.0.0", "my lord", Some(("Ophelia", Gender::F))),
                line("Ham.0.0.1", "my lord", Some(("Horatio", Gender::M))),
                line("Mac.0.0.0", "my lord", Some(("Lady Macbeth", Gender::F))),
                line("Son.0.0", "my lord", None),
            ],
            SearchOptions::default(),
        );

        let all = engine.search("lord", &Filters::new()).unwrap();
        assert_eq!(all.len(), 4);

        let women = engine.search("lord", &Filters::new().gender(Gender::F)).unwrap();
        assert_eq!(locations(&women), vec!["Ham.0.0.0", "Mac.0.0.0"]);

        let in_hamlet = Filters::new().gender(Gender::F).title("HAM");
        assert_eq!(locations(&engine.search("lord", &in_hamlet).unwrap()), vec!["Ham.0.0.0"]);

        let by_speaker = engine.search("lord", &Filters::new().speaker("macb")).unwrap();
        assert_eq!(locations(&by_speaker), vec!["Mac.0.0.0"]);

        let sonnets = engine.search("lord", &Filters::new().kind(TextKind::Sonnet)).unwrap();
        assert_eq!(locations(&sonnets), vec!["Son.0.0"]);
    }

    #[test]
    fn test_filter_application_order_does_not_matter() {
        let engine = engine(
            vec![
                line("Ham.0.0.0", "good night", Some(("Ophelia", Gender::F))),
                line("Mac.0.0.0", "good night", Some(("Lady Macbeth", Gender::F))),
            ],
            SearchOptions::default(),
        );
        let a = Filters::new().gender(Gender::F).title("macbeth");
        let b = Filters::new().title("macbeth").gender(Gender::F);
        assert_eq!(engine.search("night", &a).unwrap(), engine.search("night", &b).unwrap());
    }

    #[test]
    fn test_limit_applies_after_filtering() {
        let options = SearchOptions {
            limit: Some(1),
            ..SearchOptions::default()
        };
        let engine = engine(
            vec![
                line("Ham.0.0.0", "sweet prince", Some(("Horatio", Gender::M))),
                line("Ham.0.0.1", "sweet prince", Some(("Ophelia", Gender::F))),
            ],
            options,
        );
        let matches = engine.search("prince", &Filters::new().gender(Gender::F)).unwrap();
        assert_eq!(locations(&matches), vec!["Ham.0.0.1"]);
    }

    #[test]
    fn test_or_mode_and_no_expansion() {
        let options = SearchOptions {
            bool_mode: BoolMode::Or,
            expand: false,
            ..SearchOptions::default()
        };
        let engine = engine(
            vec![
                line("Ham.0.0.0", "words words words", None),
                line("Ham.0.0.1", "wordy fellow", None),
                line("Ham.0.0.2", "the rest is silence", None),
            ],
            options,
        );
        let matches = engine.search("words silence", &Filters::new()).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(!locations(&matches).contains(&"Ham.0.0.1"));
    }
}
