//! Inverted index over text units with BM25 scoring.
//!
//! Only the `text` field is tokenized. Every unit is also stored whole, so a
//! match carries its location, role, speaker and the rest without a second
//! lookup. The index is built in one pass and never updated in place; a
//! changed corpus is rebuilt.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::query::BoolMode;
use crate::unit::{TextUnit, UnitId};

/// BM25 parameters
const K1: f64 = 1.2; // Term frequency saturation
const B: f64 = 0.75; // Length normalization

/// Errors that can occur when building or loading an index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Unit ids must be dense: expected id {expected}, found {found}")]
    NonDenseIds { expected: UnitId, found: UnitId },

    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

/// Occurrences of one term in one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    #[serde(rename = "u")]
    pub unit: UnitId,
    #[serde(rename = "f")]
    pub frequency: u32,
}

/// Combined inverted index and unit store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusIndex {
    /// Stored units, position == id
    units: Vec<TextUnit>,
    /// Term -> postings in ascending unit order. Ordered so that prefix
    /// expansion is a range scan.
    postings: BTreeMap<String, Vec<Posting>>,
    /// Unit lengths (in tokens), position == id
    doc_lengths: Vec<u32>,
    avg_doc_length: f64,
}

/// Tokenize text into lower-cased terms of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1)
        .map(String::from)
        .collect()
}

impl CorpusIndex {
    /// Build the index from a whole corpus in one pass.
    ///
    /// Units may arrive in any order but their ids must be exactly `0..n`.
    pub fn build(mut units: Vec<TextUnit>) -> Result<Self, IndexError> {
        units.sort_by_key(|unit| unit.id);
        for (position, unit) in units.iter().enumerate() {
            if unit.id as usize != position {
                return Err(IndexError::NonDenseIds {
                    expected: position as UnitId,
                    found: unit.id,
                });
            }
        }

        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut doc_lengths = Vec::with_capacity(units.len());

        for unit in &units {
            let tokens = tokenize(&unit.text);
            doc_lengths.push(tokens.len() as u32);

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for (term, frequency) in term_freqs {
                postings.entry(term).or_default().push(Posting {
                    unit: unit.id,
                    frequency,
                });
            }
        }

        let total_length: u64 = doc_lengths.iter().map(|&len| len as u64).sum();
        let avg_doc_length = if units.is_empty() {
            0.0
        } else {
            total_length as f64 / units.len() as f64
        };

        debug!(
            "Indexed {} units, {} distinct terms",
            units.len(),
            postings.len()
        );

        Ok(Self {
            units,
            postings,
            doc_lengths,
            avg_doc_length,
        })
    }

    /// Check the invariants a loaded index relies on.
    pub fn check_consistency(&self) -> Result<(), IndexError> {
        if self.doc_lengths.len() != self.units.len() {
            return Err(IndexError::Corrupt(format!(
                "{} units but {} lengths",
                self.units.len(),
                self.doc_lengths.len()
            )));
        }
        if let Some((position, unit)) = self
            .units
            .iter()
            .enumerate()
            .find(|(position, unit)| unit.id as usize != *position)
        {
            return Err(IndexError::NonDenseIds {
                expected: position as UnitId,
                found: unit.id,
            });
        }
        let out_of_range = self
            .postings
            .values()
            .flatten()
            .any(|posting| posting.unit as usize >= self.units.len());
        if out_of_range {
            return Err(IndexError::Corrupt("posting refers to a missing unit".to_string()));
        }
        Ok(())
    }

    pub fn get(&self, id: UnitId) -> Option<&TextUnit> {
        self.units.get(id as usize)
    }

    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }

    /// Distinct index terms in sorted order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Index terms matched by a query token: the token itself, or with
    /// `expand` every term it prefixes.
    fn matching_terms<'a>(&'a self, token: &'a str, expand: bool) -> Vec<(&'a str, &'a [Posting])> {
        if expand {
            self.postings
                .range::<str, _>((std::ops::Bound::Included(token), std::ops::Bound::Unbounded))
                .take_while(|(term, _)| term.starts_with(token))
                .map(|(term, postings)| (term.as_str(), postings.as_slice()))
                .collect()
        } else {
            self.postings
                .get_key_value(token)
                .map(|(term, postings)| vec![(term.as_str(), postings.as_slice())])
                .unwrap_or_default()
        }
    }

    /// Inverse document frequency for a term found in `doc_freq` units.
    fn idf(&self, doc_freq: usize) -> f64 {
        if doc_freq == 0 {
            return 0.0;
        }
        let n = self.units.len() as f64;
        let doc_freq = doc_freq as f64;
        ((n - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
    }

    /// Score units against already tokenized query terms.
    ///
    /// Returns `(id, score)` sorted by score descending, ties broken by id.
    /// Terms reached through prefix expansion are weighted by how much of the
    /// term the query token covers.
    pub fn score(&self, tokens: &[String], mode: BoolMode, expand: bool) -> Vec<(UnitId, f64)> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|token| seen.insert(*token))
            .collect();
        if unique.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let avg_doc_length = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };
        let mut scores: HashMap<UnitId, f64> = HashMap::new();
        let mut tokens_matched: HashMap<UnitId, usize> = HashMap::new();

        for token in &unique {
            let mut matched = HashSet::new();
            for (term, postings) in self.matching_terms(token, expand) {
                let weight = if term == *token {
                    1.0
                } else {
                    token.chars().count() as f64 / term.chars().count() as f64
                };
                let idf = self.idf(postings.len());
                for posting in postings {
                    let tf = posting.frequency as f64;
                    let doc_length = self.doc_lengths[posting.unit as usize] as f64;
                    let numerator = tf * (K1 + 1.0);
                    let denominator = tf + K1 * (1.0 - B + B * (doc_length / avg_doc_length));
                    *scores.entry(posting.unit).or_default() += weight * idf * (numerator / denominator);
                    matched.insert(posting.unit);
                }
            }
            for id in matched {
                *tokens_matched.entry(id).or_default() += 1;
            }
        }

        let required = match mode {
            BoolMode::And => unique.len(),
            BoolMode::Or => 1,
        };
        let mut results: Vec<(UnitId, f64)> = scores
            .into_iter()
            .filter(|(id, _)| tokens_matched.get(id).copied().unwrap_or(0) >= required)
            .collect();

        // Sort by score descending
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results
    }
}
