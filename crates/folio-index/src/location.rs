//! Location paths and citations.
//!
//! A location is a `.`-joined path whose first token is the work's
//! abbreviation. The number of remaining tokens depends on the work's kind:
//!
//! | kind   | path                          | tokens |
//! |--------|-------------------------------|--------|
//! | play   | `Abbr.act[.scene[.line]]`     | 2 to 4 |
//! | sonnet | `Abbr.poem.line`              | 3      |
//! | poem   | `Abbr.line`                   | 2      |
//!
//! Units are only ever stored at play scene or line level; the act-only form
//! exists for citations that select a whole act.
//!
//! Stored locations are always 0-based. Citations are the public, 1-based form
//! of the same path (`ham.3.1.56` is act 3, scene 1, line 56) and are only ever
//! converted at the boundary.

use std::fmt;

use thiserror::Error;

use crate::registry::{TextKind, TextRegistry};
use crate::unit::TextUnit;

/// Errors that can occur when decoding locations and citations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CitationError {
    #[error("Invalid citation {path:?}: {reason}")]
    InvalidCitation { path: String, reason: String },

    #[error("Unknown text: {0}")]
    UnknownText(String),

    #[error("Coordinates for a {coordinates} cannot be encoded as a {kind} location")]
    KindMismatch { kind: TextKind, coordinates: TextKind },
}

impl CitationError {
    fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCitation {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Structural coordinates within one work, all 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coordinates {
    /// `line` is absent for scene-level units (titles and stage directions).
    Play {
        act: u32,
        scene: u32,
        line: Option<u32>,
    },
    /// A whole act of a play. No unit is stored here.
    Act { act: u32 },
    Sonnet { poem: u32, line: u32 },
    Poem { line: u32 },
}

impl Coordinates {
    /// The kind of work these coordinates address.
    pub fn kind(&self) -> TextKind {
        match self {
            Self::Play { .. } | Self::Act { .. } => TextKind::Play,
            Self::Sonnet { .. } => TextKind::Sonnet,
            Self::Poem { .. } => TextKind::Poem,
        }
    }

    fn indices(&self) -> Vec<u32> {
        match *self {
            Self::Play { act, scene, line } => {
                let mut indices = vec![act, scene];
                indices.extend(line);
                indices
            }
            Self::Act { act } => vec![act],
            Self::Sonnet { poem, line } => vec![poem, line],
            Self::Poem { line } => vec![line],
        }
    }

    fn from_indices(kind: TextKind, indices: &[u32]) -> Option<Self> {
        match (kind, indices) {
            (TextKind::Play, [act]) => Some(Self::Act { act: *act }),
            (TextKind::Play, [act, scene]) => Some(Self::Play {
                act: *act,
                scene: *scene,
                line: None,
            }),
            (TextKind::Play, [act, scene, line]) => Some(Self::Play {
                act: *act,
                scene: *scene,
                line: Some(*line),
            }),
            (TextKind::Sonnet, [poem, line]) => Some(Self::Sonnet {
                poem: *poem,
                line: *line,
            }),
            (TextKind::Poem, [line]) => Some(Self::Poem { line: *line }),
            _ => None,
        }
    }
}

/// A decoded location: which work, and where in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub abbreviation: String,
    pub coordinates: Coordinates,
}

impl Location {
    pub fn new(abbreviation: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            abbreviation: abbreviation.into(),
            coordinates,
        }
    }

    pub fn kind(&self) -> TextKind {
        self.coordinates.kind()
    }

    /// The stored (0-based) path.
    pub fn path(&self) -> String {
        join(&self.abbreviation, &self.coordinates.indices())
    }

    /// Decode a stored path, taking the kind from the registry entry named by
    /// its first token.
    pub fn resolve(registry: &TextRegistry, path: &str) -> Result<Self, CitationError> {
        let abbreviation = path.split('.').next().unwrap_or_default();
        let entry = registry
            .get(abbreviation)
            .ok_or_else(|| CitationError::UnknownText(abbreviation.to_string()))?;
        decode(entry.kind, path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn join(abbreviation: &str, indices: &[u32]) -> String {
    let mut path = abbreviation.to_string();
    for index in indices {
        path.push('.');
        path.push_str(&index.to_string());
    }
    path
}

/// Split a path into its abbreviation and numeric tokens.
fn split(path: &str) -> Result<(&str, Vec<u32>), CitationError> {
    let mut tokens = path.split('.');
    let abbreviation = tokens.next().unwrap_or_default();
    if abbreviation.is_empty() {
        return Err(CitationError::invalid(path, "missing text abbreviation"));
    }
    let indices = tokens
        .map(|token| {
            if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CitationError::invalid(
                    path,
                    format!("{token:?} is not a non-negative integer"),
                ));
            }
            token
                .parse::<u32>()
                .map_err(|_| CitationError::invalid(path, format!("{token} is out of range")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((abbreviation, indices))
}

fn arity_reason(kind: TextKind, found: usize) -> String {
    let expected = match kind {
        TextKind::Play => "2, 3 or 4",
        TextKind::Sonnet => "3",
        TextKind::Poem => "2",
    };
    format!("a {kind} location has {expected} tokens, found {}", found + 1)
}

/// Encode coordinates as a stored location path.
pub fn encode(
    kind: TextKind,
    abbreviation: &str,
    coordinates: &Coordinates,
) -> Result<String, CitationError> {
    if coordinates.kind() != kind {
        return Err(CitationError::KindMismatch {
            kind,
            coordinates: coordinates.kind(),
        });
    }
    Ok(join(abbreviation, &coordinates.indices()))
}

/// Decode a stored location path. The caller supplies the kind, since a
/// 3-token path is either a play scene or a sonnet line.
pub fn decode(kind: TextKind, path: &str) -> Result<Location, CitationError> {
    let (abbreviation, indices) = split(path)?;
    let coordinates = Coordinates::from_indices(kind, &indices)
        .ok_or_else(|| CitationError::invalid(path, arity_reason(kind, indices.len())))?;
    Ok(Location::new(abbreviation, coordinates))
}

/// The public, 1-based citation form of a location.
pub struct Citation;

impl Citation {
    /// Parse a citation such as `ham.3.1.56`.
    ///
    /// The abbreviation is matched case-insensitively and replaced by the
    /// registry's canonical spelling; every index is shifted to 0-based.
    pub fn parse(registry: &TextRegistry, citation: &str) -> Result<Location, CitationError> {
        let citation = citation.trim();
        let (abbreviation, indices) = split(citation)?;
        let entry = registry
            .get(abbreviation)
            .ok_or_else(|| CitationError::UnknownText(abbreviation.to_string()))?;
        let zero_based = indices
            .iter()
            .map(|&n| {
                n.checked_sub(1)
                    .ok_or_else(|| CitationError::invalid(citation, "citations count from 1"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let coordinates = Coordinates::from_indices(entry.kind, &zero_based).ok_or_else(|| {
            CitationError::invalid(citation, arity_reason(entry.kind, indices.len()))
        })?;
        Ok(Location::new(entry.abbreviation.clone(), coordinates))
    }

    /// Format a location for display, 1-based.
    pub fn format(location: &Location) -> String {
        let indices: Vec<u32> = location
            .coordinates
            .indices()
            .into_iter()
            .map(|i| i + 1)
            .collect();
        join(&location.abbreviation, &indices)
    }
}

/// Display citation of a unit. Falls back to the raw location when the unit
/// belongs to no registered work or its location does not decode.
pub fn display_citation(registry: &TextRegistry, unit: &TextUnit) -> String {
    match Location::resolve(registry, &unit.location) {
        Ok(location) => Citation::format(&location),
        Err(_) => unit.location.clone(),
    }
}
