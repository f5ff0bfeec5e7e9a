//! Indexable text units.
//!
//! A [`TextUnit`] is one line, stage direction or scene title, flattened out of
//! its work together with the location it came from. Units are the documents of
//! the corpus index; everything except `text` is stored verbatim and returned
//! with each match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Surrogate key assigned in emission order. Carries no meaning beyond that.
pub type UnitId = u32;

/// Role of a unit that is not ordinary dialogue or verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Scene title (one per scene)
    #[serde(rename = "t")]
    Title,
    /// Stage direction or scene location
    #[serde(rename = "s")]
    Direction,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Direction => "direction",
        }
    }
}

/// Speaker gender, as declared in a play's list of personae.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M => "m",
            Self::F => "f",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::M),
            "f" | "female" => Ok(Self::F),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// One indexable item.
///
/// Serialized with single-letter keys: the persisted index holds every unit of
/// the corpus, so field names dominate its size otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextUnit {
    #[serde(rename = "i")]
    pub id: UnitId,

    /// Dotted location path, e.g. `Ham.2.0.55`
    #[serde(rename = "l")]
    pub location: String,

    /// Normalized text
    #[serde(rename = "t")]
    pub text: String,

    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Index among same-role units sharing a location
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub extra_index: Option<u32>,

    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    /// 0-based running line number within the scene or poem
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl TextUnit {
    /// Abbreviation of the owning work: the first token of the location.
    pub fn abbreviation(&self) -> &str {
        self.location.split('.').next().unwrap_or_default()
    }

    /// Key that is unique per unit within one work.
    pub fn position_key(&self) -> (&str, Option<Role>, Option<u32>) {
        (self.location.as_str(), self.role, self.extra_index)
    }
}

/// A unit as emitted by the extractor, before the accumulator assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftUnit {
    pub location: String,
    pub text: String,
    pub role: Option<Role>,
    pub extra_index: Option<u32>,
    pub speaker: Option<String>,
    pub gender: Option<Gender>,
    pub line_number: Option<u32>,
}

impl DraftUnit {
    pub(crate) fn plain(location: String, text: String) -> Self {
        Self {
            location,
            text,
            role: None,
            extra_index: None,
            speaker: None,
            gender: None,
            line_number: None,
        }
    }

    pub fn with_id(self, id: UnitId) -> TextUnit {
        TextUnit {
            id,
            location: self.location,
            text: self.text,
            role: self.role,
            extra_index: self.extra_index,
            speaker: self.speaker,
            gender: self.gender,
            line_number: self.line_number,
        }
    }
}
