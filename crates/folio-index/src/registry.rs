//! Text and speaker registries.
//!
//! The text registry maps source files to works and works to their display
//! title and [`TextKind`]. The kind selects how locations are encoded and
//! decoded, so every location lookup goes through here first.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::{Play, Persona};
use crate::unit::Gender;

/// Structural template of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Play,
    /// Member of a multi-poem collection
    Sonnet,
    Poem,
}

impl TextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Sonnet => "sonnet",
            Self::Poem => "poem",
        }
    }
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "sonnet" | "sonnets" => Ok(Self::Sonnet),
            "poem" => Ok(Self::Poem),
            other => Err(RegistryError::UnknownKind(other.to_string())),
        }
    }
}

/// Errors that can occur when loading a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown text kind: {0}")]
    UnknownKind(String),

    #[error("Duplicate abbreviation: {0}")]
    DuplicateAbbreviation(String),

    #[error("Invalid abbreviation {0:?}: must be non-empty and contain no '.'")]
    InvalidAbbreviation(String),

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    /// Source file name (not a path), e.g. `hamlet_ps.xml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Short stable key, e.g. `Ham`
    pub abbreviation: String,
    pub title: String,
    pub kind: TextKind,
}

impl TextEntry {
    pub fn new(abbreviation: impl Into<String>, title: impl Into<String>, kind: TextKind) -> Self {
        Self {
            file: None,
            abbreviation: abbreviation.into(),
            title: title.into(),
            kind,
        }
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    texts: Vec<TextEntry>,
}

/// Lookup table of all works in a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TextEntry>", into = "Vec<TextEntry>")]
pub struct TextRegistry {
    entries: Vec<TextEntry>,
    /// Lower-cased abbreviation -> entry index
    by_abbreviation: HashMap<String, usize>,
}

impl From<Vec<TextEntry>> for TextRegistry {
    fn from(entries: Vec<TextEntry>) -> Self {
        let by_abbreviation = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.abbreviation.to_lowercase(), i))
            .collect();
        Self {
            entries,
            by_abbreviation,
        }
    }
}

impl From<TextRegistry> for Vec<TextEntry> {
    fn from(registry: TextRegistry) -> Self {
        registry.entries
    }
}

impl TextRegistry {
    /// Build a registry, rejecting duplicate or malformed abbreviations.
    pub fn new(entries: Vec<TextEntry>) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if entry.abbreviation.is_empty() || entry.abbreviation.contains('.') {
                return Err(RegistryError::InvalidAbbreviation(entry.abbreviation.clone()));
            }
            if !seen.insert(entry.abbreviation.to_lowercase()) {
                return Err(RegistryError::DuplicateAbbreviation(entry.abbreviation.clone()));
            }
        }
        Ok(Self::from(entries))
    }

    /// Parse a TOML registry made of `[[texts]]` tables.
    pub fn from_toml(source: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(source)?;
        Self::new(file.texts)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let source = std::fs::read_to_string(path)?;
        let registry = Self::from_toml(&source)?;
        debug!("Loaded {} texts from {:?}", registry.len(), path);
        Ok(registry)
    }

    /// Look up a work by abbreviation, ignoring case.
    pub fn get(&self, abbreviation: &str) -> Option<&TextEntry> {
        self.by_abbreviation
            .get(&abbreviation.to_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// Look up a work by its full title, ignoring case.
    pub fn by_title(&self, title: &str) -> Option<&TextEntry> {
        self.entries
            .iter()
            .find(|entry| entry.title.eq_ignore_ascii_case(title))
    }

    /// Look up a work by source file name.
    pub fn by_file(&self, file_name: &str) -> Option<&TextEntry> {
        self.entries
            .iter()
            .find(|entry| entry.file.as_deref() == Some(file_name))
    }

    /// Kind of the work that owns a location path.
    pub fn kind_of(&self, location: &str) -> Option<TextKind> {
        let abbreviation = location.split('.').next()?;
        self.get(abbreviation).map(|entry| entry.kind)
    }

    /// Display title of the work that owns a location path.
    pub fn title_of(&self, location: &str) -> Option<&str> {
        let abbreviation = location.split('.').next()?;
        self.get(abbreviation).map(|entry| entry.title.as_str())
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical speaker name -> gender, for one play.
///
/// Built from the personae before any unit is emitted, since speeches may name
/// a speaker the traversal has not otherwise reached yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerRegistry {
    genders: HashMap<String, Gender>,
}

impl SpeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_play(play: &Play) -> Self {
        Self::from_personae(&play.personae)
    }

    pub fn from_personae(personae: &[Persona]) -> Self {
        let genders = personae
            .iter()
            .filter_map(|persona| Some((persona.name.clone(), persona.gender?)))
            .collect();
        Self { genders }
    }

    pub fn insert(&mut self, name: impl Into<String>, gender: Gender) {
        self.genders.insert(name.into(), gender);
    }

    /// Gender of a speaker, or `None` when the speaker is not registered.
    pub fn gender(&self, name: &str) -> Option<Gender> {
        self.genders.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.genders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genders.is_empty()
    }
}
