//! Structural extraction: flattening a parsed work into text units.
//!
//! Plays yield, per scene, one title unit, one unit per stage direction and
//! one unit per line of dialogue. Sonnet collections and single poems yield one
//! unit per line. Units come out in document order without ids; the
//! [`UnitAccumulator`](crate::corpus::UnitAccumulator) assigns those.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::{Poem, Scene, SceneNode, SourceDocument, Speech, SpeechNode};
use crate::location::{Coordinates, Location};
use crate::registry::{SpeakerRegistry, TextEntry, TextKind};
use crate::unit::{DraftUnit, Gender, Role};

/// Problems found while extracting. None of them stop the extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractIssue {
    #[error("{location}: missing {child}")]
    MissingStructuralChild { location: String, child: String },

    #[error("{abbreviation}: registered as a {expected} but the document is shaped like a {found}")]
    KindMismatch {
        abbreviation: String,
        expected: TextKind,
        found: TextKind,
    },
}

/// Which stage directions become direction units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionScope {
    /// Only stage directions that sit directly under the scene.
    #[default]
    Scene,
    /// Also block-level stage directions between the lines of a speech.
    SceneAndSpeech,
}

/// How lines of a speech with several declared speakers are attributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerAttribution {
    /// The first declared speaker.
    #[default]
    Primary,
    /// All declared speakers, joined with ", ".
    Joined,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    #[serde(default)]
    pub direction_scope: DirectionScope,
    #[serde(default)]
    pub speaker_attribution: SpeakerAttribution,
}

/// Lazily extracted units of one document. Not restartable: call
/// [`Extractor::extract`] again to walk the document again.
pub type Extraction<'a> = Box<dyn Iterator<Item = Result<DraftUnit, ExtractIssue>> + Send + 'a>;

/// Extractor for one work.
pub struct Extractor<'a> {
    entry: &'a TextEntry,
    speakers: &'a SpeakerRegistry,
    options: ExtractOptions,
}

impl<'a> Extractor<'a> {
    pub fn new(entry: &'a TextEntry, speakers: &'a SpeakerRegistry, options: ExtractOptions) -> Self {
        Self {
            entry,
            speakers,
            options,
        }
    }

    /// Walk a document and yield its units in document order.
    pub fn extract<'s>(&'s self, document: &'s SourceDocument) -> Extraction<'s> {
        match (self.entry.kind, document) {
            (TextKind::Play, SourceDocument::Play(play)) => Box::new(
                play.acts
                    .iter()
                    .enumerate()
                    .flat_map(|(act_index, act)| {
                        act.scenes
                            .iter()
                            .enumerate()
                            .map(move |(scene_index, scene)| (act_index as u32, scene_index as u32, scene))
                    })
                    .flat_map(move |(act, scene_index, scene)| self.scene_units(act, scene_index, scene)),
            ),
            (TextKind::Sonnet, SourceDocument::Collection(poems)) => Box::new(
                poems
                    .iter()
                    .enumerate()
                    .flat_map(move |(poem_index, poem)| {
                        poem.lines().enumerate().map(move |(line_index, line)| {
                            let coordinates = Coordinates::Sonnet {
                                poem: poem_index as u32,
                                line: line_index as u32,
                            };
                            Ok(self.verse_unit(coordinates, line_index as u32, &line.plain_text()))
                        })
                    }),
            ),
            (TextKind::Poem, SourceDocument::Poem(poem)) => Box::new(self.poem_units(poem)),
            (expected, document) => {
                let issue = ExtractIssue::KindMismatch {
                    abbreviation: self.entry.abbreviation.clone(),
                    expected,
                    found: document_kind(document),
                };
                Box::new(std::iter::once(Err(issue)))
            }
        }
    }

    fn poem_units<'s>(&'s self, poem: &'s Poem) -> impl Iterator<Item = Result<DraftUnit, ExtractIssue>> + Send + 's {
        poem.lines().enumerate().map(move |(line_index, line)| {
            let coordinates = Coordinates::Poem {
                line: line_index as u32,
            };
            Ok(self.verse_unit(coordinates, line_index as u32, &line.plain_text()))
        })
    }

    fn path(&self, coordinates: Coordinates) -> String {
        Location::new(self.entry.abbreviation.as_str(), coordinates).path()
    }

    fn verse_unit(&self, coordinates: Coordinates, line_index: u32, text: &str) -> DraftUnit {
        let mut unit = DraftUnit::plain(self.path(coordinates), normalize_text(text));
        unit.line_number = Some(line_index);
        unit
    }

    fn scene_units(&self, act: u32, scene_index: u32, scene: &Scene) -> Vec<Result<DraftUnit, ExtractIssue>> {
        let scene_location = self.path(Coordinates::Play {
            act,
            scene: scene_index,
            line: None,
        });
        let mut units = Vec::new();

        match scene.title() {
            Some(title) => {
                let mut unit = DraftUnit::plain(scene_location.clone(), normalize_text(title));
                unit.role = Some(Role::Title);
                units.push(Ok(unit));
            }
            None => units.push(Err(ExtractIssue::MissingStructuralChild {
                location: scene_location.clone(),
                child: "scene title".to_string(),
            })),
        }

        let mut direction_index = 0;
        let mut push_direction = |text: &str, units: &mut Vec<_>| {
            let mut unit = DraftUnit::plain(scene_location.clone(), normalize_text(text));
            unit.role = Some(Role::Direction);
            unit.extra_index = Some(direction_index);
            direction_index += 1;
            units.push(Ok(unit));
        };
        for node in &scene.nodes {
            match node {
                SceneNode::Direction(text) => push_direction(text, &mut units),
                SceneNode::Speech(speech) if self.options.direction_scope == DirectionScope::SceneAndSpeech => {
                    for child in &speech.nodes {
                        if let SpeechNode::Direction(text) = child {
                            push_direction(text, &mut units);
                        }
                    }
                }
                SceneNode::Speech(_) | SceneNode::Title(_) => {}
            }
        }

        let mut line_index = 0;
        for speech in scene.speeches() {
            let (speaker, gender) = self.attribute(speech);
            for line in speech.lines() {
                let mut unit = DraftUnit::plain(
                    self.path(Coordinates::Play {
                        act,
                        scene: scene_index,
                        line: Some(line_index),
                    }),
                    normalize_text(&line.plain_text()),
                );
                unit.speaker = speaker.clone();
                unit.gender = gender;
                unit.line_number = Some(line_index);
                units.push(Ok(unit));
                line_index += 1;
            }
        }

        units
    }

    /// Speaker name and gender for the lines of a speech.
    fn attribute(&self, speech: &Speech) -> (Option<String>, Option<Gender>) {
        let declared: Vec<&str> = speech
            .speakers()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        let Some(first) = declared.first() else {
            return (None, None);
        };

        match self.options.speaker_attribution {
            SpeakerAttribution::Primary => {
                let gender = self.gender_of(first);
                (Some(first.to_string()), gender)
            }
            SpeakerAttribution::Joined => {
                let genders: Vec<Option<Gender>> = declared.iter().map(|name| self.gender_of(name)).collect();
                let gender = match genders.first().copied().flatten() {
                    Some(g) if genders.iter().all(|other| *other == Some(g)) => Some(g),
                    _ => None,
                };
                (Some(declared.join(", ")), gender)
            }
        }
    }

    fn gender_of(&self, speaker: &str) -> Option<Gender> {
        let gender = self.speakers.gender(speaker);
        if gender.is_none() {
            debug!("{}: no gender registered for {}", self.entry.abbreviation, speaker);
        }
        gender
    }
}

fn document_kind(document: &SourceDocument) -> TextKind {
    match document {
        SourceDocument::Play(_) => TextKind::Play,
        SourceDocument::Collection(_) => TextKind::Sonnet,
        SourceDocument::Poem(_) => TextKind::Poem,
    }
}

/// Normalize text for indexing and display: collapse whitespace, expand `&c`,
/// turn double hyphens into em dashes and straight apostrophes into curly ones.
pub fn normalize_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .replace("&c.", "etc.")
        .replace("&c", "etc.")
        .replace(",--", " — ")
        .replace("--", " — ")
        .replace(", —", " — ")
        .replace('\'', "’")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
