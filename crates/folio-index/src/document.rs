//! Source document model.
//!
//! The parser adapter produces these closed tagged unions once per document;
//! the extractor and the renderer match on them exhaustively instead of
//! switching on tag names.

use crate::unit::Gender;

/// A parsed work, shaped by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDocument {
    Play(Play),
    /// Multi-poem collection (a sonnet sequence)
    Collection(Vec<Poem>),
    Poem(Poem),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Play {
    pub title: Option<String>,
    pub personae: Vec<Persona>,
    pub acts: Vec<Act>,
}

/// A character from the dramatis personae.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Act {
    pub title: Option<String>,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Title(String),
    Direction(String),
    Speech(Speech),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Speech {
    pub nodes: Vec<SpeechNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechNode {
    Speaker(String),
    Line(Line),
    Direction(String),
}

/// A line of dialogue or verse. Inline stage directions stay in place as
/// separate segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Direction(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Poem {
    pub title: Option<String>,
    pub stanzas: Vec<Stanza>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stanza {
    pub heading: Option<String>,
    pub lines: Vec<Line>,
}

impl Scene {
    /// The scene's title, if it has one. Only the first title node counts.
    pub fn title(&self) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Title(title) => Some(title.as_str()),
            _ => None,
        })
    }

    pub fn speeches(&self) -> impl Iterator<Item = &Speech> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Speech(speech) => Some(speech),
            _ => None,
        })
    }
}

impl Speech {
    /// Declared speakers in document order.
    pub fn speakers(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            SpeechNode::Speaker(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.nodes.iter().filter_map(|node| match node {
            SpeechNode::Line(line) => Some(line),
            _ => None,
        })
    }
}

impl Line {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
        }
    }

    /// Line text with inline stage directions flattened into plain text.
    ///
    /// Text runs are concatenated as they stand in the source; a direction is
    /// set off by a space on each side. Callers normalize the whitespace.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(run) => text.push_str(run),
                Segment::Direction(direction) => {
                    text.push(' ');
                    text.push_str(direction);
                    text.push(' ');
                }
            }
        }
        text
    }
}

impl Poem {
    /// All lines in document order, across stanzas.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.stanzas.iter().flat_map(|stanza| stanza.lines.iter())
    }
}
