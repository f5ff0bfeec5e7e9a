//! Parser adapter from source XML to the document model.
//!
//! Handles the PlayShakespeare vocabulary (`scenetitle`, `stagedir`,
//! `speaker long="…"`, `persona gender="…"`, `poembody`, `sonnet`) and the
//! older upper-case Bosak vocabulary (`SCENE`/`TITLE`, `SPEAKER` text). Tag
//! and attribute names are matched case-insensitively on their local part.
//!
//! Parsing happens in two steps: quick-xml events are folded into a small
//! element tree, then the tree is classified into [`SourceDocument`] once.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::document::{
    Act, Line, Persona, Play, Poem, Scene, SceneNode, Segment, SourceDocument, Speech, SpeechNode,
    Stanza,
};
use crate::registry::TextKind;

/// Errors that can occur while parsing a source document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Unexpected closing tag </{0}>")]
    Unbalanced(String),

    #[error("Unclosed element <{0}>")]
    Unclosed(String),

    #[error("Missing <{0}> element")]
    MissingElement(&'static str),
}

const STANZA_TAGS: &[&str] = &["stanza", "quatrain", "couplet", "tercet", "stanzasmall"];

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

#[derive(Debug)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).to_lowercase();
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_lowercase();
                let value = attr
                    .unescape_value()
                    .map(|value| value.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    /// Depth-first search for the first element named `name`, self included.
    fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|element| element.find(name))
    }

    /// All elements named `name` below this one, in document order. Does not
    /// descend into matches.
    fn find_all<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for element in self.elements() {
            if element.name == name {
                found.push(element);
            } else {
                element.find_all(name, found);
            }
        }
    }

    fn descendants(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.find_all(name, &mut found);
        found
    }

    fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }
}

fn attach(stack: &mut [XmlElement], node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Fold the XML into an element tree under a synthetic root.
fn parse_tree(source: &str) -> Result<XmlElement, ParseError> {
    let mut reader = Reader::from_str(source);
    let mut stack = vec![XmlElement::default()];

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(start) => stack.push(XmlElement::from_start(&start)),
            Event::Empty(start) => attach(&mut stack, XmlNode::Element(XmlElement::from_start(&start))),
            Event::End(end) => {
                if stack.len() < 2 {
                    let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    return Err(ParseError::Unbalanced(name));
                }
                if let Some(element) = stack.pop() {
                    attach(&mut stack, XmlNode::Element(element));
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map(|text| text.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                attach(&mut stack, XmlNode::Text(text));
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                attach(&mut stack, XmlNode::Text(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() > 1 {
        let unclosed = stack.pop().map(|element| element.name).unwrap_or_default();
        return Err(ParseError::Unclosed(unclosed));
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Parse a source document of the given kind.
pub fn parse_document(source: &str, kind: TextKind) -> Result<SourceDocument, ParseError> {
    let root = parse_tree(source)?;
    match kind {
        TextKind::Play => parse_play(&root).map(SourceDocument::Play),
        TextKind::Sonnet => parse_collection(&root).map(SourceDocument::Collection),
        TextKind::Poem => Ok(SourceDocument::Poem(parse_poem(&root))),
    }
}

fn parse_play(root: &XmlElement) -> Result<Play, ParseError> {
    let play = root.find("play").ok_or(ParseError::MissingElement("play"))?;
    let acts = play.descendants("act");
    if acts.is_empty() {
        return Err(ParseError::MissingElement("act"));
    }

    Ok(Play {
        title: play.child("title").map(XmlElement::text),
        personae: play.descendants("persona").into_iter().map(parse_persona).collect(),
        acts: acts
            .into_iter()
            .map(|act| Act {
                title: act
                    .child("acttitle")
                    .or_else(|| act.child("title"))
                    .map(XmlElement::text),
                scenes: act.descendants("scene").into_iter().map(parse_scene).collect(),
            })
            .collect(),
    })
}

fn parse_persona(persona: &XmlElement) -> Persona {
    let name = persona
        .child("persname")
        .or_else(|| persona.elements().next())
        .map(XmlElement::text)
        .unwrap_or_else(|| persona.text());
    Persona {
        name: name.trim().to_string(),
        gender: persona.attr("gender").and_then(|g| g.parse().ok()),
    }
}

fn parse_scene(scene: &XmlElement) -> Scene {
    let nodes = scene
        .elements()
        .filter_map(|element| match element.name.as_str() {
            "scenetitle" | "title" => Some(SceneNode::Title(element.text())),
            "stagedir" => Some(SceneNode::Direction(element.text())),
            "speech" => Some(SceneNode::Speech(parse_speech(element))),
            _ => None,
        })
        .collect();
    Scene { nodes }
}

fn parse_speech(speech: &XmlElement) -> Speech {
    let nodes = speech
        .elements()
        .filter_map(|element| match element.name.as_str() {
            "speaker" => {
                let name = element
                    .attr("long")
                    .map(str::to_string)
                    .unwrap_or_else(|| element.text());
                Some(SpeechNode::Speaker(name.trim().to_string()))
            }
            "line" => Some(SpeechNode::Line(parse_line(element))),
            "stagedir" => Some(SpeechNode::Direction(element.text())),
            _ => None,
        })
        .collect();
    Speech { nodes }
}

/// Text and inline markup around it form one run; only a stage direction
/// starts a new segment.
fn parse_line(line: &XmlElement) -> Line {
    let mut segments = Vec::new();
    let mut run = String::new();
    for child in &line.children {
        match child {
            XmlNode::Text(text) => run.push_str(text),
            XmlNode::Element(element) if element.name == "stagedir" => {
                if !run.trim().is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut run)));
                }
                run.clear();
                segments.push(Segment::Direction(element.text()));
            }
            XmlNode::Element(element) => element.collect_text(&mut run),
        }
    }
    if !run.trim().is_empty() {
        segments.push(Segment::Text(run));
    }
    Line { segments }
}

fn parse_collection(root: &XmlElement) -> Result<Vec<Poem>, ParseError> {
    let sonnets = root.descendants("sonnet");
    if sonnets.is_empty() {
        return Err(ParseError::MissingElement("sonnet"));
    }
    Ok(sonnets
        .into_iter()
        .map(|sonnet| Poem {
            title: sonnet.child("title").map(XmlElement::text),
            stanzas: vec![Stanza {
                heading: None,
                lines: sonnet.descendants("line").into_iter().map(parse_line).collect(),
            }],
        })
        .collect())
}

fn parse_poem(root: &XmlElement) -> Poem {
    let title = root.find("title").map(XmlElement::text);
    let body = root.find("poembody").unwrap_or(root);

    let mut stanzas = Vec::new();
    let mut loose = Vec::new();
    for element in body.elements() {
        if element.name == "line" {
            loose.push(parse_line(element));
            continue;
        }
        let lines: Vec<Line> = element.descendants("line").into_iter().map(parse_line).collect();
        if lines.is_empty() {
            continue;
        }
        if !loose.is_empty() {
            stanzas.push(Stanza {
                heading: None,
                lines: std::mem::take(&mut loose),
            });
        }
        let heading = if STANZA_TAGS.contains(&element.name.as_str()) {
            element.child("stanzanum").map(XmlElement::text)
        } else {
            None
        };
        stanzas.push(Stanza { heading, lines });
    }
    if !loose.is_empty() {
        stanzas.push(Stanza {
            heading: None,
            lines: loose,
        });
    }

    Poem { title, stanzas }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::normalize_text;
    use crate::unit::Gender;

    const PLAY: &str = r#"<?xml version="1.0"?>
<play>
  <title>The Tempest</title>
  <personae>
    <persona gender="m"><persname>ARIEL</persname></persona>
    <persona gender="f"><persname>MIRANDA</persname></persona>
  </personae>
  <act>
    <acttitle>Act 1</acttitle>
    <scene>
      <scenetitle>A storm</scenetitle>
      <scenelocation>On a ship at sea</scenelocation>
      <stagedir>Thunder</stagedir>
      <speech>
        <speaker long="ARIEL">ARI.</speaker>
        <line number="1">All hail, great master! <stagedir>Kneels</stagedir></line>
        <stagedir>Aside</stagedir>
        <line number="2">grave sir, hail!</line>
      </speech>
    </scene>
  </act>
  <act><acttitle>Act 2</acttitle></act>
</play>"#;

    #[test]
    fn test_parse_play() {
        let SourceDocument::Play(play) = parse_document(PLAY, TextKind::Play).unwrap() else {
            panic!("expected a play");
        };
        assert_eq!(play.title.as_deref(), Some("The Tempest"));
        assert_eq!(play.personae.len(), 2);
        assert_eq!(play.personae[1].gender, Some(Gender::F));
        assert_eq!(play.acts.len(), 2);

        let scene = &play.acts[0].scenes[0];
        assert_eq!(scene.title(), Some("A storm"));
        assert_eq!(scene.nodes.len(), 3);
        let speech = scene.speeches().next().unwrap();
        assert_eq!(speech.speakers().collect::<Vec<_>>(), vec!["ARIEL"]);
        let first_line = speech.lines().next().unwrap();
        assert_eq!(
            first_line.segments,
            vec![
                Segment::Text("All hail, great master! ".to_string()),
                Segment::Direction("Kneels".to_string()),
            ]
        );
        assert!(speech
            .nodes
            .iter()
            .any(|node| matches!(node, SpeechNode::Direction(text) if text == "Aside")));
    }

    #[test]
    fn test_parse_bosak_vocabulary() {
        let source = r#"<PLAY><TITLE>Hamlet</TITLE><ACT><TITLE>ACT I</TITLE>
            <SCENE><TITLE>SCENE I. Elsinore.</TITLE>
            <SPEECH><SPEAKER>BERNARDO</SPEAKER><LINE>Who's there?</LINE></SPEECH>
            </SCENE></ACT></PLAY>"#;
        let SourceDocument::Play(play) = parse_document(source, TextKind::Play).unwrap() else {
            panic!("expected a play");
        };
        assert_eq!(play.acts[0].title.as_deref(), Some("ACT I"));
        let scene = &play.acts[0].scenes[0];
        assert_eq!(scene.title(), Some("SCENE I. Elsinore."));
        let speech = scene.speeches().next().unwrap();
        assert_eq!(speech.speakers().next(), Some("BERNARDO"));
        assert_eq!(speech.lines().next().unwrap().plain_text(), "Who's there?");
    }

    #[test]
    fn test_parse_sonnets() {
        let source = r#"<sonnets>
            <sonnet><line>From fairest creatures we desire increase,</line><line>That thereby beauty's rose might never die,</line></sonnet>
            <sonnet><quatrain><line>When forty winters shall besiege thy brow,</line></quatrain></sonnet>
        </sonnets>"#;
        let SourceDocument::Collection(poems) = parse_document(source, TextKind::Sonnet).unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(poems.len(), 2);
        assert_eq!(poems[0].lines().count(), 2);
        assert_eq!(poems[1].lines().count(), 1);
    }

    #[test]
    fn test_parse_poem_stanzas() {
        let source = r#"<poem><title>Venus and Adonis</title><poembody>
            <dedication>TO THE RIGHT HONOURABLE</dedication>
            <stanza n="1"><stanzanum>1</stanzanum>
              <line>Even as the sun with purple-colour'd face</line>
              <line>Had ta'en his last leave of the weeping morn,</line>
            </stanza>
            <stanza n="2"><line>Sick-thoughted Venus makes amain unto him,</line></stanza>
        </poembody></poem>"#;
        let SourceDocument::Poem(poem) = parse_document(source, TextKind::Poem).unwrap() else {
            panic!("expected a poem");
        };
        assert_eq!(poem.title.as_deref(), Some("Venus and Adonis"));
        assert_eq!(poem.stanzas.len(), 2);
        assert_eq!(poem.stanzas[0].heading.as_deref(), Some("1"));
        assert_eq!(poem.lines().count(), 3);
    }

    #[test]
    fn test_entities_unescaped() {
        let source = "<poem><poembody><line>Fish &amp; fowl</line></poembody></poem>";
        let SourceDocument::Poem(poem) = parse_document(source, TextKind::Poem).unwrap() else {
            panic!("expected a poem");
        };
        assert_eq!(poem.lines().next().unwrap().plain_text(), "Fish & fowl");
    }

    #[test]
    fn test_inline_markup_joins_without_spaces() {
        let source = "<poem><poembody>\
            <line>Mon <foreign>Dieu</foreign>, he cries</line>\
            <line>Yor<i>ick</i>!</line>\
            <line><i>Sweet</i> <i>love</i></line>\
            </poembody></poem>";
        let SourceDocument::Poem(poem) = parse_document(source, TextKind::Poem).unwrap() else {
            panic!("expected a poem");
        };
        let lines: Vec<String> = poem.lines().map(|line| normalize_text(&line.plain_text())).collect();
        assert_eq!(lines, vec!["Mon Dieu, he cries", "Yorick!", "Sweet love"]);
        assert!(poem.lines().all(|line| line.segments.len() == 1));
    }

    #[test]
    fn test_missing_play_structure() {
        assert!(matches!(
            parse_document("<poem/>", TextKind::Play),
            Err(ParseError::MissingElement("play"))
        ));
        assert!(matches!(
            parse_document("<play><title>x</title></play>", TextKind::Play),
            Err(ParseError::MissingElement("act"))
        ));
        assert!(matches!(
            parse_document("<sonnets/>", TextKind::Sonnet),
            Err(ParseError::MissingElement("sonnet"))
        ));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_document("<play><act></play>", TextKind::Play).is_err());
        assert!(parse_document("<play><act>", TextKind::Play).is_err());
    }
}
