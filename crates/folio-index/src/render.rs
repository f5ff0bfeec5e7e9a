//! Rendering a parsed work into an HTML-like element tree.
//!
//! The tree mirrors the source structure closely enough that a location can
//! be walked back to its element:
//!
//! ```text
//! article.play
//!   h1
//!   section.act
//!     h2
//!     section.scene
//!       h3.scene-title
//!       div.stage-direction
//!       ol.speech[data-s]
//!         li.speaker
//!         li[data-n]            one per line, inline directions as span.stage-direction
//!         li.stage-direction
//! article.collection
//!   section.poem
//!     h2
//!     ol > li[data-n]           one ol per stanza
//! article.poem
//!   h1
//!   section.stanza
//!     h2
//!     p.line[data-n]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{Line, Play, Poem, SceneNode, Segment, SourceDocument, Speech, SpeechNode};
use crate::registry::TextKind;

pub const HIGHLIGHT_CLASS: &str = "highlight";

/// Options for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Print a line number every N lines; 0 disables numbering
    pub line_number_interval: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            line_number_interval: 5,
        }
    }
}

/// One element of the rendered tree. An empty `tag` marks a bare text node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedNode {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn text_node(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: RenderedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_text(&self) -> bool {
        self.tag.is_empty()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Tag and class both match.
    pub fn is(&self, tag: &str, class: &str) -> bool {
        self.tag == tag && self.has_class(class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All text below this node, separated by single spaces.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            parts.push(text);
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    /// Serialize as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        if self.is_text() {
            if let Some(text) = &self.text {
                out.push_str(&escape(text));
            }
            return;
        }

        out.push('<');
        out.push_str(&self.tag);
        if !self.classes.is_empty() {
            out.push_str(" class=\"");
            out.push_str(&escape(&self.classes.join(" ")));
            out.push('"');
        }
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Child indices leading from the document root to one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }
}

/// A fully rendered work. Only [`render_document`] creates one, so anything
/// holding a `RenderedDocument` holds a complete tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    kind: TextKind,
    root: RenderedNode,
}

impl RenderedDocument {
    pub fn kind(&self) -> TextKind {
        self.kind
    }

    pub fn root(&self) -> &RenderedNode {
        &self.root
    }

    pub fn node(&self, path: &NodePath) -> Option<&RenderedNode> {
        path.0
            .iter()
            .try_fold(&self.root, |node, &index| node.children.get(index))
    }

    fn node_mut(&mut self, path: &NodePath) -> Option<&mut RenderedNode> {
        path.0
            .iter()
            .try_fold(&mut self.root, |node, &index| node.children.get_mut(index))
    }

    /// Mark the node at `path` as highlighted. Returns false when the path
    /// does not exist.
    pub fn highlight(&mut self, path: &NodePath) -> bool {
        match self.node_mut(path) {
            Some(node) => {
                if !node.has_class(HIGHLIGHT_CLASS) {
                    node.classes.push(HIGHLIGHT_CLASS.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn to_html(&self) -> String {
        self.root.to_html()
    }
}

/// Render a parsed document.
pub fn render_document(document: &SourceDocument, options: &RenderOptions) -> RenderedDocument {
    let numbering = LineNumbering(options.line_number_interval);
    match document {
        SourceDocument::Play(play) => RenderedDocument {
            kind: TextKind::Play,
            root: render_play(play, numbering),
        },
        SourceDocument::Collection(poems) => {
            let root = poems.iter().fold(
                RenderedNode::new("article").with_class("collection"),
                |root, poem| root.with_child(render_collection_poem(poem, numbering)),
            );
            RenderedDocument {
                kind: TextKind::Sonnet,
                root,
            }
        }
        SourceDocument::Poem(poem) => RenderedDocument {
            kind: TextKind::Poem,
            root: render_poem(poem, numbering),
        },
    }
}

#[derive(Clone, Copy)]
struct LineNumbering(u32);

impl LineNumbering {
    /// Attach the 1-based display number to every Nth line.
    fn decorate(self, node: RenderedNode, line_index: u32) -> RenderedNode {
        let number = line_index + 1;
        if self.0 > 0 && number % self.0 == 0 {
            node.with_attribute("data-n", number.to_string())
        } else {
            node
        }
    }
}

fn render_play(play: &Play, numbering: LineNumbering) -> RenderedNode {
    let mut root = RenderedNode::new("article").with_class("play");
    if let Some(title) = &play.title {
        root = root.with_child(RenderedNode::new("h1").with_text(title.as_str()));
    }

    for act in &play.acts {
        let mut section = RenderedNode::new("section").with_class("act");
        if let Some(title) = &act.title {
            section = section.with_child(RenderedNode::new("h2").with_text(title.as_str()));
        }
        for scene in &act.scenes {
            let mut scene_node = RenderedNode::new("section").with_class("scene");
            let mut line_index = 0;
            for node in &scene.nodes {
                let child = match node {
                    SceneNode::Title(title) => RenderedNode::new("h3")
                        .with_class("scene-title")
                        .with_text(title.as_str()),
                    SceneNode::Direction(text) => RenderedNode::new("div")
                        .with_class("stage-direction")
                        .with_text(text.as_str()),
                    SceneNode::Speech(speech) => render_speech(speech, &mut line_index, numbering),
                };
                scene_node = scene_node.with_child(child);
            }
            section = section.with_child(scene_node);
        }
        root = root.with_child(section);
    }
    root
}

fn render_speech(speech: &Speech, line_index: &mut u32, numbering: LineNumbering) -> RenderedNode {
    let speakers: Vec<&str> = speech.speakers().collect();
    let mut list = RenderedNode::new("ol").with_class("speech");
    if !speakers.is_empty() {
        list = list.with_attribute("data-s", speakers.join(", "));
    }

    for node in &speech.nodes {
        let child = match node {
            SpeechNode::Speaker(name) => RenderedNode::new("li").with_class("speaker").with_text(name.as_str()),
            SpeechNode::Direction(text) => RenderedNode::new("li")
                .with_class("stage-direction")
                .with_text(text.as_str()),
            SpeechNode::Line(line) => {
                let item = numbering.decorate(render_line(RenderedNode::new("li"), line), *line_index);
                *line_index += 1;
                item
            }
        };
        list = list.with_child(child);
    }
    list
}

fn render_line(node: RenderedNode, line: &Line) -> RenderedNode {
    match line.segments.as_slice() {
        [] => node,
        [Segment::Text(text)] => node.with_text(text.as_str()),
        segments => segments.iter().fold(node, |node, segment| {
            node.with_child(match segment {
                Segment::Text(text) => RenderedNode::text_node(text.as_str()),
                Segment::Direction(text) => RenderedNode::new("span")
                    .with_class("stage-direction")
                    .with_text(text.as_str()),
            })
        }),
    }
}

fn render_collection_poem(poem: &Poem, numbering: LineNumbering) -> RenderedNode {
    let mut section = RenderedNode::new("section").with_class("poem");
    if let Some(title) = &poem.title {
        section = section.with_child(RenderedNode::new("h2").with_text(title.as_str()));
    }
    let mut line_index = 0;
    for stanza in &poem.stanzas {
        let mut list = RenderedNode::new("ol");
        for line in &stanza.lines {
            list = list.with_child(numbering.decorate(render_line(RenderedNode::new("li"), line), line_index));
            line_index += 1;
        }
        section = section.with_child(list);
    }
    section
}

fn render_poem(poem: &Poem, numbering: LineNumbering) -> RenderedNode {
    let mut root = RenderedNode::new("article").with_class("poem");
    if let Some(title) = &poem.title {
        root = root.with_child(RenderedNode::new("h1").with_text(title.as_str()));
    }
    let mut line_index = 0;
    for stanza in &poem.stanzas {
        let mut section = RenderedNode::new("section").with_class("stanza");
        if let Some(heading) = &stanza.heading {
            section = section.with_child(RenderedNode::new("h2").with_text(heading.as_str()));
        }
        for line in &stanza.lines {
            let paragraph = render_line(RenderedNode::new("p").with_class("line"), line);
            section = section.with_child(numbering.decorate(paragraph, line_index));
            line_index += 1;
        }
        root = root.with_child(section);
    }
    root
}
