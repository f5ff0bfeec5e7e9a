//! Walking a location back to its element in a rendered work.

use std::fmt;

use thiserror::Error;

use crate::extractor::DirectionScope;
use crate::location::{Coordinates, Location};
use crate::render::{NodePath, RenderedDocument, RenderedNode};
use crate::unit::{Role, TextUnit};

/// Which element of a structural position to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The scene title
    Title,
    /// The nth stage direction of the scene
    Direction(u32),
    /// The line named by the location
    Line,
    /// The scene section itself
    Scene,
    /// The act section itself
    Act,
}

impl Anchor {
    /// Anchor for a search hit.
    pub fn for_unit(unit: &TextUnit) -> Self {
        match unit.role {
            Some(Role::Title) => Self::Title,
            Some(Role::Direction) => Self::Direction(unit.extra_index.unwrap_or(0)),
            None => Self::Line,
        }
    }

    /// Anchor for a citation typed by a user: a play citation without a
    /// line selects the whole scene, one without a scene the whole act.
    pub fn for_location(location: &Location) -> Self {
        match location.coordinates {
            Coordinates::Act { .. } => Self::Act,
            Coordinates::Play { line: None, .. } => Self::Scene,
            _ => Self::Line,
        }
    }
}

/// Resolution step that ran out of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStep {
    /// The location's kind does not match the rendered document
    Document,
    Act,
    Scene,
    Title,
    Direction,
    Line,
    Poem,
}

impl fmt::Display for ResolveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Act => "act",
            Self::Scene => "scene",
            Self::Title => "title",
            Self::Direction => "stage direction",
            Self::Line => "line",
            Self::Poem => "poem",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Citation {location} not found: no {step} at index {index}")]
pub struct UnresolvedLocation {
    pub location: String,
    pub step: ResolveStep,
    pub index: u32,
}

/// Resolve a location (and anchor) to the path of its rendered element.
///
/// `scope` must be the [`DirectionScope`] the units were extracted with, so
/// that direction indices count the same elements.
/// An act-only location selects the act section whatever the anchor.
pub fn resolve(
    document: &RenderedDocument,
    location: &Location,
    anchor: Anchor,
    scope: DirectionScope,
) -> Result<NodePath, UnresolvedLocation> {
    let missing = |step: ResolveStep, index: u32| UnresolvedLocation {
        location: location.path(),
        step,
        index,
    };
    let root = document.root();
    let here = NodePath::default();

    if location.kind() != document.kind() {
        return Err(missing(ResolveStep::Document, 0));
    }

    match location.coordinates {
        Coordinates::Play { act, scene, line } => {
            let (act_path, act_node) = nth_act(root, act).ok_or_else(|| missing(ResolveStep::Act, act))?;
            if anchor == Anchor::Act {
                return Ok(act_path);
            }
            let (scene_path, scene_node) = nth_child(act_node, &act_path, scene, |n| n.is("section", "scene"))
                .ok_or_else(|| missing(ResolveStep::Scene, scene))?;

            match anchor {
                Anchor::Act => Ok(act_path),
                Anchor::Scene => Ok(scene_path),
                Anchor::Title => nth_child(scene_node, &scene_path, 0, |n| n.is("h3", "scene-title"))
                    .map(|(path, _)| path)
                    .ok_or_else(|| missing(ResolveStep::Title, 0)),
                Anchor::Direction(index) => scene_directions(scene_node, &scene_path, scope)
                    .into_iter()
                    .nth(index as usize)
                    .ok_or_else(|| missing(ResolveStep::Direction, index)),
                Anchor::Line => {
                    let index = line.ok_or_else(|| missing(ResolveStep::Line, 0))?;
                    scene_lines(scene_node, &scene_path)
                        .into_iter()
                        .nth(index as usize)
                        .ok_or_else(|| missing(ResolveStep::Line, index))
                }
            }
        }
        Coordinates::Act { act } => nth_act(root, act)
            .map(|(path, _)| path)
            .ok_or_else(|| missing(ResolveStep::Act, act)),
        Coordinates::Sonnet { poem, line } => {
            let (poem_path, poem_node) = nth_child(root, &here, poem, |n| n.is("section", "poem"))
                .ok_or_else(|| missing(ResolveStep::Poem, poem))?;
            poem_node
                .children
                .iter()
                .enumerate()
                .filter(|(_, list)| list.tag == "ol")
                .flat_map(|(i, list)| {
                    let list_path = poem_path.child(i);
                    list.children
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| item.tag == "li")
                        .map(move |(j, _)| list_path.child(j))
                })
                .nth(line as usize)
                .ok_or_else(|| missing(ResolveStep::Line, line))
        }
        Coordinates::Poem { line } => root
            .children
            .iter()
            .enumerate()
            .filter(|(_, stanza)| stanza.is("section", "stanza"))
            .flat_map(|(i, stanza)| {
                let stanza_path = here.child(i);
                stanza
                    .children
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is("p", "line"))
                    .map(move |(j, _)| stanza_path.child(j))
            })
            .nth(line as usize)
            .ok_or_else(|| missing(ResolveStep::Line, line)),
    }
}

fn nth_act(root: &RenderedNode, act: u32) -> Option<(NodePath, &RenderedNode)> {
    nth_child(root, &NodePath::default(), act, |n| n.is("section", "act"))
}

fn nth_child<'a>(
    parent: &'a RenderedNode,
    parent_path: &NodePath,
    n: u32,
    matches: impl Fn(&RenderedNode) -> bool,
) -> Option<(NodePath, &'a RenderedNode)> {
    parent
        .children
        .iter()
        .enumerate()
        .filter(|(_, child)| matches(child))
        .nth(n as usize)
        .map(|(i, child)| (parent_path.child(i), child))
}

/// Stage directions of a scene in document order, as extraction counts them.
fn scene_directions(scene: &RenderedNode, scene_path: &NodePath, scope: DirectionScope) -> Vec<NodePath> {
    let mut paths = Vec::new();
    for (i, child) in scene.children.iter().enumerate() {
        if child.is("div", "stage-direction") {
            paths.push(scene_path.child(i));
        } else if scope == DirectionScope::SceneAndSpeech && child.is("ol", "speech") {
            for (j, item) in child.children.iter().enumerate() {
                if item.is("li", "stage-direction") {
                    paths.push(scene_path.child(i).child(j));
                }
            }
        }
    }
    paths
}

/// Dialogue lines of a scene: speech items that are neither speaker labels
/// nor stage directions.
fn scene_lines(scene: &RenderedNode, scene_path: &NodePath) -> Vec<NodePath> {
    scene
        .children
        .iter()
        .enumerate()
        .filter(|(_, child)| child.is("ol", "speech"))
        .flat_map(|(i, speech)| {
            let speech_path = scene_path.child(i);
            speech
                .children
                .iter()
                .enumerate()
                .filter(|(_, item)| {
                    item.tag == "li" && !item.has_class("speaker") && !item.has_class("stage-direction")
                })
                .map(move |(j, _)| speech_path.child(j))
        })
        .collect()
}
