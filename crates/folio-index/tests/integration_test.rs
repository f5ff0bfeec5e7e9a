//! Integration tests for folio-index crate.
//!
//! These tests verify the end-to-end pipeline: parse, extract, index, query,
//! render and resolve.

use std::collections::HashSet;
use std::fs;

use tempfile::tempdir;

use folio_index::{
    decode, display_citation, encode, parse_document, render_document, resolve, Anchor, ArtifactStore, Citation,
    Coordinates, CorpusBuilder, DirectionScope, ExtractOptions, Extractor, Filters, Gender, QueryEngine,
    RenderOptions, ResolveStep, Role, SearchOptions, SourceDocument, SpeakerRegistry, TextKind, TextRegistry,
};

const REGISTRY: &str = r#"
[[texts]]
file = "tempest.xml"
abbreviation = "P"
title = "The Tempest"
kind = "play"

[[texts]]
file = "sonnets.xml"
abbreviation = "Son"
title = "Sonnets"
kind = "sonnet"

[[texts]]
file = "hamlet.xml"
abbreviation = "Ham"
title = "Hamlet"
kind = "play"
"#;

const TEMPEST: &str = r#"<?xml version="1.0"?>
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
      <stagedir>Thunder</stagedir>
      <speech>
        <speaker long="ARIEL">ARI.</speaker>
        <line>All hail, great master!</line>
        <line>grave sir, hail! I come</line>
      </speech>
    </scene>
  </act>
  <act>
    <acttitle>Act 2</acttitle>
  </act>
</play>"#;

/// Two acts, so any citation of act 3 is out of range.
const HAMLET: &str = r#"<play>
  <title>Hamlet</title>
  <personae>
    <persona gender="m"><persname>HAMLET</persname></persona>
    <persona gender="f"><persname>OPHELIA</persname></persona>
  </personae>
  <act><acttitle>Act 1</acttitle>
    <scene><scenetitle>Elsinore. A platform before the castle.</scenetitle>
      <speech><speaker long="BERNARDO">BER.</speaker><line>Who is there?</line></speech>
      <speech><speaker long="HAMLET">HAM.</speaker><line>The time is out of joint</line></speech>
      <speech><speaker long="OPHELIA">OPH.</speaker><line>The courtier's, soldier's, scholar's, eye, tongue, sword</line></speech>
    </scene>
  </act>
  <act><acttitle>Act 2</acttitle>
    <scene><scenetitle>A room in Polonius' house.</scenetitle>
      <stagedir>Enter OPHELIA</stagedir>
      <speech><speaker long="OPHELIA">OPH.</speaker><line>O my lord, my lord, I have been so affrighted!</line></speech>
      <speech><speaker long="HAMLET">HAM.</speaker><line>Words, words, words.</line></speech>
    </scene>
  </act>
</play>"#;

fn sonnets() -> String {
    let mut xml = String::from("<sonnets>");
    for sonnet in 1..=3 {
        xml.push_str("<sonnet>");
        for line in 1..=14 {
            xml.push_str(&format!("<line>verse {line} of sonnet {sonnet}</line>"));
        }
        xml.push_str("</sonnet>");
    }
    xml.push_str("</sonnets>");
    xml
}

fn registry() -> TextRegistry {
    TextRegistry::from_toml(REGISTRY).unwrap()
}

fn engine(documents: &[(&str, &SourceDocument)]) -> QueryEngine {
    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    let output = builder.build_documents(documents).unwrap();
    QueryEngine::new(output.artifact, SearchOptions::default())
}

/// A play with one storm scene yields a title, a direction and two lines.
#[test]
fn test_play_extraction() {
    let registry = registry();
    let document = parse_document(TEMPEST, TextKind::Play).unwrap();
    let SourceDocument::Play(play) = &document else {
        panic!("expected a play");
    };
    let speakers = SpeakerRegistry::from_play(play);
    let entry = registry.get("P").unwrap();
    let extractor = Extractor::new(entry, &speakers, ExtractOptions::default());
    let units: Vec<_> = extractor.extract(&document).collect::<Result<_, _>>().unwrap();

    let summary: Vec<(&str, Option<Role>, Option<u32>)> = units
        .iter()
        .map(|u| (u.location.as_str(), u.role, u.extra_index))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("P.0.0", Some(Role::Title), None),
            ("P.0.0", Some(Role::Direction), Some(0)),
            ("P.0.0.0", None, None),
            ("P.0.0.1", None, None),
        ]
    );
    assert_eq!(units[2].speaker.as_deref(), Some("ARIEL"));
    assert_eq!(units[2].gender, Some(Gender::M));

    let location = decode(TextKind::Play, "P.0.0.1").unwrap();
    assert_eq!(
        location.coordinates,
        Coordinates::Play {
            act: 0,
            scene: 0,
            line: Some(1)
        }
    );
}

/// Searching for a scene title finds the title unit with a 1-based citation.
#[test]
fn test_search_scene_title() {
    let tempest = parse_document(TEMPEST, TextKind::Play).unwrap();
    let engine = engine(&[("P", &tempest)]);

    let matches = engine.search("storm", &Filters::new()).unwrap();
    assert!(!matches.is_empty());
    let first = &matches[0];
    assert_eq!(first.unit.role, Some(Role::Title));
    assert_eq!(first.unit.text, "A storm");
    assert_eq!(display_citation(&engine.artifact().texts, &first.unit), "P.1.1");
    assert_eq!(first.citation(&engine.artifact().texts), "P.1.1");
}

/// A citation beyond the rendered acts does not resolve.
#[test]
fn test_citation_out_of_range() {
    let registry = registry();
    let location = Citation::parse(&registry, "ham.3.1.56").unwrap();
    assert_eq!(location.abbreviation, "Ham");
    assert_eq!(
        location.coordinates,
        Coordinates::Play {
            act: 2,
            scene: 0,
            line: Some(55)
        }
    );

    let hamlet = parse_document(HAMLET, TextKind::Play).unwrap();
    let rendered = render_document(&hamlet, &RenderOptions::default());
    let err = resolve(&rendered, &location, Anchor::for_location(&location), DirectionScope::Scene).unwrap_err();
    assert_eq!(err.step, ResolveStep::Act);
    assert_eq!(err.index, 2);
}

/// Sonnet 2 line 5 sits at `Son.1.4` and the path round-trips.
#[test]
fn test_sonnet_locations() {
    let document = parse_document(&sonnets(), TextKind::Sonnet).unwrap();
    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    let output = builder.build_documents(&[("Son", &document)]).unwrap();
    let index = &output.artifact.index;
    assert_eq!(index.len(), 42);

    let unit = index.units().iter().find(|u| u.location == "Son.1.4").unwrap();
    assert_eq!(unit.text, "verse 5 of sonnet 2");
    assert_eq!(unit.line_number, Some(4));

    let location = decode(TextKind::Sonnet, &unit.location).unwrap();
    assert_eq!(location.coordinates, Coordinates::Sonnet { poem: 1, line: 4 });
    assert_eq!(encode(TextKind::Sonnet, "Son", &location.coordinates).unwrap(), unit.location);
}

/// The gender filter drops male and unregistered speakers.
#[test]
fn test_gender_filter() {
    let hamlet = parse_document(HAMLET, TextKind::Play).unwrap();
    let engine = engine(&[("Ham", &hamlet)]);

    let everyone = engine.search("the", &Filters::new()).unwrap();
    assert!(everyone.iter().any(|m| m.unit.gender == Some(Gender::M)));
    assert!(everyone.iter().any(|m| m.unit.speaker.as_deref() == Some("BERNARDO")));

    let women = engine.search("the", &Filters::new().gender(Gender::F)).unwrap();
    assert!(!women.is_empty());
    assert!(women.iter().all(|m| m.unit.gender == Some(Gender::F)));
    assert!(women.iter().all(|m| m.unit.speaker.as_deref() == Some("OPHELIA")));
}

/// Speaker and gender filters commute.
#[test]
fn test_filter_conjunction() {
    let hamlet = parse_document(HAMLET, TextKind::Play).unwrap();
    let engine = engine(&[("Ham", &hamlet)]);

    let speaker_then_gender = Filters::new().speaker("o").gender(Gender::F);
    let gender_then_speaker = Filters::new().gender(Gender::F).speaker("o");
    assert_eq!(
        engine.search("lord", &speaker_then_gender).unwrap(),
        engine.search("lord", &gender_then_speaker).unwrap()
    );
}

/// Positions are unique per document and line numbers count up per scene.
#[test]
fn test_unique_positions_and_line_order() {
    let hamlet = parse_document(HAMLET, TextKind::Play).unwrap();
    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    let output = builder.build_documents(&[("Ham", &hamlet)]).unwrap();
    let units = output.artifact.index.units();

    let keys: HashSet<_> = units.iter().map(|u| u.position_key()).collect();
    assert_eq!(keys.len(), units.len());

    let act_one: Vec<u32> = units
        .iter()
        .filter(|u| u.location.starts_with("Ham.0.0.") && u.role.is_none())
        .filter_map(|u| u.line_number)
        .collect();
    assert_eq!(act_one, vec![0, 1, 2]);
}

/// A search hit resolves to the rendered element holding its text.
#[test]
fn test_resolve_search_hit() {
    let hamlet = parse_document(HAMLET, TextKind::Play).unwrap();
    let engine = engine(&[("Ham", &hamlet)]);
    let texts = &engine.artifact().texts;

    let hit = &engine.search("words, words", &Filters::new()).unwrap()[0];
    assert!(hit.exact);
    let location = folio_index::Location::resolve(texts, &hit.unit.location).unwrap();

    let mut rendered = render_document(&hamlet, &RenderOptions::default());
    let path = resolve(&rendered, &location, Anchor::for_unit(&hit.unit), DirectionScope::Scene).unwrap();
    assert!(rendered.highlight(&path));
    let node = rendered.node(&path).unwrap();
    assert_eq!(node.text_content(), hit.unit.text);
    assert!(node.has_class("highlight"));

    let direction = engine.search("enter ophelia", &Filters::new()).unwrap();
    let direction = direction.iter().find(|m| m.unit.role == Some(Role::Direction)).unwrap();
    let location = folio_index::Location::resolve(texts, &direction.unit.location).unwrap();
    let path = resolve(&rendered, &location, Anchor::for_unit(&direction.unit), DirectionScope::Scene).unwrap();
    assert_eq!(rendered.node(&path).unwrap().text_content(), "Enter OPHELIA");
}

/// Building a directory isolates broken documents and persists the rest.
#[tokio::test]
async fn test_build_dir_and_persist() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("texts");
    fs::create_dir_all(source.join("poems")).unwrap();
    fs::write(source.join("tempest.xml"), TEMPEST).unwrap();
    fs::write(source.join("poems").join("sonnets.xml"), sonnets()).unwrap();
    fs::write(source.join("hamlet.xml"), "<play><act><scene></act></play>").unwrap();
    fs::write(source.join("unregistered.xml"), "<play/>").unwrap();
    fs::write(source.join("notes.txt"), "not xml").unwrap();

    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    let output = builder.build_dir(&source).await.unwrap();

    assert_eq!(output.stats.documents_indexed, 2);
    assert_eq!(output.stats.documents_failed, 1);
    assert_eq!(output.stats.files_skipped, 1);
    assert_eq!(output.manifest.failures.len(), 1);
    assert_eq!(output.manifest.failures[0].file, "hamlet.xml");
    assert_eq!(output.manifest.texts["Son"].unit_count, 42);
    assert_eq!(output.manifest.texts["Son"].content_hash.len(), 64);
    assert!(output.artifact.texts.get("Ham").is_none());

    // Dense ids across both documents, sonnets first (sorted path order)
    let units = output.artifact.index.units();
    assert_eq!(units.len(), 46);
    assert!(units.iter().enumerate().all(|(i, u)| u.id as usize == i));
    assert!(units[0].location.starts_with("Son."));

    let store = ArtifactStore::new(dir.path().join("out"));
    store.save(&output).unwrap();
    let loaded = store.load_artifact().unwrap();
    assert_eq!(loaded.speaker_names(), vec!["ARIEL", "MIRANDA"]);

    let locations = |engine: QueryEngine| -> Vec<String> {
        engine
            .search("hail", &Filters::new())
            .unwrap()
            .into_iter()
            .map(|m| m.unit.location)
            .collect()
    };
    let before = locations(QueryEngine::new(output.artifact.clone(), SearchOptions::default()));
    let after = locations(QueryEngine::new(loaded, SearchOptions::default()));
    assert_eq!(before, vec!["P.0.0.0", "P.0.0.1"]);
    assert_eq!(before, after);
    assert_eq!(store.load_manifest().unwrap(), output.manifest);
}

/// Two builds of the same directory number units identically.
#[tokio::test]
async fn test_build_dir_is_deterministic() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("tempest.xml"), TEMPEST).unwrap();
    fs::write(dir.path().join("sonnets.xml"), sonnets()).unwrap();
    fs::write(dir.path().join("hamlet.xml"), HAMLET).unwrap();

    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    let first = builder.build_dir(dir.path()).await.unwrap();
    let second = builder.build_dir(dir.path()).await.unwrap();
    assert_eq!(first.artifact.index.units(), second.artifact.index.units());
}

#[tokio::test]
async fn test_build_dir_missing_directory() {
    let dir = tempdir().unwrap();
    let builder = CorpusBuilder::new(registry(), ExtractOptions::default());
    assert!(builder.build_dir(&dir.path().join("missing")).await.is_err());
}
