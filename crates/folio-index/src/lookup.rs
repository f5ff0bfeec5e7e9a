//! Classifying free-form user input: open a text, go to a citation, or search.

use crate::location::{Citation, CitationError, Location};
use crate::registry::{TextEntry, TextRegistry};

/// What a piece of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'r> {
    /// A whole work, named by abbreviation or title
    Text(&'r TextEntry),
    /// A dotted citation such as `ham.3.1.56`
    Citation(Result<Location, CitationError>),
    /// Anything else is a search query
    Query(String),
}

impl<'r> Lookup<'r> {
    pub fn classify(input: &str, registry: &'r TextRegistry) -> Self {
        let value = clean(input);

        if let Some(entry) = registry.get(&value).or_else(|| registry.by_title(&value)) {
            return Self::Text(entry);
        }

        if value.contains('.') {
            return Self::Citation(Citation::parse(registry, &value));
        }

        Self::Query(value)
    }
}

/// Replace every run of characters other than word characters and `.` with
/// a single space.
fn clean(input: &str) -> String {
    input
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Coordinates;
    use crate::registry::TextKind;

    fn registry() -> TextRegistry {
        TextRegistry::new(vec![
            TextEntry::new("Ham", "Hamlet", TextKind::Play),
            TextEntry::new("Ven", "Venus and Adonis", TextKind::Poem),
        ])
        .unwrap()
    }

    #[test]
    fn test_text_by_abbreviation_or_title() {
        let registry = registry();
        assert!(matches!(Lookup::classify("ham", &registry), Lookup::Text(e) if e.abbreviation == "Ham"));
        assert!(matches!(Lookup::classify("HAMLET", &registry), Lookup::Text(e) if e.abbreviation == "Ham"));
        assert!(matches!(
            Lookup::classify("venus-and  adonis", &registry),
            Lookup::Text(e) if e.abbreviation == "Ven"
        ));
    }

    #[test]
    fn test_citation() {
        let registry = registry();
        let expected = Location::new(
            "Ham",
            Coordinates::Play {
                act: 2,
                scene: 0,
                line: Some(55),
            },
        );
        assert_eq!(Lookup::classify("#ham.3.1.56", &registry), Lookup::Citation(Ok(expected)));
    }

    #[test]
    fn test_citation_with_unknown_text() {
        let registry = registry();
        assert!(matches!(
            Lookup::classify("mac.1.1.1", &registry),
            Lookup::Citation(Err(CitationError::UnknownText(_)))
        ));
    }

    #[test]
    fn test_query() {
        let registry = registry();
        assert_eq!(
            Lookup::classify("  brazen, wall! ", &registry),
            Lookup::Query("brazen wall".to_string())
        );
    }
}
