// 🧭 Chat message extractors - one grammar family per record type
//
// A message is offered to each extractor in a fixed priority order and the
// first one that recognizes at least one line claims the whole message.

pub mod birth;
pub mod death;
pub mod dispatch;
pub mod envelope;
pub mod rain;
pub mod temperature;
pub mod weather;

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::area::AreaResolver;
use crate::breed::BreedMatcher;

pub use birth::{AnimalId, BirthEntry, BirthMessage};
pub use death::{DeathCause, DeathEntry, DeathMessage};
pub use dispatch::{process_entries, DispatchOutcome};
pub use envelope::ChatMessage;
pub use rain::{RainEntry, RainMessage};
pub use temperature::{TemperatureEntry, TemperatureMessage};
pub use weather::{WeatherCondition, WeatherEntry, WeatherMessage};

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Per-message fields copied into every record the message produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseContext {
    pub account: String,
    pub phone_number: String,
    pub name: String,
    /// Message time, RFC 3339
    pub date: String,
}

/// Reply language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    EnUs,
    PtBr,
}

impl Language {
    /// Resolve a language tag; anything unsupported replies in Portuguese
    pub fn from_tag(tag: &str) -> Language {
        match tag {
            "en-US" => Language::EnUs,
            "pt-BR" => Language::PtBr,
            other => {
                let fallback = Language::PtBr;
                warn!(lang = other, fallback = fallback.tag(), "Unsupported or unknown language");
                fallback
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::EnUs => "en-US",
            Language::PtBr => "pt-BR",
        }
    }
}

/// Sex of a newborn as typed in chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl Sex {
    /// Only the exact tokens "m" and "f"
    pub fn from_token(token: &str) -> Option<Sex> {
        match token {
            "m" => Some(Sex::Male),
            "f" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "m",
            Sex::Female => "f",
        }
    }
}

// ============================================================================
// EXTRACTOR CONTRACT
// ============================================================================

/// Common contract of every extractor
pub trait Parser {
    /// Routing label of the record family
    fn collection(&self) -> &'static str;

    /// Scan every line; true when at least one entry was produced.
    /// Replaces whatever a previous call collected.
    fn parse(&mut self, message: &str) -> bool;

    /// Localized confirmation for the sender
    fn reply(&self, lang: &str) -> String;

    /// Write every collected entry
    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()>;
}

/// The closed set of record families, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Death,
    Birth,
    Rain,
    Temperature,
    Weather,
}

impl RecordKind {
    /// Death goes first: a death report may also carry birth-shaped lines
    pub const PRIORITY: [RecordKind; 5] = [
        RecordKind::Death,
        RecordKind::Birth,
        RecordKind::Rain,
        RecordKind::Temperature,
        RecordKind::Weather,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Death => "death",
            RecordKind::Birth => "birth",
            RecordKind::Rain => "rain",
            RecordKind::Temperature => "temperature",
            RecordKind::Weather => "weather",
        }
    }
}

/// Reference data loaded for the sending account, borrowed by one dispatch
#[derive(Clone, Copy)]
pub struct References<'a> {
    pub breeds: &'a BreedMatcher,
    pub areas: Option<&'a dyn AreaResolver>,
}

/// Fresh extractor for a record family
pub fn get_parser<'a>(kind: RecordKind, refs: References<'a>) -> Box<dyn Parser + 'a> {
    match kind {
        RecordKind::Death => Box::new(DeathMessage::new()),
        RecordKind::Birth => Box::new(BirthMessage::new(refs.breeds, refs.areas)),
        RecordKind::Rain => Box::new(RainMessage::new()),
        RecordKind::Temperature => Box::new(TemperatureMessage::new()),
        RecordKind::Weather => Box::new(WeatherMessage::new()),
    }
}

/// Run the chain over a message body; the first extractor that parses wins
pub fn classify<'a>(message: &str, refs: References<'a>) -> Option<(RecordKind, Box<dyn Parser + 'a>)> {
    let message = message.trim();
    for kind in RecordKind::PRIORITY {
        let mut parser = get_parser(kind, refs);
        if parser.parse(message) {
            return Some((kind, parser));
        }
    }
    None
}

/// Split a message into its raw lines
pub(crate) fn lines(message: &str) -> Vec<&str> {
    message.split('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Breed;

    fn breeds() -> BreedMatcher {
        BreedMatcher::from_breeds(vec![
            Breed::new("cruzado", "cruzado"),
            Breed::new("nelore", "nelore"),
            Breed::new("angus", "angus"),
        ])
    }

    #[test]
    fn test_language_fallback() {
        assert_eq!(Language::from_tag("en-US"), Language::EnUs);
        assert_eq!(Language::from_tag("pt-BR"), Language::PtBr);
        assert_eq!(Language::from_tag("es-MX"), Language::PtBr);
        assert_eq!(Language::from_tag(""), Language::PtBr);
    }

    #[test]
    fn test_language_tag_round_trips() {
        for lang in [Language::EnUs, Language::PtBr] {
            assert_eq!(Language::from_tag(lang.tag()), lang);
        }
    }

    #[test]
    fn test_sex_tokens() {
        assert_eq!(Sex::from_token("m"), Some(Sex::Male));
        assert_eq!(Sex::from_token("f"), Some(Sex::Female));
        assert_eq!(Sex::from_token("M"), None);
        assert_eq!(Sex::from_token("x"), None);
    }

    #[test]
    fn test_priority_order() {
        let order: Vec<&str> = RecordKind::PRIORITY.iter().map(|k| k.collection()).collect();
        assert_eq!(order, vec!["death", "birth", "rain", "temperature", "weather"]);
    }

    #[test]
    fn test_classify_each_family() {
        let breeds = breeds();
        let refs = References { breeds: &breeds, areas: None };

        let cases = [
            ("2235 natimorto", RecordKind::Death),
            ("88888 m cruzado", RecordKind::Birth),
            ("15/3 20mm", RecordKind::Rain),
            ("15/3 31c", RecordKind::Temperature),
            ("15/3 nublado", RecordKind::Weather),
        ];

        for (message, expected) in cases {
            let (kind, parser) = classify(message, refs).unwrap();
            assert_eq!(kind, expected, "wrong family for {:?}", message);
            assert_eq!(parser.collection(), expected.collection());
        }
    }

    #[test]
    fn test_death_claims_mixed_message() {
        let breeds = breeds();
        let refs = References { breeds: &breeds, areas: None };

        let (kind, _) = classify("2235 morreu\n88888 m cruzado", refs).unwrap();
        assert_eq!(kind, RecordKind::Death);
    }

    #[test]
    fn test_conversation_is_not_claimed() {
        let breeds = breeds();
        let refs = References { breeds: &breeds, areas: None };

        assert!(classify("Bom dia! Tudo bem?", refs).is_none());
        assert!(classify("", refs).is_none());
    }
}
