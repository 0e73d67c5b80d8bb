// 🐄 Breed Matcher - raw chat token → canonical breed name
//
// Every account configures its own breeds ("nelore" with synonyms
// "nel, nelori"), merged with the global breed list. Loaded per request.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db;
use crate::sanitize::split_and_trim;

/// Breed row: canonical name plus comma-separated synonyms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breed {
    pub name: String,
    pub matches: String,
}

impl Breed {
    pub fn new(name: &str, matches: &str) -> Self {
        Breed {
            name: name.to_string(),
            matches: matches.to_string(),
        }
    }

    /// Synonyms, lower-cased
    pub fn synonyms(&self) -> Vec<String> {
        split_and_trim(&self.matches.to_lowercase())
    }

    /// Case-insensitive exact match against the name or any synonym
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        self.name.trim().to_lowercase() == text || self.synonyms().iter().any(|s| *s == text)
    }
}

/// Read-only breed lookup for one account
#[derive(Debug, Clone, Default)]
pub struct BreedMatcher {
    breeds: Vec<Breed>,
}

impl BreedMatcher {
    pub fn new() -> Self {
        BreedMatcher { breeds: Vec::new() }
    }

    /// Create a matcher from breeds already in memory
    pub fn from_breeds(breeds: Vec<Breed>) -> Self {
        BreedMatcher { breeds }
    }

    /// Load the account's breeds plus the global ones
    pub fn load(conn: &Connection, account: &str) -> Result<Self> {
        let breeds = db::load_breeds(conn, account)?;
        debug!(account, count = breeds.len(), "breeds loaded");
        Ok(BreedMatcher { breeds })
    }

    /// Canonical name for a raw token, if any breed claims it
    pub fn match_breed(&self, text: &str) -> Option<&str> {
        let found = self.breeds.iter().find(|b| b.matches(text))?;
        debug!(breed = %found.name, text, "breed matched");
        Some(found.name.as_str())
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.match_breed(name).is_some()
    }

    /// Canonical names in load order (duplicates kept)
    pub fn names(&self) -> Vec<String> {
        self.breeds.iter().map(|b| b.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }
}
