// ☠️ Death reports: "<tag> <cause>", e.g. "2235 natimorto"
//
// Deaths don't create rows: they mark the cause on the animal's birth row.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::date::parse_as_date_line;
use crate::db;
use crate::sanitize::{parse_positive, sanitize_line, tokens};

use super::{lines, BaseContext, Language, Parser};

/// Death causes understood in chat (Portuguese, as farm workers write them)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// "he died"
    Morreu,
    /// "dead"
    Morto,
    /// "born dead"
    NasceuMorto,
    /// "aborted"
    Aborto,
    /// "stillborn"
    Natimorto,
    /// "stillbirths"
    Natimortos,
}

impl DeathCause {
    pub const ALL: [DeathCause; 6] = [
        DeathCause::Morreu,
        DeathCause::Morto,
        DeathCause::NasceuMorto,
        DeathCause::Aborto,
        DeathCause::Natimorto,
        DeathCause::Natimortos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeathCause::Morreu => "morreu",
            DeathCause::Morto => "morto",
            DeathCause::NasceuMorto => "nasceu morto",
            DeathCause::Aborto => "aborto",
            DeathCause::Natimorto => "natimorto",
            DeathCause::Natimortos => "natimortos",
        }
    }

    /// Case-insensitive lookup of a cause phrase
    pub fn from_phrase(phrase: &str) -> Option<DeathCause> {
        let phrase = phrase.trim().to_lowercase();
        Self::ALL.into_iter().find(|cause| cause.as_str() == phrase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEntry {
    pub tag: i64,
    pub cause: DeathCause,
}

#[derive(Debug, Clone, Default)]
pub struct DeathMessage {
    pub date: Option<String>,
    pub entries: Vec<DeathEntry>,
    pub total: usize,
}

impl DeathMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<tag> <cause>`; the cause is the rest of the line ("nasceu morto"),
    /// or its first word when trailing text follows
    pub fn parse_death_line(&self, line: &str) -> Option<DeathEntry> {
        let line = sanitize_line(line);
        let fields = tokens(&line);
        if fields.len() < 2 {
            return None;
        }

        let tag = parse_positive(fields[0])?;
        let cause = DeathCause::from_phrase(&fields[1..].join(" "))
            .or_else(|| DeathCause::from_phrase(fields[1]))?;

        Some(DeathEntry { tag, cause })
    }
}

impl Parser for DeathMessage {
    fn collection(&self) -> &'static str {
        "death"
    }

    fn parse(&mut self, message: &str) -> bool {
        self.date = None;
        self.entries.clear();
        self.total = 0;

        for line in lines(message) {
            if let Some(date) = parse_as_date_line(line) {
                self.date = Some(date);
            }
            if let Some(entry) = self.parse_death_line(line) {
                self.entries.push(entry);
                self.total += 1;
            }
        }

        !self.entries.is_empty()
    }

    fn reply(&self, lang: &str) -> String {
        match Language::from_tag(lang) {
            Language::EnUs => format!(
                "Zap Manejo has detected death data. We added {} deaths. \
                 To claim your data and see a report sign up at https://dashboard.zapmanejo.com/",
                self.total
            ),
            Language::PtBr => format!(
                "Zap Manejo detectou dados de óbitos. Adicionamos {} óbitos. \
                 Para reivindicar seus dados e visualizar um relatório, \
                 cadastre-se em https://dashboard.zapmanejo.com/",
                self.total
            ),
        }
    }

    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()> {
        for death in &self.entries {
            let updated = db::update_death_cause(conn, &ctx.account, death.tag, death.cause.as_str())?;
            if updated == 0 {
                info!(account = %ctx.account, tag = death.tag, "death reported for unknown tag");
            } else {
                debug!(tag = death.tag, cause = death.cause.as_str(), updated, "death recorded");
            }
        }
        Ok(())
    }
}
