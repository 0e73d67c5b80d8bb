// 🗺️ Farm areas (pastures, paddocks) named in birth reports

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db;
use crate::sanitize::{sanitize_line, split_and_trim};

/// Area name given to births whose message names no area
pub const UNKNOWN_AREA: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    pub label: String,
    /// Comma-separated alternative spellings
    pub matches: String,
}

impl Area {
    pub fn new(name: &str) -> Self {
        Area {
            name: name.to_string(),
            label: name.to_string(),
            matches: String::new(),
        }
    }

    pub fn unknown() -> Self {
        Area::new(UNKNOWN_AREA)
    }

    /// `line` must already be sanitized
    fn matches_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        sanitize_line(&self.name) == line
            || sanitize_line(&self.label) == line
            || split_and_trim(&self.matches)
                .iter()
                .any(|m| sanitize_line(m) == line)
    }
}

/// Area lookup and registration for one account
pub trait AreaResolver {
    /// Area name if the whole line names a known area
    fn match_area_line(&self, line: &str) -> Option<String>;

    /// Record an area first seen in a message
    fn register_new_area(&self, account: &str, name: &str, label: &str) -> Result<()>;
}

/// SQLite-backed resolver over the `areas` table
pub struct AreaParser<'c> {
    conn: &'c Connection,
    areas: Vec<Area>,
}

impl<'c> AreaParser<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        AreaParser {
            conn,
            areas: Vec::new(),
        }
    }

    /// Replace loaded areas with the account's plus the global ones
    pub fn load_by_account(&mut self, account: &str) -> Result<()> {
        self.areas = db::load_areas(self.conn, account)?;
        debug!(account, count = self.areas.len(), "areas loaded");
        Ok(())
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }
}

impl AreaResolver for AreaParser<'_> {
    fn match_area_line(&self, line: &str) -> Option<String> {
        let line = sanitize_line(line);
        self.areas
            .iter()
            .find(|area| area.matches_line(&line))
            .map(|area| area.name.clone())
    }

    fn register_new_area(&self, account: &str, name: &str, label: &str) -> Result<()> {
        db::insert_area(self.conn, account, name, label, name)?;
        info!(account, area = name, "new area registered");
        Ok(())
    }
}
