// 🐮 Birth reports
//
// Formats (one per line, any order):
//   "88888 m nelore"          newborn with its own tag
//   "bezerro 12345 f angus"   calf not tagged yet, identified by its dam
//   "15/3"                    date of the batch
//   "espirito santo"          area, known or (last line only) new

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::area::{Area, AreaResolver};
use crate::breed::BreedMatcher;
use crate::date::parse_as_date_line;
use crate::db::{self, NewBirth};
use crate::sanitize::{parse_positive, sanitize_line, tokens};

use super::{lines, BaseContext, Language, Parser, Sex};

/// Keywords that start a calf line (English and Portuguese)
pub const CALF_KEYWORDS: [&str; 4] = ["calf", "bezerro", "bezerra", "bez"];

/// How a newborn is identified: its own ear tag, or its dam's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimalId {
    Tag(i64),
    Dam(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthEntry {
    pub id: AnimalId,
    pub sex: Sex,
    /// Canonical breed name
    pub breed: String,
}

impl BirthEntry {
    /// Ear tag, 0 for calves
    pub fn tag(&self) -> i64 {
        match self.id {
            AnimalId::Tag(tag) => tag,
            AnimalId::Dam(_) => 0,
        }
    }

    /// Dam's tag, 0 for tagged births
    pub fn dam(&self) -> i64 {
        match self.id {
            AnimalId::Tag(_) => 0,
            AnimalId::Dam(dam) => dam,
        }
    }

    pub fn is_calf(&self) -> bool {
        matches!(self.id, AnimalId::Dam(_))
    }
}

/// One birth report being parsed, borrowing the account's reference data
pub struct BirthMessage<'a> {
    breeds: &'a BreedMatcher,
    areas: Option<&'a dyn AreaResolver>,
    pub date: Option<String>,
    pub entries: Vec<BirthEntry>,
    pub area: Option<Area>,
    pub new_area_found: bool,
    pub total: usize,
}

impl<'a> BirthMessage<'a> {
    pub fn new(breeds: &'a BreedMatcher, areas: Option<&'a dyn AreaResolver>) -> Self {
        BirthMessage {
            breeds,
            areas,
            date: None,
            entries: Vec::new(),
            area: None,
            new_area_found: false,
            total: 0,
        }
    }

    /// Area name of the batch ("unknown" until a parse succeeds)
    pub fn area_name(&self) -> &str {
        self.area
            .as_ref()
            .map(|a| a.name.as_str())
            .unwrap_or(crate::area::UNKNOWN_AREA)
    }

    /// `<tag> <sex> <breed>`
    pub fn parse_birth_line(&self, line: &str) -> Option<BirthEntry> {
        let line = sanitize_line(line);
        let fields = tokens(&line);
        if fields.len() < 3 {
            return None;
        }

        let tag = parse_positive(fields[0])?;
        let sex = Sex::from_token(fields[1])?;
        let breed = self.breeds.match_breed(fields[2])?;

        Some(BirthEntry {
            id: AnimalId::Tag(tag),
            sex,
            breed: breed.to_string(),
        })
    }

    /// `<calf keyword> <dam> <sex> <breed>`
    pub fn parse_calf_line(&self, line: &str) -> Option<BirthEntry> {
        let line = sanitize_line(line);
        let fields = tokens(&line);
        if fields.len() < 4 || !CALF_KEYWORDS.contains(&fields[0]) {
            return None;
        }

        let dam = parse_positive(fields[1])?;
        let sex = Sex::from_token(fields[2])?;
        let breed = self.breeds.match_breed(fields[3])?;

        Some(BirthEntry {
            id: AnimalId::Dam(dam),
            sex,
            breed: breed.to_string(),
        })
    }

    fn reset(&mut self) {
        self.date = None;
        self.entries.clear();
        self.area = None;
        self.new_area_found = false;
        self.total = 0;
    }

    fn insert(&self, conn: &Connection, ctx: &BaseContext, tag: i64, dam: i64, entry: &BirthEntry) -> rusqlite::Result<()> {
        db::insert_birth(
            conn,
            ctx,
            &NewBirth {
                tag,
                dam,
                sex: entry.sex.as_str(),
                breed: &entry.breed,
                area: self.area_name(),
                date: self.date.as_deref(),
            },
        )
    }
}

impl Parser for BirthMessage<'_> {
    fn collection(&self) -> &'static str {
        "birth"
    }

    fn parse(&mut self, message: &str) -> bool {
        self.reset();

        let lines = lines(message);
        let mut consumed = vec![false; lines.len()];

        for (index, line) in lines.iter().enumerate() {
            if let Some(date) = parse_as_date_line(line) {
                self.date = Some(date);
                consumed[index] = true;
            }

            if let Some(entry) = self.parse_birth_line(line).or_else(|| self.parse_calf_line(line)) {
                self.entries.push(entry);
                self.total += 1;
                consumed[index] = true;
            }

            if let Some(areas) = self.areas {
                if let Some(name) = areas.match_area_line(line) {
                    self.area = Some(Area::new(&name));
                    consumed[index] = true;
                }
            }
        }

        let found = !self.entries.is_empty();

        // An unclaimed last line after births is taken as a new area
        if found && self.area.is_none() {
            let last = lines.len() - 1;
            let candidate = sanitize_line(lines[last]);
            if !consumed[last] && !candidate.is_empty() {
                info!(area = %candidate, "New area found");
                self.area = Some(Area::new(&candidate));
                self.new_area_found = true;
            }
        }

        if found && self.area.is_none() {
            self.area = Some(Area::unknown());
        }

        found
    }

    fn reply(&self, lang: &str) -> String {
        match Language::from_tag(lang) {
            Language::EnUs => format!(
                "Zap Manejo has detected birth data. We added {} births to area {}.",
                self.total,
                self.area_name()
            ),
            Language::PtBr => format!(
                "Zap Manejo detectou dados de nascimento. Adicionamos {} nascimentos à área {}.",
                self.total,
                self.area_name()
            ),
        }
    }

    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()> {
        for entry in &self.entries {
            match self.insert(conn, ctx, entry.tag(), entry.dam(), entry) {
                Ok(()) => {}
                Err(e) if db::is_duplicate_key(&e) && entry.tag() > 0 => {
                    info!(
                        tag = entry.tag(),
                        "Duplicate tag found, converting to calf entry with dam={}",
                        entry.tag()
                    );
                    self.insert(conn, ctx, 0, entry.tag(), entry)
                        .with_context(|| format!("Failed to insert calf of dam {}", entry.tag()))?;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to insert birth {:?}", entry.id));
                }
            }
        }

        if self.new_area_found {
            match self.areas {
                Some(areas) => {
                    let name = self.area_name();
                    if let Err(e) = areas.register_new_area(&ctx.account, name, name) {
                        warn!(account = %ctx.account, area = name, "Could not add new area: {:#}", e);
                    }
                }
                None => debug!("no area resolver, new area not registered"),
            }
        }

        Ok(())
    }
}
