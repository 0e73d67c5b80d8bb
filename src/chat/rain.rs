// 🌧️ Rainfall: "<day>/<month> <amount>mm" ("15/3 20mm" or "15/3 20 mm")

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::date::month_day_to_utc;
use crate::db;
use crate::sanitize::{parse_day_month, sanitize_line, tokens};

use super::{lines, BaseContext, Language, Parser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RainEntry {
    /// RFC 3339, current year
    pub date: String,
    /// Millimeters
    pub amount: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RainMessage {
    pub entries: Vec<RainEntry>,
    /// Sum of millimeters over all entries
    pub total: u64,
}

impl RainMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_rain_line(&self, line: &str) -> Option<RainEntry> {
        // "20mm" and "20 mm" scan the same way
        let line = sanitize_line(line).replacen("mm", " mm", 1);
        let fields = tokens(&line);
        if fields.len() < 3 || fields[2] != "mm" {
            return None;
        }

        let (day, month) = parse_day_month(fields[0])?;
        let amount: u32 = fields[1].parse().ok()?;

        Some(RainEntry {
            date: month_day_to_utc(month, day)?,
            amount,
        })
    }
}

impl Parser for RainMessage {
    fn collection(&self) -> &'static str {
        "rain"
    }

    fn parse(&mut self, message: &str) -> bool {
        self.entries.clear();
        self.total = 0;

        for line in lines(message) {
            if let Some(entry) = self.parse_rain_line(line) {
                self.total += u64::from(entry.amount);
                self.entries.push(entry);
            }
        }

        !self.entries.is_empty()
    }

    fn reply(&self, lang: &str) -> String {
        match Language::from_tag(lang) {
            Language::EnUs => format!(
                "Zap Manejo has detected rainfall data. We added {} mm of rain.",
                self.total
            ),
            Language::PtBr => format!(
                "Zap Manejo detectou dados de precipitação. Adicionamos {} mm de chuva.",
                self.total
            ),
        }
    }

    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()> {
        for rain in &self.entries {
            db::insert_rain(conn, ctx, &rain.date, rain.amount)?;
        }
        Ok(())
    }
}
