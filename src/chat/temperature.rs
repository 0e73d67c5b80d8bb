// 🌡️ Temperature: "<day>/<month> <degrees>c" ("15/3 35C", "15/3 35 c", "1/7 -2°c")

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::date::month_day_to_utc;
use crate::db;
use crate::sanitize::{parse_day_month, sanitize_line, tokens};

use super::{lines, BaseContext, Language, Parser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureEntry {
    pub date: String,
    /// Degrees Celsius
    pub temperature: i32,
}

#[derive(Debug, Clone, Default)]
pub struct TemperatureMessage {
    pub entries: Vec<TemperatureEntry>,
}

/// Strip the Celsius marker ("c" or "°c") from the end of a token
fn strip_celsius(token: &str) -> Option<&str> {
    let rest = token.strip_suffix('c')?;
    Some(rest.strip_suffix('°').unwrap_or(rest))
}

impl TemperatureMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_temperature_line(&self, line: &str) -> Option<TemperatureEntry> {
        let line = sanitize_line(line);
        let fields = tokens(&line);

        let degrees = match fields.as_slice() {
            // "35c"
            [_, value] => strip_celsius(*value)?,
            // "35 c"
            [_, value, marker] if strip_celsius(*marker) == Some("") => {
                value.strip_suffix('°').unwrap_or(*value)
            }
            _ => return None,
        };

        let (day, month) = parse_day_month(fields[0])?;
        let temperature: i32 = degrees.parse().ok()?;

        Some(TemperatureEntry {
            date: month_day_to_utc(month, day)?,
            temperature,
        })
    }
}

impl Parser for TemperatureMessage {
    fn collection(&self) -> &'static str {
        "temperature"
    }

    fn parse(&mut self, message: &str) -> bool {
        self.entries = lines(message)
            .into_iter()
            .filter_map(|line| self.parse_temperature_line(line))
            .collect();

        !self.entries.is_empty()
    }

    fn reply(&self, lang: &str) -> String {
        match Language::from_tag(lang) {
            Language::EnUs => format!(
                "Zap Manejo has detected temperature data. We added {} days of temperature data.",
                self.entries.len()
            ),
            Language::PtBr => format!(
                "Zap Manejo detectou dados de temperatura. Adicionamos dados de temperatura dos últimos {} dias.",
                self.entries.len()
            ),
        }
    }

    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()> {
        for temp in &self.entries {
            db::insert_temperature(conn, ctx, &temp.date, temp.temperature)?;
        }
        Ok(())
    }
}
