// ⛅ Weather conditions: "<day>/<month> <condition>" ("15/3 nublado")

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::date::month_day_to_utc;
use crate::db;
use crate::sanitize::{parse_day_month, sanitize_line, tokens};

use super::{lines, BaseContext, Language, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    Storm,
    Frost,
    Windy,
}

impl WeatherCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Rainy => "rainy",
            WeatherCondition::Storm => "storm",
            WeatherCondition::Frost => "frost",
            WeatherCondition::Windy => "windy",
        }
    }

    /// Portuguese or English word for a condition
    pub fn from_word(word: &str) -> Option<WeatherCondition> {
        match word {
            "sol" | "ensolarado" | "sunny" => Some(WeatherCondition::Sunny),
            "nublado" | "cloudy" => Some(WeatherCondition::Cloudy),
            "chuva" | "chuvoso" | "rainy" => Some(WeatherCondition::Rainy),
            "tempestade" | "storm" => Some(WeatherCondition::Storm),
            "geada" | "frost" => Some(WeatherCondition::Frost),
            "vento" | "ventoso" | "windy" => Some(WeatherCondition::Windy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherEntry {
    pub date: String,
    pub condition: WeatherCondition,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherMessage {
    pub entries: Vec<WeatherEntry>,
}

impl WeatherMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_weather_line(&self, line: &str) -> Option<WeatherEntry> {
        let line = sanitize_line(line);
        let fields = tokens(&line);
        if fields.len() != 2 {
            return None;
        }

        let (day, month) = parse_day_month(fields[0])?;
        let condition = WeatherCondition::from_word(fields[1])?;

        Some(WeatherEntry {
            date: month_day_to_utc(month, day)?,
            condition,
        })
    }
}

impl Parser for WeatherMessage {
    fn collection(&self) -> &'static str {
        "weather"
    }

    fn parse(&mut self, message: &str) -> bool {
        self.entries = lines(message)
            .into_iter()
            .filter_map(|line| self.parse_weather_line(line))
            .collect();

        !self.entries.is_empty()
    }

    fn reply(&self, lang: &str) -> String {
        match Language::from_tag(lang) {
            Language::EnUs => format!(
                "Zap Manejo has detected weather data. We added {} days of weather data.",
                self.entries.len()
            ),
            Language::PtBr => format!(
                "Zap Manejo detectou dados do tempo. Adicionamos dados do tempo de {} dias.",
                self.entries.len()
            ),
        }
    }

    fn persist(&self, conn: &Connection, ctx: &BaseContext) -> Result<()> {
        for weather in &self.entries {
            db::insert_weather(conn, ctx, &weather.date, weather.condition.as_str())?;
        }
        Ok(())
    }
}
