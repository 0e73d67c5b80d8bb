use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use serde::{Deserialize, Serialize};

use crate::account::Team;
use crate::area::Area;
use crate::breed::Breed;
use crate::chat::BaseContext;

/// Account id whose breeds and areas are shared by every account
pub const GLOBAL_ACCOUNT: &str = "000000000000000000000000";

// ============================================================================
// RECORDS (one row per parsed entry)
// ============================================================================

/// Birth row as stored in `births`. Calves carry tag 0 and the dam's tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthRecord {
    pub entry_id: String,
    pub account: String,
    pub phone: String,
    pub name: String,
    pub date: String,
    pub tag: i64,
    pub dam: i64,
    pub sex: String,
    pub breed: String,
    pub area: String,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainRecord {
    pub entry_id: String,
    pub account: String,
    pub phone: String,
    pub name: String,
    pub date: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    pub entry_id: String,
    pub account: String,
    pub phone: String,
    pub name: String,
    pub date: String,
    pub temperature: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub entry_id: String,
    pub account: String,
    pub phone: String,
    pub name: String,
    pub date: String,
    pub condition: String,
}

/// Fields of a birth row that come from the message itself
#[derive(Debug, Clone, Copy)]
pub struct NewBirth<'a> {
    pub tag: i64,
    pub dam: i64,
    pub sex: &'a str,
    pub breed: &'a str,
    pub area: &'a str,
    /// Date line from the message, overrides the context date
    pub date: Option<&'a str>,
}

fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS births (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            account TEXT NOT NULL,
            phone TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            tag INTEGER NOT NULL DEFAULT 0,
            dam INTEGER NOT NULL DEFAULT 0,
            sex TEXT NOT NULL,
            breed TEXT NOT NULL,
            area TEXT NOT NULL,
            cause TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Tags are unique per account; calves (tag 0) are keyed by dam only
        CREATE UNIQUE INDEX IF NOT EXISTS idx_births_account_tag
            ON births(account, tag) WHERE tag > 0;

        CREATE TABLE IF NOT EXISTS rain (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            account TEXT NOT NULL,
            phone TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS temperature (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            account TEXT NOT NULL,
            phone TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            temperature INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS weather (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            account TEXT NOT NULL,
            phone TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            condition TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            phone TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            raw_message TEXT NOT NULL,
            message_type TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS breeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            name TEXT NOT NULL,
            matches TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS areas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            name TEXT NOT NULL,
            label TEXT NOT NULL,
            matches TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            lang TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_births_account ON births(account);
        CREATE INDEX IF NOT EXISTS idx_breeds_account ON breeds(account);
        CREATE INDEX IF NOT EXISTS idx_areas_account ON areas(account);
        CREATE INDEX IF NOT EXISTS idx_teams_phone ON teams(phone_number);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

/// True when an insert was rejected by a UNIQUE index (the births tag index)
pub fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert one birth. Returns the raw rusqlite error so the caller can
/// branch on duplicate tags.
pub fn insert_birth(conn: &Connection, ctx: &BaseContext, birth: &NewBirth) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO births (entry_id, account, phone, name, date, tag, dam, sex, breed, area)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            new_entry_id(),
            ctx.account,
            ctx.phone_number,
            ctx.name,
            birth.date.unwrap_or(&ctx.date),
            birth.tag,
            birth.dam,
            birth.sex,
            birth.breed,
            birth.area,
        ],
    )?;
    Ok(())
}

/// Set the death cause on the animal with this tag. Returns rows touched;
/// an unknown tag touches none and is not an error.
pub fn update_death_cause(conn: &Connection, account: &str, tag: i64, cause: &str) -> Result<usize> {
    let updated = conn
        .execute(
            "UPDATE births SET cause = ?1 WHERE tag = ?2 AND account = ?3",
            params![cause, tag, account],
        )
        .with_context(|| format!("Failed to update death cause for tag {}", tag))?;
    Ok(updated)
}

pub fn insert_rain(conn: &Connection, ctx: &BaseContext, date: &str, amount: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO rain (entry_id, account, phone, name, date, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![new_entry_id(), ctx.account, ctx.phone_number, ctx.name, date, amount],
    )
    .context("Failed to insert rain entry")?;
    Ok(())
}

pub fn insert_temperature(conn: &Connection, ctx: &BaseContext, date: &str, temperature: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO temperature (entry_id, account, phone, name, date, temperature)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![new_entry_id(), ctx.account, ctx.phone_number, ctx.name, date, temperature],
    )
    .context("Failed to insert temperature entry")?;
    Ok(())
}

pub fn insert_weather(conn: &Connection, ctx: &BaseContext, date: &str, condition: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO weather (entry_id, account, phone, name, date, condition)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![new_entry_id(), ctx.account, ctx.phone_number, ctx.name, date, condition],
    )
    .context("Failed to insert weather entry")?;
    Ok(())
}

/// Keep the raw text of every message that produced records
pub fn insert_parsed_message(
    conn: &Connection,
    ctx: &BaseContext,
    raw_message: &str,
    message_type: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (account, phone, name, date, raw_message, message_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![ctx.account, ctx.phone_number, ctx.name, ctx.date, raw_message, message_type],
    )
    .context("Failed to save parsed message")?;
    Ok(())
}

pub fn insert_breed(conn: &Connection, account: &str, name: &str, matches: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO breeds (account, name, matches) VALUES (?1, ?2, ?3)",
        params![account, name, matches],
    )
    .with_context(|| format!("Failed to insert breed {}", name))?;
    Ok(())
}

pub fn insert_area(conn: &Connection, account: &str, name: &str, label: &str, matches: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO areas (account, name, label, matches) VALUES (?1, ?2, ?3, ?4)",
        params![account, name, label, matches],
    )
    .with_context(|| format!("Failed to insert area {}", name))?;
    Ok(())
}

pub fn insert_team(conn: &Connection, team: &Team) -> Result<()> {
    conn.execute(
        "INSERT INTO teams (account, phone_number, name, lang) VALUES (?1, ?2, ?3, ?4)",
        params![team.account, team.phone_number, team.name, team.language],
    )
    .with_context(|| format!("Failed to insert team {}", team.phone_number))?;
    Ok(())
}

// ============================================================================
// READS
// ============================================================================

/// Breeds of an account plus the global ones
pub fn load_breeds(conn: &Connection, account: &str) -> Result<Vec<Breed>> {
    let mut stmt = conn.prepare(
        "SELECT name, matches FROM breeds WHERE account IN (?1, ?2) ORDER BY id",
    )?;

    let breeds = stmt
        .query_map(params![account, GLOBAL_ACCOUNT], |row| {
            Ok(Breed {
                name: row.get(0)?,
                matches: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read breeds for account {}", account))?;

    Ok(breeds)
}

/// Areas of an account plus the global ones
pub fn load_areas(conn: &Connection, account: &str) -> Result<Vec<Area>> {
    let mut stmt = conn.prepare(
        "SELECT name, label, matches FROM areas WHERE account IN (?1, ?2) ORDER BY id",
    )?;

    let areas = stmt
        .query_map(params![account, GLOBAL_ACCOUNT], |row| {
            Ok(Area {
                name: row.get(0)?,
                label: row.get(1)?,
                matches: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read areas for account {}", account))?;

    Ok(areas)
}

/// First team whose stored phone number is one of `phone_numbers`
pub fn find_team(conn: &Connection, phone_numbers: &[String]) -> Result<Option<Team>> {
    if phone_numbers.is_empty() {
        return Ok(None);
    }

    let placeholders = (1..=phone_numbers.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT account, phone_number, name, lang FROM teams
         WHERE phone_number IN ({}) ORDER BY id LIMIT 1",
        placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params_from_iter(phone_numbers.iter()), |row| {
        Ok(Team {
            account: row.get(0)?,
            phone_number: row.get(1)?,
            name: row.get(2)?,
            language: row.get(3)?,
        })
    })?;

    let team = rows.next().transpose().context("Failed to read team")?;
    Ok(team)
}

pub fn get_births(conn: &Connection, account: &str) -> Result<Vec<BirthRecord>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, account, phone, name, date, tag, dam, sex, breed, area, cause
         FROM births WHERE account = ?1 ORDER BY id",
    )?;

    let births = stmt
        .query_map([account], |row| {
            Ok(BirthRecord {
                entry_id: row.get(0)?,
                account: row.get(1)?,
                phone: row.get(2)?,
                name: row.get(3)?,
                date: row.get(4)?,
                tag: row.get(5)?,
                dam: row.get(6)?,
                sex: row.get(7)?,
                breed: row.get(8)?,
                area: row.get(9)?,
                cause: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(births)
}

pub fn get_rain(conn: &Connection, account: &str) -> Result<Vec<RainRecord>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, account, phone, name, date, amount
         FROM rain WHERE account = ?1 ORDER BY id",
    )?;

    let rain = stmt
        .query_map([account], |row| {
            Ok(RainRecord {
                entry_id: row.get(0)?,
                account: row.get(1)?,
                phone: row.get(2)?,
                name: row.get(3)?,
                date: row.get(4)?,
                amount: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rain)
}

pub fn get_temperatures(conn: &Connection, account: &str) -> Result<Vec<TemperatureRecord>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, account, phone, name, date, temperature
         FROM temperature WHERE account = ?1 ORDER BY id",
    )?;

    let temps = stmt
        .query_map([account], |row| {
            Ok(TemperatureRecord {
                entry_id: row.get(0)?,
                account: row.get(1)?,
                phone: row.get(2)?,
                name: row.get(3)?,
                date: row.get(4)?,
                temperature: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(temps)
}

pub fn get_weather(conn: &Connection, account: &str) -> Result<Vec<WeatherRecord>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, account, phone, name, date, condition
         FROM weather WHERE account = ?1 ORDER BY id",
    )?;

    let weather = stmt
        .query_map([account], |row| {
            Ok(WeatherRecord {
                entry_id: row.get(0)?,
                account: row.get(1)?,
                phone: row.get(2)?,
                name: row.get(3)?,
                date: row.get(4)?,
                condition: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(weather)
}

/// Row count of one of the known tables
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let table = match table {
        "births" | "rain" | "temperature" | "weather" | "messages" | "breeds" | "areas" | "teams" => table,
        other => anyhow::bail!("Unknown table: {}", other),
    };

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context(account: &str) -> BaseContext {
        BaseContext {
            account: account.to_string(),
            phone_number: "55-11-98765-4321".to_string(),
            name: "Fazenda Teste".to_string(),
            date: "2025-03-15T10:00:00Z".to_string(),
        }
    }

    fn birth<'a>(tag: i64, dam: i64) -> NewBirth<'a> {
        NewBirth {
            tag,
            dam,
            sex: "m",
            breed: "angus",
            area: "norte",
            date: None,
        }
    }

    #[test]
    fn test_duplicate_tag_is_detected() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let ctx = test_context("acc1");

        insert_birth(&conn, &ctx, &birth(100, 0)).unwrap();
        let err = insert_birth(&conn, &ctx, &birth(100, 0)).unwrap_err();

        assert!(is_duplicate_key(&err));
    }

    #[test]
    fn test_same_tag_in_other_account_is_allowed() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_birth(&conn, &test_context("acc1"), &birth(100, 0)).unwrap();
        insert_birth(&conn, &test_context("acc2"), &birth(100, 0)).unwrap();

        assert_eq!(count_rows(&conn, "births").unwrap(), 2);
    }

    #[test]
    fn test_calves_never_collide() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let ctx = test_context("acc1");

        insert_birth(&conn, &ctx, &birth(0, 100)).unwrap();
        insert_birth(&conn, &ctx, &birth(0, 100)).unwrap();
        insert_birth(&conn, &ctx, &birth(0, 200)).unwrap();

        assert_eq!(get_births(&conn, "acc1").unwrap().len(), 3);
    }

    #[test]
    fn test_message_date_overrides_context_date() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let ctx = test_context("acc1");

        let mut dated = birth(7, 0);
        dated.date = Some("2025-01-02T00:00:00Z");
        insert_birth(&conn, &ctx, &dated).unwrap();
        insert_birth(&conn, &ctx, &birth(8, 0)).unwrap();

        let births = get_births(&conn, "acc1").unwrap();
        assert_eq!(births[0].date, "2025-01-02T00:00:00Z");
        assert_eq!(births[1].date, ctx.date);
        assert_eq!(births[1].phone, ctx.phone_number);
    }

    #[test]
    fn test_death_update_on_unknown_tag_touches_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let updated = update_death_cause(&conn, "acc1", 4242, "morreu").unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn test_load_breeds_merges_global() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_breed(&conn, GLOBAL_ACCOUNT, "nelore", "nelore, nel").unwrap();
        insert_breed(&conn, "acc1", "angus", "angus").unwrap();
        insert_breed(&conn, "acc2", "murrah", "murrah").unwrap();

        let names: Vec<String> = load_breeds(&conn, "acc1")
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["nelore", "angus"]);
    }

    #[test]
    fn test_find_team_by_any_variant() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_team(
            &conn,
            &Team {
                account: "acc1".to_string(),
                phone_number: "55-12-12345-1234".to_string(),
                name: "Fazenda Boa Vista".to_string(),
                language: "pt-BR".to_string(),
            },
        )
        .unwrap();

        let found = find_team(
            &conn,
            &["5512123451234".to_string(), "55-12-12345-1234".to_string()],
        )
        .unwrap();
        assert_eq!(found.map(|t| t.account), Some("acc1".to_string()));

        assert!(find_team(&conn, &["999".to_string()]).unwrap().is_none());
        assert!(find_team(&conn, &[]).unwrap().is_none());
    }

    #[test]
    fn test_count_rows_rejects_unknown_table() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        assert!(count_rows(&conn, "users; DROP TABLE births").is_err());
    }
}
