// 📞 Account lookup by the sender's phone number

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db;

/// Team (account member) registered for a phone number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub account: String,
    /// Phone number as stored, used as the canonical reply address
    pub phone_number: String,
    pub name: String,
    /// Preferred reply language tag ("en-US", "pt-BR")
    pub language: String,
}

/// Formatted variants of a raw digit string, raw string first.
///
/// Stored numbers may be hyphenated in the North American (11 digit) or
/// Brazilian (13 digit) layout. Brazilian numbers still arriving with 12
/// digits are missing the mobile '9' after the area code.
pub fn phone_number_variants(phone_number: &str) -> Vec<String> {
    let mut variants = vec![phone_number.to_string()];

    if !phone_number.chars().all(|c| c.is_ascii_digit()) {
        return variants;
    }

    let p = phone_number;
    match p.len() {
        // 16166100305 -> 1-616-610-0305
        11 => variants.push(format!("{}-{}-{}-{}", &p[0..1], &p[1..4], &p[4..7], &p[7..11])),
        // 5512123451234 -> 55-12-12345-1234
        13 => variants.push(format!("{}-{}-{}-{}", &p[0..2], &p[2..4], &p[4..9], &p[9..13])),
        // 551223451234 -> 55-12-92345-1234
        12 if p.starts_with("55") => {
            variants.push(format!("{}-{}-9{}-{}", &p[0..2], &p[2..4], &p[4..8], &p[8..12]))
        }
        _ => {}
    }

    variants
}

/// Team registered under any variant of `phone_number`
pub fn find_account_by_phone_number(conn: &Connection, phone_number: &str) -> Result<Team> {
    let variants = phone_number_variants(phone_number);
    debug!(phone_number, ?variants, "looking up account");

    db::find_team(conn, &variants)?
        .ok_or_else(|| anyhow!("No account registered for phone number {}", phone_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_variant() {
        assert_eq!(
            phone_number_variants("16166100305"),
            vec!["16166100305", "1-616-610-0305"]
        );
    }

    #[test]
    fn test_brazil_mobile_variant() {
        assert_eq!(
            phone_number_variants("5512123451234"),
            vec!["5512123451234", "55-12-12345-1234"]
        );
    }

    #[test]
    fn test_brazil_missing_nine() {
        assert_eq!(
            phone_number_variants("551223451234"),
            vec!["551223451234", "55-12-92345-1234"]
        );
    }

    #[test]
    fn test_twelve_digits_other_country() {
        assert_eq!(phone_number_variants("441223451234"), vec!["441223451234"]);
    }

    #[test]
    fn test_non_digit_input_is_left_alone() {
        assert_eq!(phone_number_variants("55-12-12345-1234"), vec!["55-12-12345-1234"]);
        assert_eq!(phone_number_variants(""), vec![""]);
    }

    #[test]
    fn test_find_account_through_variant() {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        db::insert_team(
            &conn,
            &Team {
                account: "acc1".to_string(),
                phone_number: "55-12-92345-1234".to_string(),
                name: "Fazenda Boa Vista".to_string(),
                language: "pt-BR".to_string(),
            },
        )
        .unwrap();

        let team = find_account_by_phone_number(&conn, "551223451234").unwrap();
        assert_eq!(team.account, "acc1");
        assert_eq!(team.phone_number, "55-12-92345-1234");

        assert!(find_account_by_phone_number(&conn, "16166100305").is_err());
    }
}
