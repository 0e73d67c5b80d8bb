// 📅 Dates typed in chat ("15/3", "15/03/2025") mapped onto UTC

use chrono::{Datelike, NaiveDate, SecondsFormat, TimeZone, Utc};

use crate::sanitize::{parse_day_month, sanitize_line};

/// Map a month/day onto the current UTC year, RFC 3339 at midnight.
/// Returns None for dates that do not exist (31/2, 0/5, ...).
pub fn month_day_to_utc(month: u32, day: u32) -> Option<String> {
    ymd_to_utc(Utc::now().year(), month, day)
}

fn ymd_to_utc(year: i32, month: u32, day: u32) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(
        Utc.from_utc_datetime(&midnight)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Recognize a line holding nothing but a date: `d/m`, `d/m/yy` or `d/m/yyyy`
pub fn parse_as_date_line(line: &str) -> Option<String> {
    let line = sanitize_line(line);
    if line.is_empty() || line.contains(' ') {
        return None;
    }

    let parts: Vec<&str> = line.split('/').collect();
    match parts.as_slice() {
        [_, _] => {
            let (day, month) = parse_day_month(&line)?;
            month_day_to_utc(month, day)
        }
        [day, month, year] => {
            let day: u32 = day.parse().ok()?;
            let month: u32 = month.parse().ok()?;
            let year: i32 = match year.len() {
                2 => 2000 + year.parse::<i32>().ok()?,
                4 => year.parse().ok()?,
                _ => return None,
            };
            ymd_to_utc(year, month, day)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_day_to_utc_current_year() {
        let year = Utc::now().year();
        assert_eq!(
            month_day_to_utc(3, 15),
            Some(format!("{}-03-15T00:00:00Z", year))
        );
    }

    #[test]
    fn test_month_day_to_utc_rejects_impossible_dates() {
        assert_eq!(month_day_to_utc(2, 31), None);
        assert_eq!(month_day_to_utc(13, 1), None);
        assert_eq!(month_day_to_utc(5, 0), None);
    }

    #[test]
    fn test_parse_as_date_line() {
        let year = Utc::now().year();
        assert_eq!(
            parse_as_date_line(" 15/3 "),
            Some(format!("{}-03-15T00:00:00Z", year))
        );
        assert_eq!(
            parse_as_date_line("01/02/2024"),
            Some("2024-02-01T00:00:00Z".to_string())
        );
        assert_eq!(
            parse_as_date_line("1/2/24"),
            Some("2024-02-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_parse_as_date_line_rejects_other_lines() {
        assert_eq!(parse_as_date_line("15/3 20mm"), None);
        assert_eq!(parse_as_date_line("88888 m angus"), None);
        assert_eq!(parse_as_date_line(""), None);
        assert_eq!(parse_as_date_line("1/2/345"), None);
    }
}
