// 🧹 Line Sanitizer - normalize one line of chat text before scanning
//
// Farm workers type on phones: trailing dots, bullets, double spaces and
// random capitals are the norm. Every grammar scans the sanitized form.

/// Characters dropped from either end of a line
const BOUNDARY_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '-', '*', '•', '"', '\'', '`', '_', '(', ')', '[', ']',
];

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || BOUNDARY_PUNCTUATION.contains(&c)
}

/// A leading '-' directly followed by a digit is a sign, not a bullet
fn starts_with_sign(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn trim_leading(raw: &str) -> &str {
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if !is_boundary(c) || starts_with_sign(rest) {
            break;
        }
        rest = &rest[c.len_utf8()..];
    }
    rest
}

/// Normalize a raw line: trim whitespace and boundary punctuation,
/// fold to lower case, collapse inner whitespace runs to one space.
///
/// Idempotent: `sanitize_line(&sanitize_line(x)) == sanitize_line(x)`.
pub fn sanitize_line(raw: &str) -> String {
    let trimmed = trim_leading(raw).trim_end_matches(is_boundary);

    trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a delimiter-separated list ("a, b ,c") into trimmed, non-empty tokens
pub fn split_and_trim(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Whitespace tokens of an already sanitized line
pub fn tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Parse a strictly positive integer field (tags, dams)
pub fn parse_positive(token: &str) -> Option<i64> {
    token.parse::<i64>().ok().filter(|n| *n > 0)
}

/// Parse a `day/month` field into its two numbers
pub fn parse_day_month(token: &str) -> Option<(u32, u32)> {
    let (day, month) = token.split_once('/')?;
    Some((day.parse().ok()?, month.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_trims_and_lowercases() {
        assert_eq!(sanitize_line("  88888 M Cruzado  "), "88888 m cruzado");
        assert_eq!(sanitize_line("Jupiter"), "jupiter");
        assert_eq!(sanitize_line("- 1234   f  Angus."), "1234 f angus");
    }

    #[test]
    fn test_sanitize_keeps_leading_sign() {
        assert_eq!(sanitize_line("- 5 m angus"), "5 m angus");
        assert_eq!(sanitize_line("-5 m angus"), "-5 m angus");
        assert_eq!(sanitize_line("  * -5 m angus"), "-5 m angus");
        assert_eq!(sanitize_line("--x"), "x");
        assert_eq!(sanitize_line("-"), "");
    }

    #[test]
    fn test_sanitize_keeps_inner_punctuation() {
        assert_eq!(sanitize_line("99 m Sta.Zelia"), "99 m sta.zelia");
        assert_eq!(sanitize_line("15/3 -4c"), "15/3 -4c");
    }

    #[test]
    fn test_sanitize_empty_and_noise() {
        assert_eq!(sanitize_line(""), "");
        assert_eq!(sanitize_line("   "), "");
        assert_eq!(sanitize_line(" ... !! "), "");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "",
            "  88888 M Cruzado  ",
            "*. bezerro 12 F nelore ;",
            "\t15/3   20 MM.",
            " ' quoted area ' ",
            "ÁREA Espírito Santo!",
            "-5 m angus",
            "- -5 m angus.",
        ];

        for sample in samples {
            let once = sanitize_line(sample);
            assert_eq!(sanitize_line(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_split_and_trim() {
        assert_eq!(split_and_trim("cruzado, cruzada ,x"), vec!["cruzado", "cruzada", "x"]);
        assert!(split_and_trim(" , ").is_empty());
    }

    #[test]
    fn test_field_parsers() {
        assert_eq!(parse_positive("12"), Some(12));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-3"), None);
        assert_eq!(parse_positive("abc"), None);
        assert_eq!(parse_day_month("15/3"), Some((15, 3)));
        assert_eq!(parse_day_month("15-3"), None);
        assert_eq!(parse_day_month("x/3"), None);
    }
}
