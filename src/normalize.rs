// 🧹 Field Normalizer - scalar field cleanup for the raw feed
// Pure functions: malformed input degrades to absent/default, never an error.

use chrono::NaiveDate;

/// Sanitize a free-text field:
/// - Replace non-breaking spaces, newlines, and control characters
/// - Normalize smart quotes/dashes to ASCII equivalents
/// - Optionally strip non-ASCII characters entirely
/// - Collapse whitespace, then truncate to `max_len` characters
pub fn sanitize_text(value: &str, ascii_only: bool, max_len: usize) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\r' | '\n' | '\t' => ' ',
            c if c.is_control() => ' ',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c => c,
        })
        .filter(|c| !ascii_only || c.is_ascii())
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_len)
}

/// Keep only digits. An empty result is absent.
pub fn clean_phone(value: &str, max_len: usize) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(truncate_chars(&digits, max_len))
    }
}

/// Parse dates like `MM/DD/YYYY`. A trailing time-of-day suffix
/// ("01/15/2023 12:00:00 AM") is discarded. Invalid or blank input is `None`.
pub fn parse_date_mdy(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    let date_part = v.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, "%m/%d/%Y").ok()
}

/// Trim and parse an integer. Unparsable or blank input is `None`.
pub fn parse_int(value: &str) -> Option<i64> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<i64>().ok()
}

/// Trim a field and return `None` when blank.
pub fn blank_to_none(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

/// Truncate to at most `max_len` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max_len: usize) -> String {
    match value.char_indices().nth(max_len) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_text("  Test \t Diner \n", false, 255), "Test Diner");
        assert_eq!(sanitize_text("A\u{00A0}B", false, 255), "A B");
    }

    #[test]
    fn test_sanitize_smart_punctuation() {
        assert_eq!(sanitize_text("Tony\u{2019}s \u{201C}Best\u{201D}", false, 255), "Tony's \"Best\"");
        assert_eq!(sanitize_text("Deli \u{2014} Grill", false, 255), "Deli - Grill");
    }

    #[test]
    fn test_sanitize_control_chars() {
        assert_eq!(sanitize_text("A\x01B\x7fC", false, 255), "A B C");
    }

    #[test]
    fn test_sanitize_ascii_only() {
        assert_eq!(sanitize_text("Café Olé", true, 255), "Caf Ol");
        assert_eq!(sanitize_text("Café Olé", false, 255), "Café Olé");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        assert_eq!(sanitize_text("ééééé", false, 3), "ééé");
        assert_eq!(sanitize_text("abcdef", false, 4), "abcd");
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("(212) 555-0123", 20), Some("2125550123".to_string()));
        assert_eq!(clean_phone("N/A", 20), None);
        assert_eq!(clean_phone("", 20), None);
        assert_eq!(clean_phone("123456789012345678901234", 20), Some("12345678901234567890".to_string()));
    }

    #[test]
    fn test_parse_date_mdy() {
        assert_eq!(parse_date_mdy("01/15/2023"), NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(parse_date_mdy(" 12/31/2024 "), NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_parse_date_discards_time_suffix() {
        assert_eq!(
            parse_date_mdy("01/15/2023 12:00:00 AM"),
            NaiveDate::from_ymd_opt(2023, 1, 15)
        );
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date_mdy(""), None);
        assert_eq!(parse_date_mdy("2023-01-15"), None);
        assert_eq!(parse_date_mdy("13/45/2023"), None);
        assert_eq!(parse_date_mdy("soon"), None);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 13 "), Some(13));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("13.5"), None);
        assert_eq!(parse_int("N/A"), None);
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none("  "), None);
        assert_eq!(blank_to_none(" A "), Some("A".to_string()));
    }
}
