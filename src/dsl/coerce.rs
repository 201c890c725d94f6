//! Cell value parsing for typed comparisons.
//!
//! Every parser returns `None` on malformed input; the evaluator turns that into a
//! non-match instead of an error.

use time::{Date, Month};

/// Parse a numeric cell. Accepts a decimal comma when the value has no `.`
/// (`"1500,50"`), as the registry writes money amounts that way.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let parsed = match s.parse::<f64>() {
        Ok(n) => n,
        Err(_) if s.contains(',') && !s.contains('.') => s.replace(',', ".").parse().ok()?,
        Err(_) => return None,
    };

    parsed.is_finite().then_some(parsed)
}

/// Parse a `YYYYMMDD` or `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<Date> {
    let s = s.trim();
    let (year, month, day) = match s.len() {
        8 => (s.get(0..4)?, s.get(4..6)?, s.get(6..8)?),
        10 if s.as_bytes()[4] == b'-' && s.as_bytes()[7] == b'-' => {
            (s.get(0..4)?, s.get(5..7)?, s.get(8..10)?)
        }
        _ => return None,
    };

    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !(digits(year) && digits(month) && digits(day)) {
        return None;
    }

    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok()
}

/// Parse a boolean cell in one of the accepted encodings.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "sim" | "s" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "nao" | "não" => Some(false),
        _ => None,
    }
}

/// Case-insensitive equality, with an allocation-free path for ASCII.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}
