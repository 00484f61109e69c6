//! Text and typed-cell conversion shared by inference and row conversion.
//!
//! The same routine decides both "can this column be an Integer?" during inference and
//! "what Integer is this cell?" during iteration, so the two never disagree.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{ColumnType, RawCell, Value};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %H:%M",
];

// Four-digit-year formats come first; a two-digit year that slips through %Y is rejected
// below so the matching %y format can pick it up.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%b/%Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%d/%b/%y",
    "%d-%b-%y",
    "%d %B %y",
];

const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S",
    "%H:%M",
    "%H:%M:%S%.f",
    "%I:%M %p",
    "%I:%M:%S %p",
];

/// Parse a date or date-time string into a [`NaiveDateTime`] (midnight for plain dates).
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Bare numbers are never dates, even when a format would accept them.
    if s.is_empty() || s.parse::<f64>().is_ok() {
        return None;
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if plausible_year(fmt, dt.year()) {
                return Some(dt);
            }
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if plausible_year(fmt, d.year()) {
                return Some(d.and_time(NaiveTime::MIN));
            }
        }
    }
    None
}

fn plausible_year(fmt: &str, year: i32) -> bool {
    !fmt.contains("%Y") || year >= 1000
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_double(s: &str) -> Option<f64> {
    let s = s.trim();
    // Reject "inf", "NaN" and friends that `f64::from_str` accepts.
    let has_digit = s.bytes().any(|b| b.is_ascii_digit());
    let letters_ok = s
        .bytes()
        .all(|b| !b.is_ascii_alphabetic() || b == b'e' || b == b'E');
    if !has_digit || !letters_ok {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Convert non-empty text to a value of `target`.
pub fn convert_text(text: &str, target: ColumnType) -> Result<Value, String> {
    let trimmed = text.trim();
    match target {
        ColumnType::String => Ok(Value::String(text.to_string())),
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| e.to_string()),
        ColumnType::Double => parse_double(trimmed)
            .map(Value::Double)
            .ok_or_else(|| "expected number".to_string()),
        ColumnType::Date => parse_date(trimmed)
            .map(Value::Date)
            .ok_or_else(|| "unrecognized date".to_string()),
        ColumnType::TimeOfDay => parse_time(trimmed)
            .map(Value::TimeOfDay)
            .ok_or_else(|| "unrecognized time of day".to_string()),
        ColumnType::Boolean => parse_bool(trimmed)
            .map(Value::Boolean)
            .ok_or_else(|| "expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

/// Convert a raw cell to `target`. Blank cells convert to [`Value::Null`].
pub fn convert_cell(cell: &RawCell, target: ColumnType) -> Result<Value, String> {
    match cell {
        RawCell::Empty => Ok(Value::Null),
        RawCell::Text(s) => convert_text(s, target),
        RawCell::Typed(v) => coerce_typed(v, target),
    }
}

fn coerce_typed(v: &Value, target: ColumnType) -> Result<Value, String> {
    match (v, target) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::String(s), _) => convert_text(s, target),
        (_, ColumnType::String) => Ok(Value::String(v.to_string())),
        (v, t) if v.column_type() == Some(t) => Ok(v.clone()),
        (Value::Integer(i), ColumnType::Double) => Ok(Value::Double(*i as f64)),
        (Value::Double(f), ColumnType::Integer)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
        {
            Ok(Value::Integer(*f as i64))
        }
        (Value::Integer(i @ (0 | 1)), ColumnType::Boolean) => Ok(Value::Boolean(*i == 1)),
        (v, t) => Err(format!("cannot convert {v:?} to {t}")),
    }
}

pub fn can_convert(cell: &RawCell, target: ColumnType) -> bool {
    convert_cell(cell, target).is_ok()
}
