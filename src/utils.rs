use crate::error::{FlattenError, Result};
use crate::workbook::CellValue;
use chrono::{Datelike, Days, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static PERIOD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(январ[а-яё]*|феврал[а-яё]*|март[а-яё]*|апрел[а-яё]*|ма[йя]|июн[а-яё]*|июл[а-яё]*|август[а-яё]*|сентябр[а-яё]*|октябр[а-яё]*|ноябр[а-яё]*|декабр[а-яё]*|january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})",
    )
    .unwrap()
});

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}\.\d{1,2}\.\d{4})\s*[-–—]\s*(\d{1,2}\.\d{1,2}\.\d{4})").unwrap()
});

static DAY_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[./](\d{1,2})[./](\d{4}|\d{2})\b").unwrap());

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());

const RUSSIAN_MONTH_STEMS: [(&str, u32); 11] = [
    ("январ", 1),
    ("феврал", 2),
    ("март", 3),
    ("апрел", 4),
    ("июн", 6),
    ("июл", 7),
    ("август", 8),
    ("сентябр", 9),
    ("октябр", 10),
    ("ноябр", 11),
    ("декабр", 12),
];

const ENGLISH_MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number for a Russian (any case form) or English month name.
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    if name == "май" || name == "мая" {
        return Some(5);
    }
    if let Some((_, month)) = RUSSIAN_MONTH_STEMS
        .iter()
        .find(|(stem, _)| name.starts_with(stem))
    {
        return Some(*month);
    }
    ENGLISH_MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

/// First day of the month after the month containing `date`.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?.checked_add_months(Months::new(1))
}

/// Parses a reporting-period label such as "Период: Март 2024 г." and returns the
/// first day of the *following* month, which is the date the records apply to.
pub fn parse_period_label(label: &str) -> Result<NaiveDate> {
    let invalid = || FlattenError::InvalidPeriod(label.to_string());

    let caps = PERIOD_LABEL.captures(label).ok_or_else(invalid)?;
    let month = month_number(&caps[1]).ok_or_else(invalid)?;
    let year: i32 = caps[2].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(next_month_start)
        .ok_or_else(invalid)
}

/// For a "dd.mm.yyyy - dd.mm.yyyy" range, the first day of the month after the end date.
pub fn parse_period_range(text: &str) -> Option<NaiveDate> {
    let caps = DATE_RANGE.captures(text)?;
    let end = NaiveDate::parse_from_str(&caps[2], "%d.%m.%Y").ok()?;
    next_month_start(end)
}

/// Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Lenient day-first date reading. Anything unrecognized yields `None`.
pub fn parse_day_first_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(text) => {
            let first_line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
            if let Some(caps) = DAY_FIRST.captures(first_line) {
                let day: u32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                let mut year: i32 = caps[3].parse().ok()?;
                if caps[3].len() == 2 {
                    year += 2000;
                }
                return NaiveDate::from_ymd_opt(year, month, day);
            }
            let caps = ISO_DATE.captures(first_line)?;
            NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )
        }
        _ => None,
    }
}

/// Reads "45 231,50"-style numbers: spaces dropped, comma taken as the decimal mark.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric cells as-is, numeric-looking text parsed, everything else `None`.
pub fn cell_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(text) => parse_number(text),
        _ => None,
    }
}

/// Trims and collapses internal runs of whitespace to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a multi-line cell into its trimmed, non-empty lines, dropping placeholder markers.
pub fn split_lines(text: &str, placeholders: &[String]) -> Vec<String> {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .filter(|line| !placeholders.iter().any(|p| p == line))
        .collect()
}

pub fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
