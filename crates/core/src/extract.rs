use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SearchParams;

/// City names the rule extractor understands, lowercase, with their IATA code.
pub const CITY_CODES: &[(&str, &str)] = &[
    ("mumbai", "BOM"),
    ("bombay", "BOM"),
    ("delhi", "DEL"),
    ("bengaluru", "BLR"),
    ("bangalore", "BLR"),
    ("kolkata", "CCU"),
    ("ranchi", "IXR"),
    ("london", "LHR"),
    ("new york", "JFK"),
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static ROUTE: Lazy<Regex> = Lazy::new(|| {
    let cities = CITY_CODES
        .iter()
        .map(|(city, _)| regex::escape(city))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(from|to)\s+({cities})\b")).expect("valid route regex")
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)")
        .expect("valid day-month regex")
});

pub fn city_code(name: &str) -> Option<&'static str> {
    let lower = name.trim().to_lowercase();
    CITY_CODES
        .iter()
        .find(|(city, _)| *city == lower)
        .map(|(_, code)| *code)
}

pub fn is_iata_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Returns `(origin, destination)` codes found after "from"/"to". When a
/// direction is mentioned twice the later mention wins.
pub fn resolve_route(text: &str) -> (Option<&'static str>, Option<&'static str>) {
    let lower = text.to_lowercase();
    let mut origin = None;
    let mut destination = None;

    for captures in ROUTE.captures_iter(&lower) {
        let code = city_code(&captures[2]);
        match &captures[1] {
            "from" => origin = code.or(origin),
            _ => destination = code.or(destination),
        }
    }

    (origin, destination)
}

/// Next calendar occurrence of `day`/`month` on or after `today`. Looks up to
/// four years ahead, so 29 February lands on the next leap year.
pub fn next_occurrence(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    (0..=4)
        .filter_map(|offset| NaiveDate::from_ymd_opt(today.year() + offset, month, day))
        .find(|candidate| *candidate >= today)
}

pub fn parse_day_month(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    let captures = DAY_MONTH.captures(&lower)?;
    let day = captures[1].parse::<u32>().ok()?;
    let month = MONTHS.iter().position(|name| *name == &captures[3])? as u32 + 1;

    next_occurrence(day, month, today)
}

/// Regex and city-table extraction. Empty unless origin, destination and
/// date all resolve.
pub fn extract_search_params_rules(text: &str, today: NaiveDate) -> Option<SearchParams> {
    let (origin, destination) = resolve_route(text);
    let depart_date = parse_day_month(text, today)?;

    Some(SearchParams::oneway(origin?, destination?, depart_date))
}
