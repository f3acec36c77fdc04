use chrono::NaiveDate;
use flightdesk_core::{is_iata_code, Intent, SearchParams, TravellerClass};
use serde_json::Value;

/// Strategies tried in order when pulling search parameters out of a
/// message. The first one that yields complete parameters wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Oracle,
    Rules,
}

impl Extractor {
    pub const CHAIN: [Extractor; 2] = [Extractor::Oracle, Extractor::Rules];

    pub fn name(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Rules => "rules",
        }
    }
}

/// Validates the JSON an oracle produced for an extraction prompt. Anything
/// short of three-letter codes and a real calendar date is discarded.
pub fn params_from_oracle_json(value: &Value) -> Option<SearchParams> {
    let origin = value.get("origin")?.as_str()?.trim();
    let destination = value.get("destination")?.as_str()?.trim();
    let depart_date = value.get("departDate")?.as_str()?.trim();

    if !is_iata_code(origin) || !is_iata_code(destination) {
        return None;
    }
    let depart_date = NaiveDate::parse_from_str(depart_date, "%Y-%m-%d").ok()?;

    let mut params = SearchParams::oneway(origin, destination, depart_date);
    if let Some(cabin) = value
        .get("cabin")
        .and_then(Value::as_str)
        .and_then(TravellerClass::parse)
    {
        params.cabin = cabin;
    }
    if let Some(adults) = value
        .get("adults")
        .and_then(Value::as_u64)
        .filter(|adults| (1..=9).contains(adults))
    {
        params.adults = adults as u8;
    }
    Some(params)
}

/// First line of a classification completion, read as an intent label.
pub fn intent_from_completion(raw: &str) -> Option<Intent> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(Intent::from_label)
}
