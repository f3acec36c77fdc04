use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Intent;

static BOOKING_VERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(book|reserve)\b").expect("valid booking verb regex"));

static BOOKING_SELECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(book option|book cheapest|book\s+\d+)\b").expect("valid selection regex")
});

static SELECTION_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:option|book)\s+(\d+)\b").expect("valid selection number regex")
});

static DECLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(no|don't|do not|not now|cancel|exit|stop)\b").expect("valid decline regex")
});

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Deterministic part of intent detection. Anything mentioning a booking verb
/// is a booking, whatever an oracle would have said.
pub fn classify_intent_rules(text: &str) -> Option<Intent> {
    if BOOKING_VERB.is_match(&text.to_lowercase()) {
        Some(Intent::BookFlight)
    } else {
        None
    }
}

pub fn is_booking_selection(text: &str) -> bool {
    BOOKING_SELECTION.is_match(&text.to_lowercase())
}

/// Zero-based index requested by a selection phrase. No number means the
/// first (cheapest) offer; "option 0" has no valid index.
pub fn selection_index(text: &str) -> Option<usize> {
    match SELECTION_NUMBER.captures(&text.to_lowercase()) {
        Some(captures) => captures[1]
            .parse::<usize>()
            .ok()
            .and_then(|position| position.checked_sub(1)),
        None => Some(0),
    }
}

pub fn is_decline(text: &str) -> bool {
    DECLINE.is_match(&text.to_lowercase())
}

pub fn is_exit_command(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit")
}
