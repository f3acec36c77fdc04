use serde_json::Value;

use crate::models::FlightOffer;

pub const DEFAULT_OFFER_LIMIT: usize = 7;

#[derive(Debug, Clone, Default)]
pub struct ParsedOffers {
    pub offers: Vec<FlightOffer>,
    pub skipped: usize,
}

/// Reads offers from a search response, which is either a bare array or an
/// object wrapping the array under `data`. Entries that do not look like an
/// offer are counted and dropped.
pub fn offers_from_value(value: &Value) -> ParsedOffers {
    let items: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut parsed = ParsedOffers::default();
    for item in items {
        match serde_json::from_value::<FlightOffer>(item.clone()) {
            Ok(offer) => parsed.offers.push(offer),
            Err(_) => parsed.skipped += 1,
        }
    }
    parsed
}

/// Cheapest `limit` offers, ascending by price. Ties keep backend order.
pub fn cheapest(offers: &[FlightOffer], limit: usize) -> Vec<FlightOffer> {
    let mut sorted = offers.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));
    sorted.truncate(limit);
    sorted
}

pub fn cheapest_offer(offers: &[FlightOffer]) -> Option<&FlightOffer> {
    offers.iter().min_by(|a, b| a.price.total_cmp(&b.price))
}

pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

pub fn format_route(offer: &FlightOffer) -> String {
    format!(
        "{} → {} | {} {}",
        offer.origin,
        offer.destination,
        format_price(offer.price),
        offer.currency
    )
}

pub fn format_offer_line(position: usize, offer: &FlightOffer) -> String {
    format!(
        "{position}. {} | OfferId: {}",
        format_route(offer),
        offer.offer_id
    )
}
