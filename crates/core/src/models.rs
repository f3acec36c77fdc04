use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::passenger::Passenger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    SearchFlights,
    BookFlight,
    GeneralChat,
}

impl Intent {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::SearchFlights => "SEARCH_FLIGHTS",
            Self::BookFlight => "BOOK_FLIGHT",
            Self::GeneralChat => "GENERAL_CHAT",
        }
    }

    /// Parses a label as returned by a language oracle. Surrounding quotes,
    /// whitespace and trailing punctuation are ignored.
    pub fn from_label(value: &str) -> Option<Self> {
        let cleaned = value
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .to_ascii_uppercase();

        match cleaned.as_str() {
            "SEARCH_FLIGHTS" => Some(Self::SearchFlights),
            "BOOK_FLIGHT" => Some(Self::BookFlight),
            "GENERAL_CHAT" => Some(Self::GeneralChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Idle,
    SearchDone,
    AwaitingPassengerDetails,
}

impl ConversationState {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::SearchDone => "SEARCH_DONE",
            Self::AwaitingPassengerDetails => "AWAITING_PASSENGER_DETAILS",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravellerClass {
    #[default]
    Economy,
    Business,
    First,
}

impl TravellerClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ECONOMY" => Some(Self::Economy),
            "BUSINESS" => Some(Self::Business),
            "FIRST" => Some(Self::First),
            _ => None,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    #[default]
    Oneway,
    Roundtrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Card,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default = "default_adults")]
    pub adults: u8,
    #[serde(default)]
    pub cabin: TravellerClass,
}

impl SearchParams {
    pub fn oneway(origin: &str, destination: &str, depart_date: NaiveDate) -> Self {
        Self {
            origin: origin.trim().to_ascii_uppercase(),
            destination: destination.trim().to_ascii_uppercase(),
            depart_date,
            trip_type: TripType::Oneway,
            adults: default_adults(),
            cabin: TravellerClass::Economy,
        }
    }

    pub fn depart_date_label(&self) -> String {
        self.depart_date.format("%Y-%m-%d").to_string()
    }
}

fn default_adults() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    #[serde(deserialize_with = "string_or_number")]
    pub offer_id: String,
    pub origin: String,
    pub destination: String,
    #[serde(deserialize_with = "price_from_number_or_string")]
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub depart_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnewayBookingRequest {
    pub user_id: u64,
    pub offer_id: String,
    pub trip_type: TripType,
    pub depart_date: String,
    pub payment_method: PaymentMethod,
    pub passengers: Vec<Passenger>,
}

impl OnewayBookingRequest {
    pub fn new(user_id: u64, offer_id: &str, depart_date: &str, passenger: Passenger) -> Self {
        Self {
            user_id,
            offer_id: offer_id.to_string(),
            trip_type: TripType::Oneway,
            depart_date: depart_date.to_string(),
            payment_method: PaymentMethod::Card,
            passengers: vec![passenger],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_reference: String,
    #[serde(default)]
    pub id: Option<Value>,
}

impl BookingConfirmation {
    /// A booking only counts as confirmed when the backend hands back a
    /// non-empty `bookingReference`.
    pub fn from_response(value: &Value) -> Option<Self> {
        let reference = value.get("bookingReference")?;
        let booking_reference = match reference {
            Value::String(text) if !text.trim().is_empty() => text.clone(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };

        Some(Self {
            booking_reference,
            id: value.get("id").cloned().filter(|id| !id.is_null()),
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn price_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("price out of range")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid price '{text}'"))),
        other => Err(serde::de::Error::custom(format!(
            "expected numeric price, got {other}"
        ))),
    }
}
