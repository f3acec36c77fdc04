use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::TravellerClass;

pub const PASSENGER_FORMAT_HINT: &str = "FirstName LastName YYYY-MM-DD TRAVELLER_CLASS";

static PASSENGER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\w+)\s+(\w+)\s+(\d{4}-\d{2}-\d{2})\s+(ECONOMY|BUSINESS|FIRST)\b")
        .expect("valid passenger regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub traveller_class: TravellerClass,
}

impl Passenger {
    /// Reads `FirstName LastName YYYY-MM-DD CLASS` from a single line.
    pub fn parse(line: &str) -> Option<Self> {
        let captures = PASSENGER_LINE.captures(line.trim())?;

        Some(Self {
            first_name: captures[1].to_string(),
            last_name: captures[2].to_string(),
            dob: captures[3].to_string(),
            traveller_class: TravellerClass::parse(&captures[4])?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
