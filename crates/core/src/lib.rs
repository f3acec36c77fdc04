pub mod error;
pub mod extract;
pub mod intent;
pub mod models;
pub mod offers;
pub mod passenger;
pub mod session;

pub use error::CoreError;
pub use extract::{extract_search_params_rules, is_iata_code, CITY_CODES};
pub use intent::{classify_intent_rules, is_exit_command, normalize_text};
pub use models::*;
pub use offers::{cheapest, cheapest_offer, offers_from_value, DEFAULT_OFFER_LIMIT};
pub use passenger::{Passenger, PASSENGER_FORMAT_HINT};
pub use session::SessionContext;
