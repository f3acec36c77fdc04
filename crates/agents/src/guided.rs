use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::NaiveDate;
use flightdesk_core::offers::format_price;
use flightdesk_core::{
    cheapest_offer, is_iata_code, offers_from_value, BookingConfirmation, OnewayBookingRequest,
    Passenger, SearchParams, PASSENGER_FORMAT_HINT,
};
use flightdesk_gateway::{BridgeError, ToolBridge};
use serde_json::Value;
use tracing::{info, warn};

/// Blocking tool invocation, as offered by [`ToolBridge`].
pub trait BlockingTools {
    fn call_tool(&self, tool: &str, args: Value) -> Result<Value, BridgeError>;
}

impl BlockingTools for ToolBridge {
    fn call_tool(&self, tool: &str, args: Value) -> Result<Value, BridgeError> {
        ToolBridge::call_tool(self, tool, args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuidedOutcome {
    Booked(BookingConfirmation),
    Cancelled,
    NoFlights,
    InvalidInput,
    Failed(String),
    /// Input ended before the wizard finished.
    Abandoned,
}

/// Step-by-step booking: route and date, cheapest offer, confirmation,
/// passenger, booking. Tool failures end the wizard with a message; only I/O
/// errors on the console are returned as errors.
pub fn run_guided<T, R, W>(tools: &T, user_id: u64, mut input: R, output: &mut W) -> Result<GuidedOutcome>
where
    T: BlockingTools + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(output, "Welcome to the Flight Booking Assistant\n")?;

    let Some(origin) = ask(&mut input, output, "Enter origin airport code (e.g. DEL): ")? else {
        return Ok(GuidedOutcome::Abandoned);
    };
    if !is_iata_code(&origin) {
        writeln!(output, "'{origin}' is not a three-letter airport code.")?;
        return Ok(GuidedOutcome::InvalidInput);
    }

    let Some(destination) = ask(&mut input, output, "Enter destination airport code (e.g. BLR): ")?
    else {
        return Ok(GuidedOutcome::Abandoned);
    };
    if !is_iata_code(&destination) {
        writeln!(output, "'{destination}' is not a three-letter airport code.")?;
        return Ok(GuidedOutcome::InvalidInput);
    }

    let Some(date) = ask(&mut input, output, "Enter departure date (YYYY-MM-DD): ")? else {
        return Ok(GuidedOutcome::Abandoned);
    };
    let Ok(depart_date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
        writeln!(output, "'{date}' is not a date in YYYY-MM-DD format.")?;
        return Ok(GuidedOutcome::InvalidInput);
    };

    writeln!(output, "\nSearching flights...\n")?;
    let params = SearchParams::oneway(&origin, &destination, depart_date);
    let response = match tools.call_tool("search_flights", serde_json::to_value(&params)?) {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, "guided search failed");
            writeln!(output, "Flight search failed: {error}")?;
            return Ok(GuidedOutcome::Failed(error.to_string()));
        }
    };

    let offers = offers_from_value(&response).offers;
    let Some(offer) = cheapest_offer(&offers).cloned() else {
        writeln!(output, "No flights found")?;
        return Ok(GuidedOutcome::NoFlights);
    };

    writeln!(output, "Cheapest flight found:")?;
    writeln!(output, "   Offer ID : {}", offer.offer_id)?;
    writeln!(output, "   Price    : {} {}", format_price(offer.price), offer.currency)?;
    writeln!(output, "   Route    : {} → {}\n", offer.origin, offer.destination)?;

    let Some(confirm) = ask(&mut input, output, "Do you want to book this flight? (yes/no): ")? else {
        return Ok(GuidedOutcome::Abandoned);
    };
    if !matches!(confirm.to_lowercase().as_str(), "yes" | "y") {
        writeln!(output, "Booking cancelled.")?;
        return Ok(GuidedOutcome::Cancelled);
    }

    let prompt = format!("Passenger details ({PASSENGER_FORMAT_HINT}): ");
    let Some(line) = ask(&mut input, output, &prompt)? else {
        return Ok(GuidedOutcome::Abandoned);
    };
    let Some(passenger) = Passenger::parse(&line) else {
        writeln!(output, "Invalid passenger details. Expected: {PASSENGER_FORMAT_HINT}")?;
        return Ok(GuidedOutcome::InvalidInput);
    };

    writeln!(output, "\nBooking flight...\n")?;
    let depart_label = offer
        .depart_date
        .clone()
        .unwrap_or_else(|| params.depart_date_label());
    let request = OnewayBookingRequest::new(user_id, &offer.offer_id, &depart_label, passenger);
    let response = match tools.call_tool("create_oneway_booking", serde_json::to_value(&request)?) {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, offer_id = %offer.offer_id, "guided booking failed");
            writeln!(output, "Booking failed: {error}")?;
            return Ok(GuidedOutcome::Failed(error.to_string()));
        }
    };

    match BookingConfirmation::from_response(&response) {
        Some(confirmation) => {
            info!(reference = %confirmation.booking_reference, "guided booking confirmed");
            writeln!(output, "Booking Successful!")?;
            writeln!(output, "Booking Reference: {}", confirmation.booking_reference)?;
            if let Some(id) = &confirmation.id {
                writeln!(output, "Booking ID       : {}", display_value(id))?;
            }
            Ok(GuidedOutcome::Booked(confirmation))
        }
        None => {
            writeln!(output, "Booking failed: {response}")?;
            Ok(GuidedOutcome::Failed(response.to_string()))
        }
    }
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
