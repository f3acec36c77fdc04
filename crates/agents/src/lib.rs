mod extract;
pub mod guided;

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use flightdesk_core::intent::{is_booking_selection, is_decline, selection_index};
use flightdesk_core::offers::{format_offer_line, format_route};
use flightdesk_core::{
    cheapest, classify_intent_rules, extract_search_params_rules, normalize_text,
    BookingConfirmation, ConversationState, CoreError, Intent, OnewayBookingRequest, Passenger,
    SearchParams, SessionContext, DEFAULT_OFFER_LIMIT, PASSENGER_FORMAT_HINT,
};
use flightdesk_gateway::{FlightBackend, GatewayError};
use flightdesk_observability::AppMetrics;
use flightdesk_oracle::json::extract_json_object;
use flightdesk_oracle::prompts::{chat_prompt, classification_prompt, extraction_prompt};
use flightdesk_oracle::LanguageOracle;
use tracing::{debug, info, instrument, warn};

pub use extract::{intent_from_completion, params_from_oracle_json, Extractor};
pub use guided::{run_guided, BlockingTools, GuidedOutcome};

pub const DEFAULT_USER_ID: u64 = 1;

const EXAMPLE_QUERY: &str = "flights from Mumbai to Delhi on 5 Dec";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub intent: Intent,
    pub state: ConversationState,
}

/// Drives one conversation turn: classify, dispatch on the session state,
/// call the backend, format the answer.
pub struct BookingAgent<B, O>
where
    B: FlightBackend,
    O: LanguageOracle,
{
    backend: Arc<B>,
    oracle: Arc<O>,
    metrics: Arc<AppMetrics>,
    user_id: u64,
    offer_limit: usize,
}

impl<B, O> Clone for BookingAgent<B, O>
where
    B: FlightBackend,
    O: LanguageOracle,
{
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            oracle: Arc::clone(&self.oracle),
            metrics: Arc::clone(&self.metrics),
            user_id: self.user_id,
            offer_limit: self.offer_limit,
        }
    }
}

impl<B, O> BookingAgent<B, O>
where
    B: FlightBackend,
    O: LanguageOracle,
{
    pub fn new(backend: Arc<B>, oracle: Arc<O>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            backend,
            oracle,
            metrics,
            user_id: DEFAULT_USER_ID,
            offer_limit: DEFAULT_OFFER_LIMIT,
        }
    }

    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_offer_limit(mut self, offer_limit: usize) -> Self {
        self.offer_limit = offer_limit.max(1);
        self
    }

    pub async fn handle_turn(&self, session: &mut SessionContext, text: &str) -> TurnReply {
        self.handle_turn_on(session, text, Local::now().date_naive())
            .await
    }

    /// Same as [`handle_turn`](Self::handle_turn) with an explicit "today",
    /// used to resolve day-month phrases.
    #[instrument(skip(self, session, text), fields(session_id = %session.session_id()))]
    pub async fn handle_turn_on(
        &self,
        session: &mut SessionContext,
        text: &str,
        today: NaiveDate,
    ) -> TurnReply {
        self.metrics.inc_turn();
        let normalized = normalize_text(text);
        let intent = self.classify(session.state(), &normalized, today).await;
        let state_before = session.state();

        let reply = match state_before {
            ConversationState::Idle if intent == Intent::SearchFlights => {
                self.search(session, &normalized, today).await
            }
            ConversationState::SearchDone if is_booking_selection(&normalized) => {
                select(session, &normalized)
            }
            ConversationState::SearchDone if is_decline(&normalized) => decline(session),
            ConversationState::AwaitingPassengerDetails => {
                self.book(session, &normalized, today).await
            }
            _ => self.chat(&normalized).await,
        };

        info!(
            intent = intent.as_label(),
            from = %state_before,
            to = %session.state(),
            "turn handled"
        );

        TurnReply {
            text: reply,
            intent,
            state: session.state(),
        }
    }

    /// Booking verbs are decided locally. The oracle is only asked while the
    /// session is idle, because no other state routes on its answer. With no
    /// oracle reachable, a message the rule extractor fully understands still
    /// counts as a search.
    async fn classify(&self, state: ConversationState, text: &str, today: NaiveDate) -> Intent {
        if let Some(intent) = classify_intent_rules(text) {
            return intent;
        }
        if state != ConversationState::Idle {
            return Intent::GeneralChat;
        }

        match self.oracle.complete(&classification_prompt(text)).await {
            Ok(raw) => intent_from_completion(&raw).unwrap_or_else(|| {
                debug!(raw = %raw, "unrecognized intent label");
                self.metrics.inc_oracle_fallback();
                Intent::GeneralChat
            }),
            Err(error) => {
                debug!(oracle = self.oracle.name(), %error, "intent oracle unavailable");
                self.metrics.inc_oracle_fallback();
                if extract_search_params_rules(text, today).is_some() {
                    Intent::SearchFlights
                } else {
                    Intent::GeneralChat
                }
            }
        }
    }

    async fn extract(&self, text: &str, today: NaiveDate) -> Option<SearchParams> {
        for strategy in Extractor::CHAIN {
            let params = match strategy {
                Extractor::Oracle => self.extract_with_oracle(text, today).await,
                Extractor::Rules => extract_search_params_rules(text, today),
            };
            if let Some(params) = params {
                debug!(strategy = strategy.name(), "search parameters extracted");
                return Some(params);
            }
        }
        None
    }

    async fn extract_with_oracle(&self, text: &str, today: NaiveDate) -> Option<SearchParams> {
        let raw = match self.oracle.complete(&extraction_prompt(text, today)).await {
            Ok(raw) => raw,
            Err(error) => {
                debug!(oracle = self.oracle.name(), %error, "extraction oracle unavailable");
                self.metrics.inc_oracle_fallback();
                return None;
            }
        };

        let params = extract_json_object(&raw)
            .as_ref()
            .and_then(params_from_oracle_json);
        if params.is_none() {
            debug!(raw = %raw, "discarded oracle extraction");
            self.metrics.inc_oracle_fallback();
        }
        params
    }

    async fn search(&self, session: &mut SessionContext, text: &str, today: NaiveDate) -> String {
        let Some(params) = self.extract(text, today).await else {
            return format!(
                "I couldn't understand the flight details. Try something like \"{EXAMPLE_QUERY}\"."
            );
        };

        self.metrics.inc_search();
        let offers = match self.backend.search_flights(&params).await {
            Ok(offers) => offers,
            Err(error) => {
                warn!(%error, origin = %params.origin, destination = %params.destination, "flight search failed");
                self.metrics.inc_backend_error();
                return format!("Flight search failed: {error}");
            }
        };

        let found = offers.len();
        let shortlist = cheapest(&offers, self.offer_limit);
        match session.record_search(params, shortlist) {
            Ok(()) => {}
            Err(CoreError::NoOffers) => return "No flights found.".to_string(),
            Err(error) => return error.to_string(),
        }

        let lines = session
            .offers()
            .iter()
            .enumerate()
            .map(|(index, offer)| format_offer_line(index + 1, offer))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "I found {found} flights.\nHere are the {shown} cheapest options:\n\n{lines}\n\nSay 'Book option 1' or 'Book cheapest'",
            shown = session.offers().len(),
        )
    }

    async fn book(&self, session: &mut SessionContext, text: &str, today: NaiveDate) -> String {
        let Some(passenger) = Passenger::parse(text) else {
            return format!("Invalid format. Try again.\nFormat: {PASSENGER_FORMAT_HINT}");
        };
        let Some(request) = self.booking_request(session, passenger, today) else {
            if let Err(error) = session.finish_booking() {
                warn!(%error, "session was not awaiting passenger details");
            }
            return "No flight is selected. Search again to pick one.".to_string();
        };

        let result = self.backend.create_oneway_booking(&request).await;
        if let Err(error) = session.finish_booking() {
            warn!(%error, "session was not awaiting passenger details");
        }

        match result {
            Ok(response) => match BookingConfirmation::from_response(&response) {
                Some(confirmation) => {
                    self.metrics.inc_booking(true);
                    info!(reference = %confirmation.booking_reference, offer_id = %request.offer_id, "booking confirmed");
                    format!(
                        "Booking Confirmed!\nBooking Reference: {}",
                        confirmation.booking_reference
                    )
                }
                None => {
                    self.metrics.inc_booking(false);
                    warn!(offer_id = %request.offer_id, "booking response carried no reference");
                    format!("Booking failed: {response}")
                }
            },
            Err(error) => {
                self.metrics.inc_booking(false);
                self.metrics.inc_backend_error();
                warn!(%error, offer_id = %request.offer_id, "booking request failed");
                booking_failure_message(&error)
            }
        }
    }

    fn booking_request(
        &self,
        session: &SessionContext,
        passenger: Passenger,
        today: NaiveDate,
    ) -> Option<OnewayBookingRequest> {
        let offer = session.selected()?;
        let depart_date = offer
            .depart_date
            .clone()
            .or_else(|| session.last_search().map(SearchParams::depart_date_label))
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

        Some(OnewayBookingRequest::new(
            self.user_id,
            &offer.offer_id,
            &depart_date,
            passenger,
        ))
    }

    async fn chat(&self, text: &str) -> String {
        match self.oracle.complete(&chat_prompt(text)).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => chat_fallback(),
            Err(error) => {
                debug!(oracle = self.oracle.name(), %error, "chat oracle unavailable");
                self.metrics.inc_oracle_fallback();
                chat_fallback()
            }
        }
    }
}

fn select(session: &mut SessionContext, text: &str) -> String {
    let available = session.offers().len();
    let Some(index) = selection_index(text) else {
        return format!("Choose an option between 1 and {available}.");
    };

    match session.select_offer(index) {
        Ok(offer) => format!(
            "Booking selected flight:\n{}\n\nEnter passenger details:\nFormat: {PASSENGER_FORMAT_HINT}",
            format_route(offer)
        ),
        Err(CoreError::OfferOutOfRange {
            requested,
            available,
        }) => format!("Option {requested} is not in the list. Choose between 1 and {available}."),
        Err(error) => error.to_string(),
    }
}

fn decline(session: &mut SessionContext) -> String {
    match session.decline() {
        Ok(()) => "No problem. Let me know if you want to search again.".to_string(),
        Err(error) => error.to_string(),
    }
}

/// A timed-out booking may still have gone through, so the user is pointed
/// at their bookings instead of being invited to resubmit.
fn booking_failure_message(error: &GatewayError) -> String {
    if error.is_timeout() {
        "Booking failed: the backend did not answer in time. The booking may still have been created; check your bookings before trying again.".to_string()
    } else {
        format!("Booking failed: {error}")
    }
}

fn chat_fallback() -> String {
    format!("I can search and book flights for you. Try something like \"{EXAMPLE_QUERY}\".")
}
