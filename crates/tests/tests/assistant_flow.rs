mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use flightdesk_agents::BookingAgent;
use flightdesk_core::{ConversationState, Intent, SessionContext};
use flightdesk_gateway::HttpBackend;
use flightdesk_observability::AppMetrics;
use flightdesk_oracle::OfflineOracle;

use common::Recorded;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
}

async fn offline_agent() -> (BookingAgent<HttpBackend, OfflineOracle>, Recorded, Arc<AppMetrics>) {
    let recorded = Recorded::default();
    let config = common::spawn_backend(recorded.clone()).await;
    let backend = HttpBackend::new(&config).expect("backend");
    let metrics = AppMetrics::shared();
    let agent = BookingAgent::new(Arc::new(backend), Arc::new(OfflineOracle), metrics.clone());
    (agent, recorded, metrics)
}

#[tokio::test]
async fn searches_selects_and_books_without_an_oracle() {
    let (agent, recorded, metrics) = offline_agent().await;
    let mut session = SessionContext::new();

    let reply = agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    assert_eq!(reply.intent, Intent::SearchFlights);
    assert_eq!(reply.state, ConversationState::SearchDone);
    assert!(reply.text.starts_with("I found 3 flights."));
    assert!(reply
        .text
        .contains("1. BOM → DEL | 4200.50 INR | OfferId: 6E-1"));

    let searched = recorded.bodies_for("/flights/search");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0]["origin"], "BOM");
    assert_eq!(searched[0]["destination"], "DEL");
    assert_eq!(searched[0]["departDate"], "2026-12-05");

    let reply = agent
        .handle_turn_on(&mut session, "Book option 1", today())
        .await;
    assert_eq!(reply.intent, Intent::BookFlight);
    assert_eq!(reply.state, ConversationState::AwaitingPassengerDetails);
    assert!(reply.text.starts_with("Booking selected flight:\nBOM → DEL"));

    let reply = agent
        .handle_turn_on(&mut session, "Asha Rao 1994-03-21 ECONOMY", today())
        .await;
    assert_eq!(reply.state, ConversationState::Idle);
    assert_eq!(reply.text, "Booking Confirmed!\nBooking Reference: FD7Q2K");

    let booked = recorded.bodies_for("/bookings/oneway");
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0]["offerId"], "6E-1");
    assert_eq!(booked[0]["departDate"], "2026-12-05");
    assert_eq!(booked[0]["userId"], 1);
    assert_eq!(booked[0]["paymentMethod"], "CARD");
    assert_eq!(booked[0]["passengers"][0]["lastName"], "Rao");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.turns_total, 3);
    assert_eq!(snapshot.searches_total, 1);
    assert_eq!(snapshot.bookings_confirmed_total, 1);
    assert_eq!(snapshot.oracle_fallbacks_total, 2);
}

#[tokio::test]
async fn second_option_books_the_next_cheapest_offer() {
    let (agent, recorded, _) = offline_agent().await;
    let mut session = SessionContext::new();

    agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    agent.handle_turn_on(&mut session, "book 2", today()).await;
    agent
        .handle_turn_on(&mut session, "Asha Rao 1994-03-21 BUSINESS", today())
        .await;

    let booked = recorded.bodies_for("/bookings/oneway");
    assert_eq!(booked[0]["offerId"], "AI-2");
    assert_eq!(booked[0]["passengers"][0]["travellerClass"], "BUSINESS");
}

#[tokio::test]
async fn offer_without_a_date_books_on_the_searched_date() {
    let (agent, recorded, _) = offline_agent().await;
    let mut session = SessionContext::new();

    agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    agent.handle_turn_on(&mut session, "book option 3", today()).await;
    agent
        .handle_turn_on(&mut session, "Asha Rao 1994-03-21 ECONOMY", today())
        .await;

    let booked = recorded.bodies_for("/bookings/oneway");
    assert_eq!(booked[0]["offerId"], "UK-9");
    assert_eq!(booked[0]["departDate"], "2026-12-05");
}

#[tokio::test]
async fn malformed_passenger_line_keeps_waiting() {
    let (agent, recorded, _) = offline_agent().await;
    let mut session = SessionContext::new();

    agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    agent.handle_turn_on(&mut session, "book cheapest", today()).await;
    let reply = agent
        .handle_turn_on(&mut session, "Asha 21-03-1994", today())
        .await;

    assert_eq!(reply.state, ConversationState::AwaitingPassengerDetails);
    assert!(reply.text.starts_with("Invalid format. Try again."));
    assert!(recorded.bodies_for("/bookings/oneway").is_empty());
}

#[tokio::test]
async fn rejected_booking_returns_to_idle() {
    let (agent, _, metrics) = offline_agent().await;
    let mut session = SessionContext::new();

    agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    agent.handle_turn_on(&mut session, "book option 1", today()).await;
    let reply = agent
        .handle_turn_on(&mut session, "Fail Case 1990-01-01 ECONOMY", today())
        .await;

    assert_eq!(reply.state, ConversationState::Idle);
    assert!(reply.text.starts_with("Booking failed:"));
    assert!(reply.text.contains("offer expired"));
    assert_eq!(metrics.snapshot().bookings_failed_total, 1);
}

#[tokio::test]
async fn declining_after_a_search_clears_the_offers() {
    let (agent, _, _) = offline_agent().await;
    let mut session = SessionContext::new();

    agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;
    let reply = agent.handle_turn_on(&mut session, "no thanks", today()).await;

    assert_eq!(reply.state, ConversationState::Idle);
    assert_eq!(reply.text, "No problem. Let me know if you want to search again.");
    assert!(session.offers().is_empty());
}

#[tokio::test]
async fn unreachable_backend_reports_search_failure_and_stays_idle() {
    let backend = HttpBackend::new(&common::unreachable_backend()).expect("backend");
    let metrics = AppMetrics::shared();
    let agent = BookingAgent::new(Arc::new(backend), Arc::new(OfflineOracle), metrics.clone());
    let mut session = SessionContext::new();

    let reply = agent
        .handle_turn_on(&mut session, "flights from Mumbai to Delhi on 5 Dec", today())
        .await;

    assert_eq!(reply.state, ConversationState::Idle);
    assert!(reply.text.starts_with("Flight search failed:"));
    assert_eq!(metrics.snapshot().backend_errors_total, 1);
}

#[tokio::test]
async fn small_talk_gets_guidance_offline() {
    let (agent, recorded, _) = offline_agent().await;
    let mut session = SessionContext::new();

    let reply = agent.handle_turn_on(&mut session, "hello there", today()).await;

    assert_eq!(reply.intent, Intent::GeneralChat);
    assert_eq!(reply.state, ConversationState::Idle);
    assert!(reply.text.starts_with("I can search and book flights for you."));
    assert_eq!(recorded.count(), 0);
}
