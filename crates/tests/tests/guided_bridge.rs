mod common;

use std::io::Cursor;
use std::time::Duration;

use flightdesk_agents::{run_guided, GuidedOutcome};
use flightdesk_gateway::{ToolBridge, ToolClient};
use flightdesk_tools::{build_router, ToolState};
use serde_json::json;

use common::Recorded;

/// Backend stub plus a live tool server in front of it; returns the tool
/// service base URL.
async fn tool_service(recorded: Recorded) -> String {
    let config = common::spawn_backend(recorded).await;
    let state = ToolState::new(&config).expect("tool state");
    let base = common::spawn(build_router(state)).await;
    format!("{base}/tools")
}

fn run_wizard(tools_url: String, script: &'static str) -> (GuidedOutcome, String) {
    let client = ToolClient::new(&tools_url, Duration::from_secs(5)).expect("tool client");
    let bridge = ToolBridge::start(client).expect("bridge");

    let mut output = Vec::new();
    let outcome = run_guided(&bridge, 1, Cursor::new(script), &mut output).expect("wizard");
    bridge.close();

    (outcome, String::from_utf8(output).expect("utf-8 output"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wizard_books_the_cheapest_flight_through_the_bridge() {
    let recorded = Recorded::default();
    let tools_url = tool_service(recorded.clone()).await;

    let (outcome, transcript) = tokio::task::spawn_blocking(move || {
        run_wizard(tools_url, "bom\ndel\n2026-12-05\nyes\nAsha Rao 1994-03-21 ECONOMY\n")
    })
    .await
    .expect("wizard thread");

    let confirmation = match outcome {
        GuidedOutcome::Booked(confirmation) => confirmation,
        other => panic!("expected a booking, got {other:?}\n{transcript}"),
    };
    assert_eq!(confirmation.booking_reference, "FD7Q2K");
    assert_eq!(confirmation.id, Some(json!(501)));

    assert!(transcript.contains("Offer ID : 6E-1"));
    assert!(transcript.contains("Booking Successful!"));
    assert!(transcript.contains("Booking Reference: FD7Q2K"));
    assert!(transcript.contains("Booking ID       : 501"));

    let searched = recorded.bodies_for("/flights/search");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0]["origin"], "BOM");
    assert_eq!(searched[0]["departDate"], "2026-12-05");

    let booked = recorded.bodies_for("/bookings/oneway");
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0]["offerId"], "6E-1");
    assert_eq!(booked[0]["departDate"], "2026-12-05");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn declining_the_offer_books_nothing() {
    let recorded = Recorded::default();
    let tools_url = tool_service(recorded.clone()).await;

    let (outcome, transcript) = tokio::task::spawn_blocking(move || {
        run_wizard(tools_url, "BOM\nDEL\n2026-12-05\nno\n")
    })
    .await
    .expect("wizard thread");

    assert_eq!(outcome, GuidedOutcome::Cancelled);
    assert!(transcript.contains("Booking cancelled."));
    assert!(recorded.bodies_for("/bookings/oneway").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backend_error_payload_ends_the_wizard() {
    let recorded = Recorded::default();
    let tools_url = tool_service(recorded.clone()).await;

    let (outcome, transcript) = tokio::task::spawn_blocking(move || {
        run_wizard(tools_url, "XXX\nDEL\n2026-12-05\n")
    })
    .await
    .expect("wizard thread");

    let message = match outcome {
        GuidedOutcome::Failed(message) => message,
        other => panic!("expected a failure, got {other:?}"),
    };
    assert!(message.contains("unknown origin XXX"));
    assert!(transcript.contains("Flight search failed:"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bridge_forwards_direct_tool_calls() {
    let recorded = Recorded::default();
    let tools_url = tool_service(recorded.clone()).await;

    let reply = tokio::task::spawn_blocking(move || {
        let client = ToolClient::new(&tools_url, Duration::from_secs(5)).expect("tool client");
        let bridge = ToolBridge::start(client).expect("bridge");
        let reply = bridge.call_tool("get_booking_details", json!({ "booking_reference": "FD7Q2K" }));
        bridge.close();
        reply
    })
    .await
    .expect("bridge thread")
    .expect("tool reply");

    assert_eq!(reply["bookingReference"], "FD7Q2K");
    assert_eq!(reply["status"], "CONFIRMED");
}
