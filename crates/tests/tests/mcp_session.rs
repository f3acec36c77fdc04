mod common;

use std::sync::Arc;
use std::time::Duration;

use flightdesk_gateway::{GatewayError, HttpBackend, McpClient};
use flightdesk_observability::AppMetrics;
use flightdesk_tools::{McpServer, ToolRegistry};
use serde_json::json;
use tokio::io::{duplex, split, BufReader};

use common::Recorded;

/// MCP client wired to an in-process MCP server over an in-memory pipe.
async fn session(recorded: Recorded) -> (McpClient, Arc<AppMetrics>) {
    let config = common::spawn_backend(recorded).await;
    let backend = HttpBackend::new(&config).expect("backend");
    let metrics = AppMetrics::shared();
    let server = McpServer::new(Arc::new(ToolRegistry::standard()), backend, Arc::clone(&metrics));

    let (client_io, server_io) = duplex(64 * 1024);
    tokio::spawn(async move {
        let (read, write) = split(server_io);
        let _ = server.serve(BufReader::new(read), write).await;
    });

    let (read, write) = split(client_io);
    let client = McpClient::connect(BufReader::new(read), write, Duration::from_secs(5))
        .await
        .expect("mcp handshake");
    (client, metrics)
}

#[tokio::test]
async fn lists_the_registry_tools() {
    let (client, _) = session(Recorded::default()).await;

    let tools = client.list_tools().await.expect("tools/list");

    assert!(tools.iter().any(|tool| tool.name == "search_flights"));
    let ping = tools.iter().find(|tool| tool.name == "ping").expect("ping tool");
    assert_eq!(ping.description, "Health check tool");
}

#[tokio::test]
async fn booking_lookup_round_trips_through_the_backend() {
    let recorded = Recorded::default();
    let (client, metrics) = session(recorded.clone()).await;

    let reply = client
        .call_tool("get_booking_details", json!({ "booking_reference": "FD7Q2K" }))
        .await
        .expect("tool reply");

    assert_eq!(reply["bookingReference"], "FD7Q2K");
    assert_eq!(reply["status"], "CONFIRMED");
    assert_eq!(recorded.bodies_for("/bookings/reference"), vec![json!("FD7Q2K")]);
    assert_eq!(metrics.snapshot().tool_calls_total, 1);
}

#[tokio::test]
async fn search_error_payload_becomes_a_backend_error() {
    let recorded = Recorded::default();
    let (client, _) = session(recorded.clone()).await;

    let error = client
        .call_tool(
            "search_flights",
            json!({ "origin": "XXX", "destination": "DEL", "depart_date": "2026-12-05" }),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::Backend(ref message) if message.contains("unknown origin XXX")));
    assert_eq!(recorded.bodies_for("/flights/search").len(), 1);
}

#[tokio::test]
async fn failed_backend_call_is_flagged_as_error() {
    let (client, metrics) = session(Recorded::default()).await;

    let error = client
        .call_tool("get_booking_details", json!({ "booking_reference": "MISSING" }))
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::Backend(_)));
    assert_eq!(metrics.snapshot().backend_errors_total, 1);
}

#[tokio::test]
async fn unknown_tool_is_rejected_by_the_server() {
    let recorded = Recorded::default();
    let (client, _) = session(recorded.clone()).await;

    let error = client.call_tool("book_hotel", json!({})).await.unwrap_err();

    assert!(matches!(error, GatewayError::Backend(ref message) if message == "Tool 'book_hotel' not found"));
    assert_eq!(recorded.count(), 0);
}
