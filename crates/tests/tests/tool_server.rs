mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use flightdesk_gateway::BackendConfig;
use flightdesk_tools::{build_router, ToolState};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Recorded;

async fn app_with_backend() -> (Router, Recorded) {
    let recorded = Recorded::default();
    let config = common::spawn_backend(recorded.clone()).await;
    let state = ToolState::new(&config).expect("tool state");
    (build_router(state), recorded)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request served");
    let status = response.status();
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body");
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, payload)
}

fn call(tool: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/tools/{tool}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_reports_tool_count_and_backend() {
    let (app, _) = app_with_backend().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, payload) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["tools"], 12);
    assert!(payload["backend_url"]
        .as_str()
        .is_some_and(|url| url.ends_with("/api/v1")));
    assert_eq!(payload["metrics"]["tool_calls_total"], 0);
}

#[tokio::test]
async fn lists_tools_with_descriptions() {
    let (app, _) = app_with_backend().await;

    let request = Request::builder()
        .uri("/tools")
        .body(Body::empty())
        .expect("request");
    let (status, payload) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let tools = payload["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 12);
    assert!(tools
        .iter()
        .any(|tool| tool["name"] == "search_flights" && tool["description"].is_string()));
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (app, _) = app_with_backend().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("request served");

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_tool_is_not_found_without_backend_traffic() {
    let (app, recorded) = app_with_backend().await;

    let (status, payload) = send(app, call("teleport", json!({ "args": {} }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["error"], "Tool 'teleport' not found");
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn empty_body_calls_ping() {
    let (app, recorded) = app_with_backend().await;

    let request = Request::builder()
        .method("POST")
        .uri("/tools/ping")
        .body(Body::empty())
        .expect("request");
    let (status, payload) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ok");
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (app, _) = app_with_backend().await;

    let request = Request::builder()
        .method("POST")
        .uri("/tools/ping")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, payload) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.starts_with("invalid request body")));
}

#[tokio::test]
async fn missing_argument_is_bad_request() {
    let (app, recorded) = app_with_backend().await;

    let (status, payload) = send(app, call("get_booking_details", json!({ "args": {} }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("booking_reference")));
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn flat_search_arguments_become_a_full_payload() {
    let (app, recorded) = app_with_backend().await;

    let (status, payload) = send(
        app,
        call(
            "search_flights",
            json!({ "args": { "origin": "bom", "destination": "del", "depart_date": "2026-12-05" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["data"].as_array().map(Vec::len), Some(3));

    let sent = recorded.bodies_for("/flights/search");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["departDate"], "2026-12-05");
    assert_eq!(sent[0]["tripType"], "ONEWAY");
    assert_eq!(sent[0]["adults"], 1);
}

#[tokio::test]
async fn full_search_payload_passes_through() {
    let (app, recorded) = app_with_backend().await;
    let payload = json!({
        "origin": "BOM",
        "destination": "DEL",
        "departDate": "2026-12-05",
        "adults": 2,
        "travellerClass": "BUSINESS",
        "tripType": "ONEWAY"
    });

    let (status, _) = send(app, call("search_flights", json!({ "args": payload.clone() }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded.bodies_for("/flights/search"), vec![payload]);
}

#[tokio::test]
async fn flat_booking_fills_defaults() {
    let (app, recorded) = app_with_backend().await;

    let (status, payload) = send(
        app,
        call(
            "book_flight_oneway",
            json!({ "args": {
                "offer_id": "6E-1",
                "depart_date": "2026-12-05",
                "first_name": "Asha",
                "last_name": "Rao",
                "dob": "1994-03-21"
            } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["bookingReference"], "FD7Q2K");

    let sent = recorded.bodies_for("/bookings/oneway");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["userId"], 1);
    assert_eq!(sent[0]["offerId"], "6E-1");
    assert_eq!(sent[0]["passengers"][0]["travellerClass"], "ECONOMY");
}

#[tokio::test]
async fn invalid_booking_date_is_rejected_before_the_backend() {
    let (app, recorded) = app_with_backend().await;

    let (status, _) = send(
        app,
        call(
            "book_flight_oneway",
            json!({ "args": {
                "offer_id": "6E-1",
                "depart_date": "05/12/2026",
                "first_name": "Asha",
                "last_name": "Rao",
                "dob": "1994-03-21"
            } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn my_bookings_default_to_the_demo_user() {
    let (app, recorded) = app_with_backend().await;

    let (status, payload) = send(app, call("get_my_bookings", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload[0]["bookingReference"], "FD7Q2K");
    assert_eq!(
        recorded.last(),
        Some(("/bookings/user".to_string(), json!("1")))
    );
}

#[tokio::test]
async fn backend_not_found_surfaces_as_bad_gateway() {
    let (app, _) = app_with_backend().await;

    let (status, payload) = send(
        app,
        call("get_booking_details", json!({ "args": { "booking_reference": "MISSING" } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("404")));
}

#[tokio::test]
async fn unreachable_backend_is_bad_gateway_and_counted() {
    let state = ToolState::new(&common::unreachable_backend()).expect("tool state");
    let metrics = state.metrics.clone();
    let app = build_router(state);

    let (status, payload) = send(app, call("get_my_bookings", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(payload["error"].is_string());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.tool_calls_total, 1);
    assert_eq!(snapshot.backend_errors_total, 1);
}

#[test]
fn invalid_backend_url_is_rejected() {
    let config = BackendConfig {
        base_url: "not a url".to_string(),
        ..BackendConfig::default()
    };

    assert!(ToolState::new(&config).is_err());
}
