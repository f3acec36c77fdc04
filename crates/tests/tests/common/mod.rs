#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use flightdesk_gateway::BackendConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Requests the stub backend has seen, as `(path, body)`.
#[derive(Clone, Default)]
pub struct Recorded {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorded {
    fn push(&self, path: &str, body: Value) {
        self.calls.lock().push((path.to_string(), body));
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> Option<(String, Value)> {
        self.calls.lock().last().cloned()
    }

    pub fn bodies_for(&self, path: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(seen, _)| seen == path)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

pub fn offers() -> Value {
    json!({
        "data": [
            { "offerId": "AI-2", "origin": "BOM", "destination": "DEL", "price": 6100, "currency": "INR", "departDate": "2026-12-05" },
            { "offerId": "6E-1", "origin": "BOM", "destination": "DEL", "price": "4200.50", "currency": "INR", "departDate": "2026-12-05" },
            { "offerId": "UK-9", "origin": "BOM", "destination": "DEL", "price": 8800, "currency": "INR" }
        ]
    })
}

/// In-memory stand-in for the booking backend, mounted under `/api/v1`.
/// Searches from `XXX` fail with an error payload; bookings for a passenger
/// named `Fail` come back without a reference.
pub fn stub_backend(recorded: Recorded) -> Router {
    let api = Router::new()
        .route("/flights/search", post(search))
        .route("/bookings/oneway", post(book_oneway))
        .route("/bookings/roundtrip", post(book_roundtrip))
        .route("/bookings/reference/:reference", get(booking_by_reference))
        .route("/bookings/user/:user_id", get(bookings_by_user))
        .route("/bookings/:id", get(booking_by_id))
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
        .with_state(recorded);

    Router::new().nest("/api/v1", api)
}

async fn search(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.push("/flights/search", body.clone());
    if body["origin"] == "XXX" {
        return Json(json!({ "error": "unknown origin XXX" }));
    }
    Json(offers())
}

async fn book_oneway(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.push("/bookings/oneway", body.clone());
    if body["passengers"][0]["firstName"] == "Fail" {
        return Json(json!({ "status": "REJECTED", "message": "offer expired" }));
    }
    Json(json!({
        "bookingReference": "FD7Q2K",
        "id": 501,
        "offerId": body["offerId"].clone()
    }))
}

async fn book_roundtrip(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.push("/bookings/roundtrip", body);
    Json(json!({ "bookingReference": "FDRT01", "id": 502 }))
}

async fn booking_by_reference(
    State(recorded): State<Recorded>,
    Path(reference): Path<String>,
) -> (StatusCode, Json<Value>) {
    recorded.push("/bookings/reference", json!(reference));
    if reference == "MISSING" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "bookingReference": reference, "status": "CONFIRMED" })),
    )
}

async fn bookings_by_user(
    State(recorded): State<Recorded>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    recorded.push("/bookings/user", json!(user_id));
    Json(json!([{ "id": 501, "userId": user_id, "bookingReference": "FD7Q2K" }]))
}

async fn booking_by_id(State(recorded): State<Recorded>, Path(id): Path<String>) -> Json<Value> {
    recorded.push("/bookings/id", json!(id));
    Json(json!({ "id": id, "bookingReference": "FD7Q2K" }))
}

async fn create_user(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.push("/users", body.clone());
    Json(json!({ "id": 42, "email": body["email"].clone() }))
}

async fn get_user(State(recorded): State<Recorded>, Path(id): Path<String>) -> Json<Value> {
    recorded.push("/users/id", json!(id));
    Json(json!({ "id": id, "name": "Asha Rao" }))
}

/// Serves `router` on an ephemeral port and returns its address.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

pub async fn spawn_backend(recorded: Recorded) -> BackendConfig {
    let base = spawn(stub_backend(recorded)).await;
    BackendConfig {
        base_url: format!("{base}/api/v1"),
        timeout: Duration::from_secs(5),
    }
}

/// A base URL nothing listens on.
pub fn unreachable_backend() -> BackendConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    BackendConfig {
        base_url: format!("http://{addr}/api/v1"),
        timeout: Duration::from_secs(2),
    }
}
