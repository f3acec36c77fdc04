use std::collections::BTreeMap;

use chrono::NaiveDate;
use flightdesk_core::{OnewayBookingRequest, Passenger, SearchParams, TravellerClass};
use flightdesk_gateway::{GatewayError, HttpBackend, ToolDescriptor};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const DEFAULT_TOOL_USER_ID: u64 = 1;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error(transparent)]
    Backend(#[from] GatewayError),
}

impl ToolError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingArgument(_) | Self::InvalidArgument { .. })
    }
}

pub type ToolHandler =
    for<'a> fn(&'a HttpBackend, Map<String, Value>) -> BoxFuture<'a, Result<Value, ToolError>>;

pub struct ToolEntry {
    pub description: &'static str,
    pub input_schema: Value,
    handler: ToolHandler,
}

/// Every tool the servers expose, keyed by name. Built once at startup.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolEntry>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        let mut tools = BTreeMap::new();
        let mut add = |name, description, input_schema, handler: ToolHandler| {
            tools.insert(
                name,
                ToolEntry {
                    description,
                    input_schema,
                    handler,
                },
            );
        };

        add("ping", "Health check tool", object_schema(&[], &[]), ping);
        add(
            "create_user",
            "Create a new user",
            passthrough_schema(),
            create_user,
        );
        add(
            "get_user",
            "Get user by ID",
            object_schema(&[("userId", "integer")], &["userId"]),
            get_user,
        );
        add(
            "search_flights",
            "Search one-way flights. Accepts a full search payload or origin, destination and depart_date (YYYY-MM-DD)",
            object_schema(
                &[
                    ("origin", "string"),
                    ("destination", "string"),
                    ("depart_date", "string"),
                    ("departDate", "string"),
                ],
                &["origin", "destination"],
            ),
            search_flights,
        );
        add(
            "create_oneway_booking",
            "Create a one-way booking",
            passthrough_schema(),
            create_oneway_booking,
        );
        add(
            "create_roundtrip_booking",
            "Create a round-trip booking",
            passthrough_schema(),
            create_roundtrip_booking,
        );
        add(
            "get_booking_by_id",
            "Get booking by booking ID",
            object_schema(&[("bookingId", "integer")], &["bookingId"]),
            get_booking_by_id,
        );
        add(
            "get_bookings_by_user",
            "Get all bookings for a user",
            object_schema(&[("userId", "integer")], &["userId"]),
            get_bookings_by_user,
        );
        add(
            "get_booking_by_reference",
            "Get booking by reference number",
            object_schema(&[("reference", "string")], &["reference"]),
            get_booking_by_reference,
        );
        add(
            "book_flight_oneway",
            "Book a one-way flight using an offer ID from search results",
            object_schema(
                &[
                    ("offer_id", "string"),
                    ("depart_date", "string"),
                    ("first_name", "string"),
                    ("last_name", "string"),
                    ("dob", "string"),
                    ("traveller_class", "string"),
                ],
                &["offer_id", "depart_date", "first_name", "last_name", "dob"],
            ),
            book_flight_oneway,
        );
        add(
            "get_my_bookings",
            "Get all bookings for a user (defaults to user 1)",
            object_schema(&[("user_id", "integer")], &[]),
            get_my_bookings,
        );
        add(
            "get_booking_details",
            "Get details of a booking by its reference code",
            object_schema(&[("booking_reference", "string")], &["booking_reference"]),
            get_booking_details,
        );

        Self { tools }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &ToolEntry)> {
        self.tools.iter().map(|(name, entry)| (*name, entry))
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries()
            .map(|(name, entry)| ToolDescriptor {
                name: name.to_string(),
                description: entry.description.to_string(),
            })
            .collect()
    }

    /// Runs a tool. Unknown names fail before anything reaches the backend;
    /// `null` arguments count as an empty object.
    pub async fn call(
        &self,
        backend: &HttpBackend,
        name: &str,
        args: Value,
    ) -> Result<Value, ToolError> {
        let entry = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::InvalidArgument {
                    name: "args",
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        (entry.handler)(backend, args).await
    }
}

fn object_schema(properties: &[(&str, &str)], required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(name, kind)| (name.to_string(), json!({ "type": kind })))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn passthrough_schema() -> Value {
    json!({ "type": "object", "additionalProperties": true })
}

/// First present, non-null value among the accepted spellings.
fn lookup<'a>(args: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| args.get(*name))
        .find(|value| !value.is_null())
}

fn text_arg(args: &Map<String, Value>, names: &[&'static str]) -> Result<Option<String>, ToolError> {
    match lookup(args, names) {
        None => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(ToolError::InvalidArgument {
            name: names[0],
            reason: format!("expected a string or number, got {other}"),
        }),
    }
}

fn required_text(args: &Map<String, Value>, names: &[&'static str]) -> Result<String, ToolError> {
    text_arg(args, names)?.ok_or(ToolError::MissingArgument(names[0]))
}

fn date_arg(value: &str, name: &'static str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ToolError::InvalidArgument {
        name,
        reason: format!("'{value}' is not a YYYY-MM-DD date"),
    })
}

fn ping(_backend: &HttpBackend, _args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async { Ok(json!({ "status": "ok", "message": "Tool server is running" })) }.boxed()
}

fn create_user(backend: &HttpBackend, args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move { Ok(backend.create_user(&Value::Object(args)).await?) }.boxed()
}

fn get_user(backend: &HttpBackend, args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let user_id = required_text(&args, &["userId", "user_id"])?;
        Ok(backend.get_user(&user_id).await?)
    }
    .boxed()
}

/// Full payloads go through untouched. Flat `depart_date` arguments are
/// turned into a one-way economy search for one adult.
fn search_flights(backend: &HttpBackend, args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        if args.contains_key("departDate") || !args.contains_key("depart_date") {
            return Ok(backend.search_raw(&Value::Object(args)).await?);
        }

        let origin = required_text(&args, &["origin"])?;
        let destination = required_text(&args, &["destination"])?;
        let depart_date = required_text(&args, &["depart_date"])?;
        let params = SearchParams::oneway(&origin, &destination, date_arg(&depart_date, "depart_date")?);

        let payload = serde_json::to_value(&params).map_err(|error| ToolError::InvalidArgument {
            name: "args",
            reason: error.to_string(),
        })?;
        Ok(backend.search_raw(&payload).await?)
    }
    .boxed()
}

fn create_oneway_booking(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move { Ok(backend.create_oneway_booking_raw(&Value::Object(args)).await?) }.boxed()
}

fn create_roundtrip_booking(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move { Ok(backend.create_roundtrip_booking(&Value::Object(args)).await?) }.boxed()
}

fn get_booking_by_id(backend: &HttpBackend, args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let booking_id = required_text(&args, &["bookingId", "booking_id"])?;
        Ok(backend.booking_by_id(&booking_id).await?)
    }
    .boxed()
}

fn get_bookings_by_user(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let user_id = required_text(&args, &["userId", "user_id"])?;
        Ok(backend.bookings_by_user(&user_id).await?)
    }
    .boxed()
}

fn get_booking_by_reference(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let reference = required_text(&args, &["reference", "booking_reference", "bookingReference"])?;
        Ok(backend.booking_by_reference(&reference).await?)
    }
    .boxed()
}

fn book_flight_oneway(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let request = oneway_request_from_flat(&args)?;
        let payload = serde_json::to_value(&request).map_err(|error| ToolError::InvalidArgument {
            name: "args",
            reason: error.to_string(),
        })?;
        Ok(backend.create_oneway_booking_raw(&payload).await?)
    }
    .boxed()
}

fn get_my_bookings(backend: &HttpBackend, args: Map<String, Value>) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let user_id = text_arg(&args, &["user_id", "userId"])?
            .unwrap_or_else(|| DEFAULT_TOOL_USER_ID.to_string());
        Ok(backend.bookings_by_user(&user_id).await?)
    }
    .boxed()
}

fn get_booking_details(
    backend: &HttpBackend,
    args: Map<String, Value>,
) -> BoxFuture<'_, Result<Value, ToolError>> {
    async move {
        let reference = required_text(&args, &["booking_reference", "bookingReference", "reference"])?;
        Ok(backend.booking_by_reference(&reference).await?)
    }
    .boxed()
}

fn oneway_request_from_flat(args: &Map<String, Value>) -> Result<OnewayBookingRequest, ToolError> {
    let offer_id = required_text(args, &["offer_id", "offerId"])?;
    let depart_date = required_text(args, &["depart_date", "departDate"])?;
    date_arg(&depart_date, "depart_date")?;

    let traveller_class = match text_arg(args, &["traveller_class", "travellerClass"])? {
        None => TravellerClass::default(),
        Some(value) => TravellerClass::parse(&value).ok_or_else(|| ToolError::InvalidArgument {
            name: "traveller_class",
            reason: format!("'{value}' is not ECONOMY, BUSINESS or FIRST"),
        })?,
    };
    let dob = required_text(args, &["dob"])?;
    date_arg(&dob, "dob")?;

    let passenger = Passenger {
        first_name: required_text(args, &["first_name", "firstName"])?,
        last_name: required_text(args, &["last_name", "lastName"])?,
        dob,
        traveller_class,
    };

    let user_id = match lookup(args, &["user_id", "userId"]) {
        None => DEFAULT_TOOL_USER_ID,
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
            .ok_or_else(|| ToolError::InvalidArgument {
                name: "user_id",
                reason: format!("expected a positive integer, got {value}"),
            })?,
    };

    Ok(OnewayBookingRequest::new(
        user_id,
        &offer_id,
        &depart_date,
        passenger,
    ))
}
