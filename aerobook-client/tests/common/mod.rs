//! In-process stand-in for the booking backend, served on a random port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use aerobook_client::commands::Context;
use aerobook_client::ApiClient;
use aerobook_core::booking::PaymentMethod;
use aerobook_core::ReferenceClock;
use aerobook_store::{MemorySessionStore, Session, SessionStore};
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SECRET: &str = "stub-signing-secret";
const TS: &str = "%Y-%m-%dT%H:%M:%S";

pub const ONE_TIME_FLIGHT: i64 = 1;
pub const DAILY_FLIGHT: i64 = 2;
pub const WEEKDAY_FLIGHT: i64 = 3;
pub const SOLD_OUT_FLIGHT: i64 = 4;

/// Daily-flight booking travelling in five days.
pub const FUTURE_BOOKING: i64 = 1;
/// Daily-flight booking travelling today.
pub const TODAY_BOOKING: i64 = 2;
pub const CANCELLED_BOOKING: i64 = 3;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_type: String,
    pub user_id: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub fn today() -> NaiveDate {
    ReferenceClock::utc().today()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn ts(dt: NaiveDateTime) -> String {
    dt.format(TS).to_string()
}

pub fn sign_token(username: &str, user_type: &str, user_id: i64, expires_in: Duration, secret: &str) -> String {
    let claims = Claims {
        sub: username.to_string(),
        user_type: user_type.to_string(),
        user_id,
        exp: (Utc::now() + expires_in).timestamp(),
        token_type: "access".to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

pub fn user_session() -> Session {
    session_for("meera", 8, "user")
}

pub fn admin_session() -> Session {
    session_for("ops", 1, "admin")
}

fn session_for(username: &str, user_id: i64, user_type: &str) -> Session {
    serde_json::from_value(json!({
        "token": sign_token(username, user_type, user_id, Duration::minutes(30), SECRET),
        "username": username,
        "user_type": user_type,
        "user_id": user_id,
    }))
    .unwrap()
}

// ============================================================================
// Stub state
// ============================================================================

#[derive(Default)]
pub struct Inner {
    pub flights: Vec<Value>,
    pub bookings: Vec<Value>,
    pub usernames: Vec<String>,
    pub last_booking_body: Option<Value>,
    pub last_flight_body: Option<Value>,
    hits: HashMap<&'static str, usize>,
}

#[derive(Clone, Default)]
pub struct StubState {
    pub inner: Arc<Mutex<Inner>>,
}

impl StubState {
    fn seeded() -> Self {
        let t = today();
        let one_time_day = days_from_today(3);
        let flights = vec![
            json!({
                "flight_id": ONE_TIME_FLIGHT, "flight_number": "AI202", "airline_id": 1,
                "source_city": "Delhi", "destination_city": "Mumbai",
                "departure_time": ts(at(one_time_day, 9, 15)), "arrival_time": ts(at(one_time_day, 11, 30)),
                "total_seats": 180, "available_seats": 50, "price": 4500.0,
                "is_daily": false, "weekdays": null,
                "flight_status": "scheduled",
            }),
            json!({
                "flight_id": DAILY_FLIGHT, "flight_number": "6E501", "airline_id": 2,
                "source_city": "Bengaluru", "destination_city": "Goa",
                "departure_time": ts(at(t, 23, 30)), "arrival_time": ts(at(t + Duration::days(1), 1, 0)),
                "total_seats": 120, "available_seats": 40, "price": 3200.0,
                "is_daily": true, "weekdays": null,
                "departure_time_only": "23:30:00", "arrival_time_only": "01:00:00",
                "duration_minutes": 90, "flight_status": "scheduled",
            }),
            json!({
                "flight_id": WEEKDAY_FLIGHT, "flight_number": "UK811", "airline_id": 3,
                "source_city": "Mumbai", "destination_city": "Delhi",
                "departure_time": ts(at(t, 6, 0)), "arrival_time": ts(at(t, 8, 10)),
                "total_seats": 150, "available_seats": 3, "price": 5100.0,
                "is_daily": true, "weekdays": "0,2,4",
                "departure_time_only": "06:00:00", "arrival_time_only": "08:10:00",
                "flight_status": "scheduled",
            }),
            json!({
                "flight_id": SOLD_OUT_FLIGHT, "flight_number": "SG100", "airline_id": 4,
                "source_city": "Chennai", "destination_city": "Kolkata",
                "departure_time": ts(at(one_time_day, 14, 0)), "arrival_time": ts(at(one_time_day, 16, 20)),
                "total_seats": 90, "available_seats": 0, "price": 3900.0,
                "is_daily": false, "flight_status": "scheduled",
            }),
        ];

        let booked_on = ts(at(t - Duration::days(2), 10, 0));
        let bookings = vec![
            json!({
                "booking_id": FUTURE_BOOKING, "user_id": 8, "flight_id": DAILY_FLIGHT,
                "booking_date": booked_on, "travel_date": ts(at(days_from_today(5), 0, 0)),
                "passengers_count": 2, "total_amount": 6400.0,
                "booking_status": "confirmed", "payment_status": "completed", "pnr_number": "PNR0001",
            }),
            json!({
                "booking_id": TODAY_BOOKING, "user_id": 8, "flight_id": DAILY_FLIGHT,
                "booking_date": booked_on, "travel_date": ts(at(t, 0, 0)),
                "passengers_count": 1, "total_amount": 3200.0,
                "booking_status": "confirmed", "payment_status": "completed", "pnr_number": "PNR0002",
            }),
            json!({
                "booking_id": CANCELLED_BOOKING, "user_id": 8, "flight_id": ONE_TIME_FLIGHT,
                "booking_date": booked_on, "travel_date": null,
                "passengers_count": 1, "total_amount": 4500.0,
                "booking_status": "cancelled", "payment_status": "refunded", "pnr_number": "PNR0003",
            }),
        ];

        Self {
            inner: Arc::new(Mutex::new(Inner {
                flights,
                bookings,
                usernames: vec!["meera".to_string(), "ops".to_string()],
                ..Default::default()
            })),
        }
    }

    fn hit(&self, route: &'static str) {
        *self.inner.lock().unwrap().hits.entry(route).or_default() += 1;
    }

    /// Number of requests the named route has received.
    pub fn hits(&self, route: &'static str) -> usize {
        self.inner.lock().unwrap().hits.get(route).copied().unwrap_or(0)
    }

    pub fn last_booking_body(&self) -> Option<Value> {
        self.inner.lock().unwrap().last_booking_body.clone()
    }

    pub fn last_flight_body(&self) -> Option<Value> {
        self.inner.lock().unwrap().last_flight_body.clone()
    }
}

// ============================================================================
// Handlers
// ============================================================================

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

fn authenticate(headers: &HeaderMap) -> Result<Claims, (StatusCode, Json<Value>)> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Not authenticated"))?;

    decode::<Claims>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

fn require_admin(headers: &HeaderMap) -> Result<Claims, (StatusCode, Json<Value>)> {
    let claims = authenticate(headers)?;
    if claims.user_type != "admin" {
        return Err(reject(StatusCode::FORBIDDEN, "Admin access required"));
    }
    Ok(claims)
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<StubState>, Json(body): Json<LoginBody>) -> Reply {
    state.hit("login");
    let (user_type, user_id) = match (body.username.as_str(), body.password.as_str()) {
        ("meera", "secret") => ("user", 8),
        ("ops", "admin-pass") => ("admin", 1),
        _ => return Err(reject(StatusCode::UNAUTHORIZED, "Incorrect username or password")),
    };
    Ok(Json(json!({
        "access_token": sign_token(&body.username, user_type, user_id, Duration::minutes(30), SECRET),
        "token_type": "bearer",
        "user_type": user_type,
        "user_id": user_id,
    })))
}

async fn register(State(state): State<StubState>, Json(body): Json<Value>) -> Reply {
    state.hit("register");
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let mut inner = state.inner.lock().unwrap();
    if inner.usernames.contains(&username) {
        return Err(reject(StatusCode::BAD_REQUEST, "Username already registered"));
    }
    inner.usernames.push(username.clone());
    Ok(Json(json!({
        "user_id": 100 + inner.usernames.len() as i64,
        "username": username,
        "email": body["email"],
        "first_name": body["first_name"],
        "last_name": body["last_name"],
        "user_type": body.get("user_type").cloned().unwrap_or(json!("user")),
        "is_active": true,
    })))
}

#[derive(Deserialize)]
struct SearchParams {
    source: Option<String>,
    destination: Option<String>,
}

async fn search_flights(State(state): State<StubState>, Query(params): Query<SearchParams>) -> Reply {
    state.hit("search_flights");
    let inner = state.inner.lock().unwrap();
    let matches = |field: &Value, wanted: &Option<String>| match wanted {
        Some(w) => field.as_str().is_some_and(|f| f.eq_ignore_ascii_case(w)),
        None => true,
    };
    let flights: Vec<Value> = inner
        .flights
        .iter()
        .filter(|f| f["available_seats"].as_u64().unwrap_or(0) > 0)
        .filter(|f| matches(&f["source_city"], &params.source) && matches(&f["destination_city"], &params.destination))
        .cloned()
        .collect();
    Ok(Json(Value::Array(flights)))
}

async fn cities(State(state): State<StubState>) -> Reply {
    state.hit("cities");
    let inner = state.inner.lock().unwrap();
    let collect = |key: &str| {
        let mut names: Vec<String> = inner
            .flights
            .iter()
            .filter_map(|f| f[key].as_str().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    };
    Ok(Json(json!({ "sources": collect("source_city"), "destinations": collect("destination_city") })))
}

async fn airlines(State(state): State<StubState>) -> Reply {
    state.hit("airlines");
    Ok(Json(json!([
        { "airline_id": 1, "airline_name": "Air India" },
        { "airline_id": 2, "airline_name": "IndiGo" },
    ])))
}

async fn create_booking(State(state): State<StubState>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    state.hit("create_booking");
    let claims = authenticate(&headers)?;
    let mut inner = state.inner.lock().unwrap();
    inner.last_booking_body = Some(body.clone());

    let flight_id = body["flight_id"].as_i64().unwrap_or_default();
    let passengers = body["passengers_count"].as_u64().unwrap_or_default();
    let flight = inner
        .flights
        .iter_mut()
        .find(|f| f["flight_id"].as_i64() == Some(flight_id))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Flight not found"))?;

    let available = flight["available_seats"].as_u64().unwrap_or(0);
    if passengers > available {
        return Err(reject(StatusCode::BAD_REQUEST, "Not enough seats available"));
    }
    flight["available_seats"] = json!(available - passengers);
    let total = flight["price"].as_f64().unwrap_or(0.0) * passengers as f64;

    let booking_id = inner.bookings.len() as i64 + 1;
    let booking = json!({
        "booking_id": booking_id, "user_id": claims.user_id, "flight_id": flight_id,
        "booking_date": ts(Utc::now().naive_utc()), "travel_date": body.get("travel_date").cloned().unwrap_or(Value::Null),
        "passengers_count": passengers, "total_amount": total,
        "booking_status": "confirmed", "payment_status": "completed",
        "pnr_number": format!("PNR{:04}", booking_id),
    });
    inner.bookings.push(booking.clone());
    Ok(Json(booking))
}

async fn list_bookings(State(state): State<StubState>, headers: HeaderMap) -> Reply {
    state.hit("list_bookings");
    let claims = authenticate(&headers)?;
    let inner = state.inner.lock().unwrap();
    let mine: Vec<Value> = inner
        .bookings
        .iter()
        .filter(|b| b["user_id"].as_i64() == Some(claims.user_id))
        .cloned()
        .collect();
    Ok(Json(Value::Array(mine)))
}

async fn get_booking(State(state): State<StubState>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    state.hit("get_booking");
    let claims = authenticate(&headers)?;
    let inner = state.inner.lock().unwrap();
    let booking = inner
        .bookings
        .iter()
        .find(|b| b["booking_id"].as_i64() == Some(id) && b["user_id"].as_i64() == Some(claims.user_id))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Booking not found"))?;
    let flight = inner
        .flights
        .iter()
        .find(|f| f["flight_id"] == booking["flight_id"])
        .cloned()
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Flight not found"))?;

    let mut detail = booking.clone();
    detail["flight"] = flight;
    detail["airline"] = json!({ "airline_id": 2, "airline_name": "IndiGo", "airline_code": "6E" });
    Ok(Json(detail))
}

async fn cancel_booking(State(state): State<StubState>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    state.hit("cancel_booking");
    let claims = authenticate(&headers)?;
    let mut inner = state.inner.lock().unwrap();
    let booking = inner
        .bookings
        .iter_mut()
        .find(|b| b["booking_id"].as_i64() == Some(id) && b["user_id"].as_i64() == Some(claims.user_id))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Booking not found"))?;
    if booking["booking_status"] == "cancelled" {
        return Err(reject(StatusCode::BAD_REQUEST, "Booking already cancelled"));
    }
    booking["booking_status"] = json!("cancelled");
    booking["payment_status"] = json!("refunded");
    Ok(Json(json!({
        "message": "Booking cancelled successfully",
        "booking_id": id,
        "refund_amount": booking["total_amount"],
    })))
}

async fn admin_list_flights(State(state): State<StubState>, headers: HeaderMap) -> Reply {
    state.hit("admin_list_flights");
    require_admin(&headers)?;
    Ok(Json(Value::Array(state.inner.lock().unwrap().flights.clone())))
}

async fn admin_create_flight(State(state): State<StubState>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    state.hit("admin_create_flight");
    require_admin(&headers)?;
    let mut inner = state.inner.lock().unwrap();
    inner.last_flight_body = Some(body.clone());

    let flight_id = inner
        .flights
        .iter()
        .filter_map(|f| f["flight_id"].as_i64())
        .max()
        .unwrap_or(0)
        + 1;
    let mut flight = body;
    flight["flight_id"] = json!(flight_id);
    flight["available_seats"] = flight["total_seats"].clone();
    flight["flight_status"] = json!("scheduled");
    inner.flights.push(flight.clone());
    Ok(Json(flight))
}

async fn admin_delete_flight(State(state): State<StubState>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    state.hit("admin_delete_flight");
    require_admin(&headers)?;
    let mut inner = state.inner.lock().unwrap();
    let before = inner.flights.len();
    inner.flights.retain(|f| f["flight_id"].as_i64() != Some(id));
    if inner.flights.len() == before {
        return Err(reject(StatusCode::NOT_FOUND, "Flight not found"));
    }
    Ok(Json(json!({ "message": "Flight deleted successfully" })))
}

async fn admin_list_bookings(State(state): State<StubState>, headers: HeaderMap) -> Reply {
    state.hit("admin_list_bookings");
    require_admin(&headers)?;
    Ok(Json(Value::Array(state.inner.lock().unwrap().bookings.clone())))
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/flights", get(search_flights).post(admin_create_flight))
        .route("/cities", get(cities))
        .route("/airlines", get(airlines))
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking).delete(cancel_booking))
        .route("/admin/flights", get(admin_list_flights))
        .route("/admin/flights/{id}", delete(admin_delete_flight))
        .route("/admin/bookings", get(admin_list_bookings))
        .with_state(state)
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub addr: SocketAddr,
    pub stub: StubState,
    pub sessions: Arc<MemorySessionStore>,
    pub client: ApiClient,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    pub async fn start_with(session: Option<Session>) -> Self {
        let stub = StubState::seeded();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let sessions = Arc::new(match session {
            Some(s) => MemorySessionStore::with_session(s),
            None => MemorySessionStore::new(),
        });
        let client = ApiClient::new(
            &format!("http://{}", addr),
            std::time::Duration::from_secs(5),
            sessions.clone(),
        )
        .unwrap();

        Self {
            addr,
            stub,
            sessions,
            client,
        }
    }

    pub fn ctx(&self) -> Context<'_, ApiClient> {
        Context {
            backend: &self.client,
            sessions: self.sessions.as_ref(),
            clock: ReferenceClock::utc(),
            default_payment: PaymentMethod::CreditCard,
        }
    }

    pub async fn stored_session(&self) -> Option<Session> {
        self.sessions.load().await.unwrap()
    }
}
