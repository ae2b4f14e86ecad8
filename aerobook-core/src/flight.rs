use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schedule::{resolve_timestamps, FlightSchedule, ValidationError};
use crate::wire;
use crate::{CoreError, CoreResult};

/// A flight as the backend returns it from `/flights`, `/admin/flights` and
/// nested in booking detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_id: i64,
    pub flight_number: String,
    pub airline_id: i64,
    pub source_city: String,
    pub destination_city: String,
    #[serde(deserialize_with = "wire::datetime::deserialize")]
    pub departure_time: NaiveDateTime,
    #[serde(deserialize_with = "wire::datetime::deserialize")]
    pub arrival_time: NaiveDateTime,
    pub total_seats: u32,
    #[serde(default)]
    pub available_seats: u32,
    pub price: f64,
    #[serde(default)]
    pub is_daily: Option<bool>,
    /// Comma-separated weekday indices (0 = Monday); absent means every day.
    #[serde(default)]
    pub weekdays: Option<String>,
    #[serde(default)]
    pub departure_time_only: Option<String>,
    #[serde(default)]
    pub arrival_time_only: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default = "default_flight_status")]
    pub flight_status: String,
    #[serde(default, deserialize_with = "wire::option_datetime::deserialize")]
    pub created_at: Option<NaiveDateTime>,
}

fn default_flight_status() -> String {
    "scheduled".to_string()
}

impl FlightRecord {
    /// Builds the tagged schedule from the loose wire fields. This is the
    /// only place where `is_daily` and `weekdays` are interpreted.
    pub fn schedule(&self) -> CoreResult<FlightSchedule> {
        if !self.is_daily.unwrap_or(false) {
            if self.weekdays.as_deref().is_some_and(|w| !w.trim().is_empty()) {
                tracing::debug!(
                    "Flight {} lists weekdays but is not recurring; treating as one-time",
                    self.flight_number
                );
            }
            return Ok(FlightSchedule::one_time(self.departure_time, self.arrival_time));
        }

        let departure = time_of_day(self.departure_time_only.as_deref(), self.departure_time)?;
        let arrival = time_of_day(self.arrival_time_only.as_deref(), self.arrival_time)?;

        match self.weekdays.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            None => Ok(FlightSchedule::daily(departure, arrival)),
            Some(list) => FlightSchedule::on_weekdays(list.parse()?, departure, arrival),
        }
    }

    pub fn route(&self) -> String {
        format!("{} → {}", self.source_city, self.destination_city)
    }

    pub fn is_bookable(&self) -> bool {
        self.available_seats > 0 && self.flight_status.eq_ignore_ascii_case("scheduled")
    }
}

fn time_of_day(explicit: Option<&str>, fallback: NaiveDateTime) -> CoreResult<NaiveTime> {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => wire::parse_time_of_day(raw)
            .ok_or_else(|| CoreError::InvalidTimeOfDay(raw.to_string())),
        None => Ok(fallback.time()),
    }
}

/// Query for `GET /flights`; unset fields are left out of the query string.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlightSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// `GET /cities`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityDirectory {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

/// `GET /airlines`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlineSummary {
    pub airline_id: i64,
    pub airline_name: String,
}

// ============================================================================
// Admin flight creation
// ============================================================================

/// Flight as entered on the admin form.
#[derive(Debug, Clone)]
pub struct NewFlight {
    pub flight_number: String,
    pub airline_id: i64,
    pub source_city: String,
    pub destination_city: String,
    pub schedule: FlightSchedule,
    pub total_seats: u32,
    pub price: f64,
}

/// Body of `POST /flights`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateFlightRequest {
    pub flight_number: String,
    pub airline_id: i64,
    pub source_city: String,
    pub destination_city: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub total_seats: u32,
    pub price: f64,
    pub is_daily: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time_only: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time_only: Option<String>,
}

impl NewFlight {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: &str| Err(ValidationError::InvalidFlight(msg.to_string()));

        if self.flight_number.trim().is_empty() {
            return invalid("flight number is required");
        }
        if self.source_city.trim().is_empty() || self.destination_city.trim().is_empty() {
            return invalid("source and destination cities are required");
        }
        if self.source_city.trim().eq_ignore_ascii_case(self.destination_city.trim()) {
            return invalid("source and destination must differ");
        }
        if self.total_seats == 0 {
            return invalid("total seats must be positive");
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return invalid("price must be zero or more");
        }
        match &self.schedule {
            FlightSchedule::OneTime { departure, arrival } if arrival <= departure => {
                invalid("arrival must be after departure")
            }
            s if s.is_recurring() && s.departure_time_of_day() == s.arrival_time_of_day() => {
                invalid("arrival time equals departure time")
            }
            _ => Ok(()),
        }
    }

    /// Request body for the backend. Recurring flights are anchored on
    /// `today`, with overnight arrivals placed on the following day so the
    /// backend derives a positive duration.
    pub fn to_request(&self, today: NaiveDate) -> Result<CreateFlightRequest, ValidationError> {
        self.validate()?;

        let times = resolve_timestamps(&self.schedule, today);
        let (weekdays, departure_time_only, arrival_time_only) = match &self.schedule {
            FlightSchedule::OneTime { .. } => (None, None, None),
            FlightSchedule::Daily { departure, arrival } => {
                (None, Some(hms(*departure)), Some(hms(*arrival)))
            }
            FlightSchedule::Weekdays { days, departure, arrival } => {
                (Some(days.to_string()), Some(hms(*departure)), Some(hms(*arrival)))
            }
        };

        Ok(CreateFlightRequest {
            flight_number: self.flight_number.trim().to_uppercase(),
            airline_id: self.airline_id,
            source_city: self.source_city.trim().to_string(),
            destination_city: self.destination_city.trim().to_string(),
            departure_time: times.departure,
            arrival_time: times.arrival,
            total_seats: self.total_seats,
            price: self.price,
            is_daily: self.schedule.is_recurring(),
            weekdays,
            departure_time_only,
            arrival_time_only,
        })
    }
}

fn hms(t: NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}
