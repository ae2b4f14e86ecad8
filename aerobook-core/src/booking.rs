use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::flight::FlightRecord;
use crate::schedule::{resolve_timestamps, BookingDateRequest, FlightSchedule, ResolvedTimes, ValidationError};
use crate::wire;
use crate::CoreResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Confirmed => "confirmed",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Upi,
    NetBanking,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::Upi => "upi",
            Self::NetBanking => "net_banking",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "credit_card" | "card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "upi" => Ok(Self::Upi),
            "net_banking" => Ok(Self::NetBanking),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// Body of `POST /bookings`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateBookingRequest {
    pub flight_id: i64,
    pub passengers_count: u32,
    pub payment_method: PaymentMethod,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "wire::travel_date"
    )]
    pub travel_date: Option<NaiveDate>,
}

/// A booking as listed by `/bookings` and `/admin/bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: i64,
    pub user_id: i64,
    pub flight_id: i64,
    #[serde(deserialize_with = "wire::datetime::deserialize")]
    pub booking_date: NaiveDateTime,
    #[serde(default, deserialize_with = "wire::option_datetime::deserialize")]
    pub travel_date: Option<NaiveDateTime>,
    pub passengers_count: u32,
    pub total_amount: f64,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub pnr_number: String,
}

impl BookingRecord {
    pub fn travel_day(&self) -> Option<NaiveDate> {
        self.travel_date.map(|dt| dt.date())
    }

    pub fn is_cancelled(&self) -> bool {
        self.booking_status == BookingStatus::Cancelled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlineInfo {
    pub airline_id: i64,
    pub airline_name: String,
    #[serde(default)]
    pub airline_code: Option<String>,
}

/// `GET /bookings/{id}`: the booking with its flight and airline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: BookingRecord,
    pub flight: FlightRecord,
    #[serde(default)]
    pub airline: Option<AirlineInfo>,
}

impl BookingDetail {
    /// Departure and arrival for the date this booking travels on, or `None`
    /// for a recurring booking that carries no travel date.
    pub fn resolved_times(&self) -> CoreResult<Option<ResolvedTimes>> {
        let schedule = self.flight.schedule()?;
        Ok(resolve_for_booking(&schedule, &self.booking))
    }
}

/// Times of a booking's trip. One-time flights use their own date; a
/// recurring booking without a travel date has no known trip.
pub(crate) fn resolve_for_booking(schedule: &FlightSchedule, booking: &BookingRecord) -> Option<ResolvedTimes> {
    booking
        .travel_day()
        .or_else(|| schedule.flight_date())
        .map(|date| resolve_timestamps(schedule, date))
}

/// `DELETE /bookings/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationReceipt {
    pub message: String,
    pub booking_id: i64,
    pub refund_amount: f64,
}

// ============================================================================
// Client-side booking form
// ============================================================================

#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub flight_id: i64,
    pub price: f64,
    pub available_seats: u32,
    pub schedule: FlightSchedule,
    pub passengers_count: u32,
    pub payment_method: PaymentMethod,
    pub travel_date: Option<NaiveDate>,
}

/// A draft that passed local checks, ready to send.
#[derive(Debug, Clone)]
pub struct ValidatedBooking {
    pub request: CreateBookingRequest,
    pub times: ResolvedTimes,
    pub total_amount: f64,
}

impl BookingDraft {
    pub fn new(
        flight: &FlightRecord,
        passengers_count: u32,
        payment_method: PaymentMethod,
        travel_date: Option<NaiveDate>,
    ) -> CoreResult<Self> {
        Ok(Self {
            flight_id: flight.flight_id,
            price: flight.price,
            available_seats: flight.available_seats,
            schedule: flight.schedule()?,
            passengers_count,
            payment_method,
            travel_date,
        })
    }

    pub fn validate(&self, today: NaiveDate) -> Result<ValidatedBooking, ValidationError> {
        if self.passengers_count == 0 {
            return Err(ValidationError::InvalidPassengerCount);
        }
        if self.passengers_count > self.available_seats {
            return Err(ValidationError::InsufficientSeats {
                requested: self.passengers_count,
                available: self.available_seats,
            });
        }

        let date_request = BookingDateRequest::new(self.schedule.clone(), self.travel_date);
        let times = date_request.resolve(today)?;

        let travel_date = if self.schedule.is_recurring() {
            Some(date_request.travel_date()?)
        } else {
            None
        };

        Ok(ValidatedBooking {
            request: CreateBookingRequest {
                flight_id: self.flight_id,
                passengers_count: self.passengers_count,
                payment_method: self.payment_method,
                travel_date,
            },
            times,
            total_amount: quote_total(self.price, self.passengers_count),
        })
    }
}

/// Fare for a party, rounded to the cent.
pub fn quote_total(price: f64, passengers_count: u32) -> f64 {
    (price * passengers_count as f64 * 100.0).round() / 100.0
}

/// Whether a booking may still be cancelled. Travel on or before `today`
/// is no longer cancellable.
pub fn cancellation_check(
    booking: &BookingRecord,
    flight: Option<&FlightRecord>,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if booking.is_cancelled() {
        return Err(ValidationError::NotCancellable("booking is already cancelled".to_string()));
    }

    let travel_day = booking
        .travel_day()
        .or_else(|| flight.map(|f| f.departure_time.date()));

    match travel_day {
        Some(day) if day <= today => Err(ValidationError::NotCancellable(format!(
            "travel date {} is today or in the past",
            day
        ))),
        _ => Ok(()),
    }
}
