use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::booking::{resolve_for_booking, BookingDetail, BookingRecord, BookingStatus, PaymentStatus};
use crate::flight::FlightRecord;
use crate::schedule::{next_operating_date, operates_on, resolve_timestamps, FlightSchedule, ResolvedTimes};
use crate::CoreResult;

const TIME_FORMAT: &str = "%d %b %Y %H:%M";

fn format_duration((hours, minutes): (i64, i64)) -> String {
    format!("{}h {}m", hours, minutes)
}

/// Printable booking ticket.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub pnr: String,
    pub booking_id: i64,
    pub flight_number: String,
    pub route: String,
    pub airline: Option<String>,
    pub schedule: String,
    /// `None` when a recurring booking carries no travel date.
    pub times: Option<ResolvedTimes>,
    pub passengers_count: u32,
    pub total_amount: f64,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub booked_on: NaiveDateTime,
}

impl Ticket {
    pub fn from_detail(detail: &BookingDetail) -> CoreResult<Self> {
        let schedule = detail.flight.schedule()?;
        let times = resolve_for_booking(&schedule, &detail.booking);

        Ok(Self {
            pnr: detail.booking.pnr_number.clone(),
            booking_id: detail.booking.booking_id,
            flight_number: detail.flight.flight_number.clone(),
            route: detail.flight.route(),
            airline: detail.airline.as_ref().map(|a| match &a.airline_code {
                Some(code) => format!("{} ({})", a.airline_name, code),
                None => a.airline_name.clone(),
            }),
            schedule: schedule.describe(),
            times,
            passengers_count: detail.booking.passengers_count,
            total_amount: detail.booking.total_amount,
            booking_status: detail.booking.booking_status,
            payment_status: detail.booking.payment_status,
            booked_on: detail.booking.booking_date,
        })
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PNR {}  (booking #{})", self.pnr, self.booking_id)?;
        writeln!(f, "Flight     {}  [{}]", self.flight_number, self.schedule)?;
        if let Some(airline) = &self.airline {
            writeln!(f, "Airline    {}", airline)?;
        }
        writeln!(f, "Route      {}", self.route)?;
        match &self.times {
            Some(times) => {
                writeln!(f, "Departure  {}", times.departure.format(TIME_FORMAT))?;
                writeln!(f, "Arrival    {}", times.arrival.format(TIME_FORMAT))?;
                writeln!(f, "Duration   {}", format_duration(times.duration()))?;
            }
            None => writeln!(f, "Departure  -  (no travel date on record)")?,
        }
        writeln!(
            f,
            "Passengers {}  (names collected at check-in)",
            self.passengers_count
        )?;
        writeln!(f, "Fare       {:.2}", self.total_amount)?;
        writeln!(f, "Booked on  {}", self.booked_on.format("%d %b %Y"))?;
        write!(f, "Status     {} / payment {}", self.booking_status, self.payment_status)
    }
}

// ============================================================================
// Listings
// ============================================================================

/// One row of a flight table. Recurring flights are shown for their next
/// bookable date.
#[derive(Debug, Clone, Serialize)]
pub struct FlightListing {
    pub flight_id: i64,
    pub flight_number: String,
    pub route: String,
    pub schedule: String,
    pub date: Option<NaiveDate>,
    pub times: Option<ResolvedTimes>,
    pub available_seats: u32,
    pub price: f64,
}

impl FlightListing {
    pub fn from_record(record: &FlightRecord, today: NaiveDate) -> CoreResult<Self> {
        let schedule = record.schedule()?;
        let date = match schedule.flight_date() {
            Some(date) => Some(date),
            None => next_operating_date(&schedule, today),
        };
        Ok(Self::build(record, &schedule, date))
    }

    /// Row for a search on `date`, or `None` when the flight does not
    /// operate that day.
    pub fn on_date(record: &FlightRecord, date: NaiveDate) -> CoreResult<Option<Self>> {
        let schedule = record.schedule()?;
        if !operates_on(&schedule, date) {
            return Ok(None);
        }
        Ok(Some(Self::build(record, &schedule, Some(date))))
    }

    fn build(record: &FlightRecord, schedule: &FlightSchedule, date: Option<NaiveDate>) -> Self {
        Self {
            flight_id: record.flight_id,
            flight_number: record.flight_number.clone(),
            route: record.route(),
            schedule: schedule.describe(),
            date,
            times: date.map(|d| resolve_timestamps(schedule, d)),
            available_seats: record.available_seats,
            price: record.price,
        }
    }
}

pub fn render_flight_table(rows: &[FlightListing]) -> String {
    if rows.is_empty() {
        return "No flights found.".to_string();
    }

    let mut out = format!(
        "{:<6} {:<8} {:<28} {:<16} {:<18} {:<18} {:<8} {:>6} {:>10}\n",
        "ID", "FLIGHT", "ROUTE", "RUNS", "DEPARTS", "ARRIVES", "DURATION", "SEATS", "PRICE"
    );
    for row in rows {
        let (departs, arrives, duration) = match row.times {
            Some(t) => (
                t.departure.format(TIME_FORMAT).to_string(),
                t.arrival.format(TIME_FORMAT).to_string(),
                format_duration(t.duration()),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "{:<6} {:<8} {:<28} {:<16} {:<18} {:<18} {:<8} {:>6} {:>10.2}\n",
            row.flight_id,
            row.flight_number,
            row.route,
            row.schedule,
            departs,
            arrives,
            duration,
            row.available_seats,
            row.price
        ));
    }
    out
}

/// One row of a bookings table, joined with its flight when known.
#[derive(Debug, Clone, Serialize)]
pub struct BookingListing {
    pub booking_id: i64,
    pub pnr: String,
    pub flight: String,
    pub times: Option<ResolvedTimes>,
    pub passengers_count: u32,
    pub total_amount: f64,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
}

impl BookingListing {
    pub fn build(bookings: &[BookingRecord], flights: &[FlightRecord]) -> Vec<Self> {
        let by_id: HashMap<i64, &FlightRecord> = flights.iter().map(|f| (f.flight_id, f)).collect();

        bookings
            .iter()
            .map(|booking| {
                let flight = by_id.get(&booking.flight_id);
                let times = flight
                    .and_then(|f| f.schedule().ok())
                    .and_then(|schedule| resolve_for_booking(&schedule, booking));
                Self {
                    booking_id: booking.booking_id,
                    pnr: booking.pnr_number.clone(),
                    flight: flight
                        .map(|f| format!("{} {}", f.flight_number, f.route()))
                        .unwrap_or_else(|| format!("flight #{}", booking.flight_id)),
                    times,
                    passengers_count: booking.passengers_count,
                    total_amount: booking.total_amount,
                    booking_status: booking.booking_status,
                    payment_status: booking.payment_status,
                }
            })
            .collect()
    }
}

pub fn render_booking_table(rows: &[BookingListing]) -> String {
    if rows.is_empty() {
        return "No bookings yet.".to_string();
    }

    let mut out = format!(
        "{:<6} {:<12} {:<36} {:<18} {:<8} {:>4} {:>10} {:<10} {:<10}\n",
        "ID", "PNR", "FLIGHT", "DEPARTS", "DURATION", "PAX", "TOTAL", "STATUS", "PAYMENT"
    );
    for row in rows {
        let (departs, duration) = match row.times {
            Some(t) => (t.departure.format(TIME_FORMAT).to_string(), format_duration(t.duration())),
            None => ("-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "{:<6} {:<12} {:<36} {:<18} {:<8} {:>4} {:>10.2} {:<10} {:<10}\n",
            row.booking_id,
            row.pnr,
            row.flight,
            departs,
            duration,
            row.passengers_count,
            row.total_amount,
            row.booking_status.to_string(),
            row.payment_status.to_string()
        ));
    }
    out
}
