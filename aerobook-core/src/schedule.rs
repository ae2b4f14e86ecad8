use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::{CoreError, CoreResult};

// ============================================================================
// Weekday indices (Monday = 0 .. Sunday = 6)
// ============================================================================

/// Remaps a Sunday-first day number (Sunday = 0, as produced by most
/// calendar APIs) onto the Monday-first index used everywhere in this crate.
pub fn weekday_index_from_sunday_first(native: u8) -> u8 {
    (native % 7 + 6) % 7
}

/// Monday-first weekday index of a calendar date.
pub fn weekday_index(date: NaiveDate) -> u8 {
    weekday_index_from_sunday_first(date.weekday().num_days_from_sunday() as u8)
}

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub fn weekday_name(index: u8) -> &'static str {
    WEEKDAY_NAMES[(index % 7) as usize]
}

/// Set of weekday indices, stored as a 7-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const ALL: WeekdaySet = WeekdaySet(0b0111_1111);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_indices<I>(indices: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut set = Self::empty();
        for index in indices {
            set.insert(index)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, index: u8) -> CoreResult<()> {
        if index > 6 {
            return Err(CoreError::InvalidWeekdays(format!(
                "weekday index {} is outside 0..6",
                index
            )));
        }
        self.0 |= 1 << index;
        Ok(())
    }

    pub fn contains(&self, index: u8) -> bool {
        index <= 6 && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..7u8).filter(move |i| self.contains(*i))
    }

    /// Human-readable form, e.g. `Mon, Wed, Fri`.
    pub fn describe(&self) -> String {
        self.iter().map(weekday_name).collect::<Vec<_>>().join(", ")
    }
}

/// Parses the wire form: comma-separated indices such as `"0,2,4"`.
/// Whitespace around entries is tolerated and blank input yields an empty set.
impl FromStr for WeekdaySet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let index: u8 = part
                .parse()
                .map_err(|_| CoreError::InvalidWeekdays(format!("'{}' is not a weekday index", part)))?;
            set.insert(index)?;
        }
        Ok(set)
    }
}

/// Renders the wire form, ascending: `"0,2,4"`.
impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

// ============================================================================
// Flight schedule
// ============================================================================

/// Recurrence descriptor of a flight. Exactly one applies to any flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "weekdays", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    OneTime,
    Daily,
    Weekdays(WeekdaySet),
}

/// When a flight operates. One-time flights carry absolute timestamps,
/// recurring flights carry wall-clock times of day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightSchedule {
    OneTime {
        departure: NaiveDateTime,
        arrival: NaiveDateTime,
    },
    Daily {
        departure: NaiveTime,
        arrival: NaiveTime,
    },
    Weekdays {
        days: WeekdaySet,
        departure: NaiveTime,
        arrival: NaiveTime,
    },
}

impl FlightSchedule {
    pub fn one_time(departure: NaiveDateTime, arrival: NaiveDateTime) -> Self {
        Self::OneTime { departure, arrival }
    }

    pub fn daily(departure: NaiveTime, arrival: NaiveTime) -> Self {
        Self::Daily { departure, arrival }
    }

    pub fn on_weekdays(days: WeekdaySet, departure: NaiveTime, arrival: NaiveTime) -> CoreResult<Self> {
        if days.is_empty() {
            return Err(CoreError::InconsistentSchedule(
                "a weekday schedule needs at least one weekday".to_string(),
            ));
        }
        Ok(Self::Weekdays { days, departure, arrival })
    }

    pub fn recurrence(&self) -> Recurrence {
        match self {
            Self::OneTime { .. } => Recurrence::OneTime,
            Self::Daily { .. } => Recurrence::Daily,
            Self::Weekdays { days, .. } => Recurrence::Weekdays(*days),
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::OneTime { .. })
    }

    pub fn departure_time_of_day(&self) -> NaiveTime {
        match self {
            Self::OneTime { departure, .. } => departure.time(),
            Self::Daily { departure, .. } | Self::Weekdays { departure, .. } => *departure,
        }
    }

    pub fn arrival_time_of_day(&self) -> NaiveTime {
        match self {
            Self::OneTime { arrival, .. } => arrival.time(),
            Self::Daily { arrival, .. } | Self::Weekdays { arrival, .. } => *arrival,
        }
    }

    /// Calendar date of a one-time flight; `None` for recurring flights.
    pub fn flight_date(&self) -> Option<NaiveDate> {
        match self {
            Self::OneTime { departure, .. } => Some(departure.date()),
            _ => None,
        }
    }

    /// Short label for listings: `one-time`, `daily`, `Mon, Fri`.
    pub fn describe(&self) -> String {
        match self {
            Self::OneTime { .. } => "one-time".to_string(),
            Self::Daily { .. } => "daily".to_string(),
            Self::Weekdays { days, .. } => days.describe(),
        }
    }
}

/// Concrete departure/arrival of a flight on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedTimes {
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
}

impl ResolvedTimes {
    pub fn duration(&self) -> (i64, i64) {
        compute_duration(self.departure, self.arrival)
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub fn operates_on(schedule: &FlightSchedule, date: NaiveDate) -> bool {
    match schedule {
        FlightSchedule::OneTime { departure, .. } => departure.date() == date,
        FlightSchedule::Daily { .. } => true,
        FlightSchedule::Weekdays { days, .. } => days.contains(weekday_index(date)),
    }
}

/// Concrete timestamps for a booking on `date`. One-time flights ignore
/// `date`. For recurring flights an arrival at or before the departure is
/// an overnight flight and lands the next day.
pub fn resolve_timestamps(schedule: &FlightSchedule, date: NaiveDate) -> ResolvedTimes {
    match schedule {
        FlightSchedule::OneTime { departure, arrival } => ResolvedTimes {
            departure: *departure,
            arrival: *arrival,
        },
        FlightSchedule::Daily { departure, arrival }
        | FlightSchedule::Weekdays { departure, arrival, .. } => {
            let departure = date.and_time(*departure);
            let mut arrival = date.and_time(*arrival);
            if arrival <= departure {
                arrival += Duration::days(1);
            }
            ResolvedTimes { departure, arrival }
        }
    }
}

/// Checks that a flight can be booked for `date`, given the current date in
/// the reference time zone. Recurring flights must be booked from tomorrow
/// on; one-time flights only reject dates already in the past.
pub fn validate_booking_date(
    schedule: &FlightSchedule,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    let too_early = if schedule.is_recurring() {
        date <= today
    } else {
        date < today
    };
    if too_early {
        return Err(ValidationError::InvalidDate { date, today });
    }

    if !operates_on(schedule, date) {
        return Err(ValidationError::ScheduleMismatch {
            date,
            weekday: weekday_name(weekday_index(date)),
        });
    }

    Ok(())
}

/// Whole hours and remaining minutes between two instants, never negative.
pub fn compute_duration(departure: NaiveDateTime, arrival: NaiveDateTime) -> (i64, i64) {
    let minutes = (arrival - departure).num_minutes().max(0);
    (minutes / 60, minutes % 60)
}

/// First operating date strictly after `after`.
pub fn next_operating_date(schedule: &FlightSchedule, after: NaiveDate) -> Option<NaiveDate> {
    match schedule {
        FlightSchedule::OneTime { departure, .. } => {
            let date = departure.date();
            (date > after).then_some(date)
        }
        _ => (1..=7)
            .map(|offset| after + Duration::days(offset))
            .find(|date| operates_on(schedule, *date)),
    }
}

/// Up to `count` operating dates starting at `from` (inclusive).
pub fn upcoming_dates(schedule: &FlightSchedule, from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    if let Some(date) = schedule.flight_date() {
        return if date >= from && count > 0 { vec![date] } else { Vec::new() };
    }

    let mut dates = Vec::with_capacity(count);
    let mut cursor = from;
    // A non-empty weekday set always hits within a week; guard against an empty one.
    let limit = from + Duration::days(7 * count.max(1) as i64);
    while dates.len() < count && cursor < limit {
        if operates_on(schedule, cursor) {
            dates.push(cursor);
        }
        cursor += Duration::days(1);
    }
    dates
}

// ============================================================================
// Booking date request
// ============================================================================

/// A booking's date, checked against the flight before any request is sent.
#[derive(Debug, Clone)]
pub struct BookingDateRequest {
    pub flight: FlightSchedule,
    pub requested_date: Option<NaiveDate>,
}

impl BookingDateRequest {
    pub fn new(flight: FlightSchedule, requested_date: Option<NaiveDate>) -> Self {
        Self { flight, requested_date }
    }

    /// The date the booking is for: the requested one, or the flight's own
    /// date for one-time flights.
    pub fn travel_date(&self) -> Result<NaiveDate, ValidationError> {
        self.requested_date
            .or_else(|| self.flight.flight_date())
            .ok_or(ValidationError::MissingTravelDate)
    }

    pub fn resolve(&self, today: NaiveDate) -> Result<ResolvedTimes, ValidationError> {
        let date = self.travel_date()?;
        validate_booking_date(&self.flight, date, today)?;
        Ok(resolve_timestamps(&self.flight, date))
    }
}

// ============================================================================
// Validation errors
// ============================================================================

/// Local validation failures. These are reported before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Travel date {date} is not bookable (today is {today})")]
    InvalidDate { date: NaiveDate, today: NaiveDate },

    #[error("Flight does not operate on {date} ({weekday})")]
    ScheduleMismatch { date: NaiveDate, weekday: &'static str },

    #[error("A travel date is required for recurring flights")]
    MissingTravelDate,

    #[error("Passenger count must be at least 1")]
    InvalidPassengerCount,

    #[error("Not enough seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("Invalid flight: {0}")]
    InvalidFlight(String),

    #[error("Booking cannot be cancelled: {0}")]
    NotCancellable(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDate { .. } => "INVALID_DATE",
            Self::ScheduleMismatch { .. } => "SCHEDULE_MISMATCH",
            Self::MissingTravelDate => "MISSING_TRAVEL_DATE",
            Self::InvalidPassengerCount => "INVALID_PASSENGER_COUNT",
            Self::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            Self::InvalidFlight(_) => "INVALID_FLIGHT",
            Self::NotCancellable(_) => "NOT_CANCELLABLE",
        }
    }
}
