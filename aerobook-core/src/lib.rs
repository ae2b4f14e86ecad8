pub mod schedule;
pub mod clock;
pub mod flight;
pub mod booking;
pub mod identity;
pub mod ticket;
pub mod api;
mod wire;

pub use schedule::{FlightSchedule, Recurrence, ResolvedTimes, ValidationError, WeekdaySet};
pub use clock::ReferenceClock;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid weekday list: {0}")]
    InvalidWeekdays(String),
    #[error("Invalid time of day: {0}")]
    InvalidTimeOfDay(String),
    #[error("Inconsistent schedule: {0}")]
    InconsistentSchedule(String),
    #[error("Invalid UTC offset: {0} minutes")]
    InvalidOffset(i32),
    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
