//! Handlers behind each CLI command. They talk to any [`BookingBackend`]
//! and return the text to print.

use aerobook_core::api::BookingBackend;
use aerobook_core::booking::{cancellation_check, BookingDraft, BookingRecord, PaymentMethod, ValidatedBooking};
use aerobook_core::flight::{FlightRecord, FlightSearchQuery, NewFlight};
use aerobook_core::identity::{LoginRequest, RegisterRequest, SessionClaims};
use aerobook_core::schedule::{next_operating_date, upcoming_dates};
use aerobook_core::ticket::{render_booking_table, render_flight_table, BookingListing, FlightListing, Ticket};
use aerobook_core::{ReferenceClock, ValidationError};
use aerobook_store::{Session, SessionStore};
use anyhow::{anyhow, bail, Context as _};
use chrono::{DateTime, NaiveDate};
use tracing::{info, warn};

pub struct Context<'a, B> {
    pub backend: &'a B,
    pub sessions: &'a dyn SessionStore,
    pub clock: ReferenceClock,
    pub default_payment: PaymentMethod,
}

impl<'a, B: BookingBackend> Context<'a, B> {
    fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn require_admin(&self) -> anyhow::Result<Session> {
        let session = self
            .sessions
            .load()
            .await?
            .ok_or_else(|| anyhow!("Not logged in. Run `aerobook login` first"))?;
        if !session.is_admin() {
            bail!("Admin access required (logged in as {})", session.username);
        }
        Ok(session)
    }
}

// ============================================================================
// Authentication
// ============================================================================

pub async fn sign_in<B: BookingBackend>(
    ctx: &Context<'_, B>,
    username: &str,
    password: &str,
) -> anyhow::Result<Session> {
    let response = ctx
        .backend
        .login(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

    let session = Session {
        token: response.access_token,
        username: username.to_string(),
        user_type: response.user_type,
        user_id: response.user_id,
    };
    ctx.sessions.save(&session).await?;
    info!("Logged in as {} ({})", session.username, session.user_type);
    Ok(session)
}

pub async fn sign_out<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    let previous = ctx.sessions.load().await?;
    ctx.sessions.clear().await?;
    Ok(match previous {
        Some(session) => format!("Logged out {}.", session.username),
        None => "No active session.".to_string(),
    })
}

pub async fn whoami<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    let Some(session) = ctx.sessions.load().await? else {
        return Ok("Not logged in.".to_string());
    };

    let expiry = SessionClaims::peek(&session.token)
        .ok()
        .and_then(|claims| DateTime::from_timestamp(claims.exp, 0))
        .map(|exp| format!(", token valid until {}", ctx.clock.local(exp).format("%d %b %Y %H:%M")))
        .unwrap_or_default();

    Ok(format!(
        "{} (user #{}, {}){}",
        session.username, session.user_id, session.user_type, expiry
    ))
}

pub async fn register<B: BookingBackend>(
    ctx: &Context<'_, B>,
    request: &RegisterRequest,
) -> anyhow::Result<String> {
    request.validate().map_err(|e| anyhow!("Invalid registration: {}", e))?;
    let profile = ctx.backend.register(request).await?;
    Ok(format!(
        "Registered {} ({}) as user #{}. You can now log in.",
        profile.username, profile.user_type, profile.user_id
    ))
}

// ============================================================================
// Flights
// ============================================================================

pub async fn cities<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    let directory = ctx.backend.cities().await?;
    Ok(format!(
        "From: {}\nTo:   {}",
        directory.sources.join(", "),
        directory.destinations.join(", ")
    ))
}

pub async fn airlines<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    let airlines = ctx.backend.airlines().await?;
    Ok(airlines
        .iter()
        .map(|a| format!("{:>4}  {}", a.airline_id, a.airline_name))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Rows for a flight table. With `on` set, flights that do not operate that
/// day are dropped and the rest are shown for it.
fn listings(flights: &[FlightRecord], today: NaiveDate, on: Option<NaiveDate>) -> Vec<FlightListing> {
    flights
        .iter()
        .filter_map(|record| {
            let row = match on {
                Some(date) => FlightListing::on_date(record, date),
                None => FlightListing::from_record(record, today).map(Some),
            };
            match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping flight {}: {}", record.flight_number, e);
                    None
                }
            }
        })
        .collect()
}

pub async fn search<B: BookingBackend>(
    ctx: &Context<'_, B>,
    query: &FlightSearchQuery,
) -> anyhow::Result<String> {
    let flights = ctx.backend.search_flights(query).await?;
    let rows = listings(&flights, ctx.today(), query.date);
    info!("Search returned {} flights, {} listed", flights.len(), rows.len());
    Ok(render_flight_table(&rows))
}

async fn find_flight<B: BookingBackend>(ctx: &Context<'_, B>, flight_id: i64) -> anyhow::Result<FlightRecord> {
    ctx.backend
        .search_flights(&FlightSearchQuery::default())
        .await?
        .into_iter()
        .find(|f| f.flight_id == flight_id)
        .ok_or_else(|| anyhow!("Flight {} not found or sold out", flight_id))
}

// ============================================================================
// Bookings
// ============================================================================

/// Validates the booking locally and only then sends it. Local failures
/// surface as [`ValidationError`] and never reach the backend.
pub async fn submit_booking<B: BookingBackend>(
    ctx: &Context<'_, B>,
    flight_id: i64,
    passengers_count: u32,
    travel_date: Option<NaiveDate>,
    payment_method: Option<PaymentMethod>,
) -> anyhow::Result<(BookingRecord, ValidatedBooking)> {
    let flight = find_flight(ctx, flight_id).await?;
    let draft = BookingDraft::new(
        &flight,
        passengers_count,
        payment_method.unwrap_or(ctx.default_payment),
        travel_date,
    )?;

    let today = ctx.today();
    let validated = match draft.validate(today) {
        Ok(v) => v,
        Err(e @ ValidationError::MissingTravelDate) | Err(e @ ValidationError::ScheduleMismatch { .. }) => {
            let hint = match next_operating_date(&draft.schedule, today) {
                Some(first) => {
                    let dates: Vec<String> = upcoming_dates(&draft.schedule, first, 3)
                        .iter()
                        .map(NaiveDate::to_string)
                        .collect();
                    format!("next departures: {} ({})", dates.join(", "), draft.schedule.describe())
                }
                None => "no upcoming departures".to_string(),
            };
            return Err(anyhow::Error::new(e).context(hint));
        }
        Err(e) => return Err(e.into()),
    };

    let record = ctx.backend.create_booking(&validated.request).await?;
    info!("Booked flight {} as PNR {}", flight.flight_number, record.pnr_number);
    Ok((record, validated))
}

pub async fn book<B: BookingBackend>(
    ctx: &Context<'_, B>,
    flight_id: i64,
    passengers_count: u32,
    travel_date: Option<NaiveDate>,
    payment_method: Option<PaymentMethod>,
) -> anyhow::Result<String> {
    let (record, validated) =
        submit_booking(ctx, flight_id, passengers_count, travel_date, payment_method).await?;
    let (hours, minutes) = validated.times.duration();
    Ok(format!(
        "Booking confirmed. PNR {} (booking #{})\nDeparts {}  Arrives {}  ({}h {}m)\nCharged {:.2} for {} passenger(s)",
        record.pnr_number,
        record.booking_id,
        validated.times.departure.format("%d %b %Y %H:%M"),
        validated.times.arrival.format("%d %b %Y %H:%M"),
        hours,
        minutes,
        record.total_amount,
        record.passengers_count
    ))
}

pub async fn my_bookings<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    let bookings = ctx.backend.list_bookings().await?;
    let mut flights = match ctx.backend.search_flights(&FlightSearchQuery::default()).await {
        Ok(flights) => flights,
        Err(e) => {
            warn!("Could not load flights for booking list: {}", e);
            Vec::new()
        }
    };

    // Search leaves out sold-out flights; fetch those through the booking.
    for booking in &bookings {
        if flights.iter().any(|f| f.flight_id == booking.flight_id) {
            continue;
        }
        match ctx.backend.get_booking(booking.booking_id).await {
            Ok(detail) => flights.push(detail.flight),
            Err(e) => warn!("Could not load flight for booking {}: {}", booking.booking_id, e),
        }
    }
    Ok(render_booking_table(&BookingListing::build(&bookings, &flights)))
}

pub async fn ticket<B: BookingBackend>(ctx: &Context<'_, B>, booking_id: i64) -> anyhow::Result<String> {
    let detail = ctx.backend.get_booking(booking_id).await?;
    let ticket = Ticket::from_detail(&detail)
        .with_context(|| format!("Booking {} has unreadable flight data", booking_id))?;
    Ok(ticket.to_string())
}

pub async fn cancel<B: BookingBackend>(ctx: &Context<'_, B>, booking_id: i64) -> anyhow::Result<String> {
    let detail = ctx.backend.get_booking(booking_id).await?;
    cancellation_check(&detail.booking, Some(&detail.flight), ctx.today())?;

    let receipt = ctx.backend.cancel_booking(booking_id).await?;
    info!("Cancelled booking {}", receipt.booking_id);
    Ok(format!(
        "{}. Refund of {:.2} for PNR {}.",
        receipt.message, receipt.refund_amount, detail.booking.pnr_number
    ))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn admin_flights<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    ctx.require_admin().await?;
    let flights = ctx.backend.admin_list_flights().await?;
    Ok(render_flight_table(&listings(&flights, ctx.today(), None)))
}

pub async fn admin_add_flight<B: BookingBackend>(
    ctx: &Context<'_, B>,
    flight: &NewFlight,
) -> anyhow::Result<String> {
    ctx.require_admin().await?;
    let request = flight.to_request(ctx.today())?;
    let created = ctx.backend.admin_create_flight(&request).await?;
    let schedule = created.schedule()?;
    Ok(format!(
        "Created flight #{} {} {} [{}]",
        created.flight_id,
        created.flight_number,
        created.route(),
        schedule.describe()
    ))
}

pub async fn admin_delete_flight<B: BookingBackend>(
    ctx: &Context<'_, B>,
    flight_id: i64,
) -> anyhow::Result<String> {
    ctx.require_admin().await?;
    ctx.backend.admin_delete_flight(flight_id).await?;
    Ok(format!("Deleted flight #{}.", flight_id))
}

pub async fn admin_bookings<B: BookingBackend>(ctx: &Context<'_, B>) -> anyhow::Result<String> {
    ctx.require_admin().await?;
    let bookings = ctx.backend.admin_list_bookings().await?;
    let flights = ctx.backend.admin_list_flights().await?;
    let confirmed = bookings.iter().filter(|b| !b.is_cancelled()).count();
    let revenue: f64 = bookings
        .iter()
        .filter(|b| !b.is_cancelled())
        .map(|b| b.total_amount)
        .sum();

    Ok(format!(
        "{}\n{} active booking(s), {:.2} collected",
        render_booking_table(&BookingListing::build(&bookings, &flights)).trim_end(),
        confirmed,
        revenue
    ))
}
