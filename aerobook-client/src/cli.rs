use std::path::PathBuf;

use aerobook_core::api::BookingBackend;
use aerobook_core::booking::PaymentMethod;
use aerobook_core::flight::{FlightSearchQuery, NewFlight};
use aerobook_core::identity::{RegisterRequest, UserType};
use aerobook_core::{FlightSchedule, WeekdaySet};
use anyhow::bail;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, Context};

#[derive(Parser, Debug)]
#[command(name = "aerobook", version, about = "Search, book and manage flights from the terminal")]
pub struct Cli {
    /// Directory holding default.toml and local.toml
    #[arg(long, global = true, default_value = "config")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session token
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List known source and destination cities
    Cities,
    /// List airlines
    Airlines,
    /// Search flights
    Search {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Travel date, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Book seats on a flight
    Book {
        flight_id: i64,
        #[arg(long, default_value_t = 1)]
        passengers: u32,
        /// Travel date, required for recurring flights
        #[arg(long)]
        date: Option<NaiveDate>,
        /// credit_card, debit_card, upi or net_banking
        #[arg(long)]
        payment: Option<PaymentMethod>,
    },
    /// List your bookings
    Bookings,
    /// Print the ticket for a booking
    Ticket { booking_id: i64 },
    /// Cancel a booking
    Cancel { booking_id: i64 },
    /// Administrative commands
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// List every flight
    Flights,
    /// Create a flight
    AddFlight(AddFlightArgs),
    /// Delete a flight
    DeleteFlight { flight_id: i64 },
    /// List every booking
    Bookings,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub password: String,
    #[arg(long)]
    pub admin: bool,
}

impl RegisterArgs {
    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone.clone(),
            password: self.password.clone(),
            user_type: if self.admin { UserType::Admin } else { UserType::User },
        }
    }
}

#[derive(Args, Debug)]
pub struct AddFlightArgs {
    pub flight_number: String,
    #[arg(long)]
    pub airline_id: i64,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub seats: u32,
    #[arg(long)]
    pub price: f64,

    /// One-time departure, YYYY-MM-DDTHH:MM
    #[arg(long, value_parser = parse_datetime)]
    pub departure: Option<NaiveDateTime>,
    /// One-time arrival, YYYY-MM-DDTHH:MM
    #[arg(long, value_parser = parse_datetime)]
    pub arrival: Option<NaiveDateTime>,

    /// Operates every day
    #[arg(long, conflicts_with = "weekdays")]
    pub daily: bool,
    /// Operates on these days, Monday = 0, e.g. 0,2,4
    #[arg(long)]
    pub weekdays: Option<WeekdaySet>,
    /// Recurring departure time, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub depart_at: Option<NaiveTime>,
    /// Recurring arrival time, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub arrive_at: Option<NaiveTime>,
}

impl AddFlightArgs {
    pub fn schedule(&self) -> anyhow::Result<FlightSchedule> {
        let recurring = self.daily || self.weekdays.is_some();
        if recurring && (self.departure.is_some() || self.arrival.is_some()) {
            bail!("Recurring flights take --depart-at and --arrive-at, not --departure/--arrival");
        }

        if !recurring {
            let (Some(departure), Some(arrival)) = (self.departure, self.arrival) else {
                bail!("One-time flights need --departure and --arrival");
            };
            return Ok(FlightSchedule::one_time(departure, arrival));
        }

        let (Some(departure), Some(arrival)) = (self.depart_at, self.arrive_at) else {
            bail!("Recurring flights need --depart-at and --arrive-at");
        };
        match self.weekdays {
            Some(days) => Ok(FlightSchedule::on_weekdays(days, departure, arrival)?),
            None => Ok(FlightSchedule::daily(departure, arrival)),
        }
    }

    pub fn to_new_flight(&self) -> anyhow::Result<NewFlight> {
        Ok(NewFlight {
            flight_number: self.flight_number.clone(),
            airline_id: self.airline_id,
            source_city: self.from.clone(),
            destination_city: self.to.clone(),
            schedule: self.schedule()?,
            total_seats: self.seats,
            price: self.price,
        })
    }
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("'{}' is not a date-time like 2025-03-03T09:15", raw))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| format!("'{}' is not a time like 23:30", raw))
}

/// Runs one command and returns what to print.
pub async fn dispatch<B: BookingBackend>(command: Command, ctx: &Context<'_, B>) -> anyhow::Result<String> {
    match command {
        Command::Login { username, password } => {
            let session = commands::sign_in(ctx, &username, &password).await?;
            Ok(format!("Logged in as {} ({}).", session.username, session.user_type))
        }
        Command::Register(args) => commands::register(ctx, &args.to_request()).await,
        Command::Logout => commands::sign_out(ctx).await,
        Command::Whoami => commands::whoami(ctx).await,
        Command::Cities => commands::cities(ctx).await,
        Command::Airlines => commands::airlines(ctx).await,
        Command::Search { from, to, date } => {
            let query = FlightSearchQuery {
                source: from,
                destination: to,
                date,
            };
            commands::search(ctx, &query).await
        }
        Command::Book {
            flight_id,
            passengers,
            date,
            payment,
        } => commands::book(ctx, flight_id, passengers, date, payment).await,
        Command::Bookings => commands::my_bookings(ctx).await,
        Command::Ticket { booking_id } => commands::ticket(ctx, booking_id).await,
        Command::Cancel { booking_id } => commands::cancel(ctx, booking_id).await,
        Command::Admin(admin) => match admin {
            AdminCommand::Flights => commands::admin_flights(ctx).await,
            AdminCommand::AddFlight(args) => commands::admin_add_flight(ctx, &args.to_new_flight()?).await,
            AdminCommand::DeleteFlight { flight_id } => commands::admin_delete_flight(ctx, flight_id).await,
            AdminCommand::Bookings => commands::admin_bookings(ctx).await,
        },
    }
}
