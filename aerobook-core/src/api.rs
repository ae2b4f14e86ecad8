use async_trait::async_trait;

use crate::booking::{BookingDetail, BookingRecord, CancellationReceipt, CreateBookingRequest};
use crate::flight::{AirlineSummary, CityDirectory, CreateFlightRequest, FlightRecord, FlightSearchQuery};
use crate::identity::{LoginRequest, RegisterRequest, TokenResponse, UserProfile};

/// Operations offered by the booking backend.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, Self::Error>;

    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, Self::Error>;

    async fn search_flights(&self, query: &FlightSearchQuery) -> Result<Vec<FlightRecord>, Self::Error>;

    async fn cities(&self) -> Result<CityDirectory, Self::Error>;

    async fn airlines(&self) -> Result<Vec<AirlineSummary>, Self::Error>;

    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingRecord, Self::Error>;

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, Self::Error>;

    async fn get_booking(&self, booking_id: i64) -> Result<BookingDetail, Self::Error>;

    async fn cancel_booking(&self, booking_id: i64) -> Result<CancellationReceipt, Self::Error>;

    // Admin

    async fn admin_list_flights(&self) -> Result<Vec<FlightRecord>, Self::Error>;

    async fn admin_create_flight(&self, request: &CreateFlightRequest) -> Result<FlightRecord, Self::Error>;

    async fn admin_delete_flight(&self, flight_id: i64) -> Result<(), Self::Error>;

    async fn admin_list_bookings(&self) -> Result<Vec<BookingRecord>, Self::Error>;
}
