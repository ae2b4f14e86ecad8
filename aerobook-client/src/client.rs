use std::sync::Arc;
use std::time::Duration;

use aerobook_core::api::BookingBackend;
use aerobook_core::booking::{BookingDetail, BookingRecord, CancellationReceipt, CreateBookingRequest};
use aerobook_core::flight::{AirlineSummary, CityDirectory, CreateFlightRequest, FlightRecord, FlightSearchQuery};
use aerobook_core::identity::{LoginRequest, RegisterRequest, SessionClaims, TokenResponse, UserProfile};
use aerobook_store::{Config, SessionStore};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{extract_detail, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Bearer,
}

/// HTTP client for the booking backend.
///
/// Authenticated calls carry the stored session's token. A 401 on such a
/// call means the session is no longer valid, so it is cleared.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    sessions: Arc<dyn SessionStore>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aerobook/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            sessions,
        })
    }

    pub fn from_config(config: &Config, sessions: Arc<dyn SessionStore>) -> Result<Self, ClientError> {
        Self::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_seconds),
            sessions,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Token of the stored session. An expired token is dropped here rather
    /// than sent to the backend.
    async fn bearer_token(&self) -> Result<String, ClientError> {
        let session = self.sessions.load().await?.ok_or(ClientError::NotLoggedIn)?;

        match SessionClaims::peek(&session.token) {
            Ok(claims) if claims.is_expired_at(Utc::now()) => {
                info!("Session for {} expired, clearing", session.username);
                self.sessions.clear().await?;
                Err(ClientError::Unauthorized(
                    "Session expired, please log in again".to_string(),
                ))
            }
            Ok(_) => Ok(session.token),
            Err(e) => {
                debug!("Token claims unreadable ({}), sending as-is", e);
                Ok(session.token)
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        access: Access,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ClientError> {
        let mut request = build(self.http.request(method.clone(), self.url(path)));
        if access == Access::Bearer {
            request = request.bearer_auth(self.bearer_token().await?);
        }

        debug!("{} {}", method, path);
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let detail = extract_detail(status, &body);

        if status == reqwest::StatusCode::UNAUTHORIZED && access == Access::Bearer {
            warn!("Backend rejected session on {} {}: {}", method, path, detail);
            self.sessions.clear().await?;
        }

        Err(ClientError::from_status(status, detail))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, access: Access) -> Result<T, ClientError> {
        let response = self.execute(Method::GET, path, access, |r| r).await?;
        Self::decode(response).await
    }

    async fn post<B, T>(&self, path: &str, access: Access, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.execute(Method::POST, path, access, |r| r.json(body)).await?;
        Self::decode(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.execute(Method::DELETE, path, Access::Bearer, |r| r).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl BookingBackend for ApiClient {
    type Error = ClientError;

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError> {
        self.post("/login", Access::Public, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        self.post("/register", Access::Public, request).await
    }

    async fn search_flights(&self, query: &FlightSearchQuery) -> Result<Vec<FlightRecord>, ClientError> {
        let response = self
            .execute(Method::GET, "/flights", Access::Public, |r| r.query(query))
            .await?;
        Self::decode(response).await
    }

    async fn cities(&self) -> Result<CityDirectory, ClientError> {
        self.get("/cities", Access::Public).await
    }

    async fn airlines(&self) -> Result<Vec<AirlineSummary>, ClientError> {
        self.get("/airlines", Access::Public).await
    }

    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingRecord, ClientError> {
        self.post("/bookings", Access::Bearer, request).await
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, ClientError> {
        self.get("/bookings", Access::Bearer).await
    }

    async fn get_booking(&self, booking_id: i64) -> Result<BookingDetail, ClientError> {
        self.get(&format!("/bookings/{}", booking_id), Access::Bearer).await
    }

    async fn cancel_booking(&self, booking_id: i64) -> Result<CancellationReceipt, ClientError> {
        self.delete(&format!("/bookings/{}", booking_id)).await
    }

    async fn admin_list_flights(&self) -> Result<Vec<FlightRecord>, ClientError> {
        self.get("/admin/flights", Access::Bearer).await
    }

    async fn admin_create_flight(&self, request: &CreateFlightRequest) -> Result<FlightRecord, ClientError> {
        self.post("/flights", Access::Bearer, request).await
    }

    async fn admin_delete_flight(&self, flight_id: i64) -> Result<(), ClientError> {
        let _: serde_json::Value = self.delete(&format!("/admin/flights/{}", flight_id)).await?;
        Ok(())
    }

    async fn admin_list_bookings(&self) -> Result<Vec<BookingRecord>, ClientError> {
        self.get("/admin/bookings", Access::Bearer).await
    }
}
