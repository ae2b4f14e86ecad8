use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::wire;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    User,
    Admin,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub password: String,
    #[serde(default)]
    pub user_type: UserType,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username is required".to_string());
        }
        if !self.email.contains('@') {
            return Err(format!("'{}' is not an email address", self.email));
        }
        if self.password.len() < 6 {
            return Err("password must be at least 6 characters".to_string());
        }
        Ok(())
    }
}

/// `POST /register` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub user_type: UserType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "wire::option_datetime::deserialize")]
    pub created_at: Option<NaiveDateTime>,
}

fn default_active() -> bool {
    true
}

/// `POST /login` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_type: UserType,
    pub user_id: i64,
}

/// Claims carried in the bearer token issued by `/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub user_type: UserType,
    pub user_id: i64,
    pub exp: i64,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
}

impl SessionClaims {
    /// Reads the claims without checking the signature. Only the backend can
    /// verify a token; the client uses this to notice expiry early.
    pub fn peek(token: &str) -> CoreResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| CoreError::InvalidToken(e.to_string()))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
