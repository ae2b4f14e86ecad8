use serde::Deserialize;
use std::env;
use std::path::Path;

use aerobook_core::ReferenceClock;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Offset of the reference time zone used for "today", in minutes east of UTC.
    pub reference_utc_offset_minutes: i32,
    #[serde(default = "default_payment_method")]
    pub default_payment_method: String,
}

fn default_payment_method() -> String {
    "credit_card".to_string()
}

impl BookingConfig {
    pub fn clock(&self) -> Result<ReferenceClock, aerobook_core::CoreError> {
        ReferenceClock::from_offset_minutes(self.reference_utc_offset_minutes)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(dir: &Path) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let file = |name: &str| config::File::from(dir.join(name)).required(false);

        let s = config::Config::builder()
            // Built-in defaults so the client runs without any config file
            .set_default("api.base_url", "http://localhost:8000")?
            .set_default("api.timeout_seconds", 15_i64)?
            .set_default("session.path", ".aerobook/session.json")?
            .set_default("booking.reference_utc_offset_minutes", 0_i64)?
            .set_default("booking.default_payment_method", "credit_card")?
            .add_source(file("default"))
            .add_source(file(&run_mode))
            // Local overrides, not checked in
            .add_source(file("local"))
            // Eg.. `AEROBOOK__API__BASE_URL=https://flights.example.com`
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
