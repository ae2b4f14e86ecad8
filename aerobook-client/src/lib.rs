pub mod error;
pub mod client;
pub mod commands;
pub mod cli;

pub use client::ApiClient;
pub use error::ClientError;
