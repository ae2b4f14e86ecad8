use aerobook_store::SessionError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not logged in. Run `aerobook login` first")]
    NotLoggedIn,

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    BadRequest(String),

    #[error("Backend error ({status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Could not reach backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Maps a non-success response onto an error, keeping the server's detail.
    pub fn from_status(status: StatusCode, detail: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(detail),
            StatusCode::FORBIDDEN => ClientError::Forbidden(detail),
            StatusCode::NOT_FOUND => ClientError::NotFound(detail),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::BadRequest(detail)
            }
            _ => {
                tracing::error!("Backend returned {}: {}", status, detail);
                ClientError::Server {
                    status: status.as_u16(),
                    detail,
                }
            }
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_) | ClientError::NotLoggedIn)
    }
}

/// Pulls the human-readable message out of an error body. The backend sends
/// `{"detail": "..."}`; validation failures carry a list under `detail`.
pub fn extract_detail(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        match value.get("detail").or_else(|| value.get("error")) {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(|m| m.as_str()) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                return messages.join("; ");
            }
            Some(other) => return other.to_string(),
            None => {}
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        text
    }
}
