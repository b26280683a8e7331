// traffic-monitor/src/error.rs
use common::{EndpointError, TokenError};
use thiserror::Error;

/// Missing, invalid or expired credential
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no bearer token available")]
    MissingCredential,
    #[error("bearer token rejected by the server")]
    Rejected,
    #[error("bearer token expired")]
    Expired,
    #[error(transparent)]
    InvalidToken(#[from] TokenError),
}

/// Failure of a page request against the collection endpoint
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no bearer token supplied")]
    MissingCredential,
    #[error("request unauthorized")]
    Unauthorized,
    #[error("no application selected")]
    NoApplication,
    #[error("a page request is already in flight")]
    Busy,
    #[error("page {page} is outside 1..={total_pages}")]
    OutOfRange { page: u32, total_pages: u32 },
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("undecodable response body: {0}")]
    Decode(String),
}

/// Transport-level failure of the push channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("transport error: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("could not encode control message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything the monitor surfaces to its presentation layer
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl From<FetchError> for MonitorError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::MissingCredential => MonitorError::Auth(AuthError::MissingCredential),
            FetchError::Unauthorized => MonitorError::Auth(AuthError::Rejected),
            other => MonitorError::Fetch(other),
        }
    }
}

impl MonitorError {
    /// Status line shown to the user in place of the raw error
    pub fn user_message(&self) -> &'static str {
        match self {
            MonitorError::Auth(_) => "Session expired. Please log in again.",
            MonitorError::Fetch(FetchError::Busy) => "Still loading logs. Please wait.",
            MonitorError::Fetch(_) => "Error fetching logs. Please try again.",
            MonitorError::Channel(_) => "Connecting to traffic monitoring...",
        }
    }
}
