use thiserror::Error;

/// Main error type for garmin-export
#[derive(Error, Debug)]
pub enum GarminError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authentication required. Please run 'garmin auth login' first.")]
    NotAuthenticated,

    #[error("Rate limited. Please wait before retrying.")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, GarminError>;

impl GarminError {
    /// Create an authentication error from a message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid response error from a message
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid parameter error from a message
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a database (local store) error from a message
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Errors that abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::NotAuthenticated)
    }

    /// Errors worth another attempt: network trouble, throttling, server
    /// faults and malformed payloads.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Http(_) | Self::InvalidResponse(_) | Self::Json(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Render an error as a single actionable line for the terminal
pub fn format_user_error(err: &GarminError) -> String {
    match err {
        GarminError::NotAuthenticated => {
            "Not logged in or session expired. Run 'garmin auth login' and try again.".to_string()
        }
        GarminError::Http(e) if e.is_timeout() => {
            "Request timed out talking to Garmin Connect. Check your connection.".to_string()
        }
        GarminError::Http(e) if e.is_connect() => {
            "Could not connect to Garmin Connect. Check your connection.".to_string()
        }
        other => other.to_string(),
    }
}
