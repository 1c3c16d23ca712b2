use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Long-lived OAuth1 credentials written by the login tool.
///
/// Only the fields the exporter needs are modelled; the file may carry more
/// (MFA token and expiry) and those are ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "garmin.com".to_string()
}

/// OAuth2 Bearer token for API requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Token {
    pub scope: String,
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: i64,
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.seconds_remaining() <= 0
    }

    /// Seconds until the access token expires (negative once expired)
    pub fn seconds_remaining(&self) -> i64 {
        self.expires_at - Utc::now().timestamp()
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
