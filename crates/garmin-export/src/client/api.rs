//! Garmin Connect API client for authenticated requests
//!
//! Thin transport layer: builds URLs, attaches the bearer token and maps HTTP
//! status codes onto [`GarminError`] variants so callers can classify failures.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::client::tokens::OAuth2Token;
use crate::error::{GarminError, Result};

/// User agent for Connect API requests
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Per-request timeout; a hung call surfaces as a retryable HTTP error
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Garmin Connect API client
#[derive(Clone)]
pub struct GarminClient {
    client: Client,
    base_url: String,
}

impl GarminClient {
    /// Create a new API client for the given domain
    pub fn new(domain: &str) -> Result<Self> {
        Self::new_with_base_url(&format!("https://connectapi.{}", domain))
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for a given path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with authorization
    fn build_headers(&self, token: &OAuth2Token) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let auth = HeaderValue::from_str(&token.authorization_header())
            .map_err(|_| GarminError::auth("Stored access token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the response
    pub async fn get(&self, token: &OAuth2Token, path: &str) -> Result<Response> {
        let url = self.build_url(path);
        let headers = self.build_headers(token)?;

        let response = self.client.get(&url).headers(headers).send().await?;

        handle_response_status(response, path).await
    }

    /// Make an authenticated GET request and deserialize JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, token: &OAuth2Token, path: &str) -> Result<T> {
        let response = self.get(token, path).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse JSON from {}: {}", path, e))
        })
    }

    /// Like [`get_json`](Self::get_json) but an empty body (204 or zero bytes)
    /// comes back as `None` instead of a parse failure.
    pub async fn get_json_opt<T: DeserializeOwned>(
        &self,
        token: &OAuth2Token,
        path: &str,
    ) -> Result<Option<T>> {
        let response = self.get(token, path).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.bytes().await?;
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        serde_json::from_slice(&body).map(Some).map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse JSON from {}: {}", path, e))
        })
    }

    /// Make an authenticated GET request and return raw bytes (for file downloads)
    pub async fn download(&self, token: &OAuth2Token, path: &str) -> Result<Bytes> {
        let response = self.get(token, path).await?;
        Ok(response.bytes().await?)
    }
}

/// Handle response status codes and convert to errors
async fn handle_response_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();

    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GarminError::NotAuthenticated),
        StatusCode::TOO_MANY_REQUESTS => Err(GarminError::RateLimited),
        StatusCode::NOT_FOUND => Err(GarminError::NotFound(path.to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GarminError::Api {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let client = GarminClient::new("garmin.com").unwrap();
        assert_eq!(
            client.build_url("/activity-service/activity/123"),
            "https://connectapi.garmin.com/activity-service/activity/123"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = GarminClient::new_with_base_url("http://127.0.0.1:9000/").unwrap();
        assert_eq!(client.build_url("/x"), "http://127.0.0.1:9000/x");
    }
}
