//! Request and response schemas of the encryption service
//!
//! Response fields are all optional: a body that parses but lacks a field
//! is a failed check, not a decode panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Endpoints exercised by a request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Encrypt,
    Decrypt,
    Health,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Encrypt => "encrypt",
            Endpoint::Decrypt => "decrypt",
            Endpoint::Health => "health",
        }
    }

    pub fn method(&self) -> reqwest::Method {
        match self {
            Endpoint::Encrypt | Endpoint::Decrypt => reqwest::Method::POST,
            Endpoint::Health => reqwest::Method::GET,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method(), self.path())
    }
}

/// `POST /encrypt` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub context: String,
    /// Base64 of the plaintext bytes
    pub plaintext: String,
}

/// `POST /encrypt` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    #[serde(default)]
    pub ciphertext: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
}

/// `POST /decrypt` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub context: String,
    pub ciphertext: String,
    pub key_id: String,
}

/// `POST /decrypt` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Base64 of the recovered plaintext
    #[serde(default)]
    pub plaintext: Option<String>,
}

/// `GET /health` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// A response that arrived, whatever its status or body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    /// Parsed body; `None` when the body is not valid JSON for `T`
    pub body: Option<T>,
    /// Why `body` is `None`
    pub decode_error: Option<String>,
    /// Raw body text, kept for diagnostics
    pub raw: String,
    /// Time from sending the request to reading the full body
    pub elapsed: Duration,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Status 400 and above
    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }

    /// Raw body cut to `max` characters for log lines
    pub fn raw_excerpt(&self, max: usize) -> String {
        match self.raw.char_indices().nth(max) {
            Some((index, _)) => format!("{}...", &self.raw[..index]),
            None => self.raw.clone(),
        }
    }
}

impl<T: serde::de::DeserializeOwned> ApiResponse<T> {
    /// Parse `raw` into `T`, recording a decode error instead of failing
    pub fn parse(status: u16, raw: String, elapsed: Duration) -> Self {
        let (body, decode_error) = match serde_json::from_str::<T>(&raw) {
            Ok(body) => (Some(body), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            status,
            body,
            decode_error,
            raw,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_parse_as_none() {
        let response: ApiResponse<DecryptResponse> =
            ApiResponse::parse(200, "{}".to_string(), Duration::from_millis(3));
        assert!(response.is_success());
        assert_eq!(response.body, Some(DecryptResponse { plaintext: None }));
        assert!(response.decode_error.is_none());
    }

    #[test]
    fn test_malformed_body_is_recorded() {
        let response: ApiResponse<EncryptResponse> =
            ApiResponse::parse(502, "<html>bad gateway</html>".to_string(), Duration::ZERO);
        assert!(response.body.is_none());
        assert!(response.decode_error.is_some());
        assert!(response.is_error_status());
    }

    #[test]
    fn test_raw_excerpt() {
        let response: ApiResponse<HealthResponse> =
            ApiResponse::parse(500, "x".repeat(300), Duration::ZERO);
        assert_eq!(response.raw_excerpt(10), format!("{}...", "x".repeat(10)));
        assert_eq!(response.raw_excerpt(1000).len(), 300);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::Encrypt.to_string(), "POST /encrypt");
        assert_eq!(Endpoint::Health.to_string(), "GET /health");
    }

    #[test]
    fn test_request_serialization() {
        let request = DecryptRequest {
            context: "exchange-key".to_string(),
            ciphertext: "c".to_string(),
            key_id: "k".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["key_id"], "k");
        assert_eq!(json["context"], "exchange-key");
    }
}
