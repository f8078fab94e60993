//! Identity provider token responses and error bodies shared by the
//! identity provider and the broker.

use serde::{Deserialize, Serialize};

/// Successful response of the OpenID Connect token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// Grant sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Password { username: String, password: String },
    ClientCredentials,
    RefreshToken(String),
}

impl Grant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::Password { .. } => "password",
            Grant::ClientCredentials => "client_credentials",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// The two error shapes returned by S³I services.
///
/// The broker answers with `{"error": ...}`, other endpoints with
/// `{"error_message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Error { error: String },
    ErrorMessage { error_message: String },
}

impl ErrorBody {
    pub const UNKNOWN: &'static str = "Unknown error";

    /// Best-effort extraction of the error message from a response body.
    pub fn message_from(body: &[u8]) -> String {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody::Error { error }) => error,
            Ok(ErrorBody::ErrorMessage { error_message }) => error_message,
            Err(_) => Self::UNKNOWN.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            ErrorBody::message_from(br#"{"error": "Something went wrong"}"#),
            "Something went wrong"
        );
        assert_eq!(
            ErrorBody::message_from(br#"{"error_message": "queue not found"}"#),
            "queue not found"
        );
        assert_eq!(ErrorBody::message_from(br#"{"invalid": "data"}"#), "Unknown error");
        assert_eq!(ErrorBody::message_from(b"Internal Server Error"), "Unknown error");
        assert_eq!(ErrorBody::message_from(b""), "Unknown error");
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "expires_in": 300}"#).unwrap();
        assert_eq!(token.refresh_token, None);
        assert_eq!(token.expires_in, 300);
    }
}
