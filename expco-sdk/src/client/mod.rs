//! HTTP clients for the S³I identity provider and broker.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod auth;
mod broker;
mod transport;

pub use auth::{KeycloakAuth, KeycloakTokenEndpoint, TokenEndpoint, TokenRecord};
pub use broker::BrokerClient;
pub use transport::{BrokerTransport, Payload};

use reqwest::StatusCode;

use crate::objects::ErrorBody;

/// Errors produced by the S³I HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a status outside the accepted set.
    #[error("[{}]: {message}", .status.as_u16())]
    Api { status: StatusCode, message: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Neither refreshing nor requesting a new token succeeded.
    #[error("authentication failed: {0}")]
    Auth(Box<ClientError>),
}

impl ClientError {
    /// HTTP status of an [`ClientError::Api`] error, also looking through
    /// [`ClientError::Auth`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Auth(inner) => inner.status(),
            _ => None,
        }
    }
}

/// Turn a response with a non-accepted status into [`ClientError::Api`].
///
/// Success statuses and the statuses in `allowed` pass through unchanged.
async fn check_status(
    resp: reqwest::Response,
    allowed: &[StatusCode],
) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() || allowed.contains(&status) {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    Err(ClientError::Api {
        status,
        message: ErrorBody::message_from(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            message: "Something went wrong".to_string(),
        };
        assert_eq!(err.to_string(), "[400]: Something went wrong");

        let wrapped = ClientError::Auth(Box::new(err));
        assert_eq!(wrapped.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(
            wrapped.to_string(),
            "authentication failed: [400]: Something went wrong"
        );
    }
}
