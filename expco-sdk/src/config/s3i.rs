//! S³I connection configuration.

use super::{Credentials, EventTopics};
use crate::objects::{EventQueue, MessageQueue};
use std::time::Duration;
use url::Url;

/// Everything needed to talk to the S³I identity provider and broker.
#[derive(Debug, Clone)]
pub struct S3iConfig {
    pub credentials: Credentials,
    pub message_queue: MessageQueue,
    pub event_queue: EventQueue,
    /// Base URL of the Keycloak instance.
    pub auth_url: Url,
    pub auth_realm: String,
    pub broker_url: Url,
    pub topics: EventTopics,
    /// Minimum remaining lifetime of a cached token before it is refreshed.
    pub token_refresh_margin: Duration,
}

impl S3iConfig {
    pub const DEFAULT_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

    /// `{auth_url}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_url(&self) -> Result<Url, url::ParseError> {
        let base = self.auth_url.as_str().trim_end_matches('/');
        Url::parse(&format!(
            "{base}/realms/{}/protocol/openid-connect/token",
            self.auth_realm
        ))
    }
}
