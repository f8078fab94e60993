//! Keycloak token lifecycle.
//!
//! [`KeycloakAuth`] caches a single [`TokenRecord`] and hands out access
//! tokens that stay valid for at least the configured margin. Refreshes
//! are serialized: callers racing on an expired token cause exactly one
//! round trip to the token endpoint and all of them read its result.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::fmt;
use std::sync::Arc;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::{ClientError, check_status};
use crate::config::{Credentials, S3iConfig};
use crate::objects::{Grant, TokenResponse};

/// Source of fresh tokens.
///
/// Implemented by [`KeycloakTokenEndpoint`] for the real identity provider.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn request_token(
        &self,
        credentials: &Credentials,
        grant: &Grant,
    ) -> Result<TokenResponse, ClientError>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for Arc<T> {
    async fn request_token(
        &self,
        credentials: &Credentials,
        grant: &Grant,
    ) -> Result<TokenResponse, ClientError> {
        (**self).request_token(credentials, grant).await
    }
}

/// OpenID Connect token endpoint of a Keycloak realm.
#[derive(Debug, Clone)]
pub struct KeycloakTokenEndpoint {
    http: Client,
    token_url: Url,
}

impl KeycloakTokenEndpoint {
    pub fn new(token_url: Url) -> Self {
        Self {
            http: Client::new(),
            token_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }
}

#[async_trait]
impl TokenEndpoint for KeycloakTokenEndpoint {
    async fn request_token(
        &self,
        credentials: &Credentials,
        grant: &Grant,
    ) -> Result<TokenResponse, ClientError> {
        let mut form = vec![
            ("grant_type", grant.grant_type()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        match grant {
            Grant::Password { username, password } => {
                form.push(("username", username.as_str()));
                form.push(("password", password.as_str()));
            }
            Grant::RefreshToken(refresh_token) => form.push(("refresh_token", refresh_token.as_str())),
            Grant::ClientCredentials => {}
        }

        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;
        let resp = check_status(resp, &[]).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A cached token. Replaced as a whole, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: OffsetDateTime,
}

impl TokenRecord {
    /// A lifetime past the representable range is clamped to the latest
    /// representable instant, a negative one to `issued_at`.
    pub fn from_response(response: TokenResponse, issued_at: OffsetDateTime) -> Self {
        let lifetime = time::Duration::seconds(response.expires_in.max(0));
        let expires_at = issued_at
            .checked_add(lifetime)
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    /// Whether the token is still valid `margin` after `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime, margin: time::Duration) -> bool {
        now.checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authenticator holding the cached token of one client.
pub struct KeycloakAuth<E = KeycloakTokenEndpoint> {
    endpoint: E,
    credentials: Credentials,
    margin: time::Duration,
    token: RwLock<Option<TokenRecord>>,
    /// Held for the whole refresh sequence.
    refresh_lock: Mutex<()>,
}

impl KeycloakAuth<KeycloakTokenEndpoint> {
    /// Build an authenticator against the realm configured in `config`.
    pub fn from_config(config: &S3iConfig) -> Result<Self, ClientError> {
        let endpoint = KeycloakTokenEndpoint::new(config.token_url()?);
        Ok(Self::new(endpoint, config.credentials.clone())
            .with_refresh_margin(config.token_refresh_margin))
    }
}

impl<E: TokenEndpoint> KeycloakAuth<E> {
    pub fn new(endpoint: E, credentials: Credentials) -> Self {
        Self {
            endpoint,
            credentials,
            margin: time::Duration::seconds(
                S3iConfig::DEFAULT_TOKEN_REFRESH_MARGIN.as_secs() as i64,
            ),
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_refresh_margin(mut self, margin: std::time::Duration) -> Self {
        self.margin = time::Duration::new(margin.as_secs() as i64, margin.subsec_nanos() as i32);
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get an access token valid for at least the refresh margin.
    ///
    /// Refreshes (or reacquires) the cached token when it is missing or
    /// about to expire. If that fails, the error is returned and the stale
    /// token, if any, stays cached.
    pub async fn get_valid_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Whoever held the lock before us may already have refreshed.
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        debug!("Current token is invalid or expired");
        let refresh_token = self
            .token
            .read()
            .await
            .as_ref()
            .and_then(|record| record.refresh_token.clone());

        let record = self.acquire(refresh_token).await?;
        let access_token = record.access_token.clone();
        *self.token.write().await = Some(record);
        Ok(access_token)
    }

    /// Attach `Authorization: Bearer <token>` to a request.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.get_valid_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn cached_token(&self) -> Option<String> {
        let now = OffsetDateTime::now_utc();
        self.token
            .read()
            .await
            .as_ref()
            .filter(|record| record.is_valid_at(now, self.margin))
            .map(|record| record.access_token.clone())
    }

    async fn acquire(&self, refresh_token: Option<String>) -> Result<TokenRecord, ClientError> {
        if let Some(refresh_token) = refresh_token {
            match self.request(Grant::RefreshToken(refresh_token)).await {
                Ok(record) => {
                    info!("Refreshed token");
                    return Ok(record);
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, requesting a new token");
                }
            }
        }

        let record = self
            .request(self.credentials.full_grant())
            .await
            .map_err(|e| ClientError::Auth(Box::new(e)))?;
        info!(person = self.credentials.is_person(), "Got a new token");
        Ok(record)
    }

    async fn request(&self, grant: Grant) -> Result<TokenRecord, ClientError> {
        let issued_at = OffsetDateTime::now_utc();
        let response = self.endpoint.request_token(&self.credentials, &grant).await?;
        Ok(TokenRecord::from_response(response, issued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Token endpoint double recording every grant it receives.
    #[derive(Default)]
    struct FakeEndpoint {
        grants: StdMutex<Vec<&'static str>>,
        issued: AtomicUsize,
        fail_refresh: bool,
        fail_all: bool,
        delay: Duration,
    }

    impl FakeEndpoint {
        fn grants(&self) -> Vec<&'static str> {
            self.grants.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn request_token(
            &self,
            _credentials: &Credentials,
            grant: &Grant,
        ) -> Result<TokenResponse, ClientError> {
            self.grants.lock().unwrap().push(grant.grant_type());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let refusing = self.fail_all || (self.fail_refresh && matches!(grant, Grant::RefreshToken(_)));
            if refusing {
                return Err(ClientError::Api {
                    status: StatusCode::BAD_REQUEST,
                    message: "invalid_grant".to_string(),
                });
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenResponse {
                access_token: format!("access-{n}"),
                refresh_token: Some(format!("refresh-{n}")),
                expires_in: 3600,
            })
        }
    }

    fn credentials() -> Credentials {
        Credentials::new(
            "s3i:123e4567-e89b-12d3-a456-426614174000".parse().unwrap(),
            "test-secret",
        )
    }

    fn auth(endpoint: &Arc<FakeEndpoint>) -> KeycloakAuth<Arc<FakeEndpoint>> {
        KeycloakAuth::new(endpoint.clone(), credentials())
            .with_refresh_margin(Duration::from_secs(60))
    }

    async fn seed(auth: &KeycloakAuth<Arc<FakeEndpoint>>, expires_in: time::Duration) {
        *auth.token.write().await = Some(TokenRecord {
            access_token: "old-access".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            expires_at: OffsetDateTime::now_utc() + expires_in,
        });
    }

    #[tokio::test]
    async fn test_initial_token_uses_full_grant() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let auth = auth(&endpoint);

        assert_eq!(auth.get_valid_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.grants(), vec!["client_credentials"]);

        // Cached from now on.
        assert_eq!(auth.get_valid_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.grants().len(), 1);
    }

    #[tokio::test]
    async fn test_person_credentials_use_password_grant() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let auth = KeycloakAuth::new(
            endpoint.clone(),
            credentials().with_person("test-user", "test-password"),
        );

        auth.get_valid_token().await.unwrap();
        assert_eq!(endpoint.grants(), vec!["password"]);
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refreshed() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let auth = auth(&endpoint);
        seed(&auth, time::Duration::seconds(30)).await;

        assert_eq!(auth.get_valid_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.grants(), vec!["refresh_token"]);
    }

    #[tokio::test]
    async fn test_token_outside_margin_is_reused() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let auth = auth(&endpoint);
        seed(&auth, time::Duration::seconds(120)).await;

        assert_eq!(auth.get_valid_token().await.unwrap(), "old-access");
        assert!(endpoint.grants().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_full_grant() {
        let endpoint = Arc::new(FakeEndpoint {
            fail_refresh: true,
            ..Default::default()
        });
        let auth = auth(&endpoint);
        seed(&auth, time::Duration::seconds(-10)).await;

        assert_eq!(auth.get_valid_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.grants(), vec!["refresh_token", "client_credentials"]);
    }

    #[tokio::test]
    async fn test_both_grants_failing_keeps_stale_token() {
        let endpoint = Arc::new(FakeEndpoint {
            fail_all: true,
            ..Default::default()
        });
        let auth = auth(&endpoint);
        seed(&auth, time::Duration::seconds(5)).await;

        let err = auth.get_valid_token().await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(endpoint.grants(), vec!["refresh_token", "client_credentials"]);

        let cached = auth.token.read().await.clone().unwrap();
        assert_eq!(cached.access_token, "old-access");

        // No internal retry loop: the next call tries again from scratch.
        assert!(auth.get_valid_token().await.is_err());
        assert_eq!(endpoint.grants().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh() {
        let endpoint = Arc::new(FakeEndpoint {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let auth = Arc::new(auth(&endpoint));
        seed(&auth, time::Duration::seconds(-1)).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let auth = auth.clone();
            tasks.spawn(async move { auth.get_valid_token().await });
        }

        let mut tokens = Vec::new();
        while let Some(result) = tasks.join_next().await {
            tokens.push(result.unwrap().unwrap());
        }

        assert_eq!(tokens.len(), 16);
        assert!(tokens.iter().all(|t| t == "access-1"));
        assert_eq!(endpoint.grants(), vec!["refresh_token"]);
    }

    #[test]
    fn test_record_validity() {
        let now = OffsetDateTime::now_utc();
        let record = TokenRecord::from_response(
            TokenResponse {
                access_token: "a".into(),
                refresh_token: None,
                expires_in: 100,
            },
            now,
        );
        assert!(record.is_valid_at(now, time::Duration::seconds(60)));
        assert!(!record.is_valid_at(now, time::Duration::seconds(100)));
        assert!(!format!("{record:?}").contains("\"a\""));
    }

    #[test]
    fn test_record_with_huge_lifetime_is_clamped() {
        let now = OffsetDateTime::now_utc();
        let response = |expires_in| TokenResponse {
            access_token: "a".into(),
            refresh_token: None,
            expires_in,
        };

        let forever = TokenRecord::from_response(response(i64::MAX), now);
        assert_eq!(forever.expires_at, PrimitiveDateTime::MAX.assume_utc());
        assert!(forever.is_valid_at(now, time::Duration::seconds(60)));

        let expired = TokenRecord::from_response(response(i64::MIN), now);
        assert_eq!(expired.expires_at, now);
        assert!(!expired.is_valid_at(now, time::Duration::ZERO));
    }
}
