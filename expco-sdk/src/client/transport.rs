//! Authenticated HTTP transport to the S³I broker.

use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

use super::auth::{KeycloakAuth, KeycloakTokenEndpoint, TokenEndpoint};
use super::{ClientError, check_status};

/// Body of a successful broker response.
///
/// The broker answers an empty queue with an empty body (single item) or
/// with `[]` (all items). Neither is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    EmptyList,
    Body(Bytes),
}

impl Payload {
    pub fn from_bytes(bytes: Bytes) -> Self {
        match bytes.as_ref() {
            b"" => Payload::Empty,
            b"[]" => Payload::EmptyList,
            _ => Payload::Body(bytes),
        }
    }

    pub fn is_empty(&self) -> bool {
        !matches!(self, Payload::Body(_))
    }

    /// Decode a single item, `None` when the broker had nothing.
    pub fn into_item<T: DeserializeOwned>(self) -> Result<Option<T>, ClientError> {
        match self {
            Payload::Empty | Payload::EmptyList => Ok(None),
            Payload::Body(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        }
    }

    /// Decode a list of items, empty when the broker had nothing.
    pub fn into_items<T: DeserializeOwned>(self) -> Result<Vec<T>, ClientError> {
        match self {
            Payload::Empty | Payload::EmptyList => Ok(Vec::new()),
            Payload::Body(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

/// Sends requests to the broker with a valid bearer token attached.
pub struct BrokerTransport<E = KeycloakTokenEndpoint> {
    http: Client,
    base_url: Url,
    auth: Arc<KeycloakAuth<E>>,
}

impl<E: TokenEndpoint> BrokerTransport<E> {
    pub fn new(base_url: Url, auth: Arc<KeycloakAuth<E>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            auth,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn auth(&self) -> &Arc<KeycloakAuth<E>> {
        &self.auth
    }

    /// Send a request to `path` below the broker base URL.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<Payload, ClientError> {
        self.send_allowing(method, path, body, &[]).await
    }

    /// Like [`send`](Self::send), additionally accepting the statuses in
    /// `allowed` as success.
    #[tracing::instrument(skip(self, body, allowed), err, name = "S3I:broker")]
    pub async fn send_allowing(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        allowed: &[StatusCode],
    ) -> Result<Payload, ClientError> {
        let url = self.url_for(path)?;
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        let request = self.auth.authorize(request).await?;

        let resp = request.send().await?;
        let resp = check_status(resp, allowed).await?;
        Ok(Payload::from_bytes(resp.bytes().await?))
    }

    /// Queue names contain `://`, so they are appended verbatim instead of
    /// going through `Url::join`.
    fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::S3iEvent;

    #[test]
    fn test_empty_sentinels() {
        assert_eq!(Payload::from_bytes(Bytes::new()), Payload::Empty);
        assert_eq!(Payload::from_bytes(Bytes::from_static(b"[]")), Payload::EmptyList);

        assert!(Payload::Empty.into_item::<S3iEvent>().unwrap().is_none());
        assert!(Payload::Empty.into_items::<S3iEvent>().unwrap().is_empty());
        assert!(Payload::EmptyList.into_items::<S3iEvent>().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let payload = Payload::from_bytes(Bytes::from_static(b"{\"not\": \"an event\"}"));
        assert!(!payload.is_empty());
        assert!(matches!(
            payload.into_item::<S3iEvent>(),
            Err(ClientError::Json(_))
        ));
    }
}
