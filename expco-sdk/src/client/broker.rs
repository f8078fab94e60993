//! Typed client for the S³I broker REST API.

use reqwest::Method;
use std::sync::Arc;
use url::Url;

use super::ClientError;
use super::auth::{KeycloakAuth, KeycloakTokenEndpoint, TokenEndpoint};
use super::transport::BrokerTransport;
use crate::config::S3iConfig;
use crate::objects::{EventQueue, MessageQueue, S3iEvent, S3iMessage};

/// Reads from the configured message and event queues and publishes
/// messages and events.
pub struct BrokerClient<E = KeycloakTokenEndpoint> {
    transport: BrokerTransport<E>,
    message_queue: MessageQueue,
    event_queue: EventQueue,
}

impl BrokerClient<KeycloakTokenEndpoint> {
    pub fn from_config(config: &S3iConfig) -> Result<Self, ClientError> {
        let auth = Arc::new(KeycloakAuth::from_config(config)?);
        Ok(Self::new(
            config.broker_url.clone(),
            auth,
            config.message_queue.clone(),
            config.event_queue.clone(),
        ))
    }
}

impl<E: TokenEndpoint> BrokerClient<E> {
    pub fn new(
        broker_url: Url,
        auth: Arc<KeycloakAuth<E>>,
        message_queue: MessageQueue,
        event_queue: EventQueue,
    ) -> Self {
        Self {
            transport: BrokerTransport::new(broker_url, auth),
            message_queue,
            event_queue,
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.transport = self.transport.with_http_client(client);
        self
    }

    pub fn transport(&self) -> &BrokerTransport<E> {
        &self.transport
    }

    pub fn message_queue(&self) -> &MessageQueue {
        &self.message_queue
    }

    pub fn event_queue(&self) -> &EventQueue {
        &self.event_queue
    }

    /// `GET /{message_queue}`: the oldest message, if any.
    pub async fn receive_message(&self) -> Result<Option<S3iMessage>, ClientError> {
        self.transport
            .send(Method::GET, self.message_queue.as_str(), None)
            .await?
            .into_item()
    }

    /// `GET /{message_queue}/all`: drain the message queue.
    pub async fn receive_all_messages(&self) -> Result<Vec<S3iMessage>, ClientError> {
        let path = format!("{}/all", self.message_queue);
        self.transport
            .send(Method::GET, &path, None)
            .await?
            .into_items()
    }

    /// `GET /{event_queue}`: the oldest event, if any.
    pub async fn receive_event(&self) -> Result<Option<S3iEvent>, ClientError> {
        self.transport
            .send(Method::GET, self.event_queue.as_str(), None)
            .await?
            .into_item()
    }

    /// `GET /{event_queue}/all`: drain the event queue.
    pub async fn receive_all_events(&self) -> Result<Vec<S3iEvent>, ClientError> {
        let path = format!("{}/all", self.event_queue);
        self.transport
            .send(Method::GET, &path, None)
            .await?
            .into_items()
    }

    /// `POST /{q1,q2,...}`: deliver `message` to every endpoint.
    pub async fn send_message(
        &self,
        endpoints: &[MessageQueue],
        message: &S3iMessage,
    ) -> Result<(), ClientError> {
        let path = endpoints
            .iter()
            .map(MessageQueue::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let body = serde_json::to_string(message)?;
        self.transport.send(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// `POST /{topic}`: publish `event` on its topic.
    pub async fn send_event(&self, event: &S3iEvent) -> Result<(), ClientError> {
        let body = serde_json::to_string(event)?;
        self.transport
            .send(Method::POST, &event.topic, Some(body))
            .await?;
        Ok(())
    }
}
