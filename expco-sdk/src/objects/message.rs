//! S³I broker messages.
//!
//! The broker delivers every message kind through the same queue; the
//! `messageType` field discriminates them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields shared by every message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifier of the sender.
    pub sender: String,
    /// Unique identifier of the message.
    pub identifier: String,
    /// Receivers of the message.
    pub receivers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Base64 encoded file content.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub attachments: Vec<Attachment>,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub service_type: String,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub replying_to_message: String,
    pub service_type: String,
    pub results: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetValueRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub attribute_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetValueReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub replying_to_message: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValueRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub attribute_path: String,
    pub new_value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValueReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub replying_to_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttributeRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub attribute_path: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttributeReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub replying_to_message: String,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttributeRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reply_to_endpoint: String,
    pub attribute_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttributeReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub replying_to_message: String,
    pub ok: bool,
}

/// Any message the S³I broker can deliver to a message queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum S3iMessage {
    UserMessage(UserMessage),
    ServiceRequest(ServiceRequest),
    ServiceReply(ServiceReply),
    GetValueRequest(GetValueRequest),
    GetValueReply(GetValueReply),
    SetValueRequest(SetValueRequest),
    SetValueReply(SetValueReply),
    CreateAttributeRequest(CreateAttributeRequest),
    CreateAttributeReply(CreateAttributeReply),
    DeleteAttributeRequest(DeleteAttributeRequest),
    DeleteAttributeReply(DeleteAttributeReply),
}

impl S3iMessage {
    pub fn envelope(&self) -> &Envelope {
        match self {
            S3iMessage::UserMessage(m) => &m.envelope,
            S3iMessage::ServiceRequest(m) => &m.envelope,
            S3iMessage::ServiceReply(m) => &m.envelope,
            S3iMessage::GetValueRequest(m) => &m.envelope,
            S3iMessage::GetValueReply(m) => &m.envelope,
            S3iMessage::SetValueRequest(m) => &m.envelope,
            S3iMessage::SetValueReply(m) => &m.envelope,
            S3iMessage::CreateAttributeRequest(m) => &m.envelope,
            S3iMessage::CreateAttributeReply(m) => &m.envelope,
            S3iMessage::DeleteAttributeRequest(m) => &m.envelope,
            S3iMessage::DeleteAttributeReply(m) => &m.envelope,
        }
    }

    /// The `messageType` discriminator as sent on the wire.
    pub fn message_type(&self) -> &'static str {
        match self {
            S3iMessage::UserMessage(_) => "userMessage",
            S3iMessage::ServiceRequest(_) => "serviceRequest",
            S3iMessage::ServiceReply(_) => "serviceReply",
            S3iMessage::GetValueRequest(_) => "getValueRequest",
            S3iMessage::GetValueReply(_) => "getValueReply",
            S3iMessage::SetValueRequest(_) => "setValueRequest",
            S3iMessage::SetValueReply(_) => "setValueReply",
            S3iMessage::CreateAttributeRequest(_) => "createAttributeRequest",
            S3iMessage::CreateAttributeReply(_) => "createAttributeReply",
            S3iMessage::DeleteAttributeRequest(_) => "deleteAttributeRequest",
            S3iMessage::DeleteAttributeReply(_) => "deleteAttributeReply",
        }
    }
}

impl fmt::Display for S3iMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let envelope = self.envelope();
        write!(
            f,
            "{} {} from {}",
            self.message_type(),
            envelope.identifier,
            envelope.sender
        )
    }
}
