pub mod auth;
pub mod event;
pub mod ids;
pub mod message;

pub use auth::{ErrorBody, Grant, TokenResponse};
pub use event::{EventMessageType, S3iEvent};
pub use ids::{EventQueue, IdError, MessageQueue, S3iId};
pub use message::{Envelope, S3iMessage};
