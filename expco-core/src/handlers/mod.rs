//! Domain handlers of the plant growth experiment.
//!
//! Event handlers, in registration order: `new_image`, `status`, `save_all`.
//! Message handlers: `save_all`.

pub mod new_image;
pub mod save_all;
pub mod status;

pub use new_image::NewImageHandler;
pub use save_all::SaveAll;
pub use status::StatusHandler;

use expco_sdk::config::EventTopics;
use expco_sdk::objects::{S3iEvent, S3iMessage};
use std::sync::Arc;

use crate::framework::DatabaseProcessor;
use crate::processors::{Dispatcher, SharedHandler};

/// Dispatchers for messages and events with every domain handler registered.
pub fn dispatchers(
    db: &DatabaseProcessor,
    topics: &EventTopics,
    max_concurrency: Option<usize>,
) -> (Dispatcher<S3iMessage>, Dispatcher<S3iEvent>) {
    let save_all = Arc::new(SaveAll::new(db.clone()));

    let mut messages = Dispatcher::new("message").with_max_concurrency(max_concurrency);
    messages.register(save_all.clone() as SharedHandler<S3iMessage>);

    let mut events = Dispatcher::new("event")
        .with_max_concurrency(max_concurrency)
        .with_handler(NewImageHandler::new(db.clone(), &topics.new_image))
        .with_handler(StatusHandler::new(db.clone(), &topics.status));
    events.register(save_all as SharedHandler<S3iEvent>);

    (messages, events)
}
