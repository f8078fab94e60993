//! Coordinator processor.
//!
//! The Coordinator is responsible for:
//! - Pulling messages and events from the broker (one, or all queued)
//! - Handing them to the message and event dispatchers
//! - Running that cycle on a fixed interval until shutdown is signaled
//!
//! The broker is reached through the [`Inbox`] trait so the loop can be
//! driven without a network.

use async_trait::async_trait;
use expco_sdk::client::{BrokerClient, ClientError, TokenEndpoint};
use expco_sdk::objects::{S3iEvent, S3iMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::dispatcher::{AggregateError, Dispatcher, ProcessReport};

/// Errors that end a processing cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Fetching from the broker failed; nothing was processed.
    #[error("broker error: {0}")]
    Broker(#[from] ClientError),

    /// At least one handler failed.
    #[error(transparent)]
    Processing(#[from] AggregateError),

    /// The cycle did not finish in time and was abandoned.
    #[error("cycle did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Source of messages and events.
#[async_trait]
pub trait Inbox: Send + Sync {
    async fn next_message(&self) -> Result<Option<S3iMessage>, ClientError>;
    async fn all_messages(&self) -> Result<Vec<S3iMessage>, ClientError>;
    async fn next_event(&self) -> Result<Option<S3iEvent>, ClientError>;
    async fn all_events(&self) -> Result<Vec<S3iEvent>, ClientError>;
}

#[async_trait]
impl<E: TokenEndpoint + 'static> Inbox for BrokerClient<E> {
    async fn next_message(&self) -> Result<Option<S3iMessage>, ClientError> {
        self.receive_message().await
    }

    async fn all_messages(&self) -> Result<Vec<S3iMessage>, ClientError> {
        self.receive_all_messages().await
    }

    async fn next_event(&self) -> Result<Option<S3iEvent>, ClientError> {
        self.receive_event().await
    }

    async fn all_events(&self) -> Result<Vec<S3iEvent>, ClientError> {
        self.receive_all_events().await
    }
}

#[async_trait]
impl<I: Inbox + ?Sized> Inbox for std::sync::Arc<I> {
    async fn next_message(&self) -> Result<Option<S3iMessage>, ClientError> {
        (**self).next_message().await
    }

    async fn all_messages(&self) -> Result<Vec<S3iMessage>, ClientError> {
        (**self).all_messages().await
    }

    async fn next_event(&self) -> Result<Option<S3iEvent>, ClientError> {
        (**self).next_event().await
    }

    async fn all_events(&self) -> Result<Vec<S3iEvent>, ClientError> {
        (**self).all_events().await
    }
}

pub struct Coordinator<I> {
    inbox: I,
    messages: Dispatcher<S3iMessage>,
    events: Dispatcher<S3iEvent>,
    cycle_timeout: Option<Duration>,
}

impl<I: Inbox> Coordinator<I> {
    pub fn new(inbox: I, messages: Dispatcher<S3iMessage>, events: Dispatcher<S3iEvent>) -> Self {
        Self {
            inbox,
            messages,
            events,
            cycle_timeout: None,
        }
    }

    /// Abandon a [`cycle`](Self::cycle) that takes longer than `timeout`.
    pub fn with_cycle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    pub fn message_dispatcher(&self) -> &Dispatcher<S3iMessage> {
        &self.messages
    }

    pub fn event_dispatcher(&self) -> &Dispatcher<S3iEvent> {
        &self.events
    }

    /// Process the oldest queued message. `Ok(None)` when the queue was empty.
    pub async fn single_message(&self) -> Result<Option<ProcessReport>, CycleError> {
        debug!("Fetching one message");
        let Some(message) = self.inbox.next_message().await? else {
            info!("No messages to process");
            return Ok(None);
        };
        debug!(%message, "Processing message");
        Ok(Some(self.messages.process(&message).await?))
    }

    /// Process the oldest queued event. `Ok(None)` when the queue was empty.
    pub async fn single_event(&self) -> Result<Option<ProcessReport>, CycleError> {
        debug!("Fetching one event");
        let Some(event) = self.inbox.next_event().await? else {
            info!("No events to process");
            return Ok(None);
        };
        debug!(%event, "Processing event");
        Ok(Some(self.events.process(&event).await?))
    }

    pub async fn all_messages(&self) -> Result<ProcessReport, CycleError> {
        let messages = self.inbox.all_messages().await?;
        info!(count = messages.len(), "Processing messages");
        Ok(self.messages.process_all(&messages).await?)
    }

    pub async fn all_events(&self) -> Result<ProcessReport, CycleError> {
        let events = self.inbox.all_events().await?;
        info!(count = events.len(), "Processing events");
        Ok(self.events.process_all(&events).await?)
    }

    /// Drain both queues and process everything that was in them.
    pub async fn cycle(&self) -> Result<ProcessReport, CycleError> {
        match self.cycle_timeout {
            None => self.run_cycle().await,
            Some(limit) => tokio::time::timeout(limit, self.run_cycle())
                .await
                .map_err(|_| CycleError::TimedOut(limit))?,
        }
    }

    async fn run_cycle(&self) -> Result<ProcessReport, CycleError> {
        info!("Receiving all messages and events");
        let (messages, events) =
            tokio::join!(self.inbox.all_messages(), self.inbox.all_events());

        // Whatever one fetch drained is gone from the broker, so it is
        // processed even when the other fetch failed.
        let (messages, events, fetch_error) = match (messages, events) {
            (Ok(messages), Ok(events)) => (messages, events, None),
            (Ok(messages), Err(e)) => (messages, Vec::new(), Some(e)),
            (Err(e), Ok(events)) => (Vec::new(), events, Some(e)),
            (Err(e), Err(other)) => {
                warn!(error = %other, "Fetching events failed as well");
                (Vec::new(), Vec::new(), Some(e))
            }
        };
        if let Some(e) = &fetch_error {
            warn!(
                error = %e,
                messages = messages.len(),
                events = events.len(),
                "A fetch failed, processing what was received before aborting the cycle"
            );
        }

        info!(
            messages = messages.len(),
            events = events.len(),
            "Processing messages and events"
        );
        let (messages, events) = tokio::join!(
            self.messages.process_all(&messages),
            self.events.process_all(&events)
        );
        let outcome = AggregateError::collect([messages, events]);

        match fetch_error {
            None => Ok(outcome?),
            Some(e) => {
                if let Err(failed) = &outcome {
                    error!(error = %failed, "Handlers failed in a cycle with a broker error");
                }
                Err(e.into())
            }
        }
    }

    /// Run [`cycle`](Self::cycle) every `interval` until `shutdown_rx` turns
    /// `true` or its sender is dropped.
    ///
    /// A failed cycle is logged. With `exit_on_failure` its error is also
    /// returned and the loop ends.
    pub async fn run_forever(
        &self,
        interval: Duration,
        exit_on_failure: bool,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), CycleError> {
        info!(?interval, exit_on_failure, "Coordinator started");

        while !*shutdown_rx.borrow() {
            let outcome = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Coordinator received shutdown signal, abandoning cycle");
                        break;
                    }
                    continue;
                }

                outcome = self.cycle() => outcome,
            };

            match outcome {
                Ok(report) => info!(
                    handled = report.succeeded.len(),
                    "Finished a cycle without errors"
                ),
                Err(e) => {
                    error!(error = %e, "An error occurred during the current processing cycle");
                    if exit_on_failure {
                        return Err(e);
                    }
                }
            }

            debug!(?interval, "Sleeping");
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Coordinator received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Coordinator shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::handler::FnHandler;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeInbox {
        messages: Mutex<VecDeque<S3iMessage>>,
        events: Mutex<VecDeque<S3iEvent>>,
        unavailable: bool,
        events_unavailable: bool,
        stall: bool,
        fetches: AtomicUsize,
    }

    impl FakeInbox {
        async fn gate(&self) -> Result<(), ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.unavailable {
                return Err(ClientError::Api {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "broker down".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Inbox for FakeInbox {
        async fn next_message(&self) -> Result<Option<S3iMessage>, ClientError> {
            self.gate().await?;
            Ok(self.messages.lock().unwrap().pop_front())
        }

        async fn all_messages(&self) -> Result<Vec<S3iMessage>, ClientError> {
            self.gate().await?;
            Ok(self.messages.lock().unwrap().drain(..).collect())
        }

        async fn next_event(&self) -> Result<Option<S3iEvent>, ClientError> {
            self.gate().await?;
            Ok(self.events.lock().unwrap().pop_front())
        }

        async fn all_events(&self) -> Result<Vec<S3iEvent>, ClientError> {
            self.gate().await?;
            if self.events_unavailable {
                return Err(ClientError::Api {
                    status: StatusCode::BAD_GATEWAY,
                    message: "event queue down".into(),
                });
            }
            Ok(self.events.lock().unwrap().drain(..).collect())
        }
    }

    fn event(identifier: &str, topic: &str) -> S3iEvent {
        S3iEvent::new("s3i:sender", identifier, topic, json!({}))
    }

    fn message(identifier: &str) -> S3iMessage {
        serde_json::from_value(json!({
            "messageType": "userMessage",
            "sender": "s3i:sender",
            "identifier": identifier,
            "receivers": [],
            "replyToEndpoint": "s3ibs://s3i:sender",
            "attachments": [],
            "subject": "",
            "text": ""
        }))
        .unwrap()
    }

    fn coordinator(inbox: FakeInbox) -> Coordinator<FakeInbox> {
        let messages = Dispatcher::new("message")
            .with_handler(FnHandler::always("save_all", |_: S3iMessage| async { Ok(()) }));
        let events = Dispatcher::new("event")
            .with_handler(FnHandler::new(
                "status",
                |e: &S3iEvent| e.topic == "status",
                |e: S3iEvent| async move {
                    anyhow::ensure!(e.identifier != "broken", "unreadable status");
                    Ok(())
                },
            ))
            .with_handler(FnHandler::always("save_all", |_: S3iEvent| async { Ok(()) }));
        Coordinator::new(inbox, messages, events)
    }

    #[tokio::test]
    async fn test_single_on_empty_queue() {
        let coordinator = coordinator(FakeInbox::default());
        assert!(coordinator.single_message().await.unwrap().is_none());
        assert!(coordinator.single_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_processes_oldest_item() {
        let inbox = FakeInbox::default();
        inbox.messages.lock().unwrap().extend([message("m-1"), message("m-2")]);
        inbox.events.lock().unwrap().push_back(event("e-1", "status"));
        let coordinator = coordinator(inbox);

        let report = coordinator.single_message().await.unwrap().unwrap();
        assert_eq!(report.succeeded, vec!["save_all"]);
        assert_eq!(coordinator.inbox().messages.lock().unwrap().len(), 1);

        let report = coordinator.single_event().await.unwrap().unwrap();
        assert_eq!(report.succeeded, vec!["status", "save_all"]);
    }

    #[tokio::test]
    async fn test_cycle_merges_message_and_event_outcomes() {
        let inbox = FakeInbox::default();
        inbox.messages.lock().unwrap().push_back(message("m-1"));
        inbox.events.lock().unwrap().extend([
            event("e-1", "status"),
            event("broken", "status"),
            event("e-3", "other"),
        ]);
        let coordinator = coordinator(inbox);

        let Err(CycleError::Processing(err)) = coordinator.cycle().await else {
            panic!("expected a processing error");
        };
        assert_eq!(err.len(), 1);
        assert_eq!(err.failures[0].handler, "status");
        // save_all for the message, status + save_all for e-1, save_all for
        // broken and e-3.
        assert_eq!(err.succeeded.len(), 5);

        // Queues were drained; the next cycle is clean.
        let report = coordinator.cycle().await.unwrap();
        assert!(report.succeeded.is_empty());
    }

    #[tokio::test]
    async fn test_broker_failure_aborts_cycle() {
        let coordinator = coordinator(FakeInbox {
            unavailable: true,
            ..Default::default()
        });
        let err = coordinator.cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Broker(_)));
        assert_eq!(err.to_string(), "broker error: [503]: broker down");
    }

    #[tokio::test]
    async fn test_drained_messages_processed_when_event_fetch_fails() {
        let handled = std::sync::Arc::new(AtomicUsize::new(0));
        let counted = handled.clone();

        let inbox = FakeInbox {
            events_unavailable: true,
            ..Default::default()
        };
        inbox.messages.lock().unwrap().extend([message("m-1"), message("m-2")]);
        let messages = Dispatcher::new("message").with_handler(FnHandler::always(
            "save_all",
            move |_: S3iMessage| {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        ));
        let coordinator = Coordinator::new(inbox, messages, Dispatcher::new("event"));

        let err = coordinator.cycle().await.unwrap_err();
        assert_eq!(err.to_string(), "broker error: [502]: event queue down");
        assert_eq!(handled.load(Ordering::SeqCst), 2);
        assert!(coordinator.inbox().messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_timeout() {
        let coordinator = coordinator(FakeInbox {
            stall: true,
            ..Default::default()
        })
        .with_cycle_timeout(Some(Duration::from_secs(5)));

        let err = coordinator.cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::TimedOut(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_exits_on_failure() {
        let coordinator = coordinator(FakeInbox {
            unavailable: true,
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let result = coordinator
            .run_forever(Duration::from_secs(60), true, rx)
            .await;
        assert!(matches!(result, Err(CycleError::Broker(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_keeps_going_until_shutdown() {
        let coordinator = std::sync::Arc::new(coordinator(FakeInbox {
            unavailable: true,
            ..Default::default()
        }));
        let (tx, rx) = watch::channel(false);

        let running = coordinator.clone();
        let handle = tokio::spawn(async move {
            running
                .run_forever(Duration::from_secs(60), false, rx)
                .await
        });

        // Three cycles start at t=0, t=60 and t=120.
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
        // Both queues are fetched in each of the three cycles.
        assert_eq!(coordinator.inbox().fetches.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_run_forever_returns_immediately_when_already_shut_down() {
        let coordinator = coordinator(FakeInbox::default());
        let (_tx, rx) = watch::channel(true);
        coordinator
            .run_forever(Duration::from_secs(60), true, rx)
            .await
            .unwrap();
        assert_eq!(coordinator.inbox().fetches.load(Ordering::SeqCst), 0);
    }
}
