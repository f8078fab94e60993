//! Handler registry and fan-out processor.
//!
//! The dispatcher selects every registered handler whose predicate matches
//! an item, runs each of them exactly once and reports the outcome. A
//! failing handler never keeps the remaining handlers, or the remaining
//! items of a batch, from running.

use compact_str::CompactString;
use futures_util::future::join_all;
use futures_util::{FutureExt, StreamExt};
use kanau::processor::Processor;
use std::fmt;
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::handler::Handler;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// One handler failing on one item.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Description of the item the handler failed on.
    pub scope: String,
    pub handler: CompactString,
    pub error: anyhow::Error,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler '{}' failed on {}: {:#}",
            self.handler, self.scope, self.error
        )
    }
}

/// Names of the handlers that completed successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub succeeded: Vec<CompactString>,
}

impl ProcessReport {
    fn absorb(&mut self, other: ProcessReport) {
        self.succeeded.extend(other.succeeded);
    }
}

/// At least one handler failed.
///
/// Failures keep the order in which they were recorded; merging
/// concatenates.
#[derive(Debug)]
pub struct AggregateError {
    pub failures: Vec<HandlerFailure>,
    pub succeeded: Vec<CompactString>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handler(s) failed: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl AggregateError {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Concatenate several aggregates into one. `None` when there is
    /// nothing to merge.
    pub fn merge(errors: impl IntoIterator<Item = AggregateError>) -> Option<AggregateError> {
        errors.into_iter().reduce(|mut acc, next| {
            acc.failures.extend(next.failures);
            acc.succeeded.extend(next.succeeded);
            acc
        })
    }

    /// Fold a batch of per-item outcomes into one.
    pub fn collect(
        outcomes: impl IntoIterator<Item = Result<ProcessReport, AggregateError>>,
    ) -> Result<ProcessReport, AggregateError> {
        let mut report = ProcessReport::default();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(r) => report.absorb(r),
                Err(e) => errors.push(e),
            }
        }
        match AggregateError::merge(errors) {
            None => Ok(report),
            Some(mut err) => {
                let mut succeeded = report.succeeded;
                succeeded.append(&mut err.succeeded);
                err.succeeded = succeeded;
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub type SharedHandler<T> = Arc<dyn Handler<T>>;

/// Registry of handlers for one item kind (messages or events).
pub struct Dispatcher<T> {
    kind: &'static str,
    handlers: Vec<SharedHandler<T>>,
    max_concurrency: Option<NonZeroUsize>,
}

impl<T> Dispatcher<T>
where
    T: fmt::Display + Send + Sync + 'static,
{
    /// `kind` names the item kind in logs, e.g. `"message"`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: Vec::new(),
            max_concurrency: None,
        }
    }

    /// Limit how many items [`process_all`](Self::process_all) works on at
    /// once. `None` or `0` means unbounded.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.and_then(NonZeroUsize::new);
        self
    }

    pub fn with_handler(mut self, handler: impl Handler<T> + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    pub fn register(&mut self, handler: SharedHandler<T>) -> &mut Self {
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            warn!(
                kind = self.kind,
                handler = handler.name(),
                "Registering a second handler with the same name"
            );
        }
        self.handlers.push(handler);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Every handler whose predicate matches `item`, in registration order.
    pub fn find_handlers(&self, item: &T) -> Vec<&SharedHandler<T>> {
        let found: Vec<_> = self.handlers.iter().filter(|h| h.matches(item)).collect();
        match found.len() {
            0 => warn!(kind = self.kind, %item, "No handler found"),
            1 => {}
            _ => debug!(
                kind = self.kind,
                %item,
                handlers = ?found.iter().map(|h| h.name()).collect::<Vec<_>>(),
                "Multiple handlers found"
            ),
        }
        found
    }

    /// Run every matching handler on `item`, one after another.
    pub async fn process(&self, item: &T) -> Result<ProcessReport, AggregateError> {
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();

        for handler in self.find_handlers(item) {
            let outcome = AssertUnwindSafe(handler.run(item))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panic_error(payload)));
            match outcome {
                Ok(()) => {
                    debug!(kind = self.kind, handler = handler.name(), %item, "Handled");
                    succeeded.push(CompactString::from(handler.name()));
                }
                Err(error) => {
                    let detail = format!("{error:#}");
                    error!(
                        kind = self.kind,
                        handler = handler.name(),
                        %item,
                        error = %detail,
                        "Handler failed"
                    );
                    failures.push(HandlerFailure {
                        scope: item.to_string(),
                        handler: handler.name().into(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(ProcessReport { succeeded })
        } else {
            Err(AggregateError {
                failures,
                succeeded,
            })
        }
    }

    /// Process every item concurrently and merge the outcomes.
    pub async fn process_all(&self, items: &[T]) -> Result<ProcessReport, AggregateError> {
        if items.is_empty() {
            debug!(kind = self.kind, "Nothing to process");
            return Ok(ProcessReport::default());
        }

        let pending: Vec<_> = items.iter().map(|item| self.process(item)).collect();
        let outcomes = match self.max_concurrency {
            None => join_all(pending).await,
            Some(limit) => {
                futures_util::stream::iter(pending)
                    .buffered(limit.get())
                    .collect::<Vec<_>>()
                    .await
            }
        };

        AggregateError::collect(outcomes)
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow::anyhow!("handler panicked: {message}")
}

impl<T> Processor<T> for Dispatcher<T>
where
    T: fmt::Display + Send + Sync + 'static,
{
    type Output = ProcessReport;
    type Error = AggregateError;

    async fn process(&self, item: T) -> Result<ProcessReport, AggregateError> {
        Dispatcher::process(self, &item).await
    }
}
