//! Processing pipeline.
//!
//! - `Handler`: predicate + async action for one item kind
//! - `Dispatcher`: selects matching handlers, runs them, aggregates failures
//! - `Coordinator`: pulls from the broker and feeds the dispatchers

pub mod coordinator;
pub mod dispatcher;
pub mod handler;

pub use coordinator::{Coordinator, CycleError, Inbox};
pub use dispatcher::{AggregateError, Dispatcher, HandlerFailure, ProcessReport, SharedHandler};
pub use handler::{FnHandler, Handler};
