//! Handler contract.
//!
//! A handler is a named pair of a predicate ("am I suited for this item?")
//! and an async action. Handlers are registered once at startup with a
//! [`Dispatcher`](super::Dispatcher) and never change afterwards.

use async_trait::async_trait;
use compact_str::CompactString;
use std::future::Future;
use std::pin::Pin;

#[async_trait]
pub trait Handler<T>: Send + Sync {
    /// Diagnostic name, used in logs and failure reports. Not required to be
    /// unique.
    fn name(&self) -> &str;

    /// Whether this handler wants to see `item`.
    fn matches(&self, item: &T) -> bool;

    /// Act on `item`. Only called when [`matches`](Self::matches) returned
    /// `true`.
    async fn run(&self, item: &T) -> anyhow::Result<()>;
}

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Action<T> =
    Box<dyn Fn(T) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// A handler assembled from two closures.
///
/// The action receives its own clone of the item.
pub struct FnHandler<T> {
    name: CompactString,
    predicate: Predicate<T>,
    action: Action<T>,
}

impl<T> FnHandler<T> {
    pub fn new<P, A, F>(name: impl Into<CompactString>, predicate: P, action: A) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        A: Fn(T) -> F + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            action: Box::new(move |item| Box::pin(action(item))),
        }
    }

    /// A handler that matches every item.
    pub fn always<A, F>(name: impl Into<CompactString>, action: A) -> Self
    where
        A: Fn(T) -> F + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, |_| true, action)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Handler<T> for FnHandler<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, item: &T) -> bool {
        (self.predicate)(item)
    }

    async fn run(&self, item: &T) -> anyhow::Result<()> {
        (self.action)(item.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(
            "even",
            |n: &u32| n % 2 == 0,
            |n: u32| async move {
                anyhow::ensure!(n < 100, "{n} is too large");
                Ok(())
            },
        );

        assert_eq!(handler.name(), "even");
        assert!(handler.matches(&4));
        assert!(!handler.matches(&5));
        assert!(handler.run(&4).await.is_ok());
        assert_eq!(
            handler.run(&200).await.unwrap_err().to_string(),
            "200 is too large"
        );
    }
}
