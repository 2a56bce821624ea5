//! Subscriber side of event fan-out.
//!
//! Two ways to consume unsolicited fragments:
//!
//! - [`EventSubscription`]: a channel receiver usable with `recv().await` or
//!   as a [`futures::Stream`]
//! - [`EventHandler`]: an async callback run on its own task

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use raven_parser::Fragment;
use tokio::sync::mpsc;
use tracing::warn;

/// Identifies one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Error type returned by event handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Async callback for unsolicited fragments.
///
/// Each registered handler gets a dedicated task fed by an unbounded
/// channel, so a slow handler delays only itself.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, fragment: Arc<Fragment>) -> Result<(), HandlerError>;

    /// Called when `handle` fails
    fn on_error(&self, subscription: SubscriptionId, fragment: &Fragment, error: HandlerError) {
        warn!(%subscription, root = fragment.root(), %error, "Event handler failed");
    }
}

/// Channel-backed stream of unsolicited fragments.
///
/// Ends when the session closes. Dropping it unregisters the subscriber on
/// the next delivery.
///
/// The channel is unbounded so the read loop never waits on a slow
/// consumer. Events queue in memory until `recv` takes them; a subscription
/// that is kept but never polled grows without limit, so drop it once it
/// is no longer read.
pub struct EventSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Arc<Fragment>>,
}

impl EventSubscription {
    pub(crate) fn new(id: SubscriptionId, receiver: mpsc::UnboundedReceiver<Arc<Fragment>>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next fragment, or `None` once the session is gone
    pub async fn recv(&mut self) -> Option<Arc<Fragment>> {
        self.receiver.recv().await
    }

    /// Next fragment if one is already queued
    pub fn try_recv(&mut self) -> Option<Arc<Fragment>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventSubscription {
    type Item = Arc<Fragment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

pub(crate) async fn run_handler(
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    mut receiver: mpsc::UnboundedReceiver<Arc<Fragment>>,
) {
    while let Some(fragment) = receiver.recv().await {
        if let Err(error) = handler.handle(Arc::clone(&fragment)).await {
            handler.on_error(id, &fragment, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscription_as_stream() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscription = EventSubscription::new(SubscriptionId(7), receiver);

        sender.send(Arc::new(Fragment::new("A", Vec::new()))).unwrap();
        sender.send(Arc::new(Fragment::new("B", Vec::new()))).unwrap();
        drop(sender);

        assert_eq!(subscription.id().to_string(), "sub-7");
        assert_eq!(subscription.recv().await.unwrap().root(), "A");
        let rest: Vec<Arc<Fragment>> = subscription.collect().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].root(), "B");
    }

    struct Failing {
        errors: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, fragment: Arc<Fragment>) -> Result<(), HandlerError> {
            Err(format!("cannot handle {}", fragment.root()).into())
        }

        fn on_error(&self, _subscription: SubscriptionId, _fragment: &Fragment, error: HandlerError) {
            self.errors.lock().push(error.to_string());
        }
    }

    #[tokio::test]
    async fn test_handler_errors_go_to_on_error() {
        let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let handler = Arc::new(Failing {
            errors: Arc::clone(&errors),
        });
        let (sender, receiver) = mpsc::unbounded_channel();

        sender.send(Arc::new(Fragment::new("PriceCluster", Vec::new()))).unwrap();
        drop(sender);
        run_handler(SubscriptionId(1), handler, receiver).await;

        assert_eq!(*errors.lock(), vec!["cannot handle PriceCluster".to_string()]);
    }
}
