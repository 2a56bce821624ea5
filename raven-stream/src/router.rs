//! Routes each assembled fragment to exactly one destination.
//!
//! ```text
//! fragment ─┬─ warning root ───────────► fail pending command
//!           ├─ reply-capable root ─────► correlator ──(no match)──► policy
//!           └─ anything else ──────────► every live subscriber, in order
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use raven_parser::Fragment;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::{SessionConfig, UnmatchedReplyPolicy};
use crate::correlator::CommandCorrelator;
use crate::error::{StreamError, StreamResult};
use crate::reader::Assembled;
use crate::subscription::{run_handler, EventHandler, EventSubscription, SubscriptionId};

/// Where a fragment ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Fulfilled the pending command
    Reply,
    /// Broadcast to this many subscribers
    Event { delivered: usize },
    /// Reply-capable fragment with no command waiting for it, discarded
    Unmatched,
    /// Device warning; `failed_pending` tells whether a command was waiting
    Warning { failed_pending: bool },
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Arc<Fragment>>,
}

/// Fragment dispatcher shared by the read loop and the session handle
pub struct EventRouter {
    reply_roots: BTreeSet<String>,
    warning_root: Option<String>,
    unmatched_reply: UnmatchedReplyPolicy,
    correlator: Arc<CommandCorrelator>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscription: AtomicU64,
}

impl EventRouter {
    pub fn new(config: &SessionConfig, correlator: Arc<CommandCorrelator>) -> Self {
        Self {
            reply_roots: config.reply_roots.clone(),
            warning_root: config.warning_root.clone(),
            unmatched_reply: config.unmatched_reply,
            correlator,
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn is_reply_root(&self, root: &str) -> bool {
        self.reply_roots.contains(root)
    }

    pub fn route(&self, assembled: Assembled) -> RouteOutcome {
        let Assembled { sequence, fragment } = assembled;

        if self.warning_root.as_deref() == Some(fragment.root()) {
            let message = fragment.first_text().unwrap_or("unspecified warning").to_string();
            let failed_pending = self.correlator.fail(StreamError::DeviceWarning(message.clone()));
            warn!(%message, failed_pending, "Device warning");
            return RouteOutcome::Warning { failed_pending };
        }

        if self.is_reply_root(fragment.root()) {
            let fragment = match self.correlator.fulfill(sequence, fragment) {
                Ok(()) => return RouteOutcome::Reply,
                Err(fragment) => fragment,
            };
            match self.unmatched_reply {
                UnmatchedReplyPolicy::Drop => {
                    debug!(root = fragment.root(), "Reply with no pending command, dropped");
                    return RouteOutcome::Unmatched;
                }
                UnmatchedReplyPolicy::Warn => {
                    warn!(root = fragment.root(), "Reply with no pending command, dropped");
                    return RouteOutcome::Unmatched;
                }
                UnmatchedReplyPolicy::DeliverAsEvent => {
                    return self.broadcast(fragment);
                }
            }
        }

        self.broadcast(fragment)
    }

    fn broadcast(&self, fragment: Fragment) -> RouteOutcome {
        let fragment = Arc::new(fragment);
        let mut delivered = 0;
        let mut closed = Vec::new();

        for subscriber in self.subscribers.read().iter() {
            if subscriber.sender.send(Arc::clone(&fragment)).is_ok() {
                delivered += 1;
            } else {
                closed.push(subscriber.id);
            }
        }

        if !closed.is_empty() {
            self.subscribers
                .write()
                .retain(|subscriber| !closed.contains(&subscriber.id));
            debug!(pruned = closed.len(), "Removed closed subscribers");
        }

        trace!(root = fragment.root(), delivered, "Event delivered");
        RouteOutcome::Event { delivered }
    }

    fn register(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Arc<Fragment>>) {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.write().push(Subscriber { id, sender });
        debug!(subscription = %id, "Subscriber registered");
        (id, receiver)
    }

    /// Queue every later event for the returned subscription, without a
    /// limit on how many wait unread.
    pub fn subscribe(&self) -> EventSubscription {
        let (id, receiver) = self.register();
        EventSubscription::new(id, receiver)
    }

    /// Run `handler` on its own task for every event.
    ///
    /// Fails outside a Tokio runtime.
    pub fn subscribe_handler(&self, handler: Arc<dyn EventHandler>) -> StreamResult<SubscriptionId> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            StreamError::Configuration(format!("event handlers need a Tokio runtime: {e}"))
        })?;
        let (id, receiver) = self.register();
        runtime.spawn(run_handler(id, handler, receiver));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Drop every subscriber, ending their streams
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn router(policy: UnmatchedReplyPolicy) -> (EventRouter, Arc<CommandCorrelator>) {
        let config = SessionConfig::default()
            .with_reply_roots(["TimeCluster", "DeviceInfo"])
            .with_unmatched_reply(policy);
        let correlator = Arc::new(CommandCorrelator::new(Arc::new(AtomicU64::new(0))));
        (EventRouter::new(&config, Arc::clone(&correlator)), correlator)
    }

    fn assembled(sequence: u64, xml: &str) -> Assembled {
        Assembled {
            sequence,
            fragment: Fragment::from_xml(xml).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_events_reach_every_subscriber_in_order() {
        let (router, _) = router(UnmatchedReplyPolicy::Drop);
        let mut first = router.subscribe();
        let mut second = router.subscribe();

        assert_eq!(
            router.route(assembled(0, "<PriceCluster/>")),
            RouteOutcome::Event { delivered: 2 }
        );
        router.route(assembled(1, "<InstantaneousDemand/>"));

        for subscription in [&mut first, &mut second] {
            assert_eq!(subscription.recv().await.unwrap().root(), "PriceCluster");
            assert_eq!(subscription.recv().await.unwrap().root(), "InstantaneousDemand");
        }
    }

    #[tokio::test]
    async fn test_unread_events_queue_without_blocking_routing() {
        let (router, _) = router(UnmatchedReplyPolicy::Drop);
        let mut subscription = router.subscribe();

        for sequence in 0..1000 {
            router.route(assembled(sequence, "<InstantaneousDemand/>"));
        }
        router.clear();

        let mut received = 0;
        while subscription.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 1000);
    }

    #[tokio::test]
    async fn test_reply_goes_to_pending_command_only() {
        let (router, correlator) = router(UnmatchedReplyPolicy::Drop);
        let mut events = router.subscribe();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        assert_eq!(router.route(assembled(0, "<TimeCluster/>")), RouteOutcome::Reply);
        assert_eq!(pending.wait().await.unwrap().root(), "TimeCluster");
        assert!(events.try_recv().is_none());
    }

    #[rstest::rstest]
    #[case(UnmatchedReplyPolicy::Drop)]
    #[case(UnmatchedReplyPolicy::Warn)]
    fn test_unmatched_reply_is_discarded(#[case] policy: UnmatchedReplyPolicy) {
        let (router, _) = router(policy);
        let mut events = router.subscribe();

        assert_eq!(router.route(assembled(0, "<DeviceInfo/>")), RouteOutcome::Unmatched);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unmatched_reply_can_be_delivered_as_event() {
        let (router, _) = router(UnmatchedReplyPolicy::DeliverAsEvent);
        let mut events = router.subscribe();

        assert_eq!(
            router.route(assembled(0, "<DeviceInfo/>")),
            RouteOutcome::Event { delivered: 1 }
        );
        assert_eq!(events.recv().await.unwrap().root(), "DeviceInfo");
    }

    #[tokio::test]
    async fn test_warning_fails_pending_command_and_is_not_broadcast() {
        let (router, correlator) = router(UnmatchedReplyPolicy::Drop);
        let mut events = router.subscribe();
        let pending = correlator
            .issue("bogus", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        let outcome = router.route(assembled(0, "<Warning><Text>Unknown command</Text></Warning>"));
        assert_eq!(outcome, RouteOutcome::Warning { failed_pending: true });
        assert!(matches!(
            pending.wait().await,
            Err(StreamError::DeviceWarning(message)) if message == "Unknown command"
        ));
        assert!(events.try_recv().is_none());

        let outcome = router.route(assembled(1, "<Warning><Text>Again</Text></Warning>"));
        assert_eq!(outcome, RouteOutcome::Warning { failed_pending: false });
    }

    #[test]
    fn test_dropped_subscriptions_are_pruned() {
        let (router, _) = router(UnmatchedReplyPolicy::Drop);
        let kept = router.subscribe();
        drop(router.subscribe());
        assert_eq!(router.subscriber_count(), 2);

        assert_eq!(
            router.route(assembled(0, "<PriceCluster/>")),
            RouteOutcome::Event { delivered: 1 }
        );
        assert_eq!(router.subscriber_count(), 1);
        assert!(router.unsubscribe(kept.id()));
        assert!(!router.unsubscribe(kept.id()));
    }

    #[test]
    fn test_subscribe_handler_outside_runtime() {
        struct Noop;

        #[async_trait::async_trait]
        impl EventHandler for Noop {
            async fn handle(&self, _fragment: Arc<Fragment>) -> Result<(), crate::HandlerError> {
                Ok(())
            }
        }

        let (router, _) = router(UnmatchedReplyPolicy::Drop);
        assert!(matches!(
            router.subscribe_handler(Arc::new(Noop)),
            Err(StreamError::Configuration(_))
        ));
    }
}
