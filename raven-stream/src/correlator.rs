//! Matches gateway replies to the single outstanding command.
//!
//! The gateway answers commands on the same stream it uses for unsolicited
//! reports and carries no request id, so at most one reply-bearing command
//! may be in flight. The slot below is the only state shared between the
//! read loop and command callers; every transition on it happens under one
//! short lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use raven_parser::Fragment;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CloseReason, StreamError, StreamResult};

struct PendingCommand {
    ticket: u64,
    command: String,
    expected_roots: Vec<String>,
    /// First stream sequence number allowed to answer
    not_before: u64,
    reply: oneshot::Sender<StreamResult<Fragment>>,
}

impl PendingCommand {
    fn accepts(&self, sequence: u64, root: &str) -> bool {
        sequence >= self.not_before && self.expected_roots.iter().any(|r| r == root)
    }
}

/// Single-slot command correlator.
pub struct CommandCorrelator {
    slot: Mutex<Option<PendingCommand>>,
    next_ticket: AtomicU64,
    sequence: Arc<AtomicU64>,
}

impl CommandCorrelator {
    /// `sequence` is the counter the fragment reader numbers fragments with
    pub fn new(sequence: Arc<AtomicU64>) -> Self {
        Self {
            slot: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
            sequence,
        }
    }

    /// Claim the slot for `command`.
    ///
    /// Fails with [`StreamError::Concurrency`] while another command is
    /// pending. The returned [`PendingReply`] releases the slot when it is
    /// resolved or dropped.
    pub fn issue<I, S>(
        self: &Arc<Self>,
        command: &str,
        expected_roots: I,
        timeout: Duration,
    ) -> StreamResult<PendingReply>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slot = self.slot.lock();
        if let Some(pending) = slot.as_ref() {
            return Err(StreamError::Concurrency {
                pending: pending.command.clone(),
                rejected: command.to_string(),
            });
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        *slot = Some(PendingCommand {
            ticket,
            command: command.to_string(),
            expected_roots: expected_roots.into_iter().map(Into::into).collect(),
            not_before: self.sequence.load(Ordering::SeqCst),
            reply,
        });
        debug!(command, ticket, "Command issued");

        Ok(PendingReply {
            ticket,
            command: command.to_string(),
            timeout,
            deadline: Instant::now().checked_add(timeout),
            receiver,
            correlator: Arc::clone(self),
        })
    }

    /// Complete the pending command with `fragment` if it is an acceptable
    /// reply; otherwise hand the fragment back.
    pub fn fulfill(&self, sequence: u64, fragment: Fragment) -> Result<(), Fragment> {
        let pending = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(pending) if pending.accepts(sequence, fragment.root()) => slot.take(),
                _ => None,
            }
        };
        let Some(pending) = pending else {
            return Err(fragment);
        };

        debug!(command = %pending.command, root = fragment.root(), "Reply matched");
        match pending.reply.send(Ok(fragment)) {
            Ok(()) => Ok(()),
            Err(Ok(fragment)) => Err(fragment),
            Err(Err(_)) => Ok(()),
        }
    }

    /// Fail the pending command, if any, with `error`.
    pub fn fail(&self, error: StreamError) -> bool {
        let Some(pending) = self.slot.lock().take() else {
            return false;
        };
        debug!(command = %pending.command, %error, "Pending command failed");
        let _ = pending.reply.send(Err(error));
        true
    }

    pub fn cancel(&self, reason: CloseReason) -> bool {
        self.fail(StreamError::Cancelled(reason))
    }

    pub fn is_awaiting(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Name of the command currently holding the slot
    pub fn pending_command(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|p| p.command.clone())
    }

    /// Clear the slot if it still belongs to `ticket`.
    fn expire(&self, ticket: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.ticket == ticket) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

/// Handle for awaiting the reply to an issued command.
pub struct PendingReply {
    ticket: u64,
    command: String,
    timeout: Duration,
    /// `None` when the timeout is too large to represent, waiting forever
    deadline: Option<Instant>,
    receiver: oneshot::Receiver<StreamResult<Fragment>>,
    correlator: Arc<CommandCorrelator>,
}

impl PendingReply {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the reply until the deadline set at issue time.
    pub async fn wait(mut self) -> StreamResult<Fragment> {
        let received = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, &mut self.receiver).await,
            None => Ok((&mut self.receiver).await),
        };
        match received {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StreamError::Cancelled(CloseReason::Requested)),
            Err(_) => {
                if self.correlator.expire(self.ticket) {
                    warn!(command = %self.command, timeout = ?self.timeout, "Command timed out");
                    return Err(StreamError::Timeout {
                        command: self.command.clone(),
                        timeout: self.timeout,
                    });
                }
                // resolved between the deadline firing and the slot check
                match self.receiver.try_recv() {
                    Ok(result) => result,
                    Err(_) => Err(StreamError::Timeout {
                        command: self.command.clone(),
                        timeout: self.timeout,
                    }),
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.correlator.expire(self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlator() -> (Arc<CommandCorrelator>, Arc<AtomicU64>) {
        let sequence = Arc::new(AtomicU64::new(0));
        (Arc::new(CommandCorrelator::new(Arc::clone(&sequence))), sequence)
    }

    fn fragment(root: &str) -> Fragment {
        Fragment::new(root, Vec::new())
    }

    #[tokio::test]
    async fn test_matching_reply_fulfills() {
        let (correlator, _) = correlator();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        assert!(correlator.fulfill(0, fragment("TimeCluster")).is_ok());
        assert!(!correlator.is_awaiting());
        assert_eq!(pending.wait().await.unwrap().root(), "TimeCluster");
    }

    #[tokio::test]
    async fn test_non_matching_root_is_returned() {
        let (correlator, _) = correlator();
        let _pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        let returned = correlator.fulfill(0, fragment("PriceCluster")).unwrap_err();
        assert_eq!(returned.root(), "PriceCluster");
        assert!(correlator.is_awaiting());
    }

    #[tokio::test]
    async fn test_fragment_completed_before_issue_is_ignored() {
        let (correlator, sequence) = correlator();
        sequence.store(5, Ordering::SeqCst);
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        assert!(correlator.fulfill(4, fragment("TimeCluster")).is_err());
        assert!(correlator.fulfill(5, fragment("TimeCluster")).is_ok());
        assert!(pending.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_issue_is_rejected() {
        let (correlator, _) = correlator();
        let first = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .unwrap();

        let result = correlator.issue("get_device_info", ["DeviceInfo"], Duration::from_secs(1));
        match result {
            Err(StreamError::Concurrency { pending, rejected }) => {
                assert_eq!(pending, "get_time");
                assert_eq!(rejected, "get_device_info");
            }
            _ => panic!("expected a concurrency error"),
        }

        // the rejection leaves the first command waiting for its reply
        assert!(correlator.fulfill(0, fragment("TimeCluster")).is_ok());
        assert_eq!(first.wait().await.unwrap().root(), "TimeCluster");
    }

    #[tokio::test]
    async fn test_unbounded_timeout_waits_for_reply() {
        let (correlator, _) = correlator();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::MAX)
            .unwrap();

        assert!(correlator.fulfill(0, fragment("TimeCluster")).is_ok());
        assert_eq!(pending.wait().await.unwrap().root(), "TimeCluster");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_frees_slot() {
        let (correlator, _) = correlator();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_millis(100))
            .unwrap();

        let result = pending.wait().await;
        assert!(matches!(result, Err(StreamError::Timeout { ref command, .. }) if command == "get_time"));
        assert!(!correlator.is_awaiting());

        // a late reply is no longer accepted
        assert!(correlator.fulfill(0, fragment("TimeCluster")).is_err());
        assert!(correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(1))
            .is_ok());
    }

    #[tokio::test]
    async fn test_cancel_reaches_waiter() {
        let (correlator, _) = correlator();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(5))
            .unwrap();

        assert!(correlator.cancel(CloseReason::EndOfStream));
        assert!(matches!(
            pending.wait().await,
            Err(StreamError::Cancelled(CloseReason::EndOfStream))
        ));
        assert!(!correlator.cancel(CloseReason::Requested));
    }

    #[tokio::test]
    async fn test_dropping_pending_reply_releases_slot() {
        let (correlator, _) = correlator();
        let pending = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(5))
            .unwrap();
        assert_eq!(correlator.pending_command().as_deref(), Some("get_time"));

        drop(pending);
        assert!(!correlator.is_awaiting());
    }

    #[tokio::test]
    async fn test_stale_drop_does_not_clear_newer_command() {
        let (correlator, _) = correlator();
        let first = correlator
            .issue("get_time", ["TimeCluster"], Duration::from_secs(5))
            .unwrap();
        assert!(correlator.fulfill(0, fragment("TimeCluster")).is_ok());

        let _second = correlator
            .issue("get_device_info", ["DeviceInfo"], Duration::from_secs(5))
            .unwrap();
        drop(first);

        assert_eq!(correlator.pending_command().as_deref(), Some("get_device_info"));
    }
}
