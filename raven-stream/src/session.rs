//! A live connection to one gateway.
//!
//! [`DeviceSession::open`] synchronizes the stream, then spawns the read
//! loop that owns the [`FragmentReader`]. The session handle itself only
//! writes commands and manages subscriptions, so it can be shared behind an
//! `Arc` while events keep flowing.
//!
//! ```rust,ignore
//! let session = DeviceSession::open(transport, config).await?;
//! let mut events = session.subscribe();
//!
//! let request = CommandRequest::new("get_time", payload, ["TimeCluster"]);
//! let reply = session.send_command(&request, Duration::from_secs(5)).await?;
//!
//! while let Some(fragment) = events.recv().await {
//!     println!("{fragment}");
//! }
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use raven_parser::Fragment;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::CommandRequest;
use crate::config::SessionConfig;
use crate::correlator::CommandCorrelator;
use crate::error::{CloseReason, StreamError, StreamResult};
use crate::reader::FragmentReader;
use crate::router::EventRouter;
use crate::subscription::{EventHandler, EventSubscription, SubscriptionId};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed(CloseReason),
}

pub struct DeviceSession {
    writer: Mutex<BoxedWriter>,
    router: Arc<EventRouter>,
    correlator: Arc<CommandCorrelator>,
    config: SessionConfig,
    state: watch::Receiver<SessionState>,
    shutdown: Option<mpsc::Sender<()>>,
    read_task: Option<JoinHandle<()>>,
}

impl DeviceSession {
    /// Open a session over a bidirectional transport
    pub async fn open<T>(transport: T, config: SessionConfig) -> StreamResult<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(transport);
        Self::open_split(reader, writer, config).await
    }

    /// Open a session over separate read and write halves
    pub async fn open_split<R, W>(reader: R, writer: W, config: SessionConfig) -> StreamResult<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;

        let sequence = Arc::new(AtomicU64::new(0));
        let mut fragments =
            FragmentReader::with_config(reader, &config).with_sequence(Arc::clone(&sequence));

        if config.synchronize_on_open {
            fragments.synchronize(config.sync_timeout).await?;
        }

        let correlator = Arc::new(CommandCorrelator::new(sequence));
        let router = Arc::new(EventRouter::new(&config, Arc::clone(&correlator)));
        let (state_tx, state_rx) = watch::channel(SessionState::Open);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let read_task = tokio::spawn(read_loop(
            fragments,
            Arc::clone(&router),
            Arc::clone(&correlator),
            state_tx,
            shutdown_rx,
        ));
        info!(
            reply_roots = config.reply_roots.len(),
            synchronized = config.synchronize_on_open,
            "Device session opened"
        );

        Ok(Self {
            writer: Mutex::new(Box::new(writer)),
            router,
            correlator,
            config,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            read_task: Some(read_task),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Open)
    }

    /// Whether a reply-bearing command is currently outstanding
    pub fn is_awaiting_reply(&self) -> bool {
        self.correlator.is_awaiting()
    }

    /// Write `command` and wait up to `timeout` for its reply.
    ///
    /// Only one reply-bearing command may be outstanding; a second caller
    /// gets [`StreamError::Concurrency`] immediately.
    pub async fn send_command(
        &self,
        command: &CommandRequest,
        timeout: Duration,
    ) -> StreamResult<Fragment> {
        self.ensure_open()?;

        if !command.expects_reply() {
            return Err(StreamError::Configuration(format!(
                "Command '{}' has no reply roots; use send() instead",
                command.name()
            )));
        }
        if let Some(root) = command
            .reply_roots()
            .iter()
            .find(|root| !self.router.is_reply_root(root))
        {
            return Err(StreamError::Configuration(format!(
                "Reply root '{root}' of command '{}' is not configured as reply-capable",
                command.name()
            )));
        }

        let pending = self
            .correlator
            .issue(command.name(), command.reply_roots().iter().cloned(), timeout)?;
        self.write(command).await?;
        pending.wait().await
    }

    /// [`send_command`](Self::send_command) with the configured default timeout
    pub async fn query(&self, command: &CommandRequest) -> StreamResult<Fragment> {
        self.send_command(command, self.config.command_timeout).await
    }

    /// Write a command without waiting for any reply
    pub async fn send(&self, command: &CommandRequest) -> StreamResult<()> {
        self.ensure_open()?;
        self.write(command).await
    }

    async fn write(&self, command: &CommandRequest) -> StreamResult<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(command.payload()).await?;
        writer.flush().await?;
        debug!(command = command.name(), bytes = command.payload().len(), "Command written");
        Ok(())
    }

    fn ensure_open(&self) -> StreamResult<()> {
        match &*self.state.borrow() {
            SessionState::Open => Ok(()),
            SessionState::Closed(reason) => Err(StreamError::Cancelled(reason.clone())),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.router.subscribe()
    }

    pub fn subscribe_handler(&self, handler: Arc<dyn EventHandler>) -> StreamResult<SubscriptionId> {
        self.router.subscribe_handler(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.router.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }

    /// Resolves once the read loop has stopped
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.state.clone();
        loop {
            if let SessionState::Closed(reason) = &*state.borrow_and_update() {
                return reason.clone();
            }
            if state.changed().await.is_err() {
                return match &*state.borrow() {
                    SessionState::Closed(reason) => reason.clone(),
                    SessionState::Open => CloseReason::Requested,
                };
            }
        }
    }

    /// Stop the read loop, cancel any pending command and shut the
    /// transport down
    pub async fn close(mut self) -> StreamResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(()).await;
        }
        if let Some(task) = self.read_task.take() {
            if let Err(error) = task.await {
                warn!(%error, "Read loop ended abnormally");
            }
        }
        self.correlator.cancel(CloseReason::Requested);

        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        info!("Device session closed");
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
            self.correlator.cancel(CloseReason::Requested);
            self.router.clear();
        }
    }
}

async fn read_loop<R>(
    mut fragments: FragmentReader<R>,
    router: Arc<EventRouter>,
    correlator: Arc<CommandCorrelator>,
    state: watch::Sender<SessionState>,
    mut shutdown: mpsc::Receiver<()>,
) where
    R: AsyncRead + Unpin + Send,
{
    let reason = loop {
        tokio::select! {
            _ = shutdown.recv() => break CloseReason::Requested,
            next = fragments.next_fragment() => match next {
                Ok(Some(assembled)) => {
                    router.route(assembled);
                }
                Ok(None) => break CloseReason::EndOfStream,
                Err(StreamError::Framing(error)) => {
                    warn!(%error, "Framing error, resynchronizing");
                    correlator.fail(StreamError::Framing(error));
                    fragments.resynchronize();
                }
                Err(error) => break CloseReason::Io(error.to_string()),
            },
        }
    };

    correlator.cancel(reason.clone());
    router.clear();
    info!(%reason, "Read loop stopped");
    let _ = state.send(SessionState::Closed(reason));
}
