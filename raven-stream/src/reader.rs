//! Async fragment source over any byte transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use raven_parser::Fragment;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::assembler::{FragmentAssembler, DEFAULT_MAX_BUFFER_SIZE};
use crate::config::SessionConfig;
use crate::error::{CloseReason, FramingError, StreamError, StreamResult};

const DEFAULT_CHUNK_SIZE: usize = 1024;

/// A fragment tagged with its position in the stream.
///
/// Sequence numbers come from a counter shared with the command correlator,
/// which uses them to ignore fragments that completed before a command was
/// issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub sequence: u64,
    pub fragment: Fragment,
}

/// Reads chunks from `R` and yields complete fragments in stream order.
pub struct FragmentReader<R> {
    source: R,
    assembler: FragmentAssembler,
    ready: VecDeque<Assembled>,
    pending_error: Option<FramingError>,
    chunk: Vec<u8>,
    sequence: Arc<AtomicU64>,
    finished: bool,
}

impl<R> FragmentReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(source: R) -> Self {
        Self::build(source, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_config(source: R, config: &SessionConfig) -> Self {
        Self::build(source, config.read_chunk_size, config.max_buffer_size)
    }

    fn build(source: R, chunk_size: usize, max_buffer_size: usize) -> Self {
        Self {
            source,
            assembler: FragmentAssembler::with_max_buffer_size(max_buffer_size),
            ready: VecDeque::new(),
            pending_error: None,
            chunk: vec![0; chunk_size.max(1)],
            sequence: Arc::new(AtomicU64::new(0)),
            finished: false,
        }
    }

    /// Number fragments from `counter` instead of a private counter
    pub fn with_sequence(mut self, counter: Arc<AtomicU64>) -> Self {
        self.sequence = counter;
        self
    }

    pub fn sequence_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.sequence)
    }

    /// Next complete fragment, or `None` once the transport reports end of
    /// stream.
    ///
    /// Fragments completed before a framing error are returned first; the
    /// error follows. Cancel safe: dropping the future loses no data.
    pub async fn next_fragment(&mut self) -> StreamResult<Option<Assembled>> {
        loop {
            if let Some(assembled) = self.ready.pop_front() {
                return Ok(Some(assembled));
            }
            if let Some(error) = self.pending_error.take() {
                return Err(error.into());
            }
            if self.finished {
                return Ok(None);
            }

            let read = self.source.read(&mut self.chunk).await?;
            if read == 0 {
                self.finished = true;
                if self.assembler.buffered_len() > 0 {
                    debug!(
                        buffered = self.assembler.buffered_len(),
                        "Stream ended inside an incomplete fragment"
                    );
                }
                continue;
            }
            if let Err(error) = self.absorb(read) {
                self.pending_error = Some(error);
            }
        }
    }

    /// Discard input up to the next fragment boundary.
    ///
    /// Completes once the truncated leading fragment (or, on a clean
    /// boundary, the first complete fragment) has been consumed. Fragments
    /// that follow it in the same read are kept for `next_fragment`.
    pub async fn synchronize(&mut self, timeout: Duration) -> StreamResult<()> {
        self.ready.clear();
        self.pending_error = None;
        self.assembler.begin_resync();
        match tokio::time::timeout(timeout, self.discard_leading()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "No fragment boundary found while synchronizing");
                Err(StreamError::SynchronizationTimeout(timeout))
            }
        }
    }

    /// Skip past the bytes that caused the last framing error and realign
    /// on the next fragment boundary.
    ///
    /// Bytes already read behind the error are rescanned, so fragments that
    /// follow it in the same read are kept. A further error among them is
    /// reported by the next call to `next_fragment`.
    pub fn resynchronize(&mut self) {
        self.pending_error = None;
        self.assembler.recover();
        if let Err(error) = self.absorb(0) {
            self.pending_error = Some(error);
        }
    }

    pub fn is_synchronizing(&self) -> bool {
        self.assembler.is_resynchronizing()
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    async fn discard_leading(&mut self) -> StreamResult<()> {
        while self.assembler.is_resynchronizing() {
            let read = self.source.read(&mut self.chunk).await?;
            if read == 0 {
                self.finished = true;
                return Err(StreamError::Cancelled(CloseReason::EndOfStream));
            }
            let mut absorbed = self.absorb(read);
            while let Err(error) = absorbed {
                // the boundary was false, so whatever it produced is too
                debug!(
                    %error,
                    dropped = self.ready.len(),
                    "Framing error right after a boundary, discarding again"
                );
                self.ready.clear();
                self.assembler.recover();
                absorbed = self.absorb(0);
            }
        }
        debug!(queued = self.ready.len(), "Stream synchronized");
        Ok(())
    }

    fn absorb(&mut self, len: usize) -> Result<(), FramingError> {
        let Self {
            assembler,
            ready,
            chunk,
            sequence,
            ..
        } = self;

        assembler.feed(&chunk[..len], |fragment| {
            let sequence = sequence.fetch_add(1, Ordering::SeqCst);
            ready.push_back(Assembled { sequence, fragment });
        })
    }
}
