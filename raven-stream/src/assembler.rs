//! Splits the gateway byte stream into complete fragments.
//!
//! The gateway writes one top-level element after another with no length
//! prefix or delimiter, and a serial read can end anywhere: mid-tag, mid-text
//! or between fragments. [`FragmentAssembler`] buffers incoming chunks,
//! tracks the open-element stack with a lightweight tag scanner, and only
//! runs the XML parser once a top-level element has been closed.
//!
//! ```text
//! chunk ─► buffer ─► tag scan ─► depth back to 0? ─► Fragment::from_bytes ─► sink
//!                         │
//!                         └─ stray byte / bad close ─► FramingError
//! ```
//!
//! In resynchronizing mode (used right after a connection opens or after a
//! framing error) the scanner tolerates the tail of a truncated fragment and
//! discards everything up to the first opening tag that follows it.

use bytes::{Buf, BytesMut};
use raven_parser::Fragment;
use tracing::{debug, trace};

use crate::error::FramingError;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Default ceiling for an incomplete fragment.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Aligned,
    /// `discarded` turns true once some element or stray byte was dropped
    Resync { discarded: bool },
}

#[derive(Debug, PartialEq, Eq)]
enum TagKind {
    Open(String),
    Close(String),
    Empty(String),
    /// Comment, CDATA, declaration or processing instruction
    Markup,
}

#[derive(Debug, PartialEq, Eq)]
struct Tag {
    kind: TagKind,
    len: usize,
}

/// Incremental fragment framer.
#[derive(Debug)]
pub struct FragmentAssembler {
    buffer: BytesMut,
    /// Next unscanned byte in `buffer`
    cursor: usize,
    /// Where the current top-level fragment begins in `buffer`
    start: Option<usize>,
    open: Vec<String>,
    mode: Mode,
    /// Bytes already dropped from the front of `buffer`; error offsets
    /// count from the last reset
    consumed: usize,
    /// Where scanning resumes after [`recover`](Self::recover), set when a
    /// framing error is reported
    resume_at: Option<usize>,
    max_buffer_size: usize,
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            cursor: 0,
            start: None,
            open: Vec::new(),
            mode: Mode::Aligned,
            consumed: 0,
            resume_at: None,
            max_buffer_size,
        }
    }

    /// Append `chunk` and hand every fragment it completes to `sink`, in
    /// stream order.
    ///
    /// On error the buffer is left as it was at the offending byte; feeding
    /// more data reports the same error until [`recover`](Self::recover),
    /// [`reset`](Self::reset) or [`begin_resync`](Self::begin_resync) is
    /// called.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F) -> Result<(), FramingError>
    where
        F: FnMut(Fragment),
    {
        self.buffer.extend_from_slice(chunk);
        self.scan(&mut sink)?;
        self.compact();

        if self.buffer.len() > self.max_buffer_size {
            self.resume_at = Some(self.buffer.len());
            return Err(FramingError::BufferOverflow {
                buffered: self.buffer.len(),
                limit: self.max_buffer_size,
            });
        }
        Ok(())
    }

    /// Drop buffered bytes and the open-element stack. Offsets in later
    /// errors count from here.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.start = None;
        self.open.clear();
        self.mode = Mode::Aligned;
        self.consumed = 0;
        self.resume_at = None;
    }

    /// Reset, then discard input up to the next fragment boundary.
    pub fn begin_resync(&mut self) {
        self.reset();
        self.mode = Mode::Resync { discarded: false };
    }

    /// Continue after a framing error.
    ///
    /// Skips past the bytes that caused it and drops the fragment that was
    /// in progress, then realigns on the next opening tag at depth zero.
    /// Bytes buffered behind the error are kept; call [`feed`](Self::feed)
    /// with an empty chunk to scan them.
    pub fn recover(&mut self) {
        let resume = self
            .resume_at
            .take()
            .unwrap_or(self.cursor)
            .min(self.buffer.len());
        debug!(resume_offset = self.offset(resume), "Recovering after framing error");
        self.cursor = resume;
        self.start = None;
        self.open.clear();
        self.mode = Mode::Resync { discarded: true };
        self.compact();
    }

    pub fn is_resynchronizing(&self) -> bool {
        matches!(self.mode, Mode::Resync { .. })
    }

    /// Elements currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn scan(&mut self, sink: &mut dyn FnMut(Fragment)) -> Result<(), FramingError> {
        while self.cursor < self.buffer.len() {
            let byte = self.buffer[self.cursor];

            if byte != b'<' {
                if !self.open.is_empty() {
                    // character data inside an element
                    match self.buffer[self.cursor..].iter().position(|b| *b == b'<') {
                        Some(distance) => self.cursor += distance,
                        None => self.cursor = self.buffer.len(),
                    }
                    continue;
                }
                if byte.is_ascii_whitespace() {
                    self.cursor += 1;
                    continue;
                }
                if let Mode::Resync { discarded } = &mut self.mode {
                    *discarded = true;
                    self.cursor += 1;
                    continue;
                }
                self.resume_at = Some(self.cursor + 1);
                return Err(FramingError::UnexpectedByte {
                    byte,
                    offset: self.offset(self.cursor),
                });
            }

            let tag_start = self.cursor;
            let scanned = scan_tag(&self.buffer[tag_start..], self.offset(tag_start));
            if scanned.is_err() {
                self.resume_at = Some(tag_start + 1);
            }
            let Some(tag) = scanned? else {
                // the rest of this tag has not arrived yet
                break;
            };
            let tag_end = tag_start + tag.len;

            match tag.kind {
                TagKind::Markup => self.cursor = tag_end,
                TagKind::Open(name) => {
                    if self.open.is_empty() && self.finish_resync(tag_start) {
                        continue;
                    }
                    if self.open.is_empty() && self.mode == Mode::Aligned {
                        self.start = Some(tag_start);
                    }
                    self.open.push(name);
                    self.cursor = tag_end;
                }
                TagKind::Empty(_) => {
                    if !self.open.is_empty() {
                        self.cursor = tag_end;
                        continue;
                    }
                    if self.finish_resync(tag_start) {
                        continue;
                    }
                    self.cursor = tag_end;
                    if self.mode == Mode::Aligned {
                        self.start = Some(tag_start);
                        self.emit(sink)?;
                    } else {
                        self.mark_discarded();
                    }
                }
                TagKind::Close(name) => self.close(name, tag_start, tag_end, sink)?,
            }
        }
        Ok(())
    }

    fn close(
        &mut self,
        name: String,
        tag_start: usize,
        tag_end: usize,
        sink: &mut dyn FnMut(Fragment),
    ) -> Result<(), FramingError> {
        let resyncing = self.is_resynchronizing();

        match self.open.last() {
            None if resyncing => {
                self.mark_discarded();
                self.cursor = tag_end;
            }
            None => {
                self.resume_at = Some(tag_end);
                return Err(FramingError::UnexpectedClose {
                    name,
                    offset: self.offset(tag_start),
                })
            }
            Some(expected) if *expected != name => {
                if !resyncing {
                    self.resume_at = Some(tag_end);
                    return Err(FramingError::MismatchedClose {
                        expected: expected.clone(),
                        found: name,
                        offset: self.offset(tag_start),
                    });
                }
                self.open.clear();
                self.mark_discarded();
                self.cursor = tag_end;
            }
            Some(_) => {
                self.open.pop();
                self.cursor = tag_end;
                if self.open.is_empty() {
                    if resyncing {
                        self.mark_discarded();
                    } else {
                        self.emit(sink)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaves resync mode when a fragment starts at `tag_start` after some
    /// input has been discarded. Returns true if the tag must be rescanned
    /// in aligned mode.
    fn finish_resync(&mut self, tag_start: usize) -> bool {
        if self.mode != (Mode::Resync { discarded: true }) {
            return false;
        }
        debug!(
            discarded_up_to = self.offset(tag_start),
            "Fragment boundary found, stream synchronized"
        );
        self.mode = Mode::Aligned;
        self.open.clear();
        self.start = None;
        self.cursor = tag_start;
        true
    }

    fn mark_discarded(&mut self) {
        if let Mode::Resync { discarded } = &mut self.mode {
            *discarded = true;
        }
    }

    fn emit(&mut self, sink: &mut dyn FnMut(Fragment)) -> Result<(), FramingError> {
        let Some(start) = self.start else {
            return Ok(());
        };
        match Fragment::from_bytes(&self.buffer[start..self.cursor]) {
            Ok(fragment) => {
                trace!(root = fragment.root(), bytes = self.cursor - start, "Fragment assembled");
                self.start = None;
                sink(fragment);
                Ok(())
            }
            Err(error) => {
                // rewind so the same fragment is reported again until recovered
                self.resume_at = Some(self.cursor);
                self.cursor = start;
                self.start = None;
                self.open.clear();
                Err(FramingError::InvalidFragment(error))
            }
        }
    }

    /// Drop bytes that no longer belong to an unfinished fragment.
    fn compact(&mut self) {
        let keep_from = self.start.unwrap_or(self.cursor);
        if keep_from == 0 {
            return;
        }
        self.buffer.advance(keep_from);
        self.consumed += keep_from;
        self.cursor -= keep_from;
        if let Some(start) = self.start.as_mut() {
            *start = 0;
        }
    }

    fn offset(&self, position: usize) -> usize {
        self.consumed + position
    }
}

fn find(bytes: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    if from > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|position| position + from)
}

/// Index of the `>` closing a start tag, skipping quoted attribute values.
fn find_tag_end(bytes: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (index, byte) in bytes.iter().enumerate().skip(1) {
        match (quote, *byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(*byte),
            (None, b'>') => return Some(index),
            (None, _) => {}
        }
    }
    None
}

fn is_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b':' || byte >= 0x80
}

fn tag_name(raw: &[u8], offset: usize) -> Result<String, FramingError> {
    match raw.first() {
        Some(first) if is_name_start(*first) => Ok(String::from_utf8_lossy(raw).into_owned()),
        Some(first) => Err(FramingError::UnexpectedByte {
            byte: *first,
            offset,
        }),
        None => Err(FramingError::UnexpectedByte {
            byte: b'>',
            offset,
        }),
    }
}

/// Classify the tag at the start of `bytes`, or `None` if it is incomplete.
fn scan_tag(bytes: &[u8], offset: usize) -> Result<Option<Tag>, FramingError> {
    let Some(second) = bytes.get(1) else {
        return Ok(None);
    };

    match second {
        b'?' => Ok(find(bytes, 2, b"?>").map(|end| Tag {
            kind: TagKind::Markup,
            len: end + 2,
        })),
        b'!' => {
            let constructs: [(&[u8], &[u8]); 2] = [(b"<!--", b"-->"), (b"<![CDATA[", b"]]>")];
            for (opener, closer) in constructs {
                if bytes.starts_with(opener) {
                    return Ok(find(bytes, opener.len(), closer).map(|end| Tag {
                        kind: TagKind::Markup,
                        len: end + closer.len(),
                    }));
                }
                if opener.starts_with(bytes) {
                    return Ok(None);
                }
            }
            Ok(find(bytes, 2, b">").map(|end| Tag {
                kind: TagKind::Markup,
                len: end + 1,
            }))
        }
        b'/' => {
            let Some(end) = find(bytes, 2, b">") else {
                return Ok(None);
            };
            let name = tag_name(bytes[2..end].trim_ascii(), offset + 2)?;
            Ok(Some(Tag {
                kind: TagKind::Close(name),
                len: end + 1,
            }))
        }
        first if !is_name_start(*first) => Err(FramingError::UnexpectedByte {
            byte: *first,
            offset: offset + 1,
        }),
        _ => {
            let Some(end) = find_tag_end(bytes) else {
                return Ok(None);
            };
            let name_end = bytes[1..end]
                .iter()
                .position(|b| b.is_ascii_whitespace() || *b == b'/')
                .map_or(end, |position| position + 1);
            let name = tag_name(&bytes[1..name_end], offset + 1)?;
            let kind = if bytes[end - 1] == b'/' {
                TagKind::Empty(name)
            } else {
                TagKind::Open(name)
            };
            Ok(Some(Tag { kind, len: end + 1 }))
        }
    }
}
