//! Vectorized reply writer
//!
//! Accumulates a reply as an explicit list of regions: pieces of an owned,
//! growable buffer and references to caller memory. A flush hands the whole
//! list to the sink in one scatter-gather write.
//!
//! ## Zero-copy references
//! Inside a [`ReplyScope`], payloads of at least `inline_threshold` bytes are
//! referenced instead of copied. The `'a` lifetime on the writer makes the
//! borrow checker enforce that referenced bytes stay alive until the writer
//! (and therefore every scope flush) is done. Data with a shorter lifetime
//! goes through [`VecReplyWriter::write_copy`].
//!
//! ## Buffer regions
//! Buffered regions are stored as offsets, not addresses, so growing the
//! buffer never invalidates a recorded region. A commit extends the last
//! region only when it ends exactly where the new bytes start; anything else
//! finalizes it and opens a new one.

use std::io::{self, IoSlice, Write as _};
use std::ops::{Deref, DerefMut, Range};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;

use crate::config::Config;
use crate::protocol::CRLF;
use crate::sink::Sink;
use crate::stats::{thread_counters, ReplyCounters};

/// Longest decimal rendering of an `i64`, sign included
const MAX_INT_LEN: usize = 20;

/// One entry of the write-vector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region<'a> {
    /// Bytes in the writer's own buffer
    Buffered(Range<usize>),
    /// Caller memory referenced in place
    Ref(&'a [u8]),
}

impl Region<'_> {
    pub fn len(&self) -> usize {
        match self {
            Region::Buffered(range) => range.len(),
            Region::Ref(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, Region::Buffered(_))
    }
}

/// Reserve/commit buffer plus write vectors
pub struct VecReplyWriter<'a, S> {
    sink: S,
    stats: Arc<ReplyCounters>,
    error: Option<io::Error>,
    scoped: bool,

    inline_threshold: usize,

    /// Sum of all region lengths
    total_size: usize,
    buffer: BytesMut,
    /// Start of the space handed out by `reserve_piece`, until committed
    reserved: Option<usize>,
    vecs: Vec<Region<'a>>,
}

impl<'a, S: Sink> VecReplyWriter<'a, S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, &Config::default())
    }

    pub fn with_config(sink: S, config: &Config) -> Self {
        Self {
            sink,
            stats: thread_counters(),
            error: None,
            scoped: false,
            inline_threshold: config.inline_threshold,
            total_size: 0,
            buffer: BytesMut::with_capacity(config.vec_buffer_capacity),
            reserved: None,
            vecs: Vec::new(),
        }
    }

    /// Count into `stats` instead of the thread's counter set
    pub fn with_stats(mut self, stats: Arc<ReplyCounters>) -> Self {
        self.stats = stats;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// First sink error observed, if any
    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    /// Bytes accumulated since the last flush
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn regions(&self) -> &[Region<'a>] {
        &self.vecs
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Write `data`, referencing it when inside a scope and large enough,
    /// copying it otherwise. Outside a scope every write is flushed at once.
    /// Once the sink has failed every write is a no-op.
    pub fn write(&mut self, data: &'a [u8]) {
        if self.error.is_some() {
            return;
        }
        if self.scoped && data.len() >= self.inline_threshold {
            self.write_ref(data);
        } else {
            self.write_piece(data);
        }
        self.flush_unscoped();
    }

    /// Write short-lived data; always copied
    pub fn write_copy(&mut self, data: &[u8]) {
        if self.error.is_some() {
            return;
        }
        self.write_piece(data);
        self.flush_unscoped();
    }

    /// Decimal integer formatted straight into the buffer
    pub fn write_num(&mut self, value: i64) {
        if self.error.is_some() {
            return;
        }
        self.put_num(value);
        self.flush_unscoped();
    }

    /// RESP integer reply `:<value>\r\n`
    pub fn write_long(&mut self, value: i64) {
        if self.error.is_some() {
            return;
        }
        self.write_piece(b":");
        self.put_num(value);
        self.write_piece(CRLF);
        self.flush_unscoped();
    }

    /// RESP bulk string `$<len>\r\n<data>\r\n`
    pub fn write_bulk_string(&mut self, data: &'a [u8]) {
        if self.error.is_some() {
            return;
        }
        self.write_piece(b"$");
        self.put_num(data.len() as i64);
        self.write_piece(CRLF);
        if self.scoped && data.len() >= self.inline_threshold {
            self.write_ref(data);
        } else {
            self.write_piece(data);
        }
        self.write_piece(CRLF);
        self.flush_unscoped();
    }

    fn put_num(&mut self, value: i64) {
        let buf = self.reserve_piece(MAX_INT_LEN);
        let capacity = buf.len();
        let mut cursor: &mut [u8] = buf;
        // 20 bytes hold every i64
        let _ = write!(cursor, "{}", value);
        let used = capacity - cursor.len();
        self.commit_piece(used);
    }

    fn flush_unscoped(&mut self) {
        if !self.scoped {
            self.flush();
        }
    }

    // =========================================================================
    // Reserve / commit
    // =========================================================================

    /// Hand out `size` writable bytes at the end of the buffer. They are not
    /// part of the reply until [`VecReplyWriter::commit_piece`] is called.
    pub fn reserve_piece(&mut self, size: usize) -> &mut [u8] {
        let start = match self.reserved {
            Some(start) => start,
            None => self.buffer.len(),
        };
        self.buffer.resize(start + size, 0);
        self.reserved = Some(start);
        &mut self.buffer[start..]
    }

    /// Keep the first `size` reserved bytes and release the rest. After a sink
    /// failure the reservation is released whole.
    pub fn commit_piece(&mut self, size: usize) {
        let Some(start) = self.reserved.take() else {
            debug_assert!(false, "commit_piece without reserve_piece");
            return;
        };
        debug_assert!(start + size <= self.buffer.len());
        if self.error.is_some() {
            self.buffer.truncate(start);
            return;
        }
        let end = (start + size).min(self.buffer.len());
        self.buffer.truncate(end);
        let size = end - start;
        if size == 0 {
            return;
        }

        match self.vecs.last_mut() {
            Some(Region::Buffered(range)) if range.end == start => range.end = end,
            _ => self.vecs.push(Region::Buffered(start..end)),
        }
        self.total_size += size;
    }

    /// Reserve, copy, commit
    pub fn write_piece(&mut self, data: &[u8]) {
        if data.is_empty() || self.error.is_some() {
            return;
        }
        self.reserve_piece(data.len()).copy_from_slice(data);
        self.commit_piece(data.len());
    }

    /// Record a reference to caller memory, bypassing the buffer
    pub fn write_ref(&mut self, data: &'a [u8]) {
        if data.is_empty() || self.error.is_some() {
            return;
        }
        self.vecs.push(Region::Ref(data));
        self.total_size += data.len();
    }

    /// Whether `ptr` points into the live buffer
    pub fn is_in_buf(&self, ptr: *const u8) -> bool {
        self.buffer.as_ptr_range().contains(&ptr)
    }

    // =========================================================================
    // Scopes and flushing
    // =========================================================================

    /// Open a scope guard; only the outermost one flushes on drop
    pub fn scope(&mut self) -> ReplyScope<'_, 'a, S> {
        ReplyScope::new(self)
    }

    /// Explicit scope start. Returns `false` when a scope is already open;
    /// only a call that returned `true` may be paired with
    /// [`VecReplyWriter::end_scope`].
    pub fn begin_scope(&mut self) -> bool {
        let was_scoped = self.scoped;
        self.scoped = true;
        !was_scoped
    }

    /// Close the outermost scope and flush
    pub fn end_scope(&mut self) {
        self.scoped = false;
        self.finish_scope();
    }

    fn finish_scope(&mut self) {
        self.flush();
    }

    /// Send every accumulated region in one write and reset
    pub fn flush(&mut self) {
        debug_assert!(self.reserved.is_none(), "flush with an uncommitted reservation");

        if !self.vecs.is_empty() && self.error.is_none() {
            let result = {
                let slices: Vec<IoSlice<'_>> = self
                    .vecs
                    .iter()
                    .map(|region| match region {
                        Region::Buffered(range) => IoSlice::new(&self.buffer[range.clone()]),
                        Region::Ref(data) => IoSlice::new(data),
                    })
                    .collect();

                tracing::trace!("Flushing {} bytes in {} regions", self.total_size, slices.len());
                self.stats.record_write(self.total_size);
                let started = Instant::now();
                let result = self.sink.write_all_iov(&slices);
                self.stats.record_send(started.elapsed());
                result
            };

            if let Err(e) = result {
                tracing::warn!("Reply sink failed, dropping further replies: {}", e);
                self.error = Some(e);
            }
        }

        self.buffer.clear();
        self.vecs.clear();
        self.reserved = None;
        self.total_size = 0;
    }
}

/// Scope guard for [`VecReplyWriter`].
///
/// Nested scopes are no-ops; the outermost one flushes when dropped. The guard
/// dereferences to the writer.
pub struct ReplyScope<'w, 'a, S: Sink> {
    writer: &'w mut VecReplyWriter<'a, S>,
    prev_scoped: bool,
}

impl<'w, 'a, S: Sink> ReplyScope<'w, 'a, S> {
    pub fn new(writer: &'w mut VecReplyWriter<'a, S>) -> Self {
        let prev_scoped = writer.scoped;
        writer.scoped = true;
        Self { writer, prev_scoped }
    }
}

impl<'a, S: Sink> Deref for ReplyScope<'_, 'a, S> {
    type Target = VecReplyWriter<'a, S>;

    fn deref(&self) -> &Self::Target {
        self.writer
    }
}

impl<'a, S: Sink> DerefMut for ReplyScope<'_, 'a, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.writer
    }
}

impl<S: Sink> Drop for ReplyScope<'_, '_, S> {
    fn drop(&mut self) {
        if !self.prev_scoped {
            self.writer.scoped = false;
            self.writer.finish_scope();
        }
    }
}
