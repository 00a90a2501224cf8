//! Protocol-agnostic reply plumbing
//!
//! [`SinkReplyBuilder`] owns the batch buffer, the sticky error slot and the
//! reply bookkeeping shared by the Redis and Memcached builders. Protocol
//! builders format bytes and hand them to [`SinkReplyBuilder::send`], which
//! either accumulates them (batch mode or an open aggregation span) or writes
//! them to the sink together with anything already accumulated.

use std::io::{self, IoSlice};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;

use crate::config::Config;
use crate::sink::Sink;
use crate::stats::{thread_counters, ReplyCounters};

use super::ReplyBuilder;

/// Shared state of every reply builder
pub struct SinkReplyBuilder<S> {
    sink: S,
    config: Arc<Config>,
    stats: Arc<ReplyCounters>,

    /// Bytes waiting for the next physical write
    batch: BytesMut,

    /// First sink error observed; never cleared
    error: Option<io::Error>,

    /// Connection is shutting down, further sends are dropped
    closed: bool,

    /// Coalescing controlled by the connection (pipelined requests)
    should_batch: bool,

    /// Coalescing controlled at operation level
    should_aggregate: bool,

    has_replied: bool,
    send_active: bool,
}

impl<S: Sink> SinkReplyBuilder<S> {
    /// Create a builder with the default config, counting into the calling
    /// thread's statistics
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, Arc::new(Config::default()))
    }

    pub fn with_config(sink: S, config: Arc<Config>) -> Self {
        Self {
            sink,
            batch: BytesMut::with_capacity(config.batch_capacity),
            config,
            stats: thread_counters(),
            error: None,
            closed: false,
            should_batch: false,
            should_aggregate: false,
            has_replied: true,
            send_active: false,
        }
    }

    /// Count into `stats` instead of the thread's counter set
    pub fn with_stats(mut self, stats: Arc<ReplyCounters>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &ReplyCounters {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send pre-formatted bytes
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.send(&[IoSlice::new(bytes)]);
    }

    /// Send a reply made of several regions.
    ///
    /// Records that a reply was produced even when the bytes are dropped
    /// because of an earlier error or a closed connection.
    pub fn send(&mut self, bufs: &[IoSlice<'_>]) {
        self.has_replied = true;

        if self.error.is_some() || self.closed {
            return;
        }

        if self.should_batch || self.should_aggregate {
            for buf in bufs {
                self.batch.extend_from_slice(buf);
            }
            return;
        }

        let result = if self.batch.is_empty() {
            self.write_to_sink(bufs)
        } else {
            let mut vecs = Vec::with_capacity(bufs.len() + 1);
            vecs.push(IoSlice::new(&self.batch));
            vecs.extend_from_slice(bufs);
            let result = Self::write_vecs(&mut self.sink, &self.stats, &mut self.send_active, &vecs);
            drop(vecs);
            self.batch.clear();
            result
        };

        if let Err(e) = result {
            self.record_error(e);
        }
    }

    fn write_to_sink(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<()> {
        Self::write_vecs(&mut self.sink, &self.stats, &mut self.send_active, bufs)
    }

    fn write_vecs(
        sink: &mut S,
        stats: &ReplyCounters,
        send_active: &mut bool,
        bufs: &[IoSlice<'_>],
    ) -> io::Result<()> {
        let bytes: usize = bufs.iter().map(|b| b.len()).sum();
        stats.record_write(bytes);

        let started = Instant::now();
        *send_active = true;
        let result = sink.write_all_iov(bufs);
        *send_active = false;
        stats.record_send(started.elapsed());

        result
    }

    fn record_error(&mut self, error: io::Error) {
        if self.error.is_none() {
            tracing::warn!("Reply sink failed, dropping further replies: {}", error);
            self.error = Some(error);
        }
    }

    // =========================================================================
    // Batching and aggregation
    // =========================================================================

    /// Enable or disable connection-level batching. Disabling flushes any
    /// pending bytes unless an aggregation span is still open.
    pub fn set_batch_mode(&mut self, enabled: bool) {
        self.should_batch = enabled;
        if !enabled && !self.should_aggregate {
            self.flush_batch();
        }
    }

    pub fn is_batch_mode(&self) -> bool {
        self.should_batch
    }

    /// Write and clear the batch buffer; no-op when it is empty
    pub fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        if self.error.is_some() || self.closed {
            self.batch.clear();
            return;
        }

        tracing::trace!("Flushing {} batched reply bytes", self.batch.len());
        let result = Self::write_vecs(
            &mut self.sink,
            &self.stats,
            &mut self.send_active,
            &[IoSlice::new(&self.batch)],
        );
        self.batch.clear();

        if let Err(e) = result {
            self.record_error(e);
        }
    }

    /// Open an aggregation span. Returns `false` and does nothing when a span
    /// is already open; only a call that returned `true` may be paired with
    /// [`SinkReplyBuilder::stop_aggregate`].
    pub fn start_aggregate(&mut self) -> bool {
        if self.should_aggregate {
            return false;
        }
        self.should_aggregate = true;
        true
    }

    /// Close the aggregation span and flush, unless batch mode keeps the
    /// bytes buffered
    pub fn stop_aggregate(&mut self) {
        self.should_aggregate = false;
        if self.should_batch {
            return;
        }
        self.flush_batch();
    }

    pub fn is_aggregating(&self) -> bool {
        self.should_aggregate
    }

    /// Toggle aggregation without flushing. Used to glue collection headers
    /// to the element that follows them.
    pub(crate) fn set_aggregating(&mut self, aggregating: bool) {
        self.should_aggregate = aggregating;
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Flush what was already produced and drop every later send.
    ///
    /// Closing emits no bytes of its own. Replies still held by batch mode
    /// or an open aggregation span are written first, and nothing is written
    /// when nothing is pending. The sticky error is left untouched.
    pub fn close_connection(&mut self) {
        if self.closed {
            return;
        }
        self.flush_batch();
        self.closed = true;
        tracing::debug!("Reply builder closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// First sink error observed, if any
    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    /// Whether a physical sink write is in progress
    pub fn is_send_active(&self) -> bool {
        self.send_active
    }

    /// Start tracking a new logical request
    pub fn expect_reply(&mut self) {
        self.has_replied = false;
    }

    pub fn has_replied(&self) -> bool {
        self.has_replied
    }

    /// Record a reply that was intentionally not written
    pub(crate) fn mark_replied(&mut self) {
        self.has_replied = true;
    }

    /// Bytes currently held in the batch buffer
    pub fn used_memory(&self) -> usize {
        self.batch.len()
    }
}

/// Aggregation span guard.
///
/// Only the outermost guard opens and closes the span; nested guards are
/// no-ops. The guard dereferences to the builder so replies are sent through it.
pub struct ReplyAggregator<'a, B: ReplyBuilder + ?Sized> {
    builder: &'a mut B,
    started: bool,
}

impl<'a, B: ReplyBuilder + ?Sized> ReplyAggregator<'a, B> {
    pub fn new(builder: &'a mut B) -> Self {
        let started = builder.base_mut().start_aggregate();
        Self { builder, started }
    }

    /// Whether this guard opened the span
    pub fn is_outermost(&self) -> bool {
        self.started
    }
}

impl<B: ReplyBuilder + ?Sized> Deref for ReplyAggregator<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.builder
    }
}

impl<B: ReplyBuilder + ?Sized> DerefMut for ReplyAggregator<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.builder
    }
}

impl<B: ReplyBuilder + ?Sized> Drop for ReplyAggregator<'_, B> {
    fn drop(&mut self) {
        if self.started {
            self.builder.base_mut().stop_aggregate();
        }
    }
}
