//! Reply Module
//!
//! Serializes command results into wire bytes for the Redis (RESP2/RESP3)
//! and Memcached text protocols.
//!
//! ## Layout
//! - [`SinkReplyBuilder`]: sink binding, batching, aggregation spans, sticky
//!   errors and reply bookkeeping
//! - [`RedisReplyBuilder`] / [`MCReplyBuilder`]: protocol encoders, selected
//!   once per connection
//! - [`VecReplyWriter`]: reserve/commit buffer plus explicit write vectors,
//!   with zero-copy references inside a scope
//!
//! ## Control Flow
//! ```text
//!  send_*() ──► format ──► SinkReplyBuilder::send
//!                               │
//!                 batching or aggregating?
//!                  │ yes                 │ no
//!                  ▼                     ▼
//!            batch buffer ──────► sink.write_all_iov(batch + bufs)
//! ```

mod base;
mod iovec;
mod memcache;
mod mget;
mod redis;
mod status;
mod vectored;

pub use base::{ReplyAggregator, SinkReplyBuilder};
pub use memcache::MCReplyBuilder;
pub use mget::{GetResp, MGetResponse, MGetStorage, StorageId, ValueRef, STORAGE_ALIGN};
pub use redis::{CollectionType, FnSpan, RedisReplyBuilder, StrSpan, VerbatimFormat};
pub use status::{ErrorKind, ErrorReply, ErrorTable, OpStatus, GENERIC_ERR, SYNTAX_ERR};
pub use vectored::{Region, ReplyScope, VecReplyWriter};

pub(crate) use iovec::VecBatch;

use std::io;

use crate::sink::Sink;

/// Operations common to both protocol builders
pub trait ReplyBuilder {
    type Sink: Sink;

    fn base(&self) -> &SinkReplyBuilder<Self::Sink>;
    fn base_mut(&mut self) -> &mut SinkReplyBuilder<Self::Sink>;

    // -------------------------------------------------------------------------
    // Protocol specific
    // -------------------------------------------------------------------------

    /// Send an error reply; `kind` selects the category
    fn send_error(&mut self, message: &str, kind: &ErrorKind);

    /// Confirmation for a successful write command
    fn send_stored(&mut self);

    /// Reply for a write command whose condition was not met
    fn send_set_skipped(&mut self);

    /// Send a multi-get result; the response and its arena are released
    /// when this returns
    fn send_mget_response(&mut self, resp: MGetResponse<'_>);

    fn send_long(&mut self, value: i64);
    fn send_simple_string(&mut self, value: &str);
    fn send_protocol_error(&mut self, message: &str);

    // -------------------------------------------------------------------------
    // Provided
    // -------------------------------------------------------------------------

    fn send_ok(&mut self) {
        self.send_simple_string("OK");
    }

    /// Render an operation status through the configured error table
    fn send_op_status(&mut self, status: OpStatus) {
        if status == OpStatus::Ok {
            self.send_ok();
            return;
        }
        let reply = self.base().config().error_table.lookup(status).clone();
        self.send_error(&reply.message, &reply.kind);
    }

    fn send_error_reply(&mut self, error: &ErrorReply) {
        match error.status {
            Some(status) => self.send_op_status(status),
            None => self.send_error(&error.message, &error.kind),
        }
    }

    fn send_raw(&mut self, bytes: &[u8]) {
        self.base_mut().send_raw(bytes);
    }

    fn set_batch_mode(&mut self, enabled: bool) {
        self.base_mut().set_batch_mode(enabled);
    }

    fn flush_batch(&mut self) {
        self.base_mut().flush_batch();
    }

    /// Flush pending replies and ignore every later send; writes nothing else
    fn close_connection(&mut self) {
        self.base_mut().close_connection();
    }

    fn error(&self) -> Option<&io::Error> {
        self.base().error()
    }

    fn is_send_active(&self) -> bool {
        self.base().is_send_active()
    }

    fn expect_reply(&mut self) {
        self.base_mut().expect_reply();
    }

    fn has_replied(&self) -> bool {
        self.base().has_replied()
    }

    fn used_memory(&self) -> usize {
        self.base().used_memory()
    }

    /// Open an aggregation span for the lifetime of the returned guard
    fn aggregate(&mut self) -> ReplyAggregator<'_, Self>
    where
        Self: Sized,
    {
        ReplyAggregator::new(self)
    }
}
