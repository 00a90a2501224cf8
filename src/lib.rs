//! # replywire
//!
//! Outbound reply serialization for a multi-protocol in-memory key-value
//! server:
//! - Redis protocol, RESP2 and RESP3, switchable per connection
//! - Memcached ASCII protocol, with `noreply` support
//! - Batching and nested aggregation spans to coalesce writes
//! - Zero-copy multi-get replies and a vectorized writer for large values
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Connection / command loop                    │
//! │                 (one send_* per result)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ RedisReply  │          │  MCReply    │
//!   │  Builder    │          │  Builder    │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!              ┌─────────────────┐
//!              │ SinkReplyBuilder│  batch buffer, sticky error,
//!              │                 │  aggregation, stats
//!              └────────┬────────┘
//!                       ▼
//!              ┌─────────────────┐
//!              │      Sink       │  write_all_iov
//!              └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod sink;
pub mod stats;
pub mod protocol;
pub mod reply;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ReplyError, Result};
pub use config::Config;
pub use sink::Sink;
pub use protocol::ReqSerializer;
pub use reply::{MCReplyBuilder, RedisReplyBuilder, ReplyBuilder, VecReplyWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of replywire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
