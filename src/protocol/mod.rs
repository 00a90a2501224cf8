//! Protocol Module
//!
//! Wire-level constants and encoders shared by the reply builders.
//!
//! ## Redis (RESP2)
//! ```text
//! +OK\r\n            simple string      -ERR msg\r\n     error
//! :42\r\n            integer            $3\r\nfoo\r\n    bulk string
//! $-1\r\n            null bulk          *2\r\n...        array
//! *-1\r\n            null array
//! ```
//!
//! ## Redis (RESP3 additions)
//! ```text
//! _\r\n              null               ,3.14\r\n        double
//! %1\r\n...          map (pairs)        ~2\r\n...        set
//! >2\r\n...          push               =7\r\ntxt:abc\r\n verbatim
//! ```
//!
//! ## Memcached (ASCII)
//! ```text
//! STORED\r\n  NOT_STORED\r\n  NOT_FOUND\r\n  END\r\n  ERROR\r\n
//! VALUE <key> <flags> <bytes>[ <cas>]\r\n<data>\r\n
//! CLIENT_ERROR <msg>\r\n  SERVER_ERROR <msg>\r\n
//! ```

mod request;
mod resp;

pub use request::ReqSerializer;
pub use resp::{format_double, MAX_DOUBLE_LEN};

/// Line terminator for every protocol handled here
pub const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Redis
// =============================================================================

pub const RESP2_NULL: &[u8] = b"$-1\r\n";
pub const RESP2_NULL_ARRAY: &[u8] = b"*-1\r\n";
pub const RESP3_NULL: &[u8] = b"_\r\n";
pub const ERR_PREFIX: &[u8] = b"-ERR ";

// =============================================================================
// Memcached
// =============================================================================

pub const MC_STORED: &str = "STORED";
pub const MC_NOT_STORED: &str = "NOT_STORED";
pub const MC_NOT_FOUND: &str = "NOT_FOUND";
pub const MC_END: &str = "END";
pub const MC_ERROR: &str = "ERROR";
pub const MC_CLIENT_ERROR: &str = "CLIENT_ERROR";
pub const MC_SERVER_ERROR: &str = "SERVER_ERROR";
