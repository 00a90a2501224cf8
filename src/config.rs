//! Configuration for replywire
//!
//! Centralized configuration with sensible defaults. Per-response switches
//! (RESP3, Memcached `noreply`) are set on the builders directly by the
//! session layer; this struct only carries construction-time policy.

use std::collections::HashSet;

use crate::error::{ReplyError, Result};
use crate::reply::{ErrorKind, ErrorTable};

/// Main configuration for reply builders and writers
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Whether newly created Redis builders start in RESP3 mode
    pub resp3: bool,

    /// Maps internal operation statuses to error text and kind
    pub error_table: ErrorTable,

    /// Error kinds that Memcached reports as `CLIENT_ERROR`.
    /// Every other kind goes out as `SERVER_ERROR`.
    pub mc_client_error_kinds: HashSet<ErrorKind>,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of the batch buffer (in bytes)
    pub batch_capacity: usize,

    /// Vectorized writer: payloads shorter than this are copied into the
    /// owned buffer, longer ones are referenced in place
    pub inline_threshold: usize,

    /// Vectorized writer: initial capacity of the owned buffer (in bytes)
    pub vec_buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resp3: false,
            error_table: ErrorTable::default(),
            mc_client_error_kinds: default_mc_client_kinds(),
            batch_capacity: 4096,
            inline_threshold: 32,
            vec_buffer_capacity: 8192,
        }
    }
}

fn default_mc_client_kinds() -> HashSet<ErrorKind> {
    [
        ErrorKind::Syntax,
        ErrorKind::WrongType,
        ErrorKind::OutOfRange,
        ErrorKind::InvalidInt,
        ErrorKind::InvalidFloat,
        ErrorKind::Protocol,
    ]
    .into_iter()
    .collect()
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether Memcached reports `kind` as a client-caused error
    pub fn is_mc_client_error(&self, kind: &ErrorKind) -> bool {
        self.mc_client_error_kinds.contains(kind)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start Redis builders in RESP3 mode
    pub fn resp3(mut self, enabled: bool) -> Self {
        self.config.resp3 = enabled;
        self
    }

    /// Replace the status-to-error mapping table
    pub fn error_table(mut self, table: ErrorTable) -> Self {
        self.config.error_table = table;
        self
    }

    /// Replace the set of kinds reported as `CLIENT_ERROR` by Memcached
    pub fn mc_client_error_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.mc_client_error_kinds = kinds.into_iter().collect();
        self
    }

    /// Set the initial batch buffer capacity (in bytes)
    pub fn batch_capacity(mut self, bytes: usize) -> Self {
        self.config.batch_capacity = bytes;
        self
    }

    /// Set the copy/reference threshold of the vectorized writer
    pub fn inline_threshold(mut self, bytes: usize) -> Self {
        self.config.inline_threshold = bytes;
        self
    }

    /// Set the initial buffer capacity of the vectorized writer (in bytes)
    pub fn vec_buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.vec_buffer_capacity = bytes;
        self
    }

    pub fn build(self) -> Result<Config> {
        let config = self.config;
        if config.inline_threshold == 0 {
            return Err(ReplyError::Config(
                "inline_threshold must be greater than zero".to_string(),
            ));
        }
        if config.vec_buffer_capacity < config.inline_threshold {
            return Err(ReplyError::Config(format!(
                "vec_buffer_capacity ({}) is smaller than inline_threshold ({})",
                config.vec_buffer_capacity, config.inline_threshold
            )));
        }
        Ok(config)
    }
}
