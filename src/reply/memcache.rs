//! Memcached reply builder
//!
//! Encodes the ASCII protocol. A `noreply` request suppresses the bytes of
//! its response while bookkeeping still records that a reply was produced.

use std::io::IoSlice;
use std::sync::Arc;

use crate::config::Config;
use crate::protocol::{
    CRLF, MC_CLIENT_ERROR, MC_END, MC_ERROR, MC_NOT_FOUND, MC_NOT_STORED, MC_SERVER_ERROR,
    MC_STORED,
};
use crate::sink::Sink;

use super::{ErrorKind, MGetResponse, ReplyBuilder, SinkReplyBuilder, VecBatch};

/// Records per vectored write in get replies (header, value, CRLF each)
const MGET_BATCH_RECORDS: usize = 32;

/// Memcached ASCII encoder
pub struct MCReplyBuilder<S> {
    base: SinkReplyBuilder<S>,
    noreply: bool,
}

impl<S: Sink> MCReplyBuilder<S> {
    pub fn new(sink: S) -> Self {
        Self::from_base(SinkReplyBuilder::new(sink))
    }

    pub fn with_config(sink: S, config: Arc<Config>) -> Self {
        Self::from_base(SinkReplyBuilder::with_config(sink, config))
    }

    pub fn from_base(base: SinkReplyBuilder<S>) -> Self {
        Self {
            base,
            noreply: false,
        }
    }

    pub fn into_sink(self) -> S {
        self.base.into_sink()
    }

    /// Suppress the output of the current response
    pub fn set_noreply(&mut self, noreply: bool) {
        self.noreply = noreply;
    }

    pub fn no_reply(&self) -> bool {
        self.noreply
    }

    /// `CLIENT_ERROR <message>`
    pub fn send_client_error(&mut self, message: &str) {
        self.send_line(&[MC_CLIENT_ERROR.as_bytes(), b" ", message.as_bytes()]);
    }

    /// `NOT_FOUND`
    pub fn send_not_found(&mut self) {
        self.send_simple_string(MC_NOT_FOUND);
    }

    /// Send `parts` followed by CRLF, honoring `noreply`
    fn send_line(&mut self, parts: &[&[u8]]) {
        if self.noreply {
            self.base.mark_replied();
            return;
        }
        let mut bufs: Vec<IoSlice<'_>> = parts.iter().map(|p| IoSlice::new(p)).collect();
        bufs.push(IoSlice::new(CRLF));
        self.base.send(&bufs);
    }

    fn send_batch(&mut self, batch: &mut VecBatch<'_>) {
        {
            let slices = batch.io_slices();
            self.base.send(&slices);
        }
        batch.clear();
    }
}

impl<S: Sink> ReplyBuilder for MCReplyBuilder<S> {
    type Sink = S;

    fn base(&self) -> &SinkReplyBuilder<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SinkReplyBuilder<S> {
        &mut self.base
    }

    /// `CLIENT_ERROR` or `SERVER_ERROR` depending on how the config
    /// classifies `kind`
    fn send_error(&mut self, message: &str, kind: &ErrorKind) {
        tracing::debug!("Error: {}", message);

        let prefix = if self.base.config().is_mc_client_error(kind) {
            MC_CLIENT_ERROR
        } else {
            MC_SERVER_ERROR
        };
        // Redis-style error codes carry a leading '-'
        let message = message.strip_prefix('-').unwrap_or(message);
        self.send_line(&[prefix.as_bytes(), b" ", message.as_bytes()]);
    }

    fn send_stored(&mut self) {
        self.send_simple_string(MC_STORED);
    }

    fn send_set_skipped(&mut self) {
        self.send_simple_string(MC_NOT_STORED);
    }

    /// One `VALUE` block per found key, then `END`. Missing keys are omitted.
    fn send_mget_response(&mut self, resp: MGetResponse<'_>) {
        if self.noreply {
            self.base.mark_replied();
            return;
        }

        let mut batch = VecBatch::new(MGET_BATCH_RECORDS * 3);
        for (record, value) in resp.iter().flatten() {
            let mut header = format!(
                "VALUE {} {} {}",
                record.key,
                record.mc_flag,
                value.len()
            );
            if record.mc_ver != 0 {
                header.push(' ');
                header.push_str(&record.mc_ver.to_string());
            }
            batch.push_meta(header.as_bytes());
            batch.push_meta(CRLF);
            batch.push_ref(value);
            batch.push_meta(CRLF);

            if batch.is_full() {
                self.send_batch(&mut batch);
                if self.base.error().is_some() {
                    return;
                }
            }
        }

        batch.push_meta(MC_END.as_bytes());
        batch.push_meta(CRLF);
        self.send_batch(&mut batch);
    }

    fn send_long(&mut self, value: i64) {
        self.send_line(&[value.to_string().as_bytes()]);
    }

    fn send_simple_string(&mut self, value: &str) {
        self.send_line(&[value.as_bytes()]);
    }

    /// Bare `ERROR`; the message is only logged
    fn send_protocol_error(&mut self, message: &str) {
        tracing::debug!("Protocol error: {}", message);
        self.send_simple_string(MC_ERROR);
    }
}
