//! Request serializer
//!
//! Encodes outbound commands when this node acts as a client, e.g. when
//! streaming commands to a replica. Each call writes exactly one request.

use std::io::{self, IoSlice};

use crate::error::Result;
use crate::reply::VecBatch;
use crate::sink::Sink;

use super::CRLF;

/// Arguments at least this long are referenced rather than copied
const INLINE_ARG_LEN: usize = 32;

/// Writes requests to a sink
pub struct ReqSerializer<S> {
    sink: S,
    ec: Option<io::ErrorKind>,
}

impl<S: Sink> ReqSerializer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, ec: None }
    }

    /// Send an inline command: `<line>\r\n`
    pub fn send_command(&mut self, line: &str) -> Result<()> {
        tracing::trace!("SendCommand: {}", line);
        let bufs = [IoSlice::new(line.as_bytes()), IoSlice::new(CRLF)];
        self.write(&bufs)
    }

    /// Send a command as a RESP multi-bulk array:
    /// `*<n>\r\n$<len>\r\n<name>\r\n$<len>\r\n<arg>\r\n...`
    pub fn send_command_args<A: AsRef<[u8]>>(&mut self, name: &str, args: &[A]) -> Result<()> {
        tracing::trace!("SendCommand: {} ({} args)", name, args.len());

        let mut batch = VecBatch::new(args.len() * 2 + 2);
        batch.push_len(b'*', args.len() + 1);
        batch.push_len(b'$', name.len());
        batch.push_meta(name.as_bytes());
        batch.push_meta(CRLF);
        for arg in args {
            let arg = arg.as_ref();
            batch.push_len(b'$', arg.len());
            if arg.len() >= INLINE_ARG_LEN {
                batch.push_ref(arg);
            } else {
                batch.push_meta(arg);
            }
            batch.push_meta(CRLF);
        }

        let slices = batch.io_slices();
        self.write(&slices)
    }

    fn write(&mut self, bufs: &[IoSlice<'_>]) -> Result<()> {
        match self.sink.write_all_iov(bufs) {
            Ok(()) => {
                self.ec = None;
                Ok(())
            }
            Err(e) => {
                self.ec = Some(e.kind());
                Err(e.into())
            }
        }
    }

    /// Error kind of the most recent request, `None` if it succeeded
    pub fn ec(&self) -> Option<io::ErrorKind> {
        self.ec
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
