//! Chunked vectored-write assembly
//!
//! Framing bytes (length prefixes, CRLFs, small items) are appended to one
//! owned buffer while large payloads are referenced in place. Regions are
//! recorded as index ranges into the buffer, so growing it never invalidates
//! them; the `IoSlice` list is only materialized at send time.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::IoSlice;
use std::ops::Range;

use bytes::BytesMut;

use crate::protocol::CRLF;

enum Piece<'a> {
    Meta(Range<usize>),
    Ref(&'a [u8]),
}

pub(crate) struct VecBatch<'a> {
    meta: BytesMut,
    pieces: Vec<Piece<'a>>,
    max_pieces: usize,
}

impl<'a> VecBatch<'a> {
    pub(crate) fn new(max_pieces: usize) -> Self {
        Self {
            meta: BytesMut::with_capacity(128),
            pieces: Vec::with_capacity(max_pieces + 1),
            max_pieces,
        }
    }

    /// Copy framing bytes, extending the trailing meta region when possible
    pub(crate) fn push_meta(&mut self, bytes: &[u8]) {
        let start = self.meta.len();
        self.meta.extend_from_slice(bytes);
        self.extend_meta(start);
    }

    /// Append `<prefix><len>\r\n`
    pub(crate) fn push_len(&mut self, prefix: u8, len: usize) {
        let start = self.meta.len();
        self.meta.extend_from_slice(&[prefix]);
        let _ = write!(self.meta, "{}", len);
        self.meta.extend_from_slice(CRLF);
        self.extend_meta(start);
    }

    /// Reference a payload without copying it
    pub(crate) fn push_ref(&mut self, data: &'a [u8]) {
        if !data.is_empty() {
            self.pieces.push(Piece::Ref(data));
        }
    }

    /// Reference borrowed payloads of at least `inline_below` bytes, copy the rest
    pub(crate) fn push_value(&mut self, data: Cow<'a, [u8]>, inline_below: usize) {
        match data {
            Cow::Borrowed(bytes) if bytes.len() >= inline_below => self.push_ref(bytes),
            other => self.push_meta(&other),
        }
    }

    fn extend_meta(&mut self, start: usize) {
        let end = self.meta.len();
        if let Some(Piece::Meta(range)) = self.pieces.last_mut() {
            if range.end == start {
                range.end = end;
                return;
            }
        }
        self.pieces.push(Piece::Meta(start..end));
    }

    pub(crate) fn is_full(&self) -> bool {
        self.pieces.len() >= self.max_pieces
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Total bytes across all regions
    pub(crate) fn byte_len(&self) -> usize {
        self.pieces
            .iter()
            .map(|p| match p {
                Piece::Meta(range) => range.len(),
                Piece::Ref(data) => data.len(),
            })
            .sum()
    }

    pub(crate) fn io_slices(&self) -> Vec<IoSlice<'_>> {
        self.pieces
            .iter()
            .map(|p| match p {
                Piece::Meta(range) => IoSlice::new(&self.meta[range.clone()]),
                Piece::Ref(data) => IoSlice::new(data),
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.pieces.clear();
        self.meta.clear();
    }
}
