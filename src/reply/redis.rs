//! Redis reply builder
//!
//! Encodes RESP2 and RESP3. The protocol version is a runtime switch set by
//! the session layer (`HELLO 3`); RESP3-only types degrade to their RESP2
//! equivalents when it is off.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::IoSlice;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::Config;
use crate::protocol::{
    format_double, CRLF, ERR_PREFIX, RESP2_NULL, RESP2_NULL_ARRAY, RESP3_NULL,
};
use crate::sink::Sink;

use super::{ErrorKind, MGetResponse, ReplyBuilder, SinkReplyBuilder, VecBatch, SYNTAX_ERR};

/// Records per vectored write in multi-get replies
const MGET_BATCH_RECORDS: usize = 32;

/// Items per vectored write in string arrays
const STRING_ARR_BATCH_ITEMS: usize = 124;

/// String array items shorter than this are copied next to their header
const LOCAL_STR_SIZE: usize = 8;

/// Aggregate type of a collection header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Array,
    Set,
    Map,
    Push,
}

impl CollectionType {
    fn resp3_symbol(self) -> u8 {
        match self {
            CollectionType::Array => b'*',
            CollectionType::Set => b'~',
            CollectionType::Map => b'%',
            CollectionType::Push => b'>',
        }
    }
}

/// Format tag of a RESP3 verbatim string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerbatimFormat {
    #[default]
    Txt,
    Markdown,
}

impl VerbatimFormat {
    fn tag(self) -> &'static [u8] {
        match self {
            VerbatimFormat::Txt => b"txt:",
            VerbatimFormat::Markdown => b"mkd:",
        }
    }
}

/// Randomly indexable sequence of string-like items
pub trait StrSpan {
    fn span_len(&self) -> usize;
    fn span_item(&self, index: usize) -> &[u8];
}

impl<T: AsRef<[u8]>> StrSpan for [T] {
    fn span_len(&self) -> usize {
        self.len()
    }

    fn span_item(&self, index: usize) -> &[u8] {
        self[index].as_ref()
    }
}

impl<T: AsRef<[u8]>> StrSpan for Vec<T> {
    fn span_len(&self) -> usize {
        self.len()
    }

    fn span_item(&self, index: usize) -> &[u8] {
        self[index].as_ref()
    }
}

impl<T: AsRef<[u8]>, const N: usize> StrSpan for [T; N] {
    fn span_len(&self) -> usize {
        N
    }

    fn span_item(&self, index: usize) -> &[u8] {
        self[index].as_ref()
    }
}

/// A [`StrSpan`] backed by a producer function, so callers need not
/// collect items before encoding them
pub struct FnSpan<'a, F> {
    len: usize,
    producer: F,
    _items: PhantomData<&'a [u8]>,
}

impl<'a, F> FnSpan<'a, F>
where
    F: Fn(usize) -> &'a [u8],
{
    pub fn new(len: usize, producer: F) -> Self {
        Self {
            len,
            producer,
            _items: PhantomData,
        }
    }
}

impl<'a, F> StrSpan for FnSpan<'a, F>
where
    F: Fn(usize) -> &'a [u8],
{
    fn span_len(&self) -> usize {
        self.len
    }

    fn span_item(&self, index: usize) -> &[u8] {
        (self.producer)(index)
    }
}

/// RESP2/RESP3 encoder
pub struct RedisReplyBuilder<S> {
    base: SinkReplyBuilder<S>,
    is_resp3: bool,
}

impl<S: Sink> RedisReplyBuilder<S> {
    pub fn new(sink: S) -> Self {
        Self::from_base(SinkReplyBuilder::new(sink))
    }

    pub fn with_config(sink: S, config: Arc<Config>) -> Self {
        Self::from_base(SinkReplyBuilder::with_config(sink, config))
    }

    pub fn from_base(base: SinkReplyBuilder<S>) -> Self {
        let is_resp3 = base.config().resp3;
        Self { base, is_resp3 }
    }

    pub fn into_sink(self) -> S {
        self.base.into_sink()
    }

    pub fn set_resp3(&mut self, is_resp3: bool) {
        self.is_resp3 = is_resp3;
    }

    pub fn is_resp3(&self) -> bool {
        self.is_resp3
    }

    fn null_token(&self) -> &'static [u8] {
        if self.is_resp3 {
            RESP3_NULL
        } else {
            RESP2_NULL
        }
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    /// `_` under RESP3, `$-1` under RESP2
    pub fn send_null(&mut self) {
        let token = self.null_token();
        self.base.send_raw(token);
    }

    /// `_` under RESP3, `*-1` under RESP2
    pub fn send_null_array(&mut self) {
        let token = if self.is_resp3 { RESP3_NULL } else { RESP2_NULL_ARRAY };
        self.base.send_raw(token);
    }

    pub fn send_empty_array(&mut self) {
        self.start_array(0);
    }

    pub fn send_bulk_string(&mut self, value: &[u8]) {
        let header = format!("${}\r\n", value.len());
        self.base.send(&[
            IoSlice::new(header.as_bytes()),
            IoSlice::new(value),
            IoSlice::new(CRLF),
        ]);
    }

    /// `,<value>` under RESP3, a bulk string under RESP2
    pub fn send_double(&mut self, value: f64) {
        let text = format_double(value);
        if self.is_resp3 {
            self.base.send_raw(format!(",{}\r\n", text).as_bytes());
        } else {
            self.send_bulk_string(text.as_bytes());
        }
    }

    /// Verbatim string under RESP3; plain bulk string (tag dropped) under RESP2
    pub fn send_verbatim_string(&mut self, value: &[u8], format: VerbatimFormat) {
        if !self.is_resp3 {
            self.send_bulk_string(value);
            return;
        }

        let tag = format.tag();
        let mut header = format!("={}\r\n", value.len() + tag.len()).into_bytes();
        header.extend_from_slice(tag);
        self.base.send(&[
            IoSlice::new(&header),
            IoSlice::new(value),
            IoSlice::new(CRLF),
        ]);
    }

    // =========================================================================
    // Collections
    // =========================================================================

    pub fn start_array(&mut self, len: usize) {
        self.start_collection(len, CollectionType::Array);
    }

    /// Write a collection header. `len` counts pairs for maps; RESP2 sends
    /// every collection as an array, with maps flattened to `2 * len` items.
    ///
    /// A non-empty header is held back and written together with the element
    /// that follows it.
    pub fn start_collection(&mut self, len: usize, kind: CollectionType) {
        let (len, kind) = if self.is_resp3 {
            (len, kind)
        } else if kind == CollectionType::Map {
            (len * 2, CollectionType::Array)
        } else {
            (len, CollectionType::Array)
        };

        tracing::trace!("StartCollection({}, {:?})", len, kind);

        let mut header = String::with_capacity(16);
        header.push(kind.resp3_symbol() as char);
        let _ = write!(header, "{}\r\n", len);

        let prev = self.base.is_aggregating();
        if len > 0 {
            self.base.set_aggregating(true);
        }
        self.base.send_raw(header.as_bytes());
        self.base.set_aggregating(prev);
    }

    /// Array of simple strings
    pub fn send_simple_str_arr<A: StrSpan + ?Sized>(&mut self, arr: &A) {
        let mut out = format!("*{}\r\n", arr.span_len()).into_bytes();
        for i in 0..arr.span_len() {
            out.push(b'+');
            out.extend_from_slice(arr.span_item(i));
            out.extend_from_slice(CRLF);
        }
        self.base.send_raw(&out);
    }

    /// Collection of bulk strings. For maps, `arr` holds keys and values
    /// interleaved.
    pub fn send_string_arr<A: StrSpan + ?Sized>(&mut self, arr: &A, kind: CollectionType) {
        self.send_string_arr_internal(arr.span_len(), |i| Cow::Borrowed(arr.span_item(i)), kind);
    }

    fn send_string_arr_internal<'p, F>(&mut self, size: usize, mut producer: F, kind: CollectionType)
    where
        F: FnMut(usize) -> Cow<'p, [u8]>,
    {
        let (symbol, header_len) = if self.is_resp3 {
            let header_len = if kind == CollectionType::Map {
                debug_assert!(size % 2 == 0, "map needs an even number of items");
                size / 2
            } else {
                size
            };
            (kind.resp3_symbol(), header_len)
        } else {
            (b'*', size)
        };

        let mut batch = VecBatch::new(STRING_ARR_BATCH_ITEMS * 2);
        batch.push_len(symbol, header_len);

        for i in 0..size {
            let item = producer(i);
            batch.push_len(b'$', item.len());
            batch.push_value(item, LOCAL_STR_SIZE);
            batch.push_meta(CRLF);

            if batch.is_full() {
                self.send_batch(&mut batch);
                if self.base.error().is_some() {
                    return;
                }
            }
        }

        if !batch.is_empty() {
            self.send_batch(&mut batch);
        }
    }

    /// Member/score pairs. With scores, RESP3 nests each pair in a two-item
    /// array while RESP2 alternates member and score in one flat array.
    ///
    /// With `with_scores == false` the scores are not sent at all: the reply
    /// is a flat array of the members alone under both protocol versions.
    pub fn send_scored_array<K: AsRef<[u8]>>(&mut self, arr: &[(K, f64)], with_scores: bool) {
        let mut agg = self.aggregate();

        if !with_scores {
            agg.send_string_arr_internal(
                arr.len(),
                |i| Cow::Borrowed(arr[i].0.as_ref()),
                CollectionType::Array,
            );
            return;
        }

        if !agg.is_resp3 {
            agg.send_string_arr_internal(
                arr.len() * 2,
                |i| {
                    let (member, score) = &arr[i / 2];
                    if i % 2 == 0 {
                        Cow::Borrowed(member.as_ref())
                    } else {
                        Cow::Owned(format_double(*score).into_bytes())
                    }
                },
                CollectionType::Array,
            );
            return;
        }

        agg.start_array(arr.len());
        for (member, score) in arr {
            agg.start_array(2);
            agg.send_bulk_string(member.as_ref());
            agg.send_double(*score);
        }
    }

    fn send_batch(&mut self, batch: &mut VecBatch<'_>) {
        {
            let slices = batch.io_slices();
            self.base.send(&slices);
        }
        batch.clear();
    }
}

impl<S: Sink> ReplyBuilder for RedisReplyBuilder<S> {
    type Sink = S;

    fn base(&self) -> &SinkReplyBuilder<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SinkReplyBuilder<S> {
        &mut self.base
    }

    /// `-ERR <message>`, or `<message>` as is when it already starts with `-`
    fn send_error(&mut self, message: &str, kind: &ErrorKind) {
        tracing::debug!("Error: {}", message);

        let tag = match kind.tag() {
            Some(tag) => tag,
            None if message == SYNTAX_ERR => "syntax_error",
            None => message,
        };
        self.base.stats().record_error(tag);

        if message.starts_with('-') {
            self.base
                .send(&[IoSlice::new(message.as_bytes()), IoSlice::new(CRLF)]);
        } else {
            self.base.send(&[
                IoSlice::new(ERR_PREFIX),
                IoSlice::new(message.as_bytes()),
                IoSlice::new(CRLF),
            ]);
        }
    }

    fn send_stored(&mut self) {
        self.send_ok();
    }

    fn send_set_skipped(&mut self) {
        self.send_null();
    }

    /// One array entry per requested key: a bulk string for hits, the
    /// version's null for misses. Values are referenced, never copied.
    fn send_mget_response(&mut self, resp: MGetResponse<'_>) {
        let mut batch = VecBatch::new(MGET_BATCH_RECORDS * 2 + 2);
        let null = self.null_token();

        batch.push_len(b'*', resp.len());
        for entry in resp.iter() {
            match entry {
                Some((_, value)) => {
                    batch.push_len(b'$', value.len());
                    batch.push_ref(value);
                    batch.push_meta(CRLF);
                }
                None => batch.push_meta(null),
            }

            if batch.is_full() {
                self.send_batch(&mut batch);
                if self.base.error().is_some() {
                    return;
                }
            }
        }

        if !batch.is_empty() {
            self.send_batch(&mut batch);
        }
    }

    fn send_long(&mut self, value: i64) {
        self.base.send_raw(format!(":{}\r\n", value).as_bytes());
    }

    fn send_simple_string(&mut self, value: &str) {
        self.base.send(&[
            IoSlice::new(b"+"),
            IoSlice::new(value.as_bytes()),
            IoSlice::new(CRLF),
        ]);
    }

    fn send_protocol_error(&mut self, message: &str) {
        let message = format!("-ERR Protocol error: {}", message);
        self.send_error(&message, &ErrorKind::Protocol);
    }
}
