//! Shared test helpers
//!
//! - `RecordingSink`: captures bytes and counts physical writes
//! - `FailingSink`: succeeds a fixed number of times, then fails
//! - `decode`: minimal RESP2/RESP3 decoder for decode-back checks

#![allow(dead_code)]

use std::io::{self, IoSlice, Write};

// =============================================================================
// Sinks
// =============================================================================

/// Accepts every vectored write in one call
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub data: Vec<u8>,
    pub writes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.writes += 1;
        let mut total = 0;
        for buf in bufs {
            self.data.extend_from_slice(buf);
            total += buf.len();
        }
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fails every write after the first `ok_writes`
#[derive(Debug)]
pub struct FailingSink {
    pub inner: RecordingSink,
    pub ok_writes: usize,
    pub attempts: usize,
    pub kinds: Vec<io::ErrorKind>,
}

impl FailingSink {
    /// Fails with `BrokenPipe` first and `ConnectionReset` afterwards, so a
    /// test can tell the first error from later ones
    pub fn new(ok_writes: usize) -> Self {
        Self {
            inner: RecordingSink::new(),
            ok_writes,
            attempts: 0,
            kinds: vec![io::ErrorKind::BrokenPipe, io::ErrorKind::ConnectionReset],
        }
    }

    fn next_error(&mut self) -> io::Error {
        let failures = self.attempts - self.ok_writes - 1;
        let kind = self.kinds[failures.min(self.kinds.len() - 1)];
        io::Error::new(kind, "injected failure")
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.attempts += 1;
        if self.attempts > self.ok_writes {
            return Err(self.next_error());
        }
        self.inner.write_vectored(bufs)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// RESP decoder
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Resp {
    Simple(String),
    Error(String),
    Int(i64),
    Bulk(Vec<u8>),
    NullBulk,
    Array(Vec<Resp>),
    NullArray,
    Null,
    Double(f64),
    Map(Vec<(Resp, Resp)>),
    Set(Vec<Resp>),
    Push(Vec<Resp>),
    Verbatim(String, Vec<u8>),
}

impl Resp {
    pub fn bulk(s: &str) -> Resp {
        Resp::Bulk(s.as_bytes().to_vec())
    }
}

/// Decode exactly one value spanning all of `input`
pub fn decode(input: &[u8]) -> Resp {
    let (value, used) = decode_one(input);
    assert_eq!(used, input.len(), "trailing bytes after RESP value");
    value
}

/// Decode every value in `input`
pub fn decode_all(mut input: &[u8]) -> Vec<Resp> {
    let mut out = Vec::new();
    while !input.is_empty() {
        let (value, used) = decode_one(input);
        out.push(value);
        input = &input[used..];
    }
    out
}

fn line(input: &[u8]) -> (&str, usize) {
    let end = input
        .windows(2)
        .position(|w| w == b"\r\n")
        .expect("missing CRLF");
    (std::str::from_utf8(&input[1..end]).unwrap(), end + 2)
}

fn decode_items(input: &[u8], count: usize, mut pos: usize) -> (Vec<Resp>, usize) {
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let (item, used) = decode_one(&input[pos..]);
        items.push(item);
        pos += used;
    }
    (items, pos)
}

pub fn decode_one(input: &[u8]) -> (Resp, usize) {
    let (text, header) = line(input);
    match input[0] {
        b'+' => (Resp::Simple(text.to_string()), header),
        b'-' => (Resp::Error(text.to_string()), header),
        b':' => (Resp::Int(text.parse().unwrap()), header),
        b'_' => (Resp::Null, header),
        b',' => {
            let value = match text {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                other => other.parse().unwrap(),
            };
            (Resp::Double(value), header)
        }
        b'$' | b'=' => {
            let len: i64 = text.parse().unwrap();
            if len < 0 {
                return (Resp::NullBulk, header);
            }
            let len = len as usize;
            let body = input[header..header + len].to_vec();
            assert_eq!(&input[header + len..header + len + 2], b"\r\n");
            let used = header + len + 2;
            if input[0] == b'=' {
                let format = String::from_utf8(body[..3].to_vec()).unwrap();
                assert_eq!(body[3], b':');
                (Resp::Verbatim(format, body[4..].to_vec()), used)
            } else {
                (Resp::Bulk(body), used)
            }
        }
        b'*' | b'~' | b'>' => {
            let len: i64 = text.parse().unwrap();
            if len < 0 {
                return (Resp::NullArray, header);
            }
            let (items, used) = decode_items(input, len as usize, header);
            let value = match input[0] {
                b'*' => Resp::Array(items),
                b'~' => Resp::Set(items),
                _ => Resp::Push(items),
            };
            (value, used)
        }
        b'%' => {
            let pairs: usize = text.parse().unwrap();
            let (items, used) = decode_items(input, pairs * 2, header);
            let mut iter = items.into_iter();
            let mut map = Vec::with_capacity(pairs);
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                map.push((k, v));
            }
            (Resp::Map(map), used)
        }
        other => panic!("unknown RESP type byte {:?}", other as char),
    }
}
