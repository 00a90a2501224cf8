//! Sink abstraction
//!
//! The byte destination reply builders write to. A sink accepts a list of
//! regions and either writes every byte or reports an error. It never retries
//! on its own behalf beyond finishing a partially accepted write.
//!
//! Every `std::io::Write` is a sink, so a `TcpStream`, a `File`, a `Vec<u8>`
//! or a `&mut` to any of them can be handed to a builder directly.

use std::io::{self, IoSlice, Write};

/// Scatter-gather byte destination
pub trait Sink {
    /// Write all regions in order, or fail
    fn write_all_iov(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<()>;

    /// Write one contiguous region
    fn write_all_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all_iov(&[IoSlice::new(buf)])
    }
}

impl<W: Write + ?Sized> Sink for W {
    fn write_all_iov(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<()> {
        // advance_slices needs a mutable, owned list of slices
        let mut storage: Vec<IoSlice<'_>> = bufs.iter().filter(|b| !b.is_empty()).copied().collect();
        let mut remaining: &mut [IoSlice<'_>] = &mut storage;

        while !remaining.is_empty() {
            match self.write_vectored(remaining) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted zero bytes",
                    ));
                }
                Ok(n) => IoSlice::advance_slices(&mut remaining, n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.flush()
    }
}
