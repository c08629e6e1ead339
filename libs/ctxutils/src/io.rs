//! I/O utilities
use std::io;

/// A little endian reader over a byte slice which never reads past its end
///
/// Short reads produce an [`std::io::Error`] of kind [`std::io::ErrorKind::UnexpectedEof`]
/// and leave the position unchanged
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a new cursor at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Creates a new cursor over `buf` positioned at `pos`
    pub fn at(buf: &'a [u8], pos: usize) -> io::Result<Self> {
        let mut ret = Self::new(buf);
        ret.seek(pos)?;
        Ok(ret)
    }

    /// Returns the current position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the size of the underlying slice
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the underlying slice is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the number of bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Moves to the absolute position `pos`
    pub fn seek(&mut self, pos: usize) -> io::Result<()> {
        if pos > self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Cannot seek to offset {} of a {} byte buffer",
                    pos,
                    self.buf.len()
                ),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    /// Moves forward by `n` bytes
    pub fn skip(&mut self, n: usize) -> io::Result<()> {
        self.take(n).map(|_| ())
    }

    /// Returns the next `n` bytes and advances past them
    pub fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Cannot read {} bytes at offset {} of a {} byte buffer",
                    n,
                    self.pos,
                    self.buf.len()
                ),
            ));
        }
        let ret = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(ret)
    }

    /// Returns a new cursor limited to the next `n` bytes and advances past them
    pub fn sub_cursor(&mut self, n: usize) -> io::Result<ByteCursor<'a>> {
        self.take(n).map(ByteCursor::new)
    }

    /// Returns the next byte without advancing
    pub fn peek_u8(&self) -> io::Result<u8> {
        self.clone().rdu8()
    }

    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.take(N)?);
        Ok(ret)
    }

    /// Single byte `u8` reader
    #[inline]
    pub fn rdu8(&mut self) -> io::Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Little endian `u16` reader
    #[inline]
    pub fn rdu16le(&mut self) -> io::Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    /// Little endian `i16` reader
    #[inline]
    pub fn rdi16le(&mut self) -> io::Result<i16> {
        self.array().map(i16::from_le_bytes)
    }

    /// Little endian `u32` reader
    #[inline]
    pub fn rdu32le(&mut self) -> io::Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    /// Little endian `i32` reader
    #[inline]
    pub fn rdi32le(&mut self) -> io::Result<i32> {
        self.array().map(i32::from_le_bytes)
    }

    /// Little endian `u64` reader
    #[inline]
    pub fn rdu64le(&mut self) -> io::Result<u64> {
        self.array().map(u64::from_le_bytes)
    }
}

/// Returns the `len` bytes of `buf` found at `offset`
///
/// Offsets and lengths usually come from untrusted 32 bit fields, hence the `u64` arguments
pub fn slice_at(buf: &[u8], offset: u64, len: u64) -> io::Result<&[u8]> {
    let range = usize::try_from(offset)
        .ok()
        .zip(usize::try_from(len).ok())
        .and_then(|(start, len)| Some(start..start.checked_add(len)?))
        .filter(|range| range.end <= buf.len());
    match range {
        Some(range) => Ok(&buf[range]),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Range of {} bytes at offset {} exceeds the {} byte buffer",
                len,
                offset,
                buf.len()
            ),
        )),
    }
}
