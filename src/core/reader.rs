//! Endianness-portable primitive reads over a seekable byte stream
//!
//! Every value is decoded from an explicit byte buffer with a fixed
//! [`ByteOrder`], so the result never depends on the host byte order. The
//! reader tracks its own absolute position so that every failure can report
//! the offset it happened at.

use std::io::{self, Read, Seek, SeekFrom};
use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ReadError, RecordError, Result};

/// A positioned reader decoding fixed-width primitives in byte order `B`
///
/// The XDA formats are little-endian (the default); the generic container
/// uses [`byteorder::BigEndian`].
pub struct ByteReader<R, B = LittleEndian> {
    inner: R,
    pos: u64,
    _order: PhantomData<B>,
}

impl<R: Read + Seek, B: ByteOrder> ByteReader<R, B> {
    /// Wraps a stream, taking its current position as the starting offset
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self {
            inner,
            pos,
            _order: PhantomData,
        })
    }

    /// Current absolute byte offset
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Seeks to an absolute offset
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Seeks back to offset 0
    pub fn rewind(&mut self) -> Result<()> {
        self.seek_to(0)
    }

    /// Releases the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Bytes left between the current position and the end of the stream
    pub fn remaining(&mut self) -> Result<u64> {
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(end.saturating_sub(self.pos))
    }

    /// Fails with [`ReadError::TruncatedInput`] unless `needed` more bytes exist
    ///
    /// Used before allocating a body whose size comes from header fields.
    pub fn ensure_remaining(&mut self, needed: u64) -> Result<()> {
        if self.remaining()? < needed {
            return Err(ReadError::TruncatedInput {
                offset: self.pos,
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
            }
            .into());
        }
        Ok(())
    }

    /// Fills `buf` completely or fails with [`ReadError::TruncatedInput`]
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ReadError::TruncatedInput {
                offset: self.pos,
                needed: buf.len(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_ne_bytes(self.array::<1>()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(B::read_u16(&self.array::<2>()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(B::read_i16(&self.array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(B::read_u32(&self.array::<4>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(B::read_i32(&self.array::<4>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(B::read_f32(&self.array::<4>()?))
    }

    /// Reads exactly `len` raw bytes
    ///
    /// The buffer grows with the bytes actually read, so a corrupt length
    /// cannot trigger a huge allocation before the truncation is noticed.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let offset = self.pos;
        let mut buf = Vec::new();
        let n = (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        self.pos += n as u64;
        if n < len {
            return Err(ReadError::TruncatedInput {
                offset,
                needed: len,
            }
            .into());
        }
        Ok(buf)
    }

    /// Skips `len` bytes that must nonetheless be present
    pub fn skip(&mut self, len: usize) -> Result<()> {
        let offset = self.pos;
        let n = io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
        self.pos += n;
        if n < len as u64 {
            return Err(ReadError::TruncatedInput {
                offset,
                needed: len,
            }
            .into());
        }
        Ok(())
    }

    /// Reads `count` consecutive floats
    pub fn read_f32_array(&mut self, count: usize) -> Result<Vec<f32>> {
        let bytes = self.read_bytes(count.saturating_mul(4))?;
        let mut values = vec![0f32; count];
        B::read_f32_into(&bytes, &mut values);
        Ok(values)
    }

    /// Reads a fixed-width ASCII field, dropping trailing NUL padding
    pub fn read_fixed_str(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(ascii_to_string(&bytes))
    }

    /// Reads a signed 32-bit length prefix
    fn read_len(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| {
            ReadError::InvalidLength {
                offset,
                length: i64::from(len),
            }
            .into()
        })
    }

    /// Reads a signed 32-bit count, rejecting negative values
    pub fn read_count(&mut self, field: &'static str) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_i32()?;
        check_count(field, count, offset)
    }

    /// Reads an `i32` length followed by that many ASCII bytes
    pub fn read_prefixed_str(&mut self) -> Result<String> {
        let len = self.read_len()?;
        self.read_fixed_str(len)
    }

    /// Reads an `i32` length followed by that many raw bytes
    pub fn read_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Reads an `i32` character count followed by UTF-16 code units in byte order `B`
    pub fn read_wide_str(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let offset = self.pos;
        let bytes = self.read_bytes(len * 2)?;
        decode_utf16::<B>(&bytes).ok_or_else(|| ReadError::InvalidWideString { offset }.into())
    }
}

/// Converts a count field read at `offset` into a length
pub(crate) fn check_count(field: &'static str, count: i32, offset: u64) -> Result<usize> {
    usize::try_from(count).map_err(|_| {
        RecordError::InvalidCount {
            field,
            count: count.into(),
            offset,
        }
        .into()
    })
}

/// Converts NUL-padded ASCII into a string
///
/// Bytes after the first NUL are padding; non-ASCII bytes are kept as Latin-1.
pub(crate) fn ascii_to_string(bytes: &[u8]) -> String {
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| b as char).collect()
}

/// Decodes UTF-16 code units stored in byte order `B`, dropping trailing NULs
pub(crate) fn decode_utf16<B: ByteOrder>(bytes: &[u8]) -> Option<String> {
    let units: Vec<u16> = bytes.chunks_exact(2).map(B::read_u16).collect();
    let end = units.iter().rposition(|&u| u != 0).map_or(0, |i| i + 1);
    String::from_utf16(&units[..end]).ok()
}
