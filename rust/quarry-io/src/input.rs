//! Buffered, seekable reading cursor over a [`ReadAt`] source.

use std::sync::Arc;

use bytes::Bytes;
use quarry_common::{Result, error::Error};

use crate::{
    ReadAt, SlicedReadAt,
    utils::eof_error,
    varint::{self, MAX_VINT_LEN, MAX_VLONG_LEN},
};

/// Default amount of bytes fetched from the source per refill.
const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A forward-reading cursor over an immutable index file.
///
/// `IndexInput` keeps a window of bytes fetched from its source and decodes fixed-width
/// and variable-length integers from it. Seeking inside the window is free; seeking
/// outside drops it and the next read fetches a new one.
///
/// Cloning is cheap: the clone shares the source and the current window (both are
/// reference counted) and gets its own, independent position. This is how many
/// postings cursors read the same segment file concurrently.
#[derive(Clone)]
pub struct IndexInput {
    name: Arc<str>,
    source: Arc<dyn ReadAt>,
    length: u64,
    chunk_size: usize,
    /// Current window of the file, starting at `buffer_start`.
    buffer: Bytes,
    buffer_start: u64,
    /// Absolute position of the next byte to read.
    pos: u64,
}

impl IndexInput {
    /// Opens a cursor positioned at the start of `source`.
    pub fn open(name: impl Into<Arc<str>>, source: Arc<dyn ReadAt>) -> Result<IndexInput> {
        let name = name.into();
        let length = source
            .size()
            .map_err(|e| Error::io(name.to_string(), e))?;
        let chunk_size = source.storage_profile().clamp_io_size(DEFAULT_CHUNK_SIZE);
        Ok(IndexInput {
            name,
            source,
            length,
            chunk_size,
            buffer: Bytes::new(),
            buffer_start: 0,
            pos: 0,
        })
    }

    /// Opens a cursor over a byte buffer held in memory.
    pub fn from_bytes(name: impl Into<Arc<str>>, bytes: impl Into<Bytes>) -> Result<IndexInput> {
        let bytes: Bytes = bytes.into();
        IndexInput::open(name, Arc::new(bytes))
    }

    /// Returns a new cursor over `len` bytes starting at `offset` of this file.
    /// Positions of the returned cursor are relative to `offset`.
    pub fn slice(&self, name: &str, offset: u64, len: u64) -> Result<IndexInput> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.length)
            .ok_or_else(|| {
                Error::invalid_arg(
                    "slice",
                    format!(
                        "slice {name} ({offset}+{len}) out of bounds of {} (length {})",
                        self.name, self.length
                    ),
                )
            })?;
        let sliced = SlicedReadAt::new(Arc::clone(&self.source), offset..end);
        IndexInput::open(format!("{}:{name}", self.name), Arc::new(sliced))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns the current absolute position in the file.
    #[inline]
    pub fn file_pointer(&self) -> u64 {
        self.pos
    }

    /// Repositions the cursor. Seeking to `length()` is allowed (nothing can be read
    /// afterwards); seeking further is an error.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.length {
            return Err(Error::io(
                self.name.to_string(),
                eof_error(&self.name, pos, self.length),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip_bytes(&mut self, count: u64) -> Result<()> {
        self.seek(self.pos.saturating_add(count))
    }

    /// Returns the not yet consumed part of the current window.
    #[inline]
    fn buffered(&self) -> &[u8] {
        if self.pos >= self.buffer_start {
            let offset = (self.pos - self.buffer_start) as usize;
            if offset < self.buffer.len() {
                return &self.buffer[offset..];
            }
        }
        &[]
    }

    fn refill(&mut self) -> Result<()> {
        if self.pos >= self.length {
            return Err(Error::io(
                self.name.to_string(),
                eof_error(&self.name, self.pos, self.length),
            ));
        }
        let end = self.length.min(self.pos + self.chunk_size as u64);
        let bytes = self
            .source
            .read_at(self.pos..end)
            .map_err(|e| Error::io(self.name.to_string(), e))?;
        if bytes.is_empty() {
            return Err(Error::io(
                self.name.to_string(),
                eof_error(&self.name, self.pos, self.length),
            ));
        }
        self.buffer = bytes;
        self.buffer_start = self.pos;
        Ok(())
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        if let Some(&b) = self.buffered().first() {
            self.pos += 1;
            return Ok(b);
        }
        self.refill()?;
        let b = self.buffer[0];
        self.pos += 1;
        Ok(b)
    }

    /// Fills `dst` entirely from the file.
    pub fn read_bytes(&mut self, mut dst: &mut [u8]) -> Result<()> {
        while !dst.is_empty() {
            if self.buffered().is_empty() {
                self.refill()?;
            }
            let available = self.buffered();
            let n = available.len().min(dst.len());
            dst[..n].copy_from_slice(&available[..n]);
            self.pos += n as u64;
            dst = &mut dst[n..];
        }
        Ok(())
    }

    /// Reads `len` bytes, sharing the window when possible instead of copying.
    pub fn read_slice(&mut self, len: usize) -> Result<Bytes> {
        if self.buffered().len() >= len {
            let offset = (self.pos - self.buffer_start) as usize;
            self.pos += len as u64;
            return Ok(self.buffer.slice(offset..offset + len));
        }
        let mut out = vec![0u8; len];
        self.read_bytes(&mut out)?;
        Ok(Bytes::from(out))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    pub fn read_vint(&mut self) -> Result<u32> {
        let buffered = self.buffered();
        if buffered.len() >= MAX_VINT_LEN {
            let mut i = 0;
            let value = varint::decode_vint(&self.name, || {
                let b = buffered[i];
                i += 1;
                Ok(b)
            })?;
            self.pos += i as u64;
            return Ok(value);
        }
        let name = Arc::clone(&self.name);
        varint::decode_vint(&name, || self.read_byte())
    }

    #[inline]
    pub fn read_vlong(&mut self) -> Result<u64> {
        let buffered = self.buffered();
        if buffered.len() >= MAX_VLONG_LEN {
            let mut i = 0;
            let value = varint::decode_vlong(&self.name, || {
                let b = buffered[i];
                i += 1;
                Ok(b)
            })?;
            self.pos += i as u64;
            return Ok(value);
        }
        let name = Arc::clone(&self.name);
        varint::decode_vlong(&name, || self.read_byte())
    }

    /// Reads a zig-zag encoded signed `VLong`.
    pub fn read_zlong(&mut self) -> Result<i64> {
        Ok(varint::zigzag_decode_i64(self.read_vlong()?))
    }

    /// Reads a `VInt` length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        if len as u64 > self.length.saturating_sub(self.pos) {
            return Err(Error::corrupt_index(
                self.name.to_string(),
                format!("string length {len} exceeds remaining file length"),
            ));
        }
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            Error::corrupt_index(self.name.to_string(), "string is not valid UTF-8")
        })
    }
}

impl std::fmt::Debug for IndexInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexInput")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quarry_common::error::ErrorKind;

    use super::IndexInput;
    use crate::{ReadAt, StorageProfile, varint};

    /// A source that serves at most 3 bytes per read, to exercise window refills.
    struct TinyReads(Vec<u8>);

    impl ReadAt for TinyReads {
        fn size(&self) -> std::io::Result<u64> {
            Ok(self.0.len() as u64)
        }

        fn read_at(&self, range: std::ops::Range<u64>) -> std::io::Result<bytes::Bytes> {
            let start = range.start as usize;
            let end = (range.end as usize).min(start + 3).min(self.0.len());
            Ok(bytes::Bytes::copy_from_slice(&self.0[start..end]))
        }

        fn storage_profile(&self) -> StorageProfile {
            StorageProfile {
                min_io_size: 1,
                max_io_size: 3,
            }
        }
    }

    fn sample() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        varint::write_vint(300, &mut data);
        varint::write_vlong(1 << 40, &mut data);
        varint::write_vint(5, &mut data);
        data.extend_from_slice(b"hello");
        data.extend_from_slice(&42u64.to_be_bytes());
        data
    }

    fn check_sample(input: &mut IndexInput) {
        assert_eq!(input.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(input.read_vlong().unwrap(), 1 << 40);
        assert_eq!(input.read_string().unwrap(), "hello");
        assert_eq!(input.read_u64().unwrap(), 42);
        assert_eq!(input.file_pointer(), input.length());
    }

    #[test]
    fn test_read_from_memory() {
        let mut input = IndexInput::from_bytes("sample", sample()).unwrap();
        check_sample(&mut input);
    }

    #[test]
    fn test_read_with_small_windows() {
        let mut input = IndexInput::open("tiny", Arc::new(TinyReads(sample()))).unwrap();
        check_sample(&mut input);
    }

    #[test]
    fn test_read_past_eof() {
        let mut input = IndexInput::from_bytes("short", vec![1u8, 2]).unwrap();
        let err = input.read_u32().unwrap_err();
        match err.kind() {
            ErrorKind::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(input.seek(3).is_err());
        assert!(input.seek(2).is_ok());
    }

    #[test]
    fn test_clone_has_independent_position() {
        let mut input = IndexInput::from_bytes("sample", sample()).unwrap();
        assert_eq!(input.read_u32().unwrap(), 0xDEAD_BEEF);
        let mut clone = input.clone();
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(clone.file_pointer(), 4);
        assert_eq!(clone.read_vint().unwrap(), 300);
        clone.seek(0).unwrap();
        assert_eq!(clone.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(input.read_vlong().unwrap(), 1 << 40);
    }

    #[test]
    fn test_slice() {
        let data: Vec<u8> = (0u8..100).collect();
        let input = IndexInput::from_bytes("data", data).unwrap();
        let mut slice = input.slice("middle", 10, 20).unwrap();
        assert_eq!(slice.length(), 20);
        assert_eq!(slice.read_byte().unwrap(), 10);
        slice.seek(19).unwrap();
        assert_eq!(slice.read_byte().unwrap(), 29);
        assert!(slice.read_byte().is_err());
        assert!(input.slice("oob", 90, 20).is_err());
    }

    #[test]
    fn test_corrupt_vint_in_stream() {
        let mut input =
            IndexInput::from_bytes("bad", vec![0xFFu8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert!(input.read_vint().unwrap_err().is_corruption());
    }
}
