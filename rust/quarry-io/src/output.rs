//! Sequential writing of index files.

use quarry_common::{Result, error::Error};
use xxhash_rust::xxh3::Xxh3;

use crate::{
    SealingWrite,
    varint::{self, MAX_VLONG},
};

/// Amount of bytes accumulated before they are handed to the sink.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Byte-oriented output with the integer encodings of the index format.
///
/// Implemented by [`IndexOutput`] for files and by `Vec<u8>` for blocks that are
/// assembled in memory (skip levels, terms blocks) before being copied into a file.
pub trait DataOutput {
    fn write_byte(&mut self, b: u8) -> Result<()>;

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_vint(&mut self, value: u32) -> Result<()> {
        let mut buf = Vec::with_capacity(varint::MAX_VINT_LEN);
        varint::write_vint(value, &mut buf);
        self.write_bytes(&buf)
    }

    fn write_vlong(&mut self, value: u64) -> Result<()> {
        if value > MAX_VLONG {
            return Err(Error::invalid_arg(
                "value",
                format!("{value} cannot be written as a vLong"),
            ));
        }
        let mut buf = Vec::with_capacity(varint::MAX_VLONG_LEN);
        varint::write_vlong(value, &mut buf);
        self.write_bytes(&buf)
    }

    /// Writes a signed value as a zig-zag encoded `VLong`. Values whose zig-zag
    /// form exceeds the `VLong` range (magnitudes of 2^62 and above) are rejected.
    fn write_zlong(&mut self, value: i64) -> Result<()> {
        self.write_vlong(varint::zigzag_encode_i64(value))
    }

    /// Writes a `VInt` length-prefixed UTF-8 string.
    fn write_string(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len())
            .map_err(|_| Error::invalid_arg("s", "string is too long"))?;
        self.write_vint(len)?;
        self.write_bytes(s.as_bytes())
    }
}

impl DataOutput for Vec<u8> {
    #[inline]
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.push(b);
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    #[inline]
    fn write_vint(&mut self, value: u32) -> Result<()> {
        varint::write_vint(value, self);
        Ok(())
    }
}

/// A buffered, append-only index file writer.
///
/// Tracks the absolute file pointer (used by the postings writer to record term
/// offsets) and a running xxh3 checksum of everything written, which the codec
/// footer stores.
pub struct IndexOutput {
    name: String,
    sink: Box<dyn SealingWrite>,
    buffer: Vec<u8>,
    flushed: u64,
    hasher: Xxh3,
    closed: bool,
}

impl IndexOutput {
    pub fn new(name: impl Into<String>, sink: Box<dyn SealingWrite>) -> IndexOutput {
        IndexOutput {
            name: name.into(),
            sink,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD),
            flushed: 0,
            hasher: Xxh3::new(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of bytes written so far, i.e. the position at which the
    /// next byte will land.
    #[inline]
    pub fn file_pointer(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    /// Returns the checksum of all bytes written so far.
    pub fn checksum(&self) -> u64 {
        let mut hasher = self.hasher.clone();
        hasher.update(&self.buffer);
        hasher.digest()
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.hasher.update(&self.buffer);
        self.sink
            .write_all(&self.buffer)
            .map_err(|e| Error::io(self.name.clone(), e))?;
        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_operation(format!(
                "write to closed output {}",
                self.name
            )));
        }
        Ok(())
    }

    /// Flushes the remaining bytes and seals the sink. Returns the final file length.
    pub fn close(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.flush_buffer()?;
        self.sink
            .seal()
            .map_err(|e| Error::io(self.name.clone(), e))?;
        self.closed = true;
        log::debug!("closed {} ({} bytes)", self.name, self.flushed);
        Ok(self.flushed)
    }
}

impl DataOutput for IndexOutput {
    #[inline]
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.ensure_open()?;
        self.buffer.push(b);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for IndexOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexOutput")
            .field("name", &self.name)
            .field("file_pointer", &self.file_pointer())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DataOutput, IndexOutput};
    use crate::{IndexInput, MemoryFile};

    #[test]
    fn test_write_then_read() {
        let file = MemoryFile::new();
        let mut out = IndexOutput::new("test.bin", Box::new(file.clone()));
        out.write_u32(7).unwrap();
        out.write_vint(1_000_000).unwrap();
        out.write_vlong(1 << 50).unwrap();
        out.write_zlong(-1).unwrap();
        out.write_zlong(-(1 << 40)).unwrap();
        assert!(out.write_zlong(i64::MIN).is_err());
        out.write_string("Lucene40PostingsWriterFrq").unwrap();
        let pointer = out.file_pointer();
        out.write_u64(u64::MAX).unwrap();
        assert_eq!(out.close().unwrap(), pointer + 8);
        assert!(file.is_sealed());

        let mut input = IndexInput::open("test.bin", file.to_read_at()).unwrap();
        assert_eq!(input.read_u32().unwrap(), 7);
        assert_eq!(input.read_vint().unwrap(), 1_000_000);
        assert_eq!(input.read_vlong().unwrap(), 1 << 50);
        assert_eq!(input.read_zlong().unwrap(), -1);
        assert_eq!(input.read_zlong().unwrap(), -(1 << 40));
        assert_eq!(input.read_string().unwrap(), "Lucene40PostingsWriterFrq");
        assert_eq!(input.file_pointer(), pointer);
        assert_eq!(input.read_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn test_vlong_range_checked() {
        let mut buf = Vec::new();
        assert!(buf.write_vlong(u64::MAX).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_checksum_tracks_all_bytes() {
        let mut out = IndexOutput::new("a", Box::new(Vec::new()));
        out.write_bytes(b"same content").unwrap();
        let mut buffered = Vec::new();
        buffered.write_bytes(b"same content").unwrap();
        assert_eq!(out.checksum(), xxhash_rust::xxh3::xxh3_64(&buffered));
        out.close().unwrap();
        assert!(out.write_byte(1).is_err());
    }
}
