use std::{
    ops::Range,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;

use crate::{ReadAt, SealingWrite, StorageProfile, verify};

impl<T> ReadAt for T
where
    T: details::SliceBytes + Send + Sync + 'static,
{
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        verify!(range.end >= range.start);
        let pos = range.start as usize;
        let len = (range.end - range.start) as usize;
        let content_len = self.len();
        if pos > content_len {
            return Ok(Bytes::new());
        }
        let len = std::cmp::min(len, content_len - pos);
        Ok(self.slice(pos..pos + len))
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            max_io_size: self.len().clamp(1, StorageProfile::default().max_io_size),
        }
    }
}

impl SealingWrite for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            ..Default::default()
        }
    }
}

/// An in-memory file shared between a writer and later readers.
///
/// Cloning a `MemoryFile` yields another handle to the same content. One handle is
/// typically boxed and handed to an index writer as its `SealingWrite` sink, while the
/// caller keeps another to obtain the written bytes once the writer is done.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    inner: Arc<Mutex<MemoryFileState>>,
}

#[derive(Debug, Default)]
struct MemoryFileState {
    data: Vec<u8>,
    sealed: bool,
}

impl MemoryFile {
    pub fn new() -> MemoryFile {
        Default::default()
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Returns an immutable snapshot of the file content.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock().data)
    }

    /// Returns a snapshot of the file content as a shareable reader.
    pub fn to_read_at(&self) -> Arc<dyn ReadAt> {
        Arc::new(self.to_bytes())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFileState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SealingWrite for MemoryFile {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let mut state = self.lock();
        if state.sealed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "write to a sealed memory file",
            ));
        }
        state.data.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.lock().sealed = true;
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            ..Default::default()
        }
    }
}

mod details {
    use std::ops::Range;

    use bytes::Bytes;

    pub trait SliceBytes {
        fn len(&self) -> usize;
        fn slice(&self, range: Range<usize>) -> Bytes;
    }

    impl SliceBytes for Bytes {
        fn len(&self) -> usize {
            Bytes::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::slice(self, range)
        }
    }

    impl SliceBytes for Vec<u8> {
        fn len(&self) -> usize {
            Vec::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::copy_from_slice(&self[range])
        }
    }
}
