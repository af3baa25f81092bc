use std::ops::Range;

use bytes::Bytes;

use crate::{ReadAt, StorageProfile};

/// A `ReadAt` adapter that restricts reads to a specified range of the underlying reader.
///
/// All read operations are **relative to the slice's starting position**. Used to
/// expose a region of a segment file (for example the body of a file between its
/// header and footer) as an independent file.
pub struct SlicedReadAt<R> {
    inner: R,
    range: Range<u64>,
}

impl<R> SlicedReadAt<R> {
    /// Creates a new `SlicedReadAt` adapter.
    ///
    /// # Panics
    ///
    /// Panics if `range.start > range.end`.
    pub fn new(inner: R, range: Range<u64>) -> Self {
        assert!(range.start <= range.end);
        Self { inner, range }
    }

    /// Returns the size of the slice.
    pub fn slice_size(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// Returns the range of the slice within the underlying reader.
    pub fn slice_range(&self) -> Range<u64> {
        self.range.clone()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ReadAt> ReadAt for SlicedReadAt<R> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.slice_size())
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let start = range.start;
        let end = std::cmp::min(self.slice_size(), range.end);
        if start >= end {
            return Ok(Bytes::new());
        }

        let inner_start = self.range.start.saturating_add(start);
        let inner_end = self.range.start.saturating_add(end);
        self.inner.read_at(inner_start..inner_end)
    }

    fn storage_profile(&self) -> StorageProfile {
        self.inner.storage_profile()
    }
}

impl<R: Clone> Clone for SlicedReadAt<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            range: self.range.clone(),
        }
    }
}
