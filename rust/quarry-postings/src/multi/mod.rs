//! Views presenting several segments as one index.
//!
//! Each segment occupies a contiguous range of the global document id space,
//! described by a [`ReaderSlice`]. Merged terms enumerate the union of the
//! segments' terms in comparator order; merged postings concatenate the
//! segments' postings, shifting document ids by the slice start.

use std::sync::Arc;

use crate::live_docs::LiveDocs;

mod docs;
mod fields;
mod terms;
mod terms_enum;

pub use docs::{MultiDocsAndPositionsEnum, MultiDocsEnum};
pub use fields::MultiFields;
pub use terms::MultiTerms;
pub use terms_enum::MultiTermsEnum;

/// The range of global document ids owned by one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderSlice {
    /// First global document id of the segment.
    pub start: u32,
    /// Number of documents (the segment's `max_doc`).
    pub length: u32,
    pub reader_index: usize,
}

impl ReaderSlice {
    pub fn new(start: u32, length: u32, reader_index: usize) -> ReaderSlice {
        ReaderSlice {
            start,
            length,
            reader_index,
        }
    }

    /// One past the last global document id of the segment.
    pub fn end(&self) -> u64 {
        self.start as u64 + self.length as u64
    }
}

/// Global live docs seen through the local document ids of one slice.
pub struct SliceLiveDocs {
    global: Arc<dyn LiveDocs>,
    slice: ReaderSlice,
}

impl SliceLiveDocs {
    pub fn new(global: Arc<dyn LiveDocs>, slice: ReaderSlice) -> SliceLiveDocs {
        SliceLiveDocs { global, slice }
    }
}

impl LiveDocs for SliceLiveDocs {
    #[inline]
    fn get(&self, doc: u32) -> bool {
        self.global.get(self.slice.start + doc)
    }

    fn len(&self) -> usize {
        self.slice.length as usize
    }
}

/// The live docs of several segments, concatenated in slice order.
pub struct MultiLiveDocs {
    subs: Vec<Option<Arc<dyn LiveDocs>>>,
    starts: Vec<u32>,
    len: usize,
}

impl MultiLiveDocs {
    /// `subs[i]` covers `slices[i]`; `None` means the segment has no deletions.
    pub fn new(subs: Vec<Option<Arc<dyn LiveDocs>>>, slices: &[ReaderSlice]) -> MultiLiveDocs {
        let len = slices.iter().map(ReaderSlice::end).max().unwrap_or(0) as usize;
        MultiLiveDocs {
            subs,
            starts: slices.iter().map(|slice| slice.start).collect(),
            len,
        }
    }
}

impl LiveDocs for MultiLiveDocs {
    fn get(&self, doc: u32) -> bool {
        let Some(index) = self.starts.partition_point(|&start| start <= doc).checked_sub(1) else {
            return false;
        };
        match &self.subs[index] {
            Some(live_docs) => live_docs.get(doc - self.starts[index]),
            None => true,
        }
    }

    fn len(&self) -> usize {
        self.len
    }
}
