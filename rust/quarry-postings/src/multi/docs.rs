use bytes::Bytes;
use quarry_common::Result;

use crate::{
    enums::{DocIdSetIterator, DocsAndPositionsEnum, DocsEnum},
    format::{NO_MORE_DOCS, UNPOSITIONED},
};

use super::ReaderSlice;

/// Concatenates the postings of one term across segments, mapping every
/// document id into the global id space.
pub struct MultiDocsEnum<E> {
    subs: Vec<(E, ReaderSlice)>,
    current: usize,
    doc: u32,
}

/// Merged positions cursor.
pub type MultiDocsAndPositionsEnum = MultiDocsEnum<Box<dyn DocsAndPositionsEnum>>;

impl<E: DocsEnum> MultiDocsEnum<E> {
    /// Sub-cursors may be given in any order; they are visited by slice start.
    pub fn new(mut subs: Vec<(E, ReaderSlice)>) -> MultiDocsEnum<E> {
        subs.sort_by_key(|(_, slice)| slice.start);
        MultiDocsEnum {
            subs,
            current: 0,
            doc: UNPOSITIONED,
        }
    }

    pub fn num_subs(&self) -> usize {
        self.subs.len()
    }

    /// Slices of the segments contributing to this cursor, by slice start.
    pub fn slices(&self) -> impl Iterator<Item = &ReaderSlice> {
        self.subs.iter().map(|(_, slice)| slice)
    }

    fn finish(&mut self) -> u32 {
        self.current = self.subs.len();
        self.doc = NO_MORE_DOCS;
        NO_MORE_DOCS
    }
}

impl<E: DocsEnum> DocIdSetIterator for MultiDocsEnum<E> {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        while let Some((sub, slice)) = self.subs.get_mut(self.current) {
            let doc = sub.next_doc()?;
            if doc != NO_MORE_DOCS {
                self.doc = slice.start + doc;
                return Ok(self.doc);
            }
            self.current += 1;
        }
        Ok(self.finish())
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        while let Some((sub, slice)) = self.subs.get_mut(self.current) {
            if target as u64 >= slice.end() {
                self.current += 1;
                continue;
            }
            let doc = if target < slice.start {
                sub.next_doc()?
            } else {
                sub.advance(target - slice.start)?
            };
            if doc != NO_MORE_DOCS {
                self.doc = slice.start + doc;
                return Ok(self.doc);
            }
            self.current += 1;
        }
        Ok(self.finish())
    }

    fn cost(&self) -> u64 {
        self.subs.iter().map(|(sub, _)| sub.cost()).sum()
    }
}

impl<E: DocsEnum> DocsEnum for MultiDocsEnum<E> {
    fn freq(&self) -> u32 {
        self.subs
            .get(self.current)
            .map_or(1, |(sub, _)| sub.freq())
    }
}

impl<E: DocsAndPositionsEnum> DocsAndPositionsEnum for MultiDocsEnum<E> {
    fn next_position(&mut self) -> Result<u32> {
        match self.subs.get_mut(self.current) {
            Some((sub, _)) => sub.next_position(),
            None => Err(quarry_common::error::Error::invalid_operation(
                "next_position on an exhausted cursor",
            )),
        }
    }

    fn start_offset(&self) -> i32 {
        self.subs
            .get(self.current)
            .map_or(-1, |(sub, _)| sub.start_offset())
    }

    fn end_offset(&self) -> i32 {
        self.subs
            .get(self.current)
            .map_or(-1, |(sub, _)| sub.end_offset())
    }

    fn payload(&mut self) -> Result<Option<Bytes>> {
        match self.subs.get_mut(self.current) {
            Some((sub, _)) => sub.payload(),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cursor over a fixed list of documents.
    struct ListDocs {
        docs: Vec<u32>,
        index: Option<usize>,
    }

    impl ListDocs {
        fn new(docs: &[u32]) -> ListDocs {
            ListDocs {
                docs: docs.to_vec(),
                index: None,
            }
        }
    }

    impl DocIdSetIterator for ListDocs {
        fn doc_id(&self) -> u32 {
            match self.index {
                None => UNPOSITIONED,
                Some(i) => self.docs.get(i).copied().unwrap_or(NO_MORE_DOCS),
            }
        }

        fn next_doc(&mut self) -> Result<u32> {
            let next = self.index.map_or(0, |i| i + 1).min(self.docs.len());
            self.index = Some(next);
            Ok(self.doc_id())
        }

        fn advance(&mut self, target: u32) -> Result<u32> {
            loop {
                let doc = self.next_doc()?;
                if doc >= target {
                    return Ok(doc);
                }
            }
        }

        fn cost(&self) -> u64 {
            self.docs.len() as u64
        }
    }

    impl DocsEnum for ListDocs {
        fn freq(&self) -> u32 {
            1
        }
    }

    fn merged() -> MultiDocsEnum<ListDocs> {
        MultiDocsEnum::new(vec![
            (ListDocs::new(&[0, 3]), ReaderSlice::new(10, 5, 1)),
            (ListDocs::new(&[1, 4]), ReaderSlice::new(0, 5, 0)),
            (ListDocs::new(&[2]), ReaderSlice::new(20, 3, 2)),
        ])
    }

    #[test]
    fn test_next_doc_remaps_in_slice_order() {
        let mut docs = merged();
        let mut seen = Vec::new();
        loop {
            let doc = docs.next_doc().unwrap();
            if doc == NO_MORE_DOCS {
                break;
            }
            seen.push(doc);
        }
        assert_eq!(seen, vec![1, 4, 10, 13, 22]);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);
        assert_eq!(docs.cost(), 5);
    }

    #[test]
    fn test_advance_skips_whole_slices() {
        let mut docs = merged();
        assert_eq!(docs.advance(5).unwrap(), 10);
        assert_eq!(docs.advance(11).unwrap(), 13);
        assert_eq!(docs.advance(15).unwrap(), 22);
        assert_eq!(docs.advance(23).unwrap(), NO_MORE_DOCS);
        assert_eq!(docs.doc_id(), NO_MORE_DOCS);
    }
}
