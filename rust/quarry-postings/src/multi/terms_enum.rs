use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc};

use quarry_common::{Result, error::Error};

use crate::{
    comparator::TermComparator,
    enums::{DocsAndPositionsEnum, DocsEnum, SeekStatus, TermsEnum},
    live_docs::LiveDocs,
};

use super::{MultiDocsEnum, ReaderSlice, SliceLiveDocs};

struct SubTerms {
    terms: Box<dyn TermsEnum>,
    slice: ReaderSlice,
}

/// Queue entry: the current term of sub `index`. Ordered so that the smallest
/// term, then the lowest sub index, is popped first.
struct QueueEntry {
    term: Vec<u8>,
    index: usize,
    comparator: TermComparator,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(&other.term, &self.term)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

/// Merges the terms enums of several segments into one sorted enum.
///
/// Subs positioned on the current term are "on top"; the others wait in a
/// priority queue keyed by their current term.
pub struct MultiTermsEnum {
    subs: Vec<SubTerms>,
    comparator: TermComparator,
    queue: BinaryHeap<QueueEntry>,
    top: Vec<usize>,
    current: Vec<u8>,
    started: bool,
}

impl MultiTermsEnum {
    pub(crate) fn new(
        comparator: TermComparator,
        subs: Vec<(Box<dyn TermsEnum>, ReaderSlice)>,
    ) -> MultiTermsEnum {
        MultiTermsEnum {
            subs: subs
                .into_iter()
                .map(|(terms, slice)| SubTerms { terms, slice })
                .collect(),
            comparator,
            queue: BinaryHeap::new(),
            top: Vec::new(),
            current: Vec::new(),
            started: false,
        }
    }

    /// Slices of the segments positioned on the current term, by sub index.
    pub fn matching_subs(&self) -> impl Iterator<Item = ReaderSlice> + '_ {
        self.top.iter().map(|&i| self.subs[i].slice)
    }

    pub fn num_matching_subs(&self) -> usize {
        self.top.len()
    }

    fn push(&mut self, index: usize) {
        self.queue.push(QueueEntry {
            term: self.subs[index].terms.term().to_vec(),
            index,
            comparator: self.comparator,
        });
    }

    /// Advances the subs on top and returns them to the queue.
    fn push_top(&mut self) -> Result<()> {
        let top = std::mem::take(&mut self.top);
        for &index in &top {
            if self.subs[index].terms.next()? {
                self.push(index);
            }
        }
        self.top = top;
        self.top.clear();
        Ok(())
    }

    /// Moves every sub positioned on the smallest queued term to the top.
    fn pull_top(&mut self) -> bool {
        let Some(first) = self.queue.pop() else {
            self.current.clear();
            return false;
        };
        self.top.push(first.index);
        while let Some(entry) = self.queue.peek() {
            if self.comparator.compare(&entry.term, &first.term) != Ordering::Equal {
                break;
            }
            if let Some(entry) = self.queue.pop() {
                self.top.push(entry.index);
            }
        }
        self.top.sort_unstable();
        self.current = first.term;
        true
    }

    fn require_top(&self, operation: &str) -> Result<()> {
        if self.top.is_empty() {
            return Err(Error::invalid_operation(format!(
                "{operation} on an unpositioned merged terms enum"
            )));
        }
        Ok(())
    }

    fn sub_live_docs(
        live_docs: &Option<Arc<dyn LiveDocs>>,
        slice: ReaderSlice,
    ) -> Option<Arc<dyn LiveDocs>> {
        live_docs
            .as_ref()
            .map(|live| Arc::new(SliceLiveDocs::new(Arc::clone(live), slice)) as Arc<dyn LiveDocs>)
    }
}

impl TermsEnum for MultiTermsEnum {
    fn next(&mut self) -> Result<bool> {
        if self.started {
            self.push_top()?;
        } else {
            self.started = true;
            self.queue.clear();
            self.top.clear();
            for index in 0..self.subs.len() {
                if self.subs[index].terms.next()? {
                    self.push(index);
                }
            }
        }
        Ok(self.pull_top())
    }

    fn term(&self) -> &[u8] {
        &self.current
    }

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus> {
        self.started = true;
        self.queue.clear();
        self.top.clear();
        for index in 0..self.subs.len() {
            match self.subs[index].terms.seek_ceil(target)? {
                SeekStatus::Found => self.top.push(index),
                SeekStatus::NotFound => self.push(index),
                SeekStatus::End => {}
            }
        }
        if !self.top.is_empty() {
            self.current.clear();
            self.current.extend_from_slice(target);
            return Ok(SeekStatus::Found);
        }
        if self.pull_top() {
            Ok(SeekStatus::NotFound)
        } else {
            Ok(SeekStatus::End)
        }
    }

    fn ord(&mut self) -> Result<u64> {
        Err(Error::invalid_operation(
            "ord is not available for merged terms",
        ))
    }

    fn doc_freq(&self) -> u32 {
        self.top
            .iter()
            .map(|&i| self.subs[i].terms.doc_freq())
            .sum()
    }

    fn total_term_freq(&self) -> i64 {
        let mut sum = 0;
        for &i in &self.top {
            let value = self.subs[i].terms.total_term_freq();
            if value < 0 {
                return -1;
            }
            sum += value;
        }
        sum
    }

    fn docs(&mut self, live_docs: Option<Arc<dyn LiveDocs>>) -> Result<Box<dyn DocsEnum>> {
        self.require_top("docs")?;
        let mut subs = Vec::with_capacity(self.top.len());
        for &i in &self.top {
            let sub = &mut self.subs[i];
            let docs = sub
                .terms
                .docs(Self::sub_live_docs(&live_docs, sub.slice))?;
            subs.push((docs, sub.slice));
        }
        Ok(Box::new(MultiDocsEnum::new(subs)))
    }

    fn docs_and_positions(
        &mut self,
        live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        self.require_top("docs_and_positions")?;
        let mut subs = Vec::with_capacity(self.top.len());
        for &i in &self.top {
            let sub = &mut self.subs[i];
            let Some(positions) = sub
                .terms
                .docs_and_positions(Self::sub_live_docs(&live_docs, sub.slice))?
            else {
                return Ok(None);
            };
            subs.push((positions, sub.slice));
        }
        Ok(Some(Box::new(MultiDocsEnum::new(subs))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_pops_smallest_term_then_lowest_index() {
        let entry = |term: &str, index| QueueEntry {
            term: term.as_bytes().to_vec(),
            index,
            comparator: TermComparator::Binary,
        };
        let mut queue = BinaryHeap::new();
        queue.push(entry("dog", 0));
        queue.push(entry("cat", 2));
        queue.push(entry("cat", 1));
        let order: Vec<(Vec<u8>, usize)> = std::iter::from_fn(|| queue.pop())
            .map(|e| (e.term, e.index))
            .collect();
        assert_eq!(
            order,
            vec![
                (b"cat".to_vec(), 1),
                (b"cat".to_vec(), 2),
                (b"dog".to_vec(), 0)
            ]
        );
    }
}
