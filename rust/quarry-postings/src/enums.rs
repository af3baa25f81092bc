//! Cursor abstractions over terms and postings.
//!
//! All cursors are synchronous, forward-only pull iterators. They own their
//! stream handles (cheap clones of the segment files) and may be dropped at any
//! point without cleanup.

use std::sync::Arc;

use bytes::Bytes;
use quarry_common::Result;

use crate::{automaton::CompiledAutomaton, comparator::TermComparator, live_docs::LiveDocs};

/// Iterates document ids in strictly ascending order.
///
/// A fresh cursor is unpositioned (`doc_id()` returns [`crate::format::UNPOSITIONED`]).
/// Once [`crate::NO_MORE_DOCS`] has been returned every further call returns it
/// again.
pub trait DocIdSetIterator: Send {
    /// Current document id.
    fn doc_id(&self) -> u32;

    /// Moves to the next document and returns its id, or `NO_MORE_DOCS`.
    fn next_doc(&mut self) -> Result<u32>;

    /// Moves to the first document whose id is at least `target` and returns it,
    /// or `NO_MORE_DOCS`.
    ///
    /// `target` should be greater than the current document; otherwise the call
    /// behaves like [`DocIdSetIterator::next_doc`].
    fn advance(&mut self, target: u32) -> Result<u32>;

    /// Upper bound on the number of documents this cursor can return.
    fn cost(&self) -> u64;
}

/// A document cursor that also reports in-document term frequencies.
pub trait DocsEnum: DocIdSetIterator {
    /// Frequency of the term in the current document; 1 when the field omits
    /// frequencies.
    fn freq(&self) -> u32;
}

/// A document cursor with access to positions, payloads and offsets.
pub trait DocsAndPositionsEnum: DocsEnum {
    /// Returns the next position of the term in the current document.
    ///
    /// May be called at most `freq()` times per document; further calls fail with
    /// an `InvalidOperation` error.
    fn next_position(&mut self) -> Result<u32>;

    /// Start offset of the current position, or -1 when offsets are not indexed.
    fn start_offset(&self) -> i32;

    /// End offset of the current position, or -1 when offsets are not indexed.
    fn end_offset(&self) -> i32;

    /// Payload of the current position, loaded on first access.
    fn payload(&mut self) -> Result<Option<Bytes>>;
}

/// Outcome of [`TermsEnum::seek_ceil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// The target term exists; the enum is positioned on it.
    Found,
    /// The target does not exist; the enum is positioned on the smallest term
    /// greater than the target.
    NotFound,
    /// The target is greater than every term.
    End,
}

/// Iterates the terms of a field in comparator order.
pub trait TermsEnum: Send {
    /// Advances to the next term. Returns `false` at the end.
    fn next(&mut self) -> Result<bool>;

    /// The current term. Only valid after a successful `next` or seek.
    fn term(&self) -> &[u8];

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus>;

    fn seek_exact(&mut self, target: &[u8]) -> Result<bool> {
        Ok(self.seek_ceil(target)? == SeekStatus::Found)
    }

    /// Ordinal of the current term within its field.
    fn ord(&mut self) -> Result<u64>;

    fn doc_freq(&self) -> u32;

    /// -1 when the field omits frequencies.
    fn total_term_freq(&self) -> i64;

    /// Opens a document cursor over the current term's postings. Documents for
    /// which `live_docs` reports `false` are skipped.
    fn docs(&mut self, live_docs: Option<Arc<dyn LiveDocs>>) -> Result<Box<dyn DocsEnum>>;

    /// Opens a positions cursor over the current term's postings, or `None` when
    /// the field does not index positions.
    fn docs_and_positions(
        &mut self,
        live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>>;
}

/// The terms of one field, with their aggregate statistics.
pub trait Terms: Send + Sync {
    /// Returns a terms enum positioned before the first term.
    fn iterator(&self) -> Result<Box<dyn TermsEnum>>;

    /// Returns an enum over the terms accepted by `automaton`, restricted to terms
    /// strictly greater than `start_term` when one is given.
    fn intersect(
        &self,
        automaton: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Box<dyn TermsEnum>>;

    fn comparator(&self) -> TermComparator;

    /// Number of terms, or -1 when unknown.
    fn size(&self) -> i64;

    /// Sum of `total_term_freq` over all terms, or -1 when unknown.
    fn sum_total_term_freq(&self) -> i64;

    /// Sum of `doc_freq` over all terms, or -1 when unknown.
    fn sum_doc_freq(&self) -> i64;

    /// Number of documents with at least one term, or -1 when unknown.
    fn doc_count(&self) -> i64;

    fn has_freqs(&self) -> bool;

    fn has_offsets(&self) -> bool;

    fn has_positions(&self) -> bool;

    fn has_payloads(&self) -> bool;
}

impl<T: DocIdSetIterator + ?Sized> DocIdSetIterator for Box<T> {
    fn doc_id(&self) -> u32 {
        self.as_ref().doc_id()
    }

    fn next_doc(&mut self) -> Result<u32> {
        self.as_mut().next_doc()
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        self.as_mut().advance(target)
    }

    fn cost(&self) -> u64 {
        self.as_ref().cost()
    }
}

impl<T: DocsEnum + ?Sized> DocsEnum for Box<T> {
    fn freq(&self) -> u32 {
        self.as_ref().freq()
    }
}

impl<T: DocsAndPositionsEnum + ?Sized> DocsAndPositionsEnum for Box<T> {
    fn next_position(&mut self) -> Result<u32> {
        self.as_mut().next_position()
    }

    fn start_offset(&self) -> i32 {
        self.as_ref().start_offset()
    }

    fn end_offset(&self) -> i32 {
        self.as_ref().end_offset()
    }

    fn payload(&mut self) -> Result<Option<Bytes>> {
        self.as_mut().payload()
    }
}

/// An enum without terms, returned when nothing can match.
#[derive(Debug, Default)]
pub struct EmptyTermsEnum;

impl TermsEnum for EmptyTermsEnum {
    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn term(&self) -> &[u8] {
        &[]
    }

    fn seek_ceil(&mut self, _target: &[u8]) -> Result<SeekStatus> {
        Ok(SeekStatus::End)
    }

    fn ord(&mut self) -> Result<u64> {
        Err(quarry_common::error::Error::invalid_operation(
            "ord of an empty terms enum",
        ))
    }

    fn doc_freq(&self) -> u32 {
        0
    }

    fn total_term_freq(&self) -> i64 {
        0
    }

    fn docs(&mut self, _live_docs: Option<Arc<dyn LiveDocs>>) -> Result<Box<dyn DocsEnum>> {
        Err(quarry_common::error::Error::invalid_operation(
            "docs of an empty terms enum",
        ))
    }

    fn docs_and_positions(
        &mut self,
        _live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        Err(quarry_common::error::Error::invalid_operation(
            "docs_and_positions of an empty terms enum",
        ))
    }
}

/// Collects the remaining documents of a cursor. Intended for tools and tests.
pub fn collect_docs(docs: &mut dyn DocsEnum) -> Result<Vec<(u32, u32)>> {
    let mut out = Vec::new();
    loop {
        let doc = docs.next_doc()?;
        if doc == crate::NO_MORE_DOCS {
            return Ok(out);
        }
        out.push((doc, docs.freq()));
    }
}
