//! Document and frequency cursor over the frequency stream.

use std::sync::Arc;

use quarry_common::Result;
use quarry_io::IndexInput;

use crate::{
    enums::{DocIdSetIterator, DocsEnum},
    format::{
        BINARY_SEARCH_THRESHOLD, BlockTermState, DOCS_BUFFER_SIZE, FieldInfo, NO_MORE_DOCS,
        UNPOSITIONED,
    },
    live_docs::LiveDocs,
    skip::SkipReader,
};

use super::postings::{PostingsReader, SkipParams};

/// Decides which decoded documents a cursor returns.
pub(crate) trait DocFilter: Send {
    fn accept(&self, doc: u32) -> bool;
}

/// Accepts every document; compiles down to the unfiltered decode loop.
pub(crate) struct AllDocs;

impl DocFilter for AllDocs {
    #[inline(always)]
    fn accept(&self, _doc: u32) -> bool {
        true
    }
}

pub(crate) struct LiveDocsFilter(Arc<dyn LiveDocs>);

impl DocFilter for LiveDocsFilter {
    #[inline]
    fn accept(&self, doc: u32) -> bool {
        self.0.get(doc)
    }
}

/// Cursor over the documents and frequencies of one term.
///
/// Documents are decoded `DOCS_BUFFER_SIZE` at a time; `advance` searches the
/// buffer first and falls back to the skip list for distant targets. Segments
/// with deletions use a separate instantiation of the decode loop that drops
/// deleted documents while filling the buffer.
pub struct SegmentDocsEnum {
    inner: DocsVariant,
}

enum DocsVariant {
    AllDocs(DocsCursor<AllDocs>),
    LiveDocs(DocsCursor<LiveDocsFilter>),
}

/// Decoding state shared by both variants. Survives reuse of the cursor.
struct DocsCore {
    reader_id: u64,
    frq: IndexInput,
    skip: SkipParams,
    skipper: Option<SkipReader>,

    has_freqs: bool,
    store_payloads: bool,
    store_offsets: bool,

    docs: [u32; DOCS_BUFFER_SIZE],
    freqs: [u32; DOCS_BUFFER_SIZE],
    /// Index of the current document in the buffer; -1 before the first.
    start: isize,
    count: usize,
    max_buffered_doc: u32,

    /// Number of postings decoded from the stream.
    ord: u32,
    limit: u32,
    /// Last document decoded from the stream.
    accum: u32,
    doc: u32,
    freq: u32,

    freq_offset: u64,
    skip_offset: u64,
    skipped: bool,
}

struct DocsCursor<F: DocFilter> {
    core: DocsCore,
    filter: F,
}

impl SegmentDocsEnum {
    pub(crate) fn open(
        reader: &PostingsReader,
        field: &FieldInfo,
        state: &BlockTermState,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentDocsEnum>,
    ) -> Result<SegmentDocsEnum> {
        let mut core = match reuse {
            Some(docs) => docs.into_core(),
            None => DocsCore::new(reader),
        };
        core.reset(field, state)?;
        let inner = match live_docs {
            None => DocsVariant::AllDocs(DocsCursor {
                core,
                filter: AllDocs,
            }),
            Some(live_docs) => DocsVariant::LiveDocs(DocsCursor {
                core,
                filter: LiveDocsFilter(live_docs),
            }),
        };
        Ok(SegmentDocsEnum { inner })
    }

    pub(crate) fn reader_id(&self) -> u64 {
        self.core().reader_id
    }

    fn core(&self) -> &DocsCore {
        match &self.inner {
            DocsVariant::AllDocs(cursor) => &cursor.core,
            DocsVariant::LiveDocs(cursor) => &cursor.core,
        }
    }

    fn into_core(self) -> DocsCore {
        match self.inner {
            DocsVariant::AllDocs(cursor) => cursor.core,
            DocsVariant::LiveDocs(cursor) => cursor.core,
        }
    }

    /// Whether deleted documents are filtered out by this cursor.
    pub fn has_live_docs(&self) -> bool {
        matches!(self.inner, DocsVariant::LiveDocs(_))
    }
}

impl std::fmt::Debug for SegmentDocsEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core();
        f.debug_struct("SegmentDocsEnum")
            .field("doc", &core.doc)
            .field("ord", &core.ord)
            .field("limit", &core.limit)
            .field("live_docs", &self.has_live_docs())
            .finish()
    }
}

impl DocIdSetIterator for SegmentDocsEnum {
    fn doc_id(&self) -> u32 {
        self.core().doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        match &mut self.inner {
            DocsVariant::AllDocs(cursor) => cursor.next_doc(),
            DocsVariant::LiveDocs(cursor) => cursor.next_doc(),
        }
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        match &mut self.inner {
            DocsVariant::AllDocs(cursor) => cursor.advance(target),
            DocsVariant::LiveDocs(cursor) => cursor.advance(target),
        }
    }

    fn cost(&self) -> u64 {
        self.core().limit as u64
    }
}

impl DocsEnum for SegmentDocsEnum {
    fn freq(&self) -> u32 {
        self.core().freq
    }
}

impl DocsCore {
    fn new(reader: &PostingsReader) -> DocsCore {
        DocsCore {
            reader_id: reader.id(),
            frq: reader.frq().clone(),
            skip: reader.skip_params(),
            skipper: None,
            has_freqs: false,
            store_payloads: false,
            store_offsets: false,
            docs: [0; DOCS_BUFFER_SIZE],
            freqs: [1; DOCS_BUFFER_SIZE],
            start: -1,
            count: 0,
            max_buffered_doc: UNPOSITIONED,
            ord: 0,
            limit: 0,
            accum: 0,
            doc: UNPOSITIONED,
            freq: 1,
            freq_offset: 0,
            skip_offset: 0,
            skipped: false,
        }
    }

    fn reset(&mut self, field: &FieldInfo, state: &BlockTermState) -> Result<()> {
        self.has_freqs = field.has_freqs();
        self.store_payloads = field.store_payloads;
        self.store_offsets = field.has_offsets();
        self.freq_offset = state.freq_offset;
        self.skip_offset = state.skip_offset;
        self.frq.seek(state.freq_offset)?;
        self.limit = state.doc_freq;
        self.ord = 0;
        self.doc = UNPOSITIONED;
        self.accum = 0;
        self.skipped = false;
        self.start = -1;
        self.count = 0;
        self.freq = 1;
        if !self.has_freqs {
            self.freqs.fill(1);
        }
        self.max_buffered_doc = UNPOSITIONED;
        Ok(())
    }

    #[inline]
    fn read_freq(&mut self, code: u32) -> Result<u32> {
        if code & 1 != 0 {
            Ok(1)
        } else {
            self.frq.read_vint()
        }
    }

    /// Decodes the next posting into `accum`/`freq`.
    #[inline]
    fn read_posting(&mut self) -> Result<()> {
        let code = self.frq.read_vint()?;
        if self.has_freqs {
            self.accum = self.accum.wrapping_add(code >> 1);
            self.freq = self.read_freq(code)?;
        } else {
            self.accum = self.accum.wrapping_add(code);
        }
        Ok(())
    }
}

impl<F: DocFilter> DocsCursor<F> {
    fn next_doc(&mut self) -> Result<u32> {
        let core = &mut self.core;
        core.start += 1;
        if (core.start as usize) < core.count {
            let i = core.start as usize;
            core.freq = core.freqs[i];
            core.doc = core.docs[i];
            return Ok(core.doc);
        }
        let doc = self.refill()?;
        self.core.doc = doc;
        Ok(doc)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.core.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let core = &mut self.core;
        core.start += 1;
        if (core.start as usize) < core.count && core.max_buffered_doc >= target {
            if core.count - core.start as usize > BINARY_SEARCH_THRESHOLD {
                core.start = binary_search(&core.docs[..core.count], core.start as usize, target);
                return self.next_doc();
            }
            return self.linear_scan(target);
        }
        // The buffer cannot contain the target.
        core.start = core.count as isize;
        let doc = self.skip_to(target)?;
        self.core.doc = doc;
        Ok(doc)
    }

    fn linear_scan(&mut self, target: u32) -> Result<u32> {
        let core = &mut self.core;
        for i in core.start as usize..core.count {
            let doc = core.docs[i];
            if doc >= target {
                core.freq = core.freqs[i];
                core.start = i as isize;
                core.doc = doc;
                return Ok(doc);
            }
        }
        let doc = self.refill()?;
        self.core.doc = doc;
        Ok(doc)
    }

    /// Returns the next accepted document decoded straight from the stream.
    fn next_unread_doc(&mut self) -> Result<u32> {
        let core = &mut self.core;
        while core.ord < core.limit {
            core.ord += 1;
            core.read_posting()?;
            if self.filter.accept(core.accum) {
                return Ok(core.accum);
            }
        }
        Ok(NO_MORE_DOCS)
    }

    /// Decodes the next accepted document and buffers the ones that follow it.
    fn refill(&mut self) -> Result<u32> {
        let doc = self.next_unread_doc()?;
        let core = &mut self.core;
        core.count = 0;
        core.start = -1;
        if doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let first_freq = core.freq;
        let num_docs = DOCS_BUFFER_SIZE.min((core.limit - core.ord) as usize);
        core.ord += num_docs as u32;
        for _ in 0..num_docs {
            core.read_posting()?;
            if self.filter.accept(core.accum) {
                core.docs[core.count] = core.accum;
                core.freqs[core.count] = core.freq;
                core.count += 1;
            }
        }
        core.max_buffered_doc = if core.count > 0 {
            core.docs[core.count - 1]
        } else {
            NO_MORE_DOCS
        };
        core.freq = first_freq;
        Ok(doc)
    }

    fn skip_to(&mut self, target: u32) -> Result<u32> {
        let core = &mut self.core;
        if core.skip.should_skip(core.accum, target, core.limit) {
            let skip = core.skip;
            let skipper = core.skipper.get_or_insert_with(|| {
                SkipReader::new(
                    core.frq.clone(),
                    skip.skip_interval,
                    skip.max_skip_levels,
                    skip.version,
                )
            });
            if !core.skipped {
                skipper.init(
                    core.freq_offset + core.skip_offset,
                    core.freq_offset,
                    0,
                    core.limit,
                    core.store_payloads,
                    core.store_offsets,
                );
                core.skipped = true;
            }
            let new_ord = skipper.skip_to(target)?;
            if new_ord > core.ord as i64 {
                core.ord = new_ord as u32;
                core.accum = skipper.doc();
                let pointer = skipper.freq_pointer();
                core.frq.seek(pointer)?;
            }
        }
        self.scan_to(target)
    }

    fn scan_to(&mut self, target: u32) -> Result<u32> {
        let core = &mut self.core;
        while core.ord < core.limit {
            core.ord += 1;
            core.read_posting()?;
            if core.accum >= target && self.filter.accept(core.accum) {
                return Ok(core.accum);
            }
        }
        Ok(NO_MORE_DOCS)
    }
}

/// Returns the index before the first buffered document `>= target`, so that
/// the following `next_doc` lands on it.
fn binary_search(docs: &[u32], low: usize, target: u32) -> isize {
    let tail = &docs[low..];
    let pos = tail.partition_point(|&doc| doc < target);
    (low + pos) as isize - 1
}

#[cfg(test)]
mod tests {
    use super::binary_search;

    #[test]
    fn test_binary_search_positions_before_target() {
        let docs = [2, 4, 6, 8, 10];
        assert_eq!(binary_search(&docs, 0, 1), -1);
        assert_eq!(binary_search(&docs, 0, 6), 1);
        assert_eq!(binary_search(&docs, 0, 7), 2);
        assert_eq!(binary_search(&docs, 2, 3), 1);
        assert_eq!(binary_search(&docs, 1, 10), 3);
    }
}
