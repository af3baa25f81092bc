//! Reader of the block terms dictionary.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use quarry_common::{Result, bail_corrupt, error::Error};
use quarry_io::{IndexInput, codec_util};

use crate::{
    automaton::{CompiledAutomaton, TermAutomaton},
    comparator::TermComparator,
    enums::{DocsAndPositionsEnum, DocsEnum, EmptyTermsEnum, SeekStatus, Terms, TermsEnum},
    format::{
        BlockTermState, FieldInfo, IndexOptions, TERMS_DICT_CODEC, TERMS_DICT_VERSION_CURRENT,
        TERMS_DICT_VERSION_START,
    },
    live_docs::LiveDocs,
};

use super::{docs::SegmentDocsEnum, positions::SegmentPositionsEnum, postings::PostingsReader};

#[derive(Debug, Clone)]
struct IndexEntry {
    first_term: Vec<u8>,
    pointer: u64,
    first_ord: u64,
}

#[derive(Debug)]
struct FieldInner {
    info: FieldInfo,
    num_terms: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
    index: Vec<IndexEntry>,
    terms_in: IndexInput,
    postings: Arc<PostingsReader>,
}

/// The terms of one field of a segment.
///
/// Cheap to clone; every enum opened from it reads through its own clone of the
/// dictionary stream.
#[derive(Debug, Clone)]
pub struct FieldReader {
    inner: Arc<FieldInner>,
}

impl FieldReader {
    pub fn field_info(&self) -> &FieldInfo {
        &self.inner.info
    }

    /// Number of terms dictionary blocks of the field.
    pub fn num_blocks(&self) -> usize {
        self.inner.index.len()
    }

    /// Returns an enum with access to the segment-specific operations.
    pub fn segment_terms_enum(&self) -> SegmentTermsEnum {
        SegmentTermsEnum::new(Arc::clone(&self.inner))
    }
}

impl Terms for FieldReader {
    fn iterator(&self) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(self.segment_terms_enum()))
    }

    fn intersect(
        &self,
        automaton: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Box<dyn TermsEnum>> {
        let mut terms = AutomatonTermsEnum::new(
            self.segment_terms_enum(),
            automaton.clone(),
            self.inner.info.comparator,
        );
        if !terms.position_after(start_term)? {
            return Ok(Box::new(EmptyTermsEnum));
        }
        Ok(Box::new(terms))
    }

    fn comparator(&self) -> TermComparator {
        self.inner.info.comparator
    }

    fn size(&self) -> i64 {
        self.inner.num_terms as i64
    }

    fn sum_total_term_freq(&self) -> i64 {
        self.inner.sum_total_term_freq
    }

    fn sum_doc_freq(&self) -> i64 {
        self.inner.sum_doc_freq as i64
    }

    fn doc_count(&self) -> i64 {
        self.inner.doc_count as i64
    }

    fn has_freqs(&self) -> bool {
        self.inner.info.has_freqs()
    }

    fn has_offsets(&self) -> bool {
        self.inner.info.has_offsets()
    }

    fn has_positions(&self) -> bool {
        self.inner.info.has_positions()
    }

    fn has_payloads(&self) -> bool {
        self.inner.info.store_payloads
    }
}

/// Opens the terms dictionary of a segment and loads the per-field terms index.
#[derive(Debug)]
pub struct SegmentTermsReader {
    fields: BTreeMap<String, FieldReader>,
    postings: Arc<PostingsReader>,
    terms_in: IndexInput,
    max_doc: u32,
}

impl SegmentTermsReader {
    pub fn open(
        mut terms_in: IndexInput,
        frq: IndexInput,
        prx: Option<IndexInput>,
        use_skip_data: bool,
    ) -> Result<SegmentTermsReader> {
        codec_util::check_header(
            &mut terms_in,
            TERMS_DICT_CODEC,
            TERMS_DICT_VERSION_START,
            TERMS_DICT_VERSION_CURRENT,
        )?;
        let postings =
            Arc::new(PostingsReader::open(&mut terms_in, frq, prx)?.with_skipping(use_skip_data));
        let body_start = terms_in.file_pointer();

        let footer_start = codec_util::footer_start(&terms_in)?;
        codec_util::check_footer(&mut terms_in.clone())?;
        if footer_start < body_start + 8 {
            bail_corrupt!(terms_in.name(), "terms dictionary is truncated");
        }
        terms_in.seek(footer_start - 8)?;
        let trailer_pointer = terms_in.read_u64()?;
        if trailer_pointer < body_start || trailer_pointer > footer_start - 8 {
            bail_corrupt!(
                terms_in.name(),
                "trailer pointer {trailer_pointer} out of bounds {body_start}..{}",
                footer_start - 8
            );
        }
        terms_in.seek(trailer_pointer)?;

        let num_fields = terms_in.read_vint()?;
        let mut infos = Vec::with_capacity(num_fields.min(1024) as usize);
        for _ in 0..num_fields {
            infos.push(read_field(&mut terms_in, body_start, trailer_pointer)?);
        }
        let max_doc = terms_in.read_vint()?;

        let mut fields = BTreeMap::new();
        for (info, stats, index) in infos {
            if stats.doc_count > max_doc {
                bail_corrupt!(
                    terms_in.name(),
                    "field {} has doc_count {} > max_doc {max_doc}",
                    info.name,
                    stats.doc_count
                );
            }
            if info.has_positions() && !postings.has_positions_stream() {
                bail_corrupt!(
                    terms_in.name(),
                    "field {} indexes positions but the segment has no position stream",
                    info.name
                );
            }
            let name = info.name.clone();
            let reader = FieldReader {
                inner: Arc::new(FieldInner {
                    info,
                    num_terms: stats.num_terms,
                    sum_total_term_freq: stats.sum_total_term_freq,
                    sum_doc_freq: stats.sum_doc_freq,
                    doc_count: stats.doc_count,
                    index,
                    terms_in: terms_in.clone(),
                    postings: Arc::clone(&postings),
                }),
            };
            if fields.insert(name, reader).is_some() {
                bail_corrupt!(terms_in.name(), "duplicate field");
            }
        }
        log::debug!(
            "opened terms dictionary {} ({} fields, max_doc {max_doc})",
            terms_in.name(),
            fields.len()
        );
        Ok(SegmentTermsReader {
            fields,
            postings,
            terms_in,
            max_doc,
        })
    }

    /// Field names in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn terms(&self, field: &str) -> Option<&FieldReader> {
        self.fields.get(field)
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn postings(&self) -> &PostingsReader {
        &self.postings
    }

    pub fn check_integrity(&self) -> Result<()> {
        codec_util::verify_checksum(&mut self.terms_in.clone())?;
        self.postings.check_integrity()
    }
}

struct FieldStats {
    num_terms: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
}

fn read_field(
    input: &mut IndexInput,
    body_start: u64,
    trailer_pointer: u64,
) -> Result<(FieldInfo, FieldStats, Vec<IndexEntry>)> {
    let number = input.read_vint()?;
    let name = input.read_string()?;
    let options_byte = input.read_byte()?;
    let index_options = IndexOptions::from_byte(input.name(), options_byte)?;
    let store_payloads = match input.read_byte()? {
        0 => false,
        1 => true,
        b => bail_corrupt!(input.name(), "invalid payload flag {b} for field {name}"),
    };
    let comparator_byte = input.read_byte()?;
    let comparator = TermComparator::from_byte(input.name(), comparator_byte)?;
    let info = FieldInfo {
        name,
        number,
        index_options,
        store_payloads,
        comparator,
    };
    info.validate()
        .map_err(|e| Error::corrupt_index(input.name(), e.to_string()))?;

    let stats = FieldStats {
        num_terms: input.read_vlong()?,
        sum_total_term_freq: input.read_zlong()?,
        sum_doc_freq: input.read_vlong()?,
        doc_count: input.read_vint()?,
    };
    if stats.num_terms == 0 {
        bail_corrupt!(input.name(), "field {} has no terms", info.name);
    }
    if !info.has_freqs() && stats.sum_total_term_freq != -1 {
        bail_corrupt!(
            input.name(),
            "field {} omits frequencies but reports sum_total_term_freq {}",
            info.name,
            stats.sum_total_term_freq
        );
    }

    let num_blocks = input.read_vint()?;
    if num_blocks == 0 || num_blocks as u64 > stats.num_terms {
        bail_corrupt!(
            input.name(),
            "field {} has {num_blocks} blocks for {} terms",
            info.name,
            stats.num_terms
        );
    }
    let mut index = Vec::with_capacity(num_blocks as usize);
    for _ in 0..num_blocks {
        let len = input.read_vint()? as usize;
        if len as u64 > input.length() - input.file_pointer() {
            bail_corrupt!(input.name(), "terms index entry of length {len} is truncated");
        }
        let first_term = input.read_slice(len)?.to_vec();
        let pointer = input.read_vlong()?;
        let first_ord = input.read_vlong()?;
        if pointer < body_start || pointer >= trailer_pointer || first_ord >= stats.num_terms {
            bail_corrupt!(
                input.name(),
                "terms index entry out of bounds in field {} (pointer {pointer}, ord {first_ord})",
                info.name
            );
        }
        index.push(IndexEntry {
            first_term,
            pointer,
            first_ord,
        });
    }
    Ok((info, stats, index))
}

/// Position of a terms enum within the dictionary blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Unpositioned,
    /// On term `term_index` of block `block`, which holds `count` terms.
    InBlock {
        block: usize,
        term_index: u32,
        count: u32,
    },
    /// Positioned through `seek_exact_with_state`; the dictionary stream has to
    /// be resynchronized before moving on.
    Detached,
    Exhausted,
}

/// Iterates the terms of one field of a segment.
pub struct SegmentTermsEnum {
    field: Arc<FieldInner>,
    input: IndexInput,
    cursor: Cursor,
    term: Vec<u8>,
    state: BlockTermState,
}

impl SegmentTermsEnum {
    fn new(field: Arc<FieldInner>) -> SegmentTermsEnum {
        let input = field.terms_in.clone();
        SegmentTermsEnum {
            field,
            input,
            cursor: Cursor::Unpositioned,
            term: Vec::new(),
            state: BlockTermState::default(),
        }
    }

    /// Postings metadata of the current term; can be handed to
    /// [`SegmentTermsEnum::seek_exact_with_state`] later.
    pub fn term_state(&self) -> BlockTermState {
        self.state.clone()
    }

    /// Positions the enum on `term` using a state captured earlier, without
    /// looking the term up.
    pub fn seek_exact_with_state(&mut self, term: &[u8], state: &BlockTermState) {
        self.term.clear();
        self.term.extend_from_slice(term);
        self.state = state.clone();
        self.cursor = Cursor::Detached;
    }

    /// Opens a docs cursor, resetting `reuse` in place when possible.
    pub fn segment_docs(
        &self,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentDocsEnum>,
    ) -> Result<SegmentDocsEnum> {
        self.ensure_positioned("docs")?;
        self.field
            .postings
            .docs(&self.field.info, &self.state, live_docs, reuse)
    }

    /// Opens a positions cursor, or `None` when the field has no positions.
    pub fn segment_docs_and_positions(
        &self,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentPositionsEnum>,
    ) -> Result<Option<SegmentPositionsEnum>> {
        self.ensure_positioned("docs_and_positions")?;
        self.field
            .postings
            .docs_and_positions(&self.field.info, &self.state, live_docs, reuse)
    }

    fn ensure_positioned(&self, operation: &str) -> Result<()> {
        match self.cursor {
            Cursor::InBlock { .. } | Cursor::Detached => Ok(()),
            Cursor::Unpositioned | Cursor::Exhausted => Err(Error::invalid_operation(format!(
                "{operation} on an unpositioned terms enum"
            ))),
        }
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.field.info.comparator.compare(a, b)
    }

    fn load_block(&mut self, block: usize) -> Result<()> {
        let entry = &self.field.index[block];
        self.input.seek(entry.pointer)?;
        let count = self.input.read_vint()?;
        if count == 0 {
            bail_corrupt!(self.input.name(), "empty terms block at {}", entry.pointer);
        }
        self.state.ord = entry.first_ord;
        self.cursor = Cursor::InBlock {
            block,
            term_index: 0,
            count,
        };
        self.read_term(block, 0, count)
    }

    /// Decodes term `term_index` of the block the stream is positioned in.
    fn read_term(&mut self, block: usize, term_index: u32, count: u32) -> Result<()> {
        let prefix = self.input.read_vint()? as usize;
        let suffix_len = self.input.read_vint()? as usize;
        if prefix > self.term.len() || (term_index == 0 && prefix != 0) {
            bail_corrupt!(
                self.input.name(),
                "invalid shared prefix {prefix} for term {term_index} of block {block}"
            );
        }
        if suffix_len as u64 > self.input.length() - self.input.file_pointer() {
            bail_corrupt!(self.input.name(), "term suffix of length {suffix_len} is truncated");
        }
        self.term.truncate(prefix);
        let suffix = self.input.read_slice(suffix_len)?;
        self.term.extend_from_slice(&suffix);

        let doc_freq = self.input.read_vint()?;
        if doc_freq == 0 {
            bail_corrupt!(self.input.name(), "term with zero doc_freq");
        }
        self.state.doc_freq = doc_freq;
        self.state.total_term_freq = if self.field.info.has_freqs() {
            doc_freq as i64 + self.input.read_vlong()? as i64
        } else {
            -1
        };
        let field = Arc::clone(&self.field);
        field
            .postings
            .decode_term(&mut self.input, &field.info, &mut self.state, term_index == 0)?;
        if term_index > 0 {
            self.state.ord += 1;
        }
        self.cursor = Cursor::InBlock {
            block,
            term_index,
            count,
        };
        Ok(())
    }

    /// Re-reads the dictionary so that `next` continues after the detached term.
    fn resync(&mut self) -> Result<()> {
        let term = std::mem::take(&mut self.term);
        let status = self.seek_ceil(&term)?;
        if status != SeekStatus::Found {
            return Err(Error::invalid_operation(format!(
                "term {:?} positioned by state does not exist in field {}",
                String::from_utf8_lossy(&term),
                self.field.info.name
            )));
        }
        Ok(())
    }

    fn advance_term(&mut self) -> Result<bool> {
        match self.cursor {
            Cursor::Exhausted => Ok(false),
            Cursor::Unpositioned => {
                self.load_block(0)?;
                Ok(true)
            }
            Cursor::Detached => {
                self.resync()?;
                self.advance_term()
            }
            Cursor::InBlock {
                block,
                term_index,
                count,
            } => {
                if term_index + 1 < count {
                    self.read_term(block, term_index + 1, count)?;
                    Ok(true)
                } else if block + 1 < self.field.index.len() {
                    self.load_block(block + 1)?;
                    Ok(true)
                } else {
                    self.cursor = Cursor::Exhausted;
                    self.term.clear();
                    Ok(false)
                }
            }
        }
    }
}

impl std::fmt::Debug for SegmentTermsEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentTermsEnum")
            .field("field", &self.field.info.name)
            .field("cursor", &self.cursor)
            .field("term", &String::from_utf8_lossy(&self.term))
            .finish()
    }
}

impl TermsEnum for SegmentTermsEnum {
    fn next(&mut self) -> Result<bool> {
        self.advance_term()
    }

    fn term(&self) -> &[u8] {
        &self.term
    }

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus> {
        // Last block whose first term is not greater than the target.
        let index = &self.field.index;
        let comparator = self.field.info.comparator;
        let after = index.partition_point(|entry| {
            comparator.compare(&entry.first_term, target) != Ordering::Greater
        });
        let block = after.saturating_sub(1);

        self.term.clear();
        self.load_block(block)?;
        loop {
            match self.compare(&self.term, target) {
                Ordering::Equal => return Ok(SeekStatus::Found),
                Ordering::Greater => return Ok(SeekStatus::NotFound),
                Ordering::Less => {
                    if !self.advance_term()? {
                        return Ok(SeekStatus::End);
                    }
                }
            }
        }
    }

    fn ord(&mut self) -> Result<u64> {
        self.ensure_positioned("ord")?;
        Ok(self.state.ord)
    }

    fn doc_freq(&self) -> u32 {
        self.state.doc_freq
    }

    fn total_term_freq(&self) -> i64 {
        self.state.total_term_freq
    }

    fn docs(&mut self, live_docs: Option<Arc<dyn LiveDocs>>) -> Result<Box<dyn DocsEnum>> {
        Ok(Box::new(self.segment_docs(live_docs, None)?))
    }

    fn docs_and_positions(
        &mut self,
        live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        Ok(self
            .segment_docs_and_positions(live_docs, None)?
            .map(|positions| Box::new(positions) as Box<dyn DocsAndPositionsEnum>))
    }
}

/// Outcome of running the automaton over the current term.
enum Verdict {
    Accept,
    Reject,
    /// No term starting with the first `n + 1` bytes can be accepted.
    DeadAt(usize),
}

/// Enumerates the terms of a field accepted by an automaton.
///
/// The automaton states of the previous term are kept per byte, so only the
/// bytes after the shared prefix are stepped. Under byte order a dead prefix is
/// skipped with a single seek to the next possible prefix.
pub struct AutomatonTermsEnum {
    terms: SegmentTermsEnum,
    automaton: CompiledAutomaton,
    comparator: TermComparator,
    /// `states[i]` is the state after the first `i` bytes of `run_term`.
    states: Vec<u64>,
    run_term: Vec<u8>,
    /// The wrapped enum already sits on the next candidate.
    pending: bool,
}

impl AutomatonTermsEnum {
    fn new(
        terms: SegmentTermsEnum,
        automaton: CompiledAutomaton,
        comparator: TermComparator,
    ) -> AutomatonTermsEnum {
        let start = automaton.start();
        AutomatonTermsEnum {
            terms,
            automaton,
            comparator,
            states: vec![start],
            run_term: Vec::new(),
            pending: false,
        }
    }

    /// Moves before the first candidate strictly greater than `start_term`.
    /// Returns `false` when no term remains.
    fn position_after(&mut self, start_term: Option<&[u8]>) -> Result<bool> {
        let Some(start_term) = start_term else {
            return Ok(true);
        };
        match self.terms.seek_ceil(start_term)? {
            SeekStatus::End => Ok(false),
            SeekStatus::Found => Ok(true),
            SeekStatus::NotFound => {
                self.pending = true;
                Ok(true)
            }
        }
    }

    fn run(&mut self) -> Verdict {
        let term = self.terms.term();
        let common = shared_prefix_len(&self.run_term, term).min(self.states.len() - 1);
        self.states.truncate(common + 1);
        self.run_term.truncate(common);
        for (i, &byte) in term.iter().enumerate().skip(common) {
            let state = self.automaton.step(self.states[i], byte);
            if !self.automaton.can_match(state) {
                return Verdict::DeadAt(i);
            }
            self.states.push(state);
            self.run_term.push(byte);
        }
        let state = self.states[term.len()];
        if self.automaton.is_match(state) {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

impl TermsEnum for AutomatonTermsEnum {
    fn next(&mut self) -> Result<bool> {
        loop {
            if self.pending {
                self.pending = false;
            } else if !self.terms.next()? {
                return Ok(false);
            }
            match self.run() {
                Verdict::Accept => return Ok(true),
                Verdict::Reject => {}
                Verdict::DeadAt(i) if self.comparator == TermComparator::Binary => {
                    let Some(successor) = next_prefix(&self.terms.term()[..=i]) else {
                        return Ok(false);
                    };
                    match self.terms.seek_ceil(&successor)? {
                        SeekStatus::End => return Ok(false),
                        SeekStatus::Found | SeekStatus::NotFound => self.pending = true,
                    }
                }
                Verdict::DeadAt(_) => {}
            }
        }
    }

    fn term(&self) -> &[u8] {
        self.terms.term()
    }

    fn seek_ceil(&mut self, _target: &[u8]) -> Result<SeekStatus> {
        Err(Error::invalid_operation("seek on an automaton terms enum"))
    }

    fn ord(&mut self) -> Result<u64> {
        self.terms.ord()
    }

    fn doc_freq(&self) -> u32 {
        self.terms.doc_freq()
    }

    fn total_term_freq(&self) -> i64 {
        self.terms.total_term_freq()
    }

    fn docs(&mut self, live_docs: Option<Arc<dyn LiveDocs>>) -> Result<Box<dyn DocsEnum>> {
        self.terms.docs(live_docs)
    }

    fn docs_and_positions(
        &mut self,
        live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        self.terms.docs_and_positions(live_docs)
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Smallest byte string greater than every string starting with `prefix`, or
/// `None` when `prefix` consists of `0xff` bytes only.
fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::next_prefix;

    #[test]
    fn test_next_prefix() {
        assert_eq!(next_prefix(b"ca").as_deref(), Some(&b"cb"[..]));
        assert_eq!(next_prefix(b"c\xff").as_deref(), Some(&b"d"[..]));
        assert_eq!(next_prefix(b"\xff\xff"), None);
    }
}
