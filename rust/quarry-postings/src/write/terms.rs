use quarry_common::{Result, error::Error};
use quarry_io::{IndexOutput, codec_util, output::DataOutput};

use crate::format::{BlockTermState, FieldInfo, TERMS_DICT_CODEC, TERMS_DICT_VERSION_CURRENT};

use super::postings::PostingsWriter;

/// Aggregate statistics of a finished field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStats {
    pub num_terms: u64,
    /// -1 when the field omits frequencies.
    pub sum_total_term_freq: i64,
    pub sum_doc_freq: u64,
    pub doc_count: u32,
}

struct IndexEntry {
    first_term: Vec<u8>,
    pointer: u64,
    first_ord: u64,
}

struct PendingTerm {
    term: Vec<u8>,
    state: BlockTermState,
}

struct FieldMeta {
    info: FieldInfo,
    stats: FieldStats,
    index: Vec<IndexEntry>,
}

/// Writes the block terms dictionary and drives the postings writer.
///
/// Terms are buffered until a block is full; each block starts with an absolute
/// term and postings state, later terms are prefix and delta coded. The terms
/// index (first term and file pointer of every block) and the per-field
/// statistics go to the trailer.
pub struct TermsWriter {
    out: IndexOutput,
    postings: PostingsWriter,
    block_size: usize,
    fields: Vec<FieldMeta>,

    current: Option<FieldInfo>,
    pending: Vec<PendingTerm>,
    index: Vec<IndexEntry>,
    num_terms: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
}

impl TermsWriter {
    pub fn new(
        mut out: IndexOutput,
        postings: PostingsWriter,
        block_size: usize,
    ) -> Result<TermsWriter> {
        codec_util::write_header(&mut out, TERMS_DICT_CODEC, TERMS_DICT_VERSION_CURRENT)?;
        postings.init(&mut out)?;
        Ok(TermsWriter {
            out,
            postings,
            block_size: block_size.max(2),
            fields: Vec::new(),
            current: None,
            pending: Vec::new(),
            index: Vec::new(),
            num_terms: 0,
            sum_total_term_freq: 0,
            sum_doc_freq: 0,
        })
    }

    pub fn postings_mut(&mut self) -> &mut PostingsWriter {
        &mut self.postings
    }

    pub fn start_field(&mut self, field: &FieldInfo) -> Result<()> {
        if let Some(current) = self.current.as_ref() {
            return Err(Error::invalid_operation(format!(
                "start_field({}) before finishing field {}",
                field.name, current.name
            )));
        }
        self.postings.set_field(field)?;
        self.current = Some(field.clone());
        self.pending.clear();
        self.index.clear();
        self.num_terms = 0;
        self.sum_total_term_freq = 0;
        self.sum_doc_freq = 0;
        Ok(())
    }

    /// Adds a finished term of the current field. Terms with no documents are
    /// dropped.
    pub fn add_term(&mut self, term: &[u8], mut state: BlockTermState) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::invalid_operation("add_term outside of a field"));
        }
        if state.doc_freq == 0 {
            log::trace!("dropping term {:?} without documents", String::from_utf8_lossy(term));
            return Ok(());
        }
        state.ord = self.num_terms;
        self.num_terms += 1;
        self.sum_doc_freq += state.doc_freq as u64;
        if state.total_term_freq >= 0 {
            self.sum_total_term_freq += state.total_term_freq;
        } else {
            self.sum_total_term_freq = -1;
        }
        self.pending.push(PendingTerm {
            term: term.to_vec(),
            state,
        });
        if self.pending.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        let Some(field) = self.current.as_ref() else {
            return Ok(());
        };
        let Some(first) = self.pending.first() else {
            return Ok(());
        };
        let has_freqs = field.has_freqs();
        let pointer = self.out.file_pointer();
        self.index.push(IndexEntry {
            first_term: first.term.clone(),
            pointer,
            first_ord: first.state.ord,
        });

        self.out.write_vint(self.pending.len() as u32)?;
        let mut previous: &[u8] = &[];
        for (i, pending) in self.pending.iter().enumerate() {
            let prefix = shared_prefix_len(previous, &pending.term);
            let suffix = &pending.term[prefix..];
            self.out.write_vint(prefix as u32)?;
            self.out.write_vint(suffix.len() as u32)?;
            self.out.write_bytes(suffix)?;
            self.out.write_vint(pending.state.doc_freq)?;
            if has_freqs {
                let extra = pending.state.total_term_freq - pending.state.doc_freq as i64;
                self.out.write_vlong(extra as u64)?;
            }
            self.postings
                .encode_term(&mut self.out, &pending.state, i == 0)?;
            previous = &pending.term;
        }
        log::trace!(
            "flushed block of {} terms at {pointer} in field {}",
            self.pending.len(),
            field.name
        );
        self.pending.clear();
        Ok(())
    }

    /// Completes the current field. `doc_count` is the number of documents with
    /// at least one term in the field.
    pub fn finish_field(&mut self, doc_count: u32) -> Result<FieldStats> {
        self.flush_block()?;
        let Some(info) = self.current.take() else {
            return Err(Error::invalid_operation("finish_field without start_field"));
        };
        let stats = FieldStats {
            num_terms: self.num_terms,
            sum_total_term_freq: if info.has_freqs() {
                self.sum_total_term_freq
            } else {
                -1
            },
            sum_doc_freq: self.sum_doc_freq,
            doc_count,
        };
        if stats.num_terms == 0 {
            log::debug!("field {} has no terms; not written", info.name);
            return Ok(stats);
        }
        log::debug!(
            "finished field {}: {} terms in {} blocks",
            info.name,
            stats.num_terms,
            self.index.len()
        );
        self.fields.push(FieldMeta {
            info,
            stats: stats.clone(),
            index: std::mem::take(&mut self.index),
        });
        Ok(stats)
    }

    /// Writes the trailer and footer, closes the dictionary and the postings
    /// streams. Returns the lengths of the terms, frequency and position files.
    pub fn close(mut self, max_doc: u32) -> Result<(u64, u64, u64)> {
        if let Some(current) = self.current.as_ref() {
            return Err(Error::invalid_operation(format!(
                "close before finishing field {}",
                current.name
            )));
        }
        let trailer_pointer = self.out.file_pointer();
        self.out.write_vint(self.fields.len() as u32)?;
        for field in &self.fields {
            let info = &field.info;
            self.out.write_vint(info.number)?;
            self.out.write_string(&info.name)?;
            self.out.write_byte(info.index_options.to_byte())?;
            self.out.write_byte(info.store_payloads as u8)?;
            self.out.write_byte(info.comparator.to_byte())?;
            self.out.write_vlong(field.stats.num_terms)?;
            self.out.write_zlong(field.stats.sum_total_term_freq)?;
            self.out.write_vlong(field.stats.sum_doc_freq)?;
            self.out.write_vint(field.stats.doc_count)?;
            self.out.write_vint(field.index.len() as u32)?;
            for entry in &field.index {
                self.out.write_vint(entry.first_term.len() as u32)?;
                self.out.write_bytes(&entry.first_term)?;
                self.out.write_vlong(entry.pointer)?;
                self.out.write_vlong(entry.first_ord)?;
            }
        }
        self.out.write_vint(max_doc)?;
        self.out.write_u64(trailer_pointer)?;
        codec_util::write_footer(&mut self.out)?;
        let terms_len = self.out.close()?;
        let (frq_len, prx_len) = self.postings.close()?;
        Ok((terms_len, frq_len, prx_len))
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::shared_prefix_len;

    #[test]
    fn test_shared_prefix_len() {
        assert_eq!(shared_prefix_len(b"", b"cat"), 0);
        assert_eq!(shared_prefix_len(b"car", b"cat"), 2);
        assert_eq!(shared_prefix_len(b"cat", b"catalog"), 3);
    }
}
