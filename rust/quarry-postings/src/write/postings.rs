//! Encoder of the frequency and position streams.

use quarry_common::{Result, error::Error};
use quarry_io::{IndexOutput, codec_util, output::DataOutput};

use crate::{
    config::PostingsConfig,
    format::{
        BlockTermState, FRQ_CODEC, FieldInfo, IndexOptions, PRX_CODEC, TERMS_CODEC, TermStats,
        VERSION_CURRENT,
    },
    skip::SkipWriter,
};

/// Writes the postings of a segment, one term at a time.
///
/// For every field: [`PostingsWriter::set_field`]; then for every term:
/// [`PostingsWriter::start_term`], for every document
/// [`PostingsWriter::start_doc`], `freq` times [`PostingsWriter::add_position`]
/// (positional fields only) and [`PostingsWriter::finish_doc`]; finally
/// [`PostingsWriter::finish_term`]. The returned [`BlockTermState`] is handed to
/// [`PostingsWriter::encode_term`] by the terms dictionary.
pub struct PostingsWriter {
    frq: IndexOutput,
    prx: Option<IndexOutput>,
    skip_writer: SkipWriter,
    skip_interval: u32,
    max_skip_levels: u32,
    skip_minimum: u32,
    max_doc: u32,

    // Current field.
    field_name: String,
    index_options: IndexOptions,
    store_payloads: bool,
    store_offsets: bool,

    // Current term.
    freq_start: u64,
    prox_start: u64,
    df: u32,
    last_doc_id: u32,
    total_term_freq: i64,
    last_payload_length: i32,
    last_offset_length: i32,

    // Current document.
    in_doc: bool,
    doc_freq: u32,
    positions_in_doc: u32,
    last_position: u32,
    last_offset: u32,

    last_state: BlockTermState,
}

impl PostingsWriter {
    /// Creates a writer over the frequency and (optional) position streams of a
    /// segment with `max_doc` documents and writes their headers.
    pub fn new(
        mut frq: IndexOutput,
        mut prx: Option<IndexOutput>,
        max_doc: u32,
        config: &PostingsConfig,
    ) -> Result<PostingsWriter> {
        config.validate()?;
        codec_util::write_header(&mut frq, FRQ_CODEC, VERSION_CURRENT)?;
        if let Some(prx) = prx.as_mut() {
            codec_util::write_header(prx, PRX_CODEC, VERSION_CURRENT)?;
        }
        Ok(PostingsWriter {
            frq,
            prx,
            skip_writer: SkipWriter::new(config.skip_interval, config.max_skip_levels, max_doc),
            skip_interval: config.skip_interval,
            max_skip_levels: config.max_skip_levels,
            skip_minimum: config.skip_minimum,
            max_doc,
            field_name: String::new(),
            index_options: IndexOptions::Docs,
            store_payloads: false,
            store_offsets: false,
            freq_start: 0,
            prox_start: 0,
            df: 0,
            last_doc_id: 0,
            total_term_freq: 0,
            last_payload_length: -1,
            last_offset_length: -1,
            in_doc: false,
            doc_freq: 0,
            positions_in_doc: 0,
            last_position: 0,
            last_offset: 0,
            last_state: BlockTermState::default(),
        })
    }

    /// Writes the postings header with the skip parameters into the terms
    /// dictionary.
    pub fn init(&self, terms_out: &mut impl DataOutput) -> Result<()> {
        codec_util::write_header(terms_out, TERMS_CODEC, VERSION_CURRENT)?;
        terms_out.write_u32(self.skip_interval)?;
        terms_out.write_u32(self.max_skip_levels)?;
        terms_out.write_u32(self.skip_minimum)
    }

    pub fn set_field(&mut self, field: &FieldInfo) -> Result<()> {
        field.validate()?;
        if field.has_positions() && self.prx.is_none() {
            return Err(Error::invalid_arg(
                "field",
                format!(
                    "field {} indexes positions but the segment has no position stream",
                    field.name
                ),
            ));
        }
        self.field_name.clone_from(&field.name);
        self.index_options = field.index_options;
        self.store_payloads = field.store_payloads;
        self.store_offsets = field.has_offsets();
        self.last_state = BlockTermState::default();
        Ok(())
    }

    pub fn start_term(&mut self) {
        self.freq_start = self.frq.file_pointer();
        self.prox_start = self.prx.as_ref().map_or(0, IndexOutput::file_pointer);
        self.last_payload_length = -1;
        self.last_offset_length = -1;
        self.df = 0;
        self.last_doc_id = 0;
        self.total_term_freq = 0;
        self.in_doc = false;
        self.skip_writer.reset(self.freq_start, self.prox_start);
    }

    /// Starts a document of the current term. `freq` is ignored for fields
    /// indexed without frequencies.
    pub fn start_doc(&mut self, doc_id: u32, freq: u32) -> Result<()> {
        if self.in_doc {
            return Err(Error::invalid_operation(
                "start_doc called before finish_doc",
            ));
        }
        if self.df > 0 && doc_id <= self.last_doc_id {
            return Err(Error::corrupt_index(
                self.frq.name(),
                format!(
                    "docs out of order ({doc_id} <= {}) in field {}",
                    self.last_doc_id, self.field_name
                ),
            ));
        }
        if doc_id >= self.max_doc {
            return Err(Error::corrupt_index(
                self.frq.name(),
                format!("doc {doc_id} out of bounds (max_doc {})", self.max_doc),
            ));
        }
        let has_freqs = self.index_options.has_freqs();
        if has_freqs && freq == 0 {
            return Err(Error::invalid_arg(
                "freq",
                format!("doc {doc_id} has a zero term frequency"),
            ));
        }
        let delta = doc_id - self.last_doc_id;

        self.df += 1;
        if self.df % self.skip_interval == 0 {
            let prox_pointer = self.prx.as_ref().map_or(0, IndexOutput::file_pointer);
            self.skip_writer.set_skip_data(
                self.last_doc_id,
                self.store_payloads,
                self.last_payload_length,
                self.store_offsets,
                self.last_offset_length,
                self.frq.file_pointer(),
                prox_pointer,
            );
            self.skip_writer.buffer_skip(self.df)?;
        }

        self.last_doc_id = doc_id;
        if !has_freqs {
            self.frq.write_vint(delta)?;
        } else if freq == 1 {
            self.frq.write_vint((delta << 1) | 1)?;
        } else {
            self.frq.write_vint(delta << 1)?;
            self.frq.write_vint(freq)?;
        }

        self.doc_freq = if has_freqs { freq } else { 1 };
        self.total_term_freq += self.doc_freq as i64;
        self.positions_in_doc = 0;
        self.last_position = 0;
        self.last_offset = 0;
        self.in_doc = true;
        Ok(())
    }

    /// Adds a position of the current document. Offsets are ignored unless the
    /// field indexes them.
    pub fn add_position(
        &mut self,
        position: u32,
        payload: Option<&[u8]>,
        start_offset: u32,
        end_offset: u32,
    ) -> Result<()> {
        if !self.in_doc || !self.index_options.has_positions() {
            return Err(Error::invalid_operation(format!(
                "add_position outside of a positional document (field {})",
                self.field_name
            )));
        }
        if self.positions_in_doc >= self.doc_freq {
            return Err(Error::invalid_operation(format!(
                "more than freq={} positions added in field {}",
                self.doc_freq, self.field_name
            )));
        }
        if position < self.last_position {
            return Err(Error::corrupt_index(
                self.frq.name(),
                format!(
                    "position {position} < last position {} in field {}",
                    self.last_position, self.field_name
                ),
            ));
        }
        if payload.is_some_and(|p| !p.is_empty()) && !self.store_payloads {
            return Err(Error::invalid_arg(
                "payload",
                format!("field {} does not store payloads", self.field_name),
            ));
        }
        if self.store_offsets && (start_offset < self.last_offset || end_offset < start_offset) {
            return Err(Error::invalid_arg(
                "offsets",
                format!(
                    "offsets {start_offset}..{end_offset} go backwards (last start {}) in field {}",
                    self.last_offset, self.field_name
                ),
            ));
        }

        let Some(prx) = self.prx.as_mut() else {
            return Err(Error::invalid_operation("no position stream"));
        };

        let delta = position - self.last_position;
        self.last_position = position;

        let mut payload_length = 0usize;
        if self.store_payloads {
            payload_length = payload.map_or(0, <[u8]>::len);
            if payload_length as i64 != self.last_payload_length as i64 {
                self.last_payload_length = i32::try_from(payload_length)
                    .map_err(|_| Error::invalid_arg("payload", "payload is too large"))?;
                prx.write_vint((delta << 1) | 1)?;
                prx.write_vint(payload_length as u32)?;
            } else {
                prx.write_vint(delta << 1)?;
            }
        } else {
            prx.write_vint(delta)?;
        }

        if self.store_offsets {
            let offset_delta = start_offset - self.last_offset;
            let offset_length = (end_offset - start_offset) as i32;
            if offset_length != self.last_offset_length {
                prx.write_vint((offset_delta << 1) | 1)?;
                prx.write_vint(offset_length as u32)?;
            } else {
                prx.write_vint(offset_delta << 1)?;
            }
            self.last_offset = start_offset;
            self.last_offset_length = offset_length;
        }

        if payload_length > 0 {
            if let Some(payload) = payload {
                prx.write_bytes(payload)?;
            }
        }
        self.positions_in_doc += 1;
        Ok(())
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        if !self.in_doc {
            return Err(Error::invalid_operation(
                "finish_doc called without start_doc",
            ));
        }
        if self.index_options.has_positions() && self.positions_in_doc != self.doc_freq {
            return Err(Error::invalid_operation(format!(
                "doc {} of field {} has freq={} but {} positions",
                self.last_doc_id, self.field_name, self.doc_freq, self.positions_in_doc
            )));
        }
        self.in_doc = false;
        Ok(())
    }

    /// Completes the current term and returns its postings metadata. A term
    /// without documents yields a state with `doc_freq == 0`, which is not
    /// stored by the terms dictionary.
    pub fn finish_term(&mut self, stats: TermStats) -> Result<BlockTermState> {
        if self.in_doc {
            return Err(Error::invalid_operation(
                "finish_term called before finish_doc",
            ));
        }
        if stats.doc_freq != self.df {
            return Err(Error::invalid_operation(format!(
                "term stats report doc_freq={} but {} docs were written",
                stats.doc_freq, self.df
            )));
        }
        let total_term_freq = if self.index_options.has_freqs() {
            if stats.total_term_freq != self.total_term_freq {
                return Err(Error::invalid_operation(format!(
                    "term stats report total_term_freq={} but {} was written",
                    stats.total_term_freq, self.total_term_freq
                )));
            }
            self.total_term_freq
        } else {
            -1
        };

        let mut state = BlockTermState {
            doc_freq: self.df,
            total_term_freq,
            freq_offset: self.freq_start,
            prox_offset: self.prox_start,
            skip_offset: 0,
            ord: 0,
        };
        if self.df > 0 && self.df >= self.skip_minimum {
            state.skip_offset = self.skip_writer.write_skip(&mut self.frq)? - self.freq_start;
        }
        self.last_doc_id = 0;
        self.df = 0;
        Ok(state)
    }

    /// Writes the postings metadata of a term. `absolute` restarts delta coding,
    /// as done for the first term of every terms dictionary block.
    pub fn encode_term(
        &mut self,
        out: &mut impl DataOutput,
        state: &BlockTermState,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            self.last_state = BlockTermState::default();
        }
        out.write_vlong(state.freq_offset - self.last_state.freq_offset)?;
        if state.doc_freq >= self.skip_minimum {
            out.write_vlong(state.skip_offset)?;
        }
        if self.index_options.has_positions() {
            out.write_vlong(state.prox_offset - self.last_state.prox_offset)?;
        }
        self.last_state = state.clone();
        Ok(())
    }

    /// Writes the footers and seals both streams. Returns the final lengths of
    /// the frequency and position streams.
    pub fn close(mut self) -> Result<(u64, u64)> {
        codec_util::write_footer(&mut self.frq)?;
        let frq_len = self.frq.close()?;
        let prx_len = match self.prx.as_mut() {
            Some(prx) => {
                codec_util::write_footer(prx)?;
                prx.close()?
            }
            None => 0,
        };
        Ok((frq_len, prx_len))
    }
}
