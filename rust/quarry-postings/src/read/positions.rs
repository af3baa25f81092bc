use std::sync::Arc;

use bytes::Bytes;
use quarry_common::{Result, error::Error};
use quarry_io::IndexInput;

use crate::{
    enums::{DocIdSetIterator, DocsAndPositionsEnum, DocsEnum},
    format::{BlockTermState, FieldInfo, NO_MORE_DOCS, UNPOSITIONED},
    live_docs::LiveDocs,
    skip::SkipReader,
};

use super::postings::{PostingsReader, SkipParams};

/// Cursor over the documents of one term together with their positions, payloads
/// and offsets.
///
/// The position stream is only touched once a caller asks for positions: the
/// cursor remembers how many positions of skipped documents are pending and
/// fast-forwards over them on the next [`DocsAndPositionsEnum::next_position`].
/// Payload bytes are read on demand.
pub struct SegmentPositionsEnum {
    reader_id: u64,
    frq: IndexInput,
    prx: IndexInput,
    skip: SkipParams,
    skipper: Option<SkipReader>,
    live_docs: Option<Arc<dyn LiveDocs>>,

    store_payloads: bool,
    store_offsets: bool,

    ord: u32,
    limit: u32,
    accum: u32,
    doc: u32,
    freq: u32,
    position: u32,
    start_offset: u32,

    /// Positions of the current and skipped documents not yet consumed.
    pos_pending_count: u32,
    /// Positions of the current document not yet returned.
    positions_left: u32,
    /// Position stream pointer to seek to before reading the next position.
    lazy_prox_pointer: Option<u64>,

    payload_length: i32,
    offset_length: i32,
    /// The payload bytes of the current position have not been consumed yet.
    payload_pending: bool,
    payload: Option<Bytes>,

    freq_offset: u64,
    prox_offset: u64,
    skip_offset: u64,
    skipped: bool,
}

impl SegmentPositionsEnum {
    pub(crate) fn open(
        reader: &PostingsReader,
        prx: &IndexInput,
        field: &FieldInfo,
        state: &BlockTermState,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentPositionsEnum>,
    ) -> Result<SegmentPositionsEnum> {
        let mut positions = match reuse {
            Some(positions) => positions,
            None => SegmentPositionsEnum {
                reader_id: reader.id(),
                frq: reader.frq().clone(),
                prx: prx.clone(),
                skip: reader.skip_params(),
                skipper: None,
                live_docs: None,
                store_payloads: false,
                store_offsets: false,
                ord: 0,
                limit: 0,
                accum: 0,
                doc: UNPOSITIONED,
                freq: 0,
                position: 0,
                start_offset: 0,
                pos_pending_count: 0,
                positions_left: 0,
                lazy_prox_pointer: None,
                payload_length: 0,
                offset_length: 0,
                payload_pending: false,
                payload: None,
                freq_offset: 0,
                prox_offset: 0,
                skip_offset: 0,
                skipped: false,
            },
        };
        positions.reset(field, state, live_docs)?;
        Ok(positions)
    }

    pub(crate) fn reader_id(&self) -> u64 {
        self.reader_id
    }

    fn reset(
        &mut self,
        field: &FieldInfo,
        state: &BlockTermState,
        live_docs: Option<Arc<dyn LiveDocs>>,
    ) -> Result<()> {
        self.store_payloads = field.store_payloads;
        self.store_offsets = field.has_offsets();
        self.live_docs = live_docs;
        self.frq.seek(state.freq_offset)?;
        self.lazy_prox_pointer = Some(state.prox_offset);
        self.limit = state.doc_freq;
        self.ord = 0;
        self.doc = UNPOSITIONED;
        self.accum = 0;
        self.freq = 0;
        self.position = 0;
        self.start_offset = 0;
        self.skipped = false;
        self.pos_pending_count = 0;
        self.positions_left = 0;
        self.payload_pending = false;
        self.payload = None;
        self.freq_offset = state.freq_offset;
        self.prox_offset = state.prox_offset;
        self.skip_offset = state.skip_offset;
        Ok(())
    }

    fn is_live(&self, doc: u32) -> bool {
        self.live_docs.as_ref().is_none_or(|live| live.get(doc))
    }

    fn skip_payload(&mut self) -> Result<()> {
        if self.payload_pending && self.payload_length > 0 {
            self.prx.skip_bytes(self.payload_length as u64)?;
        }
        self.payload_pending = false;
        Ok(())
    }

    /// Reads past the positions of documents the caller skipped.
    fn skip_pending_positions(&mut self) -> Result<()> {
        while self.pos_pending_count > self.freq {
            let code = self.prx.read_vint()?;
            if self.store_payloads && code & 1 != 0 {
                self.payload_length = self.prx.read_vint()? as i32;
            }
            if self.store_offsets && self.prx.read_vint()? & 1 != 0 {
                self.offset_length = self.prx.read_vint()? as i32;
            }
            if self.store_payloads && self.payload_length > 0 {
                self.prx.skip_bytes(self.payload_length as u64)?;
            }
            self.pos_pending_count -= 1;
            self.position = 0;
            self.start_offset = 0;
            self.payload_pending = false;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SegmentPositionsEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentPositionsEnum")
            .field("doc", &self.doc)
            .field("freq", &self.freq)
            .field("position", &self.position)
            .field("ord", &self.ord)
            .field("limit", &self.limit)
            .finish()
    }
}

impl DocIdSetIterator for SegmentPositionsEnum {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        loop {
            if self.ord == self.limit {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.ord += 1;
            let code = self.frq.read_vint()?;
            self.accum = self.accum.wrapping_add(code >> 1);
            self.freq = if code & 1 != 0 {
                1
            } else {
                self.frq.read_vint()?
            };
            self.pos_pending_count += self.freq;
            if self.is_live(self.accum) {
                break;
            }
        }
        self.positions_left = self.freq;
        self.position = 0;
        self.start_offset = 0;
        self.doc = self.accum;
        Ok(self.doc)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.skip.should_skip(self.accum, target, self.limit) {
            let skip = self.skip;
            let skipper = self.skipper.get_or_insert_with(|| {
                SkipReader::new(
                    self.frq.clone(),
                    skip.skip_interval,
                    skip.max_skip_levels,
                    skip.version,
                )
            });
            if !self.skipped {
                skipper.init(
                    self.freq_offset + self.skip_offset,
                    self.freq_offset,
                    self.prox_offset,
                    self.limit,
                    self.store_payloads,
                    self.store_offsets,
                );
                self.skipped = true;
            }
            let new_ord = skipper.skip_to(target)?;
            if new_ord > self.ord as i64 {
                self.ord = new_ord as u32;
                self.accum = skipper.doc();
                self.doc = self.accum;
                let freq_pointer = skipper.freq_pointer();
                self.lazy_prox_pointer = Some(skipper.prox_pointer());
                self.payload_length = skipper.payload_length();
                self.offset_length = skipper.offset_length();
                self.frq.seek(freq_pointer)?;
                self.pos_pending_count = 0;
                self.positions_left = 0;
                self.position = 0;
                self.start_offset = 0;
                self.payload_pending = false;
                self.payload = None;
            }
        }

        loop {
            let doc = self.next_doc()?;
            if doc >= target {
                return Ok(doc);
            }
        }
    }

    fn cost(&self) -> u64 {
        self.limit as u64
    }
}

impl DocsEnum for SegmentPositionsEnum {
    fn freq(&self) -> u32 {
        self.freq
    }
}

impl DocsAndPositionsEnum for SegmentPositionsEnum {
    fn next_position(&mut self) -> Result<u32> {
        if self.positions_left == 0 {
            return Err(Error::invalid_operation(format!(
                "next_position called more than freq={} times for doc {}",
                self.freq, self.doc
            )));
        }
        if let Some(pointer) = self.lazy_prox_pointer.take() {
            self.prx.seek(pointer)?;
        }
        self.skip_payload()?;
        self.skip_pending_positions()?;

        let code = self.prx.read_vint()?;
        if self.store_payloads {
            if code & 1 != 0 {
                self.payload_length = self.prx.read_vint()? as i32;
            }
            self.position += code >> 1;
            self.payload_pending = true;
        } else {
            self.position += code;
        }
        if self.store_offsets {
            let offset_code = self.prx.read_vint()?;
            if offset_code & 1 != 0 {
                self.offset_length = self.prx.read_vint()? as i32;
            }
            self.start_offset += offset_code >> 1;
        }
        self.payload = None;
        self.pos_pending_count -= 1;
        self.positions_left -= 1;
        Ok(self.position)
    }

    fn start_offset(&self) -> i32 {
        if self.store_offsets {
            self.start_offset as i32
        } else {
            -1
        }
    }

    fn end_offset(&self) -> i32 {
        if self.store_offsets {
            self.start_offset as i32 + self.offset_length
        } else {
            -1
        }
    }

    fn payload(&mut self) -> Result<Option<Bytes>> {
        if !self.store_payloads || self.payload_length <= 0 {
            return Ok(None);
        }
        if self.payload_pending {
            self.payload = Some(self.prx.read_slice(self.payload_length as usize)?);
            self.payload_pending = false;
        }
        Ok(self.payload.clone())
    }
}
