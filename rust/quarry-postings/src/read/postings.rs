use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use quarry_common::{Result, bail_corrupt, error::Error};
use quarry_io::{IndexInput, codec_util};

use crate::{
    format::{
        BlockTermState, FRQ_CODEC, FieldInfo, PRX_CODEC, TERMS_CODEC, VERSION_CURRENT,
        VERSION_START,
    },
    live_docs::LiveDocs,
};

use super::{docs::SegmentDocsEnum, positions::SegmentPositionsEnum};

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// Skip list parameters persisted by the writer, plus the reader-side switch
/// that turns skipping off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SkipParams {
    pub skip_interval: u32,
    pub max_skip_levels: u32,
    pub skip_minimum: u32,
    pub version: u32,
    pub enabled: bool,
}

impl SkipParams {
    /// Whether a cursor positioned after document `accum` should consult the skip
    /// list to reach `target`.
    #[inline]
    pub fn should_skip(&self, accum: u32, target: u32, doc_freq: u32) -> bool {
        self.enabled
            && doc_freq >= self.skip_minimum
            && target as u64 >= accum as u64 + self.skip_interval as u64
    }
}

/// Decodes the postings metadata stored in the terms dictionary and opens cursors
/// over the frequency and position streams of a segment.
#[derive(Debug, Clone)]
pub struct PostingsReader {
    id: u64,
    frq: IndexInput,
    prx: Option<IndexInput>,
    skip: SkipParams,
}

impl PostingsReader {
    /// Reads the postings header from the terms dictionary at its current position
    /// and validates the headers of the frequency and position streams.
    pub fn open(
        terms_in: &mut IndexInput,
        mut frq: IndexInput,
        mut prx: Option<IndexInput>,
    ) -> Result<PostingsReader> {
        let version =
            codec_util::check_header(terms_in, TERMS_CODEC, VERSION_START, VERSION_CURRENT)?;
        let skip_interval = terms_in.read_u32()?;
        let max_skip_levels = terms_in.read_u32()?;
        let skip_minimum = terms_in.read_u32()?;
        if skip_interval < 2 || !(1..=32).contains(&max_skip_levels) || skip_minimum == 0 {
            bail_corrupt!(
                terms_in.name(),
                "invalid skip parameters: interval={skip_interval} levels={max_skip_levels} minimum={skip_minimum}"
            );
        }

        let frq_version =
            codec_util::check_header(&mut frq, FRQ_CODEC, VERSION_START, VERSION_CURRENT)?;
        if frq_version != version {
            bail_corrupt!(
                frq.name(),
                "version {frq_version} does not match terms dictionary version {version}"
            );
        }
        if let Some(prx) = prx.as_mut() {
            let prx_version =
                codec_util::check_header(prx, PRX_CODEC, VERSION_START, VERSION_CURRENT)?;
            if prx_version != version {
                bail_corrupt!(
                    prx.name(),
                    "version {prx_version} does not match terms dictionary version {version}"
                );
            }
        }

        log::debug!(
            "opened postings {} (version {version}, skip interval {skip_interval}, {max_skip_levels} levels)",
            frq.name()
        );
        Ok(PostingsReader {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            frq,
            prx,
            skip: SkipParams {
                skip_interval,
                max_skip_levels,
                skip_minimum,
                version,
                enabled: true,
            },
        })
    }

    /// Enables or disables the use of skip data by cursors opened afterwards.
    /// Without skipping `advance` scans the postings linearly.
    pub fn with_skipping(mut self, enabled: bool) -> PostingsReader {
        self.skip.enabled = enabled;
        self
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip.skip_interval
    }

    pub fn max_skip_levels(&self) -> u32 {
        self.skip.max_skip_levels
    }

    pub fn skip_minimum(&self) -> u32 {
        self.skip.skip_minimum
    }

    pub fn version(&self) -> u32 {
        self.skip.version
    }

    pub fn has_positions_stream(&self) -> bool {
        self.prx.is_some()
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn skip_params(&self) -> SkipParams {
        self.skip
    }

    /// Decodes the metadata written by `PostingsWriter::encode_term` into `state`,
    /// whose `doc_freq` must already be set. Unless `absolute`, offsets are deltas
    /// against the values already in `state`.
    pub fn decode_term(
        &self,
        input: &mut IndexInput,
        field: &FieldInfo,
        state: &mut BlockTermState,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            state.freq_offset = 0;
            state.prox_offset = 0;
        }
        state.freq_offset += input.read_vlong()?;
        state.skip_offset = if state.doc_freq >= self.skip.skip_minimum {
            input.read_vlong()?
        } else {
            0
        };
        if field.has_positions() {
            state.prox_offset += input.read_vlong()?;
        }
        Ok(())
    }

    /// Opens a docs cursor over the postings described by `state`, resetting
    /// `reuse` when it was produced by this reader.
    pub fn docs(
        &self,
        field: &FieldInfo,
        state: &BlockTermState,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentDocsEnum>,
    ) -> Result<SegmentDocsEnum> {
        let reuse = reuse.filter(|docs| docs.reader_id() == self.id);
        SegmentDocsEnum::open(self, field, state, live_docs, reuse)
    }

    /// Opens a positions cursor, or returns `None` when the field does not index
    /// positions.
    pub fn docs_and_positions(
        &self,
        field: &FieldInfo,
        state: &BlockTermState,
        live_docs: Option<Arc<dyn LiveDocs>>,
        reuse: Option<SegmentPositionsEnum>,
    ) -> Result<Option<SegmentPositionsEnum>> {
        if !field.has_positions() {
            log::warn!(
                "positions requested for field {} which is indexed with {:?}",
                field.name,
                field.index_options
            );
            return Ok(None);
        }
        let Some(prx) = self.prx.as_ref() else {
            return Err(Error::corrupt_index(
                self.frq.name(),
                format!(
                    "field {} indexes positions but the segment has no position stream",
                    field.name
                ),
            ));
        };
        let reuse = reuse.filter(|positions| positions.reader_id() == self.id);
        SegmentPositionsEnum::open(self, prx, field, state, live_docs, reuse).map(Some)
    }

    pub(crate) fn frq(&self) -> &IndexInput {
        &self.frq
    }

    /// Verifies the checksums of the frequency and position streams.
    pub fn check_integrity(&self) -> Result<()> {
        codec_util::verify_checksum(&mut self.frq.clone())?;
        if let Some(prx) = self.prx.as_ref() {
            codec_util::verify_checksum(&mut prx.clone())?;
        }
        Ok(())
    }
}
