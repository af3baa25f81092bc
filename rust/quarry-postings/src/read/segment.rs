use std::sync::Arc;

use quarry_common::Result;
use quarry_io::{IndexInput, ReadAt, codec_util};

use crate::{config::ReaderConfig, format::FieldInfo, write::SegmentFiles};

use super::{postings::PostingsReader, terms::FieldReader, terms::SegmentTermsReader};

/// A read-only view of one segment.
#[derive(Debug)]
pub struct SegmentReader {
    terms: SegmentTermsReader,
}

impl SegmentReader {
    /// Opens a segment, validating the headers and footers of its files. With
    /// `verify_checksums_on_open` the checksum of every file is recomputed too.
    pub fn open(files: SegmentFiles<Arc<dyn ReadAt>>, config: &ReaderConfig) -> Result<SegmentReader> {
        let mut inputs = files.map(|name, source| IndexInput::open(name, source))?;
        if config.verify_checksums_on_open {
            codec_util::verify_checksum(&mut inputs.terms)?;
            codec_util::verify_checksum(&mut inputs.frq)?;
            if let Some(prx) = inputs.prx.as_mut() {
                codec_util::verify_checksum(prx)?;
            }
        } else {
            codec_util::check_footer(&mut inputs.frq)?;
            if let Some(prx) = inputs.prx.as_mut() {
                codec_util::check_footer(prx)?;
            }
        }
        inputs.terms.seek(0)?;
        inputs.frq.seek(0)?;
        if let Some(prx) = inputs.prx.as_mut() {
            prx.seek(0)?;
        }
        let terms =
            SegmentTermsReader::open(inputs.terms, inputs.frq, inputs.prx, config.use_skip_data)?;
        Ok(SegmentReader { terms })
    }

    /// Names of the indexed fields, in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.terms.fields()
    }

    /// The terms of `field`, or `None` when the segment does not index it.
    pub fn terms(&self, field: &str) -> Option<FieldReader> {
        self.terms.terms(field).cloned()
    }

    pub fn field_info(&self, field: &str) -> Option<&FieldInfo> {
        self.terms.terms(field).map(FieldReader::field_info)
    }

    pub fn max_doc(&self) -> u32 {
        self.terms.max_doc()
    }

    pub fn postings(&self) -> &PostingsReader {
        self.terms.postings()
    }

    /// Recomputes and verifies the checksums of all segment files.
    pub fn check_integrity(&self) -> Result<()> {
        self.terms.check_integrity()
    }
}
