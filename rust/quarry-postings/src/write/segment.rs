use std::{path::Path, sync::Arc};

use quarry_common::{Result, error::Error};
use quarry_io::{
    IndexOutput, MemoryFile, ReadAt, SealingWrite,
    file::{FileReader, FileWriter},
};
use serde::Serialize;

use crate::{
    config::PostingsConfig,
    format::{FieldInfo, TermStats},
    live_docs::FixedBitSet,
};

use super::{postings::PostingsWriter, terms::TermsWriter};

pub const TERMS_FILE: &str = "segment.tim";

pub const FRQ_FILE: &str = "segment.frq";

pub const PRX_FILE: &str = "segment.prx";

/// The three streams of a segment. The position stream is optional when no
/// field indexes positions.
#[derive(Debug, Clone)]
pub struct SegmentFiles<T> {
    pub terms: T,
    pub frq: T,
    pub prx: Option<T>,
}

impl<T> SegmentFiles<T> {
    pub fn map<U>(self, mut f: impl FnMut(&str, T) -> Result<U>) -> Result<SegmentFiles<U>> {
        Ok(SegmentFiles {
            terms: f(TERMS_FILE, self.terms)?,
            frq: f(FRQ_FILE, self.frq)?,
            prx: self.prx.map(|prx| f(PRX_FILE, prx)).transpose()?,
        })
    }
}

impl SegmentFiles<Box<dyn SealingWrite>> {
    /// Creates the segment files in `dir`. Fails if a segment already exists there.
    pub fn create_in(dir: impl AsRef<Path>, with_positions: bool) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
        let create = |name: &str| -> Result<Box<dyn SealingWrite>> {
            let path = dir.join(name);
            let writer =
                FileWriter::create(&path).map_err(|e| Error::io(path.display().to_string(), e))?;
            Ok(Box::new(writer))
        };
        Ok(SegmentFiles {
            terms: create(TERMS_FILE)?,
            frq: create(FRQ_FILE)?,
            prx: if with_positions {
                Some(create(PRX_FILE)?)
            } else {
                None
            },
        })
    }
}

impl SegmentFiles<Arc<dyn ReadAt>> {
    /// Opens the segment files in `dir`. The position file is optional.
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let open = |name: &str| -> Result<Arc<dyn ReadAt>> {
            let path = dir.join(name);
            let reader =
                FileReader::open(&path).map_err(|e| Error::io(path.display().to_string(), e))?;
            Ok(Arc::new(reader))
        };
        let prx_path = dir.join(PRX_FILE);
        Ok(SegmentFiles {
            terms: open(TERMS_FILE)?,
            frq: open(FRQ_FILE)?,
            prx: if prx_path.exists() {
                Some(open(PRX_FILE)?)
            } else {
                None
            },
        })
    }
}

/// A segment kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySegment {
    pub tim: MemoryFile,
    pub frq: MemoryFile,
    pub prx: MemoryFile,
}

impl MemorySegment {
    pub fn new() -> MemorySegment {
        Default::default()
    }

    /// Write handles for a [`SegmentWriter`] or [`super::SegmentBuilder`].
    pub fn sinks(&self) -> SegmentFiles<Box<dyn SealingWrite>> {
        SegmentFiles {
            terms: Box::new(self.tim.clone()),
            frq: Box::new(self.frq.clone()),
            prx: Some(Box::new(self.prx.clone())),
        }
    }

    /// Snapshots of the written content for [`crate::read::SegmentReader::open`].
    pub fn sources(&self) -> SegmentFiles<Arc<dyn ReadAt>> {
        SegmentFiles {
            terms: self.tim.to_read_at(),
            frq: self.frq.to_read_at(),
            prx: (!self.prx.is_empty()).then(|| self.prx.to_read_at()),
        }
    }
}

/// Outcome of writing a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub max_doc: u32,
    pub num_fields: usize,
    pub num_terms: u64,
    pub num_postings: u64,
    pub terms_bytes: u64,
    pub frq_bytes: u64,
    pub prx_bytes: u64,
}

/// Writes one segment from an ordered stream of fields, terms, documents and
/// positions.
///
/// Fields may come in any order but each only once; terms of a field must be
/// strictly ascending under the field's comparator, documents of a term
/// strictly ascending.
pub struct SegmentWriter {
    terms: TermsWriter,
    max_doc: u32,
    field_names: Vec<String>,
    summary: SegmentSummary,

    field: Option<FieldInfo>,
    docs_seen: FixedBitSet,
    last_term: Option<Vec<u8>>,
    term: Option<Vec<u8>>,
}

impl SegmentWriter {
    pub fn new(
        files: SegmentFiles<Box<dyn SealingWrite>>,
        max_doc: u32,
        config: &PostingsConfig,
    ) -> Result<SegmentWriter> {
        config.validate()?;
        let frq = IndexOutput::new(FRQ_FILE, files.frq);
        let prx = files.prx.map(|prx| IndexOutput::new(PRX_FILE, prx));
        let postings = PostingsWriter::new(frq, prx, max_doc, config)?;
        let terms_out = IndexOutput::new(TERMS_FILE, files.terms);
        let terms = TermsWriter::new(terms_out, postings, config.terms_block_size)?;
        log::debug!("writing segment with max_doc {max_doc} ({config:?})");
        Ok(SegmentWriter {
            terms,
            max_doc,
            field_names: Vec::new(),
            summary: SegmentSummary {
                max_doc,
                ..Default::default()
            },
            field: None,
            docs_seen: FixedBitSet::new(max_doc as usize),
            last_term: None,
            term: None,
        })
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn start_field(&mut self, field: &FieldInfo) -> Result<()> {
        if self.field_names.iter().any(|name| *name == field.name) {
            return Err(Error::invalid_arg(
                "field",
                format!("field {} was already written", field.name),
            ));
        }
        self.terms.start_field(field)?;
        self.field_names.push(field.name.clone());
        self.field = Some(field.clone());
        self.docs_seen = FixedBitSet::new(self.max_doc as usize);
        self.last_term = None;
        Ok(())
    }

    pub fn start_term(&mut self, term: &[u8]) -> Result<()> {
        let Some(field) = self.field.as_ref() else {
            return Err(Error::invalid_operation("start_term outside of a field"));
        };
        if self.term.is_some() {
            return Err(Error::invalid_operation(
                "start_term before finishing the previous term",
            ));
        }
        if let Some(last) = self.last_term.as_deref() {
            if field.comparator.compare(last, term).is_ge() {
                return Err(Error::corrupt_index(
                    TERMS_FILE,
                    format!(
                        "terms out of order in field {}: {:?} after {:?}",
                        field.name,
                        String::from_utf8_lossy(term),
                        String::from_utf8_lossy(last)
                    ),
                ));
            }
        }
        self.terms.postings_mut().start_term();
        self.term = Some(term.to_vec());
        Ok(())
    }

    pub fn start_doc(&mut self, doc_id: u32, freq: u32) -> Result<()> {
        if self.term.is_none() {
            return Err(Error::invalid_operation("start_doc outside of a term"));
        }
        self.terms.postings_mut().start_doc(doc_id, freq)?;
        self.docs_seen.set(doc_id as usize);
        self.summary.num_postings += 1;
        Ok(())
    }

    pub fn add_position(
        &mut self,
        position: u32,
        payload: Option<&[u8]>,
        start_offset: u32,
        end_offset: u32,
    ) -> Result<()> {
        self.terms
            .postings_mut()
            .add_position(position, payload, start_offset, end_offset)
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        self.terms.postings_mut().finish_doc()
    }

    pub fn finish_term(&mut self, stats: TermStats) -> Result<()> {
        let Some(term) = self.term.as_deref() else {
            return Err(Error::invalid_operation("finish_term without start_term"));
        };
        // The term stays pending until its stats are accepted.
        let state = self.terms.postings_mut().finish_term(stats)?;
        if state.doc_freq > 0 {
            self.summary.num_terms += 1;
        }
        self.terms.add_term(term, state)?;
        self.last_term = self.term.take();
        Ok(())
    }

    pub fn finish_field(&mut self) -> Result<()> {
        if self.term.is_some() {
            return Err(Error::invalid_operation(
                "finish_field before finishing the current term",
            ));
        }
        let doc_count = self.docs_seen.cardinality() as u32;
        let stats = self.terms.finish_field(doc_count)?;
        if stats.num_terms > 0 {
            self.summary.num_fields += 1;
        }
        self.field = None;
        Ok(())
    }

    /// Writes the trailers and seals all streams.
    pub fn finish(mut self) -> Result<SegmentSummary> {
        if self.field.is_some() {
            self.finish_field()?;
        }
        let (terms_bytes, frq_bytes, prx_bytes) = self.terms.close(self.max_doc)?;
        self.summary.terms_bytes = terms_bytes;
        self.summary.frq_bytes = frq_bytes;
        self.summary.prx_bytes = prx_bytes;
        log::info!(
            "wrote segment: {} fields, {} terms, {} postings ({} + {} + {} bytes)",
            self.summary.num_fields,
            self.summary.num_terms,
            self.summary.num_postings,
            terms_bytes,
            frq_bytes,
            prx_bytes
        );
        Ok(self.summary)
    }
}
