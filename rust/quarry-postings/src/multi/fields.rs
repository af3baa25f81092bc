use std::{collections::BTreeSet, sync::Arc};

use quarry_common::{Result, error::Error};

use crate::{NO_MORE_DOCS, enums::Terms, live_docs::LiveDocs, read::SegmentReader};

use super::{MultiLiveDocs, MultiTerms, ReaderSlice};

/// Several segments presented as one index. Segment `i` owns the global
/// document ids starting at the sum of the `max_doc` of segments `0..i`.
pub struct MultiFields {
    segments: Vec<(Arc<SegmentReader>, Option<Arc<dyn LiveDocs>>)>,
    slices: Vec<ReaderSlice>,
    max_doc: u32,
}

impl MultiFields {
    pub fn new(
        segments: Vec<(Arc<SegmentReader>, Option<Arc<dyn LiveDocs>>)>,
    ) -> Result<MultiFields> {
        let mut slices = Vec::with_capacity(segments.len());
        let mut base = 0u32;
        for (index, (reader, live_docs)) in segments.iter().enumerate() {
            let length = reader.max_doc();
            if let Some(live_docs) = live_docs {
                if live_docs.len() < length as usize {
                    return Err(Error::invalid_arg(
                        "segments",
                        format!(
                            "live docs of segment {index} cover {} of {length} documents",
                            live_docs.len()
                        ),
                    ));
                }
            }
            slices.push(ReaderSlice::new(base, length, index));
            base = base
                .checked_add(length)
                .filter(|&end| end <= NO_MORE_DOCS)
                .ok_or_else(|| Error::invalid_arg("segments", "too many documents"))?;
        }
        log::debug!(
            "merged view over {} segments, {base} documents",
            segments.len()
        );
        Ok(MultiFields {
            segments,
            slices,
            max_doc: base,
        })
    }

    /// Union of the field names of all segments, in ascending order.
    pub fn fields(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|(reader, _)| reader.fields().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The terms of `field` across all segments, or `None` when no segment
    /// indexes it.
    ///
    /// A field found only in the first segment is returned as that segment's
    /// terms, whose document ids already are global.
    pub fn terms(&self, field: &str) -> Result<Option<Arc<dyn Terms>>> {
        let mut subs: Vec<Arc<dyn Terms>> = Vec::new();
        let mut slices = Vec::new();
        for ((reader, _), slice) in self.segments.iter().zip(&self.slices) {
            if let Some(terms) = reader.terms(field) {
                subs.push(Arc::new(terms));
                slices.push(*slice);
            }
        }
        match subs.len() {
            0 => Ok(None),
            1 if slices[0].start == 0 => Ok(subs.pop()),
            _ => Ok(Some(Arc::new(MultiTerms::new(subs, slices)?))),
        }
    }

    /// Global live docs, or `None` when no segment has deletions.
    pub fn live_docs(&self) -> Option<Arc<dyn LiveDocs>> {
        if self.segments.iter().all(|(_, live_docs)| live_docs.is_none()) {
            return None;
        }
        let subs = self
            .segments
            .iter()
            .map(|(_, live_docs)| live_docs.clone())
            .collect();
        Some(Arc::new(MultiLiveDocs::new(subs, &self.slices)))
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn slices(&self) -> &[ReaderSlice] {
        &self.slices
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }
}
