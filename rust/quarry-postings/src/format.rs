//! Constants and metadata types shared by the postings reader and writer.

use quarry_common::{Result, error::Error};
use serde::{Deserialize, Serialize};

use crate::comparator::TermComparator;

/// Codec name of the postings header stored in the terms dictionary.
pub const TERMS_CODEC: &str = "Lucene40PostingsWriterTerms";

/// Codec name of the frequency stream.
pub const FRQ_CODEC: &str = "Lucene40PostingsWriterFrq";

/// Codec name of the position stream.
pub const PRX_CODEC: &str = "Lucene40PostingsWriterPrx";

/// Codec name of the block terms dictionary.
pub const TERMS_DICT_CODEC: &str = "QuarryBlockTermsDict";

pub const VERSION_START: u32 = 0;

/// Skip entries store their pointer deltas as `VLong` instead of `VInt`.
pub const VERSION_LONG_SKIP: u32 = 1;

pub const VERSION_CURRENT: u32 = VERSION_LONG_SKIP;

pub const TERMS_DICT_VERSION_START: u32 = 0;

pub const TERMS_DICT_VERSION_CURRENT: u32 = 0;

/// Returned by document cursors once they are exhausted.
pub const NO_MORE_DOCS: u32 = i32::MAX as u32;

/// Returned by [`crate::DocIdSetIterator::doc_id`] before the first call to
/// `next_doc` or `advance`.
pub const UNPOSITIONED: u32 = u32::MAX;

/// Number of decoded documents buffered by a docs cursor.
pub const DOCS_BUFFER_SIZE: usize = 64;

/// Above this many buffered documents `advance` binary searches the buffer.
pub const BINARY_SEARCH_THRESHOLD: usize = 32;

/// Returns `true` if the postings format `version` can be decoded.
pub fn accepts_version(version: u32) -> bool {
    (VERSION_START..=VERSION_CURRENT).contains(&version)
}

/// What a field indexes for each posting. Options are ordered: every option
/// includes everything indexed by the options before it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexOptions {
    /// Only document ids; `freq()` always reports 1.
    Docs,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            IndexOptions::Docs => 0,
            IndexOptions::DocsAndFreqs => 1,
            IndexOptions::DocsAndFreqsAndPositions => 2,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => 3,
        }
    }

    pub(crate) fn from_byte(resource: &str, b: u8) -> Result<IndexOptions> {
        match b {
            0 => Ok(IndexOptions::Docs),
            1 => Ok(IndexOptions::DocsAndFreqs),
            2 => Ok(IndexOptions::DocsAndFreqsAndPositions),
            3 => Ok(IndexOptions::DocsAndFreqsAndPositionsAndOffsets),
            _ => Err(Error::corrupt_index(
                resource,
                format!("unknown index options {b}"),
            )),
        }
    }
}

/// Per-field indexing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub index_options: IndexOptions,
    pub store_payloads: bool,
    pub comparator: TermComparator,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, number: u32, index_options: IndexOptions) -> FieldInfo {
        FieldInfo {
            name: name.into(),
            number,
            index_options,
            store_payloads: false,
            comparator: TermComparator::Binary,
        }
    }

    pub fn with_payloads(mut self) -> FieldInfo {
        self.store_payloads = true;
        self
    }

    pub fn with_comparator(mut self, comparator: TermComparator) -> FieldInfo {
        self.comparator = comparator;
        self
    }

    pub fn has_freqs(&self) -> bool {
        self.index_options.has_freqs()
    }

    pub fn has_positions(&self) -> bool {
        self.index_options.has_positions()
    }

    pub fn has_offsets(&self) -> bool {
        self.index_options.has_offsets()
    }

    /// Payloads are stored in the position stream and need positions.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_arg("name", "field name is empty"));
        }
        if self.store_payloads && !self.has_positions() {
            return Err(Error::invalid_arg(
                "store_payloads",
                format!(
                    "field {} stores payloads but does not index positions",
                    self.name
                ),
            ));
        }
        Ok(())
    }
}

/// Statistics of one term, as handed to the writer when the term is finished.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TermStats {
    pub doc_freq: u32,
    /// Sum of in-document frequencies, or -1 when the field omits frequencies.
    pub total_term_freq: i64,
}

impl TermStats {
    pub fn new(doc_freq: u32, total_term_freq: i64) -> TermStats {
        TermStats {
            doc_freq,
            total_term_freq,
        }
    }
}

/// Everything needed to start decoding the postings of one term without looking
/// it up in the dictionary again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTermState {
    pub doc_freq: u32,
    /// -1 when the field omits frequencies.
    pub total_term_freq: i64,
    /// Start of the term's documents in the frequency stream.
    pub freq_offset: u64,
    /// Start of the term's positions in the position stream.
    pub prox_offset: u64,
    /// Skip data location relative to `freq_offset`. Only meaningful when
    /// `doc_freq` reaches the skip minimum.
    pub skip_offset: u64,
    /// Ordinal of the term within its field.
    pub ord: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_options_ordering() {
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositionsAndOffsets.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositionsAndOffsets.has_offsets());
        for b in 0..4 {
            let options = IndexOptions::from_byte("f", b).unwrap();
            assert_eq!(options.to_byte(), b);
        }
        assert!(IndexOptions::from_byte("f", 4).is_err());
    }

    #[test]
    fn test_versions() {
        assert!(accepts_version(VERSION_START));
        assert!(accepts_version(VERSION_CURRENT));
        assert!(!accepts_version(VERSION_CURRENT + 1));
    }

    #[test]
    fn test_payloads_need_positions() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs).with_payloads();
        assert!(field.validate().is_err());
        let field =
            FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions).with_payloads();
        field.validate().unwrap();
        assert!(FieldInfo::new("", 0, IndexOptions::Docs).validate().is_err());
    }
}
