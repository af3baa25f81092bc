//! Inverted index postings storage.
//!
//! This crate implements the on-disk layer of an inverted index segment: the
//! postings codec (documents, frequencies, positions, payloads and offsets, with
//! multi-level skip lists), the block terms dictionary that maps each term to its
//! postings, and the multi-segment views that present several segments as one
//! logical index.
//!
//! # Files
//!
//! A segment consists of three streams:
//! - **Terms dictionary** (`.tim`): sorted terms per field, their statistics and the
//!   postings metadata needed to locate them.
//! - **Frequency stream** (`.frq`): delta-coded document ids and in-document term
//!   frequencies, interleaved with skip data.
//! - **Position stream** (`.prx`): delta-coded positions with optional payloads and
//!   character offsets. Only required when some field indexes positions.
//!
//! # Reading
//!
//! [`read::SegmentReader`] opens a segment and hands out per-field [`Terms`]. A
//! [`TermsEnum`] walks the terms in order and produces [`DocsEnum`] and
//! [`DocsAndPositionsEnum`] cursors over the postings of its current term.
//!
//! # Writing
//!
//! [`write::SegmentWriter`] accepts a strictly ordered field/term/document stream;
//! [`write::SegmentBuilder`] collects tokens in memory, sorts them and drives the
//! segment writer.
//!
//! # Quick Start
//!
//! ```rust
//! use quarry_postings::{
//!     DocIdSetIterator, Terms, TermsEnum,
//!     config::{PostingsConfig, ReaderConfig},
//!     format::{FieldInfo, IndexOptions},
//!     read::SegmentReader,
//!     write::{MemorySegment, SegmentBuilder, Token},
//! };
//!
//! let mut builder = SegmentBuilder::new(PostingsConfig::default());
//! builder
//!     .define_field(FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions))
//!     .unwrap();
//! builder.add_token(0, "body", Token::new("cat", 0)).unwrap();
//! builder.add_token(2, "body", Token::new("cat", 3)).unwrap();
//!
//! let segment = MemorySegment::new();
//! builder.finish(segment.sinks()).unwrap();
//!
//! let reader = SegmentReader::open(segment.sources(), &ReaderConfig::default()).unwrap();
//! let terms = reader.terms("body").unwrap();
//! let mut terms_enum = terms.iterator().unwrap();
//! assert!(terms_enum.seek_exact(b"cat").unwrap());
//! let mut docs = terms_enum.docs(None).unwrap();
//! assert_eq!(docs.next_doc().unwrap(), 0);
//! assert_eq!(docs.next_doc().unwrap(), 2);
//! ```

pub mod automaton;
pub mod comparator;
pub mod config;
pub mod enums;
pub mod format;
pub mod live_docs;
pub mod multi;
pub mod read;
pub mod skip;
pub mod write;

pub use automaton::{CompiledAutomaton, TermAutomaton};
pub use comparator::TermComparator;
pub use enums::{
    DocIdSetIterator, DocsAndPositionsEnum, DocsEnum, SeekStatus, Terms, TermsEnum,
};
pub use format::NO_MORE_DOCS;
pub use live_docs::{FixedBitSet, LiveDocs, MatchAllDocs};
