//! Encoding side: the postings writer, the terms dictionary writer and the
//! segment-level entry points.

mod builder;
mod postings;
mod segment;
mod terms;

pub use builder::{SegmentBuilder, Token};
pub use postings::PostingsWriter;
pub use segment::{
    FRQ_FILE, MemorySegment, PRX_FILE, SegmentFiles, SegmentSummary, SegmentWriter, TERMS_FILE,
};
pub use terms::{FieldStats, TermsWriter};
