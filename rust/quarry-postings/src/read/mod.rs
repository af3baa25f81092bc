//! Decoding side: postings cursors, the terms dictionary and segments.

mod docs;
mod positions;
mod postings;
mod segment;
mod terms;

pub use docs::SegmentDocsEnum;
pub use positions::SegmentPositionsEnum;
pub use postings::PostingsReader;
pub use segment::SegmentReader;
pub use terms::{AutomatonTermsEnum, FieldReader, SegmentTermsEnum, SegmentTermsReader};
