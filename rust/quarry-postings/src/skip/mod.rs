//! Multi-level skip lists over the frequency stream.
//!
//! While a term's documents are written, every `skip_interval`-th document adds an
//! entry to level 0; every `skip_interval`-th entry of level `k` is also added to
//! level `k + 1`. An entry records where decoding can resume: the last document id
//! before the entry, the frequency and position stream pointers, and the payload
//! and offset lengths in effect at that point.
//!
//! The levels are stored after the term's postings, highest level first:
//!
//! ```text
//! [len(level n-1) level n-1] ... [len(level 1) level 1] level 0
//! ```
//!
//! Entries of levels above 0 also carry a pointer to the matching entry of the
//! level below, so a reader can descend without scanning lower levels.

mod reader;
mod writer;

pub use reader::SkipReader;
pub use writer::SkipWriter;

/// Number of skip levels used for a postings list of `doc_count` documents:
/// `floor(log_interval(doc_count))`, clamped to `1..=max_levels`.
pub fn num_skip_levels(skip_interval: u32, max_levels: u32, doc_count: u32) -> usize {
    let interval = skip_interval.max(2);
    let mut levels = 1;
    let mut remaining = doc_count / interval;
    while remaining >= interval && levels < max_levels {
        remaining /= interval;
        levels += 1;
    }
    levels as usize
}

#[cfg(test)]
mod tests {
    use quarry_io::{IndexInput, IndexOutput, MemoryFile};

    use super::{SkipReader, SkipWriter, num_skip_levels};
    use crate::format::VERSION_CURRENT;

    /// Skip data for 16 documents `10, 20, ..., 160` with an entry every 4
    /// documents. Each entry's frequency pointer is twice the document count.
    fn sample_skip_reader() -> SkipReader {
        let mut writer = SkipWriter::new(4, 3, 16);
        writer.reset(0, 0);
        for df in 1..=16u32 {
            if df % 4 == 0 {
                writer.set_skip_data(df * 10, false, 0, false, 0, df as u64 * 2, 0);
                writer.buffer_skip(df).unwrap();
            }
        }
        let file = MemoryFile::new();
        let mut out = IndexOutput::new("skip", Box::new(file.clone()));
        assert_eq!(writer.write_skip(&mut out).unwrap(), 0);
        out.close().unwrap();

        let input = IndexInput::open("skip", file.to_read_at()).unwrap();
        let mut reader = SkipReader::new(input, 4, 3, VERSION_CURRENT);
        reader.init(0, 0, 0, 16, false, false);
        reader
    }

    #[test]
    fn test_skip_to_before_first_entry() {
        let mut reader = sample_skip_reader();
        assert_eq!(reader.skip_to(5).unwrap(), 0);
        assert_eq!(reader.skip_to(40).unwrap(), 0);
        assert_eq!(reader.freq_pointer(), 0);
    }

    #[test]
    fn test_skip_to_moves_forward() {
        let mut reader = sample_skip_reader();
        assert!(reader.skip_to(95).unwrap() > 0);
        assert_eq!(reader.doc(), 80);
        assert_eq!(reader.freq_pointer(), 16);

        assert!(reader.skip_to(161).unwrap() > 0);
        assert_eq!(reader.doc(), 160);
        assert_eq!(reader.freq_pointer(), 32);
    }

    #[test]
    fn test_num_skip_levels() {
        assert_eq!(num_skip_levels(16, 10, 0), 1);
        assert_eq!(num_skip_levels(16, 10, 16), 1);
        assert_eq!(num_skip_levels(16, 10, 255), 1);
        assert_eq!(num_skip_levels(16, 10, 256), 2);
        assert_eq!(num_skip_levels(16, 10, 4095), 2);
        assert_eq!(num_skip_levels(16, 10, 4096), 3);
        assert_eq!(num_skip_levels(2, 3, 1 << 20), 3);
        assert_eq!(num_skip_levels(2, 32, u32::MAX), 31);
    }
}
