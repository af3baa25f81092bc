//! Command implementations for quarry-cmd

use std::path::Path;

use anyhow::{Context, Result};
use quarry_postings::{
    config::ReaderConfig,
    read::SegmentReader,
    write::SegmentFiles,
};

pub mod check;
pub mod ingest;
pub mod inspect;

/// Opens the segment stored in `segment_dir`.
pub fn open_segment(segment_dir: &str, config: &ReaderConfig) -> Result<SegmentReader> {
    let dir = Path::new(segment_dir);
    if !dir.is_dir() {
        anyhow::bail!("Segment directory does not exist: {}", dir.display());
    }
    let files = SegmentFiles::open_in(dir)
        .with_context(|| format!("Failed to open segment files in {}", dir.display()))?;
    SegmentReader::open(files, config)
        .with_context(|| format!("Failed to open segment in {}", dir.display()))
}
