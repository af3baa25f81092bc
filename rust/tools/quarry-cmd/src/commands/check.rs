//! Check command implementation

use anyhow::{Context, Result};
use quarry_postings::config::ReaderConfig;

use crate::commands::open_segment;

/// Run the check command
pub fn run(segment_dir: String) -> Result<()> {
    let config = ReaderConfig::default().with_checksums_on_open(true);
    let reader = open_segment(&segment_dir, &config)?;
    reader
        .check_integrity()
        .with_context(|| format!("Integrity check failed for {segment_dir}"))?;
    log::info!(
        "Segment {segment_dir} is intact: {} fields, {} documents",
        reader.fields().count(),
        reader.max_doc()
    );
    println!("OK");
    Ok(())
}
