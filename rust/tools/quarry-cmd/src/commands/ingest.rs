//! Ingest command implementation

use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use anyhow::{Context, Result};
use quarry_postings::{
    config::PostingsConfig,
    format::{FieldInfo, IndexOptions},
    write::{SegmentBuilder, SegmentFiles, Token},
};

/// Run the ingest command
pub fn run(
    field: String,
    positions: bool,
    offsets: bool,
    input: String,
    segment_dir: String,
) -> Result<()> {
    let index_options = if offsets {
        IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    } else if positions {
        IndexOptions::DocsAndFreqsAndPositions
    } else {
        IndexOptions::DocsAndFreqs
    };
    log::info!("Ingesting {input} into segment {segment_dir} ({index_options:?})");

    let mut builder = SegmentBuilder::new(PostingsConfig::default());
    builder
        .define_field(FieldInfo::new(field.as_str(), 0, index_options))
        .with_context(|| format!("Invalid field {field}"))?;

    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("Failed to open input file: {input}"))?,
    );
    let mut num_docs = 0u32;
    for (doc, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {input}", doc + 1))?;
        let doc = u32::try_from(doc).context("Too many documents")?;
        for (position, (start, end, term)) in tokenize(&line).enumerate() {
            let mut token = Token::new(term, position as u32);
            if index_options.has_offsets() {
                token = token.with_offsets(start as u32, end as u32);
            }
            builder.add_token(doc, &field, token)?;
        }
        num_docs = doc + 1;
    }
    builder.set_max_doc(num_docs)?;

    let files = SegmentFiles::create_in(&segment_dir, index_options.has_positions())
        .with_context(|| format!("Failed to create segment files in {segment_dir}"))?;
    let summary = builder
        .finish(files)
        .with_context(|| format!("Failed to write segment to {segment_dir}"))?;
    log::info!(
        "Ingested {} documents, {} terms",
        summary.max_doc,
        summary.num_terms
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Splits `line` at whitespace into lowercased terms with their byte offsets.
fn tokenize(line: &str) -> impl Iterator<Item = (usize, usize, String)> + '_ {
    let mut rest = line.char_indices().peekable();
    std::iter::from_fn(move || {
        while rest.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let (start, _) = *rest.peek()?;
        let mut end = start;
        while let Some((i, c)) = rest.next_if(|(_, c)| !c.is_whitespace()) {
            end = i + c.len_utf8();
        }
        Some((start, end, line[start..end].to_lowercase()))
    })
}
