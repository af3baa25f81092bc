//! Inspect command implementation

use anyhow::{Context, Result};
use quarry_postings::{
    DocIdSetIterator, DocsAndPositionsEnum, DocsEnum, NO_MORE_DOCS, TermComparator, Terms,
    TermsEnum,
    config::ReaderConfig,
    format::IndexOptions,
    read::{FieldReader, SegmentReader},
};
use serde::Serialize;

use crate::commands::open_segment;

#[derive(Serialize)]
struct InspectSummary {
    max_doc: u32,
    skip_interval: u32,
    max_skip_levels: u32,
    skip_minimum: u32,
    format_version: u32,
    fields: Vec<FieldSummary>,
}

#[derive(Serialize)]
struct FieldSummary {
    name: String,
    number: u32,
    index_options: IndexOptions,
    comparator: TermComparator,
    store_payloads: bool,
    num_terms: i64,
    num_blocks: usize,
    sum_doc_freq: i64,
    sum_total_term_freq: i64,
    doc_count: i64,
    has_freqs: bool,
    has_positions: bool,
    has_offsets: bool,
    has_payloads: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    terms: Vec<TermSummary>,
}

#[derive(Serialize)]
struct TermSummary {
    term: String,
    ord: u64,
    doc_freq: u32,
    total_term_freq: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    postings: Vec<PostingSummary>,
}

#[derive(Serialize)]
struct PostingSummary {
    doc: u32,
    freq: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    positions: Vec<u32>,
}

/// Run the inspect command
pub fn run(verbose: u8, segment_dir: String) -> Result<()> {
    let reader = open_segment(&segment_dir, &ReaderConfig::default())?;
    let summary = summarize(&reader, verbose)
        .with_context(|| format!("Failed to read segment in {segment_dir}"))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn summarize(reader: &SegmentReader, verbose: u8) -> quarry_common::Result<InspectSummary> {
    let postings = reader.postings();
    let mut fields = Vec::new();
    for name in reader.fields() {
        if let Some(terms) = reader.terms(name) {
            fields.push(summarize_field(&terms, verbose)?);
        }
    }
    Ok(InspectSummary {
        max_doc: reader.max_doc(),
        skip_interval: postings.skip_interval(),
        max_skip_levels: postings.max_skip_levels(),
        skip_minimum: postings.skip_minimum(),
        format_version: postings.version(),
        fields,
    })
}

fn summarize_field(terms: &FieldReader, verbose: u8) -> quarry_common::Result<FieldSummary> {
    let info = terms.field_info();
    let mut term_summaries = Vec::new();
    if verbose > 0 {
        let mut terms_enum = terms.iterator()?;
        while terms_enum.next()? {
            let postings = if verbose > 1 {
                collect_postings(terms_enum.as_mut(), info.index_options)?
            } else {
                Vec::new()
            };
            term_summaries.push(TermSummary {
                term: String::from_utf8_lossy(terms_enum.term()).into_owned(),
                ord: terms_enum.ord()?,
                doc_freq: terms_enum.doc_freq(),
                total_term_freq: terms_enum.total_term_freq(),
                postings,
            });
        }
    }
    Ok(FieldSummary {
        name: info.name.clone(),
        number: info.number,
        index_options: info.index_options,
        comparator: info.comparator,
        store_payloads: info.store_payloads,
        num_terms: terms.size(),
        num_blocks: terms.num_blocks(),
        sum_doc_freq: terms.sum_doc_freq(),
        sum_total_term_freq: terms.sum_total_term_freq(),
        doc_count: terms.doc_count(),
        has_freqs: terms.has_freqs(),
        has_positions: terms.has_positions(),
        has_offsets: terms.has_offsets(),
        has_payloads: terms.has_payloads(),
        terms: term_summaries,
    })
}

fn collect_postings(
    terms_enum: &mut dyn TermsEnum,
    index_options: IndexOptions,
) -> quarry_common::Result<Vec<PostingSummary>> {
    let mut postings = Vec::new();
    if index_options.has_positions() {
        if let Some(mut docs) = terms_enum.docs_and_positions(None)? {
            while docs.next_doc()? != NO_MORE_DOCS {
                let positions = (0..docs.freq())
                    .map(|_| docs.next_position())
                    .collect::<quarry_common::Result<Vec<_>>>()?;
                postings.push(PostingSummary {
                    doc: docs.doc_id(),
                    freq: docs.freq(),
                    positions,
                });
            }
            return Ok(postings);
        }
    }
    let mut docs = terms_enum.docs(None)?;
    while docs.next_doc()? != NO_MORE_DOCS {
        postings.push(PostingSummary {
            doc: docs.doc_id(),
            freq: docs.freq(),
            positions: Vec::new(),
        });
    }
    Ok(postings)
}
