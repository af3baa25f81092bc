#![allow(dead_code)]

use quarry_postings::{
    DocsAndPositionsEnum, DocsEnum, NO_MORE_DOCS,
    config::{PostingsConfig, ReaderConfig},
    format::{FieldInfo, TermStats},
    read::SegmentReader,
    write::{MemorySegment, SegmentWriter},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub position: u32,
    pub payload: Option<Vec<u8>>,
    pub start_offset: u32,
    pub end_offset: u32,
}

/// Postings of one document. Fields without positions only use the number of
/// occurrences as the term frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc: u32,
    pub occurrences: Vec<Occurrence>,
}

impl Posting {
    pub fn freq(&self) -> u32 {
        self.occurrences.len().max(1) as u32
    }
}

/// A field with its terms in ascending order.
pub struct FieldData {
    pub info: FieldInfo,
    pub terms: Vec<(Vec<u8>, Vec<Posting>)>,
}

pub fn small_skip_config() -> PostingsConfig {
    PostingsConfig::default()
        .with_skip_interval(4)
        .with_max_skip_levels(3)
        .with_skip_minimum(4)
        .with_terms_block_size(4)
}

pub fn write_segment(config: &PostingsConfig, max_doc: u32, fields: &[FieldData]) -> MemorySegment {
    let segment = MemorySegment::new();
    let mut sinks = segment.sinks();
    if !fields.iter().any(|field| field.info.has_positions()) {
        sinks.prx = None;
    }
    let mut writer = SegmentWriter::new(sinks, max_doc, config).expect("create segment writer");
    for field in fields {
        writer.start_field(&field.info).unwrap();
        for (term, postings) in &field.terms {
            writer.start_term(term).unwrap();
            let mut total_term_freq = 0i64;
            for posting in postings {
                total_term_freq += posting.freq() as i64;
                writer.start_doc(posting.doc, posting.freq()).unwrap();
                if field.info.has_positions() {
                    for o in &posting.occurrences {
                        writer
                            .add_position(
                                o.position,
                                o.payload.as_deref(),
                                o.start_offset,
                                o.end_offset,
                            )
                            .unwrap();
                    }
                }
                writer.finish_doc().unwrap();
            }
            if !field.info.has_freqs() {
                total_term_freq = -1;
            }
            writer
                .finish_term(TermStats::new(postings.len() as u32, total_term_freq))
                .unwrap();
        }
        writer.finish_field().unwrap();
    }
    writer.finish().expect("finish segment");
    segment
}

pub fn open_segment(segment: &MemorySegment, config: &ReaderConfig) -> SegmentReader {
    SegmentReader::open(segment.sources(), config).expect("open segment")
}

/// Random postings with an average gap of `gap` between documents.
pub fn random_postings(
    rng: &mut fastrand::Rng,
    info: &FieldInfo,
    max_doc: u32,
    gap: u32,
) -> Vec<Posting> {
    let mut postings = Vec::new();
    let mut doc = rng.u32(0..gap);
    while doc < max_doc {
        let freq = if info.has_freqs() { rng.u32(1..5) } else { 1 };
        let mut position = 0;
        let mut offset = 0;
        let mut occurrences = Vec::with_capacity(freq as usize);
        for _ in 0..freq {
            position += rng.u32(0..4);
            offset += rng.u32(0..6);
            let len = rng.u32(0..5);
            let payload = if info.store_payloads && rng.bool() {
                let len = rng.usize(0..4);
                Some((0..len).map(|_| rng.u8(..)).collect())
            } else {
                None
            };
            occurrences.push(Occurrence {
                position,
                payload,
                start_offset: offset,
                end_offset: offset + len,
            });
        }
        postings.push(Posting { doc, occurrences });
        doc += rng.u32(1..2 * gap);
    }
    postings
}

pub fn drain_docs(docs: &mut dyn DocsEnum) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    loop {
        let doc = docs.next_doc().unwrap();
        if doc == NO_MORE_DOCS {
            return out;
        }
        out.push((doc, docs.freq()));
    }
}

/// Reads the positions of the current document.
pub fn read_occurrences(
    positions: &mut dyn DocsAndPositionsEnum,
    info: &FieldInfo,
) -> Vec<Occurrence> {
    (0..positions.freq())
        .map(|_| {
            let position = positions.next_position().unwrap();
            let payload = positions.payload().unwrap().map(|p| p.to_vec());
            let (start_offset, end_offset) = if info.has_offsets() {
                (
                    positions.start_offset() as u32,
                    positions.end_offset() as u32,
                )
            } else {
                assert_eq!(positions.start_offset(), -1);
                assert_eq!(positions.end_offset(), -1);
                (0, 0)
            };
            Occurrence {
                position,
                payload,
                start_offset,
                end_offset,
            }
        })
        .collect()
}

/// What a reader is expected to return for an occurrence that was written.
pub fn expected_occurrence(o: &Occurrence, info: &FieldInfo) -> Occurrence {
    Occurrence {
        position: o.position,
        payload: o.payload.clone().filter(|p| !p.is_empty()),
        start_offset: if info.has_offsets() { o.start_offset } else { 0 },
        end_offset: if info.has_offsets() { o.end_offset } else { 0 },
    }
}
