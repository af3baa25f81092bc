mod common;

use std::sync::Arc;

use common::{drain_docs, open_segment};
use quarry_common::{Result, error::ErrorKind};
use quarry_postings::{
    CompiledAutomaton, DocIdSetIterator, DocsAndPositionsEnum, FixedBitSet, LiveDocs,
    NO_MORE_DOCS, SeekStatus, TermComparator, Terms, TermsEnum,
    config::{PostingsConfig, ReaderConfig},
    format::{FieldInfo, IndexOptions},
    multi::{MultiFields, MultiTerms, ReaderSlice},
    read::{FieldReader, SegmentReader},
    write::{MemorySegment, SegmentBuilder, Token},
};

/// Builds a segment of `max_doc` documents. Each token is `(doc, field, term)`
/// and takes the next position within its document.
fn segment(max_doc: u32, fields: &[FieldInfo], tokens: &[(u32, &str, &str)]) -> SegmentReader {
    let mut builder = SegmentBuilder::new(PostingsConfig::default());
    for info in fields {
        builder.define_field(info.clone()).unwrap();
    }
    for (i, &(doc, field, term)) in tokens.iter().enumerate() {
        let mut token = Token::new(term, i as u32);
        let info = fields.iter().find(|info| info.name == field).unwrap();
        if info.store_payloads {
            token = token.with_payload(format!("p{i}"));
        }
        if info.has_offsets() {
            token = token.with_offsets(i as u32, i as u32 + 1);
        }
        builder.add_token(doc, field, token).unwrap();
    }
    builder.set_max_doc(max_doc).unwrap();
    let files = MemorySegment::new();
    builder.finish(files.sinks()).expect("finish segment");
    open_segment(&files, &ReaderConfig::default())
}

fn animal() -> FieldInfo {
    FieldInfo::new("animal", 0, IndexOptions::DocsAndFreqsAndPositions)
}

/// Three segments of 5, 3 and 7 documents; "cat" occurs in the first and the
/// last one.
fn cat_segments() -> Vec<SegmentReader> {
    vec![
        segment(
            5,
            &[animal()],
            &[(1, "animal", "cat"), (2, "animal", "dog"), (3, "animal", "cat")],
        ),
        segment(3, &[animal()], &[(0, "animal", "dog"), (2, "animal", "eel")]),
        segment(
            7,
            &[animal()],
            &[
                (0, "animal", "cat"),
                (2, "animal", "cat"),
                (4, "animal", "cat"),
                (6, "animal", "cat"),
                (6, "animal", "ant"),
            ],
        ),
    ]
}

fn no_deletions(readers: Vec<SegmentReader>) -> MultiFields {
    MultiFields::new(
        readers
            .into_iter()
            .map(|reader| (Arc::new(reader), None))
            .collect(),
    )
    .expect("merged view")
}

fn collect_terms(terms: &mut dyn TermsEnum) -> Vec<(String, u32)> {
    let mut out = Vec::new();
    while terms.next().unwrap() {
        out.push((
            String::from_utf8(terms.term().to_vec()).unwrap(),
            terms.doc_freq(),
        ));
    }
    out
}

/// Postings of a term spread over several segments come back with global
/// document ids in ascending order.
#[test]
fn test_term_across_segments() {
    let fields = no_deletions(cat_segments());
    assert_eq!(fields.max_doc(), 15);
    assert_eq!(fields.num_segments(), 3);
    assert_eq!(
        fields.slices(),
        &[
            ReaderSlice::new(0, 5, 0),
            ReaderSlice::new(5, 3, 1),
            ReaderSlice::new(8, 7, 2)
        ]
    );
    assert_eq!(fields.fields(), vec!["animal"]);

    let terms = fields.terms("animal").unwrap().expect("animal is indexed");
    assert_eq!(terms.size(), -1);
    assert_eq!(terms.sum_doc_freq(), 10);
    assert_eq!(terms.doc_count(), 9);

    let mut terms_enum = terms.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"cat").unwrap());
    assert_eq!(terms_enum.doc_freq(), 6);
    assert_eq!(terms_enum.total_term_freq(), 6);
    let mut docs = terms_enum.docs(None).unwrap();
    let docs = drain_docs(docs.as_mut());
    let ids: Vec<u32> = docs.iter().map(|&(doc, _)| doc).collect();
    assert_eq!(ids, vec![1, 3, 8, 10, 12, 14]);
    assert!(ids.iter().all(|doc| !(5..8).contains(doc)));

    let mut docs = terms_enum.docs(None).unwrap();
    assert_eq!(docs.advance(4).unwrap(), 8);
    assert_eq!(docs.advance(11).unwrap(), 12);
    assert_eq!(docs.advance(15).unwrap(), NO_MORE_DOCS);
}

/// The merged enum visits the union of the terms once each, summing their
/// document frequencies.
#[test]
fn test_merged_terms_iteration() {
    let fields = no_deletions(cat_segments());
    let terms = fields.terms("animal").unwrap().unwrap();
    let mut terms_enum = terms.iterator().unwrap();
    assert_eq!(
        collect_terms(terms_enum.as_mut()),
        vec![
            ("ant".to_string(), 1),
            ("cat".to_string(), 6),
            ("dog".to_string(), 2),
            ("eel".to_string(), 1)
        ]
    );
    assert!(!terms_enum.next().unwrap());

    assert_eq!(terms_enum.seek_ceil(b"b").unwrap(), SeekStatus::NotFound);
    assert_eq!(terms_enum.term(), b"cat");
    assert!(terms_enum.next().unwrap());
    assert_eq!(terms_enum.term(), b"dog");
    assert_eq!(terms_enum.seek_ceil(b"eel").unwrap(), SeekStatus::Found);
    assert_eq!(terms_enum.seek_ceil(b"fox").unwrap(), SeekStatus::End);

    let err = terms_enum.ord().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
}

/// The merged enum reports which segments hold the current term.
#[test]
fn test_matching_subs() {
    let readers = cat_segments();
    let mut subs: Vec<Arc<dyn Terms>> = Vec::new();
    let mut slices = Vec::new();
    let mut start = 0;
    for (index, reader) in readers.iter().enumerate() {
        subs.push(Arc::new(reader.terms("animal").unwrap()));
        slices.push(ReaderSlice::new(start, reader.max_doc(), index));
        start += reader.max_doc();
    }
    let terms = MultiTerms::new(subs, slices).unwrap();
    let mut terms_enum = terms.multi_iterator().unwrap();
    assert!(terms_enum.seek_exact(b"dog").unwrap());
    assert_eq!(terms_enum.num_matching_subs(), 2);
    assert_eq!(
        terms_enum
            .matching_subs()
            .map(|slice| slice.reader_index)
            .collect::<Vec<_>>(),
        vec![0, 1]
    );
    let mut docs = terms_enum.docs(None).unwrap();
    assert_eq!(drain_docs(docs.as_mut()), vec![(2, 1), (5, 1)]);
}

/// Deletions of every segment are honored through the global live docs.
#[test]
fn test_live_docs_across_segments() {
    let mut first = FixedBitSet::with_all_set(5);
    first.clear(1);
    let mut third = FixedBitSet::with_all_set(7);
    third.clear(2);
    let first: Arc<dyn LiveDocs> = Arc::new(first);
    let third: Arc<dyn LiveDocs> = Arc::new(third);
    let live = vec![Some(first), None, Some(third)];
    let fields = MultiFields::new(
        cat_segments()
            .into_iter()
            .map(Arc::new)
            .zip(live)
            .collect(),
    )
    .unwrap();

    let live_docs = fields.live_docs().expect("segments have deletions");
    assert_eq!(live_docs.len(), 15);
    assert!(!live_docs.get(1));
    assert!(live_docs.get(6));
    assert!(!live_docs.get(10));

    let terms = fields.terms("animal").unwrap().unwrap();
    let mut terms_enum = terms.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"cat").unwrap());
    let mut docs = terms_enum.docs(Some(live_docs)).unwrap();
    assert_eq!(
        drain_docs(docs.as_mut()),
        vec![(3, 1), (8, 1), (12, 1), (14, 1)]
    );
}

/// Live docs shorter than their segment are rejected.
#[test]
fn test_short_live_docs_rejected() {
    let readers = cat_segments();
    let live: Arc<dyn LiveDocs> = Arc::new(FixedBitSet::with_all_set(4));
    let err = MultiFields::new(
        readers
            .into_iter()
            .map(|reader| (Arc::new(reader), Some(live.clone())))
            .collect(),
    )
    .err()
    .expect("live docs cover too few documents");
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

/// Capability flags require every segment; payloads require positions
/// everywhere and payloads somewhere. Unknown statistics poison the sums.
#[test]
fn test_flags_and_statistics() {
    let with_payloads = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions)
        .with_payloads();
    let with_offsets = FieldInfo::new(
        "body",
        0,
        IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
    );
    let docs_only = FieldInfo::new("body", 0, IndexOptions::Docs);

    let positional = no_deletions(vec![
        segment(2, &[with_payloads.clone()], &[(0, "body", "a")]),
        segment(2, &[FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions)], &[(1, "body", "a")]),
    ]);
    let terms = positional.terms("body").unwrap().unwrap();
    assert!(terms.has_freqs());
    assert!(terms.has_positions());
    assert!(terms.has_payloads());
    assert!(!terms.has_offsets());
    assert_eq!(terms.sum_total_term_freq(), 2);

    let mut terms_enum = terms.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"a").unwrap());
    let mut positions = terms_enum.docs_and_positions(None).unwrap().unwrap();
    assert_eq!(positions.next_doc().unwrap(), 0);
    assert_eq!(positions.next_position().unwrap(), 0);
    assert_eq!(positions.payload().unwrap().as_deref(), Some(&b"p0"[..]));
    assert_eq!(positions.next_doc().unwrap(), 3);
    assert_eq!(positions.next_position().unwrap(), 0);
    assert_eq!(positions.payload().unwrap(), None);
    assert_eq!(positions.start_offset(), -1);

    let mixed = no_deletions(vec![
        segment(2, &[with_offsets], &[(0, "body", "a")]),
        segment(2, &[docs_only], &[(1, "body", "a")]),
    ]);
    let terms = mixed.terms("body").unwrap().unwrap();
    assert!(!terms.has_freqs());
    assert!(!terms.has_positions());
    assert!(!terms.has_payloads());
    assert!(!terms.has_offsets());
    assert_eq!(terms.sum_total_term_freq(), -1);
    assert_eq!(terms.sum_doc_freq(), 2);

    let mut terms_enum = terms.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"a").unwrap());
    assert_eq!(terms_enum.total_term_freq(), -1);
    assert!(terms_enum.docs_and_positions(None).unwrap().is_none());
}

/// Terms of a segment whose document statistics are not tracked.
struct UntrackedDocStats(FieldReader);

impl Terms for UntrackedDocStats {
    fn iterator(&self) -> Result<Box<dyn TermsEnum>> {
        self.0.iterator()
    }

    fn intersect(
        &self,
        automaton: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Box<dyn TermsEnum>> {
        self.0.intersect(automaton, start_term)
    }

    fn comparator(&self) -> TermComparator {
        self.0.comparator()
    }

    fn size(&self) -> i64 {
        self.0.size()
    }

    fn sum_total_term_freq(&self) -> i64 {
        self.0.sum_total_term_freq()
    }

    fn sum_doc_freq(&self) -> i64 {
        -1
    }

    fn doc_count(&self) -> i64 {
        -1
    }

    fn has_freqs(&self) -> bool {
        self.0.has_freqs()
    }

    fn has_offsets(&self) -> bool {
        self.0.has_offsets()
    }

    fn has_positions(&self) -> bool {
        self.0.has_positions()
    }

    fn has_payloads(&self) -> bool {
        self.0.has_payloads()
    }
}

/// One segment without document statistics makes the merged `sum_doc_freq` and
/// `doc_count` unknown; the other sums stay exact.
#[test]
fn test_unknown_doc_statistics() {
    let first = segment(2, &[animal()], &[(0, "animal", "cat"), (1, "animal", "dog")]);
    let second = segment(3, &[animal()], &[(0, "animal", "cat"), (2, "animal", "cat")]);
    let slices = vec![ReaderSlice::new(0, 2, 0), ReaderSlice::new(2, 3, 1)];
    let first_terms: Arc<dyn Terms> = Arc::new(first.terms("animal").unwrap());
    let second_terms: Arc<dyn Terms> = Arc::new(second.terms("animal").unwrap());
    let untracked_terms: Arc<dyn Terms> =
        Arc::new(UntrackedDocStats(second.terms("animal").unwrap()));

    let tracked = MultiTerms::new(vec![first_terms.clone(), second_terms], slices.clone()).unwrap();
    assert_eq!(tracked.sum_doc_freq(), 4);
    assert_eq!(tracked.doc_count(), 4);

    let untracked = MultiTerms::new(vec![first_terms, untracked_terms], slices).unwrap();
    assert_eq!(untracked.sum_doc_freq(), -1);
    assert_eq!(untracked.doc_count(), -1);
    assert_eq!(untracked.sum_total_term_freq(), tracked.sum_total_term_freq());

    let mut terms_enum = untracked.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"cat").unwrap());
    assert_eq!(terms_enum.doc_freq(), 3);
}

/// A field held only by the first segment is served by that segment directly;
/// held only by a later one, its document ids are still shifted.
#[test]
fn test_single_segment_field() {
    let title = FieldInfo::new("title", 1, IndexOptions::DocsAndFreqs);
    let fields = no_deletions(vec![
        segment(3, &[animal(), title.clone()], &[(0, "animal", "cat"), (2, "title", "hello")]),
        segment(4, &[animal(), FieldInfo::new("tag", 2, IndexOptions::Docs)], &[(1, "tag", "x")]),
    ]);
    assert_eq!(fields.fields(), vec!["animal", "tag", "title"]);

    let title = fields.terms("title").unwrap().unwrap();
    assert_eq!(title.size(), 1);

    let tag = fields.terms("tag").unwrap().unwrap();
    assert_eq!(tag.size(), -1);
    let mut terms_enum = tag.iterator().unwrap();
    assert!(terms_enum.seek_exact(b"x").unwrap());
    let mut docs = terms_enum.docs(None).unwrap();
    assert_eq!(docs.next_doc().unwrap(), 4);
    assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);

    assert!(fields.terms("missing").unwrap().is_none());
}

/// Sub terms must agree on their comparator and be paired with slices.
#[test]
fn test_multi_terms_validation() {
    let binary = segment(1, &[animal()], &[(0, "animal", "cat")]);
    let utf16 = segment(
        1,
        &[animal().with_comparator(TermComparator::Utf8AsUtf16)],
        &[(0, "animal", "cat")],
    );
    let sub = |reader: &SegmentReader| -> Arc<dyn Terms> { Arc::new(reader.terms("animal").unwrap()) };

    let err = MultiTerms::new(
        vec![sub(&binary), sub(&utf16)],
        vec![ReaderSlice::new(0, 1, 0), ReaderSlice::new(1, 1, 1)],
    )
    .err()
    .expect("comparators differ");
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));

    let err = MultiTerms::new(vec![], vec![]).err().expect("no subs");
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

    let err = MultiTerms::new(vec![sub(&binary)], vec![])
        .err()
        .expect("missing slice");
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}
