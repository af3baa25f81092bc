mod common;

use common::{drain_docs, open_segment};
use quarry_common::error::ErrorKind;
use quarry_postings::{
    CompiledAutomaton, SeekStatus, TermComparator, Terms, TermsEnum,
    config::{PostingsConfig, ReaderConfig},
    format::{FieldInfo, IndexOptions},
    write::{MemorySegment, SegmentBuilder, Token},
};

const WORDS: &[&str] = &[
    "apple", "apricot", "banana", "band", "bandana", "cat", "catalog", "dig", "dog", "door",
    "dot", "zebra",
];

/// One document per word; word `i` appears in documents `i` and `i + 1`.
fn word_segment() -> MemorySegment {
    let mut builder = SegmentBuilder::new(PostingsConfig::default().with_terms_block_size(4));
    builder
        .define_field(FieldInfo::new(
            "body",
            0,
            IndexOptions::DocsAndFreqsAndPositions,
        ))
        .unwrap();
    for (i, word) in WORDS.iter().enumerate() {
        for doc in [i as u32, i as u32 + 1] {
            builder
                .add_token(doc, "body", Token::new(word.as_bytes(), 0))
                .unwrap();
        }
    }
    let segment = MemorySegment::new();
    builder.finish(segment.sinks()).expect("finish segment");
    segment
}

fn collect_terms(terms: &mut dyn TermsEnum) -> Vec<String> {
    let mut out = Vec::new();
    while terms.next().unwrap() {
        out.push(String::from_utf8(terms.term().to_vec()).unwrap());
    }
    out
}

/// Iteration visits all terms in order with consecutive ordinals, across
/// several blocks.
#[test]
fn test_iterate_terms_with_ords() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").expect("body is indexed");
    assert_eq!(terms.size(), WORDS.len() as i64);
    assert_eq!(terms.num_blocks(), 3);
    assert_eq!(terms.sum_doc_freq(), 2 * WORDS.len() as i64);
    assert_eq!(terms.sum_total_term_freq(), 2 * WORDS.len() as i64);
    assert_eq!(terms.doc_count(), WORDS.len() as i64 + 1);

    let mut terms_enum = terms.iterator().unwrap();
    for (ord, word) in WORDS.iter().enumerate() {
        assert!(terms_enum.next().unwrap());
        assert_eq!(terms_enum.term(), word.as_bytes());
        assert_eq!(terms_enum.ord().unwrap(), ord as u64);
        assert_eq!(terms_enum.doc_freq(), 2);
    }
    assert!(!terms_enum.next().unwrap());
}

/// `seek_ceil` reports exact hits, the next greater term, or the end.
#[test]
fn test_seek_ceil() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let mut terms_enum = reader.terms("body").unwrap().iterator().unwrap();

    assert_eq!(terms_enum.seek_ceil(b"ban").unwrap(), SeekStatus::NotFound);
    assert_eq!(terms_enum.term(), b"banana");
    assert_eq!(terms_enum.seek_ceil(b"band").unwrap(), SeekStatus::Found);
    assert!(terms_enum.next().unwrap());
    assert_eq!(terms_enum.term(), b"bandana");

    assert_eq!(terms_enum.seek_ceil(b"").unwrap(), SeekStatus::NotFound);
    assert_eq!(terms_enum.term(), b"apple");
    assert_eq!(terms_enum.seek_ceil(b"catalogue").unwrap(), SeekStatus::NotFound);
    assert_eq!(terms_enum.term(), b"dig");
    assert_eq!(terms_enum.seek_ceil(b"zz").unwrap(), SeekStatus::End);

    assert!(terms_enum.seek_exact(b"cat").unwrap());
    assert_eq!(terms_enum.ord().unwrap(), 5);
    let mut docs = terms_enum.docs(None).unwrap();
    assert_eq!(drain_docs(docs.as_mut()), vec![(5, 1), (6, 1)]);
    assert!(!terms_enum.seek_exact(b"cow").unwrap());
}

/// A term state captured earlier positions a fresh enum without a lookup, and
/// iteration continues from that term.
#[test]
fn test_seek_exact_with_state() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").unwrap();

    let mut first = terms.segment_terms_enum();
    assert!(first.seek_exact(b"dog").unwrap());
    let state = first.term_state();

    let mut second = terms.segment_terms_enum();
    second.seek_exact_with_state(b"dog", &state);
    assert_eq!(second.term(), b"dog");
    assert_eq!(second.doc_freq(), 2);
    assert_eq!(second.ord().unwrap(), 8);
    let mut docs = second.segment_docs(None, None).unwrap();
    assert_eq!(drain_docs(&mut docs), vec![(8, 1), (9, 1)]);
    assert!(second.next().unwrap());
    assert_eq!(second.term(), b"door");
}

/// Unpositioned enums refuse to open postings.
#[test]
fn test_unpositioned_enum_errors() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let mut terms_enum = reader.terms("body").unwrap().iterator().unwrap();
    let err = terms_enum.docs(None).err().expect("docs before positioning");
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
}

#[test]
fn test_intersect_prefix() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").unwrap();
    let mut matches = terms
        .intersect(&CompiledAutomaton::prefix("ban"), None)
        .unwrap();
    assert_eq!(
        collect_terms(matches.as_mut()),
        vec!["banana", "band", "bandana"]
    );
    let mut matches = terms
        .intersect(&CompiledAutomaton::prefix("ban"), Some(b"band"))
        .unwrap();
    assert_eq!(collect_terms(matches.as_mut()), vec!["bandana"]);
    let mut matches = terms
        .intersect(&CompiledAutomaton::prefix("q"), None)
        .unwrap();
    assert!(collect_terms(matches.as_mut()).is_empty());
}

#[test]
fn test_intersect_fuzzy() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").unwrap();
    let automaton = CompiledAutomaton::fuzzy("dog", 1, false).unwrap();
    let mut matches = terms.intersect(&automaton, None).unwrap();
    assert_eq!(collect_terms(matches.as_mut()), vec!["dig", "dog", "dot"]);

    let mut matches = terms.intersect(&automaton, Some(b"dog")).unwrap();
    assert!(matches.next().unwrap());
    assert_eq!(matches.term(), b"dot");
    assert_eq!(matches.ord().unwrap(), 10);
    let mut docs = matches.docs(None).unwrap();
    assert_eq!(drain_docs(docs.as_mut()), vec![(10, 1), (11, 1)]);
}

#[test]
fn test_intersect_range() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").unwrap();

    let range = CompiledAutomaton::range(Some(b"band"), Some(b"cat"), true, false);
    let mut matches = terms.intersect(&range, None).unwrap();
    assert_eq!(collect_terms(matches.as_mut()), vec!["band", "bandana"]);

    let range = CompiledAutomaton::range(Some(b"dog"), None, false, false);
    let mut matches = terms.intersect(&range, None).unwrap();
    assert_eq!(collect_terms(matches.as_mut()), vec!["door", "dot", "zebra"]);

    let mut matches = terms.intersect(&CompiledAutomaton::All, Some(b"zebra")).unwrap();
    assert!(!matches.next().unwrap());
}

/// Automaton enums cannot seek.
#[test]
fn test_intersect_enum_rejects_seek() {
    let segment = word_segment();
    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("body").unwrap();
    let mut matches = terms
        .intersect(&CompiledAutomaton::prefix("d"), None)
        .unwrap();
    let err = matches.seek_ceil(b"dog").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
}

/// Under the UTF-16 comparator supplementary characters sort before the end
/// of the basic plane.
#[test]
fn test_utf8_as_utf16_order() {
    let high = "\u{FFFD}";
    let supplementary = "\u{10000}";
    let mut builder = SegmentBuilder::new(PostingsConfig::default());
    builder
        .define_field(
            FieldInfo::new("title", 0, IndexOptions::DocsAndFreqs)
                .with_comparator(TermComparator::Utf8AsUtf16),
        )
        .unwrap();
    for (doc, word) in ["a", high, supplementary].iter().enumerate() {
        builder
            .add_token(doc as u32, "title", Token::new(word.as_bytes(), 0))
            .unwrap();
    }
    let segment = MemorySegment::new();
    builder.finish(segment.sinks()).unwrap();

    let reader = open_segment(&segment, &ReaderConfig::default());
    let terms = reader.terms("title").unwrap();
    assert_eq!(terms.comparator(), TermComparator::Utf8AsUtf16);
    let mut terms_enum = terms.iterator().unwrap();
    assert_eq!(collect_terms(terms_enum.as_mut()), vec!["a", supplementary, high]);

    assert_eq!(
        terms_enum.seek_ceil(supplementary.as_bytes()).unwrap(),
        SeekStatus::Found
    );
    assert_eq!(terms_enum.ord().unwrap(), 1);
    assert_eq!(terms_enum.seek_ceil(b"b").unwrap(), SeekStatus::NotFound);
    assert_eq!(terms_enum.term(), supplementary.as_bytes());
}

/// Token and field definitions are validated by the builder.
#[test]
fn test_builder_validation() {
    let mut builder = SegmentBuilder::new(PostingsConfig::default());
    builder
        .define_field(FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions))
        .unwrap();
    builder
        .define_field(FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions))
        .expect("identical redefinition");

    let invalid = |result: quarry_common::Result<()>| {
        let err = result.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }), "{err}");
    };
    invalid(
        builder
            .define_field(FieldInfo::new("body", 0, IndexOptions::Docs))
            .map(|_| ()),
    );
    invalid(
        builder
            .define_field(FieldInfo::new("title", 0, IndexOptions::Docs))
            .map(|_| ()),
    );
    invalid(builder.add_token(0, "missing", Token::new("x", 0)));
    invalid(builder.add_token(0, "body", Token::new("x", 0).with_payload("p")));
    invalid(builder.add_token(0, "body", Token::new("x", 0).with_offsets(5, 2)));

    builder
        .define_field(FieldInfo::new(
            "span",
            1,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
        ))
        .unwrap();
    invalid(builder.add_token(0, "span", Token::new("x", 0)));
}

/// Fields that received no tokens are absent from the segment.
#[test]
fn test_empty_field_not_written() {
    let mut builder = SegmentBuilder::new(PostingsConfig::default());
    builder
        .define_field(FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs))
        .unwrap()
        .define_field(FieldInfo::new("empty", 1, IndexOptions::DocsAndFreqs))
        .unwrap();
    builder.add_token(0, "body", Token::new("word", 0)).unwrap();
    builder.add_token(2, "body", Token::new("word", 1)).unwrap();
    builder.add_token(2, "body", Token::new("word", 4)).unwrap();
    let segment = MemorySegment::new();
    let summary = builder.finish(segment.sinks()).unwrap();
    assert_eq!(summary.max_doc, 3);
    assert_eq!(summary.num_fields, 1);
    assert_eq!(summary.num_terms, 1);
    assert_eq!(summary.num_postings, 2);

    let reader = open_segment(&segment, &ReaderConfig::default());
    assert_eq!(reader.fields().collect::<Vec<_>>(), vec!["body"]);
    assert!(reader.terms("empty").is_none());
    let mut terms_enum = reader.terms("body").unwrap().iterator().unwrap();
    assert!(terms_enum.seek_exact(b"word").unwrap());
    assert_eq!(terms_enum.total_term_freq(), 3);
    let mut docs = terms_enum.docs(None).unwrap();
    assert_eq!(drain_docs(docs.as_mut()), vec![(0, 1), (2, 2)]);
}
