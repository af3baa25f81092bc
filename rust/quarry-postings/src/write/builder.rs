use std::collections::{BTreeMap, HashMap};

use quarry_common::{Result, error::Error};
use quarry_io::SealingWrite;

use crate::{
    config::PostingsConfig,
    format::{FieldInfo, TermStats},
};

use super::segment::{SegmentFiles, SegmentSummary, SegmentWriter};

/// One occurrence of a term in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: Vec<u8>,
    pub position: u32,
    pub payload: Option<Vec<u8>>,
    pub offsets: Option<(u32, u32)>,
}

impl Token {
    pub fn new(term: impl Into<Vec<u8>>, position: u32) -> Token {
        Token {
            term: term.into(),
            position,
            payload: None,
            offsets: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Token {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_offsets(mut self, start: u32, end: u32) -> Token {
        self.offsets = Some((start, end));
        self
    }
}

#[derive(Debug, Clone)]
struct Occurrence {
    position: u32,
    payload: Option<Vec<u8>>,
    start_offset: u32,
    end_offset: u32,
}

struct FieldBuffer {
    info: FieldInfo,
    terms: HashMap<Vec<u8>, BTreeMap<u32, Vec<Occurrence>>>,
}

/// Collects tokens in memory and writes them as one segment.
///
/// Unlike [`SegmentWriter`] the input may arrive in any order: terms are sorted
/// by the field's comparator and postings by document and position on
/// [`SegmentBuilder::finish`].
pub struct SegmentBuilder {
    config: PostingsConfig,
    fields: BTreeMap<String, FieldBuffer>,
    max_doc: u32,
}

impl SegmentBuilder {
    pub fn new(config: PostingsConfig) -> SegmentBuilder {
        SegmentBuilder {
            config,
            fields: BTreeMap::new(),
            max_doc: 0,
        }
    }

    /// Declares a field. Declaring the same field twice is allowed only with
    /// identical options.
    pub fn define_field(&mut self, info: FieldInfo) -> Result<&mut Self> {
        info.validate()?;
        match self.fields.get(&info.name) {
            Some(existing) if existing.info != info => {
                return Err(Error::invalid_arg(
                    "info",
                    format!(
                        "field {} redefined with different options ({:?} vs {:?})",
                        info.name, existing.info, info
                    ),
                ));
            }
            Some(_) => {}
            None => {
                if let Some(other) = self.fields.values().find(|f| f.info.number == info.number) {
                    return Err(Error::invalid_arg(
                        "info",
                        format!(
                            "field number {} of {} is already used by {}",
                            info.number, info.name, other.info.name
                        ),
                    ));
                }
                self.fields.insert(
                    info.name.clone(),
                    FieldBuffer {
                        info,
                        terms: HashMap::new(),
                    },
                );
            }
        }
        Ok(self)
    }

    /// Raises the document count of the segment, e.g. to account for trailing
    /// documents without tokens.
    pub fn set_max_doc(&mut self, max_doc: u32) -> Result<()> {
        if max_doc < self.max_doc {
            return Err(Error::invalid_arg(
                "max_doc",
                format!("{max_doc} is below the highest document seen ({})", self.max_doc),
            ));
        }
        self.max_doc = max_doc;
        Ok(())
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn add_token(&mut self, doc: u32, field: &str, token: Token) -> Result<()> {
        let Some(buffer) = self.fields.get_mut(field) else {
            return Err(Error::invalid_arg(
                "field",
                format!("field {field} is not defined"),
            ));
        };
        if doc >= crate::NO_MORE_DOCS {
            return Err(Error::invalid_arg("doc", format!("doc id {doc} is too large")));
        }
        let info = &buffer.info;
        if token.payload.as_ref().is_some_and(|p| !p.is_empty()) && !info.store_payloads {
            return Err(Error::invalid_arg(
                "token",
                format!("field {field} does not store payloads"),
            ));
        }
        let (start_offset, end_offset) = match token.offsets {
            Some((start, end)) if end < start => {
                return Err(Error::invalid_arg(
                    "token",
                    format!("end offset {end} precedes start offset {start}"),
                ));
            }
            Some(offsets) => offsets,
            None if info.has_offsets() => {
                return Err(Error::invalid_arg(
                    "token",
                    format!("field {field} indexes offsets but the token has none"),
                ));
            }
            None => (0, 0),
        };
        buffer
            .terms
            .entry(token.term)
            .or_default()
            .entry(doc)
            .or_default()
            .push(Occurrence {
                position: token.position,
                payload: token.payload,
                start_offset,
                end_offset,
            });
        self.max_doc = self.max_doc.max(doc + 1);
        Ok(())
    }

    /// Writes the collected postings to `files`.
    pub fn finish(self, files: SegmentFiles<Box<dyn SealingWrite>>) -> Result<SegmentSummary> {
        let mut writer = SegmentWriter::new(files, self.max_doc, &self.config)?;
        let mut fields: Vec<FieldBuffer> = self.fields.into_values().collect();
        fields.sort_by_key(|field| field.info.number);
        for field in fields {
            write_field(&mut writer, field)?;
        }
        writer.finish()
    }
}

fn write_field(writer: &mut SegmentWriter, field: FieldBuffer) -> Result<()> {
    let info = field.info;
    writer.start_field(&info)?;
    let mut terms: Vec<_> = field.terms.into_iter().collect();
    terms.sort_by(|(a, _), (b, _)| info.comparator.compare(a, b));
    for (term, docs) in terms {
        writer.start_term(&term)?;
        let doc_freq = docs.len() as u32;
        let mut total_term_freq = 0i64;
        for (doc, mut occurrences) in docs {
            let freq = occurrences.len() as u32;
            total_term_freq += freq as i64;
            writer.start_doc(doc, freq)?;
            if info.has_positions() {
                occurrences.sort_by_key(|o| (o.position, o.start_offset));
                for o in &occurrences {
                    writer.add_position(
                        o.position,
                        o.payload.as_deref(),
                        o.start_offset,
                        o.end_offset,
                    )?;
                }
            }
            writer.finish_doc()?;
        }
        if !info.has_freqs() {
            total_term_freq = -1;
        }
        writer.finish_term(TermStats::new(doc_freq, total_term_freq))?;
    }
    writer.finish_field()
}
