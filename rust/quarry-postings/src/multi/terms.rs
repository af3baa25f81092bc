use std::sync::Arc;

use quarry_common::{Result, error::Error};

use crate::{
    automaton::CompiledAutomaton,
    comparator::TermComparator,
    enums::{Terms, TermsEnum},
};

use super::{MultiTermsEnum, ReaderSlice};

/// The terms of one field across several segments.
///
/// Capability flags hold only if every segment supports them, except
/// payloads, which are reported when positions are available everywhere and
/// some segment stores payloads. Aggregate statistics are summed; a statistic
/// unknown in one segment is unknown for the whole.
pub struct MultiTerms {
    subs: Vec<Arc<dyn Terms>>,
    slices: Vec<ReaderSlice>,
    comparator: TermComparator,
    has_freqs: bool,
    has_offsets: bool,
    has_positions: bool,
    has_payloads: bool,
}

impl MultiTerms {
    pub fn new(subs: Vec<Arc<dyn Terms>>, slices: Vec<ReaderSlice>) -> Result<MultiTerms> {
        if subs.is_empty() {
            return Err(Error::invalid_arg("subs", "at least one sub is required"));
        }
        if subs.len() != slices.len() {
            return Err(Error::invalid_arg(
                "slices",
                format!("{} subs but {} slices", subs.len(), slices.len()),
            ));
        }
        let comparator = subs[0].comparator();
        if let Some(other) = subs.iter().find(|sub| sub.comparator() != comparator) {
            return Err(Error::invalid_operation(format!(
                "sub term comparators differ: {} vs {}",
                comparator.name(),
                other.comparator().name()
            )));
        }
        let has_positions = subs.iter().all(|sub| sub.has_positions());
        Ok(MultiTerms {
            has_freqs: subs.iter().all(|sub| sub.has_freqs()),
            has_offsets: subs.iter().all(|sub| sub.has_offsets()),
            has_payloads: has_positions && subs.iter().any(|sub| sub.has_payloads()),
            has_positions,
            comparator,
            subs,
            slices,
        })
    }

    pub fn subs(&self) -> &[Arc<dyn Terms>] {
        &self.subs
    }

    pub fn slices(&self) -> &[ReaderSlice] {
        &self.slices
    }

    fn sum(&self, stat: impl Fn(&dyn Terms) -> i64) -> i64 {
        let mut sum = 0;
        for sub in &self.subs {
            let value = stat(sub.as_ref());
            if value < 0 {
                return -1;
            }
            sum += value;
        }
        sum
    }

    fn merge(&self, enums: Vec<Box<dyn TermsEnum>>) -> MultiTermsEnum {
        MultiTermsEnum::new(
            self.comparator,
            enums.into_iter().zip(self.slices.iter().copied()).collect(),
        )
    }

    /// A merged enum with access to [`MultiTermsEnum::matching_subs`].
    pub fn multi_iterator(&self) -> Result<MultiTermsEnum> {
        let enums = self
            .subs
            .iter()
            .map(|sub| sub.iterator())
            .collect::<Result<Vec<_>>>()?;
        Ok(self.merge(enums))
    }
}

impl Terms for MultiTerms {
    fn iterator(&self) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(self.multi_iterator()?))
    }

    fn intersect(
        &self,
        automaton: &CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Box<dyn TermsEnum>> {
        let enums = self
            .subs
            .iter()
            .map(|sub| sub.intersect(automaton, start_term))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(self.merge(enums)))
    }

    fn comparator(&self) -> TermComparator {
        self.comparator
    }

    fn size(&self) -> i64 {
        -1
    }

    fn sum_total_term_freq(&self) -> i64 {
        self.sum(|sub| sub.sum_total_term_freq())
    }

    fn sum_doc_freq(&self) -> i64 {
        self.sum(|sub| sub.sum_doc_freq())
    }

    fn doc_count(&self) -> i64 {
        self.sum(|sub| sub.doc_count())
    }

    fn has_freqs(&self) -> bool {
        self.has_freqs
    }

    fn has_offsets(&self) -> bool {
        self.has_offsets
    }

    fn has_positions(&self) -> bool {
        self.has_positions
    }

    fn has_payloads(&self) -> bool {
        self.has_payloads
    }
}
