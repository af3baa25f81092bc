//! Byte-level automata used to restrict term enumeration.
//!
//! [`crate::Terms::intersect`] walks the terms dictionary and runs each term through
//! a [`TermAutomaton`]. Automata are deterministic and operate on the raw term
//! bytes (UTF-8 for text fields).

use std::sync::{Arc, LazyLock};

use levenshtein_automata::{DFA, Distance, LevenshteinAutomatonBuilder, SINK_STATE};
use quarry_common::{Result, error::Error};

/// State of a dead automaton, from which no term can be accepted.
pub const DEAD_STATE: u64 = u64::MAX;

/// A deterministic automaton over term bytes.
pub trait TermAutomaton: Send + Sync {
    fn start(&self) -> u64;

    fn step(&self, state: u64, byte: u8) -> u64;

    /// Whether the bytes consumed so far form an accepted term.
    fn is_match(&self, state: u64) -> bool;

    /// Whether some continuation of the bytes consumed so far can be accepted.
    fn can_match(&self, state: u64) -> bool;

    /// Runs the whole `term` from the start state.
    fn accepts(&self, term: &[u8]) -> bool {
        let mut state = self.start();
        for &b in term {
            state = self.step(state, b);
            if !self.can_match(state) {
                return false;
            }
        }
        self.is_match(state)
    }
}

/// Does a transposition count as one levenshtein distance or two?
const TRANSPOSITION_COST_ONE: bool = false;

static LEVENSHTEIN_BUILDERS: LazyLock<[LevenshteinAutomatonBuilder; 3]> = LazyLock::new(|| {
    [
        LevenshteinAutomatonBuilder::new(0, TRANSPOSITION_COST_ONE),
        LevenshteinAutomatonBuilder::new(1, TRANSPOSITION_COST_ONE),
        LevenshteinAutomatonBuilder::new(2, TRANSPOSITION_COST_ONE),
    ]
});

/// The automata supported by term intersection.
#[derive(Clone)]
pub enum CompiledAutomaton {
    /// Accepts every term.
    All,
    /// Accepts terms starting with the given bytes.
    Prefix(Vec<u8>),
    /// Accepts terms within a byte-order range.
    Range(RangeAutomaton),
    /// Accepts terms within an edit distance of a query.
    Levenshtein(Arc<DFA>),
}

impl CompiledAutomaton {
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> CompiledAutomaton {
        CompiledAutomaton::Prefix(prefix.into())
    }

    pub fn range(
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        include_lower: bool,
        include_upper: bool,
    ) -> CompiledAutomaton {
        CompiledAutomaton::Range(RangeAutomaton {
            lower: lower.map(<[u8]>::to_vec),
            upper: upper.map(<[u8]>::to_vec),
            include_lower,
            include_upper,
        })
    }

    /// Builds a fuzzy automaton accepting terms within `distance` edits of `query`,
    /// or, with `prefix`, terms having a prefix within that distance.
    pub fn fuzzy(query: &str, distance: u8, prefix: bool) -> Result<CompiledAutomaton> {
        let builder = LEVENSHTEIN_BUILDERS.get(distance as usize).ok_or_else(|| {
            Error::invalid_arg("distance", format!("edit distance {distance} exceeds 2"))
        })?;
        let dfa = if prefix {
            builder.build_prefix_dfa(query)
        } else {
            builder.build_dfa(query)
        };
        Ok(CompiledAutomaton::Levenshtein(Arc::new(dfa)))
    }
}

impl std::fmt::Debug for CompiledAutomaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledAutomaton::All => write!(f, "All"),
            CompiledAutomaton::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            CompiledAutomaton::Range(range) => f.debug_tuple("Range").field(range).finish(),
            CompiledAutomaton::Levenshtein(_) => write!(f, "Levenshtein"),
        }
    }
}

impl TermAutomaton for CompiledAutomaton {
    fn start(&self) -> u64 {
        match self {
            CompiledAutomaton::All | CompiledAutomaton::Prefix(_) => 0,
            CompiledAutomaton::Range(range) => range.start(),
            CompiledAutomaton::Levenshtein(dfa) => dfa.initial_state() as u64,
        }
    }

    fn step(&self, state: u64, byte: u8) -> u64 {
        match self {
            CompiledAutomaton::All => 0,
            CompiledAutomaton::Prefix(prefix) => {
                if state == DEAD_STATE {
                    return DEAD_STATE;
                }
                let pos = state as usize;
                match prefix.get(pos) {
                    None => state,
                    Some(&b) if b == byte => state + 1,
                    Some(_) => DEAD_STATE,
                }
            }
            CompiledAutomaton::Range(range) => range.step(state, byte),
            CompiledAutomaton::Levenshtein(dfa) => {
                let state = dfa.transition(state as u32, byte);
                if state == SINK_STATE {
                    DEAD_STATE
                } else {
                    state as u64
                }
            }
        }
    }

    fn is_match(&self, state: u64) -> bool {
        match self {
            CompiledAutomaton::All => true,
            CompiledAutomaton::Prefix(prefix) => state == prefix.len() as u64,
            CompiledAutomaton::Range(range) => range.is_match(state),
            CompiledAutomaton::Levenshtein(dfa) => {
                state != DEAD_STATE && matches!(dfa.distance(state as u32), Distance::Exact(_))
            }
        }
    }

    fn can_match(&self, state: u64) -> bool {
        match self {
            CompiledAutomaton::Range(range) => range.can_match(state),
            _ => state != DEAD_STATE,
        }
    }
}

/// Accepts terms between `lower` and `upper` in unsigned byte order.
///
/// The state packs the number of consumed bytes with two flags telling whether
/// the consumed bytes still equal the corresponding prefix of each bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeAutomaton {
    lower: Option<Vec<u8>>,
    upper: Option<Vec<u8>>,
    include_lower: bool,
    include_upper: bool,
}

const ON_LOWER: u64 = 1 << 62;
const ON_UPPER: u64 = 1 << 61;
const POS_MASK: u64 = ON_UPPER - 1;

impl RangeAutomaton {
    fn start(&self) -> u64 {
        let mut state = 0;
        if self.lower.is_some() {
            state |= ON_LOWER;
        }
        if self.upper.is_some() {
            state |= ON_UPPER;
        }
        state
    }

    fn step(&self, state: u64, byte: u8) -> u64 {
        if state == DEAD_STATE {
            return DEAD_STATE;
        }
        let pos = (state & POS_MASK) as usize;
        let mut next = pos as u64 + 1;
        if state & ON_LOWER != 0 {
            let lower = self.lower.as_deref().unwrap_or_default();
            match lower.get(pos) {
                Some(&b) if byte < b => return DEAD_STATE,
                Some(&b) if byte == b => next |= ON_LOWER,
                // Greater than the bound from here on.
                _ => {}
            }
        }
        if state & ON_UPPER != 0 {
            let upper = self.upper.as_deref().unwrap_or_default();
            match upper.get(pos) {
                Some(&b) if byte > b => return DEAD_STATE,
                Some(&b) if byte == b => next |= ON_UPPER,
                Some(_) => {}
                // Extends the upper bound, hence greater than it.
                None => return DEAD_STATE,
            }
        }
        next
    }

    fn is_match(&self, state: u64) -> bool {
        if state == DEAD_STATE {
            return false;
        }
        let pos = (state & POS_MASK) as usize;
        if state & ON_LOWER != 0 {
            let lower_len = self.lower.as_ref().map_or(0, Vec::len);
            // A proper prefix of the lower bound sorts before it.
            if pos < lower_len || !self.include_lower {
                return false;
            }
        }
        if state & ON_UPPER != 0 {
            let upper_len = self.upper.as_ref().map_or(0, Vec::len);
            if pos == upper_len && !self.include_upper {
                return false;
            }
        }
        true
    }

    fn can_match(&self, state: u64) -> bool {
        if state == DEAD_STATE {
            return false;
        }
        if state & ON_UPPER != 0 {
            let pos = (state & POS_MASK) as usize;
            let upper_len = self.upper.as_ref().map_or(0, Vec::len);
            // Equal to the upper bound: every extension is greater.
            if pos == upper_len {
                return self.include_upper;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_prefix() {
        assert!(CompiledAutomaton::All.accepts(b""));
        assert!(CompiledAutomaton::All.accepts(b"anything"));
        let prefix = CompiledAutomaton::prefix("ca");
        assert!(prefix.accepts(b"ca"));
        assert!(prefix.accepts(b"cat"));
        assert!(!prefix.accepts(b"c"));
        assert!(!prefix.accepts(b"dog"));
        let state = prefix.step(prefix.start(), b'd');
        assert!(!prefix.can_match(state));
    }

    #[test]
    fn test_range_matches_byte_order() {
        let words = ["", "a", "b", "ba", "bat", "bb", "c", "ca", "cat", "d", "\u{ff}"];
        let bounds = [None, Some(""), Some("b"), Some("ba"), Some("c")];
        for &lower in &bounds {
            for &upper in &bounds {
                for include_lower in [false, true] {
                    for include_upper in [false, true] {
                        let range = CompiledAutomaton::range(
                            lower.map(str::as_bytes),
                            upper.map(str::as_bytes),
                            include_lower,
                            include_upper,
                        );
                        for word in words {
                            let above = match lower {
                                None => true,
                                Some(l) if include_lower => word >= l,
                                Some(l) => word > l,
                            };
                            let below = match upper {
                                None => true,
                                Some(u) if include_upper => word <= u,
                                Some(u) => word < u,
                            };
                            assert_eq!(
                                range.accepts(word.as_bytes()),
                                above && below,
                                "{word:?} in {lower:?}..{upper:?} ({include_lower}, {include_upper})"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_fuzzy() {
        let fuzzy = CompiledAutomaton::fuzzy("cat", 1, false).unwrap();
        assert!(fuzzy.accepts(b"cat"));
        assert!(fuzzy.accepts(b"cart"));
        assert!(fuzzy.accepts(b"bat"));
        assert!(!fuzzy.accepts(b"dog"));
        let prefix = CompiledAutomaton::fuzzy("cat", 0, true).unwrap();
        assert!(prefix.accepts(b"catalog"));
        assert!(!prefix.accepts(b"dog"));
        assert!(CompiledAutomaton::fuzzy("cat", 3, false).is_err());
    }
}
