//! Live document predicates.
//!
//! Deleted documents stay in the postings until the segment is rewritten. Cursors
//! that are given a [`LiveDocs`] filter skip every document whose bit is clear.

/// Answers whether a document of a segment is live (not deleted).
pub trait LiveDocs: Send + Sync {
    /// Returns `true` if `doc` is live. `doc` must be below `len()`.
    fn get(&self, doc: u32) -> bool;

    /// Number of documents covered by this predicate (the segment's `max_doc`).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size bit set; as a [`LiveDocs`] a set bit marks a live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBitSet {
    words: Vec<u64>,
    num_bits: usize,
}

impl FixedBitSet {
    /// Creates a set of `num_bits` clear bits.
    pub fn new(num_bits: usize) -> FixedBitSet {
        FixedBitSet {
            words: vec![0; num_bits.div_ceil(64)],
            num_bits,
        }
    }

    /// Creates a set with every bit set: all documents live.
    pub fn with_all_set(num_bits: usize) -> FixedBitSet {
        let mut set = FixedBitSet {
            words: vec![u64::MAX; num_bits.div_ceil(64)],
            num_bits,
        };
        let tail = num_bits % 64;
        if let Some(last) = set.words.last_mut().filter(|_| tail != 0) {
            *last = (1u64 << tail) - 1;
        }
        set
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.num_bits);
        self.words
            .get(index >> 6)
            .is_some_and(|w| w & (1u64 << (index & 63)) != 0)
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(index < self.num_bits, "bit {index} out of {}", self.num_bits);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        assert!(index < self.num_bits, "bit {index} out of {}", self.num_bits);
        self.words[index >> 6] &= !(1u64 << (index & 63));
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn len(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Iterates the indexes of the set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(i * 64 + bit)
            })
        })
    }
}

impl LiveDocs for FixedBitSet {
    #[inline]
    fn get(&self, doc: u32) -> bool {
        FixedBitSet::get(self, doc as usize)
    }

    fn len(&self) -> usize {
        self.num_bits
    }
}

/// A segment without deletions.
#[derive(Debug, Clone, Copy)]
pub struct MatchAllDocs {
    len: usize,
}

impl MatchAllDocs {
    pub fn new(len: usize) -> MatchAllDocs {
        MatchAllDocs { len }
    }
}

impl LiveDocs for MatchAllDocs {
    #[inline]
    fn get(&self, _doc: u32) -> bool {
        true
    }

    fn len(&self) -> usize {
        self.len
    }
}
