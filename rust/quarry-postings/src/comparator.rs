//! Term ordering strategies.
//!
//! Terms of a field are stored in strictly ascending order under the field's
//! comparator. The comparator is chosen when the field is written and persisted
//! with it; every reader and every multi-segment merge must use the same one.

use std::cmp::Ordering;

use quarry_common::{Result, error::Error};
use serde::{Deserialize, Serialize};

/// Defines how term bytes are ordered within a field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermComparator {
    /// Unsigned lexicographic byte order. For UTF-8 terms this equals Unicode code
    /// point order.
    #[default]
    Binary,
    /// Orders UTF-8 encoded terms as if they were compared by their UTF-16 code
    /// units. Supplementary characters sort before the `U+E000..U+FFFF` range.
    Utf8AsUtf16,
}

impl TermComparator {
    pub const fn name(&self) -> &'static str {
        match self {
            TermComparator::Binary => "binary",
            TermComparator::Utf8AsUtf16 => "utf8-as-utf16",
        }
    }

    pub fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        match self {
            TermComparator::Binary => left.cmp(right),
            TermComparator::Utf8AsUtf16 => compare_utf8_as_utf16(left, right),
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            TermComparator::Binary => 0,
            TermComparator::Utf8AsUtf16 => 1,
        }
    }

    pub(crate) fn from_byte(resource: &str, b: u8) -> Result<TermComparator> {
        match b {
            0 => Ok(TermComparator::Binary),
            1 => Ok(TermComparator::Utf8AsUtf16),
            _ => Err(Error::corrupt_index(
                resource,
                format!("unknown term comparator {b}"),
            )),
        }
    }
}

impl TryFrom<&str> for TermComparator {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "binary" => Ok(TermComparator::Binary),
            "utf8-as-utf16" => Ok(TermComparator::Utf8AsUtf16),
            _ => Err(Error::invalid_arg(
                "name",
                format!("unrecognized term comparator: {name}"),
            )),
        }
    }
}

/// Compares UTF-8 byte strings in UTF-16 code unit order.
///
/// The orders only disagree on the first differing byte when both bytes start a
/// sequence at or above `U+E000`: lead bytes `0xEE`/`0xEF` (the `U+E000..U+FFFF`
/// range) are moved past the four-byte lead bytes `0xF0..`, since in UTF-16 those
/// characters become surrogates `0xD800..0xDFFF`.
fn compare_utf8_as_utf16(left: &[u8], right: &[u8]) -> Ordering {
    let common = left.iter().zip(right).position(|(l, r)| l != r);
    let Some(i) = common else {
        return left.len().cmp(&right.len());
    };
    let mut l = left[i] as u32;
    let mut r = right[i] as u32;
    if l >= 0xee && r >= 0xee {
        if (l & 0xfe) == 0xee {
            l += 0x0e;
        }
        if (r & 0xfe) == 0xee {
            r += 0x0e;
        }
    }
    l.cmp(&r)
}
