// Wallet-level libraries for bitcoin protocol by LNP/BP Association
//
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// This software is distributed without any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

use bitcoin::util::bip32::ChildNumber;

/// Constant determining BIP32 boundary for u32 values after which index
/// is treated as hardened
pub const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;

/// Errors constructing or parsing derivation indexes
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum IndexError {
    /// index {0} is hardened or exceeds maximal unhardened index value
    /// 2147483647
    Hardened(u32),

    /// derivation index `{0}` is not a decimal number
    NotANumber(String),

    /// derivation index `{0}` exceeds 32-bit integer range
    Overflow(String),

    /// index range `{0}` is malformed; ranges must have form `start-end` with
    /// start not exceeding end
    InvalidRange(String),
}

/// Index for unhardened children derivation; ensures that the inner value
/// is always < 2^31
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", try_from = "u32", into = "u32")
)]
#[derive(
    Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Display, From
)]
#[display(inner)]
pub struct UnhardenedIndex(
    #[from(u8)]
    #[from(u16)]
    u32,
);

impl PartialEq<u32> for UnhardenedIndex {
    fn eq(&self, other: &u32) -> bool { self.0 == *other }
}

impl PartialOrd<u32> for UnhardenedIndex {
    fn partial_cmp(&self, other: &u32) -> Option<Ordering> { self.0.partial_cmp(other) }
}

impl UnhardenedIndex {
    /// Index with value zero
    pub const ZERO: UnhardenedIndex = UnhardenedIndex(0);

    /// Maximal unhardened index, 2^31 - 1
    pub const MAX: UnhardenedIndex = UnhardenedIndex(HARDENED_INDEX_BOUNDARY - 1);

    /// Constructs unhardened index, failing if the value is in the hardened
    /// range
    pub fn from_index(index: impl Into<u32>) -> Result<Self, IndexError> {
        let index = index.into();
        if index >= HARDENED_INDEX_BOUNDARY {
            Err(IndexError::Hardened(index))
        } else {
            Ok(Self(index))
        }
    }

    /// Returns unhardened index number.
    #[inline]
    pub fn index(self) -> u32 { self.0 }

    /// Increases the index on one step; returns `None` if the index is
    /// already [`UnhardenedIndex::MAX`]
    #[inline]
    pub fn checked_inc(self) -> Option<Self> {
        self.0
            .checked_add(1)
            .filter(|index| *index < HARDENED_INDEX_BOUNDARY)
            .map(Self)
    }

    /// Adds value to the index; returns `None` on overflow into the hardened
    /// range
    #[inline]
    pub fn checked_add(self, add: impl Into<u32>) -> Option<Self> {
        self.0
            .checked_add(add.into())
            .filter(|index| *index < HARDENED_INDEX_BOUNDARY)
            .map(Self)
    }
}

impl TryFrom<u32> for UnhardenedIndex {
    type Error = IndexError;

    fn try_from(value: u32) -> Result<Self, Self::Error> { UnhardenedIndex::from_index(value) }
}

impl From<UnhardenedIndex> for u32 {
    fn from(index: UnhardenedIndex) -> Self { index.0 }
}

impl From<UnhardenedIndex> for ChildNumber {
    fn from(idx: UnhardenedIndex) -> Self { ChildNumber::Normal { index: idx.0 } }
}

impl FromStr for UnhardenedIndex {
    type Err = IndexError;

    /// Parses strictly decimal representation: no sign, no whitespace and no
    /// hardened suffixes are allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IndexError::NotANumber(s.to_owned()));
        }
        match u32::from_str(s) {
            Ok(index) => UnhardenedIndex::from_index(index),
            Err(_) => Err(IndexError::Overflow(s.to_owned())),
        }
    }
}

/// Inclusive range of unhardened indexes, used to iterate over final
/// derivation indexes.
///
/// The range is guaranteed to contain at least one index.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct IndexRange(RangeInclusive<UnhardenedIndex>);

impl IndexRange {
    /// Constructs range consisting of a single index
    pub fn new(index: UnhardenedIndex) -> Self { IndexRange(index..=index) }

    /// Constructs range from the first and last index, if `start <= end`
    pub fn with(start: UnhardenedIndex, end: UnhardenedIndex) -> Option<Self> {
        if start > end {
            return None;
        }
        Some(IndexRange(start..=end))
    }

    /// Constructs range of `count` indexes starting at `start`. The range
    /// is truncated at [`UnhardenedIndex::MAX`]; returns `None` for zero
    /// `count`.
    pub fn with_count(start: UnhardenedIndex, count: u32) -> Option<Self> {
        let last = count.checked_sub(1)?;
        let end = start.checked_add(last).unwrap_or(UnhardenedIndex::MAX);
        IndexRange::with(start, end)
    }

    /// First index in the range
    #[inline]
    pub fn start(&self) -> UnhardenedIndex { *self.0.start() }

    /// Last index in the range
    #[inline]
    pub fn end(&self) -> UnhardenedIndex { *self.0.end() }

    /// Number of indexes in the range
    #[inline]
    pub fn count(&self) -> usize { (self.end().index() - self.start().index()) as usize + 1 }

    /// Detects whether index belongs to the range
    #[inline]
    pub fn contains(&self, index: UnhardenedIndex) -> bool { self.0.contains(&index) }

    /// Iterates over all indexes in the range
    pub fn iter(&self) -> impl Iterator<Item = UnhardenedIndex> {
        (self.start().index()..=self.end().index()).map(UnhardenedIndex)
    }
}

impl Display for IndexRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.start() == self.end() {
            Display::fmt(&self.start(), f)
        } else {
            write!(f, "{}-{}", self.start(), self.end())
        }
    }
}

impl FromStr for IndexRange {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut split = s.split('-');
        match (split.next(), split.next(), split.next()) {
            (Some(index), None, None) => Ok(IndexRange::new(index.parse()?)),
            (Some(start), Some(end), None) => {
                IndexRange::with(start.parse()?, end.parse()?)
                    .ok_or_else(|| IndexError::InvalidRange(s.to_owned()))
            }
            _ => Err(IndexError::InvalidRange(s.to_owned())),
        }
    }
}
