// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::util::bip32::{ChildNumber, DerivationPath};

use crate::{IndexError, UnhardenedIndex};

/// Root marker, which must be the first segment of a derivation template
pub const ROOT_SEGMENT: &str = "m";

/// Placeholder segment, which must be the last segment of a derivation
/// template and which is substituted with the final derivation index
pub const FINAL_SEGMENT: &str = "x";

/// Minimal number of segments in a derivation template (`m/x`)
pub const MIN_SEGMENTS: usize = 2;

/// Maximal number of segments in a derivation template, including root and
/// final placeholder segments
pub const MAX_SEGMENTS: usize = 8;

/// Errors in derivation template syntax
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum PathError {
    /// derivation path must start with `m`, while it starts with `{0}`
    WrongRoot(String),

    /// derivation path must end with `x` placeholder, while it ends with `{0}`
    WrongTerminal(String),

    /// derivation path has {0} segments, while at least 2 segments (`m/x`)
    /// are required
    TooShort(usize),

    /// derivation path has {0} segments, while no more than 8 segments are
    /// allowed
    TooLong(usize),

    /// invalid derivation path segment #{position}: {error}
    InvalidSegment {
        /// Segment position, counting from the root segment `m` at zero
        position: usize,
        /// Problem with the segment index
        error: IndexError,
    },
}

/// Derivation template in form of `m/<index>/.../<index>/x`, where all
/// indexes are unhardened and `x` marks the position of the final index
/// provided at the derivation time.
///
/// The type guarantees that the template contains from zero up to six
/// interior indexes.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct DerivationTemplate(Vec<UnhardenedIndex>);

impl DerivationTemplate {
    /// Template `m/x`, deriving final index right from the extended key
    pub fn single_level() -> Self { Self::default() }

    /// Constructs template from interior indexes; fails if there are more than
    /// six of them
    pub fn with(indexes: impl IntoIterator<Item = UnhardenedIndex>) -> Result<Self, PathError> {
        let indexes = indexes.into_iter().collect::<Vec<_>>();
        let segments = indexes.len() + MIN_SEGMENTS;
        if segments > MAX_SEGMENTS {
            return Err(PathError::TooLong(segments));
        }
        Ok(Self(indexes))
    }

    /// Interior indexes of the template, not including the final index
    #[inline]
    pub fn indexes(&self) -> &[UnhardenedIndex] { &self.0 }

    /// Interior indexes as raw `u32` values
    pub fn to_u32_vec(&self) -> Vec<u32> { self.0.iter().copied().map(u32::from).collect() }

    /// Number of derivation steps performed with the template, including the
    /// final one
    #[inline]
    pub fn depth(&self) -> usize { self.0.len() + 1 }

    /// Substitutes `x` placeholder with the final index, producing full
    /// derivation path relative to the extended key
    pub fn to_derivation_path(&self, final_index: UnhardenedIndex) -> DerivationPath {
        self.0
            .iter()
            .copied()
            .chain(Some(final_index))
            .map(ChildNumber::from)
            .collect()
    }
}

impl Display for DerivationTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_SEGMENT)?;
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        write!(f, "/{}", FINAL_SEGMENT)
    }
}

impl FromStr for DerivationTemplate {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s.split('/').collect::<Vec<_>>();
        let count = segments.len();

        let Some((first, rest)) = segments.split_first() else {
            unreachable!("split always returns at least one element")
        };
        if *first != ROOT_SEGMENT {
            return Err(PathError::WrongRoot(first.to_string()));
        }
        let Some((last, interior)) = rest.split_last() else {
            return Err(PathError::TooShort(count));
        };
        if *last != FINAL_SEGMENT {
            return Err(PathError::WrongTerminal(last.to_string()));
        }
        if count > MAX_SEGMENTS {
            return Err(PathError::TooLong(count));
        }

        interior
            .iter()
            .enumerate()
            .map(|(no, segment)| {
                UnhardenedIndex::from_str(segment).map_err(|error| PathError::InvalidSegment {
                    position: no + 1,
                    error,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn indexes(s: &str) -> Result<Vec<u32>, PathError> {
        DerivationTemplate::from_str(s).map(|template| template.to_u32_vec())
    }

    #[test]
    fn valid_templates() {
        assert_eq!(indexes("m/0/1/x"), Ok(vec![0, 1]));
        assert_eq!(indexes("m/x"), Ok(vec![]));
        assert_eq!(indexes("m/1/2/3/4/5/6/x"), Ok(vec![1, 2, 3, 4, 5, 6]));
        assert_eq!(indexes("m/2147483647/x"), Ok(vec![2147483647]));
    }

    #[test]
    fn wrong_root() {
        assert_eq!(indexes("x"), Err(PathError::WrongRoot(s!("x"))));
        assert_eq!(indexes("M/0/x"), Err(PathError::WrongRoot(s!("M"))));
        assert_eq!(indexes("m'/0/x"), Err(PathError::WrongRoot(s!("m'"))));
        assert_eq!(indexes("/0/x"), Err(PathError::WrongRoot(s!(""))));
        assert_eq!(indexes(""), Err(PathError::WrongRoot(s!(""))));
    }

    #[test]
    fn wrong_terminal() {
        assert_eq!(indexes("m"), Err(PathError::TooShort(1)));
        assert_eq!(indexes("m/0"), Err(PathError::WrongTerminal(s!("0"))));
        assert_eq!(indexes("m/0/*"), Err(PathError::WrongTerminal(s!("*"))));
        assert_eq!(indexes("m/x/"), Err(PathError::WrongTerminal(s!(""))));
        assert_eq!(indexes("m/0/X"), Err(PathError::WrongTerminal(s!("X"))));
    }

    #[test]
    fn too_long() {
        assert_eq!(indexes("m/0/0/0/0/0/0/0/x"), Err(PathError::TooLong(9)));
        assert!(matches!(
            DerivationTemplate::with([UnhardenedIndex::ZERO; 7]),
            Err(PathError::TooLong(9))
        ));
        assert!(DerivationTemplate::with([UnhardenedIndex::ZERO; 6]).is_ok());
    }

    #[test]
    fn invalid_segments() {
        assert_eq!(
            indexes("m/4294967296/x"),
            Err(PathError::InvalidSegment {
                position: 1,
                error: IndexError::Overflow(s!("4294967296"))
            })
        );
        assert_eq!(
            indexes("m/0/2147483648/x"),
            Err(PathError::InvalidSegment {
                position: 2,
                error: IndexError::Hardened(2147483648)
            })
        );
        for path in ["m/0'/x", "m/0h/x", "m//x", "m/-1/x", "m/x/x", "m/ 1/x"] {
            assert!(matches!(
                indexes(path),
                Err(PathError::InvalidSegment {
                    position: 1,
                    error: IndexError::NotANumber(_)
                })
            ));
        }
    }

    #[test]
    fn display() {
        for s in ["m/x", "m/0/x", "m/1/2/3/4/5/6/x"] {
            assert_eq!(DerivationTemplate::from_str(s).unwrap().to_string(), s);
        }
        assert_eq!(DerivationTemplate::single_level().to_string(), "m/x");
    }

    #[test]
    fn derivation_path() {
        let template = DerivationTemplate::from_str("m/0/1/x").unwrap();
        assert_eq!(template.depth(), 3);
        assert_eq!(template.to_derivation_path(UnhardenedIndex::from(5u8)).to_string(), "m/0/1/5");
        assert_eq!(
            DerivationTemplate::single_level()
                .to_derivation_path(UnhardenedIndex::ZERO)
                .to_string(),
            "m/0"
        );
    }
}
