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

use crate::{DeriveError, EncodeError, PathError};

/// Kinds of failures which may happen while producing addresses from an
/// extended public key
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum ErrorKind {
    /// Extended key string fails structural, checksum or version validation
    #[display("InvalidKey")]
    InvalidKey,

    /// Derivation path string violates the template grammar
    #[display("InvalidPath")]
    InvalidPath,

    /// CKDpub derivation step has failed
    #[display("DerivationFailed")]
    DerivationFailed,

    /// Hashing or address encoding has failed
    #[display("EncodingFailed")]
    EncodingFailed,
}

/// Errors of the address derivation pipeline
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(inner)]
pub enum Error {
    /// Invalid extended public key
    #[from]
    InvalidKey(slip132::Error),

    /// Invalid derivation template
    #[from]
    InvalidPath(PathError),

    /// Child key derivation failure
    #[from]
    DerivationFailed(DeriveError),

    /// Address encoding failure
    #[from]
    EncodingFailed(EncodeError),
}

impl Error {
    /// Returns kind of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidKey(_) => ErrorKind::InvalidKey,
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::DerivationFailed(_) => ErrorKind::DerivationFailed,
            Error::EncodingFailed(_) => ErrorKind::EncodingFailed,
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::{AccountXpub, DerivationTemplate, UnhardenedIndex};

    #[test]
    fn kinds() {
        let err = Error::from(AccountXpub::from_str("xpub").unwrap_err());
        assert_eq!(err.kind(), ErrorKind::InvalidKey);

        let err = Error::from(DerivationTemplate::from_str("x").unwrap_err());
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert_eq!(err.to_string(), "derivation path must start with `m`, while it starts with `x`");

        let err = Error::from(DeriveError::DepthOverflow {
            index: UnhardenedIndex::ZERO,
        });
        assert_eq!(err.kind(), ErrorKind::DerivationFailed);
        assert_eq!(err.kind().to_string(), "DerivationFailed");

        let err = Error::from(EncodeError::InvalidBase32(32));
        assert_eq!(err.kind(), ErrorKind::EncodingFailed);
    }
}
