// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2021 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::util::bip32::ChildNumber;

use crate::{AccountXpub, DerivationTemplate, UnhardenedIndex};

/// Errors during public key derivation
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum DeriveError {
    /// derivation of child {index} from key at depth {depth} produced an
    /// invalid public key
    InvalidChildKey {
        /// Depth of the parent key
        depth: u8,
        /// Child index which failed to derive
        index: UnhardenedIndex,
    },

    /// can't derive child {index}: parent key is already at the maximal depth
    /// of 255
    DepthOverflow {
        /// Child index which failed to derive
        index: UnhardenedIndex,
    },
}

/// Public-only (non-hardened) BIP32 derivation
pub trait DerivePublic: Sized {
    /// Derives a single child using CKDpub function
    fn derive_child<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: UnhardenedIndex,
    ) -> Result<Self, DeriveError>;

    /// Derives key by sequentially applying CKDpub for each of the indexes.
    /// Either returns the final key or fails at the first failed step.
    fn derive_path<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        path: impl IntoIterator<Item = UnhardenedIndex>,
    ) -> Result<Self, DeriveError>
    where
        Self: Clone,
    {
        path.into_iter()
            .try_fold(self.clone(), |key, index| key.derive_child(secp, index))
    }

    /// Derives key for a template, substituting its placeholder with
    /// `final_index`
    fn derive_template<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        template: &DerivationTemplate,
        final_index: UnhardenedIndex,
    ) -> Result<Self, DeriveError>
    where
        Self: Clone,
    {
        self.derive_path(secp, template.indexes().iter().copied().chain(Some(final_index)))
    }
}

impl DerivePublic for AccountXpub {
    fn derive_child<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: UnhardenedIndex,
    ) -> Result<Self, DeriveError> {
        let depth = self.xpub.depth;
        if depth == u8::MAX {
            return Err(DeriveError::DepthOverflow { index });
        }
        let xpub = self
            .xpub
            .ckd_pub(secp, ChildNumber::from(index))
            .map_err(|_| DeriveError::InvalidChildKey { depth, index })?;
        trace!(depth = xpub.depth, %index, fingerprint = %xpub.fingerprint(), "derived child key");
        Ok(AccountXpub {
            xpub,
            application: self.application,
        })
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use bitcoin::util::bip32::ExtendedPubKey;
    use slip132::KeyApplication;

    use super::*;

    const XPUB: &str = "xpub661MyMwAqRbcGYzUcVc8JSnN3RcM47JHWMaqtE8yhMfHZohujgvQjX2ezdw2qw6sSMu8B694BQebnASCNvbkZWiBVRvFimSAwgVphguL6LD";

    fn idx(index: u32) -> UnhardenedIndex { UnhardenedIndex::from_index(index).unwrap() }

    #[test]
    fn bip32_vector() {
        // BIP32 test vector 1, chain m/0H/1/2H -> m/0H/1/2H/2
        let parent = ExtendedPubKey::from_str("xpub6D4BDPcP2GT577Vvch3R8wDkScZWzQzMMUm3PWbmWvVJrZwQY4VUNgqFJPMM3No2dFDFGTsxxpG5uJh7n7epu4trkrX7x7DogT5Uv6fcLW5").unwrap();
        let secp = Secp256k1::verification_only();
        let child = AccountXpub::with(parent, KeyApplication::Legacy)
            .derive_child(&secp, idx(2))
            .unwrap();
        assert_eq!(child.to_string(), "xpub6FHa3pjLCk84BayeJxFW2SP4XRrFd1JYnxeLeU8EqN3vDfZmbqBqaGJAyiLjTAwm6ZLRQUMv1ZACTj37sR62cfN7fe5JnJ7dh8zL4fiyLHV");
        assert_eq!(child.depth(), 4);
    }

    #[test]
    fn single_child() {
        let secp = Secp256k1::verification_only();
        let xpub = AccountXpub::from_str(XPUB).unwrap();
        let child = xpub.derive_child(&secp, UnhardenedIndex::ZERO).unwrap();
        assert_eq!(child.to_string(), "xpub697vrqy3jguq6i7FcpVpZXAJn871puw4Vn8QZSYfqLhcx2Y6QsY8iSx8d9Lp2b7RJiT7zcjqFENCuUQQNW4Uu3R3yGe139cUKb7S783strM");
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent_fingerprint(), xpub.fingerprint());
        assert_eq!(child.child_number(), ChildNumber::Normal { index: 0 });
        assert_eq!(child.application(), KeyApplication::Legacy);
        // parent is never modified
        assert_eq!(xpub.to_string(), XPUB);
    }

    #[test]
    fn template_matches_stepwise() {
        let secp = Secp256k1::verification_only();
        let xpub = AccountXpub::from_str(XPUB).unwrap();
        let template = DerivationTemplate::from_str("m/1/2/x").unwrap();
        let derived = xpub.derive_template(&secp, &template, idx(3)).unwrap();
        let stepwise = xpub
            .derive_child(&secp, idx(1))
            .and_then(|key| key.derive_child(&secp, idx(2)))
            .and_then(|key| key.derive_child(&secp, idx(3)))
            .unwrap();
        assert_eq!(derived, stepwise);
        assert_eq!(derived.depth(), 3);
        assert_eq!(xpub.derive_path(&secp, []).unwrap(), xpub);
    }

    #[test]
    fn depth_overflow() {
        let secp = Secp256k1::verification_only();
        let mut xpub = ExtendedPubKey::from_str(XPUB).unwrap();
        xpub.depth = u8::MAX;
        let mut xpub = AccountXpub::with(xpub, KeyApplication::SegWit);
        assert_eq!(
            xpub.derive_child(&secp, idx(7)),
            Err(DeriveError::DepthOverflow { index: idx(7) })
        );

        xpub.xpub.depth = u8::MAX - 1;
        let template = DerivationTemplate::from_str("m/0/x").unwrap();
        assert_eq!(
            xpub.derive_template(&secp, &template, idx(1)),
            Err(DeriveError::DepthOverflow { index: idx(1) })
        );
    }
}
