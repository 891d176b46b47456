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

use bitcoin::secp256k1;
use bitcoin::util::bip32::{ChainCode, ChildNumber, ExtendedPubKey, Fingerprint};
use bitcoin::XpubIdentifier;
use slip132::{FromSlip132, KeyApplication, ToSlip132};

/// Extended public key together with the key application (legacy or segwit)
/// defined by its SLIP-132 version bytes at the moment of parsing.
///
/// The key application never changes during derivation: all children of
/// a `zpub` are encoded into segwit addresses, and all children of an `xpub`
/// into legacy ones.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AccountXpub {
    pub(crate) xpub: ExtendedPubKey,
    pub(crate) application: KeyApplication,
}

impl AccountXpub {
    /// Wraps extended public key with a given key application
    pub fn with(xpub: ExtendedPubKey, application: KeyApplication) -> Self {
        AccountXpub { xpub, application }
    }

    /// Key application captured from the key version at parse time
    #[inline]
    pub fn application(&self) -> KeyApplication { self.application }

    /// Underlying BIP32 extended public key
    #[inline]
    pub fn as_xpub(&self) -> &ExtendedPubKey { &self.xpub }

    /// Depth of the key in the derivation hierarchy
    #[inline]
    pub fn depth(&self) -> u8 { self.xpub.depth }

    /// Child number with which the key was derived from its parent
    #[inline]
    pub fn child_number(&self) -> ChildNumber { self.xpub.child_number }

    /// Fingerprint of the parent key
    #[inline]
    pub fn parent_fingerprint(&self) -> Fingerprint { self.xpub.parent_fingerprint }

    /// Fingerprint of the key itself
    #[inline]
    pub fn fingerprint(&self) -> Fingerprint { self.xpub.fingerprint() }

    /// HASH160 of the public key
    #[inline]
    pub fn identifier(&self) -> XpubIdentifier { self.xpub.identifier() }

    /// Compressed public key
    #[inline]
    pub fn public_key(&self) -> secp256k1::PublicKey { self.xpub.public_key }

    /// Chain code
    #[inline]
    pub fn chain_code(&self) -> ChainCode { self.xpub.chain_code }

    /// BIP32 serialization of the key with the version bytes matching key
    /// application (without the checksum)
    pub fn encode(&self) -> [u8; slip132::XKEY_LEN] {
        let mut data = self.xpub.encode();
        data[0..4].copy_from_slice(
            slip132::KeyVersion::with_application(self.application).as_bytes(),
        );
        data
    }
}

impl Display for AccountXpub {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xpub.to_slip132_string(self.application))
    }
}

impl FromStr for AccountXpub {
    type Err = slip132::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (xpub, application) = ExtendedPubKey::from_slip132_str(s.trim())?;
        debug!(
            %application,
            depth = xpub.depth,
            fingerprint = %xpub.fingerprint(),
            "parsed extended public key"
        );
        Ok(AccountXpub { xpub, application })
    }
}
