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

//! Encoding of derived public keys into mainnet P2PKH and P2WPKH addresses.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bech32::u5;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::PublicKey;
use bitcoin::util::address;
use bitcoin::util::base58;
use bitcoin::util::bip32::DerivationPath;
use bitcoin::Address;
use slip132::KeyApplication;

use crate::{AccountXpub, UnhardenedIndex};

/// Mainnet P2PKH address version byte
pub const P2PKH_VERSION_MAINNET: u8 = 0x00;

/// Human-readable part of mainnet bech32 addresses
pub const BECH32_HRP_MAINNET: &str = "bc";

/// Witness version used by P2WPKH outputs
pub const WITNESS_VERSION_V0: u8 = 0;

/// Errors encoding public key into an address string
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum EncodeError {
    /// bech32 encoding failure: {0}
    #[from]
    Bech32(bech32::Error),

    /// witness program value {0} does not fit into 5 bits
    InvalidBase32(u8),
}

/// Produces legacy P2PKH address: Base58Check encoding of mainnet version
/// byte followed by HASH160 of the compressed public key
pub fn p2pkh_address(pk: &PublicKey) -> String {
    let hash = hash160::Hash::hash(&pk.serialize());
    let mut data = Vec::with_capacity(1 + hash160::Hash::LEN);
    data.push(P2PKH_VERSION_MAINNET);
    data.extend_from_slice(&hash[..]);
    base58::check_encode_slice(&data)
}

/// Produces native segwit v0 P2WPKH address: bech32 encoding of the witness
/// version and HASH160 of the compressed public key with `bc` prefix
pub fn p2wpkh_address(pk: &PublicKey) -> Result<String, EncodeError> {
    let hash = hash160::Hash::hash(&pk.serialize());
    let program = bech32::convert_bits(&hash[..], 8, 5, true)?;
    let mut data = Vec::with_capacity(1 + program.len());
    data.push(u5::try_from_u8(WITNESS_VERSION_V0)?);
    for value in program {
        data.push(u5::try_from_u8(value).map_err(|_| EncodeError::InvalidBase32(value))?);
    }
    Ok(bech32::encode(BECH32_HRP_MAINNET, data, bech32::Variant::Bech32)?)
}

/// Encodes public key into the address format matching key application
pub fn encode_address(pk: &PublicKey, application: KeyApplication) -> Result<String, EncodeError> {
    match application {
        KeyApplication::Legacy => Ok(p2pkh_address(pk)),
        KeyApplication::SegWit => p2wpkh_address(pk),
    }
}

impl AccountXpub {
    /// Encodes the key into an address, using legacy or segwit format
    /// depending on the key application
    pub fn address(&self) -> Result<String, EncodeError> {
        encode_address(&self.xpub.public_key, self.application)
    }
}

/// Address produced by derivation, together with the information on how it
/// was obtained
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DerivedAddress {
    /// Key application which selected the address format
    pub application: KeyApplication,

    /// Final derivation index substituted into the template
    pub index: UnhardenedIndex,

    /// Full derivation path relative to the extended public key
    pub path: DerivationPath,

    /// Address string
    pub address: String,
}

impl DerivedAddress {
    /// Parses address string back into [`bitcoin::Address`]
    pub fn to_address(&self) -> Result<Address, address::Error> { Address::from_str(&self.address) }
}

impl Display for DerivedAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{} {}", self.path, self.address)
        } else {
            f.write_str(&self.address)
        }
    }
}
