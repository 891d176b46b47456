// SLIP-132 library for parsing custom xpub/xpriv key formats
// Written in 2021 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache 2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! SLIP-132 version bytes for bitcoin mainnet extended public keys.
//!
//! Only two key applications are accepted by this crate: `xpub` keys, used
//! for legacy P2PKH addresses, and `zpub` keys, used for native segwit P2WPKH
//! addresses. All other SLIP-132 prefixes are recognized in order to produce
//! a precise error, but are not parsed.

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::util::base58;
use bitcoin::util::bip32::{ChildNumber, DerivationPath, ExtendedPubKey};

/// Magical version bytes for xpub: bitcoin mainnet public key for P2PKH or P2SH
pub const VERSION_MAGIC_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// Magical version bytes for xprv: bitcoin mainnet private key for P2PKH or
/// P2SH
pub const VERSION_MAGIC_XPRV: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
/// Magical version bytes for ypub: bitcoin mainnet public key for P2WPKH in
/// P2SH
pub const VERSION_MAGIC_YPUB: [u8; 4] = [0x04, 0x9D, 0x7C, 0xB2];
/// Magical version bytes for yprv: bitcoin mainnet private key for P2WPKH in
/// P2SH
pub const VERSION_MAGIC_YPRV: [u8; 4] = [0x04, 0x9D, 0x78, 0x78];
/// Magical version bytes for zpub: bitcoin mainnet public key for P2WPKH
pub const VERSION_MAGIC_ZPUB: [u8; 4] = [0x04, 0xB2, 0x47, 0x46];
/// Magical version bytes for zprv: bitcoin mainnet private key for P2WPKH
pub const VERSION_MAGIC_ZPRV: [u8; 4] = [0x04, 0xB2, 0x43, 0x0C];
/// Magical version bytes for Ypub: bitcoin mainnet public key for
/// multi-signature P2WSH in P2SH
pub const VERSION_MAGIC_YPUB_MULTISIG: [u8; 4] = [0x02, 0x95, 0xb4, 0x3f];
/// Magical version bytes for Zpub: bitcoin mainnet public key for
/// multi-signature P2WSH
pub const VERSION_MAGIC_ZPUB_MULTISIG: [u8; 4] = [0x02, 0xaa, 0x7e, 0xd3];

/// Magical version bytes for tpub: bitcoin testnet/regtest public key for
/// P2PKH or P2SH
pub const VERSION_MAGIC_TPUB: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
/// Magical version bytes for tprv: bitcoin testnet/regtest private key for
/// P2PKH or P2SH
pub const VERSION_MAGIC_TPRV: [u8; 4] = [0x04, 0x35, 0x83, 0x94];
/// Magical version bytes for upub: bitcoin testnet/regtest public key for
/// P2WPKH in P2SH
pub const VERSION_MAGIC_UPUB: [u8; 4] = [0x04, 0x4A, 0x52, 0x62];
/// Magical version bytes for vpub: bitcoin testnet/regtest public key for
/// P2WPKH
pub const VERSION_MAGIC_VPUB: [u8; 4] = [0x04, 0x5F, 0x1C, 0xF6];
/// Magical version bytes for vprv: bitcoin testnet/regtest private key for
/// P2WPKH
pub const VERSION_MAGIC_VPRV: [u8; 4] = [0x04, 0x5F, 0x18, 0xBC];

/// Length of BIP32 extended key serialization without the checksum
pub const XKEY_LEN: usize = 78;

/// Extended public key parsing errors
#[derive(Clone, PartialEq, Eq, Debug, Display, From, Error)]
#[display(doc_comments)]
pub enum Error {
    /// error in BASE58 key encoding: {0}
    #[from]
    Base58(base58::Error),

    /// encoded extended key data has wrong length {0} (78 bytes expected)
    WrongExtendedKeyLength(usize),

    /// unknown extended key version magic bytes {0}
    UnknownVersion(KeyVersion),

    /// extended private key with version {0} was provided where an extended
    /// public key is required
    PrivateKey(KeyVersion),

    /// extended key version {0} belongs to bitcoin testnet, while only
    /// mainnet keys are supported
    TestnetKey(KeyVersion),

    /// extended public key version {0} is not supported; only xpub (P2PKH)
    /// and zpub (P2WPKH) keys can be used
    UnsupportedApplication(KeyVersion),

    /// extended key data are not a valid BIP32 extended public key
    InvalidKeyData,
}

/// Structure holding 4 version bytes with magical numbers representing
/// different versions of extended public and private keys according to BIP-32
/// and SLIP-132.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KeyVersion([u8; 4]);

impl Display for KeyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "{:08x}", self.to_u32()) }
}

impl KeyVersion {
    /// Tries to construct [`KeyVersion`] object from a byte slice. If byte
    /// slice length is not equal to 4, returns `None`
    pub fn from_slice(version_slice: &[u8]) -> Option<KeyVersion> {
        let bytes: [u8; 4] = version_slice.try_into().ok()?;
        Some(KeyVersion(bytes))
    }

    /// Constructs [`KeyVersion`] from a fixed 4 bytes values
    pub const fn from_bytes(version_bytes: [u8; 4]) -> KeyVersion { KeyVersion(version_bytes) }

    /// Constructs mainnet public key version for the given key application
    pub const fn with_application(application: KeyApplication) -> KeyVersion {
        match application {
            KeyApplication::Legacy => KeyVersion(VERSION_MAGIC_XPUB),
            KeyApplication::SegWit => KeyVersion(VERSION_MAGIC_ZPUB),
        }
    }

    /// Converts version bytes into `u32` representation in big endian format
    pub fn to_u32(&self) -> u32 { u32::from_be_bytes(self.0) }

    /// Returns internal representation of version bytes
    pub fn as_bytes(&self) -> &[u8; 4] { &self.0 }

    /// Detects whether the version corresponds to an extended private key.
    /// Returns `None` if the version is not recognized.
    pub fn is_prv(&self) -> Option<bool> {
        match self.0 {
            VERSION_MAGIC_XPRV | VERSION_MAGIC_YPRV | VERSION_MAGIC_ZPRV | VERSION_MAGIC_TPRV
            | VERSION_MAGIC_VPRV => Some(true),
            VERSION_MAGIC_XPUB
            | VERSION_MAGIC_YPUB
            | VERSION_MAGIC_ZPUB
            | VERSION_MAGIC_YPUB_MULTISIG
            | VERSION_MAGIC_ZPUB_MULTISIG
            | VERSION_MAGIC_TPUB
            | VERSION_MAGIC_UPUB
            | VERSION_MAGIC_VPUB => Some(false),
            _ => None,
        }
    }

    /// Detects whether the version is specific to bitcoin testnet or regtest.
    /// Returns `None` if the version is not recognized.
    pub fn is_testnet(&self) -> Option<bool> {
        match self.0 {
            VERSION_MAGIC_TPUB | VERSION_MAGIC_TPRV | VERSION_MAGIC_UPUB | VERSION_MAGIC_VPUB
            | VERSION_MAGIC_VPRV => Some(true),
            _ => self.is_prv().map(|_| false),
        }
    }

    /// Detects application scope of a mainnet extended public key. Returns
    /// `None` for all other versions, including recognized ones.
    pub fn application(&self) -> Option<KeyApplication> {
        match self.0 {
            VERSION_MAGIC_XPUB => Some(KeyApplication::Legacy),
            VERSION_MAGIC_ZPUB => Some(KeyApplication::SegWit),
            _ => None,
        }
    }

    /// Checks that the version can be parsed by this crate, returning the key
    /// application it defines.
    pub fn check_supported(&self) -> Result<KeyApplication, Error> {
        if let Some(application) = self.application() {
            return Ok(application);
        }
        match (self.is_prv(), self.is_testnet()) {
            (None, _) | (_, None) => Err(Error::UnknownVersion(*self)),
            (Some(true), _) => Err(Error::PrivateKey(*self)),
            (_, Some(true)) => Err(Error::TestnetKey(*self)),
            _ => Err(Error::UnsupportedApplication(*self)),
        }
    }
}

/// Key applications defining types of scriptPubkey (and thus address format)
/// for which an extended public key is used
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
pub enum KeyApplication {
    /// xpub: keys used for legacy P2PKH addresses
    #[display("BIP44")]
    #[cfg_attr(feature = "serde", serde(rename = "bip44"))]
    Legacy,

    /// zpub: keys used for native segwit P2WPKH addresses
    #[display("BIP84")]
    #[cfg_attr(feature = "serde", serde(rename = "bip84"))]
    SegWit,
}

/// unknown key application; use `legacy` or `segwit`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct UnknownKeyApplicationError;

impl FromStr for KeyApplication {
    type Err = UnknownKeyApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "bip44" | "legacy" | "xpub" => KeyApplication::Legacy,
            "bip84" | "segwit" | "zpub" => KeyApplication::SegWit,
            _ => return Err(UnknownKeyApplicationError),
        })
    }
}

impl KeyApplication {
    /// All key applications supported by the crate
    pub const ALL: [KeyApplication; 2] = [KeyApplication::Legacy, KeyApplication::SegWit];

    /// Standard account-level derivation path for the application (without the
    /// account index), as defined by BIP-44 and BIP-84.
    pub fn to_derivation_path(&self) -> DerivationPath {
        let purpose = match self {
            KeyApplication::Legacy => 44,
            KeyApplication::SegWit => 84,
        };
        DerivationPath::from(vec![
            ChildNumber::Hardened { index: purpose },
            ChildNumber::Hardened { index: 0 },
        ])
    }
}

/// Parsing extended keys from SLIP-132 strings
pub trait FromSlip132 {
    /// Parses SLIP-132 encoded key string, returning the key together with
    /// the application defined by its version bytes.
    fn from_slip132_str(s: &str) -> Result<(Self, KeyApplication), Error>
    where
        Self: Sized;
}

impl FromSlip132 for ExtendedPubKey {
    fn from_slip132_str(s: &str) -> Result<(Self, KeyApplication), Error> {
        let mut data = base58::from_check(s)?;
        if data.len() != XKEY_LEN {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }

        let version = KeyVersion::from_slice(&data[0..4]).expect("slice of four bytes");
        let application = version.check_supported()?;
        // rust-bitcoin knows nothing about SLIP-132
        data[0..4].copy_from_slice(&VERSION_MAGIC_XPUB);

        let xpub = ExtendedPubKey::decode(&data).map_err(|_| Error::InvalidKeyData)?;

        Ok((xpub, application))
    }
}

/// Serializing extended keys into SLIP-132 strings
pub trait ToSlip132 {
    /// Encodes key with version bytes matching the key application
    fn to_slip132_string(&self, key_application: KeyApplication) -> String;
}

impl ToSlip132 for ExtendedPubKey {
    fn to_slip132_string(&self, key_application: KeyApplication) -> String {
        let key_version = KeyVersion::with_application(key_application);
        let mut xpub = self.encode();
        xpub[0..4].copy_from_slice(key_version.as_bytes());
        base58::check_encode_slice(&xpub)
    }
}
