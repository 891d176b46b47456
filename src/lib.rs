// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
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

//! Derivation of bitcoin mainnet addresses from SLIP-132 encoded extended
//! public keys (`xpub` for legacy P2PKH and `zpub` for native segwit P2WPKH)
//! along unhardened derivation templates like `m/0/x`.

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate tracing;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

pub extern crate slip132;

pub mod address;
mod derive;
mod deriver;
mod error;
mod index;
mod path;
mod xkey;

pub use address::{encode_address, p2pkh_address, p2wpkh_address, DerivedAddress, EncodeError};
pub use derive::{DeriveError, DerivePublic};
pub use deriver::{derive_address, AddressDeriver, AddressIter, RangeError};
pub use error::{Error, ErrorKind};
pub use index::{IndexError, IndexRange, UnhardenedIndex, HARDENED_INDEX_BOUNDARY};
pub use path::{DerivationTemplate, PathError, FINAL_SEGMENT, MAX_SEGMENTS, MIN_SEGMENTS, ROOT_SEGMENT};
pub use slip132::KeyApplication;
pub use xkey::AccountXpub;
