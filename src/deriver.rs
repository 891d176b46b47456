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

//! Address derivation pipeline: extended key and derivation template in,
//! addresses out.

use std::iter::FusedIterator;
use std::str::FromStr;

use bitcoin::secp256k1::{Secp256k1, Verification};
use secp256k1::SECP256K1;

use crate::{
    AccountXpub, DeriveError, DerivePublic, DerivationTemplate, DerivedAddress, Error, ErrorKind,
    IndexRange, UnhardenedIndex,
};

/// Failure of a range derivation, reporting the index at which the
/// derivation has stopped
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display("unable to produce address #{index}: {error}")]
pub struct RangeError {
    /// Final derivation index which has failed
    pub index: UnhardenedIndex,
    /// The cause of the failure
    pub error: Error,
}

impl RangeError {
    /// Kind of the underlying error
    #[inline]
    pub fn kind(&self) -> ErrorKind { self.error.kind() }
}

/// Produces addresses for a fixed extended public key and a derivation
/// template, substituting the final index of the template.
///
/// The key for the interior part of the template is derived once on
/// construction; each address then requires a single CKDpub step.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AddressDeriver {
    xpub: AccountXpub,
    template: DerivationTemplate,
    parent: AccountXpub,
}

impl AddressDeriver {
    /// Constructs deriver, deriving the parent key for the template interior
    /// path using global secp256k1 context
    pub fn new(xpub: AccountXpub, template: DerivationTemplate) -> Result<Self, DeriveError> {
        Self::with(SECP256K1, xpub, template)
    }

    /// Constructs deriver using the provided secp256k1 context
    pub fn with<C: Verification>(
        secp: &Secp256k1<C>,
        xpub: AccountXpub,
        template: DerivationTemplate,
    ) -> Result<Self, DeriveError> {
        let parent = xpub.derive_path(secp, template.indexes().iter().copied())?;
        debug!(%template, depth = parent.depth(), "prepared address deriver");
        Ok(AddressDeriver {
            xpub,
            template,
            parent,
        })
    }

    /// Parses extended public key and derivation template strings and
    /// constructs the deriver out of them
    pub fn parse(key: &str, path: &str) -> Result<Self, Error> {
        let xpub = AccountXpub::from_str(key)?;
        let template = DerivationTemplate::from_str(path)?;
        Ok(Self::new(xpub, template)?)
    }

    /// Extended public key used as the derivation root
    #[inline]
    pub fn xpub(&self) -> &AccountXpub { &self.xpub }

    /// Derivation template
    #[inline]
    pub fn template(&self) -> &DerivationTemplate { &self.template }

    /// Key at the interior path of the template, from which final indexes
    /// are derived
    #[inline]
    pub fn parent(&self) -> &AccountXpub { &self.parent }

    /// Derives child extended key for the final index
    pub fn derive_key(&self, index: UnhardenedIndex) -> Result<AccountXpub, DeriveError> {
        self.parent.derive_child(SECP256K1, index)
    }

    /// Derives address for the final index
    pub fn derive(&self, index: UnhardenedIndex) -> Result<DerivedAddress, Error> {
        self.derive_with(SECP256K1, index)
    }

    /// Derives address for the final index using provided secp256k1 context
    pub fn derive_with<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: UnhardenedIndex,
    ) -> Result<DerivedAddress, Error> {
        let key = self.parent.derive_child(secp, index)?;
        let address = key.address()?;
        debug!(%index, %address, "derived address");
        Ok(DerivedAddress {
            application: key.application(),
            index,
            path: self.template.to_derivation_path(index),
            address,
        })
    }

    /// Derives addresses for all indexes in the range. Stops at the first
    /// failure, reporting the index which has failed; no addresses are
    /// returned in this case.
    pub fn derive_range(&self, range: &IndexRange) -> Result<Vec<DerivedAddress>, RangeError> {
        self.iter(range).collect()
    }

    /// Lazily iterates over addresses for all indexes in the range. The
    /// iterator yields the first error and then terminates.
    pub fn iter(&self, range: &IndexRange) -> AddressIter<'_> {
        AddressIter {
            deriver: self,
            next: Some(range.start()),
            end: range.end(),
        }
    }
}

/// Iterator over derived addresses, created by [`AddressDeriver::iter`]
#[derive(Clone, Debug)]
pub struct AddressIter<'deriver> {
    deriver: &'deriver AddressDeriver,
    next: Option<UnhardenedIndex>,
    end: UnhardenedIndex,
}

impl<'deriver> Iterator for AddressIter<'deriver> {
    type Item = Result<DerivedAddress, RangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = index.checked_inc().filter(|next| *next <= self.end);
        match self.deriver.derive(index) {
            Ok(address) => Some(Ok(address)),
            Err(error) => {
                warn!(%index, kind = %error.kind(), "address derivation stopped: {}", error);
                self.next = None;
                Some(Err(RangeError { index, error }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            None => (0, Some(0)),
            Some(next) => (0, Some((self.end.index() - next.index()) as usize + 1)),
        }
    }
}

impl<'deriver> FusedIterator for AddressIter<'deriver> {}

/// One-shot derivation of a single address from string representations of
/// the extended public key and derivation template
pub fn derive_address(key: &str, path: &str, index: UnhardenedIndex) -> Result<String, Error> {
    AddressDeriver::parse(key, path)?
        .derive(index)
        .map(|derived| derived.address)
}

#[cfg(test)]
mod test {
    use slip132::KeyApplication;

    use super::*;

    const XPUB: &str = "xpub661MyMwAqRbcGYzUcVc8JSnN3RcM47JHWMaqtE8yhMfHZohujgvQjX2ezdw2qw6sSMu8B694BQebnASCNvbkZWiBVRvFimSAwgVphguL6LD";
    const ZPUB: &str = "zpub6jftahH18ngZy9NiHDBNicyNPMuEwMHHLadHT1vkTNR3g1LNF1FXyeLw33rCqkQiFe8jg3LB6jMhYjfKpKRn9z5PE7K6tb59V8d7UnyTn6f";

    fn idx(index: u32) -> UnhardenedIndex { UnhardenedIndex::from_index(index).unwrap() }

    #[test]
    fn single_address() {
        assert_eq!(
            derive_address(XPUB, "m/0/x", UnhardenedIndex::ZERO).unwrap(),
            "1LxgPnAfW5QHJ5GTp8cnaXENYRDDjgs9ZL"
        );
        assert_eq!(
            derive_address(ZPUB, "m/0/x", UnhardenedIndex::ZERO).unwrap(),
            "bc1qmtezddr37jvhywdrgw4ke2gacxm9043e6cgdrh"
        );
        assert_eq!(
            derive_address(XPUB, "m/x", UnhardenedIndex::ZERO).unwrap(),
            "1EEmr6XdvovmggqUkc1C1j7SruxQw7dX1v"
        );
    }

    #[test]
    fn deriver_details() {
        let deriver = AddressDeriver::parse(ZPUB, "m/0/x").unwrap();
        assert_eq!(deriver.parent().depth(), 1);
        assert_eq!(deriver.xpub().application(), KeyApplication::SegWit);
        assert_eq!(deriver.template().to_string(), "m/0/x");

        let derived = deriver.derive(idx(1)).unwrap();
        assert_eq!(derived.application, KeyApplication::SegWit);
        assert_eq!(derived.index, idx(1));
        assert_eq!(derived.path.to_string(), "m/0/1");
        assert_eq!(derived.address, "bc1q2y8uss9xjy86qtskjg2vuufgvjevyglguu0fa2");

        let key = deriver.derive_key(idx(1)).unwrap();
        assert_eq!(key.depth(), 2);
        assert_eq!(key.address().unwrap(), derived.address);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            AddressDeriver::parse("xpub123", "m/0/x").unwrap_err().kind(),
            ErrorKind::InvalidKey
        );
        assert_eq!(AddressDeriver::parse(XPUB, "m/0").unwrap_err().kind(), ErrorKind::InvalidPath);
        assert_eq!(
            derive_address(XPUB, "m/2147483648/x", UnhardenedIndex::ZERO)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidPath
        );
    }

    #[test]
    fn range() {
        let deriver = AddressDeriver::parse(XPUB, "m/0/x").unwrap();
        let range = IndexRange::from_str("0-2").unwrap();
        let addresses = deriver
            .derive_range(&range)
            .unwrap()
            .into_iter()
            .map(|derived| derived.address)
            .collect::<Vec<_>>();
        assert_eq!(addresses, vec![
            s!("1LxgPnAfW5QHJ5GTp8cnaXENYRDDjgs9ZL"),
            s!("18Pce7DtX7L2SKg9WMphHzCMX4zLyDTd9r"),
            s!("1C8dqNSy55F3o66gfe7mtBBpXeLch4aCs8"),
        ]);
        assert_eq!(deriver.iter(&range).size_hint(), (0, Some(3)));
    }

    #[test]
    fn range_at_the_boundary() {
        let deriver = AddressDeriver::parse(XPUB, "m/x").unwrap();
        let range = IndexRange::with_count(UnhardenedIndex::MAX, 10).unwrap();
        let mut iter = deriver.iter(&range);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
    }

    #[test]
    fn range_stops_at_first_failure() {
        let mut xpub = AccountXpub::from_str(XPUB).unwrap();
        xpub.xpub.depth = u8::MAX - 1;
        let deriver = AddressDeriver::new(xpub, DerivationTemplate::single_level()).unwrap();
        assert!(deriver.derive(idx(3)).is_ok());

        xpub.xpub.depth = u8::MAX;
        let deriver = AddressDeriver::new(xpub, DerivationTemplate::single_level()).unwrap();
        let range = IndexRange::from_str("3-10").unwrap();
        let err = deriver.derive_range(&range).unwrap_err();
        assert_eq!(err.index, idx(3));
        assert_eq!(err.kind(), ErrorKind::DerivationFailed);

        let mut iter = deriver.iter(&range);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn failing_full_range_returns_error() {
        let mut xpub = AccountXpub::from_str(XPUB).unwrap();
        xpub.xpub.depth = u8::MAX;
        let deriver = AddressDeriver::new(xpub, DerivationTemplate::single_level()).unwrap();
        let range = IndexRange::with(UnhardenedIndex::ZERO, UnhardenedIndex::MAX).unwrap();
        assert_eq!(range.count(), 1 << 31);
        let err = deriver.derive_range(&range).unwrap_err();
        assert_eq!(err.index, UnhardenedIndex::ZERO);
        assert_eq!(err.kind(), ErrorKind::DerivationFailed);
    }
}
