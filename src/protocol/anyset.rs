//! Sets of arbitrary values.

use bcder::{decode, encode};
use bcder::{Captured, Mode, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::Values;
use crate::x509::decode_complete;


//------------ AnySet --------------------------------------------------------

/// A SET OF ANY.
///
/// The values are kept as their complete encoding, i.e., including tag
/// and length. Interpreting them is left to whoever knows what they are
/// supposed to be.
///
/// Decoded values stay in the order they were found, so encoding a
/// decoded set results in exactly the octets it was decoded from. Values
/// added via [`insert`][Self::insert] are placed in DER order.
#[derive(Clone, Debug, Default)]
pub struct AnySet {
    elements: Vec<Captured>,
}

impl AnySet {
    pub fn new(elements: Vec<Captured>) -> Self {
        AnySet { elements }
    }

    /// Creates a set with a single value.
    pub fn from_value(value: impl encode::Values) -> Self {
        AnySet { elements: vec![value.to_captured(Mode::Der)] }
    }

    pub fn elements(&self) -> &[Captured] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Captured> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Creates a set in DER order from values in any order.
    pub fn from_unsorted(
        values: impl IntoIterator<Item = Captured>
    ) -> Self {
        let mut res = AnySet::default();
        values.into_iter().for_each(|value| res.insert(value));
        res
    }

    /// Inserts a value.
    ///
    /// The value is placed before the first value with a larger encoding.
    pub fn insert(&mut self, value: Captured) {
        let pos = self.elements.iter().position(|item| {
            item.as_slice() > value.as_slice()
        }).unwrap_or(self.elements.len());
        self.elements.insert(pos, value)
    }
}


/// # Decoding and Encoding
///
impl AnySet {
    /// Decodes a complete set.
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        decode_complete(source, Self::take_from)
    }

    /// Takes a set tagged as SET from the beginning of a value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_set(Self::from_constructed)
    }

    /// Parses the content of a set.
    ///
    /// This is used directly for implicitly tagged sets.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut elements = Vec::new();
        loop {
            let value = cons.capture(|cons| cons.skip_one().map(|_| ()))?;
            if value.as_slice().is_empty() {
                break
            }
            elements.push(value);
        }
        Ok(AnySet { elements })
    }

    /// Returns a value encoder for the set tagged as SET.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        self.encode_ref_as(Tag::SET)
    }

    /// Returns a value encoder for the set using the given tag.
    pub fn encode_ref_as(&self, tag: Tag) -> impl encode::Values + '_ {
        encode::Constructed::new(
            tag,
            encode::slice(&self.elements, |value: &Captured| value.clone())
        )
    }

    /// Returns the complete encoding of the set.
    pub fn to_captured(&self) -> Captured {
        self.encode_ref().to_captured(Mode::Der)
    }
}


//--- PartialEq and Eq

impl PartialEq for AnySet {
    fn eq(&self, other: &Self) -> bool {
        self.elements.len() == other.elements.len()
        && self.elements.iter().zip(other.elements.iter()).all(|(l, r)| {
            l.as_slice() == r.as_slice()
        })
    }
}

impl Eq for AnySet { }


//============ Tests =========================================================
