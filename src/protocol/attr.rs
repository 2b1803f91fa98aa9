//! Attributes of signers.
//!
//! ```txt
//! Attribute ::= SEQUENCE {
//!   attrType OBJECT IDENTIFIER,
//!   attrValues SET OF AttributeValue }
//!
//! AttributeValue ::= ANY
//!
//! SignedAttributes ::= SET SIZE (1..MAX) OF Attribute
//!
//! UnsignedAttributes ::= SET SIZE (1..MAX) OF Attribute
//! ```

use bcder::{decode, encode};
use bcder::{Captured, Mode, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::error::AttributeError;
use super::anyset::AnySet;


//------------ Attribute -----------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    attr_type: Oid<Bytes>,
    values: AnySet,
}

impl Attribute {
    pub fn new(attr_type: Oid<Bytes>, values: AnySet) -> Self {
        Attribute { attr_type, values }
    }

    /// Creates an attribute with a single value.
    pub fn single(
        attr_type: impl AsRef<[u8]>,
        value: impl encode::Values
    ) -> Self {
        Attribute {
            attr_type: Oid(Bytes::copy_from_slice(attr_type.as_ref())),
            values: AnySet::from_value(value),
        }
    }

    pub fn attr_type(&self) -> &Oid<Bytes> {
        &self.attr_type
    }

    pub fn values(&self) -> &AnySet {
        &self.values
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(Self::from_constructed)
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Ok(Attribute {
            attr_type: Oid::take_from(cons)?,
            values: AnySet::take_from(cons)?,
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.attr_type.encode_ref(),
            self.values.encode_ref(),
        ))
    }

    pub fn to_captured(&self) -> Captured {
        self.encode_ref().to_captured(Mode::Der)
    }
}


//------------ Attributes ----------------------------------------------------

/// The signed or unsigned attributes of a signer.
///
/// Semantically this is a set, but the order of the attributes is kept.
/// Attributes that have been parsed are encoded again in the order they
/// appeared in, so that the octets a signature was created over can be
/// reproduced. Attributes added locally are inserted at the position
/// required by the DER ordering rules for SET OF.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Attributes {
    attrs: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a value from attributes in DER order.
    pub fn from_unsorted(attrs: impl IntoIterator<Item = Attribute>) -> Self {
        let mut res = Self::new();
        for attr in attrs {
            res.insert(attr)
        }
        res
    }

    /// Adds an attribute.
    ///
    /// The attribute is placed before the first attribute with a larger
    /// encoding.
    pub fn insert(&mut self, attr: Attribute) {
        let encoded = attr.to_captured();
        let pos = self.attrs.iter().position(|item| {
            item.to_captured().as_slice() > encoded.as_slice()
        }).unwrap_or(self.attrs.len());
        self.attrs.insert(pos, attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Returns the values of all attributes of the given type.
    pub fn get_values(
        &self, attr_type: &Oid<impl AsRef<[u8]>>
    ) -> Vec<&AnySet> {
        self.attrs.iter().filter(|attr| {
            attr.attr_type == *attr_type
        }).map(|attr| &attr.values).collect()
    }

    /// Returns the encoded value of a single-valued attribute.
    ///
    /// Fails if the attribute is not present exactly once or if it has
    /// more or less than one value.
    pub fn get_only_value(
        &self, attr_type: &Oid<impl AsRef<[u8]>>
    ) -> Result<&Captured, AttributeError> {
        let values = self.get_values(attr_type);
        if values.len() != 1 {
            return Err(AttributeError::AttributeCount(values.len()))
        }
        match values[0].elements() {
            [value] => Ok(value),
            elements => Err(AttributeError::ValueCount(elements.len()))
        }
    }

    /// Parses the content of an attribute set.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut attrs = Vec::new();
        while let Some(attr) = Attribute::take_opt_from(cons)? {
            attrs.push(attr)
        }
        Ok(Attributes { attrs })
    }

    /// Takes an implicitly tagged attribute set if present.
    pub fn take_opt_from_tagged<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        tag: Tag,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_constructed_if(tag, Self::from_constructed)
    }

    /// Returns a value encoder for the attributes using the given tag.
    pub fn encode_ref_as(&self, tag: Tag) -> impl encode::Values + '_ {
        encode::Constructed::new(
            tag,
            encode::slice(&self.attrs, |attr: &Attribute| attr.to_captured())
        )
    }

    /// Returns the octets a signature over the attributes is made over.
    ///
    /// Signed attributes appear with an implicit [0] tag. For calculating
    /// the signature, they are encoded with the SET OF tag instead, see
    /// section 5.4 of RFC 5652.
    pub fn marshaled_for_signing(&self) -> Bytes {
        self.encode_ref_as(Tag::SET).to_captured(Mode::Der).into_bytes()
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self::from_unsorted(iter)
    }
}


//============ Tests =========================================================
