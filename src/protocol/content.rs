//! Content info types.

use bcder::{decode, encode};
use bcder::{Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::oid;
use crate::ber::ber_to_der;
use crate::error::{ParseError, WrongType};
use crate::x509::decode_complete;
use super::signed::SignedData;


//------------ ContentInfo ---------------------------------------------------

/// The outermost structure of a CMS message.
///
/// ```txt
/// ContentInfo ::= SEQUENCE {
///   contentType ContentType,
///   content [0] EXPLICIT ANY DEFINED BY contentType }
///
/// ContentType ::= OBJECT IDENTIFIER
/// ```
///
/// The content is kept in its encoded form. Of the possible content types,
/// only signed data can be interpreted via
/// [`signed_data_content`][Self::signed_data_content].
#[derive(Clone, Debug)]
pub struct ContentInfo {
    content_type: Oid<Bytes>,
    content: Captured,
}

impl ContentInfo {
    pub fn new(content_type: Oid<Bytes>, content: Captured) -> Self {
        ContentInfo { content_type, content }
    }

    /// Creates a content info wrapping signed data.
    pub fn from_signed_data(signed_data: &SignedData) -> Self {
        ContentInfo {
            content_type: Oid(Bytes::from_static(oid::SIGNED_DATA.0)),
            content: signed_data.to_captured(),
        }
    }

    /// Parses a content info from BER encoded data.
    ///
    /// The data is normalized to DER first. Trailing data after the
    /// content info is an error.
    pub fn parse(ber: &[u8]) -> Result<Self, ParseError> {
        let der = Bytes::from(ber_to_der(ber)?);
        decode_complete(der, Self::take_from).map_err(Into::into)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(ContentInfo {
                content_type: Oid::take_from(cons)?,
                content: cons.take_constructed_if(Tag::CTX_0, |cons| {
                    cons.capture_one()
                })?,
            })
        })
    }

    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns the encoded content.
    pub fn content(&self) -> &Captured {
        &self.content
    }

    /// Returns the content assuming it is signed data.
    pub fn signed_data_content(&self) -> Result<SignedData, ParseError> {
        if self.content_type != oid::SIGNED_DATA {
            return Err(WrongType.into())
        }
        self.content.clone().decode(
            SignedData::take_from
        ).map_err(Into::into)
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            encode::sequence_as(Tag::CTX_0, &self.content),
        ))
    }

    /// Returns the DER encoding of the content info.
    pub fn to_bytes(&self) -> Bytes {
        self.encode_ref().to_captured(Mode::Der).into_bytes()
    }
}


//------------ EncapsulatedContentInfo ---------------------------------------

/// The content carried inside signed data.
///
/// ```txt
/// EncapsulatedContentInfo ::= SEQUENCE {
///   eContentType ContentType,
///   eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
///
/// If the content is missing, the signed data is a detached signature.
#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo {
    content_type: Oid<Bytes>,
    content: Option<OctetString>,
}

impl EncapsulatedContentInfo {
    /// Creates a value encapsulating data.
    pub fn new_data(data: Bytes) -> Self {
        EncapsulatedContentInfo {
            content_type: Oid(Bytes::from_static(oid::DATA.0)),
            content: Some(OctetString::new(data)),
        }
    }

    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns whether the content is missing.
    pub fn is_detached(&self) -> bool {
        self.content.is_none()
    }

    /// Removes the content.
    pub fn detach(&mut self) {
        self.content = None
    }

    /// Returns the content assuming the content type is data.
    ///
    /// Returns `Ok(None)` if the content is missing. If the content was
    /// encoded as a constructed octet string, the fragments are joined.
    pub fn data_econtent(&self) -> Result<Option<Bytes>, WrongType> {
        if self.content_type != oid::DATA {
            return Err(WrongType)
        }
        Ok(self.content.as_ref().map(OctetString::to_bytes))
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(EncapsulatedContentInfo {
                content_type: Oid::take_from(cons)?,
                content: cons.take_opt_constructed_if(
                    Tag::CTX_0, OctetString::take_from
                )?,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            self.content.as_ref().map(|content| {
                encode::sequence_as(Tag::CTX_0, content.encode_ref())
            }),
        ))
    }
}


//============ Tests =========================================================
