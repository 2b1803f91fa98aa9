//! Signer information.

use bcder::{decode, encode};
use bcder::{Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::oid;
use crate::cert::Cert;
use crate::crypto::{DigestAlgorithm, KeyIdentifier, SignatureAlgorithm};
use crate::error::{AttributeError, VerificationError, WrongType};
use crate::x509::{Name, Serial, Time};
use super::alg::AlgorithmIdentifier;
use super::attr::{Attribute, Attributes};


//------------ IssuerAndSerialNumber -----------------------------------------

/// Identifies a certificate by its issuer and serial number.
///
/// ```txt
/// IssuerAndSerialNumber ::= SEQUENCE {
///   issuer Name,
///   serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IssuerAndSerialNumber {
    issuer: Name,
    serial_number: Serial,
}

impl IssuerAndSerialNumber {
    /// Creates the value identifying the given certificate.
    pub fn new(cert: &Cert) -> Self {
        IssuerAndSerialNumber {
            issuer: cert.issuer().clone(),
            serial_number: cert.serial_number().clone(),
        }
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn serial_number(&self) -> &Serial {
        &self.serial_number
    }

    /// Returns whether the value identifies the given certificate.
    pub fn matches(&self, cert: &Cert) -> bool {
        self.issuer == *cert.issuer()
            && self.serial_number == *cert.serial_number()
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(IssuerAndSerialNumber {
                issuer: Name::take_from(cons)?,
                serial_number: Serial::take_from(cons)?,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.issuer.encode_ref(),
            self.serial_number.encode_ref(),
        ))
    }
}


//------------ SignerIdentifier ----------------------------------------------

/// Identifies the certificate of a signer.
///
/// ```txt
/// SignerIdentifier ::= CHOICE {
///   issuerAndSerialNumber IssuerAndSerialNumber,
///   subjectKeyIdentifier [0] SubjectKeyIdentifier }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber(IssuerAndSerialNumber),
    SubjectKeyIdentifier(KeyIdentifier),
}

impl SignerIdentifier {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        if let Some(ski) = cons.take_opt_value_if(
            Tag::CTX_0, KeyIdentifier::from_content
        )? {
            return Ok(SignerIdentifier::SubjectKeyIdentifier(ski))
        }
        IssuerAndSerialNumber::take_from(cons).map(
            SignerIdentifier::IssuerAndSerialNumber
        )
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        match *self {
            SignerIdentifier::IssuerAndSerialNumber(ref isn) => {
                encode::Choice2::One(isn.encode_ref())
            }
            SignerIdentifier::SubjectKeyIdentifier(ref ski) => {
                encode::Choice2::Two(ski.encode_ref_as(Tag::CTX_0))
            }
        }
    }
}


//------------ SignerInfo ----------------------------------------------------

/// The information about a single signer.
///
/// ```txt
/// SignerInfo ::= SEQUENCE {
///   version CMSVersion,
///   sid SignerIdentifier,
///   digestAlgorithm DigestAlgorithmIdentifier,
///   signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///   signatureAlgorithm SignatureAlgorithmIdentifier,
///   signature SignatureValue,
///   unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
///
/// SignatureValue ::= OCTET STRING
/// ```
///
/// Version 1 goes with an issuer and serial number signer identifier,
/// version 3 with a subject key identifier.
#[derive(Clone, Debug)]
pub struct SignerInfo {
    version: u8,
    sid: SignerIdentifier,
    digest_algorithm: AlgorithmIdentifier,
    signed_attrs: Option<Attributes>,
    signature_algorithm: AlgorithmIdentifier,
    signature: Bytes,
    unsigned_attrs: Option<Attributes>,
}

impl SignerInfo {
    /// Creates a new version 1 signer info.
    pub fn new(
        cert: &Cert,
        digest_algorithm: AlgorithmIdentifier,
        signed_attrs: Option<Attributes>,
        signature_algorithm: AlgorithmIdentifier,
        signature: Bytes,
    ) -> Self {
        SignerInfo {
            version: 1,
            sid: SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber::new(cert)
            ),
            digest_algorithm,
            signed_attrs,
            signature_algorithm,
            signature,
            unsigned_attrs: None,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn sid(&self) -> &SignerIdentifier {
        &self.sid
    }

    pub fn digest_algorithm(&self) -> &AlgorithmIdentifier {
        &self.digest_algorithm
    }

    pub fn signed_attrs(&self) -> Option<&Attributes> {
        self.signed_attrs.as_ref()
    }

    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn unsigned_attrs(&self) -> Option<&Attributes> {
        self.unsigned_attrs.as_ref()
    }

    /// Returns the digest algorithm or `None` if we don’t support it.
    pub fn hash(&self) -> Option<DigestAlgorithm> {
        self.digest_algorithm.digest_algorithm()
    }

    /// Returns the algorithm for verifying the signature.
    ///
    /// This combines the signature and digest algorithms and returns
    /// `SignatureAlgorithm::Unknown` for combinations we don’t support.
    pub fn x509_signature_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::from_cms_oids(
            self.signature_algorithm.algorithm(),
            self.digest_algorithm.algorithm(),
        )
    }

    /// Finds the certificate of the signer among `certs`.
    pub fn find_certificate<'a>(
        &self, certs: &'a [Cert]
    ) -> Result<&'a Cert, VerificationError> {
        if certs.is_empty() {
            return Err(VerificationError::new("no certificates"))
        }
        match (self.version, &self.sid) {
            (1, SignerIdentifier::IssuerAndSerialNumber(isn)) => {
                certs.iter().find(|cert| isn.matches(cert))
            }
            (3, SignerIdentifier::SubjectKeyIdentifier(ski)) => {
                certs.iter().find(|cert| {
                    cert.subject_key_identifier() == Some(ski)
                })
            }
            (1, _) | (3, _) => return Err(WrongType.into()),
            _ => {
                return Err(VerificationError::new(
                    "unknown SignerInfo version"
                ))
            }
        }.ok_or_else(|| VerificationError::new("no matching certificate"))
    }
}


/// # Attribute Access
///
impl SignerInfo {
    fn signed_attr(
        &self, attr_type: &Oid<impl AsRef<[u8]>>
    ) -> Result<&Captured, AttributeError> {
        match self.signed_attrs {
            Some(ref attrs) => attrs.get_only_value(attr_type),
            None => Err(AttributeError::AttributeCount(0)),
        }
    }

    /// Returns the value of the content type signed attribute.
    pub fn content_type(&self) -> Result<Oid<Bytes>, AttributeError> {
        self.signed_attr(&oid::CONTENT_TYPE)?.clone().decode(
            Oid::take_from
        ).map_err(Into::into)
    }

    /// Returns the value of the message digest signed attribute.
    pub fn message_digest(&self) -> Result<Bytes, AttributeError> {
        self.signed_attr(&oid::MESSAGE_DIGEST)?.clone().decode(|cons| {
            OctetString::take_from(cons).map(OctetString::into_bytes)
        }).map_err(Into::into)
    }

    /// Returns the value of the signing time signed attribute.
    ///
    /// Both UTCTime and GeneralizedTime are accepted.
    pub fn signing_time(&self) -> Result<Time, AttributeError> {
        self.signed_attr(&oid::SIGNING_TIME)?.clone().decode(
            Time::take_from
        ).map_err(Into::into)
    }

    /// Adds an unsigned attribute.
    pub fn add_unsigned_attribute(&mut self, attr: Attribute) {
        self.unsigned_attrs.get_or_insert_with(Attributes::new).insert(attr)
    }

    /// Adds a time-stamp token as an unsigned attribute.
    ///
    /// The token is the encoded ContentInfo returned by a time-stamping
    /// authority as defined in RFC 3161. It is added as is.
    pub fn add_timestamp_token(&mut self, token: Captured) {
        self.add_unsigned_attribute(
            Attribute::single(oid::AA_TIME_STAMP_TOKEN.0, token)
        )
    }

    /// Returns the time-stamp tokens present in the unsigned attributes.
    pub fn timestamp_tokens(&self) -> Vec<&Captured> {
        match self.unsigned_attrs {
            Some(ref attrs) => {
                attrs.get_values(&oid::AA_TIME_STAMP_TOKEN).into_iter()
                    .flat_map(|values| values.elements())
                    .collect()
            }
            None => Vec::new()
        }
    }
}


/// # Decoding and Encoding
///
impl SignerInfo {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(Self::from_constructed)
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Ok(SignerInfo {
            version: cons.take_u8()?,
            sid: SignerIdentifier::take_from(cons)?,
            digest_algorithm: AlgorithmIdentifier::take_from(cons)?,
            signed_attrs: Attributes::take_opt_from_tagged(
                cons, Tag::CTX_0
            )?,
            signature_algorithm: AlgorithmIdentifier::take_from(cons)?,
            signature: OctetString::take_from(cons)?.into_bytes(),
            unsigned_attrs: Attributes::take_opt_from_tagged(
                cons, Tag::CTX_1
            )?,
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.version.encode(),
            self.sid.encode_ref(),
            self.digest_algorithm.encode_ref(),
            self.signed_attrs.as_ref().map(|attrs| {
                attrs.encode_ref_as(Tag::CTX_0)
            }),
            self.signature_algorithm.encode_ref(),
            OctetString::encode_slice(self.signature.as_ref()),
            self.unsigned_attrs.as_ref().map(|attrs| {
                attrs.encode_ref_as(Tag::CTX_1)
            }),
        ))
    }

    pub fn to_captured(&self) -> Captured {
        self.encode_ref().to_captured(Mode::Der)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::PublicKeyFormat;

    fn cert(data: &'static [u8]) -> Cert {
        Cert::decode(Bytes::from_static(data)).unwrap()
    }

    fn leaf() -> Cert {
        cert(include_bytes!("../../test-data/chain/leaf.cer"))
    }

    fn signer_info(version: u8, sid: SignerIdentifier) -> SignerInfo {
        SignerInfo {
            version,
            sid,
            digest_algorithm: AlgorithmIdentifier::digest(
                DigestAlgorithm::Sha256
            ),
            signed_attrs: None,
            signature_algorithm: AlgorithmIdentifier::signature(
                PublicKeyFormat::Rsa
            ).unwrap(),
            signature: Bytes::from_static(b"sig"),
            unsigned_attrs: None,
        }
    }

    #[test]
    fn find_by_issuer_and_serial() {
        let leaf = leaf();
        let inter = cert(
            include_bytes!("../../test-data/chain/intermediate.cer")
        );
        let info = signer_info(
            1,
            SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber::new(&leaf)
            )
        );
        let certs = [inter.clone(), leaf.clone()];
        assert_eq!(info.find_certificate(&certs).unwrap(), &leaf);
        assert_eq!(
            info.find_certificate(&[inter]).unwrap_err().to_string(),
            "no matching certificate"
        );
        assert_eq!(
            info.find_certificate(&[]).unwrap_err().to_string(),
            "no certificates"
        );
    }

    #[test]
    fn find_by_subject_key_identifier() {
        let leaf = leaf();
        let ski = leaf.subject_key_identifier().unwrap().clone();
        let info = signer_info(
            3, SignerIdentifier::SubjectKeyIdentifier(ski.clone())
        );
        assert_eq!(
            info.find_certificate(&[leaf.clone()]).unwrap(), &leaf
        );

        // Version and identifier type have to agree.
        let info = signer_info(
            1, SignerIdentifier::SubjectKeyIdentifier(ski.clone())
        );
        assert_eq!(
            info.find_certificate(&[leaf.clone()]).unwrap_err().to_string(),
            "wrong choice or any type"
        );
        let info = signer_info(
            2, SignerIdentifier::SubjectKeyIdentifier(ski)
        );
        assert_eq!(
            info.find_certificate(&[leaf]).unwrap_err().to_string(),
            "unknown SignerInfo version"
        );
    }

    #[test]
    fn encode_and_decode() {
        let leaf = leaf();
        let mut info = signer_info(
            1,
            SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber::new(&leaf)
            )
        );
        info.signed_attrs = Some(Attributes::from_unsorted([
            Attribute::single(oid::CONTENT_TYPE.0, oid::DATA.encode()),
            Attribute::single(
                oid::MESSAGE_DIGEST.0,
                OctetString::encode_slice(b"digest".as_ref())
            ),
            Attribute::single(
                oid::SIGNING_TIME.0,
                Time::utc(2030, 1, 1, 12, 0, 0).unwrap().encode_varied()
            ),
        ]));
        info.add_timestamp_token(
            OctetString::encode_slice(b"token".as_ref())
                .to_captured(Mode::Der)
        );

        let encoded = info.to_captured();
        let decoded = encoded.clone().decode(SignerInfo::take_from).unwrap();
        assert_eq!(decoded.to_captured().as_slice(), encoded.as_slice());
        assert_eq!(decoded.version(), 1);
        assert_eq!(decoded.hash(), Some(DigestAlgorithm::Sha256));
        assert_eq!(
            decoded.x509_signature_algorithm(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(decoded.content_type().unwrap(), oid::DATA);
        assert_eq!(decoded.message_digest().unwrap().as_ref(), b"digest");
        assert_eq!(
            decoded.signing_time().unwrap(),
            Time::utc(2030, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            decoded.timestamp_tokens()[0].as_slice(), b"\x04\x05token"
        );
        assert_eq!(decoded.find_certificate(&[leaf.clone()]).unwrap(), &leaf);
    }

    #[test]
    fn missing_signed_attrs() {
        let info = signer_info(
            1,
            SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber::new(&leaf())
            )
        );
        assert_eq!(
            info.content_type().unwrap_err().to_string(),
            "expected 1 attribute found 0"
        );
        assert!(info.timestamp_tokens().is_empty());
    }

    #[test]
    fn unknown_algorithms() {
        let mut info = signer_info(
            1,
            SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber::new(&leaf())
            )
        );
        info.digest_algorithm = AlgorithmIdentifier::new(
            Oid(Bytes::from_static(oid::MD5.0)), None
        );
        assert!(info.hash().is_none());
        assert!(info.x509_signature_algorithm().is_unknown());
    }
}
