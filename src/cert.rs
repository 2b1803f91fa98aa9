//! X.509 certificates.
//!
//! Certificates appear in CMS signed data both as the certificates of the
//! signers and as the intermediate certificates needed to build a chain to
//! a trusted root. This module implements the certificates themselves in
//! the type [`Cert`] and a simple collection of them in [`CertPool`].
//!
//! Only those parts of a certificate needed for identifying signers and
//! building and verifying chains are interpreted. The complete encoding
//! is kept, so certificates can be included in newly created signed data
//! unaltered.
//!
//! [RFC 5280]: https://tools.ietf.org/html/rfc5280

use std::fmt;
use std::convert::Infallible;
use bcder::decode;
use bcder::{BitString, Captured, Ia5String, OctetString, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, IntoSource, Source};
use bytes::Bytes;
use crate::oid;
use crate::crypto::{
    KeyIdentifier, PublicKey, SignatureAlgorithm, SignatureVerificationError,
};
use crate::error::VerificationError;
use crate::x509::{
    decode_complete, Name, Serial, SignedContent, Time, Validity
};


//------------ Cert ----------------------------------------------------------

/// An X.509 certificate.
///
/// If a certificate is stored in a file, you can use the [`decode`]
/// function to parse the entire file. If the certificate is part of some
/// other structure, the [`take_from`] function can be used during parsing
/// of that structure.
///
/// [`decode`]: #method.decode
/// [`take_from`]: #method.take_from
#[derive(Clone, Debug)]
pub struct Cert {
    /// The complete encoding of the certificate.
    raw: Captured,

    /// The outer structure of the certificate.
    signed_data: SignedContent,

    /// The content of the certificate.
    tbs: TbsCert,
}


/// # Decoding
///
impl Cert {
    /// Decodes a source as a certificate.
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        decode_complete(source, Self::take_from)
    }

    /// Takes an encoded certificate from the beginning of a value.
    ///
    /// This function assumes that the certificate is encoded in the next
    /// constructed value in `cons` tagged as a sequence.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let raw = cons.capture_one()?;
        Self::from_captured(raw).map_err(DecodeError::convert)
    }

    /// Parses a certificate from its captured encoding.
    pub fn from_captured(
        raw: Captured
    ) -> Result<Self, DecodeError<Infallible>> {
        let signed_data = raw.clone().decode(SignedContent::take_from)?;
        let tbs = signed_data.data().clone().decode(
            TbsCert::from_constructed
        )?;
        Ok(Cert { raw, signed_data, tbs })
    }

    /// Returns the complete encoding of the certificate.
    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    /// Returns the complete encoding of the certificate.
    pub fn to_bytes(&self) -> Bytes {
        self.raw.clone().into_bytes()
    }

    /// Returns the captured encoding for inclusion in other values.
    pub fn to_captured(&self) -> Captured {
        self.raw.clone()
    }
}


/// # Data Access
///
impl Cert {
    /// Returns the X.509 version of the certificate.
    ///
    /// This is the actual version, i.e., 3 for a v3 certificate.
    pub fn version(&self) -> u8 {
        self.tbs.version + 1
    }

    pub fn serial_number(&self) -> &Serial {
        &self.tbs.serial_number
    }

    /// Returns the algorithm the issuer used to sign the certificate.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signed_data.signature().algorithm()
    }

    pub fn issuer(&self) -> &Name {
        &self.tbs.issuer
    }

    pub fn validity(&self) -> Validity {
        self.tbs.validity
    }

    pub fn subject(&self) -> &Name {
        &self.tbs.subject
    }

    pub fn subject_public_key_info(&self) -> &PublicKey {
        &self.tbs.subject_public_key_info
    }

    /// Returns the cA field of the basic constraints extension if present.
    pub fn basic_ca(&self) -> Option<bool> {
        self.tbs.basic_ca
    }

    /// Returns whether this is a CA certificate.
    pub fn is_ca(&self) -> bool {
        self.tbs.basic_ca == Some(true)
    }

    /// Returns the path length constraint if present.
    pub fn path_len_constraint(&self) -> Option<u64> {
        self.tbs.path_len
    }

    pub fn subject_key_identifier(&self) -> Option<&KeyIdentifier> {
        self.tbs.subject_key_id.as_ref()
    }

    pub fn authority_key_identifier(&self) -> Option<&KeyIdentifier> {
        self.tbs.authority_key_id.as_ref()
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.tbs.key_usage
    }

    pub fn extended_key_usage(&self) -> Option<&ExtendedKeyUsage> {
        self.tbs.extended_key_usage.as_ref()
    }

    /// Returns the CA issuer URIs of the Authority Information Access.
    pub fn ca_issuers(&self) -> &[String] {
        &self.tbs.ca_issuers
    }

    /// Returns critical extensions we don’t know how to handle.
    pub fn unhandled_critical_extensions(&self) -> &[Oid<Bytes>] {
        &self.tbs.unhandled_critical
    }

    /// Returns whether issuer and subject are the same.
    pub fn is_self_issued(&self) -> bool {
        self.tbs.issuer == self.tbs.subject
    }
}


/// # Verification
///
impl Cert {
    /// Verifies that the certificate is valid at the given time.
    pub fn verify_validity(
        &self, now: Time,
    ) -> Result<(), VerificationError> {
        self.tbs.validity.verify_at(now).map_err(Into::into)
    }

    /// Verifies that the certificate claims to have been issued by `issuer`.
    ///
    /// This checks that names and, if both are present, key identifiers
    /// match. You _must_ also call
    /// [`verify_signature`][Self::verify_signature].
    pub fn verify_issuer_claim(
        &self,
        issuer: &Cert,
    ) -> Result<(), VerificationError> {
        if self.issuer() != issuer.subject() {
            return Err(VerificationError::new(
                "certificate's issuer doesn't match issuer's subject"
            ))
        }
        if let (Some(aki), Some(ski)) = (
            self.authority_key_identifier(), issuer.subject_key_identifier()
        ) {
            if aki != ski {
                return Err(VerificationError::new(
                    "certificate's Authority Key Identifier doesn't \
                     match issuer's Subject Key Identifier"
                ))
            }
        }
        Ok(())
    }

    /// Validates the certificate’s signature.
    pub fn verify_signature(
        &self,
        issuer: &Cert,
    ) -> Result<(), SignatureVerificationError> {
        self.signed_data.verify_signature(
            issuer.subject_public_key_info()
        )
    }
}


//--- PartialEq and Eq

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.raw.as_slice() == other.raw.as_slice()
    }
}

impl Eq for Cert { }


//--- AsRef

impl AsRef<[u8]> for Cert {
    fn as_ref(&self) -> &[u8] {
        self.raw.as_slice()
    }
}


//------------ TbsCert -------------------------------------------------------

/// The data of a certificate.
#[derive(Clone, Debug)]
struct TbsCert {
    /// The encoded version, i.e., 2 for v3.
    version: u8,

    serial_number: Serial,
    issuer: Name,
    validity: Validity,
    subject: Name,
    subject_public_key_info: PublicKey,

    /// Basic Constraints.
    basic_ca: Option<bool>,
    path_len: Option<u64>,

    /// Subject Key Identifier.
    subject_key_id: Option<KeyIdentifier>,

    /// Authority Key Identifier.
    authority_key_id: Option<KeyIdentifier>,

    /// Key Usage.
    key_usage: Option<KeyUsage>,

    /// Extended Key Usage.
    extended_key_usage: Option<ExtendedKeyUsage>,

    /// The caIssuers URIs of the Authority Information Access.
    ca_issuers: Vec<String>,

    /// Critical extensions we don’t know.
    unhandled_critical: Vec<Oid<Bytes>>,
}

impl TbsCert {
    /// Parses the content of a TBSCertificate sequence.
    ///
    /// ```txt
    /// TBSCertificate  ::=  SEQUENCE  {
    ///      version         [0]  EXPLICIT Version DEFAULT v1,
    ///      serialNumber         CertificateSerialNumber,
    ///      signature            AlgorithmIdentifier,
    ///      issuer               Name,
    ///      validity             Validity,
    ///      subject              Name,
    ///      subjectPublicKeyInfo SubjectPublicKeyInfo,
    ///      issuerUniqueID  [1]  IMPLICIT UniqueIdentifier OPTIONAL,
    ///      subjectUniqueID [2]  IMPLICIT UniqueIdentifier OPTIONAL,
    ///      extensions      [3]  EXPLICIT Extensions OPTIONAL }
    /// ```
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_opt_constructed_if(Tag::CTX_0, |c| {
                c.take_u8()
            })?.unwrap_or(0);
            if version > 2 {
                return Err(cons.content_err("invalid certificate version"))
            }
            let serial_number = Serial::take_from(cons)?;
            // The inner signature algorithm. We use the outer one.
            cons.take_sequence(|cons| cons.skip_all())?;
            let issuer = Name::take_from(cons)?;
            let validity = Validity::take_from(cons)?;
            let subject = Name::take_from(cons)?;
            let subject_public_key_info = PublicKey::take_from(cons)?;
            cons.take_opt_primitive_if(Tag::CTX_1, |prim| prim.take_all())?;
            cons.take_opt_primitive_if(Tag::CTX_2, |prim| prim.take_all())?;

            let mut res = TbsCert {
                version,
                serial_number,
                issuer,
                validity,
                subject,
                subject_public_key_info,
                basic_ca: None,
                path_len: None,
                subject_key_id: None,
                authority_key_id: None,
                key_usage: None,
                extended_key_usage: None,
                ca_issuers: Vec::new(),
                unhandled_critical: Vec::new(),
            };

            cons.take_opt_constructed_if(Tag::CTX_3, |c| {
                c.take_sequence(|cons| {
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        res.take_extension(cons)
                    })? { }
                    Ok(())
                })
            })?;
            Ok(res)
        })
    }

    /// Parses the content of a single extension.
    ///
    /// ```txt
    /// Extension  ::=  SEQUENCE  {
    ///      extnID      OBJECT IDENTIFIER,
    ///      critical    BOOLEAN DEFAULT FALSE,
    ///      extnValue   OCTET STRING }
    /// ```
    fn take_extension<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>
    ) -> Result<(), DecodeError<S::Error>> {
        let id = Oid::take_from(cons)?;
        let critical = cons.take_opt_bool()?.unwrap_or(false);
        let value = OctetString::take_from(cons)?;
        decode_complete(value, |content| {
            if id == oid::CE_BASIC_CONSTRAINTS {
                self.take_basic_constraints(content)
            } else if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                self.take_subject_key_identifier(content)
            } else if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                self.take_authority_key_identifier(content)
            } else if id == oid::CE_KEY_USAGE {
                self.take_key_usage(content)
            } else if id == oid::CE_EXTENDED_KEY_USAGE {
                self.take_extended_key_usage(content)
            } else if id == oid::PE_AUTHORITY_INFO_ACCESS {
                self.take_authority_info_access(content)
            } else if id == oid::CE_SUBJECT_ALT_NAME
                || id == oid::CE_CERTIFICATE_POLICIES
                || id == oid::CE_CRL_DISTRIBUTION_POINTS
            {
                // Nothing of relevance for signatures.
                content.skip_one().map(|_| ())
            } else {
                if critical {
                    self.unhandled_critical.push(id.clone());
                }
                content.skip_one().map(|_| ())
            }
        }).map_err(DecodeError::convert)
    }

    /// Parses the Basic Constraints extension.
    ///
    /// ```text
    /// BasicConstraints ::= SEQUENCE {
    ///     cA                      BOOLEAN DEFAULT FALSE,
    ///     pathLenConstraint       INTEGER (0..MAX) OPTIONAL }
    /// ```
    fn take_basic_constraints<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.basic_ca.is_some() {
            return Err(cons.content_err(
                "duplicate Basic Constraints extension"
            ))
        }
        cons.take_sequence(|cons| {
            self.basic_ca = Some(cons.take_opt_bool()?.unwrap_or(false));
            self.path_len = cons.take_opt_u64()?;
            Ok(())
        })
    }

    /// Parses the Subject Key Identifier extension.
    ///
    /// ```text
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// ```
    fn take_subject_key_identifier<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.subject_key_id.is_some() {
            return Err(cons.content_err(
                "duplicate Subject Key Identifier extension"
            ))
        }
        self.subject_key_id = Some(KeyIdentifier::take_from(cons)?);
        Ok(())
    }

    /// Parses the Authority Key Identifier extension.
    ///
    /// ```text
    /// AuthorityKeyIdentifier ::= SEQUENCE {
    ///   keyIdentifier             [0] KeyIdentifier           OPTIONAL,
    ///   authorityCertIssuer       [1] GeneralNames            OPTIONAL,
    ///   authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL  }
    /// ```
    ///
    /// Only the keyIdentifier is of interest to us.
    fn take_authority_key_identifier<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.authority_key_id.is_some() {
            return Err(cons.content_err(
                "duplicate Authority Key Identifier extension"
            ))
        }
        self.authority_key_id = cons.take_sequence(|cons| {
            let res = cons.take_opt_value_if(
                Tag::CTX_0, KeyIdentifier::from_content
            )?;
            cons.skip_all()?;
            Ok(res)
        })?;
        Ok(())
    }

    /// Parses the Key Usage extension.
    ///
    /// ```text
    /// KeyUsage ::= BIT STRING {
    ///      digitalSignature        (0),
    ///      nonRepudiation          (1),
    ///      keyEncipherment         (2),
    ///      dataEncipherment        (3),
    ///      keyAgreement            (4),
    ///      keyCertSign             (5),
    ///      cRLSign                 (6),
    ///      encipherOnly            (7),
    ///      decipherOnly            (8) }
    /// ```
    fn take_key_usage<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.key_usage.is_some() {
            return Err(cons.content_err("duplicate Key Usage extension"))
        }
        let bits = BitString::take_from(cons)?;
        let mut res = 0u16;
        for idx in 0..9 {
            if bits.bit(idx) {
                res |= 1 << idx;
            }
        }
        self.key_usage = Some(KeyUsage(res));
        Ok(())
    }

    /// Parses the Extended Key Usage extension.
    ///
    /// ```text
    /// ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId
    /// KeyPurposeId ::= OBJECT IDENTIFIER
    /// ```
    fn take_extended_key_usage<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.extended_key_usage.is_some() {
            return Err(cons.content_err(
                "duplicate Extended Key Usage extension"
            ))
        }
        self.extended_key_usage = Some(ExtendedKeyUsage::take_from(cons)?);
        Ok(())
    }

    /// Parses the Authority Information Access extension.
    ///
    /// ```text
    /// AuthorityInfoAccessSyntax  ::=
    ///         SEQUENCE SIZE (1..MAX) OF AccessDescription
    ///
    /// AccessDescription  ::=  SEQUENCE {
    ///         accessMethod          OBJECT IDENTIFIER,
    ///         accessLocation        GeneralName  }
    /// ```
    ///
    /// We collect the URIs of all caIssuers access descriptions and ignore
    /// everything else.
    fn take_authority_info_access<S: decode::Source>(
        &mut self,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        let ca_issuers = &mut self.ca_issuers;
        cons.take_sequence(|cons| {
            while let Some(()) = cons.take_opt_sequence(|cons| {
                let method = Oid::take_from(cons)?;
                if method == oid::AD_CA_ISSUERS {
                    if let Some(uri) = cons.take_opt_value_if(
                        Tag::CTX_6, Ia5String::from_content
                    )? {
                        ca_issuers.push(
                            String::from_utf8_lossy(
                                uri.into_bytes().as_ref()
                            ).into_owned()
                        );
                        return Ok(())
                    }
                }
                cons.skip_all()
            })? { }
            Ok(())
        })
    }
}


//------------ KeyUsage ------------------------------------------------------

/// The bits of the Key Usage extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyUsage(u16);

impl KeyUsage {
    pub fn digital_signature(self) -> bool {
        self.0 & 0x0001 != 0
    }

    pub fn non_repudiation(self) -> bool {
        self.0 & 0x0002 != 0
    }

    pub fn key_cert_sign(self) -> bool {
        self.0 & 0x0020 != 0
    }

    pub fn crl_sign(self) -> bool {
        self.0 & 0x0040 != 0
    }
}


//------------ ExtKeyUsage ---------------------------------------------------

/// The purposes a certificate can be used for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ExtKeyUsage {
    /// Any purpose.
    Any,

    /// TLS server authentication.
    ServerAuth,

    /// TLS client authentication.
    ClientAuth,

    /// Signing of executable code.
    CodeSigning,

    /// Email protection, i.e., S/MIME.
    EmailProtection,
}

impl ExtKeyUsage {
    fn from_oid<T: AsRef<[u8]>>(oid: &Oid<T>) -> Option<Self> {
        if *oid == oid::ANY_EXTENDED_KEY_USAGE {
            Some(ExtKeyUsage::Any)
        }
        else if *oid == oid::KP_SERVER_AUTH {
            Some(ExtKeyUsage::ServerAuth)
        }
        else if *oid == oid::KP_CLIENT_AUTH {
            Some(ExtKeyUsage::ClientAuth)
        }
        else if *oid == oid::KP_CODE_SIGNING {
            Some(ExtKeyUsage::CodeSigning)
        }
        else if *oid == oid::KP_EMAIL_PROTECTION {
            Some(ExtKeyUsage::EmailProtection)
        }
        else {
            None
        }
    }
}

impl fmt::Display for ExtKeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ExtKeyUsage::Any => "any",
            ExtKeyUsage::ServerAuth => "serverAuth",
            ExtKeyUsage::ClientAuth => "clientAuth",
            ExtKeyUsage::CodeSigning => "codeSigning",
            ExtKeyUsage::EmailProtection => "emailProtection",
        })
    }
}


//------------ ExtendedKeyUsage ----------------------------------------------

/// The content of the Extended Key Usage extension.
#[derive(Clone, Debug)]
pub struct ExtendedKeyUsage {
    purposes: Vec<ExtKeyUsage>,
    unknown: usize,
}

impl ExtendedKeyUsage {
    fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let mut purposes = Vec::new();
            let mut unknown = 0;
            while let Some(oid) = Oid::take_opt_from(cons)? {
                match ExtKeyUsage::from_oid(&oid) {
                    Some(purpose) => purposes.push(purpose),
                    None => unknown += 1,
                }
            }
            if purposes.is_empty() && unknown == 0 {
                return Err(cons.content_err(
                    "empty Extended Key Usage extension"
                ))
            }
            Ok(ExtendedKeyUsage { purposes, unknown })
        })
    }

    /// Returns the known purposes listed in the extension.
    pub fn purposes(&self) -> &[ExtKeyUsage] {
        &self.purposes
    }

    /// Returns whether the certificate may be used for the purpose.
    ///
    /// This is the case if either the purpose or the any purpose is
    /// listed.
    pub fn permits(&self, purpose: ExtKeyUsage) -> bool {
        self.purposes.iter().any(|item| {
            *item == purpose || *item == ExtKeyUsage::Any
        })
    }
}


//------------ CertPool ------------------------------------------------------

/// A collection of certificates.
///
/// This is used both for the trusted roots and for the intermediate
/// certificates when building a chain.
#[derive(Clone, Debug, Default)]
pub struct CertPool {
    certs: Vec<Cert>,
}

impl CertPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a certificate unless it is already present.
    pub fn add(&mut self, cert: Cert) {
        if !self.contains(&cert) {
            self.certs.push(cert)
        }
    }

    pub fn contains(&self, cert: &Cert) -> bool {
        self.certs.iter().any(|item| item == cert)
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cert> {
        self.certs.iter()
    }

    /// Returns the certificates that may have issued `cert`.
    ///
    /// These are all certificates whose subject is the issuer of `cert`.
    /// Candidates whose subject key identifier matches the authority key
    /// identifier of `cert` come first.
    pub fn find_issuers<'a>(&'a self, cert: &Cert) -> Vec<&'a Cert> {
        let mut res: Vec<_> = self.certs.iter().filter(|item| {
            item.subject() == cert.issuer()
        }).collect();
        if let Some(aki) = cert.authority_key_identifier() {
            res.sort_by_key(|item| {
                item.subject_key_identifier() != Some(aki)
            });
        }
        res
    }
}

impl FromIterator<Cert> for CertPool {
    fn from_iter<I: IntoIterator<Item = Cert>>(iter: I) -> Self {
        let mut res = CertPool::new();
        for cert in iter {
            res.add(cert)
        }
        res
    }
}

impl Extend<Cert> for CertPool {
    fn extend<I: IntoIterator<Item = Cert>>(&mut self, iter: I) {
        for cert in iter {
            self.add(cert)
        }
    }
}


//------------ UnexpectedCriticalExtension -----------------------------------

/// A certificate has a critical extension we don’t understand.
#[derive(Clone, Debug)]
pub(crate) struct UnexpectedCriticalExtension {
    oid: Oid<Bytes>,
}

impl UnexpectedCriticalExtension {
    pub(crate) fn new(oid: Oid<Bytes>) -> Self {
       UnexpectedCriticalExtension { oid }
    }
}

impl From<UnexpectedCriticalExtension> for ContentError {
    fn from(err: UnexpectedCriticalExtension) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for UnexpectedCriticalExtension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unhandled critical extension {}", self.oid)
    }
}


//============ Tests =========================================================
