//! Signed data.

use bcder::{decode, encode};
use bcder::{Captured, Mode, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use log::warn;
use crate::cert::Cert;
use crate::error::{ParseError, VerificationError, WrongType};
use super::alg::AlgorithmIdentifier;
use super::anyset::AnySet;
use super::content::{ContentInfo, EncapsulatedContentInfo};
use super::signer::SignerInfo;


//------------ SignedData ----------------------------------------------------

/// CMS signed data.
///
/// ```txt
/// SignedData ::= SEQUENCE {
///   version CMSVersion,
///   digestAlgorithms DigestAlgorithmIdentifiers,
///   encapContentInfo EncapsulatedContentInfo,
///   certificates [0] IMPLICIT CertificateSet OPTIONAL,
///   crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///   signerInfos SignerInfos }
///
/// DigestAlgorithmIdentifiers ::= SET OF DigestAlgorithmIdentifier
///
/// SignerInfos ::= SET OF SignerInfo
/// ```
///
/// Certificates and CRLs are kept in their encoded form. The certificates
/// can be interpreted via [`x509_certificates`][Self::x509_certificates].
///
/// Signer infos are added by
/// [`add_signer_info`][Self::add_signer_info] and checked by
/// [`verify`][Self::verify] and
/// [`verify_detached`][Self::verify_detached].
#[derive(Clone, Debug)]
pub struct SignedData {
    version: u8,
    digest_algorithms: Vec<AlgorithmIdentifier>,
    encap_content_info: EncapsulatedContentInfo,
    certificates: Option<AnySet>,
    crls: Option<AnySet>,
    signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    /// Creates new signed data encapsulating `data`.
    ///
    /// The result has neither certificates nor signers.
    pub fn new(data: Bytes) -> Self {
        SignedData {
            version: 1,
            digest_algorithms: Vec::new(),
            encap_content_info: EncapsulatedContentInfo::new_data(data),
            certificates: None,
            crls: None,
            signer_infos: Vec::new(),
        }
    }

    /// Parses signed data from an encoded content info.
    ///
    /// The data may be BER encoded.
    pub fn parse(ber: &[u8]) -> Result<Self, ParseError> {
        ContentInfo::parse(ber)?.signed_data_content()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn digest_algorithms(&self) -> &[AlgorithmIdentifier] {
        &self.digest_algorithms
    }

    pub fn encap_content_info(&self) -> &EncapsulatedContentInfo {
        &self.encap_content_info
    }

    /// Returns the encoded certificates if present.
    pub fn certificates(&self) -> Option<&AnySet> {
        self.certificates.as_ref()
    }

    /// Returns the encoded revocation information if present.
    pub fn crls(&self) -> Option<&AnySet> {
        self.crls.as_ref()
    }

    pub fn signer_infos(&self) -> &[SignerInfo] {
        &self.signer_infos
    }

    pub fn signer_infos_mut(&mut self) -> &mut [SignerInfo] {
        &mut self.signer_infos
    }
}


/// # Content
///
impl SignedData {
    /// Returns whether the content has been removed.
    pub fn is_detached(&self) -> bool {
        self.encap_content_info.is_detached()
    }

    /// Removes the content, turning this into a detached signature.
    pub fn detach(&mut self) {
        self.encap_content_info.detach()
    }

    /// Returns the content.
    ///
    /// Returns `Ok(None)` if the signature is detached and an error if
    /// the content is something other than data.
    pub fn get_data(&self) -> Result<Option<Bytes>, WrongType> {
        self.encap_content_info.data_econtent()
    }
}


/// # Certificates
///
impl SignedData {
    /// Parses the included certificates.
    ///
    /// Only plain X.509 certificates are accepted. Any of the other
    /// choices of a certificate set results in an error.
    pub fn x509_certificates(&self) -> Result<Vec<Cert>, VerificationError> {
        let set = match self.certificates {
            Some(ref set) => set,
            None => return Ok(Vec::new())
        };
        let mut res = Vec::with_capacity(set.len());
        for item in set.elements() {
            if item.as_slice().first() != Some(&0x30) {
                return Err(VerificationError::new(
                    "unsupported certificate choice"
                ))
            }
            match Cert::from_captured(item.clone()) {
                Ok(cert) => res.push(cert),
                Err(err) => {
                    warn!("Failed to parse included certificate: {}", err);
                    return Err(err.into())
                }
            }
        }
        Ok(res)
    }

    /// Replaces the included certificates.
    ///
    /// An empty list removes the certificates field altogether.
    pub fn set_certificates(&mut self, certs: &[Cert]) {
        self.certificates = if certs.is_empty() {
            None
        }
        else {
            Some(AnySet::from_unsorted(
                certs.iter().map(Cert::to_captured)
            ))
        }
    }

    /// Returns the encoded included certificates.
    pub fn get_certificates(&self) -> Vec<Bytes> {
        match self.certificates {
            Some(ref set) => {
                set.elements().iter().map(|item| {
                    Bytes::copy_from_slice(item.as_slice())
                }).collect()
            }
            None => Vec::new()
        }
    }

    /// Adds a certificate unless an identical one is present already.
    ///
    /// Returns whether the certificate was added.
    pub(crate) fn add_certificate(&mut self, cert: &Cert) -> bool {
        let set = self.certificates.get_or_insert_with(AnySet::default);
        if set.elements().iter().any(|item| {
            item.as_slice() == cert.as_slice()
        }) {
            return false
        }
        set.insert(cert.to_captured());
        true
    }

    /// Returns whether an identical certificate is included.
    pub(crate) fn has_certificate(&self, cert: &Cert) -> bool {
        match self.certificates {
            Some(ref set) => {
                set.elements().iter().any(|item| {
                    item.as_slice() == cert.as_slice()
                })
            }
            None => false
        }
    }
}


/// # Signers
///
impl SignedData {
    /// Adds a digest algorithm unless it is present already.
    ///
    /// New algorithms are placed in DER order.
    pub(crate) fn add_digest_algorithm(
        &mut self, algorithm: AlgorithmIdentifier
    ) {
        if self.digest_algorithms.contains(&algorithm) {
            return
        }
        let encoded = algorithm.to_captured();
        let pos = self.digest_algorithms.iter().position(|item| {
            item.to_captured().as_slice() > encoded.as_slice()
        }).unwrap_or(self.digest_algorithms.len());
        self.digest_algorithms.insert(pos, algorithm)
    }

    /// Adds a signer info in DER order.
    pub(crate) fn insert_signer_info(&mut self, info: SignerInfo) {
        let encoded = info.to_captured();
        let pos = self.signer_infos.iter().position(|item| {
            item.to_captured().as_slice() > encoded.as_slice()
        }).unwrap_or(self.signer_infos.len());
        self.signer_infos.insert(pos, info)
    }
}


/// # Decoding and Encoding
///
impl SignedData {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_u8()?;
            let digest_algorithms = cons.take_set(|cons| {
                let mut res = Vec::new();
                while let Some(alg) = AlgorithmIdentifier::take_opt_from(
                    cons
                )? {
                    res.push(alg)
                }
                Ok(res)
            })?;
            let encap_content_info = EncapsulatedContentInfo::take_from(
                cons
            )?;
            let certificates = cons.take_opt_constructed_if(
                Tag::CTX_0, AnySet::from_constructed
            )?;
            let crls = cons.take_opt_constructed_if(
                Tag::CTX_1, AnySet::from_constructed
            )?;
            let signer_infos = cons.take_set(|cons| {
                let mut res = Vec::new();
                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    res.push(info)
                }
                Ok(res)
            })?;
            Ok(SignedData {
                version,
                digest_algorithms,
                encap_content_info,
                certificates,
                crls,
                signer_infos,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.version.encode(),
            encode::set(
                encode::slice(
                    &self.digest_algorithms,
                    |alg: &AlgorithmIdentifier| alg.to_captured()
                )
            ),
            self.encap_content_info.encode_ref(),
            self.certificates.as_ref().map(|set| {
                set.encode_ref_as(Tag::CTX_0)
            }),
            self.crls.as_ref().map(|set| set.encode_ref_as(Tag::CTX_1)),
            encode::set(
                encode::slice(
                    &self.signer_infos,
                    |info: &SignerInfo| info.to_captured()
                )
            ),
        ))
    }

    pub fn to_captured(&self) -> Captured {
        self.encode_ref().to_captured(Mode::Der)
    }

    /// Returns the DER encoded content info wrapping the signed data.
    pub fn to_der(&self) -> Bytes {
        ContentInfo::from_signed_data(self).to_bytes()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::DigestAlgorithm;

    fn parse(data: &[u8]) -> SignedData {
        SignedData::parse(data).unwrap()
    }

    #[test]
    fn parse_gpgsm_attached() {
        let data = include_bytes!("../../test-data/gpgsm-attached.p7s");
        let sd = parse(data);
        assert_eq!(sd.version(), 1);
        assert_eq!(
            sd.digest_algorithms()[0].digest_algorithm(),
            Some(DigestAlgorithm::Sha256)
        );
        assert!(!sd.is_detached());
        assert_eq!(sd.get_data().unwrap().unwrap().as_ref(), b"hello\n");
        let certs = sd.x509_certificates().unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(
            certs[0].subject().common_name().as_deref(), Some("Ben Toews")
        );
        assert_eq!(sd.signer_infos().len(), 1);
        assert_eq!(
            sd.signer_infos()[0].find_certificate(&certs).unwrap(),
            &certs[0]
        );
    }

    #[test]
    fn der_round_trip() {
        for data in [
            include_bytes!("../../test-data/gpgsm-attached.p7s").as_ref(),
            include_bytes!("../../test-data/gpgsm-nocerts.p7s").as_ref(),
            include_bytes!("../../test-data/openssl-detached.p7s").as_ref(),
            include_bytes!("../../test-data/outlook-detached.p7s").as_ref(),
        ] {
            let der = parse(data).to_der();
            assert_eq!(parse(&der).to_der(), der);
        }
    }

    #[test]
    fn ber_input() {
        let sd = parse(include_bytes!("../../test-data/signature-one.p7s"));
        assert_eq!(
            sd.get_data().unwrap().unwrap().as_ref(), b"We the People"
        );
        assert_eq!(
            sd.signer_infos()[0].hash(), Some(DigestAlgorithm::Sha1)
        );
    }

    #[test]
    fn detached_and_nocerts() {
        let sd = parse(include_bytes!("../../test-data/gpgsm-nocerts.p7s"));
        assert!(sd.is_detached());
        assert!(sd.get_data().unwrap().is_none());
        assert!(sd.certificates().is_none());
        assert!(sd.x509_certificates().unwrap().is_empty());
        assert!(sd.get_certificates().is_empty());

        let mut sd = parse(
            include_bytes!("../../test-data/openssl-attached.p7s")
        );
        sd.detach();
        let sd = parse(&sd.to_der());
        assert!(sd.is_detached());
    }

    #[test]
    fn set_and_get_certificates() {
        let mut sd = parse(
            include_bytes!("../../test-data/outlook-detached.p7s")
        );
        let certs = sd.x509_certificates().unwrap();
        assert_eq!(certs.len(), 3);
        assert_eq!(sd.get_certificates().len(), 3);
        assert_eq!(sd.get_certificates()[1].as_ref(), certs[1].as_slice());

        sd.set_certificates(&certs[1..2]);
        let reparsed = parse(&sd.to_der());
        assert_eq!(reparsed.x509_certificates().unwrap(), &certs[1..2]);

        sd.set_certificates(&[]);
        assert!(sd.certificates().is_none());
        let reparsed = parse(&sd.to_der());
        assert!(reparsed.certificates().is_none());
        assert!(reparsed.get_certificates().is_empty());
    }

    #[test]
    fn add_certificate_dedups() {
        let mut sd = SignedData::new(Bytes::from_static(b"foo"));
        let cert = Cert::decode(Bytes::from_static(
            include_bytes!("../../test-data/chain/leaf.cer")
        )).unwrap();
        assert!(!sd.has_certificate(&cert));
        assert!(sd.add_certificate(&cert));
        assert!(!sd.add_certificate(&cert));
        assert!(sd.has_certificate(&cert));
        assert_eq!(sd.x509_certificates().unwrap(), vec![cert]);

        sd.add_digest_algorithm(
            AlgorithmIdentifier::digest(DigestAlgorithm::Sha256)
        );
        sd.add_digest_algorithm(
            AlgorithmIdentifier::digest(DigestAlgorithm::Sha256)
        );
        assert_eq!(sd.digest_algorithms().len(), 1);
    }

    #[test]
    fn rejects_other_certificate_choices() {
        let mut sd = SignedData::new(Bytes::from_static(b"foo"));
        // [1] IMPLICIT ExtendedCertificate, obsolete.
        sd.certificates = Some(AnySet::new(vec![
            Mode::Der.decode(
                b"\xa1\x00".as_ref(), |cons| cons.capture_one()
            ).unwrap()
        ]));
        assert!(sd.x509_certificates().is_err());
    }
}
