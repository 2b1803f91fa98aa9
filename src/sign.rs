//! Creating signatures.
//!
//! This module adds signers to [`SignedData`] and decides which
//! certificates of a signer’s chain end up in the signed data.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use bcder::OctetString;
use bcder::encode::PrimitiveContent;
use log::debug;
use crate::oid;
use crate::cert::Cert;
use crate::crypto::{SignatureAlgorithm, Signer, SigningError};
use crate::protocol::{
    AlgorithmIdentifier, Attribute, Attributes, SignedData, SignerInfo,
};
use crate::x509::Time;


//------------ SignedData ----------------------------------------------------

/// # Signing
///
impl SignedData {
    /// Adds a signature by `signer` over the content.
    ///
    /// The chain has to contain the certificate for the signer’s public
    /// key. All certificates of the chain are added to the signed data.
    /// The signing time attribute is set to the current time.
    ///
    /// If an error is returned, the signed data is unchanged.
    pub fn add_signer_info<S: Signer>(
        &mut self, chain: &[Cert], signer: &S
    ) -> Result<(), SigningError<S::Error>> {
        self.add_signer_info_at(chain, signer, Time::now())
    }

    /// Adds a signature with an explicit signing time.
    pub fn add_signer_info_at<S: Signer>(
        &mut self, chain: &[Cert], signer: &S, signing_time: Time,
    ) -> Result<(), SigningError<S::Error>> {
        let public_key = signer.public_key();

        // If the key appears more than once, the last one wins.
        let cert = chain.iter().rev().find(|cert| {
            *cert.subject_public_key_info() == public_key
        }).ok_or(SigningError::NoMatchingCertificate)?;

        for (idx, item) in chain.iter().enumerate() {
            if self.has_certificate(item) || chain[..idx].contains(item) {
                return Err(SigningError::DuplicateCertificate)
            }
        }

        let digest_alg = cert.signature_algorithm().digest_algorithm()
            .ok_or(SigningError::UnsupportedDigest)?;
        let signature_alg = AlgorithmIdentifier::signature(
            public_key.algorithm()
        ).ok_or(SigningError::UnsupportedSignature)?;
        if SignatureAlgorithm::from_parts(
            public_key.algorithm(), digest_alg
        ).is_unknown() {
            return Err(SigningError::UnsupportedSignature)
        }

        let data = self.get_data().map_err(|_| {
            SigningError::WrongContentType
        })?.ok_or(SigningError::Detached)?;
        let message_digest = digest_alg.digest(&data);

        let signed_attrs = Attributes::from_unsorted([
            Attribute::single(
                oid::MESSAGE_DIGEST.0,
                OctetString::encode_slice(message_digest.as_ref())
            ),
            Attribute::single(oid::CONTENT_TYPE.0, oid::DATA.encode()),
            Attribute::single(
                oid::SIGNING_TIME.0, signing_time.encode_varied()
            ),
        ]);
        let signature = signer.sign(
            digest_alg,
            digest_alg.digest(&signed_attrs.marshaled_for_signing()).as_ref()
        )?;

        debug!(
            "Adding signer {} using {}.",
            cert.subject(), digest_alg
        );
        for item in chain {
            self.add_certificate(item);
        }
        self.add_digest_algorithm(AlgorithmIdentifier::digest(digest_alg));
        self.insert_signer_info(SignerInfo::new(
            cert,
            AlgorithmIdentifier::digest(digest_alg),
            Some(signed_attrs),
            signature_alg,
            signature,
        ));
        Ok(())
    }
}


//------------ IncludeCerts --------------------------------------------------

/// Which certificates of the signer’s chain to include.
///
/// The values correspond to the integers used by the `--include-certs`
/// option of gpgsm. Negative numbers select a policy, non-negative
/// numbers the number of certificates from the start of the chain.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "i64", into = "i64")
)]
pub enum IncludeCerts {
    /// Leave out issuers whose location is given by their subject.
    ///
    /// Certificates that carry an authority information access extension
    /// with a CA issuers location don’t need their issuer included, so
    /// the chain is cut after the first such certificate. The root is
    /// dropped as with `WithoutRoot`. This is `-3`.
    AiaTrimmed,

    /// Include everything but a self-signed root. This is `-2`.
    #[default]
    WithoutRoot,

    /// Include the complete chain. This is `-1`.
    All,

    /// Include the given number of certificates from the start.
    First(usize),
}

impl IncludeCerts {
    /// Returns the part of the chain to include.
    ///
    /// The chain starts with the signer’s certificate, followed by its
    /// issuers in order. The result is always a prefix of the chain.
    pub fn certs_for_signature(self, chain: &[Cert]) -> &[Cert] {
        match self {
            IncludeCerts::AiaTrimmed => {
                let mut end = chain.len();
                for i in (1..chain.len()).rev() {
                    let (issuer, cert) = (&chain[i], &chain[i - 1]);
                    if issuer.subject() == cert.issuer()
                        && !cert.ca_issuers().is_empty()
                    {
                        end = i;
                    }
                }
                chain_without_root(&chain[..end])
            }
            IncludeCerts::WithoutRoot => chain_without_root(chain),
            IncludeCerts::All => chain,
            IncludeCerts::First(n) => &chain[..n.min(chain.len())],
        }
    }
}

/// Drops the last certificate if it is self-signed.
///
/// A chain consisting of only a self-signed certificate becomes empty.
fn chain_without_root(chain: &[Cert]) -> &[Cert] {
    match chain.split_last() {
        Some((last, rest)) if last.is_self_issued() => rest,
        _ => chain
    }
}


//--- From and FromStr

impl From<i64> for IncludeCerts {
    fn from(value: i64) -> Self {
        match value {
            -3 => IncludeCerts::AiaTrimmed,
            -1 => IncludeCerts::All,
            value if value >= 0 => {
                IncludeCerts::First(
                    usize::try_from(value).unwrap_or(usize::MAX)
                )
            }
            _ => IncludeCerts::WithoutRoot,
        }
    }
}

impl From<IncludeCerts> for i64 {
    fn from(value: IncludeCerts) -> Self {
        match value {
            IncludeCerts::AiaTrimmed => -3,
            IncludeCerts::WithoutRoot => -2,
            IncludeCerts::All => -1,
            IncludeCerts::First(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

impl FromStr for IncludeCerts {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        i64::from_str(s.trim()).map(Into::into)
    }
}


//--- Display

impl fmt::Display for IncludeCerts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::io;
    use bytes::Bytes;
    use crate::crypto::{DigestAlgorithm, PublicKey, Signature};
    use crate::crypto::softsigner::OpenSslSigner;

    fn cert(data: &'static [u8]) -> Cert {
        Cert::decode(Bytes::from_static(data)).unwrap()
    }

    fn root() -> Cert {
        cert(include_bytes!("../test-data/chain/root.cer"))
    }

    fn intermediate() -> Cert {
        cert(include_bytes!("../test-data/chain/intermediate.cer"))
    }

    fn leaf() -> Cert {
        cert(include_bytes!("../test-data/chain/leaf.cer"))
    }

    fn aia_leaf() -> Cert {
        cert(include_bytes!("../test-data/chain/aia-leaf.cer"))
    }

    fn leaf_signer() -> OpenSslSigner {
        OpenSslSigner::from_pem(
            include_bytes!("../test-data/chain/leaf.key")
        ).unwrap()
    }

    fn signing_time() -> Time {
        Time::utc(2030, 1, 1, 12, 0, 0).unwrap()
    }

    fn check_signature(sd: &SignedData, cert: &Cert) {
        let info = &sd.signer_infos()[0];
        let message = info.signed_attrs().unwrap().marshaled_for_signing();
        cert.subject_public_key_info().verify(
            &message,
            &Signature::new(
                info.x509_signature_algorithm(), info.signature().clone()
            )
        ).unwrap();
    }

    #[test]
    fn sign_with_chain() {
        let chain = [leaf(), intermediate(), root()];
        let mut sd = SignedData::new(Bytes::from_static(b"hello, world!"));
        sd.add_signer_info_at(&chain, &leaf_signer(), signing_time())
            .unwrap();

        // Certificates end up in DER order, not chain order.
        let mut sorted = chain.to_vec();
        sorted.sort_by(|left, right| left.as_slice().cmp(right.as_slice()));
        assert_eq!(sd.x509_certificates().unwrap(), sorted);
        let reparsed = SignedData::parse(&sd.to_der()).unwrap();
        assert_eq!(reparsed.x509_certificates().unwrap(), sorted);
        assert_eq!(sd.digest_algorithms().len(), 1);
        assert_eq!(sd.signer_infos().len(), 1);

        let info = &sd.signer_infos()[0];
        assert_eq!(info.version(), 1);
        assert_eq!(info.hash(), Some(DigestAlgorithm::Sha256));
        assert_eq!(
            info.x509_signature_algorithm(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(info.content_type().unwrap(), oid::DATA);
        assert_eq!(
            info.message_digest().unwrap().as_ref(),
            DigestAlgorithm::Sha256.digest(b"hello, world!").as_ref()
        );
        assert_eq!(info.signing_time().unwrap(), signing_time());
        assert_eq!(info.find_certificate(&chain).unwrap(), &chain[0]);
        check_signature(&sd, &chain[0]);

        // The algorithm comes from the key, not the certificate.
        assert_eq!(
            *info.signature_algorithm().algorithm(), oid::RSA_ENCRYPTION
        );

        // Signed attributes are in DER order.
        let attrs: Vec<_> = info.signed_attrs().unwrap().iter().map(|attr| {
            attr.to_captured()
        }).collect();
        assert_eq!(attrs.len(), 3);
        assert!(attrs.windows(2).all(|pair| {
            pair[0].as_slice() < pair[1].as_slice()
        }));

        // The result survives encoding.
        let reparsed = SignedData::parse(&sd.to_der()).unwrap();
        assert_eq!(reparsed.to_der(), sd.to_der());
        check_signature(&reparsed, &chain[0]);
    }

    #[test]
    fn ecdsa_key_with_rsa_issuer() {
        let chain = [
            cert(include_bytes!("../test-data/chain/code-signing.cer")),
            intermediate(),
        ];
        let signer = OpenSslSigner::from_pem(
            include_bytes!("../test-data/chain/code-signing.key")
        ).unwrap();
        let mut sd = SignedData::new(Bytes::from_static(b"code"));
        sd.add_signer_info(&chain, &signer).unwrap();
        let info = &sd.signer_infos()[0];
        assert_eq!(
            info.signature_algorithm().algorithm(), &oid::EC_PUBLIC_KEY
        );
        assert_eq!(
            info.x509_signature_algorithm(),
            SignatureAlgorithm::EcdsaWithSha256
        );
        check_signature(&sd, &chain[0]);
    }

    #[test]
    fn two_signers() {
        let mut sd = SignedData::new(Bytes::from_static(b"hello, world!"));
        sd.add_signer_info(&[leaf()], &leaf_signer()).unwrap();
        let signer = OpenSslSigner::from_pem(
            include_bytes!("../test-data/chain/aia-leaf.key")
        ).unwrap();
        sd.add_signer_info(&[aia_leaf(), intermediate()], &signer).unwrap();
        assert_eq!(sd.signer_infos().len(), 2);
        assert_eq!(sd.digest_algorithms().len(), 1);
        assert_eq!(sd.x509_certificates().unwrap().len(), 3);

        let infos: Vec<_> = sd.signer_infos().iter().map(|info| {
            info.to_captured()
        }).collect();
        assert!(infos[0].as_slice() < infos[1].as_slice());
        let certs = sd.certificates().unwrap().elements();
        assert!(certs.windows(2).all(|pair| {
            pair[0].as_slice() < pair[1].as_slice()
        }));
    }

    #[test]
    fn signing_errors() {
        let data = Bytes::from_static(b"hello, world!");

        let mut sd = SignedData::new(data.clone());
        assert!(matches!(
            sd.add_signer_info(
                &[aia_leaf(), intermediate()], &leaf_signer()
            ),
            Err(SigningError::NoMatchingCertificate)
        ));
        assert!(sd.certificates().is_none());

        sd.add_signer_info(&[leaf(), intermediate()], &leaf_signer())
            .unwrap();
        assert!(matches!(
            sd.add_signer_info(&[leaf()], &leaf_signer()),
            Err(SigningError::DuplicateCertificate)
        ));
        assert_eq!(sd.signer_infos().len(), 1);
        assert_eq!(sd.x509_certificates().unwrap().len(), 2);

        let mut sd = SignedData::new(data);
        sd.detach();
        assert!(matches!(
            sd.add_signer_info(&[leaf()], &leaf_signer()),
            Err(SigningError::Detached)
        ));
        assert!(sd.certificates().is_none());
    }

    struct BrokenSigner(PublicKey);

    impl Signer for BrokenSigner {
        type Error = io::Error;

        fn public_key(&self) -> PublicKey {
            self.0.clone()
        }

        fn sign(
            &self, _: DigestAlgorithm, _: &[u8]
        ) -> Result<Bytes, Self::Error> {
            Err(io::Error::new(io::ErrorKind::Other, "token removed"))
        }
    }

    #[test]
    fn signer_error_is_passed_through() {
        let leaf = leaf();
        let signer = BrokenSigner(leaf.subject_public_key_info().clone());
        let mut sd = SignedData::new(Bytes::from_static(b"hello, world!"));
        let err = sd.add_signer_info(&[leaf], &signer).unwrap_err();
        assert!(matches!(err, SigningError::Signer(_)));
        assert_eq!(err.to_string(), "token removed");
        assert!(sd.signer_infos().is_empty());
        assert!(sd.certificates().is_none());
    }

    #[test]
    fn unsupported_algorithms() {
        // The certificate is signed with SHA-224 which we don’t do.
        let legacy = cert(
            include_bytes!("../test-data/chain/legacy-sha224.cer")
        );
        assert_eq!(legacy.signature_algorithm(), SignatureAlgorithm::Unknown);
        let mut sd = SignedData::new(Bytes::from_static(b"hello, world!"));
        assert!(matches!(
            sd.add_signer_info(&[legacy], &leaf_signer()),
            Err(SigningError::UnsupportedDigest)
        ));
        assert!(sd.signer_infos().is_empty());
        assert!(sd.certificates().is_none());

        // An Ed25519 key under an RSA issuer has no signature algorithm.
        let edwards = cert(include_bytes!("../test-data/chain/ed25519.cer"));
        let signer = BrokenSigner(edwards.subject_public_key_info().clone());
        assert!(matches!(
            sd.add_signer_info(&[edwards], &signer),
            Err(SigningError::UnsupportedSignature)
        ));
        assert!(sd.signer_infos().is_empty());
        assert!(sd.certificates().is_none());
        assert!(sd.digest_algorithms().is_empty());
    }

    #[test]
    fn include_certs_from_int() {
        assert_eq!(IncludeCerts::from(-4), IncludeCerts::WithoutRoot);
        assert_eq!(IncludeCerts::from(-3), IncludeCerts::AiaTrimmed);
        assert_eq!(IncludeCerts::from(-2), IncludeCerts::WithoutRoot);
        assert_eq!(IncludeCerts::from(-1), IncludeCerts::All);
        assert_eq!(IncludeCerts::from(0), IncludeCerts::First(0));
        assert_eq!(IncludeCerts::from(5), IncludeCerts::First(5));
        assert_eq!(IncludeCerts::default(), IncludeCerts::WithoutRoot);
        assert_eq!("-3".parse(), Ok(IncludeCerts::AiaTrimmed));
        assert_eq!(" 1 ".parse(), Ok(IncludeCerts::First(1)));
        assert!("all".parse::<IncludeCerts>().is_err());
        assert_eq!(IncludeCerts::All.to_string(), "-1");
    }

    #[test]
    fn certs_for_signature() {
        let chain = [leaf(), intermediate(), root()];
        let check = |include: i64, len: usize| {
            assert_eq!(
                IncludeCerts::from(include).certs_for_signature(&chain),
                &chain[..len],
                "include {}", include
            );
        };
        check(-3, 2);
        check(-2, 2);
        check(-1, 3);
        check(0, 0);
        check(1, 1);
        check(5, 3);

        // Without a root, nothing is dropped.
        let chain = [leaf(), intermediate()];
        assert_eq!(
            IncludeCerts::WithoutRoot.certs_for_signature(&chain), &chain
        );

        // A lone self-signed certificate is dropped, too.
        let chain = [root()];
        assert!(
            IncludeCerts::WithoutRoot.certs_for_signature(&chain).is_empty()
        );
        assert!(IncludeCerts::First(0).certs_for_signature(&[]).is_empty());
    }

    #[test]
    fn aia_trimming() {
        let chain = [aia_leaf(), intermediate(), root()];
        assert_eq!(
            IncludeCerts::AiaTrimmed.certs_for_signature(&chain),
            &chain[..1]
        );
        assert_eq!(
            IncludeCerts::WithoutRoot.certs_for_signature(&chain),
            &chain[..2]
        );

        // Here the intermediate points to the root.
        let chain = [
            cert(include_bytes!(
                "../test-data/chain/aia-intermediate-leaf.cer"
            )),
            cert(include_bytes!("../test-data/chain/aia-intermediate.cer")),
            cert(include_bytes!("../test-data/chain/aia-root.cer")),
        ];
        assert!(chain[0].ca_issuers().is_empty());
        assert!(!chain[1].ca_issuers().is_empty());
        assert_eq!(
            IncludeCerts::AiaTrimmed.certs_for_signature(&chain),
            &chain[..2]
        );
        assert_eq!(
            IncludeCerts::WithoutRoot.certs_for_signature(&chain),
            &chain[..2]
        );
        assert_eq!(
            IncludeCerts::AiaTrimmed.certs_for_signature(&chain[..2]),
            &chain[..2]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn include_certs_serde() {
        assert_eq!(
            serde_json::to_string(&IncludeCerts::AiaTrimmed).unwrap(), "-3"
        );
        assert_eq!(
            serde_json::from_str::<IncludeCerts>("2").unwrap(),
            IncludeCerts::First(2)
        );
    }
}
