//! Signature algorithms and operations.

use std::fmt;
use bcder::decode;
use bcder::{ConstOid, Oid};
use bytes::Bytes;
use ring::signature::{self as ring_sig, VerificationAlgorithm};
use crate::oid;
use super::digest::DigestAlgorithm;
use super::keys::PublicKeyFormat;


//------------ SignatureAlgorithm --------------------------------------------

/// The signature algorithms we know how to verify.
///
/// This is the combination of a public key algorithm and a digest
/// algorithm. Certificates state it through a single object identifier,
/// while a CMS SignerInfo splits it into its signature algorithm, usually
/// just the public key algorithm, and the digest algorithm.
///
/// Any combination we don’t support results in the `Unknown` value.
/// Parsing doesn’t fail for those so that objects using them can still be
/// inspected. Anybody wanting to use an algorithm has to check for this
/// value first.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// The combination of algorithms is not supported.
    Unknown,

    /// RSA with PKCS #1 v1.5 padding and SHA-1.
    Sha1WithRsa,

    /// RSA with PKCS #1 v1.5 padding and SHA-256.
    Sha256WithRsa,

    /// RSA with PKCS #1 v1.5 padding and SHA-384.
    Sha384WithRsa,

    /// RSA with PKCS #1 v1.5 padding and SHA-512.
    Sha512WithRsa,

    /// ECDSA with SHA-256.
    EcdsaWithSha256,

    /// ECDSA with SHA-384.
    EcdsaWithSha384,
}

impl SignatureAlgorithm {
    /// Returns whether this is the `Unknown` value.
    pub fn is_unknown(self) -> bool {
        matches!(self, SignatureAlgorithm::Unknown)
    }

    /// Returns the digest algorithm used by the signature algorithm.
    pub fn digest_algorithm(self) -> Option<DigestAlgorithm> {
        match self {
            SignatureAlgorithm::Unknown => None,
            SignatureAlgorithm::Sha1WithRsa => Some(DigestAlgorithm::Sha1),
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::EcdsaWithSha256 => {
                Some(DigestAlgorithm::Sha256)
            }
            SignatureAlgorithm::Sha384WithRsa
            | SignatureAlgorithm::EcdsaWithSha384 => {
                Some(DigestAlgorithm::Sha384)
            }
            SignatureAlgorithm::Sha512WithRsa => {
                Some(DigestAlgorithm::Sha512)
            }
        }
    }

    /// Returns the signature algorithm for a key and digest algorithm.
    ///
    /// Returns `Unknown` for combinations we can’t verify.
    pub fn from_parts(
        key: PublicKeyFormat, digest: DigestAlgorithm
    ) -> Self {
        match (key, digest) {
            (PublicKeyFormat::Rsa, DigestAlgorithm::Sha1) => {
                SignatureAlgorithm::Sha1WithRsa
            }
            (PublicKeyFormat::Rsa, DigestAlgorithm::Sha256) => {
                SignatureAlgorithm::Sha256WithRsa
            }
            (PublicKeyFormat::Rsa, DigestAlgorithm::Sha384) => {
                SignatureAlgorithm::Sha384WithRsa
            }
            (PublicKeyFormat::Rsa, DigestAlgorithm::Sha512) => {
                SignatureAlgorithm::Sha512WithRsa
            }
            (
                PublicKeyFormat::EcdsaP256 | PublicKeyFormat::EcdsaP384,
                DigestAlgorithm::Sha256
            ) => {
                SignatureAlgorithm::EcdsaWithSha256
            }
            (
                PublicKeyFormat::EcdsaP256 | PublicKeyFormat::EcdsaP384,
                DigestAlgorithm::Sha384
            ) => {
                SignatureAlgorithm::EcdsaWithSha384
            }
            _ => SignatureAlgorithm::Unknown
        }
    }

    /// Returns the ring algorithm for verifying with the given key format.
    pub(crate) fn verification_algorithm(
        self, key: PublicKeyFormat
    ) -> Option<&'static dyn VerificationAlgorithm> {
        Some(match (self, key) {
            (SignatureAlgorithm::Sha1WithRsa, PublicKeyFormat::Rsa) => {
                &ring_sig::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
            }
            (SignatureAlgorithm::Sha256WithRsa, PublicKeyFormat::Rsa) => {
                &ring_sig::RSA_PKCS1_2048_8192_SHA256
            }
            (SignatureAlgorithm::Sha384WithRsa, PublicKeyFormat::Rsa) => {
                &ring_sig::RSA_PKCS1_2048_8192_SHA384
            }
            (SignatureAlgorithm::Sha512WithRsa, PublicKeyFormat::Rsa) => {
                &ring_sig::RSA_PKCS1_2048_8192_SHA512
            }
            (
                SignatureAlgorithm::EcdsaWithSha256,
                PublicKeyFormat::EcdsaP256
            ) => {
                &ring_sig::ECDSA_P256_SHA256_ASN1
            }
            (
                SignatureAlgorithm::EcdsaWithSha384,
                PublicKeyFormat::EcdsaP256
            ) => {
                &ring_sig::ECDSA_P256_SHA384_ASN1
            }
            (
                SignatureAlgorithm::EcdsaWithSha256,
                PublicKeyFormat::EcdsaP384
            ) => {
                &ring_sig::ECDSA_P384_SHA256_ASN1
            }
            (
                SignatureAlgorithm::EcdsaWithSha384,
                PublicKeyFormat::EcdsaP384
            ) => {
                &ring_sig::ECDSA_P384_SHA384_ASN1
            }
            _ => return None
        })
    }
}


/// # ASN.1 Values
///
/// Signature algorithm identifiers appear in certificates as well as in
/// the SignerInfo of CMS signed data.
///
/// ```txt
/// SignatureAlgorithmIdentifier ::= AlgorithmIdentifier
/// AlgorithmIdentifier          ::= SEQUENCE {
///      algorithm                   OBJECT IDENTIFIER,
///      parameters                  ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// Certificates use identifiers that combine public key and digest
/// algorithms, such as `sha256WithRSAEncryption` from [RFC 4055] or
/// `ecdsa-with-SHA256` from [RFC 5758]. These are handled by the methods
/// prefixed with `x509_`.
///
/// In a SignerInfo, the signature algorithm typically is the public key
/// algorithm, i.e., `rsaEncryption` or `id-ecPublicKey`, and the digest
/// algorithm is taken from the SignerInfo’s digest algorithm field. Some
/// producers use the combined identifiers here, too, which we accept as
/// long as they agree with the digest algorithm. The methods for this
/// are prefixed with `cms_`.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5758]: https://tools.ietf.org/html/rfc5758
impl SignatureAlgorithm {
    /// Returns the algorithm for a certificate’s signature algorithm.
    pub fn from_x509_oid<T: AsRef<[u8]>>(oid: &Oid<T>) -> Self {
        if *oid == oid::SHA1_WITH_RSA_ENCRYPTION {
            SignatureAlgorithm::Sha1WithRsa
        }
        else if *oid == oid::SHA256_WITH_RSA_ENCRYPTION {
            SignatureAlgorithm::Sha256WithRsa
        }
        else if *oid == oid::SHA384_WITH_RSA_ENCRYPTION {
            SignatureAlgorithm::Sha384WithRsa
        }
        else if *oid == oid::SHA512_WITH_RSA_ENCRYPTION {
            SignatureAlgorithm::Sha512WithRsa
        }
        else if *oid == oid::ECDSA_WITH_SHA256 {
            SignatureAlgorithm::EcdsaWithSha256
        }
        else if *oid == oid::ECDSA_WITH_SHA384 {
            SignatureAlgorithm::EcdsaWithSha384
        }
        else {
            SignatureAlgorithm::Unknown
        }
    }

    /// Returns the algorithm for a SignerInfo.
    ///
    /// The arguments are the object identifiers of the SignerInfo’s
    /// signature algorithm and digest algorithm respectively.
    pub fn from_cms_oids<T: AsRef<[u8]>, U: AsRef<[u8]>>(
        signature: &Oid<T>, digest: &Oid<U>
    ) -> Self {
        let digest = match DigestAlgorithm::from_oid(digest) {
            Some(digest) => digest,
            None => return SignatureAlgorithm::Unknown
        };
        if *signature == oid::RSA_ENCRYPTION {
            return Self::from_parts(PublicKeyFormat::Rsa, digest)
        }
        if *signature == oid::EC_PUBLIC_KEY {
            return Self::from_parts(PublicKeyFormat::EcdsaP256, digest)
        }
        let res = Self::from_x509_oid(signature);
        if res.digest_algorithm() == Some(digest) {
            res
        }
        else {
            SignatureAlgorithm::Unknown
        }
    }

    /// Returns the combined object identifier used in certificates.
    pub fn x509_oid(self) -> Option<&'static ConstOid> {
        match self {
            SignatureAlgorithm::Unknown => None,
            SignatureAlgorithm::Sha1WithRsa => {
                Some(&oid::SHA1_WITH_RSA_ENCRYPTION)
            }
            SignatureAlgorithm::Sha256WithRsa => {
                Some(&oid::SHA256_WITH_RSA_ENCRYPTION)
            }
            SignatureAlgorithm::Sha384WithRsa => {
                Some(&oid::SHA384_WITH_RSA_ENCRYPTION)
            }
            SignatureAlgorithm::Sha512WithRsa => {
                Some(&oid::SHA512_WITH_RSA_ENCRYPTION)
            }
            SignatureAlgorithm::EcdsaWithSha256 => {
                Some(&oid::ECDSA_WITH_SHA256)
            }
            SignatureAlgorithm::EcdsaWithSha384 => {
                Some(&oid::ECDSA_WITH_SHA384)
            }
        }
    }

    /// Takes a certificate’s signature algorithm identifier.
    ///
    /// Parameters are skipped. Unsupported algorithms result in `Unknown`.
    pub fn x509_take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, decode::DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let oid = Oid::take_from(cons)?;
            cons.skip_all()?;
            Ok(Self::from_x509_oid(&oid))
        })
    }
}


//--- Display

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SignatureAlgorithm::Unknown => "unknown",
            SignatureAlgorithm::Sha1WithRsa => "SHA1-RSA",
            SignatureAlgorithm::Sha256WithRsa => "SHA256-RSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384-RSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512-RSA",
            SignatureAlgorithm::EcdsaWithSha256 => "ECDSA-SHA256",
            SignatureAlgorithm::EcdsaWithSha384 => "ECDSA-SHA384",
        })
    }
}


//------------ Signature -----------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    algorithm: SignatureAlgorithm,
    value: Bytes
}

impl Signature {
    pub fn new(algorithm: SignatureAlgorithm, value: Bytes) -> Self {
        Signature { algorithm, value }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn unwrap(self) -> (SignatureAlgorithm, Bytes) {
        (self.algorithm, self.value)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cms_table() {
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::SHA256
            ),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::SHA1
            ),
            SignatureAlgorithm::Sha1WithRsa
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::EC_PUBLIC_KEY, &oid::SHA384
            ),
            SignatureAlgorithm::EcdsaWithSha384
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::SHA256_WITH_RSA_ENCRYPTION, &oid::SHA256
            ),
            SignatureAlgorithm::Sha256WithRsa
        );
    }

    #[test]
    fn cms_table_unknown() {
        assert!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::MD5
            ).is_unknown()
        );
        assert!(
            SignatureAlgorithm::from_cms_oids(
                &oid::EC_PUBLIC_KEY, &oid::SHA512
            ).is_unknown()
        );
        assert!(
            SignatureAlgorithm::from_cms_oids(
                &oid::SHA256_WITH_RSA_ENCRYPTION, &oid::SHA1
            ).is_unknown()
        );
        assert!(
            SignatureAlgorithm::from_cms_oids(
                &oid::AT_COMMON_NAME, &oid::SHA256
            ).is_unknown()
        );
    }

    #[test]
    fn x509_table() {
        for alg in [
            SignatureAlgorithm::Sha1WithRsa,
            SignatureAlgorithm::Sha256WithRsa,
            SignatureAlgorithm::Sha384WithRsa,
            SignatureAlgorithm::Sha512WithRsa,
            SignatureAlgorithm::EcdsaWithSha256,
            SignatureAlgorithm::EcdsaWithSha384,
        ] {
            assert_eq!(
                SignatureAlgorithm::from_x509_oid(alg.x509_oid().unwrap()),
                alg
            );
        }
        assert!(
            SignatureAlgorithm::from_x509_oid(
                &oid::MD5_WITH_RSA_ENCRYPTION
            ).is_unknown()
        );
        assert!(
            SignatureAlgorithm::from_x509_oid(&oid::ECDSA_WITH_SHA1)
                .is_unknown()
        );
    }

    #[test]
    fn verification_algorithms() {
        assert!(
            SignatureAlgorithm::Sha256WithRsa.verification_algorithm(
                PublicKeyFormat::Rsa
            ).is_some()
        );
        assert!(
            SignatureAlgorithm::Sha256WithRsa.verification_algorithm(
                PublicKeyFormat::EcdsaP256
            ).is_none()
        );
        assert!(
            SignatureAlgorithm::Unknown.verification_algorithm(
                PublicKeyFormat::Rsa
            ).is_none()
        );
    }
}
