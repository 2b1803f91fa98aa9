//! Algorithm identifiers.

use bcder::{decode, encode};
use bcder::{Captured, Mode, Oid};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::oid;
use crate::crypto::{DigestAlgorithm, PublicKeyFormat};


//------------ AlgorithmIdentifier -------------------------------------------

/// An algorithm identifier as found in CMS signed data.
///
/// ```txt
/// AlgorithmIdentifier  ::=  SEQUENCE  {
///      algorithm               OBJECT IDENTIFIER,
///      parameters              ANY DEFINED BY algorithm OPTIONAL  }
/// ```
///
/// Signed data may well list algorithms we don’t support, so this type
/// keeps the object identifier and the encoded parameters as they are.
/// Interpretation happens through [`DigestAlgorithm`] and
/// [`SignatureAlgorithm`][crate::crypto::SignatureAlgorithm].
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    algorithm: Oid<Bytes>,
    parameters: Option<Captured>,
}

impl AlgorithmIdentifier {
    pub fn new(algorithm: Oid<Bytes>, parameters: Option<Captured>) -> Self {
        AlgorithmIdentifier { algorithm, parameters }
    }

    /// Creates the identifier for a digest algorithm.
    ///
    /// As recommended by RFC 5754, the parameters are left out.
    pub fn digest(algorithm: DigestAlgorithm) -> Self {
        AlgorithmIdentifier {
            algorithm: Oid(Bytes::from_static(algorithm.oid().0)),
            parameters: None,
        }
    }

    /// Creates the SignerInfo signature algorithm for a key format.
    ///
    /// This is the plain public key algorithm. RSA gets NULL parameters,
    /// ECDSA none. Returns `None` for unsupported keys.
    pub fn signature(key: PublicKeyFormat) -> Option<Self> {
        match key {
            PublicKeyFormat::Rsa => {
                Some(AlgorithmIdentifier {
                    algorithm: Oid(Bytes::from_static(oid::RSA_ENCRYPTION.0)),
                    parameters: Some(().encode().to_captured(Mode::Der)),
                })
            }
            PublicKeyFormat::EcdsaP256 | PublicKeyFormat::EcdsaP384 => {
                Some(AlgorithmIdentifier {
                    algorithm: Oid(Bytes::from_static(oid::EC_PUBLIC_KEY.0)),
                    parameters: None,
                })
            }
            PublicKeyFormat::Unsupported => None,
        }
    }

    pub fn algorithm(&self) -> &Oid<Bytes> {
        &self.algorithm
    }

    /// Returns the encoded parameters if present.
    pub fn parameters(&self) -> Option<&Captured> {
        self.parameters.as_ref()
    }

    /// Returns the digest algorithm if this identifies a supported one.
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        DigestAlgorithm::from_oid(&self.algorithm)
    }

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
        let algorithm = Oid::take_from(cons)?;
        let parameters = cons.capture_all()?;
        Ok(AlgorithmIdentifier {
            algorithm,
            parameters: if parameters.as_slice().is_empty() {
                None
            }
            else {
                Some(parameters)
            }
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.algorithm.encode_ref(),
            self.parameters.as_ref(),
        ))
    }

    pub fn to_captured(&self) -> Captured {
        self.encode_ref().to_captured(Mode::Der)
    }
}


//--- PartialEq and Eq

/// Identifiers are equal if their algorithms are. RFC 5754 allows both
/// absent and NULL parameters for the same digest algorithm.
impl PartialEq for AlgorithmIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm
    }
}

impl Eq for AlgorithmIdentifier { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digest_with_and_without_null() {
        // SEQUENCE { sha256, NULL }
        let with_null = Mode::Der.decode(
            b"\x30\x0d\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x01\x05\x00"
                .as_ref(),
            AlgorithmIdentifier::take_from
        ).unwrap();
        assert_eq!(
            with_null.digest_algorithm(), Some(DigestAlgorithm::Sha256)
        );
        assert_eq!(with_null.parameters().unwrap().as_slice(), b"\x05\x00");
        assert_eq!(
            with_null.to_captured().as_slice(),
            b"\x30\x0d\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x01\x05\x00"
        );

        let without = AlgorithmIdentifier::digest(DigestAlgorithm::Sha256);
        assert!(without.parameters().is_none());
        assert_eq!(without, with_null);
        assert_eq!(
            without.to_captured().as_slice(),
            b"\x30\x0b\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x01"
        );
    }

    #[test]
    fn signature_identifiers() {
        assert_eq!(
            AlgorithmIdentifier::signature(PublicKeyFormat::Rsa).unwrap()
                .to_captured().as_slice(),
            b"\x30\x0d\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x01\x05\x00"
        );
        assert_eq!(
            AlgorithmIdentifier::signature(PublicKeyFormat::EcdsaP256)
                .unwrap().to_captured().as_slice(),
            b"\x30\x09\x06\x07\x2a\x86\x48\xce\x3d\x02\x01"
        );
        assert!(
            AlgorithmIdentifier::signature(PublicKeyFormat::Unsupported)
                .is_none()
        );
    }

    #[test]
    fn unknown_algorithm() {
        // SEQUENCE { md5 }
        let md5 = Mode::Der.decode(
            b"\x30\x0a\x06\x08\x2a\x86\x48\x86\xf7\x0d\x02\x05".as_ref(),
            AlgorithmIdentifier::take_from
        ).unwrap();
        assert!(md5.digest_algorithm().is_none());
        assert_eq!(md5.algorithm(), &oid::MD5);
    }
}
