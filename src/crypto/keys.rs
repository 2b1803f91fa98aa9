//! Types and parameters of keys.

use std::{error, fmt, io};
use bcder::{decode, encode};
use bcder::{BitString, Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use ring::digest;
use ring::error::Unspecified;
use untrusted::Input;
use crate::oid;
use crate::util::hex::Hex;
use crate::x509::decode_complete;
use super::signature::Signature;


//------------ PublicKeyFormat -----------------------------------------------

/// The formats of public keys.
///
/// A variant is defined for each kind of key we can verify signatures with.
/// Certificates may well contain other keys, so there is a catch-all
/// variant for those.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PublicKeyFormat {
    /// An RSA public key.
    Rsa,

    /// An ECDSA public key for the P-256 elliptic curve.
    EcdsaP256,

    /// An ECDSA public key for the P-384 elliptic curve.
    EcdsaP384,

    /// Any other key.
    Unsupported,
}

impl PublicKeyFormat {
    /// Returns whether keys of this format can be used at all.
    pub fn is_supported(self) -> bool {
        !matches!(self, PublicKeyFormat::Unsupported)
    }
}


/// # ASN.1 Algorithm Identifiers
///
/// The format of the public key is identified in certificates through a
/// algorithm identifier defined with this ASN.1:
///
/// ```txt
/// AlgorithmIdentifier ::= SEQUENCE {
///      algorithm          OBJECT IDENTIFIER,
///      parameters         ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// For RSA keys, the object identifier needs to be that of `rsaEncryption`
/// defined by [RFC 4055] and the parameters must be present and NULL.
/// When parsing, we generously also allow it to be absent altogether.
///
/// For ECDSA keys, the object identifer needs to be `ecPublicKey` defined
/// in [RFC 5480] with the parameter being the object identifier of the
/// named curve, either `secp256r1` or `secp384r1`.
///
/// Anything else results in `PublicKeyFormat::Unsupported` rather than an
/// error, so that certificates with such keys can still be parsed.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5480]: https://tools.ietf.org/html/rfc5480
impl PublicKeyFormat{
    /// Takes and returns a algorithm identifier.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the algorithm identifier from the contents of its sequence.
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let alg = Oid::take_from(cons)?;
        if alg == oid::RSA_ENCRYPTION {
            cons.take_opt_null()?;
            Ok(PublicKeyFormat::Rsa)
        }
        else if alg == oid::EC_PUBLIC_KEY {
            let curve = match Oid::take_opt_from(cons)? {
                Some(curve) => curve,
                None => {
                    // Explicit curve parameters. We don’t do those.
                    cons.skip_all()?;
                    return Ok(PublicKeyFormat::Unsupported)
                }
            };
            if curve == oid::SECP256R1 {
                Ok(PublicKeyFormat::EcdsaP256)
            }
            else if curve == oid::SECP384R1 {
                Ok(PublicKeyFormat::EcdsaP384)
            }
            else {
                Ok(PublicKeyFormat::Unsupported)
            }
        }
        else {
            cons.skip_all()?;
            Ok(PublicKeyFormat::Unsupported)
        }
    }
}


//------------ PublicKey -----------------------------------------------------

/// A public key.
///
/// The key keeps its complete encoded _SubjectPublicKeyInfo_ around. Two
/// keys are equal if these encodings are equal.
#[derive(Clone, Debug)]
pub struct PublicKey {
    algorithm: PublicKeyFormat,
    bits: Bytes,
    info: Captured,
}


impl PublicKey {
    /// Returns the algorithm of this public key.
    pub fn algorithm(&self) -> PublicKeyFormat {
        self.algorithm
    }

    /// Returns the bits of this public key.
    ///
    /// For RSA keys, this is the DER encoded _RSAPublicKey,_ for ECDSA
    /// keys the encoded curve point.
    pub fn bits(&self) -> &[u8] {
        self.bits.as_ref()
    }

    /// Returns a key identifier for this key.
    ///
    /// The identifier will be the SHA1 hash of the key’s bits as described
    /// in section 4.2.1.2 of RFC 5280.
    pub fn key_identifier(&self) -> KeyIdentifier {
        KeyIdentifier(Bytes::copy_from_slice(
            digest::digest(
                &digest::SHA1_FOR_LEGACY_USE_ONLY, self.bits()
            ).as_ref()
        ))
    }

    /// Verifies a signature using this public key.
    ///
    /// RSA keys need to have at least 2048 bits. The signature algorithm
    /// has to fit the key’s format.
    pub fn verify(
        &self, message: &[u8], signature: &Signature
    ) -> Result<(), SignatureVerificationError> {
        let alg = signature.algorithm().verification_algorithm(
            self.algorithm
        ).ok_or(SignatureVerificationError)?;
        alg.verify(
            Input::from(self.bits()),
            Input::from(message),
            Input::from(signature.value().as_ref())
        ).map_err(Into::into)
    }
}


/// # As `SubjectPublicKeyInfo`
///
/// Public keys are included in X.509 certificates as `SubjectPublicKeyInfo`
/// structures:
///
/// ```txt
/// SubjectPublicKeyInfo  ::=  SEQUENCE  {
///      algorithm            AlgorithmIdentifier,
///      subjectPublicKey     BIT STRING  }
/// ```
impl PublicKey {
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        decode_complete(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let info = cons.capture_one()?;
        let (algorithm, bits) = info.clone().decode(|cons| {
            cons.take_sequence(|cons| {
                Ok((
                    PublicKeyFormat::take_from(cons)?,
                    BitString::take_from(cons)?.octet_bytes()
                ))
            })
        }).map_err(DecodeError::convert)?;
        Ok(PublicKey { algorithm, bits, info })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.info
    }

    /// Returns a bytes values of the encoded the *subjectPublicKeyInfo*.
    pub fn to_info_bytes(&self) -> Bytes {
        self.info.clone().into_bytes()
    }
}


//--- PartialEq and Eq

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.info.as_slice() == other.info.as_slice()
    }
}

impl Eq for PublicKey { }


//------------ KeyIdentifier -------------------------------------------------

/// A key identifier.
///
/// Identifiers we create ourselves are the SHA-1 hash over the public key’s
/// bits. Identifiers found in certificates can be anything, though, so
/// there is no length restriction.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct KeyIdentifier(Bytes);

impl KeyIdentifier {
    /// Creates a new identifier for the given key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        key.key_identifier()
    }

    /// Creates an identifier from its octets.
    pub fn from_bytes(bytes: Bytes) -> Self {
        KeyIdentifier(bytes)
    }

    /// Returns an octet slice of the key identifer’s value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Takes an encoded key identifier from a constructed value.
    ///
    /// ```text
    /// KeyIdentifier ::= OCTET STRING
    /// ```
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_value_if(Tag::OCTET_STRING, Self::from_content)
    }

    /// Parses an encoded key identifer from a encoded content.
    pub fn from_content<S: decode::Source>(
        content: &mut decode::Content<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        OctetString::from_content(content).map(|content| {
            KeyIdentifier(content.into_bytes())
        })
    }
}


//--- AsRef

impl AsRef<[u8]> for KeyIdentifier {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//--- Display and Debug

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&Hex(self.as_slice()), f)
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyIdentifier({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for KeyIdentifier {
    const TAG: Tag = Tag::OCTET_STRING;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&self.0)
    }
}


//------------ SignatureVerificationError ------------------------------------

/// An error happened while verifying a signature.
///
/// No further information is provided. This is on purpose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignatureVerificationError;

impl From<Unspecified> for SignatureVerificationError {
    fn from(_: Unspecified) -> Self {
        SignatureVerificationError
    }
}

impl From<SignatureVerificationError> for ContentError {
    fn from(_: SignatureVerificationError) -> Self {
        ContentError::from_static("signature verification failed")
    }
}

impl fmt::Display for SignatureVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("signature verification failed")
    }
}

impl error::Error for SignatureVerificationError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::cert::Cert;

    #[test]
    fn decode_rsa_key() {
        let cert = Cert::decode(
            include_bytes!("../../test-data/chain/leaf.cer").as_ref()
        ).unwrap();
        let key = cert.subject_public_key_info();
        assert_eq!(key.algorithm(), PublicKeyFormat::Rsa);
        assert_eq!(
            key.key_identifier().as_slice(),
            b"\x51\xa6\x43\xca\xdc\xe7\x55\xd3\xe7\x16\
              \x80\xda\x35\x01\x14\x6a\x0f\x93\x53\xa5"
        );
        let again = PublicKey::decode(key.to_info_bytes()).unwrap();
        assert_eq!(key, &again);
    }

    #[test]
    fn decode_ecdsa_key() {
        let cert = Cert::decode(
            include_bytes!("../../test-data/ecdsa-p256.cer").as_ref()
        ).unwrap();
        let key = cert.subject_public_key_info();
        assert_eq!(key.algorithm(), PublicKeyFormat::EcdsaP256);
        // Uncompressed point.
        assert_eq!(key.bits().len(), 65);
        assert_eq!(key.bits()[0], 4);
    }

    #[test]
    fn decode_unsupported_key() {
        // SPKI with an Ed25519 key.
        let key = PublicKey::decode(
            b"\x30\x2a\x30\x05\x06\x03\x2b\x65\x70\x03\x21\x00\
              \x19\xbf\x44\x09\x69\x84\xcd\xfe\x85\x41\xba\xc1\
              \x67\xdc\x3b\x96\xc8\x50\x86\xaa\x30\xb6\xb6\xcb\
              \x0c\x5c\x38\xad\x70\x31\x66\xe1".as_ref()
        ).unwrap();
        assert_eq!(key.algorithm(), PublicKeyFormat::Unsupported);
        assert!(!key.algorithm().is_supported());
    }

    #[test]
    fn key_identifier_display() {
        let id = KeyIdentifier::from_bytes(Bytes::from_static(b"\x0a\xff"));
        assert_eq!(format!("{}", id), "0aff");
        assert_eq!(format!("{:#}", id), "0a:ff");
        assert_eq!(format!("{:?}", id), "KeyIdentifier(0aff)");
    }
}
