//! A generic interface to a signer.

use std::{error, fmt};
use bytes::Bytes;
use super::digest::DigestAlgorithm;
use super::keys::PublicKey;


//------------ Signer --------------------------------------------------------

/// A type that allow creating signatures.
///
/// A signer holds exactly one private key. It never sees the data to be
/// signed, only its digest, so it can be backed by anything from a key in
/// memory to a smart card.
pub trait Signer {
    /// An operational error happened in the signer.
    type Error: fmt::Debug + fmt::Display;

    /// Returns the public key of the signer’s key pair.
    fn public_key(&self) -> PublicKey;

    /// Signs a digest.
    ///
    /// The digest has been created using `algorithm`. For RSA keys, the
    /// returned value is the PKCS #1 v1.5 signature over the digest info
    /// for the digest. For ECDSA keys, it is the DER encoded
    /// _ECDSA-Sig-Value._
    fn sign(
        &self,
        algorithm: DigestAlgorithm,
        digest: &[u8]
    ) -> Result<Bytes, Self::Error>;
}

impl<T: Signer + ?Sized> Signer for &T {
    type Error = T::Error;

    fn public_key(&self) -> PublicKey {
        (**self).public_key()
    }

    fn sign(
        &self,
        algorithm: DigestAlgorithm,
        digest: &[u8]
    ) -> Result<Bytes, Self::Error> {
        (**self).sign(algorithm, digest)
    }
}


//------------ SigningError --------------------------------------------------

/// An error happened while adding a signature to signed data.
#[derive(Clone, Debug)]
pub enum SigningError<S> {
    /// None of the certificates in the chain belongs to the signer.
    NoMatchingCertificate,

    /// A certificate of the chain was already present.
    DuplicateCertificate,

    /// The signer certificate uses a digest algorithm we don’t support.
    UnsupportedDigest,

    /// The signer’s key can’t be used for signing.
    UnsupportedSignature,

    /// The signed data doesn’t contain the content to sign.
    Detached,

    /// The signed data encapsulates something other than data.
    WrongContentType,

    /// An error happened during signing.
    Signer(S)
}

impl<S> From<S> for SigningError<S> {
    fn from(err: S) -> Self {
        SigningError::Signer(err)
    }
}

impl<S: fmt::Display> fmt::Display for SigningError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::SigningError::*;

        match *self {
            NoMatchingCertificate => {
                f.write_str("no certificate matching signer's public key")
            }
            DuplicateCertificate => f.write_str("certificate already added"),
            UnsupportedDigest => f.write_str("unsupported digest algorithm"),
            UnsupportedSignature => {
                f.write_str("unsupported signature algorithm")
            }
            Detached => f.write_str("already detached"),
            WrongContentType => f.write_str("wrong choice or any type"),
            Signer(ref s) => s.fmt(f)
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for SigningError<S> { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signer_errors_are_verbatim() {
        let err = SigningError::from("the token went away");
        assert_eq!(format!("{}", err), "the token went away");
        assert_eq!(
            format!("{}", SigningError::<&str>::NoMatchingCertificate),
            "no certificate matching signer's public key"
        );
    }
}
