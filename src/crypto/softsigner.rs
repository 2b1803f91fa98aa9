//! A signer atop the OpenSSL library.
//!
//! Because this adds a dependency to openssl libs this is disabled by
//! default and should only be used by applications that keep their keys
//! in files. In particular, this is not required when verifying.

use std::io;
use bytes::Bytes;
use openssl::ecdsa::EcdsaSig;
use openssl::md::Md;
use openssl::pkey::{Id, PKey, Private};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use super::digest::DigestAlgorithm;
use super::keys::PublicKey;
use super::signer::Signer;


//------------ OpenSslSigner -------------------------------------------------

/// An OpenSSL based signer.
///
/// Keeps its single key in memory.
pub struct OpenSslSigner {
    key: KeyPair,
    public_key: PublicKey,
}

impl OpenSslSigner {
    /// Creates a signer from a DER encoded private key.
    pub fn from_der(der: &[u8]) -> Result<Self, io::Error> {
        Self::new(KeyPair::from_der(der)?)
    }

    /// Creates a signer from a PEM encoded private key.
    ///
    /// Both PKCS #8 and the traditional RSA and EC formats are accepted.
    pub fn from_pem(pem: &[u8]) -> Result<Self, io::Error> {
        Self::new(KeyPair::from_pem(pem)?)
    }

    fn new(key: KeyPair) -> Result<Self, io::Error> {
        let public_key = key.get_key_info()?;
        Ok(OpenSslSigner { key, public_key })
    }
}

impl Signer for OpenSslSigner {
    type Error = io::Error;

    fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    fn sign(
        &self,
        algorithm: DigestAlgorithm,
        digest: &[u8]
    ) -> Result<Bytes, Self::Error> {
        self.key.sign(algorithm, digest)
    }
}


//------------ KeyPair -------------------------------------------------------

/// A key pair kept by the signer.
struct KeyPair(PKey<Private>);

impl KeyPair {
    fn from_der(der: &[u8]) -> Result<Self, io::Error> {
        Self::check(PKey::private_key_from_der(der)?)
    }

    fn from_pem(pem: &[u8]) -> Result<Self, io::Error> {
        Self::check(PKey::private_key_from_pem(pem)?)
    }

    fn check(key: PKey<Private>) -> Result<Self, io::Error> {
        match key.id() {
            Id::RSA | Id::EC => Ok(KeyPair(key)),
            _ => {
                Err(io::Error::new(
                    io::ErrorKind::Other, "unsupported key type"
                ))
            }
        }
    }

    fn get_key_info(&self) -> Result<PublicKey, io::Error> {
        let der = self.0.public_key_to_der()?;
        PublicKey::decode(Bytes::from(der)).map_err(|err| {
            io::Error::new(io::ErrorKind::InvalidData, err.to_string())
        })
    }

    fn sign(
        &self,
        algorithm: DigestAlgorithm,
        digest: &[u8]
    ) -> Result<Bytes, io::Error> {
        if digest.len() != algorithm.digest_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "digest length doesn’t match algorithm"
            ))
        }
        if self.0.id() == Id::EC {
            let key = self.0.ec_key()?;
            let sig = EcdsaSig::sign(digest, &key)?;
            return Ok(sig.to_der()?.into())
        }
        let md = match algorithm {
            DigestAlgorithm::Sha1 => Md::sha1(),
            DigestAlgorithm::Sha256 => Md::sha256(),
            DigestAlgorithm::Sha384 => Md::sha384(),
            DigestAlgorithm::Sha512 => Md::sha512(),
        };
        let mut ctx = PkeyCtx::new(&self.0)?;
        ctx.sign_init()?;
        ctx.set_rsa_padding(Padding::PKCS1)?;
        ctx.set_signature_md(md)?;
        let mut res = Vec::new();
        ctx.sign_to_vec(digest, &mut res)?;
        Ok(res.into())
    }
}


//============ Tests =========================================================
