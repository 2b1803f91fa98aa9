//! Digest algorithm and operations.

use std::{fmt, io};
use ring::digest;
use bcder::{decode, encode};
use bcder::{ConstOid, Oid};
use bcder::encode::PrimitiveContent;
use crate::oid;

// Re-export the things from ring for actual digest generation.
pub use ring::digest::Digest;


//------------ DigestAlgorithm -----------------------------------------------

/// The digest algorithms we can use for signing and verifying.
///
/// CMS allows any digest algorithm but we are limited to those that ring
/// implements. Identifiers for other algorithms, most notably MD5, are
/// recognized when parsing but translate into `None` so callers have to
/// treat them as unsupported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DigestAlgorithm {
    /// SHA-1.
    ///
    /// Only acceptable because lots of existing signatures still use it.
    Sha1,

    /// SHA-256.
    Sha256,

    /// SHA-384.
    Sha384,

    /// SHA-512.
    Sha512,
}


/// # Creating Digest Values
///
impl DigestAlgorithm {
    /// Returns the digest of `data` using this algorithm.
    pub fn digest(self, data: &[u8]) -> Digest {
        digest::digest(self.ring_algorithm(), data)
    }

    /// Returns a digest context for multi-step calculation of the digest.
    pub fn start(self) -> Context {
        Context(digest::Context::new(self.ring_algorithm()))
    }

    /// Returns the length of a digest value in octets.
    pub fn digest_len(self) -> usize {
        self.ring_algorithm().output_len()
    }

    fn ring_algorithm(self) -> &'static digest::Algorithm {
        match self {
            DigestAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            DigestAlgorithm::Sha256 => &digest::SHA256,
            DigestAlgorithm::Sha384 => &digest::SHA384,
            DigestAlgorithm::Sha512 => &digest::SHA512,
        }
    }
}


/// # ASN.1 Values
///
/// Digest algorithms appear in CMS either alone or in sets with the following
/// syntax:
///
/// ```txt
/// DigestAlgorithmIdentifiers ::= SET OF DigestAlgorithmIdentifier
/// DigestAlgorithmIdentifier  ::= AlgorithmIdentifier
/// AlgorithmIdentifier        ::= SEQUENCE {
///      algorithm                 OBJECT IDENTIFIER,
///      parameters                ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// Because the SignedData type has to preserve identifiers for algorithms
/// we don’t know, parsing of the identifiers themselves happens in
/// [`AlgorithmIdentifier`][crate::protocol::AlgorithmIdentifier]. This
/// section only provides the mapping between the object identifiers and
/// the algorithm. When encoding, the _parameters_ field is left out as
/// recommended by [RFC 5754].
///
/// [RFC 5754]: https://tools.ietf.org/html/rfc5754
impl DigestAlgorithm {
    /// Returns the algorithm for an object identifier if we support it.
    pub fn from_oid<T: AsRef<[u8]>>(oid: &Oid<T>) -> Option<Self> {
        if *oid == oid::SHA1 {
            Some(DigestAlgorithm::Sha1)
        }
        else if *oid == oid::SHA256 {
            Some(DigestAlgorithm::Sha256)
        }
        else if *oid == oid::SHA384 {
            Some(DigestAlgorithm::Sha384)
        }
        else if *oid == oid::SHA512 {
            Some(DigestAlgorithm::Sha512)
        }
        else {
            None
        }
    }

    /// Returns the object identifier of the algorithm.
    pub fn oid(self) -> &'static ConstOid {
        match self {
            DigestAlgorithm::Sha1 => &oid::SHA1,
            DigestAlgorithm::Sha256 => &oid::SHA256,
            DigestAlgorithm::Sha384 => &oid::SHA384,
            DigestAlgorithm::Sha512 => &oid::SHA512,
        }
    }

    /// Takes and returns a single digest algorithm identifier.
    ///
    /// Returns a content error if the algorithm isn’t one of the supported
    /// algorithms.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, decode::DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let oid = Oid::take_from(cons)?;
            let res = match Self::from_oid(&oid) {
                Some(res) => res,
                None => {
                    return Err(cons.content_err(
                        "unsupported digest algorithm"
                    ))
                }
            };
            cons.take_opt_null()?;
            Ok(res)
        })
    }

    /// Provides an encoder for a single algorithm identifier.
    pub fn encode(self) -> impl encode::Values {
        encode::sequence(self.oid().encode_ref())
    }
}


//--- Display

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        })
    }
}


//------------ Context -------------------------------------------------------

#[derive(Clone)]
pub struct Context(digest::Context);

impl Context {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    pub fn finish(self) -> Digest {
        self.0.finish()
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use bcder::Mode;
    use bcder::encode::Values;

    #[test]
    fn oid_mapping() {
        for alg in [
            DigestAlgorithm::Sha1, DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384, DigestAlgorithm::Sha512
        ] {
            assert_eq!(DigestAlgorithm::from_oid(alg.oid()), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_oid(&oid::MD5), None);
    }

    #[test]
    fn digest_len() {
        assert_eq!(DigestAlgorithm::Sha1.digest_len(), 20);
        assert_eq!(DigestAlgorithm::Sha256.digest_len(), 32);
        assert_eq!(DigestAlgorithm::Sha384.digest_len(), 48);
        assert_eq!(DigestAlgorithm::Sha512.digest_len(), 64);
        assert_eq!(
            DigestAlgorithm::Sha384.digest(b"foo").as_ref().len(), 48
        );
    }

    #[test]
    fn context_matches_one_shot() {
        let mut ctx = DigestAlgorithm::Sha256.start();
        ctx.write_all(b"hello, ").unwrap();
        ctx.update(b"world!");
        assert_eq!(
            ctx.finish().as_ref(),
            DigestAlgorithm::Sha256.digest(b"hello, world!").as_ref()
        );
    }

    #[test]
    fn decode_and_encode() {
        // With NULL parameters.
        let alg = Mode::Der.decode(
            b"\x30\x0d\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x01\x05\x00"
                .as_ref(),
            DigestAlgorithm::take_from
        ).unwrap();
        assert_eq!(alg, DigestAlgorithm::Sha256);
        assert_eq!(
            alg.encode().to_captured(Mode::Der).as_slice(),
            b"\x30\x0b\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x01"
        );

        // MD5 isn’t supported.
        assert!(Mode::Der.decode(
            b"\x30\x0a\x06\x08\x2a\x86\x48\x86\xf7\x0d\x02\x05".as_ref(),
            DigestAlgorithm::take_from
        ).is_err());
    }
}
