//! Signing identities.
//!
//! An identity combines a signer with the certificate for its key and the
//! chain of certificates leading up to a trust anchor. Where identities
//! come from is up to the application: a key store, a hardware token, or
//! files on disk as with [`SoftIdentity`].

use crate::cert::Cert;
use crate::crypto::Signer;


//------------ Identity ------------------------------------------------------

/// A certificate with the means to sign with its key.
pub trait Identity {
    /// The signer used by the identity.
    type Signer: Signer;

    /// Returns the certificate of the identity.
    fn certificate(&self) -> &Cert;

    /// Returns the certificate chain.
    ///
    /// The chain starts with the identity’s own certificate followed by
    /// its issuers in order.
    fn certificate_chain(&self) -> Vec<Cert>;

    /// Returns the signer for the identity’s key.
    fn signer(&self) -> &Self::Signer;
}


//------------ SoftIdentity --------------------------------------------------

#[cfg(any(test, feature = "softkeys"))]
pub use self::soft::SoftIdentity;

#[cfg(any(test, feature = "softkeys"))]
mod soft {
    use std::io;
    use bytes::Bytes;
    use crate::cert::Cert;
    use crate::crypto::Signer;
    use crate::crypto::softsigner::OpenSslSigner;
    use super::Identity;

    /// An identity with its key in memory.
    pub struct SoftIdentity {
        chain: Vec<Cert>,
        signer: OpenSslSigner,
    }

    impl SoftIdentity {
        /// Creates an identity from a signer and a certificate chain.
        ///
        /// The first certificate of the chain has to be the one for the
        /// signer’s key.
        pub fn new(
            signer: OpenSslSigner, chain: Vec<Cert>
        ) -> Result<Self, io::Error> {
            match chain.first() {
                Some(cert)
                    if *cert.subject_public_key_info()
                        == signer.public_key() => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "certificate doesn't match private key"
                    ))
                }
            }
            Ok(SoftIdentity { chain, signer })
        }

        /// Creates an identity from a PEM encoded key and DER certificates.
        pub fn from_pem_key(
            key: &[u8], chain: &[&[u8]]
        ) -> Result<Self, io::Error> {
            let signer = OpenSslSigner::from_pem(key)?;
            let chain = chain.iter().map(|der| {
                Cert::decode(Bytes::copy_from_slice(der)).map_err(|err| {
                    io::Error::new(
                        io::ErrorKind::InvalidData, err.to_string()
                    )
                })
            }).collect::<Result<_, _>>()?;
            Self::new(signer, chain)
        }
    }

    impl Identity for SoftIdentity {
        type Signer = OpenSslSigner;

        fn certificate(&self) -> &Cert {
            // Checked to exist in new.
            &self.chain[0]
        }

        fn certificate_chain(&self) -> Vec<Cert> {
            self.chain.clone()
        }

        fn signer(&self) -> &OpenSslSigner {
            &self.signer
        }
    }
}


//============ Tests =========================================================
