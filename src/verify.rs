//! Verifying signatures.
//!
//! Verification happens in two steps. First, the signature of each signer
//! is checked against the content and the signer’s certificate. Then a
//! chain from that certificate to one of a set of trusted roots is built
//! using the certificates included in the signed data as intermediates.
//!
//! The second step can be skipped by using
//! [`TrustRoots::UnsafeNoVerify`]. This is only sensible if the caller
//! checks the returned signer certificates by some other means.

use std::borrow::Cow;
use log::{debug, trace};
use crate::cert::{Cert, CertPool, ExtKeyUsage, UnexpectedCriticalExtension};
use crate::crypto::Signature;
use crate::error::{VerificationError, VerifyError};
use crate::protocol::{SignedData, SignerInfo};
use crate::x509::Time;


//------------ Constants -----------------------------------------------------

/// The maximum number of certificates in a chain.
const MAX_CHAIN_LEN: usize = 16;

/// The maximum number of signature checks while building a chain.
const MAX_SIGNATURE_CHECKS: usize = 100;


//------------ TrustRoots ----------------------------------------------------

/// The certificates signers have to chain up to.
#[derive(Clone, Debug)]
pub enum TrustRoots {
    /// Signer certificates need to chain up to one of these.
    Pool(CertPool),

    /// Don’t verify signer certificates at all.
    ///
    /// Signatures and message digests are still checked. Validity,
    /// extended key usage, and the chain of the signer certificates are
    /// not.
    UnsafeNoVerify,
}

impl From<CertPool> for TrustRoots {
    fn from(pool: CertPool) -> Self {
        TrustRoots::Pool(pool)
    }
}


//------------ VerifyOptions -------------------------------------------------

/// Options for verifying certificate chains.
#[derive(Clone, Debug)]
pub struct VerifyOptions {
    /// The time to check validity at or `None` for the current time.
    time: Option<Time>,

    /// The acceptable extended key usages.
    key_usages: Vec<ExtKeyUsage>,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks validity at the given time instead of the current time.
    pub fn with_time(mut self, time: Time) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the extended key usages a chain needs to allow.
    ///
    /// A chain is accepted if all its certificates allow at least one of
    /// the usages. Certificates without the extension allow everything.
    /// Including [`ExtKeyUsage::Any`] skips the check. An empty list
    /// restores the default of email protection and code signing.
    pub fn with_key_usages(mut self, usages: Vec<ExtKeyUsage>) -> Self {
        self.key_usages = if usages.is_empty() {
            Self::default().key_usages
        }
        else {
            usages
        };
        self
    }

    /// Returns the time validity is checked at.
    pub fn time(&self) -> Time {
        self.time.unwrap_or_else(Time::now)
    }

    pub fn key_usages(&self) -> &[ExtKeyUsage] {
        &self.key_usages
    }

    /// Returns whether the chain allows one of the key usages.
    fn check_key_usages(&self, chain: &[&Cert]) -> bool {
        if self.key_usages.contains(&ExtKeyUsage::Any) {
            return true
        }
        let mut remaining = self.key_usages.clone();
        for cert in chain {
            if let Some(eku) = cert.extended_key_usage() {
                remaining.retain(|usage| eku.permits(*usage));
            }
        }
        !remaining.is_empty()
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            time: None,
            key_usages: vec![
                ExtKeyUsage::EmailProtection, ExtKeyUsage::CodeSigning
            ],
        }
    }
}


//------------ SignedData ----------------------------------------------------

/// # Verification
///
/// All methods return the certificates of the signers if verification
/// succeeds. If it fails, the certificates of those signers that could be
/// identified are available through the error.
impl SignedData {
    /// Verifies signed data with included content.
    pub fn verify(
        &self, roots: &TrustRoots
    ) -> Result<Vec<Cert>, VerifyError> {
        self.verify_with(roots, &VerifyOptions::default())
    }

    /// Verifies signed data with included content using options.
    pub fn verify_with(
        &self, roots: &TrustRoots, options: &VerifyOptions,
    ) -> Result<Vec<Cert>, VerifyError> {
        let data = match self.get_data() {
            Ok(Some(data)) => data,
            Ok(None) => {
                return Err(no_leaves(
                    VerificationError::new("detached signature")
                ))
            }
            Err(err) => return Err(no_leaves(err.into()))
        };
        self.verify_message(&data, roots, options)
    }

    /// Verifies a detached signature over `message`.
    pub fn verify_detached(
        &self, message: &[u8], roots: &TrustRoots,
    ) -> Result<Vec<Cert>, VerifyError> {
        self.verify_detached_with(message, roots, &VerifyOptions::default())
    }

    /// Verifies a detached signature over `message` using options.
    pub fn verify_detached_with(
        &self,
        message: &[u8],
        roots: &TrustRoots,
        options: &VerifyOptions,
    ) -> Result<Vec<Cert>, VerifyError> {
        if !self.is_detached() {
            return Err(no_leaves(
                VerificationError::new("signature not detached")
            ))
        }
        self.verify_message(message, roots, options)
    }

    fn verify_message(
        &self,
        message: &[u8],
        roots: &TrustRoots,
        options: &VerifyOptions,
    ) -> Result<Vec<Cert>, VerifyError> {
        if self.signer_infos().is_empty() {
            return Err(no_leaves(
                VerificationError::new("no signatures found")
            ))
        }
        let certs = self.x509_certificates().map_err(no_leaves)?;

        // Best effort so we can return them even if verification fails.
        let leaves: Vec<_> = self.signer_infos().iter().filter_map(|info| {
            info.find_certificate(&certs).ok().cloned()
        }).collect();

        let intermediates: CertPool = certs.iter().cloned().collect();
        for info in self.signer_infos() {
            if let Err(err) = self.verify_signer_info(
                info, message, &certs, &intermediates, roots, options
            ) {
                return Err(VerifyError::new(err, leaves))
            }
        }
        Ok(leaves)
    }

    fn verify_signer_info(
        &self,
        info: &SignerInfo,
        message: &[u8],
        certs: &[Cert],
        intermediates: &CertPool,
        roots: &TrustRoots,
        options: &VerifyOptions,
    ) -> Result<(), VerificationError> {
        let signed_message = match info.signed_attrs() {
            None => {
                // Without signed attributes, the content must be data.
                self.get_data()?;
                Cow::Borrowed(message)
            }
            Some(attrs) => {
                let content_type = info.content_type()?;
                if content_type != *self.encap_content_info().content_type() {
                    return Err(VerificationError::new(
                        "invalid SignerInfo ContentType attribute"
                    ))
                }
                let digest_alg = info.hash().ok_or_else(|| {
                    VerificationError::new("unknown digest algorithm")
                })?;
                let message_digest = info.message_digest()?;
                if message_digest.as_ref()
                    != digest_alg.digest(message).as_ref()
                {
                    return Err(VerificationError::new(
                        "invalid message digest"
                    ))
                }
                Cow::Owned(attrs.marshaled_for_signing().to_vec())
            }
        };

        let cert = info.find_certificate(certs)?;
        let algorithm = info.x509_signature_algorithm();
        if algorithm.is_unknown() {
            return Err(VerificationError::new(
                "unsupported signature or digest algorithm"
            ))
        }
        cert.subject_public_key_info().verify(
            &signed_message,
            &Signature::new(algorithm, info.signature().clone())
        )?;

        if let TrustRoots::Pool(ref roots) = *roots {
            verify_chain(cert, roots, intermediates, options)?;
        }
        Ok(())
    }
}

fn no_leaves(err: VerificationError) -> VerifyError {
    VerifyError::new(err, Vec::new())
}


//------------ verify_chain --------------------------------------------------

/// Verifies a certificate by building a chain to a trusted root.
///
/// Returns the chain starting with `cert` and ending in a certificate
/// from `roots`.
pub fn verify_chain(
    cert: &Cert,
    roots: &CertPool,
    intermediates: &CertPool,
    options: &VerifyOptions,
) -> Result<Vec<Cert>, VerificationError> {
    let now = options.time();
    cert.verify_validity(now)?;
    check_critical_extensions(cert)?;

    let mut builder = ChainBuilder {
        roots, intermediates, options, now,
        signature_checks: 0,
        key_usage_failed: false,
    };
    let mut chain = vec![cert];
    if builder.extend(&mut chain) {
        return Ok(chain.into_iter().cloned().collect())
    }
    if builder.key_usage_failed {
        Err(VerificationError::new(
            "certificate specifies an incompatible key usage"
        ))
    }
    else {
        Err(VerificationError::new(
            "certificate signed by unknown authority"
        ))
    }
}

fn check_critical_extensions(cert: &Cert) -> Result<(), VerificationError> {
    match cert.unhandled_critical_extensions().first() {
        Some(oid) => {
            Err(VerificationError::new(
                UnexpectedCriticalExtension::new(oid.clone())
            ))
        }
        None => Ok(())
    }
}


//------------ ChainBuilder --------------------------------------------------

/// A depth-first search for a path to a trusted root.
struct ChainBuilder<'a> {
    roots: &'a CertPool,
    intermediates: &'a CertPool,
    options: &'a VerifyOptions,
    now: Time,

    /// The number of issuer signatures checked so far.
    signature_checks: usize,

    /// Was a chain rejected because of its extended key usage?
    key_usage_failed: bool,
}

impl<'a> ChainBuilder<'a> {
    /// Tries to complete the chain.
    ///
    /// Returns `true` if `chain` now ends in a trusted root.
    fn extend(&mut self, chain: &mut Vec<&'a Cert>) -> bool {
        let cert = match chain.last() {
            Some(cert) => *cert,
            None => return false
        };
        if chain.len() == 1 && self.roots.contains(cert) {
            return self.finish(chain)
        }
        if chain.len() >= MAX_CHAIN_LEN {
            debug!(
                "Giving up on chain for {}: too long.", chain[0].subject()
            );
            return false
        }

        for candidate in self.roots.find_issuers(cert) {
            if self.check_issuer(cert, candidate, chain, true) {
                chain.push(candidate);
                if self.finish(chain) {
                    return true
                }
                chain.pop();
            }
        }
        for candidate in self.intermediates.find_issuers(cert) {
            if chain.contains(&candidate) || self.roots.contains(candidate) {
                continue
            }
            if self.check_issuer(cert, candidate, chain, false) {
                chain.push(candidate);
                if self.extend(chain) {
                    return true
                }
                chain.pop();
            }
        }
        false
    }

    /// Checks the extended key usage of a complete chain.
    fn finish(&mut self, chain: &[&Cert]) -> bool {
        if self.options.check_key_usages(chain) {
            true
        }
        else {
            debug!(
                "Rejecting chain for {}: incompatible key usage.",
                chain[0].subject()
            );
            self.key_usage_failed = true;
            false
        }
    }

    /// Checks whether `candidate` is an acceptable issuer for `cert`.
    fn check_issuer(
        &mut self,
        cert: &Cert,
        candidate: &Cert,
        chain: &[&Cert],
        is_root: bool,
    ) -> bool {
        trace!(
            "Trying {} {} as issuer of {}.",
            if is_root { "root" } else { "intermediate" },
            candidate.subject(), cert.subject()
        );
        match self.verify_issuer(cert, candidate, chain, is_root) {
            Ok(()) => true,
            Err(err) => {
                debug!(
                    "Rejecting {} as issuer of {}: {}",
                    candidate.subject(), cert.subject(), err
                );
                false
            }
        }
    }

    fn verify_issuer(
        &mut self,
        cert: &Cert,
        candidate: &Cert,
        chain: &[&Cert],
        is_root: bool,
    ) -> Result<(), VerificationError> {
        cert.verify_issuer_claim(candidate)?;
        if self.signature_checks >= MAX_SIGNATURE_CHECKS {
            return Err(VerificationError::new(
                "too many signature checks"
            ))
        }
        self.signature_checks += 1;
        cert.verify_signature(candidate)?;
        candidate.verify_validity(self.now)?;
        check_critical_extensions(candidate)?;
        if !is_root {
            if !candidate.is_ca() {
                return Err(VerificationError::new(
                    "certificate is not authorized to sign other \
                     certificates"
                ))
            }
            if let Some(key_usage) = candidate.key_usage() {
                if !key_usage.key_cert_sign() {
                    return Err(VerificationError::new(
                        "key usage doesn't allow certificate signing"
                    ))
                }
            }
        }
        if let Some(path_len) = candidate.path_len_constraint() {
            // The chain so far is the leaf plus the intermediates.
            let intermediates = (chain.len() - 1) as u64;
            if intermediates > path_len {
                return Err(VerificationError::new(
                    "too many intermediates for path length constraint"
                ))
            }
        }
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::Oid;
    use bytes::Bytes;
    use crate::crypto::softsigner::OpenSslSigner;
    use crate::protocol::AlgorithmIdentifier;

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

    fn roots() -> TrustRoots {
        TrustRoots::Pool([root()].into_iter().collect())
    }

    fn options() -> VerifyOptions {
        VerifyOptions::new().with_time(
            Time::utc(2030, 1, 1, 0, 0, 0).unwrap()
        )
    }

    fn signer(key: &'static [u8]) -> OpenSslSigner {
        OpenSslSigner::from_pem(key).unwrap()
    }

    fn signed(chain: &[Cert], key: &'static [u8]) -> SignedData {
        let mut sd = SignedData::new(Bytes::from_static(b"hello, world!"));
        sd.add_signer_info_at(
            chain, &signer(key), Time::utc(2030, 1, 1, 0, 0, 0).unwrap()
        ).unwrap();
        sd
    }

    fn signed_by_leaf() -> SignedData {
        signed(
            &[leaf(), intermediate()],
            include_bytes!("../test-data/chain/leaf.key")
        )
    }

    #[test]
    fn verify_with_chain() {
        let sd = signed_by_leaf();
        assert_eq!(sd.verify_with(&roots(), &options()).unwrap(), [leaf()]);

        let mut detached = sd.clone();
        detached.detach();
        assert_eq!(
            detached.verify_detached_with(
                b"hello, world!", &roots(), &options()
            ).unwrap(),
            [leaf()]
        );
    }

    #[test]
    fn chain_is_returned() {
        let chain = verify_chain(
            &leaf(),
            &[root()].into_iter().collect(),
            &[intermediate()].into_iter().collect(),
            &options()
        ).unwrap();
        assert_eq!(chain, [leaf(), intermediate(), root()]);

        // A trusted certificate is a chain all by itself.
        let chain = verify_chain(
            &leaf(),
            &[leaf()].into_iter().collect(),
            &CertPool::new(),
            &options()
        ).unwrap();
        assert_eq!(chain, [leaf()]);
    }

    #[test]
    fn unknown_authority() {
        let sd = signed_by_leaf();
        let other = TrustRoots::Pool(
            [cert(include_bytes!("../test-data/chain/other-root.cer"))]
                .into_iter().collect()
        );
        let err = sd.verify_with(&other, &options()).unwrap_err();
        assert_eq!(
            err.to_string(), "certificate signed by unknown authority"
        );
        assert_eq!(err.leaves(), [leaf()]);

        // Without the intermediate, there is no chain either.
        let sd = signed(
            &[leaf()], include_bytes!("../test-data/chain/leaf.key")
        );
        assert_eq!(
            sd.verify_with(&roots(), &options()).unwrap_err().to_string(),
            "certificate signed by unknown authority"
        );

        // But skipping verification works.
        assert_eq!(
            sd.verify(&TrustRoots::UnsafeNoVerify).unwrap(), [leaf()]
        );
    }

    #[test]
    fn validity() {
        let sd = signed_by_leaf();
        let err = sd.verify_with(
            &roots(),
            &VerifyOptions::new().with_time(
                Time::utc(2020, 1, 1, 0, 0, 0).unwrap()
            )
        ).unwrap_err();
        assert_eq!(err.to_string(), "certificate is not yet valid");
        assert_eq!(err.leaves(), [leaf()]);

        let err = sd.verify_with(
            &roots(),
            &VerifyOptions::new().with_time(
                Time::utc(2200, 1, 1, 0, 0, 0).unwrap()
            )
        ).unwrap_err();
        assert_eq!(err.to_string(), "certificate has expired");
    }

    #[test]
    fn key_usages() {
        let server = cert(include_bytes!("../test-data/chain/server.cer"));
        let sd = signed(
            &[server.clone(), intermediate()],
            include_bytes!("../test-data/chain/server.key")
        );
        assert_eq!(
            sd.verify_with(&roots(), &options()).unwrap_err().to_string(),
            "certificate specifies an incompatible key usage"
        );
        assert_eq!(
            sd.verify_with(
                &roots(), &options().with_key_usages(vec![ExtKeyUsage::Any])
            ).unwrap(),
            [server.clone()]
        );
        assert_eq!(
            sd.verify_with(
                &roots(),
                &options().with_key_usages(vec![ExtKeyUsage::ServerAuth])
            ).unwrap(),
            [server]
        );

        let code = cert(
            include_bytes!("../test-data/chain/code-signing.cer")
        );
        let sd = signed(
            &[code.clone(), intermediate()],
            include_bytes!("../test-data/chain/code-signing.key")
        );
        assert_eq!(sd.verify_with(&roots(), &options()).unwrap(), [code]);
    }

    #[test]
    fn tampering() {
        let sd = signed_by_leaf();
        let mut detached = sd.clone();
        detached.detach();
        let err = detached.verify_detached_with(
            b"hello, world?", &roots(), &options()
        ).unwrap_err();
        assert_eq!(err.to_string(), "invalid message digest");
        assert_eq!(err.leaves(), [leaf()]);

        // Flip a bit in the signature.
        let mut der = sd.to_der().to_vec();
        let sig = sd.signer_infos()[0].signature().clone();
        let pos = der.windows(sig.len()).position(|window| {
            window == sig.as_ref()
        }).unwrap();
        der[pos + 10] ^= 0x01;
        let tampered = SignedData::parse(&der).unwrap();
        let err = tampered.verify(&TrustRoots::UnsafeNoVerify).unwrap_err();
        assert_eq!(err.leaves(), [leaf()]);
    }

    #[test]
    fn unsupported_signature_algorithm() {
        let mut sd = signed_by_leaf();
        let info = sd.signer_infos()[0].clone();

        // Claim the signature was made with Ed25519.
        sd.signer_infos_mut()[0] = SignerInfo::new(
            &leaf(),
            info.digest_algorithm().clone(),
            info.signed_attrs().cloned(),
            AlgorithmIdentifier::new(
                Oid(Bytes::from_static(&[43, 101, 112])), None
            ),
            info.signature().clone(),
        );
        let err = sd.verify_with(&roots(), &options()).unwrap_err();
        assert_eq!(
            err.to_string(), "unsupported signature or digest algorithm"
        );
        assert_eq!(err.leaves(), [leaf()]);
    }

    #[test]
    fn preconditions() {
        let sd = signed_by_leaf();
        assert_eq!(
            sd.verify_detached(b"hello, world!", &roots())
                .unwrap_err().to_string(),
            "signature not detached"
        );
        let mut detached = sd.clone();
        detached.detach();
        assert_eq!(
            detached.verify(&roots()).unwrap_err().to_string(),
            "detached signature"
        );
        let empty = SignedData::new(Bytes::from_static(b"hello, world!"));
        let err = empty.verify(&roots()).unwrap_err();
        assert_eq!(err.to_string(), "no signatures found");
        assert!(err.leaves().is_empty());
    }

    #[test]
    fn fixtures() {
        let gpgsm = include_bytes!("../test-data/gpgsm-attached.p7s");
        let leaves = SignedData::parse(gpgsm).unwrap()
            .verify(&TrustRoots::UnsafeNoVerify).unwrap();
        assert_eq!(
            leaves[0].subject().common_name().as_deref(), Some("Ben Toews")
        );

        let gpgsm = include_bytes!("../test-data/gpgsm-detached.p7s");
        SignedData::parse(gpgsm).unwrap().verify_detached(
            b"hello, world!\n", &TrustRoots::UnsafeNoVerify
        ).unwrap();

        let openssl = include_bytes!("../test-data/openssl-attached.p7s");
        let sd = SignedData::parse(openssl).unwrap();
        let leaves = sd.verify(&TrustRoots::UnsafeNoVerify).unwrap();
        assert_eq!(
            leaves[0].subject().common_name().as_deref(), Some("cms-test")
        );

        // Self-signed and not trusted.
        assert!(sd.verify(&roots()).is_err());
        // Self-signed and trusted, but without extended key usage.
        let trusted = TrustRoots::Pool(leaves.iter().cloned().collect());
        assert!(sd.verify_with(
            &trusted,
            &VerifyOptions::new().with_time(
                Time::utc(2020, 1, 1, 0, 0, 0).unwrap()
            )
        ).is_ok());

        let openssl = include_bytes!("../test-data/openssl-detached.p7s");
        SignedData::parse(openssl).unwrap().verify_detached(
            b"hello, world!", &TrustRoots::UnsafeNoVerify
        ).unwrap();

        let outlook = include_bytes!("../test-data/outlook-detached.p7s");
        let leaves = SignedData::parse(outlook).unwrap().verify_detached(
            include_bytes!("../test-data/outlook-detached.eml"),
            &TrustRoots::UnsafeNoVerify
        ).unwrap();
        assert_eq!(
            leaves[0].subject().common_name().as_deref(),
            Some("Oren Novotny")
        );
    }

    #[test]
    fn missing_certificates() {
        let nocerts = include_bytes!("../test-data/gpgsm-nocerts.p7s");
        let err = SignedData::parse(nocerts).unwrap().verify_detached(
            b"hello, world!\n", &TrustRoots::UnsafeNoVerify
        ).unwrap_err();
        assert_eq!(err.to_string(), "no certificates");
        assert!(err.leaves().is_empty());
    }
}
