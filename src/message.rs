//! Signed messages.
//!
//! This module provides the high-level interface for creating and
//! checking signatures. A [`SignedMessage`] wraps [`SignedData`] and
//! knows how to read and write the armored and binary forms. For the most
//! common cases, the functions [`sign`], [`sign_detached`], [`verify`],
//! and [`verify_detached`] do everything in one go.

use bytes::Bytes;
use crate::cert::Cert;
use crate::crypto::{Signer, SigningError};
use crate::error::{ParseError, VerificationError, VerifyError, WrongType};
use crate::identity::Identity;
use crate::protocol::SignedData;
use crate::sign::IncludeCerts;
use crate::util::base64::Pem;
use crate::verify::{TrustRoots, VerifyOptions};


//------------ Constants -----------------------------------------------------

/// The label of the PEM armor around a signed message.
pub const PEM_LABEL: &str = "SIGNED MESSAGE";


//------------ SignedMessage -------------------------------------------------

/// A signed message or a detached signature.
#[derive(Clone, Debug)]
pub struct SignedMessage {
    signed_data: SignedData,
}

impl SignedMessage {
    /// Creates a new message with the given content and no signers.
    pub fn new(data: impl Into<Bytes>) -> Self {
        SignedMessage { signed_data: SignedData::new(data.into()) }
    }

    /// Parses a message.
    ///
    /// The input can be PEM armored or binary. Binary input may be BER
    /// encoded.
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        let signed_data = if Pem.is_armored(input) {
            SignedData::parse(&Pem.decode(PEM_LABEL, input)?)?
        }
        else {
            SignedData::parse(input)?
        };
        Ok(SignedMessage { signed_data })
    }

    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    pub fn signed_data_mut(&mut self) -> &mut SignedData {
        &mut self.signed_data
    }

    pub fn into_signed_data(self) -> SignedData {
        self.signed_data
    }
}


/// # Content
///
impl SignedMessage {
    /// Returns the content or `None` for a detached signature.
    pub fn get_data(&self) -> Result<Option<Bytes>, WrongType> {
        self.signed_data.get_data()
    }

    /// Removes the content.
    ///
    /// No signers can be added afterwards.
    pub fn detach(&mut self) {
        self.signed_data.detach()
    }

    pub fn is_detached(&self) -> bool {
        self.signed_data.is_detached()
    }
}


/// # Signing
///
impl SignedMessage {
    /// Adds a signer.
    ///
    /// See [`SignedData::add_signer_info`] for details.
    pub fn sign<S: Signer>(
        &mut self, chain: &[Cert], signer: &S
    ) -> Result<(), SigningError<S::Error>> {
        self.signed_data.add_signer_info(chain, signer)
    }

    /// Adds a signature by an identity.
    ///
    /// Afterwards, the certificates of the message are replaced by those
    /// of the identity’s chain selected by `include`. Certificates of
    /// other signers are dropped, so this is meant for messages with a
    /// single signer.
    pub fn sign_identity<I: Identity>(
        &mut self, identity: &I, include: IncludeCerts,
    ) -> Result<(), SigningError<<I::Signer as Signer>::Error>> {
        self.signed_data.add_signer_info(
            std::slice::from_ref(identity.certificate()),
            identity.signer()
        )?;
        let chain = identity.certificate_chain();
        self.set_certificates(include.certs_for_signature(&chain));
        Ok(())
    }
}


/// # Certificates
///
impl SignedMessage {
    /// Replaces the included certificates.
    ///
    /// Passing an empty slice removes all certificates.
    pub fn set_certificates(&mut self, certs: &[Cert]) {
        self.signed_data.set_certificates(certs)
    }

    /// Returns the included certificates.
    pub fn get_certificates(&self) -> Result<Vec<Cert>, VerificationError> {
        self.signed_data.x509_certificates()
    }
}


/// # Verification
///
impl SignedMessage {
    /// Verifies a message with included content.
    pub fn verify(
        &self, roots: &TrustRoots
    ) -> Result<Vec<Cert>, VerifyError> {
        self.signed_data.verify(roots)
    }

    pub fn verify_with(
        &self, roots: &TrustRoots, options: &VerifyOptions
    ) -> Result<Vec<Cert>, VerifyError> {
        self.signed_data.verify_with(roots, options)
    }

    /// Verifies a detached signature over `message`.
    pub fn verify_detached(
        &self, message: &[u8], roots: &TrustRoots
    ) -> Result<Vec<Cert>, VerifyError> {
        self.signed_data.verify_detached(message, roots)
    }

    pub fn verify_detached_with(
        &self, message: &[u8], roots: &TrustRoots, options: &VerifyOptions
    ) -> Result<Vec<Cert>, VerifyError> {
        self.signed_data.verify_detached_with(message, roots, options)
    }
}


/// # Encoding
///
impl SignedMessage {
    /// Returns the DER encoded message.
    pub fn to_der(&self) -> Bytes {
        self.signed_data.to_der()
    }

    /// Returns the PEM armored message.
    pub fn to_pem(&self) -> String {
        Pem.encode(PEM_LABEL, &self.to_der())
    }
}

impl From<SignedData> for SignedMessage {
    fn from(signed_data: SignedData) -> Self {
        SignedMessage { signed_data }
    }
}


//------------ Functions -----------------------------------------------------

/// Signs `data` and returns the DER encoded message.
pub fn sign<S: Signer>(
    data: &[u8], chain: &[Cert], signer: &S
) -> Result<Bytes, SigningError<S::Error>> {
    let mut msg = SignedMessage::new(Bytes::copy_from_slice(data));
    msg.sign(chain, signer)?;
    Ok(msg.to_der())
}

/// Creates a detached signature over `data` and returns it DER encoded.
pub fn sign_detached<S: Signer>(
    data: &[u8], chain: &[Cert], signer: &S
) -> Result<Bytes, SigningError<S::Error>> {
    let mut msg = SignedMessage::new(Bytes::copy_from_slice(data));
    msg.sign(chain, signer)?;
    msg.detach();
    Ok(msg.to_der())
}

/// Parses and verifies a message with included content.
///
/// Returns the certificates of the signers.
pub fn verify(
    input: &[u8], roots: &TrustRoots
) -> Result<Vec<Cert>, VerifyError> {
    parse_for_verify(input)?.verify(roots)
}

/// Parses and verifies a detached signature over `message`.
pub fn verify_detached(
    input: &[u8], message: &[u8], roots: &TrustRoots
) -> Result<Vec<Cert>, VerifyError> {
    parse_for_verify(input)?.verify_detached(message, roots)
}

fn parse_for_verify(input: &[u8]) -> Result<SignedMessage, VerifyError> {
    SignedMessage::parse(input).map_err(|err| {
        VerifyError::new(err.into(), Vec::new())
    })
}


//============ Tests =========================================================
