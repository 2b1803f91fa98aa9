//! Error types.
//!
//! The errors mirror the stages of processing: parsing of encoded data,
//! interpretation of parsed values, and verification.

use std::{error, fmt};
use std::convert::Infallible;
use bcder::decode::{ContentError, DecodeError};
use crate::ber::BerError;
use crate::cert::Cert;
use crate::crypto::keys::SignatureVerificationError;
use crate::util::base64::PemError;


//------------ ParseError ----------------------------------------------------

/// Encoded data could not be parsed.
#[derive(Debug)]
pub struct ParseError {
    kind: ParseErrorKind,
}

#[derive(Debug)]
enum ParseErrorKind {
    Ber(BerError),
    Decode(DecodeError<Infallible>),
    Pem(PemError),
    WrongType,
}

impl From<BerError> for ParseError {
    fn from(err: BerError) -> Self {
        ParseError { kind: ParseErrorKind::Ber(err) }
    }
}

impl From<DecodeError<Infallible>> for ParseError {
    fn from(err: DecodeError<Infallible>) -> Self {
        ParseError { kind: ParseErrorKind::Decode(err) }
    }
}

impl From<PemError> for ParseError {
    fn from(err: PemError) -> Self {
        ParseError { kind: ParseErrorKind::Pem(err) }
    }
}

impl From<WrongType> for ParseError {
    fn from(_: WrongType) -> Self {
        ParseError { kind: ParseErrorKind::WrongType }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ParseErrorKind::Ber(ref inner) => fmt::Display::fmt(inner, f),
            ParseErrorKind::Decode(ref inner) => fmt::Display::fmt(inner, f),
            ParseErrorKind::Pem(ref inner) => fmt::Display::fmt(inner, f),
            ParseErrorKind::WrongType => fmt::Display::fmt(&WrongType, f),
        }
    }
}

impl error::Error for ParseError { }


//------------ WrongType -----------------------------------------------------

/// A CHOICE or ANY value was accessed as the wrong type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WrongType;

impl From<WrongType> for ContentError {
    fn from(_: WrongType) -> Self {
        ContentError::from_static("wrong choice or any type")
    }
}

impl fmt::Display for WrongType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("wrong choice or any type")
    }
}

impl error::Error for WrongType { }


//------------ AttributeError ------------------------------------------------

/// Accessing a single-valued attribute failed.
#[derive(Debug)]
pub enum AttributeError {
    /// The attribute didn’t appear exactly once.
    AttributeCount(usize),

    /// The attribute didn’t have exactly one value.
    ValueCount(usize),

    /// The value was not of the expected type.
    Value(DecodeError<Infallible>),
}

impl From<DecodeError<Infallible>> for AttributeError {
    fn from(err: DecodeError<Infallible>) -> Self {
        AttributeError::Value(err)
    }
}

impl From<AttributeError> for ContentError {
    fn from(err: AttributeError) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AttributeError::AttributeCount(count) => {
                write!(f, "expected 1 attribute found {}", count)
            }
            AttributeError::ValueCount(count) => {
                write!(f, "expected 1 attribute value found {}", count)
            }
            AttributeError::Value(ref err) => fmt::Display::fmt(err, f)
        }
    }
}

impl error::Error for AttributeError { }


//------------ VerificationError ---------------------------------------------

/// Verification of signed data or a certificate failed.
#[derive(Debug)]
pub struct VerificationError {
    inner: ContentError,
}

impl VerificationError {
    pub fn new(err: impl Into<ContentError>) -> Self {
        VerificationError { inner: err.into() }
    }
}

impl From<ContentError> for VerificationError {
    fn from(err: ContentError) -> VerificationError {
        VerificationError { inner: err }
    }
}

impl From<DecodeError<Infallible>> for VerificationError {
    fn from(err: DecodeError<Infallible>) -> Self {
        VerificationError::new(ContentError::from_boxed(Box::new(
            DisplayError(err.to_string())
        )))
    }
}

impl From<ParseError> for VerificationError {
    fn from(err: ParseError) -> Self {
        VerificationError::new(ContentError::from_boxed(Box::new(
            DisplayError(err.to_string())
        )))
    }
}

impl From<WrongType> for VerificationError {
    fn from(err: WrongType) -> Self {
        ContentError::from(err).into()
    }
}

impl From<AttributeError> for VerificationError {
    fn from(err: AttributeError) -> Self {
        ContentError::from(err).into()
    }
}

impl From<SignatureVerificationError> for VerificationError {
    fn from(err: SignatureVerificationError) -> Self {
        ContentError::from(err).into()
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl error::Error for VerificationError { }


//------------ VerifyError ---------------------------------------------------

/// Verification of a signed message failed.
///
/// Alongside the actual error, the certificates of those signers that
/// could be identified before verification failed are provided. They can
/// be used for reporting who claimed to have signed a message.
#[derive(Debug)]
pub struct VerifyError {
    error: VerificationError,
    leaves: Vec<Cert>,
}

impl VerifyError {
    pub fn new(error: VerificationError, leaves: Vec<Cert>) -> Self {
        VerifyError { error, leaves }
    }

    /// Returns the underlying verification error.
    pub fn error(&self) -> &VerificationError {
        &self.error
    }

    /// Returns the signer certificates identified before failing.
    pub fn leaves(&self) -> &[Cert] {
        &self.leaves
    }

    pub fn into_leaves(self) -> Vec<Cert> {
        self.leaves
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}


//------------ DisplayError --------------------------------------------------

/// An error that is only a message.
#[derive(Clone, Debug)]
struct DisplayError(String);

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//============ Tests =========================================================
