//! The data types of CMS signed data.
//!
//! This module contains the types defined in [RFC 5652] that are needed
//! for the signed-data content type. Everything that isn’t interpreted
//! is kept in its encoded form, so that parsed values encode back into
//! the octets they were parsed from.
//!
//! [RFC 5652]: https://tools.ietf.org/html/rfc5652

pub use self::alg::AlgorithmIdentifier;
pub use self::anyset::AnySet;
pub use self::attr::{Attribute, Attributes};
pub use self::content::{ContentInfo, EncapsulatedContentInfo};
pub use self::signed::SignedData;
pub use self::signer::{IssuerAndSerialNumber, SignerIdentifier, SignerInfo};

pub mod alg;
pub mod anyset;
pub mod attr;
pub mod content;
pub mod signed;
pub mod signer;
