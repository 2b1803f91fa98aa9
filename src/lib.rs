//! Signing and verifying CMS signed data.
//!
//! The _Cryptographic Message Syntax_ (CMS) defined in [RFC 5652] is the
//! format underneath S/MIME and used by tools like gpgsm for detached
//! signatures over arbitrary data. This crate implements its signed-data
//! content type: creating signatures with one or more signers, verifying
//! them, and building a chain from each signer’s certificate to a set of
//! trusted roots.
//!
//! The entry point for most uses is the [`message`] module. Its functions
//! [`sign()`], [`sign_detached`], [`verify()`], and [`verify_detached`]
//! cover the common cases while [`SignedMessage`] gives access to
//! everything else.
//!
//! Keys for signing are provided through the [`Signer`] trait, so they can
//! live anywhere. With the `softkeys` feature, an OpenSSL-backed signer for
//! keys in memory is available.
//!
//! [RFC 5652]: https://tools.ietf.org/html/rfc5652
//! [`Signer`]: crypto::Signer

pub use self::cert::{Cert, CertPool};
pub use self::identity::Identity;
pub use self::message::{
    SignedMessage, sign, sign_detached, verify, verify_detached
};
pub use self::sign::IncludeCerts;
pub use self::verify::{TrustRoots, VerifyOptions};

pub mod ber;
pub mod cert;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod message;
pub mod oid;
pub mod protocol;
pub mod sign;
pub mod verify;
pub mod x509;

mod util;
