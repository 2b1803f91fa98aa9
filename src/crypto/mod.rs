//! Signing related implementations.
//!

pub use self::digest::{Digest, DigestAlgorithm};
pub use self::keys::{
    KeyIdentifier, PublicKey, PublicKeyFormat, SignatureVerificationError
};
pub use self::signer::{Signer, SigningError};
pub use self::signature::{Signature, SignatureAlgorithm};

pub mod digest;
pub mod keys;
pub mod signer;
pub mod signature;
#[cfg(any(test, feature = "softkeys"))] pub mod softsigner;
