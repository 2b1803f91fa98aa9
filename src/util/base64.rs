//! Handling of Base 64-encoded data.
//!
//! The only place Base 64 appears in CMS handling is the PEM armor around
//! a DER encoded message. This module provides that flavour.

use std::{error, fmt, str};
use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, STANDARD};

pub use base64::DecodeError;


//------------ Pem -----------------------------------------------------------

/// The flavour used by PEM armor as defined in RFC 7468.
///
/// This uses the standard alphabet with padding. Encoding wraps lines at
/// 64 characters, decoding ignores all white space and any encapsulated
/// header lines before the data.
pub struct Pem;

impl Pem {
    const ENGINE: GeneralPurpose = STANDARD;

    /// The length of an encoded line.
    const LINE_LEN: usize = 64;

    /// Encodes `data` wrapped into boundaries with the given label.
    pub fn encode(self, label: &str, data: &[u8]) -> String {
        let encoded = Self::ENGINE.encode(data);
        let mut res = String::with_capacity(
            encoded.len() + encoded.len() / Self::LINE_LEN + 2 * label.len()
            + 32
        );
        res.push_str("-----BEGIN ");
        res.push_str(label);
        res.push_str("-----\n");
        // The encoded string is ASCII only, so splitting at any index is
        // fine.
        let mut rest = encoded.as_str();
        while !rest.is_empty() {
            let (line, tail) = rest.split_at(rest.len().min(Self::LINE_LEN));
            res.push_str(line);
            res.push('\n');
            rest = tail;
        }
        res.push_str("-----END ");
        res.push_str(label);
        res.push_str("-----\n");
        res
    }

    /// Decodes the first block with the given label found in `input`.
    pub fn decode(
        self, label: &str, input: &[u8]
    ) -> Result<Vec<u8>, PemError> {
        let input = str::from_utf8(input).map_err(|_| PemError::Missing)?;
        let begin = format!("-----BEGIN {label}-----");
        let end = format!("-----END {label}-----");
        let mut lines = input.lines().map(str::trim);
        if !lines.any(|line| line == begin) {
            return Err(PemError::Missing)
        }
        let mut data = String::new();
        let mut complete = false;
        for line in lines {
            if line == end {
                complete = true;
                break
            }
            if line.contains(':') {
                // Encapsulated header, e.g., “Proc-Type: 4,ENCRYPTED”.
                continue
            }
            data.extend(line.chars().filter(|ch| !ch.is_whitespace()));
        }
        if !complete {
            return Err(PemError::Missing)
        }
        Self::ENGINE.decode(data).map_err(PemError::Base64)
    }

    /// Returns whether `input` looks like it contains PEM armor.
    pub fn is_armored(self, input: &[u8]) -> bool {
        match input.iter().position(|ch| !ch.is_ascii_whitespace()) {
            Some(start) => input[start..].starts_with(b"-----BEGIN "),
            None => false
        }
    }
}


//------------ PemError ------------------------------------------------------

/// Decoding PEM armored data failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PemError {
    /// No complete block with the expected label was found.
    Missing,

    /// The content wasn’t correctly encoded.
    Base64(DecodeError),
}

impl fmt::Display for PemError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PemError::Missing => f.write_str("no PEM block found"),
            PemError::Base64(ref err) => {
                write!(f, "invalid PEM content: {err}")
            }
        }
    }
}

impl error::Error for PemError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_wraps_lines() {
        let data = [0xa5u8; 100];
        let pem = Pem.encode("SIGNED MESSAGE", &data);
        let mut lines = pem.lines();
        assert_eq!(lines.next(), Some("-----BEGIN SIGNED MESSAGE-----"));
        assert_eq!(lines.next().map(str::len), Some(64));
        assert_eq!(lines.next().map(str::len), Some(64));
        assert_eq!(lines.next().map(str::len), Some(8));
        assert_eq!(lines.next(), Some("-----END SIGNED MESSAGE-----"));
        assert_eq!(lines.next(), None);
        assert_eq!(
            Pem.decode("SIGNED MESSAGE", pem.as_bytes()).unwrap(),
            data
        );
    }

    #[test]
    fn decode_is_lenient() {
        let pem = b"garbage\r\n\
            -----BEGIN SIGNED MESSAGE-----\r\n\
            Comment: foo\r\n\
            aGVs\r\n  bG8=\r\n\
            -----END SIGNED MESSAGE-----\r\n";
        assert_eq!(Pem.decode("SIGNED MESSAGE", pem).unwrap(), b"hello");
        assert!(Pem.is_armored(b"\n-----BEGIN X-----"));
        assert!(!Pem.is_armored(b"\x30\x80"));
    }

    #[test]
    fn decode_errors() {
        assert_eq!(
            Pem.decode("SIGNED MESSAGE", b"-----BEGIN CERTIFICATE-----\n"),
            Err(PemError::Missing)
        );
        assert_eq!(
            Pem.decode(
                "SIGNED MESSAGE",
                b"-----BEGIN SIGNED MESSAGE-----\naGVs\n"
            ),
            Err(PemError::Missing)
        );
        assert!(matches!(
            Pem.decode(
                "X", b"-----BEGIN X-----\n!!!!\n-----END X-----\n"
            ),
            Err(PemError::Base64(_))
        ));
    }
}
