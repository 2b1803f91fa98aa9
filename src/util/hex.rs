//! Formatting octet sequences as hex strings.

use std::fmt;


//------------ Hex -----------------------------------------------------------

/// Displays the wrapped octets as a lower case hex string.
///
/// If the alternate flag is given, octets are separated by colons the way
/// OpenSSL prints key identifiers.
#[derive(Clone, Copy, Debug)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, ch) in self.0.iter().enumerate() {
            if f.alternate() && idx > 0 {
                f.write_str(":")?;
            }
            let digits = encode_u8(*ch);
            write!(f, "{}{}", digits[0] as char, digits[1] as char)?;
        }
        Ok(())
    }
}


//------------ Functions -----------------------------------------------------

/// Returns the two hex digits for an octet.
pub fn encode_u8(ch: u8) -> [u8; 2] {
    [DIGITS[usize::from(ch >> 4)], DIGITS[usize::from(ch & 0x0F)]]
}

const DIGITS: &[u8] = b"0123456789abcdef";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(format!("{}", Hex(b"\x01\xab\xff")), "01abff");
        assert_eq!(format!("{:#}", Hex(b"\x01\xab\xff")), "01:ab:ff");
        assert_eq!(format!("{}", Hex(b"")), "");
    }
}
