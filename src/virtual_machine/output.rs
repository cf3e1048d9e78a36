//! Interpretation of the bytes returned by a program.
//!
//! The VM only hands back raw bytes. Integers are read big-endian; slices
//! shorter than a word are widened on the left, with zeros for unsigned and
//! with the sign bit for signed values.

use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

const WORD_SIZE: usize = 8;

/// How to render a returned byte slice.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Decoding {
    /// Big-endian `u64`.
    #[default]
    Unsigned,
    /// Big-endian two's complement `i64`.
    Signed,
    /// `0x`-prefixed lowercase hex of every byte.
    Hex,
    /// UTF-8 text.
    Text,
}

impl Decoding {
    /// Renders `bytes` according to this decoding.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, VMError> {
        match self {
            Decoding::Unsigned => Ok(u64::from_be_bytes(widen(bytes, 0x00)?).to_string()),
            Decoding::Signed => {
                let fill = match bytes.first() {
                    Some(b) if b & 0x80 != 0 => 0xFF,
                    _ => 0x00,
                };
                Ok(i64::from_be_bytes(widen(bytes, fill)?).to_string())
            }
            Decoding::Hex => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("0x");
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
                Ok(out)
            }
            Decoding::Text => String::from_utf8(bytes.to_vec()).map_err(|e| VMError::DecodeError {
                reason: format!("returned bytes are not valid UTF-8: {e}"),
            }),
        }
    }
}

/// Left-pads `bytes` to a full word with `fill`.
fn widen(bytes: &[u8], fill: u8) -> Result<[u8; WORD_SIZE], VMError> {
    if bytes.len() > WORD_SIZE {
        return Err(VMError::DecodeError {
            reason: format!(
                "{} bytes do not fit in a {WORD_SIZE}-byte integer",
                bytes.len()
            ),
        });
    }
    let mut word = [fill; WORD_SIZE];
    word[WORD_SIZE - bytes.len()..].copy_from_slice(bytes);
    Ok(word)
}

impl FromStr for Decoding {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u64" | "unsigned" => Ok(Decoding::Unsigned),
            "i64" | "signed" => Ok(Decoding::Signed),
            "hex" => Ok(Decoding::Hex),
            "text" => Ok(Decoding::Text),
            other => Err(VMError::DecodeError {
                reason: format!("unknown decoding '{other}' (expected u64, i64, hex or text)"),
            }),
        }
    }
}

impl fmt::Display for Decoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decoding::Unsigned => "u64",
            Decoding::Signed => "i64",
            Decoding::Hex => "hex",
            Decoding::Text => "text",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_full_word() {
        let bytes = 0x0102_0304_0506_0708u64.to_be_bytes();
        assert_eq!(
            Decoding::Unsigned.decode(&bytes).unwrap(),
            0x0102_0304_0506_0708u64.to_string()
        );
    }

    #[test]
    fn unsigned_zero_pads_short_slices() {
        assert_eq!(Decoding::Unsigned.decode(&[0x01, 0x00]).unwrap(), "256");
        assert_eq!(Decoding::Unsigned.decode(&[0xFF]).unwrap(), "255");
        assert_eq!(Decoding::Unsigned.decode(&[]).unwrap(), "0");
    }

    #[test]
    fn signed_sign_extends() {
        assert_eq!(Decoding::Signed.decode(&[0xFF]).unwrap(), "-1");
        assert_eq!(Decoding::Signed.decode(&[0xFF, 0xFE]).unwrap(), "-2");
        assert_eq!(Decoding::Signed.decode(&[0x7F]).unwrap(), "127");
        assert_eq!(
            Decoding::Signed.decode(&(u64::MAX - 1).to_be_bytes()).unwrap(),
            "-2"
        );
        assert_eq!(Decoding::Signed.decode(&[]).unwrap(), "0");
    }

    #[test]
    fn integers_reject_long_slices() {
        for decoding in [Decoding::Unsigned, Decoding::Signed] {
            assert!(matches!(
                decoding.decode(&[0; 9]),
                Err(VMError::DecodeError { .. })
            ));
        }
    }

    #[test]
    fn hex_and_text() {
        assert_eq!(Decoding::Hex.decode(&[0xDE, 0xAD, 0x01]).unwrap(), "0xdead01");
        assert_eq!(Decoding::Hex.decode(&[]).unwrap(), "0x");
        assert_eq!(Decoding::Text.decode(b"hi").unwrap(), "hi");
        assert!(Decoding::Text.decode(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn parse_names() {
        for decoding in [
            Decoding::Unsigned,
            Decoding::Signed,
            Decoding::Hex,
            Decoding::Text,
        ] {
            assert_eq!(decoding.to_string().parse::<Decoding>().unwrap(), decoding);
        }
        assert_eq!("signed".parse::<Decoding>().unwrap(), Decoding::Signed);
        assert!("f64".parse::<Decoding>().is_err());
    }
}
