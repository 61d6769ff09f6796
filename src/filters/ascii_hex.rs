//! ASCIIHexDecode implementation.
//!
//! Decodes hexadecimal-encoded data (e.g., "48656C6C6F" -> "Hello").
//! Whitespace is ignored, `>` ends the data, and an odd trailing digit is
//! padded with an implicit '0'.

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::lexer::hex_value;
use crate::object::Dictionary;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// ASCIIHexDecode filter.
pub struct AsciiHexFilter;

impl StreamFilter for AsciiHexFilter {
    fn name(&self) -> &'static str {
        "ASCIIHexDecode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if c.is_ascii_whitespace() || c == 0 {
                continue;
            }
            let nibble = hex_value(c).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid hex digit '{}'", c as char))
            })?;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 2 + 1);
        for &b in input {
            output.push(HEX_DIGITS[(b >> 4) as usize]);
            output.push(HEX_DIGITS[(b & 0x0F) as usize]);
        }
        output.push(b'>');
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let output = AsciiHexFilter.decode(b"48656C6C6F", None).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_with_whitespace_and_terminator() {
        let output = AsciiHexFilter.decode(b"48 65\n6c 6C\t6f>garbage", None).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_odd_length() {
        let output = AsciiHexFilter.decode(b"486", None).unwrap();
        assert_eq!(output, vec![0x48, 0x60]);
    }

    #[test]
    fn test_decode_invalid_digit() {
        let err = AsciiHexFilter.decode(b"4G", None).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_encode() {
        assert_eq!(AsciiHexFilter.encode(b"\x00\xffAB").unwrap(), b"00FF4142>");
        assert_eq!(AsciiHexFilter.encode(b"").unwrap(), b">");
    }

    #[test]
    fn test_empty_roundtrip() {
        let encoded = AsciiHexFilter.encode(b"").unwrap();
        assert!(AsciiHexFilter.decode(&encoded, None).unwrap().is_empty());
    }
}
