//! ASCII85Decode (Base85) implementation.
//!
//! Four bytes map to five characters in the range '!' to 'u', big-endian
//! base 85. 'z' stands for four zero bytes and `~>` ends the data.

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;

/// ASCII85Decode filter.
pub struct Ascii85Filter;

impl StreamFilter for Ascii85Filter {
    fn name(&self) -> &'static str {
        "ASCII85Decode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut count = 0;

        for &byte in input {
            match byte {
                b'~' => break,
                b'z' => {
                    if count != 0 {
                        return Err(Error::Decode(
                            "ASCII85Decode: 'z' inside a group".to_string(),
                        ));
                    }
                    output.extend_from_slice(&[0, 0, 0, 0]);
                },
                b'!'..=b'u' => {
                    group[count] = byte - b'!';
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        count = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() || byte == 0 => {},
                _ => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character '{}'",
                        byte as char
                    )));
                },
            }
        }

        if count == 1 {
            return Err(Error::Decode(
                "ASCII85Decode: final group has a single character".to_string(),
            ));
        }
        if count > 1 {
            // Pad with 'u' so the truncated value rounds up to the original bytes.
            for slot in group.iter_mut().skip(count) {
                *slot = 84;
            }
            let bytes = group_value(&group)?.to_be_bytes();
            output.extend_from_slice(&bytes[..count - 1]);
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 5 / 4 + 4);

        let mut chunks = input.chunks_exact(4);
        for chunk in &mut chunks {
            let value = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if value == 0 {
                output.push(b'z');
            } else {
                output.extend_from_slice(&encode_group(value));
            }
        }

        let rest = chunks.remainder();
        if !rest.is_empty() {
            let mut padded = [0u8; 4];
            padded[..rest.len()].copy_from_slice(rest);
            let encoded = encode_group(u32::from_be_bytes(padded));
            output.extend_from_slice(&encoded[..rest.len() + 1]);
        }

        output.extend_from_slice(b"~>");
        Ok(output)
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group.iter().fold(0u64, |acc, &d| acc * 85 + d as u64);
    u32::try_from(value)
        .map_err(|_| Error::Decode("ASCII85Decode: group value exceeds 32 bits".to_string()))
}

fn encode_group(mut value: u32) -> [u8; 5] {
    let mut out = [0u8; 5];
    for slot in out.iter_mut().rev() {
        *slot = (value % 85) as u8 + b'!';
        value /= 85;
    }
    out
}
