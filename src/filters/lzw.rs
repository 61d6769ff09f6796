//! LZWDecode implementation.
//!
//! PDF's LZW variant:
//! - MSB-first bit ordering
//! - Codes start at 9 bits and grow to 12
//! - Clear code is 256, EOD code is 257, first free code is 258
//! - `/EarlyChange` (default 1) widens the code one entry early
//!
//! Streams decode through `weezl`; the table decoder below takes over when
//! weezl rejects the data, which recovers output from truncated or damaged
//! streams. Encoding is not supported.

use super::predictor::{apply_predictor, DecodeParams};
use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use weezl::{decode::Decoder as WeezlDecoder, BitOrder};

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MIN_CODE_BITS: u8 = 9;
const MAX_CODE_BITS: u8 = 12;
const TABLE_SIZE: usize = 1 << MAX_CODE_BITS;

/// LZWDecode filter.
#[derive(Debug, Clone)]
pub struct LzwFilter {
    max_output: usize,
}

impl Default for LzwFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LzwFilter {
    /// Decoder with the default output limit.
    pub fn new() -> Self {
        Self {
            max_output: super::MAX_DECOMPRESSED_SIZE,
        }
    }

    /// Cap the decoded size.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }
}

impl StreamFilter for LzwFilter {
    fn name(&self) -> &'static str {
        "LZWDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let early_change = params
            .and_then(|p| p.get("EarlyChange"))
            .and_then(|o| o.as_integer())
            .map(|v| if v == 0 { 0 } else { 1 })
            .unwrap_or(1);

        let decoded = match decode_lzw_weezl(input, early_change) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("{}, retrying with the table decoder", e);
                decode_lzw(input, early_change, self.max_output)?
            },
        };
        if decoded.len() > self.max_output {
            return Err(Error::Decode(format!(
                "LZWDecode: output exceeds limit of {} bytes",
                self.max_output
            )));
        }

        match params.map(DecodeParams::from_dict) {
            Some(predictor) if predictor.predictor > 1 => apply_predictor(&decoded, &predictor),
            _ => Ok(decoded),
        }
    }

    fn encode(&self, _input: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotImplemented("LZWDecode encoding".to_string()))
    }
}

/// `/EarlyChange 1` is the TIFF code-size switch, one code before the table fills.
fn decode_lzw_weezl(input: &[u8], early_change: u16) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 1 {
        WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        WeezlDecoder::new(BitOrder::Msb, 8)
    };
    decoder
        .decode(input)
        .map_err(|e| Error::Decode(format!("LZWDecode: weezl failed: {:?}", e)))
}

/// String table. Entry `i` is stored as (prefix code, last byte, length) so
/// that adding an entry is O(1); strings are materialized on output.
struct Table {
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    length: Vec<u16>,
}

impl Table {
    fn new() -> Self {
        let mut table = Self {
            prefix: Vec::with_capacity(TABLE_SIZE),
            suffix: Vec::with_capacity(TABLE_SIZE),
            length: Vec::with_capacity(TABLE_SIZE),
        };
        table.reset();
        table
    }

    fn reset(&mut self) {
        self.prefix.clear();
        self.suffix.clear();
        self.length.clear();
        for i in 0..=255u16 {
            self.prefix.push(u16::MAX);
            self.suffix.push(i as u8);
            self.length.push(1);
        }
        // Clear and EOD occupy 256 and 257 but never expand.
        for _ in 0..2 {
            self.prefix.push(u16::MAX);
            self.suffix.push(0);
            self.length.push(0);
        }
    }

    fn len(&self) -> usize {
        self.suffix.len()
    }

    fn push(&mut self, prefix: u16, byte: u8) {
        let len = self.length[prefix as usize].saturating_add(1);
        self.prefix.push(prefix);
        self.suffix.push(byte);
        self.length.push(len);
    }

    /// Append the string for `code` to `out`, returning its first byte.
    fn emit(&self, code: u16, out: &mut Vec<u8>) -> u8 {
        let len = self.length[code as usize] as usize;
        let start = out.len();
        out.resize(start + len, 0);

        let mut c = code;
        for slot in out[start..].iter_mut().rev() {
            *slot = self.suffix[c as usize];
            c = self.prefix[c as usize];
        }
        out[start]
    }
}

fn decode_lzw(input: &[u8], early_change: u16, max_output: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() * 2);
    let mut table = Table::new();
    let mut code_bits = MIN_CODE_BITS;
    let mut reader = BitReader::new(input);
    let mut prev_code: Option<u16> = None;

    while let Some(code) = reader.read_bits(code_bits) {
        if code == EOD_CODE {
            break;
        }

        if code == CLEAR_CODE {
            table.reset();
            code_bits = MIN_CODE_BITS;
            prev_code = None;
            continue;
        }

        let next_code = table.len() as u16;
        let first_byte = if code < next_code {
            table.emit(code, &mut output)
        } else if code == next_code {
            // KwKwK case: the new entry is prev + first byte of prev.
            let prev = prev_code.ok_or_else(|| {
                Error::Decode(format!("LZWDecode: code {} before any entry", code))
            })?;
            let first = table.emit(prev, &mut output);
            output.push(first);
            first
        } else {
            return Err(Error::Decode(format!(
                "LZWDecode: invalid code {} (next_code={}, code_bits={})",
                code, next_code, code_bits
            )));
        };

        if let Some(prev) = prev_code {
            if table.len() < TABLE_SIZE {
                table.push(prev, first_byte);
            }
        }

        let next = table.len() as u16 + early_change;
        if prev_code.is_some() && code_bits < MAX_CODE_BITS && next >= (1 << code_bits) {
            code_bits += 1;
        }

        prev_code = Some(code);

        if output.len() > max_output {
            return Err(Error::Decode(format!(
                "LZWDecode: output exceeds limit of {} bytes",
                max_output
            )));
        }
    }

    Ok(output)
}

/// Bit reader for MSB-first bit ordering.
struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read_bits(&mut self, n: u8) -> Option<u16> {
        let n = n as usize;
        if self.bit_pos + n > self.data.len() * 8 {
            return None;
        }

        let mut result = 0u16;
        for _ in 0..n {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            result = (result << 1) | bit as u16;
            self.bit_pos += 1;
        }
        Some(result)
    }
}
