//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate. Decoding falls back to raw deflate when the zlib
//! wrapper is damaged, and keeps whatever was inflated before corruption.

use super::predictor::{apply_predictor, DecodeParams};
use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compression preset used when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlateMode {
    /// Favor speed
    Fastest,
    /// zlib's default trade-off
    #[default]
    Default,
    /// Favor size
    Best,
}

impl FlateMode {
    fn compression(self) -> Compression {
        match self {
            FlateMode::Fastest => Compression::fast(),
            FlateMode::Default => Compression::default(),
            FlateMode::Best => Compression::best(),
        }
    }
}

/// FlateDecode filter.
#[derive(Debug, Clone)]
pub struct FlateFilter {
    mode: FlateMode,
    max_output: usize,
}

impl Default for FlateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl FlateFilter {
    /// Filter with the default compression level and output limit.
    pub fn new() -> Self {
        Self {
            mode: FlateMode::Default,
            max_output: super::MAX_DECOMPRESSED_SIZE,
        }
    }

    /// Select the encode preset.
    pub fn with_mode(mut self, mode: FlateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap the decoded size.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    fn inflate(&self, input: &[u8]) -> Result<Vec<u8>> {
        let limit = self.max_output as u64 + 1;
        let mut output = Vec::new();

        let zlib_result = ZlibDecoder::new(input).take(limit).read_to_end(&mut output);
        match zlib_result {
            Ok(_) => return self.check_limit(output),
            Err(e) if !output.is_empty() => {
                log::warn!(
                    "FlateDecode partial recovery: {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                return self.check_limit(output);
            },
            Err(e) => log::debug!("Zlib decode failed ({}), trying raw deflate", e),
        }

        // Some writers omit or damage the 2-byte zlib header.
        let mut candidates = vec![input];
        if input.len() > 2 {
            candidates.push(&input[2..]);
        }
        for candidate in candidates {
            output.clear();
            match DeflateDecoder::new(candidate).take(limit).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => return self.check_limit(output),
                Err(_) if !output.is_empty() => {
                    log::warn!("Raw deflate partial recovery: {} bytes", output.len());
                    return self.check_limit(output);
                },
                _ => {},
            }
        }

        Err(Error::Decode("FlateDecode: data is not a valid zlib or deflate stream".to_string()))
    }

    fn check_limit(&self, output: Vec<u8>) -> Result<Vec<u8>> {
        if output.len() > self.max_output {
            return Err(Error::Decode(format!(
                "FlateDecode: output exceeds limit of {} bytes",
                self.max_output
            )));
        }
        Ok(output)
    }
}

impl StreamFilter for FlateFilter {
    fn name(&self) -> &'static str {
        "FlateDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let decoded = self.inflate(input)?;

        match params.map(DecodeParams::from_dict) {
            Some(predictor) if predictor.predictor > 1 => apply_predictor(&decoded, &predictor),
            _ => Ok(decoded),
        }
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.mode.compression());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }
}
