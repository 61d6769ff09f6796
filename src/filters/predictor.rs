//! Predictor post-processing for Flate and LZW streams.
//!
//! `/Predictor` 2 is TIFF horizontal differencing; 10-15 are PNG filters,
//! where every row carries its own filter-type byte regardless of which
//! PNG value the dictionary names.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// `/DecodeParms` entries relevant to prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read predictor settings from a `/DecodeParms` dictionary.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str| dict.get(key).and_then(|o| o.as_integer());
        let positive = |key: &str, default: usize| {
            int(key)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(default)
        };

        Self {
            predictor: int("Predictor").unwrap_or(1),
            columns: positive("Columns", 1),
            colors: positive("Colors", 1),
            bits_per_component: positive("BitsPerComponent", 8),
        }
    }

    /// Bytes of sample data per row, excluding any PNG tag byte.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component / 8).max(1)
    }
}

/// Undo prediction on decoded stream data.
pub fn apply_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::NotImplemented(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }

    let row_len = params.row_bytes();
    let colors = params.colors;
    let mut output = data.to_vec();

    for row in output.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }

    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.bytes_per_pixel();

    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];
    let mut row = vec![0u8; row_len];

    for encoded in data.chunks(row_len + 1) {
        let tag = encoded[0];
        let samples = &encoded[1..];
        // A short final row is decoded as far as it goes.
        let width = samples.len();
        row[..width].copy_from_slice(samples);
        row[width..].fill(0);

        match tag {
            0 => {},
            1 => {
                for i in bpp..width {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            },
            2 => {
                for i in 0..width {
                    row[i] = row[i].wrapping_add(prev_row[i]);
                }
            },
            3 => {
                for i in 0..width {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let avg = ((left + prev_row[i] as u16) / 2) as u8;
                    row[i] = row[i].wrapping_add(avg);
                }
            },
            4 => {
                for i in 0..width {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, prev_row[i], upper_left));
                }
            },
            other => {
                return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)));
            },
        }

        output.extend_from_slice(&row[..width]);
        std::mem::swap(&mut row, &mut prev_row);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
