//! Stream filter implementations.
//!
//! Implemented filters:
//! - FlateDecode (zlib/deflate), encode and decode
//! - ASCIIHexDecode, encode and decode
//! - ASCII85Decode, encode and decode
//! - LZWDecode, decode only
//!
//! RunLengthDecode, CCITTFaxDecode, JBIG2Decode, DCTDecode, JPXDecode and Crypt
//! are recognized by name and reported as not implemented.
//!
//! Filters are stateless. A stream's `/Filter` array is applied in array
//! order on decode and in reverse order on encode.

use crate::error::{Error, Result};
use crate::object::Dictionary;

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;

pub use ascii85::Ascii85Filter;
pub use ascii_hex::AsciiHexFilter;
pub use flate::{FlateFilter, FlateMode};
pub use lzw::LzwFilter;
pub use predictor::{apply_predictor, DecodeParams};

/// Default cap on decoded stream size (100 MB).
pub const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// PDF stream filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// ASCIIHexDecode (AHx)
    ASCIIHexDecode,
    /// ASCII85Decode (A85)
    ASCII85Decode,
    /// LZWDecode (LZW)
    LZWDecode,
    /// FlateDecode (Fl)
    FlateDecode,
    /// RunLengthDecode (RL)
    RunLengthDecode,
    /// CCITTFaxDecode (CCF)
    CCITTFaxDecode,
    /// JBIG2Decode
    JBIG2Decode,
    /// DCTDecode (DCT)
    DCTDecode,
    /// JPXDecode
    JPXDecode,
    /// Crypt
    Crypt,
}

impl Filter {
    /// Resolve a full or abbreviated filter name.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            "JBIG2Decode" => Filter::JBIG2Decode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "JPXDecode" => Filter::JPXDecode,
            "Crypt" => Filter::Crypt,
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        })
    }

    /// Full PDF name of the filter.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::LZWDecode => "LZWDecode",
            Filter::FlateDecode => "FlateDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
            Filter::Crypt => "Crypt",
        }
    }

    /// Codec for this filter, or `NotImplemented` for the recognized-only ones.
    pub fn codec(&self, max_output: usize) -> Result<Box<dyn StreamFilter>> {
        match self {
            Filter::ASCIIHexDecode => Ok(Box::new(AsciiHexFilter)),
            Filter::ASCII85Decode => Ok(Box::new(Ascii85Filter)),
            Filter::LZWDecode => Ok(Box::new(LzwFilter::new().with_max_output(max_output))),
            Filter::FlateDecode => Ok(Box::new(FlateFilter::new().with_max_output(max_output))),
            other => Err(Error::NotImplemented(format!("{} filter", other.name()))),
        }
    }
}

/// A stream filter.
pub trait StreamFilter {
    /// Full PDF name (e.g., "FlateDecode").
    fn name(&self) -> &'static str;

    /// Decode `input`, honoring `/DecodeParms` where the filter has any.
    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>>;

    /// Encode `input`.
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Decode with one named filter.
pub fn decode(name: &str, data: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
    Filter::from_name(name)?
        .codec(MAX_DECOMPRESSED_SIZE)?
        .decode(data, params)
}

/// Encode with one named filter.
pub fn encode(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    Filter::from_name(name)?.codec(MAX_DECOMPRESSED_SIZE)?.encode(data)
}

/// Decode through a filter chain in array order.
///
/// `params` is aligned with `filters`; missing entries mean no parameters.
pub fn decode_with_filters(
    data: &[u8],
    filters: &[String],
    params: &[Option<Dictionary>],
    max_output: usize,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for (i, name) in filters.iter().enumerate() {
        let codec = Filter::from_name(name)?.codec(max_output)?;
        let filter_params = params.get(i).and_then(|p| p.as_ref());
        current = codec.decode(&current, filter_params)?;
        log::debug!("{} produced {} bytes", codec.name(), current.len());

        if current.len() > max_output {
            return Err(Error::Decode(format!(
                "{} output exceeds limit of {} bytes",
                codec.name(),
                max_output
            )));
        }
    }

    Ok(current)
}

/// Encode through a filter chain. The last filter listed is applied first,
/// so that [`decode_with_filters`] with the same list restores the input.
pub fn encode_with_filters(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for name in filters.iter().rev() {
        current = Filter::from_name(name)?
            .codec(MAX_DECOMPRESSED_SIZE)?
            .encode(&current)?;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_abbreviated_names() {
        assert_eq!(Filter::from_name("AHx").unwrap(), Filter::ASCIIHexDecode);
        assert_eq!(Filter::from_name("A85").unwrap(), Filter::ASCII85Decode);
        assert_eq!(Filter::from_name("LZW").unwrap(), Filter::LZWDecode);
        assert_eq!(Filter::from_name("Fl").unwrap(), Filter::FlateDecode);
        assert_eq!(Filter::from_name("FlateDecode").unwrap(), Filter::FlateDecode);
    }

    #[test]
    fn test_unknown_filter() {
        let err = decode("BogusDecode", b"", None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFilter(ref n) if n == "BogusDecode"));
    }

    #[test]
    fn test_named_but_unimplemented_filters() {
        for name in [
            "RunLengthDecode",
            "CCITTFaxDecode",
            "JBIG2Decode",
            "DCTDecode",
            "JPXDecode",
            "Crypt",
        ] {
            let err = decode(name, b"data", None).unwrap_err();
            assert!(matches!(err, Error::NotImplemented(_)), "{} gave {:?}", name, err);
        }
    }

    #[test]
    fn test_lzw_encode_not_implemented() {
        assert!(matches!(encode("LZWDecode", b"abc"), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_chain_order() {
        let filters = vec!["ASCIIHexDecode".to_string(), "FlateDecode".to_string()];
        let encoded = encode_with_filters(b"chained payload", &filters).unwrap();
        assert!(encoded.iter().all(|b| b.is_ascii_hexdigit() || *b == b'>'));

        let decoded =
            decode_with_filters(&encoded, &filters, &[None, None], MAX_DECOMPRESSED_SIZE).unwrap();
        assert_eq!(decoded, b"chained payload");
    }

    #[test]
    fn test_chain_output_limit() {
        let encoded = encode("FlateDecode", &vec![0u8; 10_000]).unwrap();
        let err =
            decode_with_filters(&encoded, &["FlateDecode".to_string()], &[], 1000).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
