//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) pack several objects into one compressed
//! stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode >>
//! stream
//! 10 0 11 3
//! 42 (hello)
//! endstream
//! endobj
//! ```
//!
//! The header holds `/N` pairs of (object number, offset relative to
//! `/First`). Any decryption of the container must happen before parsing;
//! the objects inside are never encrypted on their own.

use crate::error::{Error, Result};
use crate::lexer::{scan_next_token, Token};
use crate::object::Object;
use crate::parser::parse_object_with;
use crate::parser_config::ParserOptions;

/// Upper bound on `/N`.
const MAX_OBJECTS: i64 = 1_000_000;

/// Objects unpacked from one object stream, in header order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: Vec<(u32, Option<Object>)>,
}

impl ObjectStream {
    /// Object at position `index` in the header, if it parsed.
    ///
    /// Returns `None` when the slot exists but belongs to a different
    /// object number.
    pub fn get_indexed(&self, index: usize, object_number: u32) -> Option<&Object> {
        match self.objects.get(index) {
            Some((num, obj)) if *num == object_number => obj.as_ref(),
            _ => None,
        }
    }

    /// Object by number, wherever it sits in the header.
    pub fn get(&self, object_number: u32) -> Option<&Object> {
        self.objects
            .iter()
            .find(|(num, _)| *num == object_number)
            .and_then(|(_, obj)| obj.as_ref())
    }

    /// Take ownership of the parsed objects, skipping slots that failed to parse.
    pub fn into_objects(self) -> impl Iterator<Item = (u32, Object)> {
        self.objects
            .into_iter()
            .filter_map(|(num, obj)| obj.map(|o| (num, o)))
    }

    /// Number of header slots.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the stream declared no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Decode an object stream and parse every object it holds.
///
/// Objects whose body fails to parse are logged and left empty so that the
/// rest of the stream is still usable.
pub fn parse_object_stream(stream_obj: &Object, opts: &ParserOptions) -> Result<ObjectStream> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if let Some(type_name) = stream_obj.dict_type() {
        if type_name != "ObjStm" {
            return Err(Error::Structural(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .filter(|n| (0..=MAX_OBJECTS).contains(n))
        .ok_or_else(|| Error::Structural("object stream has no valid /N".to_string()))?
        as usize;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .and_then(|f| usize::try_from(f).ok())
        .ok_or_else(|| Error::Structural("object stream has no valid /First".to_string()))?;

    let decoded = stream_obj.decode_stream_data_with_limit(opts.max_decompressed_size)?;
    if decoded.len() < first {
        return Err(Error::Structural(format!(
            "object stream data is {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_header(&decoded[..first], n)?;
    let body = &decoded[first..];

    let objects = pairs
        .into_iter()
        .map(|(num, offset)| {
            let parsed = body
                .get(offset..)
                .ok_or_else(|| {
                    Error::Structural(format!("offset {} beyond stream body", offset))
                })
                .and_then(|input| {
                    parse_object_with(input, opts)
                        .map(|(_, obj)| obj)
                        .map_err(|e| Error::ParseError {
                            offset: first + offset,
                            reason: format!("{:?}", e),
                        })
                });

            match parsed {
                Ok(obj) => (num, Some(obj)),
                Err(e) => {
                    log::warn!("Skipping object {} in object stream: {}", num, e);
                    (num, None)
                },
            }
        })
        .collect();

    Ok(ObjectStream { objects })
}

/// Read `count` (object number, offset) pairs.
fn parse_header(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut cursor = 0;

    let next_uint = |cursor: &mut usize| -> Result<u64> {
        let (tok, next) = scan_next_token(data, *cursor)?;
        match tok {
            Token::Integer(v) if v >= 0 => {
                *cursor = next;
                Ok(v as u64)
            },
            other => Err(Error::ParseError {
                offset: *cursor,
                reason: format!("expected object stream header integer, got {:?}", other),
            }),
        }
    };

    for _ in 0..count {
        let num = next_uint(&mut cursor)? as u32;
        let offset = next_uint(&mut cursor)? as usize;
        pairs.push((num, offset));
    }

    Ok(pairs)
}
