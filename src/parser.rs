//! PDF object parser.
//!
//! Builds [`Object`] values from lexer tokens. Uses two-token lookahead to
//! tell `N G R` references and `N G obj` headers apart from plain integers.

use crate::error::{Error, Result};
use crate::lexer::{lex_error, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParserOptions;
use bytes::Bytes;
use nom::error::ErrorKind;
use nom::IResult;

fn parse_err(input: &[u8], kind: ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse a single PDF object with default options.
///
/// ```
/// use pdf_forge::parser::parse_object;
/// use pdf_forge::object::{Object, ObjectRef};
///
/// let (_, obj) = parse_object(b"123 0 R").unwrap();
/// assert_eq!(obj, Object::Reference(ObjectRef::new(123, 0)));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_with(input, &ParserOptions::default())
}

/// Parse a single PDF object.
pub fn parse_object_with<'a>(input: &'a [u8], opts: &ParserOptions) -> IResult<&'a [u8], Object> {
    parse_object_depth(input, opts, 0)
}

fn parse_object_depth<'a>(
    input: &'a [u8],
    opts: &ParserOptions,
    depth: usize,
) -> IResult<&'a [u8], Object> {
    if depth > opts.max_nesting {
        return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Count)));
    }

    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),

        Token::Integer(i) => {
            if let Some((after, r)) = reference_lookahead(i, rest) {
                return Ok((after, Object::Reference(r)));
            }
            Ok((rest, Object::Integer(i)))
        },

        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(bytes) | Token::HexString(bytes) => Ok((rest, Object::String(bytes))),
        Token::Name(name) => Ok((rest, Object::Name(name))),

        Token::ArrayStart => parse_array(rest, opts, depth),

        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, opts, depth)?;

            if let Ok((stream_input, Token::StreamStart)) = token(rest) {
                let (final_input, data) = parse_stream_data(stream_input, &dict, opts)?;
                return Ok((final_input, Object::Stream { dict, data: Bytes::from(data) }));
            }

            Ok((rest, Object::Dictionary(dict)))
        },

        _ => Err(parse_err(input, ErrorKind::Tag)),
    }
}

/// After an integer `id`, check whether `G R` follows.
fn reference_lookahead(id: i64, input: &[u8]) -> Option<(&[u8], ObjectRef)> {
    let (after_gen, gen) = match token(input) {
        Ok((rest, Token::Integer(gen))) => (rest, gen),
        _ => return None,
    };
    let (after_r, _) = match token(after_gen) {
        Ok((rest, Token::R)) => (rest, ()),
        _ => return None,
    };

    let id = u32::try_from(id).ok()?;
    let gen = u16::try_from(gen).ok()?;
    Some((after_r, ObjectRef::new(id, gen)))
}

/// Parse stream data after the `stream` keyword.
///
/// Trusts `/Length` when it is a direct integer within bounds and is followed
/// by `endstream`; otherwise scans for the `endstream` keyword.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    opts: &ParserOptions,
) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        log::warn!("No end-of-line after stream keyword");
        input
    };

    match dict.get("Length") {
        Some(Object::Integer(len)) if *len >= 0 => {
            let len = *len as usize;
            if len <= opts.max_stream_length && len <= input.len() {
                if let Ok((rest, Token::StreamEnd)) = token(&input[len..]) {
                    return Ok((rest, input[..len].to_vec()));
                }
                log::warn!("Stream /Length {} not followed by endstream, scanning instead", len);
            } else {
                log::warn!("Stream /Length {} exceeds available data, scanning instead", len);
            }
        },
        Some(Object::Reference(r)) => {
            log::debug!("Stream /Length is indirect ({}), scanning for endstream", r);
        },
        _ => log::warn!("Stream has no usable /Length, scanning for endstream"),
    }

    let pos = find_endstream(input).ok_or_else(|| parse_err(input, ErrorKind::Eof))?;
    let data = trim_trailing_eol(&input[..pos]);
    let (rest, _) = token(&input[pos..])?;
    Ok((rest, data.to_vec()))
}

/// Find the position of the `endstream` keyword.
pub fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|window| window == keyword)
}

/// Drop a single trailing CRLF, LF or CR.
fn trim_trailing_eol(data: &[u8]) -> &[u8] {
    if data.ends_with(b"\r\n") {
        &data[..data.len() - 2]
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        &data[..data.len() - 1]
    } else {
        data
    }
}

/// Parse a PDF array body after `[`.
///
/// An array left open at end of input returns what was read.
fn parse_array<'a>(
    input: &'a [u8],
    opts: &ParserOptions,
    depth: usize,
) -> IResult<&'a [u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(objects))),
            Ok(_) => {
                let (rest, obj) = parse_object_depth(remaining, opts, depth + 1)?;
                objects.push(obj);
                remaining = rest;
            },
            Err(nom::Err::Error(e)) if e.code == ErrorKind::Eof => {
                log::warn!("Array not closed before end of input");
                return Ok((e.input, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse a PDF dictionary body after `<<`.
fn parse_dictionary<'a>(
    input: &'a [u8],
    opts: &ParserOptions,
    depth: usize,
) -> IResult<&'a [u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => {
                let (rest, value) = parse_object_depth(rest, opts, depth + 1)?;
                // A null value is equivalent to the key being absent
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            Ok(_) => return Err(parse_err(remaining, ErrorKind::Tag)),
            Err(nom::Err::Error(e)) if e.code == ErrorKind::Eof => {
                log::warn!("Dictionary not closed before end of input");
                return Ok((e.input, dict));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse an indirect object definition: `N G obj <object> endobj`.
///
/// A missing `endobj` is tolerated; an empty body is read as null.
pub fn parse_indirect_object<'a>(
    input: &'a [u8],
    opts: &ParserOptions,
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => (rest, id as u32),
        _ => return Err(parse_err(input, ErrorKind::Tag)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return Err(parse_err(input, ErrorKind::Tag)),
    };
    let rest = match token(rest)? {
        (rest, Token::ObjStart) => rest,
        _ => return Err(parse_err(input, ErrorKind::Tag)),
    };

    let (rest, obj) = match token(rest) {
        Ok((after, Token::ObjEnd)) => return Ok((after, (ObjectRef::new(id, gen), Object::Null))),
        _ => parse_object_with(rest, opts)?,
    };

    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => {
            log::warn!("Object {} {} has no endobj", id, gen);
            rest
        },
    };

    Ok((rest, (ObjectRef::new(id, gen), obj)))
}

fn to_error(data: &[u8], err: nom::Err<nom::error::Error<&[u8]>>) -> Error {
    if let nom::Err::Error(e) | nom::Err::Failure(e) = &err {
        let offset = data.len().saturating_sub(e.input.len());
        match e.code {
            ErrorKind::Tag => {
                return Error::ParseError {
                    offset,
                    reason: "unexpected token".to_string(),
                }
            },
            ErrorKind::Count => {
                return Error::ParseError {
                    offset,
                    reason: "nesting too deep".to_string(),
                }
            },
            _ => {},
        }
    }
    lex_error(data, err)
}

/// Parse the object starting at `offset`, returning it and the offset after it.
pub fn parse_object_at(data: &[u8], offset: usize, opts: &ParserOptions) -> Result<(Object, usize)> {
    let input = data.get(offset..).ok_or(Error::UnexpectedEof)?;
    let (rest, obj) = parse_object_with(input, opts).map_err(|e| to_error(data, e))?;
    Ok((obj, data.len() - rest.len()))
}

/// Parse the indirect object starting at `offset`.
pub fn parse_indirect_object_at(
    data: &[u8],
    offset: usize,
    opts: &ParserOptions,
) -> Result<(ObjectRef, Object, usize)> {
    let input = data.get(offset..).ok_or(Error::UnexpectedEof)?;
    let (rest, (r, obj)) = parse_indirect_object(input, opts).map_err(|e| to_error(data, e))?;
    Ok((r, obj, data.len() - rest.len()))
}
