//! Content stream parser.
//!
//! Content streams use postfix notation: operands come before the operator
//! that consumes them.
//!
//! ```text
//! BT
//!   /F1 12 Tf
//!   100 700 Td
//!   (Hello, World!) Tj
//! ET
//! ```
//!
//! Tokens come from the crate [`Lexer`]. Dictionaries (marked-content
//! property lists) are kept as raw bytes, and inline images are skipped.

use super::operators::{lookup_operator, OpInfo};
use crate::error::{Error, Result};
use crate::lexer::{is_delimiter, is_whitespace, Lexer, Token};
use crate::object::{Dictionary, Object};
use crate::parser_config::ParserOptions;

/// A value in a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentObject {
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// String bytes, whether written literal or hex
    String(Vec<u8>),
    /// Name without the leading slash
    Name(String),
    /// `true` or `false`
    Boolean(bool),
    /// `null`
    Null,
    /// Array operand
    Array(Vec<ContentObject>),
    /// Inline dictionary, kept verbatim
    Dictionary(DictBlob),
    /// Operator with its bound operands
    Operator(Operation),
}

/// Raw `<< ... >>` bytes, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictBlob(pub Vec<u8>);

impl DictBlob {
    /// The verbatim bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the blob as a PDF dictionary.
    pub fn parse(&self) -> Result<Dictionary> {
        let (obj, _) = crate::parser::parse_object_at(&self.0, 0, &ParserOptions::default())?;
        match obj {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// An operator keyword and its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operator keyword
    pub name: String,
    /// Operands in stream order
    pub operands: Vec<ContentObject>,
}

impl Operation {
    /// Build an operation.
    pub fn new(name: impl Into<String>, operands: Vec<ContentObject>) -> Self {
        Self {
            name: name.into(),
            operands,
        }
    }

    /// Table entry for the operator, `None` for unknown keywords.
    pub fn info(&self) -> Option<&'static OpInfo> {
        lookup_operator(&self.name)
    }
}

/// Parse decoded content stream bytes with default limits.
///
/// ```
/// use pdf_forge::content::{parse_content, ContentObject};
///
/// let ops = parse_content(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET").unwrap();
/// assert_eq!(ops.len(), 5);
/// assert!(matches!(&ops[1], ContentObject::Operator(op) if op.name == "Tf"));
/// ```
pub fn parse_content(data: &[u8]) -> Result<Vec<ContentObject>> {
    parse_content_with(data, &ParserOptions::default())
}

/// Parse content stream bytes, bounding array nesting by `opts.max_nesting`.
///
/// Operands left over at the end of the stream are kept as bare values.
pub fn parse_content_with(data: &[u8], opts: &ParserOptions) -> Result<Vec<ContentObject>> {
    ContentParser {
        lexer: Lexer::new(data),
        max_nesting: opts.max_nesting,
    }
    .parse()
}

struct ContentParser<'a> {
    lexer: Lexer<'a>,
    max_nesting: usize,
}

impl ContentParser<'_> {
    fn parse(&mut self) -> Result<Vec<ContentObject>> {
        let mut sequence = Vec::new();
        let mut operands = Vec::new();

        loop {
            let start = self.lexer.position();
            match self.lexer.next_token()? {
                Token::Eof => break,
                Token::ArrayStart => operands.push(self.parse_array(1)?),
                Token::DictStart => operands.push(self.scan_dict_blob(start)?),
                Token::ArrayEnd | Token::DictEnd => {
                    log::warn!("Ignoring unbalanced delimiter at byte {} of content stream", start);
                },
                tok => match operator_keyword(tok) {
                    Ok(name) if name == "BI" => self.skip_inline_image(start)?,
                    Ok(name) => {
                        let op = Operation::new(name, std::mem::take(&mut operands));
                        if op.info().is_none() {
                            log::debug!("Unknown content operator '{}' at byte {}", op.name, start);
                        }
                        sequence.push(ContentObject::Operator(op));
                    },
                    Err(operand) => operands.push(operand),
                },
            }
        }

        if !operands.is_empty() {
            log::warn!("Content stream ends with {} unbound operands", operands.len());
            sequence.extend(operands);
        }
        Ok(sequence)
    }

    fn parse_array(&mut self, depth: usize) -> Result<ContentObject> {
        if depth > self.max_nesting {
            return Err(Error::ParseError {
                offset: self.lexer.position(),
                reason: format!("array nesting deeper than {}", self.max_nesting),
            });
        }

        let mut items = Vec::new();
        loop {
            let start = self.lexer.position();
            match self.lexer.next_token()? {
                Token::ArrayEnd => return Ok(ContentObject::Array(items)),
                Token::ArrayStart => items.push(self.parse_array(depth + 1)?),
                Token::DictStart => items.push(self.scan_dict_blob(start)?),
                Token::Eof => return Err(Error::UnexpectedEof),
                tok => match operator_keyword(tok) {
                    Err(operand) => items.push(operand),
                    Ok(name) => {
                        return Err(Error::ParseError {
                            offset: start,
                            reason: format!("operator '{}' inside array", name),
                        })
                    },
                },
            }
        }
    }

    /// Capture a balanced `<< >>` region starting at `start`.
    fn scan_dict_blob(&mut self, start: usize) -> Result<ContentObject> {
        let data = self.lexer.data();
        let end = balanced_dict_end(data, start).ok_or(Error::UnexpectedEof)?;
        self.lexer.seek(end);
        Ok(ContentObject::Dictionary(DictBlob(data[start..end].to_vec())))
    }

    /// Step over `BI <entries> ID <data> EI`.
    fn skip_inline_image(&mut self, start: usize) -> Result<()> {
        let mut ascii85 = false;
        loop {
            match self.lexer.next_token()? {
                Token::Keyword(word) if word == "ID" => break,
                Token::Name(name) if name == "A85" || name == "ASCII85Decode" => ascii85 = true,
                Token::Eof => return Err(Error::UnexpectedEof),
                _ => {},
            }
        }

        let data = self.lexer.data();
        let id_end = self.lexer.position();
        // ASCII85 data may contain "EI"; its own terminator comes first.
        let search_from = if ascii85 {
            find(data, id_end, b"~>").map_or(id_end, |pos| pos + 2)
        } else {
            id_end
        };

        let ei = find_inline_image_end(data, search_from).ok_or_else(|| Error::ParseError {
            offset: start,
            reason: "inline image without EI".to_string(),
        })?;
        log::debug!(
            "Skipped inline image at byte {} ({} data bytes)",
            start,
            ei.saturating_sub(id_end + 1)
        );
        self.lexer.seek(ei + 2);
        Ok(())
    }
}

/// Classify a token: `Ok` with the keyword for operators, `Err` with the
/// operand value otherwise.
fn operator_keyword(tok: Token) -> std::result::Result<String, ContentObject> {
    let keyword = match tok {
        Token::Integer(i) => return Err(ContentObject::Integer(i)),
        Token::Real(r) => return Err(ContentObject::Real(r)),
        Token::LiteralString(s) | Token::HexString(s) => return Err(ContentObject::String(s)),
        Token::Name(n) => return Err(ContentObject::Name(n)),
        Token::True => return Err(ContentObject::Boolean(true)),
        Token::False => return Err(ContentObject::Boolean(false)),
        Token::Null => return Err(ContentObject::Null),
        Token::Keyword(word) => return Ok(word),
        Token::ObjStart => "obj",
        Token::ObjEnd => "endobj",
        Token::StreamStart => "stream",
        Token::StreamEnd => "endstream",
        Token::R => "R",
        Token::ArrayStart => "[",
        Token::ArrayEnd => "]",
        Token::DictStart => "<<",
        Token::DictEnd => ">>",
        Token::Eof => "",
    };
    Ok(keyword.to_string())
}

/// Offset just past the `>>` closing the dictionary opened at `start`.
///
/// Literal strings, hex strings and comments are skipped so their bytes
/// cannot unbalance the count.
fn balanced_dict_end(data: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;

    while pos < data.len() {
        match data[pos] {
            b'<' if data.get(pos + 1) == Some(&b'<') => {
                depth += 1;
                pos += 2;
            },
            b'>' if data.get(pos + 1) == Some(&b'>') => {
                depth = depth.checked_sub(1)?;
                pos += 2;
                if depth == 0 {
                    return Some(pos);
                }
            },
            b'<' => pos = find(data, pos, b">")? + 1,
            b'(' => pos = literal_string_end(data, pos)?,
            b'%' => {
                while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                    pos += 1;
                }
            },
            _ => pos += 1,
        }
    }
    None
}

/// Offset just past the `)` closing the literal string opened at `start`.
fn literal_string_end(data: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;
    while pos < data.len() {
        match data[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos + 1);
                }
            },
            _ => {},
        }
        pos += 1;
    }
    None
}

/// Offset of the `E` of an `EI` preceded by whitespace and followed by
/// whitespace, a delimiter or the end of data.
fn find_inline_image_end(data: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while pos + 3 <= data.len() {
        if is_whitespace(data[pos]) && &data[pos + 1..pos + 3] == b"EI" {
            match data.get(pos + 3) {
                None => return Some(pos + 1),
                Some(&c) if is_whitespace(c) || is_delimiter(c) => return Some(pos + 1),
                _ => {},
            }
        }
        pos += 1;
    }
    None
}

fn find(data: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    data.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
