//! PDF lexer (tokenizer).
//!
//! Breaks raw PDF bytes into tokens. The grammar pieces are nom parsers over
//! byte slices; [`scan_next_token`] and [`Lexer`] wrap them with a cursor and
//! turn nom failures into [`Error::Lex`] values that carry the offending byte
//! and its offset.

use crate::error::{Error, Result};
use nom::{
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// Integer number (e.g., 42, -123), limited to the 32-bit signed range
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string with escapes already decoded
    LiteralString(Vec<u8>),

    /// Hexadecimal string, already decoded to bytes
    HexString(Vec<u8>),

    /// Name without the leading slash, `#xx` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,

    /// Any other bare word: xref, trailer, startxref, content operators, braces
    Keyword(String),

    /// End of input
    Eof,
}

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Regular characters: neither whitespace nor delimiter.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn lex_err(input: &[u8], kind: ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

fn lex_failure(input: &[u8], kind: ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Failure(nom::error::Error::new(input, kind))
}

/// Parse a comment (% to end of line, or to end of input).
fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

/// Skip all whitespace and comments. Never fails.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;

    loop {
        let (rest, ws) = take_while(is_whitespace)(remaining)?;
        remaining = rest;

        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) if ws.is_empty() => break,
            Err(_) => {},
        }
    }

    Ok((remaining, ()))
}

/// Parse an integer or real number.
///
/// Accepts a leading sign and at most one decimal point; a second point ends
/// the token. Integers outside the 32-bit signed range are a hard failure.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(lex_err(start, ErrorKind::Digit));
    }

    let negative = sign == Some('-');

    if let Some(frac) = frac_part {
        let mut num_str = String::new();
        if negative {
            num_str.push('-');
        }
        match int_part {
            Some(int) => num_str.push_str(&String::from_utf8_lossy(int)),
            None => num_str.push('0'),
        }
        num_str.push('.');
        match frac {
            Some(frac) => num_str.push_str(&String::from_utf8_lossy(frac)),
            None => num_str.push('0'),
        }

        let num: f64 = num_str.parse().map_err(|_| lex_err(start, ErrorKind::Digit))?;
        return Ok((input, Token::Real(num)));
    }

    let int_bytes = int_part.ok_or_else(|| lex_err(start, ErrorKind::Digit))?;
    let magnitude: i64 = std::str::from_utf8(int_bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| lex_failure(start, ErrorKind::TooLarge))?;
    let num = if negative { -magnitude } else { magnitude };

    if num < i32::MIN as i64 || num > i32::MAX as i64 {
        return Err(lex_failure(start, ErrorKind::TooLarge));
    }

    Ok((input, Token::Integer(num)))
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced nested parentheses are kept; escapes are decoded by
/// [`decode_literal_string_escapes`].
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos >= remaining.len() {
        return Err(lex_failure(&input[input.len()..], ErrorKind::Eof));
    }

    let content = &remaining[..pos];
    Ok((&remaining[pos + 1..], Token::LiteralString(decode_literal_string_escapes(content))))
}

/// Decode escape sequences in the body of a literal string.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits), and the
/// backslash-newline continuation. Unescaped CR and CRLF become LF. An
/// unknown escape keeps the character and drops the backslash.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\\' => {
                i += 1;
                let Some(&c) = raw.get(i) else {
                    break;
                };
                match c {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' | b')' | b'\\' => out.push(c),
                    b'\r' => {
                        if raw.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'\n' => {},
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 3 {
                            match raw.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + (d - b'0') as u32;
                                    i += 1;
                                    digits += 1;
                                },
                                _ => break,
                            }
                        }
                        out.push((value & 0xFF) as u8);
                        continue;
                    },
                    other => out.push(other),
                }
                i += 1;
            },
            b'\r' => {
                out.push(b'\n');
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                i += 1;
            },
            c => {
                out.push(c);
                i += 1;
            },
        }
    }

    out
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Whitespace is ignored; an odd digit count is padded with a trailing 0.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token> {
    let (remaining, _) = char('<')(input)?;
    let (remaining, body) =
        take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c))(remaining)?;

    match remaining.first() {
        Some(b'>') => Ok((&remaining[1..], Token::HexString(decode_hex(body)))),
        Some(_) => Err(lex_failure(remaining, ErrorKind::HexDigit)),
        None => Err(lex_failure(remaining, ErrorKind::Eof)),
    }
}

/// Decode hex digits, skipping whitespace and anything else that is not a
/// hex digit. An odd trailing nibble is padded with zero.
pub fn decode_hex(hex: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(hex.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for &c in hex {
        let Some(nibble) = hex_value(c) else {
            continue;
        };
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if let Some(h) = high {
        out.push(h << 4);
    }

    out
}

/// Value of one hex digit.
pub fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode #XX escape sequences in PDF names.
///
/// Invalid sequences are preserved literally. The decoded bytes are read as
/// UTF-8 when valid, otherwise byte-per-char.
///
/// ```
/// # use pdf_forge::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(name.len());
    let mut i = 0;

    while i < name.len() {
        if name[i] == b'#' {
            let hi = name.get(i + 1).copied().and_then(hex_value);
            let lo = name.get(i + 2).copied().and_then(hex_value);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                bytes.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        bytes.push(name[i]);
        i += 1;
    }

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token> {
    let (input, _) = char('/')(input)?;
    let (input, raw) = take_while(is_regular)(input)?;
    Ok((input, Token::Name(decode_name_escapes(raw))))
}

/// Parse a bare word and classify it as a reserved keyword or a generic one.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token> {
    let (rest, word) = take_while1(is_regular)(input)?;

    let tok = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        other => Token::Keyword(String::from_utf8_lossy(other).into_owned()),
    };

    Ok((rest, tok))
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// Returns a nom `Error` at end of input; callers that want an explicit
/// end marker use [`scan_next_token`].
pub fn token(input: &[u8]) -> IResult<&[u8], Token> {
    let (input, _) = skip_ws(input)?;

    match input.first().copied() {
        None => Err(lex_err(input, ErrorKind::Eof)),
        Some(b'/') => parse_name(input),
        Some(b'(') => parse_literal_string(input),
        Some(b'<') if input.get(1) == Some(&b'<') => Ok((&input[2..], Token::DictStart)),
        Some(b'<') => parse_hex_string(input),
        Some(b'>') if input.get(1) == Some(&b'>') => Ok((&input[2..], Token::DictEnd)),
        Some(b'[') => Ok((&input[1..], Token::ArrayStart)),
        Some(b']') => Ok((&input[1..], Token::ArrayEnd)),
        Some(c @ (b'{' | b'}')) => Ok((&input[1..], Token::Keyword((c as char).to_string()))),
        Some(c) if c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.') => parse_number(input),
        Some(c) if is_regular(c) => parse_keyword(input),
        Some(_) => Err(lex_err(input, ErrorKind::Char)),
    }
}

/// Convert a nom error produced while scanning `buffer` into an [`Error::Lex`].
pub fn lex_error(buffer: &[u8], err: nom::Err<nom::error::Error<&[u8]>>) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::lex(buffer, buffer.len(), "unexpected end of input"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = buffer.len().saturating_sub(e.input.len());
            let reason = match e.code {
                ErrorKind::TooLarge => "integer outside the 32-bit range",
                ErrorKind::Digit => "malformed number",
                ErrorKind::HexDigit => "invalid character in hex string",
                ErrorKind::Eof => "unexpected end of input",
                _ => "unexpected character",
            };
            Error::lex(buffer, offset, reason)
        },
    }
}

/// Scan the token starting at `cursor`.
///
/// Returns the token and the cursor just past it. At end of input (including
/// trailing whitespace or an unterminated comment) the token is [`Token::Eof`].
pub fn scan_next_token(buffer: &[u8], cursor: usize) -> Result<(Token, usize)> {
    let input = buffer.get(cursor..).unwrap_or(&[]);
    let (rest, _) = skip_ws(input).map_err(|e| lex_error(buffer, e))?;

    if rest.is_empty() {
        return Ok((Token::Eof, buffer.len()));
    }

    match token(rest) {
        Ok((rest, tok)) => Ok((tok, buffer.len() - rest.len())),
        Err(e) => Err(lex_error(buffer, e)),
    }
}

/// Cursor over a byte buffer producing tokens.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Lexer positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Lexer positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// The whole buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Bytes from the cursor onward.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Scan the next token and advance past it.
    pub fn next_token(&mut self) -> Result<Token> {
        let (tok, next) = scan_next_token(self.data, self.pos)?;
        self.pos = next;
        Ok(tok)
    }

    /// Scan the next token without advancing.
    pub fn peek_token(&self) -> Result<Token> {
        scan_next_token(self.data, self.pos).map(|(tok, _)| tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Numbers
    // ========================================================================

    #[test]
    fn test_integer() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-17 "), Ok((&b" "[..], Token::Integer(-17))));
        assert_eq!(token(b"+5"), Ok((&b""[..], Token::Integer(5))));
    }

    #[test]
    fn test_real() {
        assert_eq!(token(b"3.25"), Ok((&b""[..], Token::Real(3.25))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
        assert_eq!(token(b"4."), Ok((&b""[..], Token::Real(4.0))));
    }

    #[test]
    fn test_second_decimal_point_ends_number() {
        assert_eq!(token(b"1.2.3"), Ok((&b".3"[..], Token::Real(1.2))));
    }

    #[test]
    fn test_integer_out_of_range_is_lex_error() {
        let err = scan_next_token(b"  4294967296", 0).unwrap_err();
        match err {
            Error::Lex { byte, offset, reason } => {
                assert_eq!(byte, Some(b'4'));
                assert_eq!(offset, 2);
                assert!(reason.contains("32-bit"));
            },
            other => panic!("Expected Lex error, got {:?}", other),
        }
        assert!(scan_next_token(b"2147483647", 0).is_ok());
        assert!(scan_next_token(b"-2147483648", 0).is_ok());
    }

    #[test]
    fn test_lone_sign_is_error() {
        assert!(scan_next_token(b"- ", 0).is_err());
    }

    // ========================================================================
    // Strings
    // ========================================================================

    #[test]
    fn test_literal_string_with_escaped_parens() {
        assert_eq!(
            token(br"(a\(b\)c)"),
            Ok((&b""[..], Token::LiteralString(b"a(b)c".to_vec())))
        );
    }

    #[test]
    fn test_literal_string_nested_parens() {
        assert_eq!(
            token(b"(Hello (World))"),
            Ok((&b""[..], Token::LiteralString(b"Hello (World)".to_vec())))
        );
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(decode_literal_string_escapes(br"a\nb\tc\\"), b"a\nb\tc\\");
        assert_eq!(decode_literal_string_escapes(br"\101\60x"), b"A0x");
        assert_eq!(decode_literal_string_escapes(br"\0053"), b"\x053");
        assert_eq!(decode_literal_string_escapes(br"\b\f"), b"\x08\x0C");
        assert_eq!(decode_literal_string_escapes(br"\q"), b"q");
    }

    #[test]
    fn test_literal_string_line_continuation() {
        assert_eq!(decode_literal_string_escapes(b"abc\\\ndef"), b"abcdef");
        assert_eq!(decode_literal_string_escapes(b"abc\\\r\ndef"), b"abcdef");
    }

    #[test]
    fn test_literal_string_eol_normalized() {
        assert_eq!(decode_literal_string_escapes(b"a\r\nb\rc\nd"), b"a\nb\nc\nd");
    }

    #[test]
    fn test_unterminated_literal_string() {
        let err = scan_next_token(b"(abc", 0).unwrap_err();
        assert!(matches!(err, Error::Lex { byte: None, offset: 4, .. }));
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(token(b"<41 42>"), Ok((&b""[..], Token::HexString(b"AB".to_vec()))));
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(Vec::new()))));
    }

    #[test]
    fn test_hex_string_odd_length_padded() {
        assert_eq!(token(b"<901FA>"), Ok((&b""[..], Token::HexString(vec![0x90, 0x1F, 0xA0]))));
    }

    #[test]
    fn test_hex_string_invalid_char() {
        let err = scan_next_token(b"<41G>", 0).unwrap_err();
        assert!(matches!(err, Error::Lex { byte: Some(b'G'), offset: 3, .. }));
    }

    // ========================================================================
    // Names and keywords
    // ========================================================================

    #[test]
    fn test_name() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B/C"), Ok((&b"/C"[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/ "), Ok((&b" "[..], Token::Name(String::new()))));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"R"), Ok((&b""[..], Token::R)));
        assert_eq!(token(b"RG"), Ok((&b""[..], Token::Keyword("RG".to_string()))));
        assert_eq!(token(b"trailer<<"), Ok((&b"<<"[..], Token::Keyword("trailer".to_string()))));
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
        assert_eq!(token(b"["), Ok((&b""[..], Token::ArrayStart)));
        assert_eq!(token(b"]"), Ok((&b""[..], Token::ArrayEnd)));
    }

    #[test]
    fn test_stray_close_paren_is_error() {
        let err = scan_next_token(b"  )", 0).unwrap_err();
        assert!(matches!(err, Error::Lex { byte: Some(b')'), offset: 2, .. }));
    }

    // ========================================================================
    // Whitespace, comments and the cursor API
    // ========================================================================

    #[test]
    fn test_comments_skipped() {
        assert_eq!(token(b"% comment\n42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_eof_inside_comment_terminates() {
        assert_eq!(scan_next_token(b"1 % trailing", 1).unwrap(), (Token::Eof, 12));
        assert_eq!(scan_next_token(b"%", 0).unwrap(), (Token::Eof, 1));
    }

    #[test]
    fn test_lexer_reference_sequence() {
        let mut lexer = Lexer::new(b"123 0 R");
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(123));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(0));
        assert_eq!(lexer.peek_token().unwrap(), Token::R);
        assert_eq!(lexer.next_token().unwrap(), Token::R);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
        assert_eq!(lexer.position(), 7);
    }

    #[test]
    fn test_lexer_crlf_between_tokens() {
        let mut lexer = Lexer::new(b"1\r\n2\r3\n");
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(1));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(2));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(3));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_scan_from_cursor() {
        let (tok, next) = scan_next_token(b"/A /B", 2).unwrap();
        assert_eq!(tok, Token::Name("B".to_string()));
        assert_eq!(next, 5);
    }
}
