//! Error types for PDF object model operations.

use crate::object::ObjectRef;
use std::fmt;

/// Result type alias for pdf_forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a password check can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    /// The document is encrypted and no usable password was supplied
    Required,
    /// A password was supplied but matched neither the owner nor the user key
    Invalid,
    /// The operation needs the owner password, but only the user password validated
    OwnerRequired,
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordError::Required => write!(f, "password required"),
            PasswordError::Invalid => write!(f, "invalid password"),
            PasswordError::OwnerRequired => write!(f, "owner password required"),
        }
    }
}

/// Error types for PDF processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed token in the byte stream
    #[error("Lex error at byte {offset}{}: {reason}", fmt_byte(.byte))]
    Lex {
        /// Offending byte, `None` at end of input
        byte: Option<u8>,
        /// Byte offset where the error occurred
        offset: usize,
        /// Description of the problem
        reason: String,
    },

    /// Invalid PDF header
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// Unsupported PDF version
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Object could not be parsed at the given offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Description of the parse error
        reason: String,
    },

    /// Invalid or missing cross-reference section
    #[error("Invalid cross-reference table: {0}")]
    InvalidXref(String),

    /// Document structure is broken (missing trailer, xref loop, count mismatch)
    #[error("Structural error: {0}")]
    Structural(String),

    /// Referenced object not found in the table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// An object with this id is already present
    #[error("Duplicate object id: {0}")]
    DuplicateObject(ObjectRef),

    /// Object has a different type than expected
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Input ended in the middle of a structure
    #[error("Unexpected end of file")]
    UnexpectedEof,

    /// Password validation failed
    #[error("Password error: {0}")]
    Password(PasswordError),

    /// Encryption dictionary uses a handler, version or revision we refuse to guess at
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// Filter name is not a known PDF filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Feature is recognized but has no implementation (LZW encode, CCITT, DCT, ...)
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Stream data could not be decoded
    #[error("Stream decode error: {0}")]
    Decode(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

fn fmt_byte(byte: &Option<u8>) -> String {
    match byte {
        Some(b) if b.is_ascii_graphic() => format!(" ('{}')", *b as char),
        Some(b) => format!(" (0x{:02X})", b),
        None => " (end of input)".to_string(),
    }
}

impl Error {
    /// Build a lex error for `data` at `offset`, capturing the byte found there.
    pub fn lex(data: &[u8], offset: usize, reason: impl Into<String>) -> Self {
        Error::Lex {
            byte: data.get(offset).copied(),
            offset,
            reason: reason.into(),
        }
    }

    /// Whether the reader may skip the object that produced this error.
    ///
    /// Password, encryption and I/O failures always abort an open.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Lex { .. }
                | Error::ParseError { .. }
                | Error::InvalidObjectType { .. }
                | Error::UnexpectedEof
                | Error::Decode(_)
                | Error::UnsupportedFilter(_)
                | Error::NotImplemented(_)
                | Error::Utf8Error(_)
        )
    }
}
