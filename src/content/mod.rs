//! Page content streams.
//!
//! A content stream is a flat postfix program over decoded stream bytes.
//! [`parse_content`] turns it into [`ContentObject`] values and
//! [`ContentWriter`] writes them back.

pub mod operators;
pub mod parser;
pub mod writer;

pub use operators::{lookup_operator, OpInfo, OPERATORS};
pub use parser::{parse_content, parse_content_with, ContentObject, DictBlob, Operation};
pub use writer::{write_content, ContentWriter};
