//! PDF output.
//!
//! ```text
//! CrossRefTable + trailer
//!     ↓
//! [PdfWriter] (header, body, xref, trailer; optional Flate and RC4)
//!     ↓
//! [ObjectSerializer] (one object to PDF syntax)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{PdfWriter, WriterOptions};
