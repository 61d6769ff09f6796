//! PDF document writer.
//!
//! Assembles a complete file from a [`CrossRefTable`] and a trailer:
//! header, body, classic xref table, trailer and `startxref`.

use super::object_serializer::ObjectSerializer;
use crate::encryption::SecurityHandler;
use crate::error::{Error, Result};
use crate::filters::{FlateFilter, FlateMode, StreamFilter};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::table::CrossRefTable;
use std::io::Write;

/// Trailer keys that describe the file layout rather than the document.
const LAYOUT_KEYS: &[&str] = &["Size", "Prev", "XRefStm", "Encrypt"];

/// Configuration for saving.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriterOptions {
    /// Header version override; the document's version is used when `None`
    pub version: Option<(u8, u8)>,
    /// Flate-encode streams that have no `/Filter`
    pub compress: bool,
    /// Compression preset when `compress` is on
    pub flate_mode: FlateMode,
    /// Write dictionaries on one line
    pub compact: bool,
    /// Reserved for CCITT G4 encoding of 1-bit images. CCITT encoding is not
    /// implemented, so the flag is stored and has no effect.
    pub ccitt_for_bilevel_images: bool,
}

impl WriterOptions {
    /// Override the header version.
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = Some((major, minor));
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Select the Flate preset.
    pub fn with_flate_mode(mut self, mode: FlateMode) -> Self {
        self.flate_mode = mode;
        self
    }

    /// Enable or disable compact formatting.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Set the CCITT flag for bilevel images.
    pub fn with_ccitt_for_bilevel_images(mut self, enabled: bool) -> Self {
        self.ccitt_for_bilevel_images = enabled;
        self
    }
}

/// Serializes a document.
pub struct PdfWriter<'a> {
    options: WriterOptions,
    serializer: ObjectSerializer,
    security: Option<&'a SecurityHandler>,
}

impl<'a> PdfWriter<'a> {
    /// Create a writer.
    pub fn new(options: WriterOptions) -> Self {
        let serializer = if options.compact {
            ObjectSerializer::compact()
        } else {
            ObjectSerializer::new()
        };
        Self {
            options,
            serializer,
            security: None,
        }
    }

    /// Encrypt every object with `handler` on the way out.
    pub fn with_security(mut self, handler: &'a SecurityHandler) -> Self {
        self.security = Some(handler);
        self
    }

    /// Serialize the document into a byte vector.
    pub fn to_bytes(
        &self,
        table: &CrossRefTable,
        trailer: &Dictionary,
        version: (u8, u8),
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, table, trailer, version)?;
        Ok(out)
    }

    /// Serialize the document into `sink`.
    ///
    /// `trailer` must carry `/Root`. Layout keys (`/Size`, `/Prev`,
    /// `/XRefStm`, `/Encrypt`) are recomputed. With security enabled the
    /// trailer must also carry the `/ID` the handler was keyed with.
    pub fn write<W: Write>(
        &self,
        sink: &mut W,
        table: &CrossRefTable,
        trailer: &Dictionary,
        version: (u8, u8),
    ) -> Result<()> {
        if !trailer.contains_key("Root") {
            log::error!("Refusing to write a trailer without /Root");
            return Err(Error::Structural("trailer has no /Root".to_string()));
        }
        if self.security.is_some() && !trailer.contains_key("ID") {
            return Err(Error::Structural("encrypted output needs a trailer /ID".to_string()));
        }

        let (major, minor) = self.options.version.unwrap_or(version);
        let mut out = format!("%PDF-{}.{}\n", major, minor).into_bytes();
        // Binary marker
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets: Vec<(ObjectRef, usize)> = Vec::with_capacity(table.len() + 1);
        for (id, obj) in table.iter() {
            let obj = self.prepare(*id, obj)?;
            offsets.push((*id, out.len()));
            out.extend_from_slice(&self.serializer.serialize_indirect(id.id, id.gen, &obj));
        }

        let encrypt_ref = match self.security {
            Some(handler) => {
                let id = ObjectRef::new(table.max_object_number() + 1, 0);
                let dict = Object::Dictionary(handler.encrypt_dictionary());
                offsets.push((id, out.len()));
                out.extend_from_slice(&self.serializer.serialize_indirect(id.id, id.gen, &dict));
                Some(id)
            },
            None => None,
        };

        let xref_start = out.len();
        write_xref(&mut out, &offsets);

        let size = offsets.last().map_or(0, |(id, _)| id.id) + 1;
        let mut final_trailer = Dictionary::new();
        final_trailer.insert("Size".to_string(), Object::Integer(size as i64));
        for (key, value) in trailer {
            if !LAYOUT_KEYS.contains(&key.as_str()) {
                final_trailer.insert(key.clone(), value.clone());
            }
        }
        if let Some(r) = encrypt_ref {
            final_trailer.insert("Encrypt".to_string(), Object::Reference(r));
        }

        out.extend_from_slice(b"trailer\n");
        self.serializer.write_object(&mut out, &Object::Dictionary(final_trailer));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());

        sink.write_all(&out)?;
        sink.flush()?;
        log::info!(
            "Wrote {} objects, {} bytes{}",
            offsets.len(),
            out.len(),
            if encrypt_ref.is_some() { ", encrypted" } else { "" }
        );
        Ok(())
    }

    /// Compress and encrypt one object as configured.
    fn prepare(&self, id: ObjectRef, obj: &Object) -> Result<Object> {
        let mut obj = obj.clone();

        if self.options.compress {
            if let Object::Stream { dict, data } = &mut obj {
                if !dict.contains_key("Filter") && !data.is_empty() {
                    let encoded = FlateFilter::new()
                        .with_mode(self.options.flate_mode)
                        .encode(data)?;
                    log::debug!("Compressed stream {}: {} -> {} bytes", id, data.len(), encoded.len());
                    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
                    *data = encoded.into();
                }
            }
        }

        if let Some(handler) = self.security {
            handler.encrypt_object(id, &mut obj)?;
        }
        Ok(obj)
    }
}

/// Classic xref table: object 0 heads the free list, then one subsection per
/// run of consecutive object numbers.
fn write_xref(out: &mut Vec<u8>, offsets: &[(ObjectRef, usize)]) {
    out.extend_from_slice(b"xref\n");

    let mut runs: Vec<(u32, Vec<Option<(u16, usize)>>)> = vec![(0, vec![None])];
    for (id, offset) in offsets {
        let entry = Some((id.gen, *offset));
        match runs.last_mut() {
            Some((start, entries)) if *start + entries.len() as u32 == id.id => entries.push(entry),
            _ => runs.push((id.id, vec![entry])),
        }
    }

    for (start, entries) in runs {
        out.extend_from_slice(format!("{} {}\n", start, entries.len()).as_bytes());
        for entry in entries {
            let line = match entry {
                Some((gen, offset)) => format!("{:010} {:05} n \n", offset, gen),
                None => "0000000000 65535 f \n".to_string(),
            };
            out.extend_from_slice(line.as_bytes());
        }
    }
}
