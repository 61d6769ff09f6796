//! PDF object serialization.
//!
//! Turns [`Object`] values back into PDF syntax. Output always re-parses to
//! an equal object.

use crate::object::{Dictionary, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer {
    /// Put dictionary entries on one line
    compact: bool,
}

impl ObjectSerializer {
    /// Create a serializer that writes one dictionary entry per line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Check if compact formatting is on.
    pub fn is_compact(&self) -> bool {
        self.compact
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition: `{id} {gen} obj ... endobj`.
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    /// Append an object to `out`.
    pub fn write_object(&self, out: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { &b"true"[..] } else { b"false" }),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(out, *r),
            Object::String(s) => write_string(out, s),
            Object::Name(n) => write_name(out, n),
            Object::Array(arr) => self.write_array(out, arr),
            Object::Dictionary(dict) => self.write_dictionary(out, dict),
            Object::Stream { dict, data } => self.write_stream(out, dict, data),
            Object::Reference(r) => {
                out.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes())
            },
        }
    }

    fn write_array(&self, out: &mut Vec<u8>, arr: &[Object]) {
        out.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            self.write_object(out, obj);
        }
        out.push(b']');
    }

    /// Entries are written in insertion order.
    fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary) {
        out.extend_from_slice(b"<<");
        for (key, value) in dict {
            if self.compact {
                out.push(b' ');
            } else {
                out.extend_from_slice(b"\n  ");
            }
            write_name(out, key);
            out.push(b' ');
            self.write_object(out, value);
        }
        if self.compact {
            out.extend_from_slice(b" >>");
        } else if dict.is_empty() {
            out.extend_from_slice(b">>");
        } else {
            out.extend_from_slice(b"\n>>");
        }
    }

    /// `/Length` is always rewritten to match `data`.
    fn write_stream(&self, out: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        self.write_dictionary(out, &dict);
        out.extend_from_slice(b"\nstream\n");
        out.extend_from_slice(data);
        out.extend_from_slice(b"\nendstream");
    }
}

/// Write a real in the shortest form that parses back to the same value.
///
/// `f64`'s `Display` never uses an exponent, which PDF syntax lacks.
/// Integral values keep a `.0` so they read back as reals, and `-0` is
/// written as `0.0`.
fn write_real(out: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        log::warn!("Writing non-finite real {} as 0", value);
        out.extend_from_slice(b"0.0");
        return;
    }

    let value = if value == 0.0 { 0.0 } else { value };
    let formatted = value.to_string();

    out.extend_from_slice(formatted.as_bytes());
    if !formatted.contains('.') {
        out.extend_from_slice(b".0");
    }
}

/// Literal syntax `(...)` for printable text, hex `<...>` otherwise.
fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if !is_printable {
        out.push(b'<');
        for byte in data {
            out.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        out.push(b'>');
        return;
    }

    out.push(b'(');
    for &byte in data {
        match byte {
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

/// Names start with `/`; anything outside the regular printable set becomes `#xx`.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for byte in name.bytes() {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(
                byte,
                b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
            );
        if regular {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}
