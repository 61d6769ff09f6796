//! File cross-reference sections.
//!
//! Maps object numbers to where their bodies live in the file: a byte
//! offset, or a slot inside an object stream. Supports classic `xref`
//! tables, cross-reference streams (PDF 1.5+), hybrid files that carry
//! both (`/XRefStm`), and `/Prev` chains from incremental updates.

use crate::error::{Error, Result};
use crate::lexer::is_whitespace;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object_at, parse_object_at};
use crate::parser_config::ParserOptions;
use std::collections::{BTreeMap, HashSet};

/// Largest subsection count accepted in a classic table.
const MAX_SUBSECTION_COUNT: u64 = 10_000_000;

/// Trailer keys that describe one section rather than the document.
const SECTION_KEYS: &[&str] = &[
    "Prev",
    "XRefStm",
    "Type",
    "W",
    "Index",
    "Filter",
    "DecodeParms",
    "Length",
];

/// Where to find one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot (type 0 / `f`)
    Free {
        /// Next free object number
        next: u64,
        /// Generation to use if the number is reused
        gen: u16,
    },
    /// Uncompressed object at a byte offset (type 1 / `n`)
    InUse {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object stored in an object stream (type 2)
    Compressed {
        /// Object number of the containing object stream
        stream: u32,
        /// Index of the object within that stream
        index: u32,
    },
}

impl XRefEntry {
    /// Generation number the entry implies. Compressed objects are always gen 0.
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { gen, .. } | XRefEntry::InUse { gen, .. } => *gen,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    /// Whether the entry names a live object.
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// One cross-reference section and its trailer.
#[derive(Debug, Clone, Default)]
pub struct XRefSection {
    /// Entries keyed by object number
    pub entries: BTreeMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams, the stream dictionary)
    pub trailer: Dictionary,
    /// Id of the xref stream object, when the section is one
    pub stream_id: Option<ObjectRef>,
}

impl XRefSection {
    /// `/Prev` offset, if any.
    pub fn prev(&self) -> Option<u64> {
        self.trailer
            .get("Prev")
            .and_then(|o| o.as_integer())
            .and_then(|v| u64::try_from(v).ok())
    }

    /// `/XRefStm` offset of a hybrid file, if any.
    pub fn xref_stream_offset(&self) -> Option<u64> {
        self.trailer
            .get("XRefStm")
            .and_then(|o| o.as_integer())
            .and_then(|v| u64::try_from(v).ok())
    }

    /// Fill free or missing entries from the `/XRefStm` section of the same revision.
    fn merge_hybrid(&mut self, stream: XRefSection) {
        for (num, entry) in stream.entries {
            match self.entries.get(&num) {
                Some(existing) if existing.is_in_use() => {},
                _ => {
                    self.entries.insert(num, entry);
                },
            }
        }
        self.stream_id = self.stream_id.or(stream.stream_id);
    }
}

/// The merged view over every section reachable from `startxref`.
#[derive(Debug, Clone, Default)]
pub struct XRefIndex {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    xref_streams: Vec<ObjectRef>,
    section_count: usize,
}

impl XRefIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an older section. Entries and trailer keys already present win.
    pub fn merge_older(&mut self, section: XRefSection) {
        for (num, entry) in section.entries {
            self.entries.entry(num).or_insert(entry);
        }

        for (key, value) in section.trailer {
            if SECTION_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.trailer.entry(key).or_insert(value);
        }

        if let Some(id) = section.stream_id {
            self.xref_streams.push(id);
        }
        self.section_count += 1;
    }

    /// Look up the entry for an object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// All entries in ascending object-number order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(num, e)| (*num, e))
    }

    /// The merged trailer, without per-section keys.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Ids of every xref stream object encountered.
    pub fn xref_streams(&self) -> &[ObjectRef] {
        &self.xref_streams
    }

    /// Number of sections merged.
    pub fn section_count(&self) -> usize {
        self.section_count
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    const KEYWORD: &[u8] = b"startxref";

    let pos = data
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .ok_or_else(|| Error::Structural("startxref not found".to_string()))?;

    let mut cursor = skip_whitespace(data, pos + KEYWORD.len());
    read_uint(data, &mut cursor)
        .ok_or_else(|| Error::Structural("startxref is not followed by an offset".to_string()))
}

/// Read the section at `offset` and every older section it chains to.
///
/// A `/Prev` or `/XRefStm` offset seen twice is reported as a loop.
pub fn read_xref_chain(data: &[u8], offset: u64, opts: &ParserOptions) -> Result<XRefIndex> {
    let mut index = XRefIndex::new();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut next = Some(offset);

    while let Some(offset) = next {
        if !seen.insert(offset) {
            return Err(Error::Structural(format!(
                "cross-reference chain loops back to offset {}",
                offset
            )));
        }

        let mut section = read_section(data, offset, opts)?;
        log::debug!(
            "Read xref section at {} with {} entries",
            offset,
            section.entries.len()
        );

        if let Some(stm_offset) = section.xref_stream_offset() {
            if !seen.insert(stm_offset) {
                return Err(Error::Structural(format!(
                    "/XRefStm offset {} already visited",
                    stm_offset
                )));
            }
            match read_xref_stream(data, stm_offset, opts) {
                Ok(stream) => section.merge_hybrid(stream),
                Err(e) if !opts.strict => {
                    log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e);
                },
                Err(e) => return Err(e),
            }
        }

        next = section.prev();
        index.merge_older(section);
    }

    if !index.trailer.contains_key("Root") {
        return Err(Error::Structural("trailer has no /Root".to_string()));
    }

    Ok(index)
}

/// Read one section, detecting its format.
pub fn read_section(data: &[u8], offset: u64, opts: &ParserOptions) -> Result<XRefSection> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|o| *o < data.len())
        .ok_or_else(|| {
            Error::Structural(format!("xref offset {} is outside the file", offset))
        })?;

    let pos = skip_whitespace(data, start);
    if data[pos..].starts_with(b"xref") {
        read_classic(data, pos, opts)
    } else if data.get(pos).is_some_and(u8::is_ascii_digit) {
        read_xref_stream(data, offset, opts)
    } else {
        Err(Error::InvalidXref(format!(
            "no xref table or stream at offset {}",
            offset
        )))
    }
}

/// Parse a classic table starting at the `xref` keyword.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn read_classic(data: &[u8], pos: usize, opts: &ParserOptions) -> Result<XRefSection> {
    let mut cursor = pos + b"xref".len();
    let mut section = XRefSection::default();

    loop {
        cursor = skip_whitespace(data, cursor);
        if data[cursor..].starts_with(b"trailer") {
            cursor += b"trailer".len();
            break;
        }

        let start = read_uint(data, &mut cursor)
            .ok_or_else(|| Error::InvalidXref(format!("bad subsection header at {}", cursor)))?;
        cursor = skip_whitespace(data, cursor);
        let count = read_uint(data, &mut cursor)
            .ok_or_else(|| Error::InvalidXref(format!("bad subsection count at {}", cursor)))?;
        if count > MAX_SUBSECTION_COUNT {
            return Err(Error::InvalidXref(format!("subsection count {} exceeds limit", count)));
        }

        for i in 0..count {
            cursor = skip_whitespace(data, cursor);
            let num = u32::try_from(start + i)
                .map_err(|_| Error::InvalidXref("object number out of range".to_string()))?;

            match read_classic_entry(data, &mut cursor) {
                Some(entry) => {
                    section.entries.insert(num, entry);
                },
                None if data[cursor..].starts_with(b"trailer") => {
                    log::warn!("Expected {} entries but found {} before trailer", count, i);
                    break;
                },
                None if opts.strict => {
                    return Err(Error::InvalidXref(format!(
                        "malformed entry for object {} at {}",
                        num, cursor
                    )));
                },
                None => {
                    log::warn!("Malformed xref entry for object {}, treating as free", num);
                    section.entries.insert(num, XRefEntry::Free { next: 0, gen: 65535 });
                    skip_line(data, &mut cursor);
                },
            }
        }
    }

    let (trailer, _) = parse_object_at(data, cursor, opts)?;
    section.trailer = match trailer {
        Object::Dictionary(d) => d,
        other => {
            return Err(Error::Structural(format!(
                "trailer is a {}, not a dictionary",
                other.type_name()
            )))
        },
    };

    Ok(section)
}

/// `offset(10) gen(5) flag`, separated by whitespace.
fn read_classic_entry(data: &[u8], cursor: &mut usize) -> Option<XRefEntry> {
    let mut pos = *cursor;
    let offset = read_uint(data, &mut pos)?;
    pos = skip_whitespace(data, pos);
    let gen = u16::try_from(read_uint(data, &mut pos)?).ok()?;
    pos = skip_whitespace(data, pos);

    let flag = *data.get(pos)?;
    let entry = match flag {
        b'n' | b'N' => XRefEntry::InUse { offset, gen },
        b'f' | b'F' => XRefEntry::Free { next: offset, gen },
        _ => return None,
    };
    *cursor = pos + 1;
    Some(entry)
}

/// Parse a cross-reference stream object at `offset`.
fn read_xref_stream(data: &[u8], offset: u64, opts: &ParserOptions) -> Result<XRefSection> {
    let start = usize::try_from(offset)
        .map_err(|_| Error::Structural(format!("xref stream offset {} out of range", offset)))?;
    let (id, object, _) = parse_indirect_object_at(data, start, opts)?;

    let dict = match &object {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidXref(format!(
                "object at {} is a {}, not an xref stream",
                offset,
                other.type_name()
            )))
        },
    };
    if let Some(t) = dict.get("Type").and_then(|o| o.as_name()) {
        if t != "XRef" {
            return Err(Error::InvalidXref(format!("expected /Type /XRef, got /{}", t)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::InvalidXref("xref stream has no /W".to_string()))?
        .iter()
        .map(|o| o.as_integer().and_then(|v| usize::try_from(v).ok()))
        .collect::<Option<Vec<_>>>()
        .filter(|w| w.len() == 3 && w.iter().all(|v| *v <= 8))
        .ok_or_else(|| Error::InvalidXref("invalid /W array".to_string()))?;
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let record_len = w1 + w2 + w3;
    if record_len == 0 {
        return Err(Error::InvalidXref("/W describes empty records".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidXref("xref stream has no /Size".to_string()))?;

    let ranges: Vec<(u64, u64)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| {
                let start = u64::try_from(pair[0].as_integer()?).ok()?;
                let count = u64::try_from(pair[1].as_integer()?).ok()?;
                Some((start, count))
            })
            .collect(),
        None => vec![(0, size.max(0) as u64)],
    };

    let decoded = object.decode_stream_data_with_limit(opts.max_decompressed_size)?;

    let mut section = XRefSection {
        stream_id: Some(id),
        ..Default::default()
    };
    let mut records = decoded.chunks_exact(record_len);

    'ranges: for (start, count) in ranges {
        for i in 0..count {
            let Some(record) = records.next() else {
                log::warn!("Xref stream {} ends before its /Index ranges do", id);
                break 'ranges;
            };
            let Ok(num) = u32::try_from(start + i) else {
                break 'ranges;
            };

            let kind = if w1 == 0 { 1 } else { read_int(&record[..w1]) };
            let field2 = read_int(&record[w1..w1 + w2]);
            let field3 = read_int(&record[w1 + w2..]);

            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2,
                    gen: field3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2,
                    gen: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    // Unknown types are reserved and read as null references.
                    log::debug!("Xref stream entry type {} for object {} ignored", other, num);
                    continue;
                },
            };
            section.entries.insert(num, entry);
        }
    }

    if let Object::Stream { dict, .. } = object {
        section.trailer = dict;
    }
    Ok(section)
}

/// Read a big-endian integer field.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn skip_whitespace(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() {
        if is_whitespace(data[pos]) {
            pos += 1;
        } else if data[pos] == b'%' {
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
        } else {
            break;
        }
    }
    pos
}

fn skip_line(data: &[u8], pos: &mut usize) {
    while *pos < data.len() && data[*pos] != b'\n' && data[*pos] != b'\r' {
        *pos += 1;
    }
}

fn read_uint(data: &[u8], pos: &mut usize) -> Option<u64> {
    let start = *pos;
    let mut value: u64 = 0;
    while let Some(d) = data.get(*pos).filter(|b| b.is_ascii_digit()) {
        value = value.checked_mul(10)?.checked_add((d - b'0') as u64)?;
        *pos += 1;
    }
    (*pos > start).then_some(value)
}
