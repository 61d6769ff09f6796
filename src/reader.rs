//! Whole-file loading.
//!
//! [`Reader`] turns the bytes of a PDF file into a [`CrossRefTable`] plus the
//! merged trailer:
//!
//! 1. check the `%PDF-M.m` header and locate `startxref`
//! 2. read the cross-reference chain ([`crate::xref`])
//! 3. set up the security handler and validate a password, if `/Encrypt` is present
//! 4. parse every uncompressed object and decrypt it
//! 5. unpack object streams into top-level objects, then drop the containers
//!    and the xref streams
//!
//! Compaction and renumbering are left to the caller.

use std::collections::BTreeMap;

use crate::encryption::{PasswordRequest, SecurityHandler};
use crate::error::{Error, PasswordError, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object_at;
use crate::parser_config::ParserOptions;
use crate::table::CrossRefTable;
use crate::xref::{find_startxref, read_xref_chain, XRefEntry, XRefIndex};

/// How far into the file the header may start.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Callback asked for another password after a failed validation.
///
/// Returning `None` aborts the open.
pub type PasswordProvider<'a> = dyn FnMut(PasswordRequest) -> Option<Vec<u8>> + 'a;

/// Result of reading a file.
#[derive(Debug)]
pub struct LoadedDocument {
    /// Header version as `(major, minor)`
    pub version: (u8, u8),
    /// Every object that loaded, decrypted
    pub table: CrossRefTable,
    /// Merged trailer without `/Encrypt` or per-section keys
    pub trailer: Dictionary,
    /// The keyed handler, when the file was encrypted
    pub security: Option<SecurityHandler>,
}

/// Loads a complete document from an in-memory file.
pub struct Reader<'a> {
    data: &'a [u8],
    opts: ParserOptions,
}

impl<'a> Reader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8], opts: ParserOptions) -> Self {
        Self { data, opts }
    }

    /// Read the file, validating `password` if it is encrypted.
    ///
    /// When the password fails, `provider` is asked for another one until a
    /// password validates or it returns `None`.
    pub fn read(
        &self,
        password: Option<&[u8]>,
        mut provider: Option<&mut PasswordProvider<'_>>,
    ) -> Result<LoadedDocument> {
        let version = parse_header(self.data)?;
        let startxref = find_startxref(self.data)?;
        let index = read_xref_chain(self.data, startxref, &self.opts)?;
        log::info!(
            "PDF {}.{}: {} xref entries in {} sections",
            version.0,
            version.1,
            index.len(),
            index.section_count()
        );

        let mut trailer = index.trailer().clone();
        let security = match trailer.shift_remove("Encrypt") {
            Some(encrypt) => Some(self.unlock(&index, &trailer, encrypt, password, &mut provider)?),
            None => None,
        };

        let mut table = CrossRefTable::new().with_max_closure_depth(self.opts.max_closure_depth);
        self.load_uncompressed(&index, security.as_ref(), &mut table)?;
        resolve_indirect_lengths(&mut table);
        self.unpack_object_streams(&index, &mut table)?;

        for id in index.xref_streams() {
            table.remove(*id);
        }
        if let Some(r) = security.as_ref().and_then(|s| s.encrypt_ref()) {
            table.remove(r);
        }

        log::info!("Loaded {} objects", table.len());
        Ok(LoadedDocument {
            version,
            table,
            trailer,
            security,
        })
    }

    /// Build the security handler and run the password loop.
    fn unlock(
        &self,
        index: &XRefIndex,
        trailer: &Dictionary,
        encrypt: Object,
        password: Option<&[u8]>,
        provider: &mut Option<&mut PasswordProvider<'_>>,
    ) -> Result<SecurityHandler> {
        let (encrypt_ref, encrypt) = match encrypt {
            Object::Reference(r) => (Some(r), self.load_raw(index, r)?),
            other => (None, other),
        };

        let file_id = trailer
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|ids| ids.first())
            .and_then(|o| o.as_string())
            .map(|s| s.to_vec())
            .unwrap_or_else(|| {
                log::warn!("Encrypted document has no /ID, using an empty file identifier");
                Vec::new()
            });

        let mut handler = SecurityHandler::from_encrypt_dict(&encrypt, &file_id).map_err(|e| {
            log::error!("Cannot set up security handler: {}", e);
            e
        })?;
        handler.set_encrypt_ref(encrypt_ref);

        let mut candidate = password.map(|p| p.to_vec());
        let mut attempt = 0;
        loop {
            attempt += 1;
            if handler.validate_password(candidate.as_deref()).is_valid() {
                return Ok(handler);
            }

            let error = match candidate.as_deref() {
                None | Some([]) => PasswordError::Required,
                Some(_) => PasswordError::Invalid,
            };
            let next = provider
                .as_deref_mut()
                .and_then(|ask| ask(PasswordRequest { attempt, error }));
            match next {
                Some(p) => candidate = Some(p),
                None => {
                    log::error!("No valid password after {} attempt(s)", attempt);
                    return Err(Error::Password(error));
                },
            }
        }
    }

    /// Parse one uncompressed object without decrypting it.
    fn load_raw(&self, index: &XRefIndex, r: ObjectRef) -> Result<Object> {
        match index.get(r.id) {
            Some(XRefEntry::InUse { offset, .. }) => {
                let (_, obj, _) = parse_indirect_object_at(self.data, *offset as usize, &self.opts)?;
                Ok(obj)
            },
            Some(XRefEntry::Compressed { .. }) => Err(Error::Structural(format!(
                "object {} must not be stored in an object stream",
                r
            ))),
            _ => Err(Error::ObjectNotFound(r.id, r.gen)),
        }
    }

    /// Parse and decrypt every type-1 entry.
    fn load_uncompressed(
        &self,
        index: &XRefIndex,
        security: Option<&SecurityHandler>,
        table: &mut CrossRefTable,
    ) -> Result<()> {
        let mut skipped = 0usize;

        for (num, entry) in index.entries() {
            let XRefEntry::InUse { offset, .. } = *entry else {
                continue;
            };
            if num == 0 {
                continue;
            }

            match self.load_one(num, offset, security) {
                Ok((r, obj)) => {
                    log::debug!("Parsed object {} at offset {}", r, offset);
                    table.set(r, obj);
                },
                Err(e) if !self.opts.strict && e.is_recoverable() => {
                    log::warn!("Skipping object {} at offset {}: {}", num, offset, e);
                    skipped += 1;
                },
                Err(e) => {
                    log::error!("Failed to load object {} at offset {}: {}", num, offset, e);
                    return Err(e);
                },
            }
        }

        if skipped > 0 {
            log::info!("Skipped {} malformed objects", skipped);
        }
        Ok(())
    }

    fn load_one(
        &self,
        num: u32,
        offset: u64,
        security: Option<&SecurityHandler>,
    ) -> Result<(ObjectRef, Object)> {
        let start = usize::try_from(offset).map_err(|_| Error::UnexpectedEof)?;
        let (r, mut obj, _) = parse_indirect_object_at(self.data, start, &self.opts)?;
        if r.id != num {
            return Err(Error::ParseError {
                offset: start,
                reason: format!("expected object {}, found {}", num, r),
            });
        }

        if let Some(handler) = security {
            if handler.encrypt_ref() != Some(r) {
                handler.decrypt_object(r, &mut obj)?;
            }
        }
        Ok((r, obj))
    }

    /// Move every type-2 object into the table and drop the containers.
    fn unpack_object_streams(&self, index: &XRefIndex, table: &mut CrossRefTable) -> Result<()> {
        let mut by_stream: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
        for (num, entry) in index.entries() {
            if let XRefEntry::Compressed { stream, index } = *entry {
                by_stream.entry(stream).or_default().push((num, index));
            }
        }

        for (stream_num, members) in by_stream {
            let container_ref = ObjectRef::new(stream_num, 0);
            let unpacked = table
                .get(container_ref)
                .ok_or(Error::ObjectNotFound(stream_num, 0))
                .and_then(|container| parse_object_stream(container, &self.opts));

            let objstm = match unpacked {
                Ok(objstm) => objstm,
                Err(e) if !self.opts.strict && (e.is_recoverable() || is_missing(&e)) => {
                    log::warn!(
                        "Skipping object stream {} ({} objects): {}",
                        stream_num,
                        members.len(),
                        e
                    );
                    continue;
                },
                Err(e) => {
                    log::error!("Failed to unpack object stream {}: {}", stream_num, e);
                    return Err(e);
                },
            };

            for (num, idx) in members {
                let found = objstm
                    .get_indexed(idx as usize, num)
                    .or_else(|| objstm.get(num))
                    .cloned();
                match found {
                    Some(obj) => {
                        table.set(ObjectRef::new(num, 0), obj);
                    },
                    None => log::warn!("Object {} missing from object stream {}", num, stream_num),
                }
            }

            table.remove(container_ref);
            log::debug!("Unpacked object stream {} ({} objects)", stream_num, objstm.len());
        }
        Ok(())
    }
}

fn is_missing(e: &Error) -> bool {
    matches!(e, Error::ObjectNotFound(..) | Error::Structural(_))
}

/// Parse the `%PDF-M.m` header.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    const MARKER: &[u8] = b"%PDF-";

    let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    let start = window
        .windows(MARKER.len())
        .position(|w| w == MARKER)
        .ok_or_else(|| Error::InvalidHeader("no %PDF- marker".to_string()))?;
    if start > 0 {
        log::warn!("Header found at byte {} instead of 0", start);
    }

    let rest = &data[start + MARKER.len()..];
    let version = match rest {
        [major, b'.', minor, ..] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            (major - b'0', minor - b'0')
        },
        _ => {
            let shown: String = rest.iter().take(8).map(|b| *b as char).collect();
            return Err(Error::InvalidHeader(format!("bad version {:?}", shown)));
        },
    };

    if !matches!(version.0, 1 | 2) {
        return Err(Error::UnsupportedVersion(format!("{}.{}", version.0, version.1)));
    }
    Ok(version)
}

/// Trim streams whose `/Length` was an indirect reference to the real length.
///
/// The parser read such streams up to `endstream`; now that the length
/// objects are loaded, the reference is replaced by the integer.
fn resolve_indirect_lengths(table: &mut CrossRefTable) {
    let mut fixes = Vec::new();
    for (id, obj) in table.iter() {
        if let Object::Stream { dict, .. } = obj {
            if let Some(Object::Reference(len_ref)) = dict.get("Length") {
                let length = table.get(*len_ref).and_then(|o| o.as_integer());
                fixes.push((*id, *len_ref, length));
            }
        }
    }

    for (id, len_ref, length) in fixes {
        let Some(Object::Stream { dict, data }) = table.get_mut(id) else {
            continue;
        };
        match length.and_then(|l| usize::try_from(l).ok()) {
            Some(len) if len <= data.len() => {
                *data = data.slice(..len);
                dict.insert("Length".to_string(), Object::Integer(len as i64));
            },
            _ => {
                log::warn!(
                    "Stream {} has unusable /Length {}, keeping {} scanned bytes",
                    id,
                    len_ref,
                    data.len()
                );
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{SecurityLevel, SecuritySettings};
    use crate::filters::{FlateFilter, StreamFilter};

    /// Assemble a classic-xref file from `(id, body)` pairs.
    fn build_pdf(objects: &[(u32, Vec<u8>)], trailer: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = BTreeMap::new();
        for (id, body) in objects {
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let max = offsets.keys().max().copied().unwrap_or(0);
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", max + 1).as_bytes());
        for id in 1..=max {
            match offsets.get(&id) {
                Some(off) => out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes()),
                None => out.extend_from_slice(b"0000000000 00001 f \n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", max + 1, trailer, xref_at)
                .as_bytes(),
        );
        out
    }

    fn body(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn hex(bytes: &[u8]) -> String {
        let digits: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        format!("<{}>", digits)
    }

    fn simple_pdf() -> Vec<u8> {
        build_pdf(
            &[
                (1, body("<< /Type /Catalog /Pages 2 0 R >>")),
                (2, body("<< /Type /Pages /Kids [3 0 R] /Count 1 >>")),
                (3, body("<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>")),
                (4, body("<< /Length 8 >>\nstream\nBT ET q Q\nendstream")),
            ],
            "/Root 1 0 R",
        )
    }

    // ========================================================================
    // Header
    // ========================================================================

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
        assert_eq!(parse_header(b"junk\n%PDF-2.0\n").unwrap(), (2, 0));
        assert!(matches!(parse_header(b"hello"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_header(b"%PDF-x.y"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_header(b"%PDF-3.0"), Err(Error::UnsupportedVersion(_))));
    }

    // ========================================================================
    // Plain files
    // ========================================================================

    #[test]
    fn test_read_simple_file() {
        let data = simple_pdf();
        let doc = Reader::new(&data, ParserOptions::default()).read(None, None).unwrap();

        assert_eq!(doc.version, (1, 4));
        assert_eq!(doc.table.len(), 4);
        assert!(doc.security.is_none());
        assert_eq!(doc.trailer.get("Root"), Some(&Object::Reference(ObjectRef::new(1, 0))));

        let contents = doc.table.get(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(contents.stream_data().map(|d| &d[..]), Some(&b"BT ET q Q"[..]));
    }

    #[test]
    fn test_missing_startxref() {
        let data = b"%PDF-1.4\n1 0 obj\nnull\nendobj\n".to_vec();
        let err = Reader::new(&data, ParserOptions::default()).read(None, None).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_malformed_object_skipped_when_lenient() {
        let data = build_pdf(
            &[
                (1, body("<< /Type /Catalog /Pages 2 0 R >>")),
                (2, body("<< /Type /Pages /Kids [] /Count 0 >>")),
                (3, body("<< /Broken ) >>")),
            ],
            "/Root 1 0 R",
        );

        let doc = Reader::new(&data, ParserOptions::lenient()).read(None, None).unwrap();
        assert_eq!(doc.table.len(), 2);
        assert!(!doc.table.contains(ObjectRef::new(3, 0)));

        assert!(Reader::new(&data, ParserOptions::strict()).read(None, None).is_err());
    }

    #[test]
    fn test_indirect_length_resliced() {
        let data = build_pdf(
            &[
                (1, body("<< /Type /Catalog /Pages 3 0 R >>")),
                (2, body("<< /Length 5 0 R >>\nstream\nabc\nendstream")),
                (3, body("<< /Type /Pages /Kids [] /Count 0 /Extra 2 0 R >>")),
                (5, body("2")),
            ],
            "/Root 1 0 R",
        );
        let doc = Reader::new(&data, ParserOptions::default()).read(None, None).unwrap();

        let stream = doc.table.get(ObjectRef::new(2, 0)).unwrap();
        assert_eq!(stream.stream_data().map(|d| &d[..]), Some(&b"ab"[..]));
        assert_eq!(
            stream.as_dict().and_then(|d| d.get("Length")),
            Some(&Object::Integer(2))
        );
    }

    // ========================================================================
    // Object streams
    // ========================================================================

    #[test]
    fn test_object_stream_unpacked_and_container_removed() {
        let pages = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
        let page = "<< /Type /Page /Parent 2 0 R >>";
        let header = format!("2 0 3 {} ", pages.len() + 1);
        let raw = format!("{}{} {}", header, pages, page);

        let packed = FlateFilter::new().encode(raw.as_bytes()).unwrap();
        let mut container = format!(
            "<< /Type /ObjStm /N 2 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            packed.len()
        )
        .into_bytes();
        container.extend_from_slice(&packed);
        container.extend_from_slice(b"\nendstream");

        // Object 2 and 3 live in object stream 4; the xref stream is object 5.
        let mut out = b"%PDF-1.5\n".to_vec();
        let off1 = out.len();
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let off4 = out.len();
        out.extend_from_slice(b"4 0 obj\n");
        out.extend_from_slice(&container);
        out.extend_from_slice(b"\nendobj\n");
        let off5 = out.len();

        let mut rows = Vec::new();
        rows.extend_from_slice(&[0, 0, 0, 0xFF]);
        rows.extend_from_slice(&[1, (off1 >> 8) as u8, off1 as u8, 0]);
        rows.extend_from_slice(&[2, 0, 4, 0]);
        rows.extend_from_slice(&[2, 0, 4, 1]);
        rows.extend_from_slice(&[1, (off4 >> 8) as u8, off4 as u8, 0]);
        rows.extend_from_slice(&[1, (off5 >> 8) as u8, off5 as u8, 0]);
        out.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /XRef /Size 6 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", off5).as_bytes());

        let doc = Reader::new(&out, ParserOptions::default()).read(None, None).unwrap();
        let refs = doc.table.all_references();
        assert_eq!(
            refs,
            vec![ObjectRef::new(1, 0), ObjectRef::new(2, 0), ObjectRef::new(3, 0)]
        );
        assert_eq!(doc.table.get(ObjectRef::new(2, 0)).and_then(|o| o.dict_type()), Some("Pages"));
        assert_eq!(doc.table.get(ObjectRef::new(3, 0)).and_then(|o| o.dict_type()), Some("Page"));
    }

    // ========================================================================
    // Encryption
    // ========================================================================

    fn encrypted_pdf(level: SecurityLevel) -> Vec<u8> {
        let file_id = b"0123456789ABCDEF";
        let settings = SecuritySettings::new(level, b"user", b"owner");
        let handler = SecurityHandler::new_standard(&settings, file_id).unwrap();
        let encrypt = handler.encrypt_dictionary();

        let mut title = Object::string("Secret title");
        handler.encrypt_object(ObjectRef::new(3, 0), &mut title).unwrap();
        let title = title.as_string().unwrap().to_vec();

        let mut payload = Object::stream(Dictionary::new(), b"0 0 m 10 10 l S".to_vec());
        handler.encrypt_object(ObjectRef::new(4, 0), &mut payload).unwrap();
        let payload = payload.stream_data().unwrap().to_vec();

        let mut stream_body = format!("<< /Length {} >>\nstream\n", payload.len()).into_bytes();
        stream_body.extend_from_slice(&payload);
        stream_body.extend_from_slice(b"\nendstream");

        let encrypt_body = format!(
            "<< /Filter /Standard /V {} /R {} /Length {} /O {} /U {} /P {} >>",
            encrypt.get("V").and_then(|o| o.as_integer()).unwrap(),
            encrypt.get("R").and_then(|o| o.as_integer()).unwrap(),
            encrypt.get("Length").and_then(|o| o.as_integer()).unwrap(),
            hex(encrypt.get("O").and_then(|o| o.as_string()).unwrap()),
            hex(encrypt.get("U").and_then(|o| o.as_string()).unwrap()),
            encrypt.get("P").and_then(|o| o.as_integer()).unwrap(),
        );

        build_pdf(
            &[
                (1, body("<< /Type /Catalog /Pages 2 0 R >>")),
                (2, body("<< /Type /Pages /Kids [] /Count 0 >>")),
                (3, format!("<< /Title {} >>", hex(&title)).into_bytes()),
                (4, stream_body),
                (5, encrypt_body.into_bytes()),
            ],
            &format!(
                "/Root 1 0 R /Info 3 0 R /Encrypt 5 0 R /ID [{} {}]",
                hex(file_id),
                hex(file_id)
            ),
        )
    }

    #[test]
    fn test_encrypted_file_decrypts_with_user_and_owner() {
        for level in [SecurityLevel::Rc4_40, SecurityLevel::Rc4_128] {
            let data = encrypted_pdf(level);
            for password in [&b"user"[..], &b"owner"[..]] {
                let doc = Reader::new(&data, ParserOptions::default())
                    .read(Some(password), None)
                    .unwrap();

                let info = doc.table.get(ObjectRef::new(3, 0)).and_then(|o| o.as_dict()).unwrap();
                assert_eq!(
                    info.get("Title").and_then(|o| o.as_string()),
                    Some(&b"Secret title"[..])
                );
                let stream = doc.table.get(ObjectRef::new(4, 0)).unwrap();
                assert_eq!(stream.stream_data().map(|d| &d[..]), Some(&b"0 0 m 10 10 l S"[..]));

                assert!(!doc.trailer.contains_key("Encrypt"));
                assert!(!doc.table.contains(ObjectRef::new(5, 0)));
                assert!(doc.security.is_some());
            }
        }
    }

    #[test]
    fn test_wrong_password_fails() {
        let data = encrypted_pdf(SecurityLevel::Rc4_128);
        let reader = Reader::new(&data, ParserOptions::default());

        assert!(matches!(
            reader.read(Some(b"wrong"), None),
            Err(Error::Password(PasswordError::Invalid))
        ));
        assert!(matches!(
            reader.read(None, None),
            Err(Error::Password(PasswordError::Required))
        ));
    }

    #[test]
    fn test_password_provider_retries() {
        let data = encrypted_pdf(SecurityLevel::Rc4_40);
        let reader = Reader::new(&data, ParserOptions::default());

        let mut requests = Vec::new();
        let mut answers = vec![b"user".to_vec(), b"also wrong".to_vec()];
        let mut provider = |req: PasswordRequest| {
            requests.push(req);
            answers.pop()
        };
        let doc = reader.read(None, Some(&mut provider)).unwrap();
        assert!(doc.security.is_some());

        assert_eq!(
            requests,
            vec![
                PasswordRequest { attempt: 1, error: PasswordError::Required },
                PasswordRequest { attempt: 2, error: PasswordError::Invalid },
            ]
        );
    }

    #[test]
    fn test_password_provider_abort() {
        let data = encrypted_pdf(SecurityLevel::Rc4_40);
        let mut provider = |_: PasswordRequest| None;
        let err = Reader::new(&data, ParserOptions::default())
            .read(Some(b"nope"), Some(&mut provider))
            .unwrap_err();
        assert!(matches!(err, Error::Password(PasswordError::Invalid)));
    }

    #[test]
    fn test_unsupported_encryption_is_fatal() {
        let data = build_pdf(
            &[
                (1, body("<< /Type /Catalog >>")),
                (2, body("<< /Filter /Standard /V 5 /R 6 /O <00> /U <00> /P -4 >>")),
            ],
            "/Root 1 0 R /Encrypt 2 0 R",
        );
        let err = Reader::new(&data, ParserOptions::default()).read(None, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncryption(_)));
    }
}
