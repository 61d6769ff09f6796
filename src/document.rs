//! PDF document model.
//!
//! [`Document`] owns the object table and trailer of one file. It opens
//! files through [`Reader`], optionally compacts and renumbers them, and saves
//! them through [`PdfWriter`].

use crate::content::{parse_content_with, ContentObject};
use crate::encryption::{Permissions, SecurityHandler, SecurityLevel, SecuritySettings};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParserOptions;
use crate::reader::{PasswordProvider, Reader};
use crate::table::CrossRefTable;
use crate::writer::{PdfWriter, WriterOptions};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Version given to documents created from scratch.
const NEW_DOCUMENT_VERSION: (u8, u8) = (1, 7);

/// What to do with the object graph after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Drop unreachable objects and renumber the rest `1..=N`
    #[default]
    Modify,
    /// Drop unreachable objects, keep numbering
    Import,
    /// Keep the table exactly as read
    ReadOnly,
}

/// Options for opening a document.
pub struct OpenOptions<'a> {
    /// Post-load pass
    pub mode: OpenMode,
    /// First password to try on encrypted files
    pub password: Option<Vec<u8>>,
    /// Asked for another password after each failed attempt
    pub password_provider: Option<Box<PasswordProvider<'a>>>,
    /// Parser limits and strictness
    pub parser: ParserOptions,
}

impl Default for OpenOptions<'_> {
    fn default() -> Self {
        Self {
            mode: OpenMode::default(),
            password: None,
            password_provider: None,
            parser: ParserOptions::default(),
        }
    }
}

impl std::fmt::Debug for OpenOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("mode", &self.mode)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_provider", &self.password_provider.is_some())
            .field("parser", &self.parser)
            .finish()
    }
}

impl<'a> OpenOptions<'a> {
    /// Set the post-load pass.
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the first password to try.
    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the password callback.
    pub fn with_password_provider(
        mut self,
        provider: impl FnMut(crate::encryption::PasswordRequest) -> Option<Vec<u8>> + 'a,
    ) -> Self {
        self.password_provider = Some(Box::new(provider));
        self
    }

    /// Set parser options.
    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }
}

/// An in-memory PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_forge::Document;
///
/// let mut doc = Document::open("sample.pdf")?;
/// println!("PDF {}.{}, {} pages", doc.version().0, doc.version().1, doc.pages()?.len());
/// doc.save("copy.pdf")?;
/// # Ok::<(), pdf_forge::Error>(())
/// ```
pub struct Document {
    version: (u8, u8),
    table: CrossRefTable,
    trailer: Dictionary,
    /// Handler the file was opened with
    security: Option<SecurityHandler>,
    /// Settings requested for the next save
    pending_security: Option<SecuritySettings>,
    parser: ParserOptions,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("objects", &self.table.len())
            .field("encrypted", &self.security.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document: a catalog, an empty page tree and an
    /// information dictionary.
    pub fn new() -> Self {
        let mut table = CrossRefTable::new();

        let mut pages = Dictionary::new();
        pages.insert("Type".to_string(), Object::name("Pages"));
        pages.insert("Kids".to_string(), Object::Array(Vec::new()));
        pages.insert("Count".to_string(), Object::Integer(0));
        let pages = table.add(Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.insert("Type".to_string(), Object::name("Catalog"));
        catalog.insert("Pages".to_string(), Object::Reference(pages));
        let catalog = table.add(Object::Dictionary(catalog));

        let mut info = Dictionary::new();
        info.insert("Producer".to_string(), Object::string(crate::NAME));
        info.insert("CreationDate".to_string(), Object::string(pdf_date(Utc::now())));
        let info = table.add(Object::Dictionary(info));

        let mut trailer = Dictionary::new();
        trailer.insert("Root".to_string(), Object::Reference(catalog));
        trailer.insert("Info".to_string(), Object::Reference(info));

        Self {
            version: NEW_DOCUMENT_VERSION,
            table,
            trailer,
            security: None,
            pending_security: None,
            parser: ParserOptions::default(),
        }
    }

    /// Open a file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, OpenOptions::default())
    }

    /// Open an encrypted file with a password.
    pub fn open_with_password(path: impl AsRef<Path>, password: &[u8]) -> Result<Self> {
        Self::open_with_options(path, OpenOptions::default().with_password(password))
    }

    /// Open a file.
    pub fn open_with_options(path: impl AsRef<Path>, options: OpenOptions<'_>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            log::error!("Cannot read {}: {}", path.display(), e);
            e
        })?;
        Self::from_bytes_with_options(&data, options)
    }

    /// Load a document from file bytes with default options.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, OpenOptions::default())
    }

    /// Load a document from file bytes.
    pub fn from_bytes_with_options(data: &[u8], mut options: OpenOptions<'_>) -> Result<Self> {
        let loaded = Reader::new(data, options.parser)
            .read(options.password.as_deref(), options.password_provider.as_deref_mut())?;

        let mut security = loaded.security;
        // The reader dropped the encrypt object; its id means nothing now.
        if let Some(handler) = security.as_mut() {
            handler.set_encrypt_ref(None);
        }

        let mut doc = Self {
            version: loaded.version,
            table: loaded.table,
            trailer: loaded.trailer,
            security,
            pending_security: None,
            parser: options.parser,
        };

        match options.mode {
            OpenMode::Modify => {
                doc.compact();
                doc.renumber();
            },
            OpenMode::Import => {
                doc.compact();
            },
            OpenMode::ReadOnly => {},
        }
        Ok(doc)
    }

    /// Header version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Change the version written on save.
    pub fn set_version(&mut self, major: u8, minor: u8) {
        self.version = (major, minor);
    }

    /// The object table.
    pub fn table(&self) -> &CrossRefTable {
        &self.table
    }

    /// Mutable access to the object table.
    pub fn table_mut(&mut self) -> &mut CrossRefTable {
        &mut self.table
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Mutable access to the trailer dictionary.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Look up an object by id.
    pub fn get(&self, id: ObjectRef) -> Option<&Object> {
        self.table.get(id)
    }

    /// Follow a reference, or return a direct object as is.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        self.table.resolve(obj)
    }

    /// Add an object under a fresh id.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        self.table.add(obj)
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| Error::Structural("trailer has no /Root".to_string()))?;
        self.dict_at(root, "catalog")
    }

    /// Whether the file was encrypted when opened.
    pub fn is_encrypted(&self) -> bool {
        self.security.is_some()
    }

    /// Handler the document was opened with.
    pub fn security(&self) -> Option<&SecurityHandler> {
        self.security.as_ref()
    }

    /// Rights granted by the password used to open the file.
    pub fn permissions(&self) -> Permissions {
        self.security
            .as_ref()
            .map_or(Permissions::all(), |s| s.permissions())
    }

    /// Encrypt the next save with `settings`. [`SecurityLevel::None`] saves
    /// without encryption.
    pub fn set_security(&mut self, settings: SecuritySettings) {
        self.pending_security = Some(settings);
    }

    /// Ids referenced directly from the trailer.
    fn trailer_roots(&self) -> Vec<ObjectRef> {
        let mut roots = Vec::new();
        for value in self.trailer.values() {
            value.for_each_reference(&mut |r| roots.push(r));
        }
        roots
    }

    /// Drop objects unreachable from the trailer. Returns how many were removed.
    pub fn compact(&mut self) -> usize {
        let roots = self.trailer_roots();
        self.table.compact(&roots)
    }

    /// Renumber every object `1..=N` in reachability order, rewriting the
    /// trailer too. Returns the old-to-new id map.
    pub fn renumber(&mut self) -> HashMap<ObjectRef, ObjectRef> {
        let mut roots = Object::Dictionary(std::mem::take(&mut self.trailer));
        let map = self.table.renumber(&mut roots);
        if let Object::Dictionary(trailer) = roots {
            self.trailer = trailer;
        }
        map
    }

    // ========================================================================
    // Pages
    // ========================================================================

    /// Page ids in document order.
    ///
    /// Walks `/Kids` from the catalog's `/Pages`. A node reached twice is
    /// skipped, so cyclic trees terminate.
    pub fn pages(&self) -> Result<Vec<ObjectRef>> {
        let root = self
            .catalog()?
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::Structural("catalog has no /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                log::warn!("Page tree visits {} twice, skipping", id);
                continue;
            }
            let Some(node) = self.table.get(id).and_then(|o| o.as_dict()) else {
                log::warn!("Page tree node {} is missing or not a dictionary", id);
                continue;
            };

            let kids = node.get("Kids").and_then(|k| self.table.resolve(k));
            match (node.get("Type").and_then(|t| t.as_name()), kids) {
                (Some("Page"), _) | (None, None) => pages.push(id),
                (_, Some(Object::Array(kids))) => {
                    // Reverse so the first kid is visited first.
                    stack.extend(kids.iter().rev().filter_map(|k| k.as_reference()));
                },
                (other, _) => {
                    log::warn!("Page tree node {} has type {:?} and no /Kids", id, other);
                },
            }
        }
        Ok(pages)
    }

    /// Append a page with the given media box and content stream.
    pub fn add_page(&mut self, media_box: [f64; 4], content: impl Into<Vec<u8>>) -> Result<ObjectRef> {
        let tree = self
            .catalog()?
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::Structural("catalog has no /Pages reference".to_string()))?;

        let contents = self.table.add(Object::stream(Dictionary::new(), content.into()));

        let mut page = Dictionary::new();
        page.insert("Type".to_string(), Object::name("Page"));
        page.insert("Parent".to_string(), Object::Reference(tree));
        page.insert(
            "MediaBox".to_string(),
            Object::Array(media_box.iter().map(|v| Object::Real(*v)).collect()),
        );
        page.insert("Contents".to_string(), Object::Reference(contents));
        let page = self.table.add(Object::Dictionary(page));

        let node = self
            .table
            .get_mut(tree)
            .and_then(|o| o.as_dict_mut())
            .ok_or(Error::ObjectNotFound(tree.id, tree.gen))?;
        match node.entry("Kids".to_string()).or_insert_with(|| Object::Array(Vec::new())) {
            Object::Array(kids) => kids.push(Object::Reference(page)),
            other => *other = Object::Array(vec![Object::Reference(page)]),
        }
        let count = node.get("Count").and_then(|c| c.as_integer()).unwrap_or(0);
        node.insert("Count".to_string(), Object::Integer(count + 1));

        Ok(page)
    }

    /// Decoded `/Contents` of a page. Multiple streams are joined with a
    /// newline. A page without contents yields no bytes.
    pub fn page_contents(&self, page: ObjectRef) -> Result<Vec<u8>> {
        let page_obj = Object::Reference(page);
        let page_dict = self.dict_at(&page_obj, "page")?;

        let parts: Vec<&Object> = match page_dict.get("Contents").and_then(|c| self.table.resolve(c)) {
            None | Some(Object::Null) => return Ok(Vec::new()),
            Some(Object::Array(items)) => items.iter().collect(),
            Some(single) => vec![single],
        };

        let mut out = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            let stream = self.table.resolve(part).ok_or_else(|| match part {
                Object::Reference(r) => Error::ObjectNotFound(r.id, r.gen),
                _ => Error::Structural("unresolvable page content".to_string()),
            })?;
            if !stream.is_stream() {
                return Err(Error::InvalidObjectType {
                    expected: "Stream".to_string(),
                    found: stream.type_name().to_string(),
                });
            }
            if i > 0 {
                out.push(b'\n');
            }
            out.extend(stream.decode_stream_data_with_limit(self.parser.max_decompressed_size)?);
        }
        Ok(out)
    }

    /// Parsed content of a page.
    pub fn page_operations(&self, page: ObjectRef) -> Result<Vec<ContentObject>> {
        let data = self.page_contents(page)?;
        parse_content_with(&data, &self.parser)
    }

    // ========================================================================
    // Document information
    // ========================================================================

    /// The `/Info` dictionary, if any.
    pub fn info(&self) -> Option<&Dictionary> {
        self.trailer
            .get("Info")
            .and_then(|i| self.table.resolve(i))
            .and_then(|i| i.as_dict())
    }

    /// Set one `/Info` entry, creating the dictionary when needed.
    pub fn set_info(&mut self, key: &str, value: Object) {
        let info_ref = match self.trailer.get("Info").cloned() {
            Some(Object::Reference(r)) if self.table.contains(r) => r,
            existing => {
                let initial = match existing {
                    Some(Object::Dictionary(dict)) => dict,
                    _ => Dictionary::new(),
                };
                let r = self.table.add(Object::Dictionary(initial));
                self.trailer.insert("Info".to_string(), Object::Reference(r));
                r
            },
        };
        if let Some(info) = self.table.get_mut(info_ref).and_then(|o| o.as_dict_mut()) {
            info.insert(key.to_string(), value);
        }
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Save to a file with default writer options.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_options(path, &WriterOptions::default())
    }

    /// Save to a file.
    pub fn save_with_options(&mut self, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
        let bytes = self.to_bytes_with_options(options)?;
        std::fs::write(path.as_ref(), bytes)?;
        log::info!("Saved {}", path.as_ref().display());
        Ok(())
    }

    /// Serialize with default writer options.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.to_bytes_with_options(&WriterOptions::default())
    }

    /// Serialize the document.
    ///
    /// Fills in a missing `/ID` and stamps `/ModDate` when there is an
    /// `/Info` dictionary. An encrypted document is written with its own
    /// handler unless [`set_security`](Self::set_security) asked otherwise.
    pub fn to_bytes_with_options(&mut self, options: &WriterOptions) -> Result<Vec<u8>> {
        if self.info().is_some() {
            self.set_info("ModDate", Object::string(pdf_date(Utc::now())));
        }

        let handler = match self.pending_security.clone() {
            Some(settings) if settings.level == SecurityLevel::None => {
                self.ensure_file_id(None);
                None
            },
            Some(settings) => {
                let file_id = self.ensure_file_id(None);
                Some(SecurityHandler::new_standard(&settings, &file_id)?)
            },
            None => match self.security.take() {
                Some(existing) => {
                    self.ensure_file_id(Some(existing.file_id()));
                    Some(existing)
                },
                None => {
                    self.ensure_file_id(None);
                    None
                },
            },
        };

        let writer = PdfWriter::new(options.clone());
        let result = match &handler {
            Some(h) => writer.with_security(h).to_bytes(&self.table, &self.trailer, self.version),
            None => writer.to_bytes(&self.table, &self.trailer, self.version),
        };

        if self.pending_security.is_none() {
            self.security = handler;
        }
        result
    }

    /// First `/ID` string, creating the pair when absent.
    fn ensure_file_id(&mut self, preferred: Option<&[u8]>) -> Vec<u8> {
        let existing = self
            .trailer
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|ids| ids.first())
            .and_then(|o| o.as_string())
            .map(|s| s.to_vec());
        if let Some(id) = existing {
            return id;
        }

        let id = match preferred {
            Some(id) => id.to_vec(),
            None => uuid::Uuid::new_v4().as_bytes().to_vec(),
        };
        self.trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(id.clone()), Object::String(id.clone())]),
        );
        log::debug!("Generated file identifier");
        id
    }

    fn dict_at<'a>(&'a self, obj: &'a Object, what: &str) -> Result<&'a Dictionary> {
        let resolved = self.table.resolve(obj).ok_or_else(|| match obj {
            Object::Reference(r) => Error::ObjectNotFound(r.id, r.gen),
            _ => Error::Structural(format!("{} is not resolvable", what)),
        })?;
        resolved.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: resolved.type_name().to_string(),
        })
    }
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSS+00'00'`).
pub fn pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
