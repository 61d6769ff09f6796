//! PDF standard security handler.
//!
//! Covers the RC4 variants of the standard handler (ISO 32000-1, Section 7.6):
//!
//! - V1 / R2: RC4 with a 40-bit key
//! - V2 / R3: RC4 with a 40 to 128-bit key
//! - V4 / R4: crypt filters, accepted when the default filter is `/V2` or `/None`
//!
//! AES crypt filters and the SHA-256 revisions (R5, R6) are reported as
//! [`Error::UnsupportedEncryption`] rather than guessed at.
//!
//! The handler owns both directions: it decrypts objects as the reader loads
//! them, and the writer uses a handler built by [`SecurityHandler::new_standard`]
//! to encrypt them on save.

use crate::error::{Error, PasswordError, Result};
use crate::object::{Dictionary, Object};

mod algorithms;
mod handler;
mod rc4;

pub use handler::SecurityHandler;
pub use rc4::rc4_crypt;

/// Outcome of checking a candidate password against `/O` and `/U`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordValidity {
    /// Matched the owner password; all permissions are granted
    Owner,
    /// Matched the user password; `/P` applies
    User,
    /// Matched neither
    Invalid,
}

impl PasswordValidity {
    /// Check if the password unlocked the document.
    pub fn is_valid(&self) -> bool {
        !matches!(self, PasswordValidity::Invalid)
    }
}

/// Handed to a password provider after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRequest {
    /// 1-based count of the attempt that just failed
    pub attempt: u32,
    /// Why the last attempt was rejected
    pub error: PasswordError,
}

/// Key strength used when saving with encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    /// Save unencrypted
    #[default]
    None,
    /// RC4, 40-bit key (V1, R2)
    Rc4_40,
    /// RC4, 128-bit key (V2, R3)
    Rc4_128,
}

impl SecurityLevel {
    /// `(V, R, key length in bytes)` for this level.
    pub(crate) fn parameters(&self) -> Option<(u32, u32, usize)> {
        match self {
            SecurityLevel::None => None,
            SecurityLevel::Rc4_40 => Some((1, 2, 5)),
            SecurityLevel::Rc4_128 => Some((2, 3, 16)),
        }
    }
}

/// Passwords and permissions to apply on save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuritySettings {
    /// Password needed to open the document, empty for none
    pub user_password: Vec<u8>,
    /// Password granting full access; the user password is used when empty
    pub owner_password: Vec<u8>,
    /// Cipher strength
    pub level: SecurityLevel,
    /// Rights granted to users who open with the user password
    pub permissions: Permissions,
}

impl SecuritySettings {
    /// Settings for the given level and passwords, granting all permissions.
    pub fn new(level: SecurityLevel, user_password: &[u8], owner_password: &[u8]) -> Self {
        Self {
            user_password: user_password.to_vec(),
            owner_password: owner_password.to_vec(),
            level,
            permissions: Permissions::all(),
        }
    }

    /// Replace the permission set.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

bitflags::bitflags! {
    /// User access permissions (`/P`), ISO 32000-1 Table 22.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Print the document
        const PRINT = 1 << 2;
        /// Modify contents
        const MODIFY = 1 << 3;
        /// Copy or extract text and graphics
        const COPY = 1 << 4;
        /// Add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Fill in form fields (R3+)
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility (R3+)
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        /// Insert, rotate or delete pages (R3+)
        const ASSEMBLE = 1 << 10;
        /// Print at full resolution (R3+)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all()
    }
}

impl Permissions {
    /// Bits that must be set in a written `/P` value.
    const RESERVED_ONES: u32 = 0xFFFF_F0C0;

    /// Interpret a `/P` value, ignoring reserved bits.
    pub fn from_p(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }

    /// `/P` value to write: the flags plus the reserved bits set to 1.
    pub fn to_p(self) -> i32 {
        (self.bits() | Self::RESERVED_ONES) as i32
    }
}

/// Parsed `/Encrypt` dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptDict {
    /// Algorithm version (`/V`)
    pub version: u32,
    /// Handler revision (`/R`)
    pub revision: u32,
    /// Key length in bytes
    pub key_length: usize,
    /// `/O` entry, 32 bytes
    pub owner_key: Vec<u8>,
    /// `/U` entry, 32 bytes
    pub user_key: Vec<u8>,
    /// Raw `/P` value
    pub permissions: i32,
    /// `/EncryptMetadata`, true unless stated otherwise
    pub encrypt_metadata: bool,
    /// V4 with `/StmF`/`/StrF` naming a `/None` crypt filter
    pub identity: bool,
}

impl EncryptDict {
    /// Parse and check an encryption dictionary.
    ///
    /// The dictionary and its `/CF` subdictionary must already be direct
    /// objects.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: obj.type_name().to_string(),
        })?;

        let filter = dict.get("Filter").and_then(|o| o.as_name()).unwrap_or("");
        if filter != "Standard" {
            return Err(Error::UnsupportedEncryption(format!("security handler /{}", filter)));
        }

        let version = int_entry(dict, "V").unwrap_or(0);
        let revision = int_entry(dict, "R")
            .ok_or_else(|| Error::Structural("encryption dictionary has no /R".to_string()))?;

        let supported = matches!((version, revision), (1, 2) | (1, 3) | (2, 3) | (2, 4) | (4, 4));
        if !supported {
            return Err(Error::UnsupportedEncryption(format!("V {} R {}", version, revision)));
        }

        let mut identity = false;
        let key_length = if version == 4 {
            let (len, method_none) = crypt_filter_length(dict)?;
            identity = method_none;
            len
        } else if revision == 2 {
            5
        } else {
            dict.get("Length")
                .and_then(|o| o.as_integer())
                .map(|bits| (bits / 8).clamp(5, 16) as usize)
                .unwrap_or(5)
        };

        let owner_key = string_entry(dict, "O")?;
        let user_key = string_entry(dict, "U")?;
        if owner_key.len() < 32 || user_key.len() < 32 {
            return Err(Error::Structural(format!(
                "/O and /U must be 32 bytes, got {} and {}",
                owner_key.len(),
                user_key.len()
            )));
        }

        let permissions = dict
            .get("P")
            .and_then(|o| o.as_integer())
            .map(|p| p as i32)
            .ok_or_else(|| Error::Structural("encryption dictionary has no /P".to_string()))?;

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(|o| o.as_bool())
            .unwrap_or(true);

        Ok(EncryptDict {
            version,
            revision,
            key_length,
            owner_key: owner_key[..32].to_vec(),
            user_key: user_key[..32].to_vec(),
            permissions,
            encrypt_metadata,
            identity,
        })
    }
}

fn int_entry(dict: &Dictionary, key: &str) -> Option<u32> {
    dict.get(key)
        .and_then(|o| o.as_integer())
        .and_then(|v| u32::try_from(v).ok())
}

fn string_entry(dict: &Dictionary, key: &str) -> Result<Vec<u8>> {
    dict.get(key)
        .and_then(|o| o.as_string())
        .map(|s| s.to_vec())
        .ok_or_else(|| Error::Structural(format!("encryption dictionary has no /{}", key)))
}

/// Key length and identity flag from the V4 default crypt filter.
fn crypt_filter_length(dict: &Dictionary) -> Result<(usize, bool)> {
    let stream_filter = dict.get("StmF").and_then(|o| o.as_name()).unwrap_or("Identity");
    let string_filter = dict.get("StrF").and_then(|o| o.as_name()).unwrap_or("Identity");
    if stream_filter != string_filter {
        return Err(Error::UnsupportedEncryption(format!(
            "different stream (/{}) and string (/{}) crypt filters",
            stream_filter, string_filter
        )));
    }
    if stream_filter == "Identity" {
        return Ok((16, true));
    }

    let filter = dict
        .get("CF")
        .and_then(|o| o.as_dict())
        .and_then(|cf| cf.get(stream_filter))
        .and_then(|o| o.as_dict())
        .ok_or_else(|| {
            Error::Structural(format!("crypt filter /{} is not defined", stream_filter))
        })?;

    let method = filter.get("CFM").and_then(|o| o.as_name()).unwrap_or("None");
    let identity = match method {
        "V2" => false,
        "None" => true,
        other => return Err(Error::UnsupportedEncryption(format!("crypt filter method /{}", other))),
    };

    // Some writers give bytes, others bits.
    let length = match filter.get("Length").and_then(|o| o.as_integer()) {
        Some(n @ 5..=16) => n as usize,
        Some(n) if n > 16 => (n / 8).clamp(5, 16) as usize,
        _ => 16,
    };

    Ok((length, identity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_dict(v: i64, r: i64) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("Standard"));
        dict.insert("V".to_string(), Object::Integer(v));
        dict.insert("R".to_string(), Object::Integer(r));
        dict.insert("O".to_string(), Object::String(vec![1; 32]));
        dict.insert("U".to_string(), Object::String(vec![2; 32]));
        dict.insert("P".to_string(), Object::Integer(-4));
        dict
    }

    fn crypt_filter(cfm: &str, length: Option<i64>) -> Dictionary {
        let mut std_cf = Dictionary::new();
        std_cf.insert("CFM".to_string(), Object::name(cfm));
        if let Some(len) = length {
            std_cf.insert("Length".to_string(), Object::Integer(len));
        }
        let mut cf = Dictionary::new();
        cf.insert("StdCF".to_string(), Object::Dictionary(std_cf));

        let mut dict = base_dict(4, 4);
        dict.insert("CF".to_string(), Object::Dictionary(cf));
        dict.insert("StmF".to_string(), Object::name("StdCF"));
        dict.insert("StrF".to_string(), Object::name("StdCF"));
        dict
    }

    // ========================================================================
    // EncryptDict
    // ========================================================================

    #[test]
    fn test_parse_rc4_40() {
        let parsed = EncryptDict::from_object(&Object::Dictionary(base_dict(1, 2))).unwrap();
        assert_eq!(parsed.key_length, 5);
        assert_eq!(parsed.permissions, -4);
        assert!(parsed.encrypt_metadata);
    }

    #[test]
    fn test_parse_rc4_128_length() {
        let mut dict = base_dict(2, 3);
        dict.insert("Length".to_string(), Object::Integer(128));
        let parsed = EncryptDict::from_object(&Object::Dictionary(dict)).unwrap();
        assert_eq!(parsed.key_length, 16);

        let parsed = EncryptDict::from_object(&Object::Dictionary(base_dict(2, 3))).unwrap();
        assert_eq!(parsed.key_length, 5);
    }

    #[test]
    fn test_parse_v4_crypt_filter() {
        let parsed =
            EncryptDict::from_object(&Object::Dictionary(crypt_filter("V2", Some(128)))).unwrap();
        assert_eq!(parsed.key_length, 16);
        assert!(!parsed.identity);

        let parsed =
            EncryptDict::from_object(&Object::Dictionary(crypt_filter("V2", Some(10)))).unwrap();
        assert_eq!(parsed.key_length, 10);

        let parsed =
            EncryptDict::from_object(&Object::Dictionary(crypt_filter("None", None))).unwrap();
        assert!(parsed.identity);
    }

    #[test]
    fn test_rejects_aes() {
        let err = EncryptDict::from_object(&Object::Dictionary(crypt_filter("AESV2", None)))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncryption(_)));
    }

    #[test]
    fn test_rejects_unknown_versions() {
        for (v, r) in [(3, 3), (5, 5), (5, 6), (1, 5)] {
            let err = EncryptDict::from_object(&Object::Dictionary(base_dict(v, r))).unwrap_err();
            assert!(matches!(err, Error::UnsupportedEncryption(_)), "V {} R {}", v, r);
        }
    }

    #[test]
    fn test_rejects_other_handlers() {
        let mut dict = base_dict(2, 3);
        dict.insert("Filter".to_string(), Object::name("Adobe.PubSec"));
        let err = EncryptDict::from_object(&Object::Dictionary(dict)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncryption(_)));
    }

    #[test]
    fn test_short_keys_rejected() {
        let mut dict = base_dict(1, 2);
        dict.insert("O".to_string(), Object::String(vec![0; 16]));
        assert!(matches!(
            EncryptDict::from_object(&Object::Dictionary(dict)),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn test_encrypt_metadata_flag() {
        let mut dict = crypt_filter("V2", Some(16));
        dict.insert("EncryptMetadata".to_string(), Object::Boolean(false));
        let parsed = EncryptDict::from_object(&Object::Dictionary(dict)).unwrap();
        assert!(!parsed.encrypt_metadata);
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    #[test]
    fn test_permissions_from_p() {
        let perms = Permissions::from_p(-4);
        assert!(perms.contains(Permissions::PRINT | Permissions::COPY));
        assert_eq!(perms, Permissions::all());

        let perms = Permissions::from_p(0xFFFF_F0C4_u32 as i32);
        assert_eq!(perms, Permissions::PRINT);
    }

    #[test]
    fn test_permissions_to_p() {
        assert_eq!(Permissions::empty().to_p(), 0xFFFF_F0C0_u32 as i32);
        assert_eq!(Permissions::all().to_p(), -4);
        let p = (Permissions::PRINT | Permissions::ASSEMBLE).to_p();
        assert_eq!(Permissions::from_p(p), Permissions::PRINT | Permissions::ASSEMBLE);
    }

    #[test]
    fn test_security_level_parameters() {
        assert_eq!(SecurityLevel::None.parameters(), None);
        assert_eq!(SecurityLevel::Rc4_40.parameters(), Some((1, 2, 5)));
        assert_eq!(SecurityLevel::Rc4_128.parameters(), Some((2, 3, 16)));
    }
}
