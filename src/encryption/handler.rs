//! Security handler state and per-object encryption.

use bytes::Bytes;

use super::algorithms::{self, KeyParams};
use super::{EncryptDict, PasswordValidity, Permissions, SecuritySettings};
use crate::error::{Error, PasswordError, Result};
use crate::object::{Dictionary, Object, ObjectRef};

/// Standard security handler for one document.
///
/// A handler read from a file starts unkeyed; [`validate_password`] derives
/// the file key. A handler built with [`new_standard`] is keyed from the start.
/// Once keyed, [`crypt_object`] transforms strings and stream payloads in
/// place. RC4 is its own inverse, so the same call decrypts on read and
/// encrypts on write.
///
/// [`validate_password`]: SecurityHandler::validate_password
/// [`new_standard`]: SecurityHandler::new_standard
/// [`crypt_object`]: SecurityHandler::crypt_object
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    dict: EncryptDict,
    file_id: Vec<u8>,
    key: Option<Vec<u8>>,
    validity: PasswordValidity,
    encrypt_ref: Option<ObjectRef>,
}

impl SecurityHandler {
    /// Build an unkeyed handler from a document's `/Encrypt` dictionary.
    ///
    /// `file_id` is the first element of the trailer's `/ID` array.
    pub fn from_encrypt_dict(encrypt: &Object, file_id: &[u8]) -> Result<Self> {
        let dict = EncryptDict::from_object(encrypt)?;
        log::info!(
            "Document is encrypted: V {} R {}, {}-bit key",
            dict.version,
            dict.revision,
            dict.key_length * 8
        );

        Ok(Self {
            dict,
            file_id: file_id.to_vec(),
            key: None,
            validity: PasswordValidity::Invalid,
            encrypt_ref: None,
        })
    }

    /// Build a keyed handler for saving with the given passwords.
    pub fn new_standard(settings: &SecuritySettings, file_id: &[u8]) -> Result<Self> {
        let (version, revision, key_length) = settings.level.parameters().ok_or_else(|| {
            Error::UnsupportedEncryption("security level None has no handler".to_string())
        })?;

        let owner_key = algorithms::owner_key(
            &settings.owner_password,
            &settings.user_password,
            revision,
            key_length,
        );
        let permissions = settings.permissions.to_p();

        let params = KeyParams {
            revision,
            key_length,
            owner_key: &owner_key,
            permissions,
            file_id,
            encrypt_metadata: true,
        };
        let key = algorithms::encryption_key(&settings.user_password, &params);
        let user_key = algorithms::user_key(&key, revision, file_id);

        Ok(Self {
            dict: EncryptDict {
                version,
                revision,
                key_length,
                owner_key,
                user_key,
                permissions,
                encrypt_metadata: true,
                identity: false,
            },
            file_id: file_id.to_vec(),
            key: Some(key),
            validity: PasswordValidity::Owner,
            encrypt_ref: None,
        })
    }

    fn params(&self) -> KeyParams<'_> {
        KeyParams {
            revision: self.dict.revision,
            key_length: self.dict.key_length,
            owner_key: &self.dict.owner_key,
            permissions: self.dict.permissions,
            file_id: &self.file_id,
            encrypt_metadata: self.dict.encrypt_metadata,
        }
    }

    /// Check a password, keying the handler on success.
    ///
    /// The owner derivation is tried first, then the user derivation.
    /// `None` is the empty password. A failed check leaves an earlier
    /// successful key in place.
    pub fn validate_password(&mut self, password: Option<&[u8]>) -> PasswordValidity {
        let password = password.unwrap_or_default();
        let params = self.params();

        let (validity, key) =
            if let Some(key) = algorithms::authenticate_owner(password, &self.dict.user_key, &params)
            {
                (PasswordValidity::Owner, Some(key))
            } else if let Some(key) =
                algorithms::authenticate_user(password, &self.dict.user_key, &params)
            {
                (PasswordValidity::User, Some(key))
            } else {
                (PasswordValidity::Invalid, None)
            };

        match key {
            Some(key) => {
                log::info!("Password validated as {:?}", validity);
                self.key = Some(key);
                self.validity = validity;
            },
            None => log::debug!("Password rejected"),
        }
        validity
    }

    /// Like [`validate_password`](Self::validate_password), mapping failure to an error.
    pub fn authenticate(&mut self, password: Option<&[u8]>) -> Result<PasswordValidity> {
        match self.validate_password(password) {
            PasswordValidity::Invalid if password.map_or(true, |p| p.is_empty()) => {
                Err(Error::Password(PasswordError::Required))
            },
            PasswordValidity::Invalid => Err(Error::Password(PasswordError::Invalid)),
            validity => Ok(validity),
        }
    }

    /// Check if a password has validated (or the handler was built for writing).
    pub fn is_authenticated(&self) -> bool {
        self.key.is_some()
    }

    /// Result of the last successful validation, `Invalid` before one.
    pub fn validity(&self) -> PasswordValidity {
        self.validity
    }

    /// Effective permissions. An owner validation grants everything.
    pub fn permissions(&self) -> Permissions {
        match self.validity {
            PasswordValidity::Owner => Permissions::all(),
            _ => Permissions::from_p(self.dict.permissions),
        }
    }

    /// Parsed encryption parameters.
    pub fn encrypt_dict(&self) -> &EncryptDict {
        &self.dict
    }

    /// File identifier the keys are bound to.
    pub fn file_id(&self) -> &[u8] {
        &self.file_id
    }

    /// Object holding the `/Encrypt` dictionary, which is never transformed.
    pub fn encrypt_ref(&self) -> Option<ObjectRef> {
        self.encrypt_ref
    }

    /// Record which object holds the `/Encrypt` dictionary.
    pub fn set_encrypt_ref(&mut self, r: Option<ObjectRef>) {
        self.encrypt_ref = r;
    }

    /// File encryption key, once validated.
    pub fn file_key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// RC4 key for one object.
    pub fn object_key(&self, r: ObjectRef) -> Result<Vec<u8>> {
        let key = self
            .key
            .as_deref()
            .ok_or(Error::Password(PasswordError::Required))?;
        Ok(algorithms::object_key(key, r.id, r.gen))
    }

    /// `/Encrypt` dictionary describing this handler, for the writer.
    pub fn encrypt_dictionary(&self) -> Dictionary {
        let d = &self.dict;
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("Standard"));
        dict.insert("V".to_string(), Object::Integer(d.version as i64));
        dict.insert("R".to_string(), Object::Integer(d.revision as i64));
        dict.insert("Length".to_string(), Object::Integer(d.key_length as i64 * 8));

        if d.version == 4 {
            let mut std_cf = Dictionary::new();
            std_cf.insert("Type".to_string(), Object::name("CryptFilter"));
            let cfm = if d.identity { "None" } else { "V2" };
            std_cf.insert("CFM".to_string(), Object::name(cfm));
            std_cf.insert("Length".to_string(), Object::Integer(d.key_length as i64));
            let mut cf = Dictionary::new();
            cf.insert("StdCF".to_string(), Object::Dictionary(std_cf));
            dict.insert("CF".to_string(), Object::Dictionary(cf));
            dict.insert("StmF".to_string(), Object::name("StdCF"));
            dict.insert("StrF".to_string(), Object::name("StdCF"));
        }

        dict.insert("O".to_string(), Object::String(d.owner_key.clone()));
        dict.insert("U".to_string(), Object::String(d.user_key.clone()));
        dict.insert("P".to_string(), Object::Integer(d.permissions as i64));
        if !d.encrypt_metadata {
            dict.insert("EncryptMetadata".to_string(), Object::Boolean(false));
        }
        dict
    }

    /// Decrypt the body of indirect object `r` in place.
    pub fn decrypt_object(&self, r: ObjectRef, obj: &mut Object) -> Result<()> {
        self.crypt_object(r, obj)
    }

    /// Encrypt the body of indirect object `r` in place.
    pub fn encrypt_object(&self, r: ObjectRef, obj: &mut Object) -> Result<()> {
        self.crypt_object(r, obj)
    }

    /// Apply the object's keystream to every string and stream payload it
    /// contains.
    ///
    /// The `/Encrypt` object, xref streams, and metadata streams when
    /// `/EncryptMetadata` is false are left untouched.
    pub fn crypt_object(&self, r: ObjectRef, obj: &mut Object) -> Result<()> {
        if self.dict.identity || Some(r) == self.encrypt_ref {
            return Ok(());
        }
        match obj.dict_type() {
            Some("XRef") if obj.is_stream() => return Ok(()),
            Some("Metadata") if obj.is_stream() && !self.dict.encrypt_metadata => return Ok(()),
            _ => {},
        }

        let key = self.object_key(r)?;
        crypt_in_place(&key, obj);
        Ok(())
    }
}

fn crypt_in_place(key: &[u8], obj: &mut Object) {
    match obj {
        Object::String(bytes) => *bytes = super::rc4_crypt(key, bytes),
        Object::Array(items) => items.iter_mut().for_each(|item| crypt_in_place(key, item)),
        Object::Dictionary(dict) => dict.values_mut().for_each(|v| crypt_in_place(key, v)),
        Object::Stream { dict, data } => {
            dict.values_mut().for_each(|v| crypt_in_place(key, v));
            *data = Bytes::from(super::rc4_crypt(key, data));
        },
        _ => {},
    }
}
