//! Key derivation for the RC4 standard security handler.
//!
//! ISO 32000-1, Section 7.6.3.3 and 7.6.3.4 (Algorithms 2 through 7).

use md5::{Digest, Md5};

use super::rc4::rc4_crypt;

/// Fixed padding appended to short passwords.
pub(crate) const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Inputs shared by every derivation for one document.
#[derive(Debug, Clone)]
pub(crate) struct KeyParams<'a> {
    pub revision: u32,
    pub key_length: usize,
    pub owner_key: &'a [u8],
    pub permissions: i32,
    pub file_id: &'a [u8],
    pub encrypt_metadata: bool,
}

impl KeyParams<'_> {
    fn key_len(&self) -> usize {
        if self.revision == 2 {
            5
        } else {
            self.key_length.clamp(5, 16)
        }
    }
}

/// Truncate or pad a password to 32 bytes.
pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Re-hash the leading `len` bytes 50 times (R3+).
fn stretch(mut hash: [u8; 16], len: usize) -> [u8; 16] {
    for _ in 0..50 {
        hash = md5(&[&hash[..len]]);
    }
    hash
}

/// RC4 with the key XORed by each round number in turn.
fn rc4_rounds(key: &[u8], data: &[u8], rounds: impl Iterator<Item = u8>) -> Vec<u8> {
    let mut out = data.to_vec();
    let mut round_key = vec![0u8; key.len()];
    for i in rounds {
        for (dst, k) in round_key.iter_mut().zip(key) {
            *dst = k ^ i;
        }
        out = rc4_crypt(&round_key, &out);
    }
    out
}

/// File encryption key from a user password (Algorithm 2).
pub(crate) fn encryption_key(password: &[u8], params: &KeyParams<'_>) -> Vec<u8> {
    let len = params.key_len();
    let padded = pad_password(password);
    let p = params.permissions.to_le_bytes();
    let no_metadata: &[u8] = if params.revision >= 4 && !params.encrypt_metadata {
        &[0xFF; 4]
    } else {
        &[]
    };

    let mut hash = md5(&[&padded[..], params.owner_key, &p[..], params.file_id, no_metadata]);
    if params.revision >= 3 {
        hash = stretch(hash, len);
    }
    hash[..len].to_vec()
}

/// RC4 key derived from the owner password, or the user password when the
/// owner password is empty (Algorithm 3, steps a to d).
fn owner_rc4_key(owner_password: &[u8], revision: u32, key_len: usize) -> Vec<u8> {
    let mut hash = md5(&[&pad_password(owner_password)[..]]);
    if revision >= 3 {
        hash = stretch(hash, key_len);
    }
    hash[..key_len].to_vec()
}

/// `/O` entry (Algorithm 3).
pub(crate) fn owner_key(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let owner_password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key_len = if revision == 2 { 5 } else { key_length.clamp(5, 16) };
    let key = owner_rc4_key(owner_password, revision, key_len);
    let padded_user = pad_password(user_password);

    if revision == 2 {
        rc4_crypt(&key, &padded_user)
    } else {
        rc4_rounds(&key, &padded_user, 0..=19)
    }
}

/// `/U` entry for a file key (Algorithms 4 and 5).
pub(crate) fn user_key(key: &[u8], revision: u32, file_id: &[u8]) -> Vec<u8> {
    if revision == 2 {
        return rc4_crypt(key, &PADDING);
    }
    let hash = md5(&[&PADDING[..], file_id]);
    let mut out = rc4_rounds(key, &hash, 0..=19);
    out.resize(32, 0);
    out
}

/// Check a user password, returning the file key on success (Algorithm 6).
pub(crate) fn authenticate_user(
    password: &[u8],
    stored_user_key: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key = encryption_key(password, params);
    let expected = user_key(&key, params.revision, params.file_id);
    let compared = if params.revision == 2 { 32 } else { 16 };

    if stored_user_key.len() < compared {
        return None;
    }
    constant_time_eq(&stored_user_key[..compared], &expected[..compared]).then_some(key)
}

/// Recover the user password from `/O` with a candidate owner password and
/// check it (Algorithm 7).
pub(crate) fn authenticate_owner(
    password: &[u8],
    stored_user_key: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key_len = params.key_len();
    let key = owner_rc4_key(password, params.revision, key_len);
    let user_password = if params.revision == 2 {
        rc4_crypt(&key, params.owner_key)
    } else {
        rc4_rounds(&key, params.owner_key, (0..=19).rev())
    };
    authenticate_user(&user_password, stored_user_key, params)
}

/// Per-object RC4 key (Algorithm 1).
pub(crate) fn object_key(file_key: &[u8], id: u32, gen: u16) -> Vec<u8> {
    let id_bytes = id.to_le_bytes();
    let gen_bytes = gen.to_le_bytes();
    let hash = md5(&[file_key, &id_bytes[..3], &gen_bytes[..]]);
    let len = (file_key.len() + 5).min(16);
    hash[..len].to_vec()
}

/// Compare without short-circuiting on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
