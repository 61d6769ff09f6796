//! Standard security handler: password classes, permissions and the
//! provider loop, checked against files this crate writes.

use pdf_forge::encryption::{
    PasswordRequest, PasswordValidity, Permissions, SecurityHandler, SecurityLevel,
    SecuritySettings,
};
use pdf_forge::error::PasswordError;
use pdf_forge::{Dictionary, Document, Error, Object, ObjectRef, OpenOptions};

const FILE_ID: &[u8] = b"0123456789abcdef";

fn encrypted_file(level: SecurityLevel, permissions: Permissions) -> Vec<u8> {
    let mut doc = Document::new();
    doc.add_page([0.0, 0.0, 200.0, 200.0], b"(secret text) Tj".to_vec())
        .unwrap();
    doc.set_security(
        SecuritySettings::new(level, b"user", b"owner").with_permissions(permissions),
    );
    doc.to_bytes().unwrap()
}

fn reparsed_handler(settings: &SecuritySettings) -> SecurityHandler {
    let written = SecurityHandler::new_standard(settings, FILE_ID).unwrap();
    let encrypt = Object::Dictionary(written.encrypt_dictionary());
    SecurityHandler::from_encrypt_dict(&encrypt, FILE_ID).unwrap()
}

// ============================================================================
// Handler
// ============================================================================

#[test]
fn test_password_classes() {
    for level in [SecurityLevel::Rc4_40, SecurityLevel::Rc4_128] {
        let settings = SecuritySettings::new(level, b"user", b"owner");
        let mut handler = reparsed_handler(&settings);

        assert_eq!(handler.validate_password(Some(b"wrong")), PasswordValidity::Invalid);
        assert_eq!(handler.validate_password(None), PasswordValidity::Invalid);
        assert!(!handler.is_authenticated());

        assert_eq!(handler.validate_password(Some(b"user")), PasswordValidity::User);
        assert_eq!(handler.validate_password(Some(b"owner")), PasswordValidity::Owner);
        assert!(handler.is_authenticated());
    }
}

#[test]
fn test_empty_user_password_opens_with_none() {
    let settings = SecuritySettings::new(SecurityLevel::Rc4_128, b"", b"owner");
    let mut handler = reparsed_handler(&settings);
    assert_eq!(handler.validate_password(None), PasswordValidity::User);
}

#[test]
fn test_encrypt_then_decrypt_object() {
    let settings = SecuritySettings::new(SecurityLevel::Rc4_128, b"user", b"owner");
    let written = SecurityHandler::new_standard(&settings, FILE_ID).unwrap();
    let mut reader = reparsed_handler(&settings);
    reader.authenticate(Some(b"user")).unwrap();

    let id = ObjectRef::new(7, 0);
    let original = Object::Array(vec![Object::string("hello"), Object::Integer(5)]);
    let mut obj = original.clone();
    written.encrypt_object(id, &mut obj).unwrap();
    assert_ne!(obj, original);

    reader.decrypt_object(id, &mut obj).unwrap();
    assert_eq!(obj, original);

    // Same bytes under another object id decrypt to something else.
    let mut other = original.clone();
    written.encrypt_object(id, &mut other).unwrap();
    reader.decrypt_object(ObjectRef::new(8, 0), &mut other).unwrap();
    assert_ne!(other, original);
}

// ============================================================================
// Documents
// ============================================================================

#[test]
fn test_open_with_user_and_owner_passwords() {
    let permissions = Permissions::PRINT | Permissions::COPY;
    let bytes = encrypted_file(SecurityLevel::Rc4_128, permissions);

    let user = Document::from_bytes_with_options(&bytes, OpenOptions::default().with_password("user"))
        .unwrap();
    assert_eq!(user.security().map(|s| s.validity()), Some(PasswordValidity::User));
    assert!(user.permissions().contains(Permissions::PRINT));
    assert!(!user.permissions().contains(Permissions::MODIFY));
    let page = user.pages().unwrap()[0];
    assert_eq!(user.page_contents(page).unwrap(), b"(secret text) Tj");

    let owner =
        Document::from_bytes_with_options(&bytes, OpenOptions::default().with_password("owner"))
            .unwrap();
    assert_eq!(owner.security().map(|s| s.validity()), Some(PasswordValidity::Owner));
    assert_eq!(owner.permissions(), Permissions::all());
}

#[test]
fn test_wrong_and_missing_passwords() {
    let bytes = encrypted_file(SecurityLevel::Rc4_40, Permissions::all());

    let err = Document::from_bytes_with_options(&bytes, OpenOptions::default().with_password("nope"))
        .unwrap_err();
    assert!(matches!(err, Error::Password(PasswordError::Invalid)));

    let err = Document::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::Password(PasswordError::Required)));
}

#[test]
fn test_provider_is_asked_until_it_gives_up() {
    let bytes = encrypted_file(SecurityLevel::Rc4_128, Permissions::all());
    let mut requests: Vec<PasswordRequest> = Vec::new();

    let result = Document::from_bytes_with_options(
        &bytes,
        OpenOptions::default()
            .with_password("first")
            .with_password_provider(|request| {
                requests.push(request);
                (request.attempt < 3).then(|| b"still wrong".to_vec())
            }),
    );
    assert!(matches!(result, Err(Error::Password(PasswordError::Invalid))));
    assert_eq!(requests.iter().map(|r| r.attempt).collect::<Vec<_>>(), [1, 2, 3]);
    assert!(requests.iter().all(|r| r.error == PasswordError::Invalid));
}

#[test]
fn test_security_level_none_removes_encryption() {
    let bytes = encrypted_file(SecurityLevel::Rc4_128, Permissions::all());
    let mut doc =
        Document::from_bytes_with_options(&bytes, OpenOptions::default().with_password("owner"))
            .unwrap();
    doc.set_security(SecuritySettings::new(SecurityLevel::None, b"", b""));
    let plain = doc.to_bytes().unwrap();

    assert!(!String::from_utf8_lossy(&plain).contains("/Encrypt"));
    let reopened = Document::from_bytes(&plain).unwrap();
    assert!(!reopened.is_encrypted());
    let page = reopened.pages().unwrap()[0];
    assert_eq!(reopened.page_contents(page).unwrap(), b"(secret text) Tj");
}

// ============================================================================
// Known-answer vectors
// ============================================================================

/// Values for owner "owner", user "user", `/P -3904` and the `/ID` below,
/// derived outside this crate with ISO 32000-1 algorithms 1 to 5.
struct KnownAnswer {
    version: i64,
    revision: i64,
    bits: i64,
    owner: &'static str,
    user: &'static str,
    file_key: &'static str,
    object: ObjectRef,
    object_key: &'static str,
    ciphertext: &'static str,
}

const KNOWN_ID: &str = "7A3C9E1F0B5D42A8961E3F7C0D2B6A54";
const KNOWN_PLAINTEXT: &[u8] = b"Hello, encrypted world";

const KNOWN_ANSWERS: [KnownAnswer; 2] = [
    KnownAnswer {
        version: 1,
        revision: 2,
        bits: 40,
        owner: "94E8094419662A774442FB072E3D9F19E9D130EC09A4D0061E78FE920F7AB62F",
        user: "D09CB401FE4CF8E78B68EACE81299244EF4D4373BFDAC6417FB5621319D473A2",
        file_key: "1CCE1F08BC",
        object: ObjectRef { id: 12, gen: 0 },
        object_key: "A419AE2BCCF48BBCB288",
        ciphertext: "E27DFF11CA864EB512830E475793626A75751A29D142",
    },
    KnownAnswer {
        version: 2,
        revision: 3,
        bits: 128,
        owner: "0BA3835F88F90388E74E54584125CE142BE0DE24C6B0D37746E075B891756671",
        user: "BAB62D96DCC3C14FF588BB1D3E47404E00000000000000000000000000000000",
        file_key: "F778C8DB06F565A58E5C81AAB91B5FC8",
        object: ObjectRef { id: 70_000, gen: 2 },
        object_key: "545A952A47426739B05B576FD1AF2A0E",
        ciphertext: "99CEB5A9BC972C5757FB7FC93590ADBBC6995B8FE277",
    },
];

fn hex(text: &str) -> Vec<u8> {
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).unwrap())
        .collect()
}

fn known_handler(vector: &KnownAnswer) -> SecurityHandler {
    let mut dict = Dictionary::new();
    dict.insert("Filter".to_string(), Object::name("Standard"));
    dict.insert("V".to_string(), Object::Integer(vector.version));
    dict.insert("R".to_string(), Object::Integer(vector.revision));
    dict.insert("Length".to_string(), Object::Integer(vector.bits));
    dict.insert("O".to_string(), Object::String(hex(vector.owner)));
    dict.insert("U".to_string(), Object::String(hex(vector.user)));
    dict.insert("P".to_string(), Object::Integer(-3904));
    SecurityHandler::from_encrypt_dict(&Object::Dictionary(dict), &hex(KNOWN_ID)).unwrap()
}

#[test]
fn test_known_vectors_recover_file_key() {
    for vector in &KNOWN_ANSWERS {
        let expected = hex(vector.file_key);

        let mut handler = known_handler(vector);
        assert_eq!(handler.validate_password(Some(b"user")), PasswordValidity::User);
        assert_eq!(handler.file_key(), Some(&expected[..]), "R{} user", vector.revision);

        let mut handler = known_handler(vector);
        assert_eq!(handler.validate_password(Some(b"owner")), PasswordValidity::Owner);
        assert_eq!(handler.file_key(), Some(&expected[..]), "R{} owner", vector.revision);

        let mut handler = known_handler(vector);
        assert_eq!(handler.validate_password(Some(b"User")), PasswordValidity::Invalid);
    }
}

#[test]
fn test_known_vectors_decrypt_string() {
    for vector in &KNOWN_ANSWERS {
        let mut handler = known_handler(vector);
        handler.validate_password(Some(b"user"));

        assert_eq!(handler.object_key(vector.object).unwrap(), hex(vector.object_key));

        let mut obj = Object::String(hex(vector.ciphertext));
        handler.decrypt_object(vector.object, &mut obj).unwrap();
        assert_eq!(obj, Object::String(KNOWN_PLAINTEXT.to_vec()));

        handler.encrypt_object(vector.object, &mut obj).unwrap();
        assert_eq!(obj, Object::String(hex(vector.ciphertext)));
    }
}
