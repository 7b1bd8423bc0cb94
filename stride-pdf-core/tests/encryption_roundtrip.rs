//! Password protection: classification, loading, derivation, and
//! permission round trips.

use stride_pdf::{
    Document, EncryptionStrength, MemorySink, PasswordType, PdfError, Permissions,
    SecuritySettings, SaveFlags,
};

fn encrypted_bytes(user: &str, owner: &str, strength: EncryptionStrength) -> Vec<u8> {
    let doc = Document::new();
    doc.insert_page(0, 612.0, 792.0).unwrap();
    doc.set_title("protected document").unwrap();
    doc.set_security_handler(SecuritySettings::new(
        user,
        owner,
        Permissions::PRINT | Permissions::ACCESSIBILITY,
        strength,
    ))
    .unwrap();

    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::empty()).unwrap();
    sink.contents()
}

#[test]
fn password_classification_round_trip() {
    for strength in [EncryptionStrength::Rc4_40bit, EncryptionStrength::Rc4_128bit] {
        let bytes = encrypted_bytes("user-pw", "owner-pw", strength);

        let doc = Document::load_from_memory(bytes.clone(), "user-pw").unwrap();
        assert_eq!(doc.check_password("owner-pw"), PasswordType::Owner);
        assert_eq!(doc.check_password("user-pw"), PasswordType::User);
        assert_eq!(doc.check_password("neither"), PasswordType::Invalid);
        assert!(doc.is_user_password("user-pw"));
        assert!(!doc.is_user_password("owner-pw"));
        assert!(doc.is_owner_password("owner-pw"));
        assert!(!doc.is_owner_password("user-pw"));

        // Both passwords open the document.
        let via_owner = Document::load_from_memory(bytes, "owner-pw").unwrap();
        assert_eq!(via_owner.password_type(), PasswordType::Owner);
        assert_eq!(via_owner.page_count().unwrap(), 1);
    }
}

#[test]
fn wrong_password_is_a_password_error() {
    let bytes = encrypted_bytes("u", "o", EncryptionStrength::Rc4_128bit);
    let err = Document::load_from_memory(bytes, "wrong").unwrap_err();
    assert!(matches!(err, PdfError::Password));
}

#[test]
fn same_string_for_both_passwords_reports_owner() {
    let bytes = encrypted_bytes("shared", "shared", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes, "shared").unwrap();

    // The single-valued classification prefers Owner; the fine-grained
    // checks still expose that the string is also the user password.
    assert_eq!(doc.check_password("shared"), PasswordType::Owner);
    assert!(doc.is_user_password("shared"));
    assert!(doc.is_owner_password("shared"));
}

#[test]
fn user_password_derivable_from_owner_password() {
    let bytes = encrypted_bytes("the-user-secret", "the-owner-secret", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes, "the-owner-secret").unwrap();

    assert_eq!(
        doc.get_user_password("the-owner-secret").unwrap(),
        "the-user-secret"
    );
    assert!(matches!(
        doc.get_user_password("not-the-owner"),
        Err(PdfError::Password)
    ));
}

#[test]
fn strings_are_unreadable_in_the_encrypted_file() {
    let bytes = encrypted_bytes("u", "o", EncryptionStrength::Rc4_128bit);
    // The title was serialized encrypted: its hex form must not appear.
    let hex_title: String = b"protected document"
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect();
    assert!(!String::from_utf8_lossy(&bytes).contains(&hex_title));

    // Decrypted on load.
    let doc = Document::load_from_memory(bytes, "u").unwrap();
    assert_eq!(doc.title().as_deref(), Some("protected document"));
}

#[test]
fn permissions_survive_the_round_trip() {
    let bytes = encrypted_bytes("u", "o", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes, "u").unwrap();

    let perms = doc.permissions();
    assert!(perms.contains(Permissions::PRINT));
    assert!(perms.contains(Permissions::ACCESSIBILITY));
    assert!(!perms.contains(Permissions::MODIFY_CONTENTS));
}

#[test]
fn empty_password_means_no_password() {
    let doc = Document::new();
    doc.insert_page(0, 612.0, 792.0).unwrap();
    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::empty()).unwrap();

    // An unencrypted file loads with the empty password.
    let loaded = Document::load_from_memory(sink.contents(), "").unwrap();
    assert_eq!(loaded.password_type(), PasswordType::NoPassword);
    assert_eq!(loaded.encrypt_type(), stride_pdf::EncryptType::None);
}

#[test]
fn remove_security_saves_plaintext() {
    let bytes = encrypted_bytes("u", "o", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes, "o").unwrap();
    doc.remove_security().unwrap();

    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::empty()).unwrap();

    let plain = Document::load_from_memory(sink.contents(), "").unwrap();
    assert_eq!(plain.encrypt_type(), stride_pdf::EncryptType::None);
    assert_eq!(plain.title().as_deref(), Some("protected document"));
}

#[test]
fn reencrypting_with_new_passwords_takes_effect_on_next_save() {
    let bytes = encrypted_bytes("old-user", "old-owner", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes, "old-owner").unwrap();
    doc.set_security_handler(SecuritySettings::with_passwords("new-user", "new-owner"))
        .unwrap();

    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::empty()).unwrap();
    let saved = sink.contents();

    assert!(matches!(
        Document::load_from_memory(saved.clone(), "old-user"),
        Err(PdfError::Password)
    ));
    let reloaded = Document::load_from_memory(saved, "new-user").unwrap();
    assert_eq!(reloaded.page_count().unwrap(), 1);
}

#[test]
fn encrypted_document_survives_incremental_update() {
    let bytes = encrypted_bytes("u", "o", EncryptionStrength::Rc4_128bit);
    let doc = Document::load_from_memory(bytes.clone(), "u").unwrap();
    doc.insert_page(1, 612.0, 792.0).unwrap();

    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::INCREMENTAL)
        .unwrap();
    let updated = sink.contents();
    assert_eq!(&updated[..bytes.len()], bytes.as_slice());

    let reloaded = Document::load_from_memory(updated, "u").unwrap();
    assert_eq!(reloaded.page_count().unwrap(), 2);
    assert_eq!(reloaded.title().as_deref(), Some("protected document"));
}

#[test]
fn get_user_password_requires_encryption() {
    let doc = Document::new();
    assert!(matches!(
        doc.get_user_password("anything"),
        Err(PdfError::InvalidState(_))
    ));
}
