use salesmart_core::config::EncryptionConfig;
use salesmart_core::credentials::{resolve_credentials, CredentialError, SecretCipher};

#[test]
fn encrypted_secrets_round_trip() {
    let config = EncryptionConfig::default();
    let cipher = SecretCipher::new(&config).expect("cipher");

    let encrypted = cipher.encrypt("AKIAEXAMPLEKEY");
    assert_ne!(encrypted, "AKIAEXAMPLEKEY");
    assert_eq!(cipher.encrypt("AKIAEXAMPLEKEY"), encrypted, "fixed IV is deterministic");
    assert_eq!(cipher.decrypt(&encrypted).expect("decrypt"), "AKIAEXAMPLEKEY");
}

#[test]
fn malformed_ciphertext_is_rejected() {
    let cipher = SecretCipher::new(&EncryptionConfig::default()).expect("cipher");

    assert!(matches!(
        cipher.decrypt("not base64!!"),
        Err(CredentialError::Encoding(_))
    ));
    // Five bytes cannot be a whole number of AES blocks.
    assert!(matches!(
        cipher.decrypt("AAAAAAA="),
        Err(CredentialError::Decrypt)
    ));
}

#[test]
fn iv_must_be_sixteen_bytes() {
    let config = EncryptionConfig {
        iv: "short".into(),
        ..EncryptionConfig::default()
    };
    assert!(matches!(
        SecretCipher::new(&config),
        Err(CredentialError::InvalidIv(5))
    ));
}

#[test]
fn credentials_resolve_from_config() {
    let config = EncryptionConfig::default();
    let cipher = SecretCipher::new(&config).expect("cipher");

    assert!(resolve_credentials(None, Some("secret"), true, &config)
        .expect("resolve")
        .is_none());

    let plain = resolve_credentials(Some("id"), Some("secret"), false, &config)
        .expect("resolve")
        .expect("credentials");
    assert_eq!(plain.secret_access_key, "secret");

    let access = cipher.encrypt("id");
    let secret = cipher.encrypt("secret");
    let decrypted = resolve_credentials(Some(&access), Some(&secret), true, &config)
        .expect("resolve")
        .expect("credentials");
    assert_eq!(decrypted.access_key_id, "id");
    assert_eq!(decrypted.secret_access_key, "secret");
    assert!(!format!("{decrypted:?}").contains("secret\""));
}
