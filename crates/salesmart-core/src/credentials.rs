//! Symmetric decryption of object-store credentials kept encrypted at rest.
//!
//! AES-256-CBC with PKCS#7 padding; the key is the first 32 bytes of a
//! PBKDF2-HMAC-SHA512 derivation over the configured passphrase and salt.
//! Ciphertext travels as standard base64.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::Sha512;
use thiserror::Error;

use crate::config::EncryptionConfig;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const PBKDF2_ROUNDS: u32 = 1000;
const DERIVED_LEN: usize = 64;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("initialization vector must be exactly 16 bytes, got {0}")]
    InvalidIv(usize),
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext could not be decrypted (wrong key or corrupted value)")]
    Decrypt,
    #[error("decrypted credential is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    pub fn new(config: &EncryptionConfig) -> Result<Self, CredentialError> {
        let iv: [u8; IV_LEN] = config
            .iv
            .as_bytes()
            .try_into()
            .map_err(|_| CredentialError::InvalidIv(config.iv.len()))?;

        let mut derived = [0u8; DERIVED_LEN];
        pbkdf2::pbkdf2_hmac::<Sha512>(
            config.key.as_bytes(),
            config.salt.as_bytes(),
            PBKDF2_ROUNDS,
            &mut derived,
        );

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&derived[..KEY_LEN]);

        Ok(Self { key, iv })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        STANDARD.encode(ciphertext)
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CredentialError> {
        let ciphertext = STANDARD.decode(encoded.trim())?;
        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CredentialError::Decrypt)?;
        Ok(String::from_utf8(plaintext)?)
    }
}

/// Access/secret key pair ready for client construction.
#[derive(Clone)]
pub struct ResolvedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Decrypt the configured key pair, or `None` when either half is absent
/// (the AWS default provider chain then applies).
pub fn resolve_credentials(
    access_key: Option<&str>,
    secret_key: Option<&str>,
    encrypted: bool,
    encryption: &EncryptionConfig,
) -> Result<Option<ResolvedCredentials>, CredentialError> {
    let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
        return Ok(None);
    };

    if !encrypted {
        return Ok(Some(ResolvedCredentials {
            access_key_id: access_key.to_string(),
            secret_access_key: secret_key.to_string(),
        }));
    }

    let cipher = SecretCipher::new(encryption)?;
    Ok(Some(ResolvedCredentials {
        access_key_id: cipher.decrypt(access_key)?,
        secret_access_key: cipher.decrypt(secret_key)?,
    }))
}
