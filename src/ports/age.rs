//! Age encryption adapter.
//!
//! Encrypts dotenv payloads as ASCII-armored age files and binary blobs as
//! raw age streams, using x25519 recipients. Decryption identities load
//! from the file named by `ENVLOCK_AGE_KEY_FILE`, falling back to
//! `~/.config/envlock/keys.txt`.

use std::io::{Read, Write};
use std::path::PathBuf;

use age::x25519;
use tracing::trace;

use super::{CancelToken, Encrypter};
use crate::error::{CipherError, Result};

const KEY_FILE_ENV: &str = "ENVLOCK_AGE_KEY_FILE";

/// Production [`Encrypter`] backed by the `age` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeEncrypter;

/// Resolve the age identity file path.
pub fn identity_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(KEY_FILE_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir().map(|home| home.join(".config").join("envlock").join("keys.txt"))
}

/// Whether at least one identity line exists in the identity file.
///
/// Used to classify decrypt failures: a mismatch against present identities
/// reads very differently from having no identity at all.
pub fn identity_available() -> bool {
    let Some(path) = identity_file_path() else {
        return false;
    };
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return false;
    };
    contents
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'))
}

fn load_identities() -> Result<Vec<x25519::Identity>> {
    let path = identity_file_path().ok_or(CipherError::IdentityNotFound)?;
    let contents = std::fs::read_to_string(&path).map_err(|_| CipherError::IdentityNotFound)?;

    let mut identities = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let identity: x25519::Identity = line
            .parse()
            .map_err(|e: &str| CipherError::Decrypt(format!("invalid identity: {e}")))?;
        identities.push(identity);
    }
    if identities.is_empty() {
        return Err(CipherError::IdentityNotFound.into());
    }
    Ok(identities)
}

fn parse_recipients(recipients: &[String]) -> Result<Vec<x25519::Recipient>> {
    if recipients.is_empty() {
        return Err(CipherError::NoRecipients.into());
    }
    recipients
        .iter()
        .map(|r| {
            r.parse::<x25519::Recipient>()
                .map_err(|_| CipherError::InvalidRecipient(r.clone()).into())
        })
        .collect()
}

fn encrypt(plaintext: &[u8], recipients: &[String], armor: bool) -> Result<Vec<u8>> {
    let parsed = parse_recipients(recipients)?;
    trace!(
        recipients = parsed.len(),
        plaintext_len = plaintext.len(),
        armor,
        "encrypting"
    );

    let encryptor =
        age::Encryptor::with_recipients(parsed.iter().map(|r| r as &dyn age::Recipient))
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

    let mut ciphertext = Vec::new();
    if armor {
        let armored = age::armor::ArmoredWriter::wrap_output(
            &mut ciphertext,
            age::armor::Format::AsciiArmor,
        )
        .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        let mut writer = encryptor
            .wrap_output(armored)
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        let armored = writer
            .finish()
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        armored
            .finish()
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
    } else {
        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;
    }

    trace!(ciphertext_len = ciphertext.len(), "encrypted");
    Ok(ciphertext)
}

fn decrypt(ciphertext: &[u8], armor: bool) -> Result<Vec<u8>> {
    let identities = load_identities()?;
    trace!(ciphertext_len = ciphertext.len(), armor, "decrypting");

    let mut plaintext = Vec::new();
    if armor {
        let reader = age::armor::ArmoredReader::new(ciphertext);
        let decryptor = age::Decryptor::new(reader).map_err(classify_decrypt_error)?;
        let mut stream = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(classify_decrypt_error)?;
        stream
            .read_to_end(&mut plaintext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
    } else {
        let decryptor = age::Decryptor::new(ciphertext).map_err(classify_decrypt_error)?;
        let mut stream = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(classify_decrypt_error)?;
        stream
            .read_to_end(&mut plaintext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
    }

    trace!(plaintext_len = plaintext.len(), "decrypted");
    Ok(plaintext)
}

fn classify_decrypt_error(err: age::DecryptError) -> crate::error::Error {
    match err {
        age::DecryptError::NoMatchingKeys => {
            if identity_available() {
                CipherError::RecipientMismatch.into()
            } else {
                CipherError::IdentityNotFound.into()
            }
        }
        other => CipherError::Decrypt(other.to_string()).into(),
    }
}

impl Encrypter for AgeEncrypter {
    fn encrypt_dotenv(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>> {
        cancel.check()?;
        encrypt(plaintext, recipients, true)
    }

    fn decrypt_dotenv(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>> {
        cancel.check()?;
        decrypt(ciphertext, true)
    }

    fn encrypt_binary(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>> {
        cancel.check()?;
        encrypt(plaintext, recipients, false)
    }

    fn decrypt_binary(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>> {
        cancel.check()?;
        decrypt(ciphertext, false)
    }

    fn version(&self, cancel: &CancelToken) -> Result<String> {
        cancel.check()?;
        Ok("age x25519 (built-in)".to_string())
    }
}
