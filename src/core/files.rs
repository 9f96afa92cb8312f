//! Encrypted binary file attachments.
//!
//! Blobs live next to the dotenv payloads, one ciphertext file per
//! project/env/name. Content metadata (size, digest, sniffed MIME type) is
//! computed at put time and cached in the index; get trusts the cached
//! fields and only recomputes the ones the cache is missing.

use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::index::FileMetadata;
use super::store::VaultStore;
use super::validate::validate_identifier;
use crate::error::{ConfigError, Result, SecretError};
use crate::ports::{CancelToken, Clock, Encrypter};

/// Binary attachment operations for one vault.
pub struct FileService {
    pub store: VaultStore,
    pub encrypter: Arc<dyn Encrypter>,
    pub clock: Arc<dyn Clock>,
}

impl FileService {
    pub fn new(store: VaultStore, encrypter: Arc<dyn Encrypter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            encrypter,
            clock,
        }
    }

    /// Encrypt and store a blob, then record its metadata in the index.
    pub fn put(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        name: &str,
        plaintext: &[u8],
    ) -> Result<FileMetadata> {
        validate_scope(project, env, name)?;
        let config = self.store.load_config(root)?;
        if config.recipients.is_empty() {
            return Err(ConfigError::NoRecipients.into());
        }

        let meta = FileMetadata {
            size: plaintext.len() as u64,
            sha256: hex_digest(plaintext),
            mime: sniff_mime(plaintext).to_string(),
            last_updated: Some(self.clock.now()),
        };

        let ciphertext = self
            .encrypter
            .encrypt_binary(cancel, plaintext, &config.recipients)?;
        let path = self.store.blob_path(root, project, env, name);
        if let Some(parent) = path.parent() {
            self.store.fs.mkdir_all(parent)?;
        }
        debug!(path = %path.display(), size = meta.size, "writing blob");
        self.store.write_file_atomic(&path, &ciphertext, 0o600)?;

        let mut index = self.store.load_index(root)?;
        index.set_file(project, env, name, meta.clone());
        self.store.save_index(root, &index)?;
        Ok(meta)
    }

    /// Decrypt a blob and return its plaintext plus metadata.
    ///
    /// Cached index fields win over recomputed ones; only fields the cache
    /// lacks (empty mime, zero size on non-empty content) are filled in.
    pub fn get(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        name: &str,
    ) -> Result<(Vec<u8>, FileMetadata)> {
        validate_scope(project, env, name)?;
        let path = self.store.blob_path(root, project, env, name);
        let ciphertext = match self.store.fs.read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::FileNotFound(name.to_string()).into());
            }
            Err(err) => return Err(err.into()),
        };
        let plaintext = self.encrypter.decrypt_binary(cancel, &ciphertext)?;

        let index = self.store.load_index(root)?;
        let mut meta = index
            .file_metadata(project, env, name)
            .cloned()
            .unwrap_or_default();
        if meta.size == 0 && !plaintext.is_empty() {
            meta.size = plaintext.len() as u64;
        }
        if meta.sha256.is_empty() {
            meta.sha256 = hex_digest(&plaintext);
        }
        if meta.mime.is_empty() {
            meta.mime = sniff_mime(&plaintext).to_string();
        }
        Ok((plaintext, meta))
    }

    /// Delete a blob and drop it from the index.
    pub fn remove(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        name: &str,
    ) -> Result<()> {
        validate_scope(project, env, name)?;
        cancel.check()?;
        let path = self.store.blob_path(root, project, env, name);
        match self.store.fs.remove(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::FileNotFound(name.to_string()).into());
            }
            Err(err) => return Err(err.into()),
        }

        let mut index = self.store.load_index(root)?;
        index.remove_file(project, env, name);
        self.store.save_index(root, &index)
    }
}

fn validate_scope(project: &str, env: &str, name: &str) -> Result<()> {
    validate_identifier(project, "project")?;
    validate_identifier(env, "env")?;
    validate_identifier(name, "file name")
}

fn hex_digest(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Sniff a MIME type from the first bytes of content.
///
/// Covers the magic numbers that show up in practice for vault attachments
/// (certificates, archives, images); everything decodable as text maps to
/// text/plain and the rest to application/octet-stream.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    const SNIFF_LEN: usize = 512;
    let head = &data[..data.len().min(SNIFF_LEN)];
    if head.is_empty() {
        return "application/octet-stream";
    }

    let magic: &[(&[u8], &'static str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"-----BEGIN ", "application/x-pem-file"),
    ];
    for (prefix, mime) in magic {
        if head.starts_with(prefix) {
            return mime;
        }
    }

    if std::str::from_utf8(head).is_ok()
        && !head
            .iter()
            .any(|&b| b < 0x09 || (0x0e..0x20).contains(&b) || b == 0x7f)
    {
        return "text/plain; charset=utf-8";
    }
    "application/octet-stream"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            hex_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sniffs_common_types() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(sniff_mime(b"%PDF-1.7"), "application/pdf");
        assert_eq!(
            sniff_mime(b"-----BEGIN CERTIFICATE-----"),
            "application/x-pem-file"
        );
        assert_eq!(sniff_mime(b"hello world\n"), "text/plain; charset=utf-8");
        assert_eq!(sniff_mime(&[0u8, 1, 2, 3]), "application/octet-stream");
        assert_eq!(sniff_mime(b""), "application/octet-stream");
    }

    #[test]
    fn file_name_validation_rejects_traversal() {
        assert!(validate_scope("app", "dev", "../../etc/passwd").is_err());
        assert!(validate_scope("app", "dev", "cert.pem").is_ok());
    }
}
