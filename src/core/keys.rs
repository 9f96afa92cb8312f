//! Recipient management and key rotation.
//!
//! Adding or removing a recipient only changes the config; existing
//! ciphertext still targets the old recipient set until `rotate` re-encrypts
//! every payload. Rotation is per-file best-effort: one bad file is
//! reported, the rest still rotate.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::store::VaultStore;
use crate::error::{ConfigError, Result, SecretError};
use crate::ports::{CancelToken, Encrypter};

/// Outcome of a rotation pass over all encrypted payloads.
#[derive(Debug, Default)]
pub struct RotateReport {
    pub total: usize,
    pub rotated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Recipient and rotation operations for one vault.
pub struct KeysService {
    pub store: VaultStore,
    pub encrypter: Arc<dyn Encrypter>,
}

impl KeysService {
    pub fn new(store: VaultStore, encrypter: Arc<dyn Encrypter>) -> Self {
        Self { store, encrypter }
    }

    pub fn list(&self, root: &Path) -> Result<Vec<String>> {
        Ok(self.store.load_config(root)?.recipients)
    }

    /// Add a recipient. Returns false if it was already present.
    pub fn add(&self, root: &Path, recipient: &str) -> Result<bool> {
        let mut config = self.store.load_config(root)?;
        let added = config.add_recipient(recipient)?;
        if added {
            self.store.save_config(root, &config)?;
        }
        Ok(added)
    }

    /// Remove a recipient. Returns false if it was not present. Refuses to
    /// remove the last one; an empty recipient set would brick every
    /// subsequent write.
    pub fn remove(&self, root: &Path, recipient: &str) -> Result<bool> {
        let mut config = self.store.load_config(root)?;
        if config.recipients.len() == 1 && config.recipients[0] == recipient.trim() {
            return Err(ConfigError::NoRecipients.into());
        }
        let removed = config.remove_recipient(recipient)?;
        if removed {
            self.store.save_config(root, &config)?;
        }
        Ok(removed)
    }

    /// Re-encrypt every secret payload and blob for the current recipient
    /// set. Run this after adding or removing a recipient.
    pub fn rotate(&self, cancel: &CancelToken, root: &Path) -> Result<RotateReport> {
        let config = self.store.load_config(root)?;
        if config.recipients.is_empty() {
            return Err(ConfigError::NoRecipients.into());
        }

        let secrets = self.store.list_secret_files(root)?;
        let blobs = self.store.list_blob_files(root)?;
        if secrets.is_empty() && blobs.is_empty() {
            return Err(SecretError::NothingToRotate.into());
        }

        let mut report = RotateReport {
            total: secrets.len() + blobs.len(),
            ..RotateReport::default()
        };
        for path in &secrets {
            self.rotate_one(cancel, path, &config.recipients, false, &mut report);
        }
        for path in &blobs {
            self.rotate_one(cancel, path, &config.recipients, true, &mut report);
        }
        debug!(
            total = report.total,
            rotated = report.rotated,
            failed = report.failed,
            "rotation finished"
        );
        Ok(report)
    }

    fn rotate_one(
        &self,
        cancel: &CancelToken,
        path: &Path,
        recipients: &[String],
        binary: bool,
        report: &mut RotateReport,
    ) {
        match self.reencrypt_file(cancel, path, recipients, binary) {
            Ok(()) => report.rotated += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "rotation failed for file");
                report.failed += 1;
                report.errors.push(format!("{}: {err}", path.display()));
            }
        }
    }

    fn reencrypt_file(
        &self,
        cancel: &CancelToken,
        path: &Path,
        recipients: &[String],
        binary: bool,
    ) -> Result<()> {
        let ciphertext = self.store.fs.read(path)?;
        let plaintext = Zeroizing::new(if binary {
            self.encrypter.decrypt_binary(cancel, &ciphertext)?
        } else {
            self.encrypter.decrypt_dotenv(cancel, &ciphertext)?
        });
        let fresh = if binary {
            self.encrypter.encrypt_binary(cancel, &plaintext, recipients)?
        } else {
            self.encrypter.encrypt_dotenv(cancel, &plaintext, recipients)?
        };
        self.store.write_file_atomic(path, &fresh, 0o600)
    }
}
