//! Vault health checks.
//!
//! Doctor never mutates vault state beyond a throwaway write probe in the
//! metadata directory. Checks run in dependency order; a missing config
//! short-circuits since nothing else can be answered without it.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use super::store::VaultStore;
use crate::ports::{identity_available, identity_file_path, CancelToken, Encrypter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    fn ok(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            message: message.into(),
        }
    }

    fn warn(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            message: message.into(),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }
}

/// Health check runner for one vault.
pub struct DoctorService {
    pub store: VaultStore,
    pub encrypter: Arc<dyn Encrypter>,
}

impl DoctorService {
    pub fn new(store: VaultStore, encrypter: Arc<dyn Encrypter>) -> Self {
        Self { store, encrypter }
    }

    /// Run all checks. Always returns a report; individual findings live in
    /// its checks, not in the error channel.
    pub fn run(&self, cancel: &CancelToken, root: &Path) -> DoctorReport {
        let mut report = DoctorReport::default();

        let config = match self.store.load_config(root) {
            Ok(config) => {
                report.checks.push(CheckResult::ok(
                    "config",
                    format!("vault '{}' with {} recipient(s)", config.name, config.recipients.len()),
                ));
                config
            }
            Err(err) => {
                report
                    .checks
                    .push(CheckResult::fail("config", err.to_string()));
                return report;
            }
        };

        match self.store.load_index(root) {
            Ok(index) => report.checks.push(CheckResult::ok(
                "index",
                format!("{} project(s) indexed", index.projects.len()),
            )),
            Err(err) => report
                .checks
                .push(CheckResult::fail("index", err.to_string())),
        }

        match self.encrypter.version(cancel) {
            Ok(version) => report.checks.push(CheckResult::ok("encrypter", version)),
            Err(err) => report
                .checks
                .push(CheckResult::fail("encrypter", err.to_string())),
        }

        if identity_available() {
            let path = identity_file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            report
                .checks
                .push(CheckResult::ok("identity", format!("identity file at {path}")));
        } else {
            report.checks.push(CheckResult::warn(
                "identity",
                "no age identity found; decryption will fail on this machine",
            ));
        }

        report.checks.push(self.check_metadata_writable(root));
        report.checks.push(self.check_decrypt(cancel, root, &config.recipients));
        debug!(checks = report.checks.len(), failed = report.has_failures(), "doctor finished");
        report
    }

    fn check_metadata_writable(&self, root: &Path) -> CheckResult {
        let probe = root
            .join(super::store::METADATA_DIR)
            .join(".doctor-probe");
        match self.store.fs.write(&probe, b"probe", 0o600) {
            Ok(()) => {
                let _ = self.store.fs.remove(&probe);
                CheckResult::ok("metadata", "metadata directory is writable")
            }
            Err(err) => CheckResult::fail("metadata", format!("cannot write metadata: {err}")),
        }
    }

    /// Prove the encrypt/decrypt path works end to end. Prefers a real
    /// payload; falls back to a synthetic round trip on a fresh vault.
    fn check_decrypt(
        &self,
        cancel: &CancelToken,
        root: &Path,
        recipients: &[String],
    ) -> CheckResult {
        let secrets = match self.store.list_secret_files(root) {
            Ok(secrets) => secrets,
            Err(err) => return CheckResult::fail("decrypt", err.to_string()),
        };

        if let Some(path) = secrets.first() {
            let ciphertext = match self.store.fs.read(path) {
                Ok(data) => data,
                Err(err) => return CheckResult::fail("decrypt", err.to_string()),
            };
            return match self.encrypter.decrypt_dotenv(cancel, &ciphertext) {
                Ok(plaintext) => {
                    let _plaintext = Zeroizing::new(plaintext);
                    CheckResult::ok("decrypt", "decrypted an existing payload")
                }
                Err(err) => CheckResult::fail("decrypt", err.to_string()),
            };
        }

        if recipients.is_empty() {
            return CheckResult::warn(
                "decrypt",
                "no payloads and no recipients; add a recipient before storing secrets",
            );
        }

        let sample = b"ENVLOCK_HEALTHCHECK=ok\n";
        let round_trip = self
            .encrypter
            .encrypt_dotenv(cancel, sample, recipients)
            .and_then(|ciphertext| self.encrypter.decrypt_dotenv(cancel, &ciphertext));
        match round_trip {
            Ok(plaintext) if plaintext == sample => {
                CheckResult::ok("decrypt", "round trip against configured recipients")
            }
            Ok(_) => CheckResult::fail("decrypt", "round trip produced different plaintext"),
            Err(err) => CheckResult::fail("decrypt", err.to_string()),
        }
    }
}
