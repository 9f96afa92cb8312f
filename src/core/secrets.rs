//! Secret key/value operations on encrypted dotenv payloads.
//!
//! Every mutation follows the same shape: decrypt the env payload, change
//! it in memory, re-encrypt, write the ciphertext atomically, then update
//! the index. A crash between the last two steps leaves a stale index, not
//! a broken vault.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use super::dotenv::{
    parse_dotenv, render_dotenv, render_dotenv_ordered, Dotenv, IssueSeverity,
    is_valid_env_key,
};
use super::document::{parse_dotenv_document, DotenvLine};
use super::store::VaultStore;
use super::validate::validate_identifier;
use crate::error::{ConfigError, DotenvError, Result, SecretError, ValidationError};
use crate::ports::{CancelToken, Clock, Encrypter, Git};

/// How import resolves a key present in both the vault and the incoming
/// file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the vault's value; the incoming one is skipped.
    #[default]
    PreferVault,
    /// Take the incoming file's value.
    PreferFile,
    /// Ask a [`ConflictResolver`] per conflicting key.
    Interactive,
}

/// Called per conflict with (key, vault value, file value); returns the
/// value to keep.
pub type ConflictResolver<'a> = &'a dyn Fn(&str, &str, &str) -> Result<String>;

#[derive(Default)]
pub struct ImportOptions<'a> {
    pub strategy: MergeStrategy,
    pub resolver: Option<ConflictResolver<'a>>,
}

/// Outcome of an import, with parse warnings carried along.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Render keys in lexical order instead of stored insertion order.
    pub no_preserve_order: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Only update keys already present in the target file; never append.
    pub only_existing: bool,
}

/// Result of merging vault values into an existing plaintext env file.
///
/// When `updated` and `added` are both zero the content is unchanged and
/// callers should skip the write entirely.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub content: String,
    pub updated: usize,
    pub added: usize,
    pub warnings: Vec<String>,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        self.updated > 0 || self.added > 0
    }
}

/// Secret operations for one vault.
pub struct SecretService {
    pub store: VaultStore,
    pub encrypter: Arc<dyn Encrypter>,
    pub clock: Arc<dyn Clock>,
}

impl SecretService {
    pub fn new(store: VaultStore, encrypter: Arc<dyn Encrypter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            encrypter,
            clock,
        }
    }

    /// Set one key, creating the env payload if needed.
    pub fn set(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        validate_scope(project, env)?;
        if !is_valid_env_key(key) {
            return Err(ValidationError::InvalidEnvKey(key.to_string()).into());
        }

        let mut dotenv = self.read_env(cancel, root, project, env)?;
        if !dotenv.values.contains_key(key) {
            dotenv.order.push(key.to_string());
        }
        dotenv.values.insert(key.to_string(), value.to_string());
        self.write_env(cancel, root, project, env, &dotenv, true)?;

        let mut index = self.store.load_index(root)?;
        index.set_key(project, env, key, self.clock.now());
        self.store.save_index(root, &index)
    }

    /// Get one key's plaintext value.
    pub fn get(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        key: &str,
    ) -> Result<String> {
        validate_scope(project, env)?;
        let dotenv = self.read_env(cancel, root, project, env)?;
        dotenv
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| SecretError::KeyNotFound(key.to_string()).into())
    }

    /// Remove one key. Removing the last key deletes the env payload file.
    pub fn unset(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        key: &str,
    ) -> Result<()> {
        validate_scope(project, env)?;
        let mut dotenv = self.read_env(cancel, root, project, env)?;
        if dotenv.values.remove(key).is_none() {
            return Err(SecretError::KeyNotFound(key.to_string()).into());
        }
        dotenv.order.retain(|k| k != key);

        if dotenv.values.is_empty() {
            let path = self.store.secret_file_path(root, project, env);
            debug!(path = %path.display(), "removing empty env payload");
            if let Err(err) = self.store.fs.remove(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    return Err(err.into());
                }
            }
        } else {
            self.write_env(cancel, root, project, env, &dotenv, true)?;
        }

        let mut index = self.store.load_index(root)?;
        index.remove_key(project, env, key);
        self.store.save_index(root, &index)
    }

    /// Merge a plaintext dotenv file into the vault.
    ///
    /// Keys are processed in the file's first-seen order so reports and the
    /// resulting key order are deterministic. Error-severity parse issues
    /// abort before anything is decrypted or written.
    pub fn import_env(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        data: &str,
        opts: &ImportOptions,
    ) -> Result<ImportReport> {
        validate_scope(project, env)?;
        let (incoming, issues) = parse_dotenv(data);
        let mut report = ImportReport::default();
        for issue in issues {
            match issue.severity {
                IssueSeverity::Error => {
                    return Err(DotenvError::Parse {
                        line: issue.line,
                        message: issue.message,
                    }
                    .into());
                }
                IssueSeverity::Warning => {
                    report.warnings.push(format!("line {}: {}", issue.line, issue.message));
                }
            }
        }
        if opts.strategy == MergeStrategy::Interactive && opts.resolver.is_none() {
            return Err(SecretError::ResolverRequired.into());
        }

        let config = self.store.load_config(root)?;
        if config.recipients.is_empty() {
            return Err(ConfigError::NoRecipients.into());
        }

        let mut vault = self.read_env(cancel, root, project, env)?;
        let mut changed: Vec<String> = Vec::new();

        for key in &incoming.order {
            let file_value = &incoming.values[key];
            match vault.values.get(key) {
                None => {
                    vault.values.insert(key.clone(), file_value.clone());
                    changed.push(key.clone());
                    report.added += 1;
                }
                Some(vault_value) => {
                    let resolved = match opts.strategy {
                        MergeStrategy::PreferVault => None,
                        MergeStrategy::PreferFile => Some(file_value.clone()),
                        MergeStrategy::Interactive => {
                            let resolver =
                                opts.resolver.ok_or(SecretError::ResolverRequired)?;
                            let picked = resolver(key, vault_value, file_value)?;
                            if &picked == vault_value {
                                None
                            } else {
                                Some(picked)
                            }
                        }
                    };
                    match resolved {
                        Some(value) => {
                            vault.values.insert(key.clone(), value);
                            changed.push(key.clone());
                            report.updated += 1;
                        }
                        None => report.skipped += 1,
                    }
                }
            }
        }

        if changed.is_empty() {
            debug!(project, env, skipped = report.skipped, "import made no changes");
            return Ok(report);
        }

        vault.order = merge_order(&incoming.order, &vault.order, &vault.values);
        self.write_env(cancel, root, project, env, &vault, true)?;

        let now = self.clock.now();
        let mut index = self.store.load_index(root)?;
        for key in &changed {
            index.set_key(project, env, key, now);
        }
        self.store.save_index(root, &index)?;
        debug!(
            project,
            env,
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            "import complete"
        );
        Ok(report)
    }

    /// Render the env as plaintext dotenv text in stored key order.
    pub fn export_env(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
    ) -> Result<String> {
        self.export_env_with_options(cancel, root, project, env, &ExportOptions::default())
    }

    pub fn export_env_with_options(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        opts: &ExportOptions,
    ) -> Result<String> {
        validate_scope(project, env)?;
        let dotenv = self.read_env(cancel, root, project, env)?;
        if opts.no_preserve_order {
            Ok(render_dotenv(&dotenv.values))
        } else {
            Ok(render_dotenv_ordered(&dotenv.values, &dotenv.order))
        }
    }

    /// Merge vault values into an existing plaintext env file, preserving
    /// its comments, blank lines, and key order.
    ///
    /// Every line carrying a vault-known key is updated in place (duplicates
    /// included); keys the file lacks are appended in lexical order unless
    /// `only_existing` is set.
    pub fn apply_env(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        data: &str,
        opts: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        validate_scope(project, env)?;
        let vault = self.read_env(cancel, root, project, env)?;

        let (mut doc, issues) = parse_dotenv_document(data);
        let mut warnings = Vec::new();
        for issue in issues {
            match issue.severity {
                IssueSeverity::Error => {
                    return Err(DotenvError::Parse {
                        line: issue.line,
                        message: issue.message,
                    }
                    .into());
                }
                IssueSeverity::Warning => {
                    warnings.push(format!("line {}: {}", issue.line, issue.message));
                }
            }
        }

        let mut updated = 0;
        for line in &mut doc.lines {
            let DotenvLine::Key { key, value, .. } = line else {
                continue;
            };
            let Some(vault_value) = vault.values.get(key.as_str()) else {
                continue;
            };
            if value != vault_value {
                *value = vault_value.clone();
                updated += 1;
            }
        }

        let mut added = 0;
        if !opts.only_existing {
            let mut missing: Vec<&str> = vault
                .values
                .keys()
                .map(String::as_str)
                .filter(|k| !doc.order.iter().any(|o| o == k))
                .collect();
            missing.sort_unstable();
            for key in missing {
                doc.lines.push(DotenvLine::Key {
                    key: key.to_string(),
                    value: vault.values[key].clone(),
                    comment: None,
                    export: false,
                });
                doc.order.push(key.to_string());
                added += 1;
            }
        }

        cancel.check()?;
        Ok(ApplyOutcome {
            content: doc.render(),
            updated,
            added,
            warnings,
        })
    }

    /// Apply vault values to a plaintext env file on disk.
    ///
    /// The target path goes through the update guardrail first. An
    /// unchanged file is not rewritten, so repeated applies produce no
    /// file churn.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_env_file(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        git: Option<&dyn Git>,
        file_path: &Path,
        allow_git: bool,
        opts: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        let target = super::guard::guard_update_path(git, cancel, root, file_path, allow_git)?;
        let data = self.store.fs.read(&target)?;
        let text = String::from_utf8_lossy(&data).into_owned();

        let outcome = self.apply_env(cancel, root, project, env, &text, opts)?;
        if outcome.changed() {
            debug!(
                path = %target.display(),
                updated = outcome.updated,
                added = outcome.added,
                "rewriting env file"
            );
            self.store
                .write_file_atomic(&target, outcome.content.as_bytes(), 0o600)?;
        }
        Ok(outcome)
    }

    /// Decrypt and parse an env payload. A missing payload file is an empty
    /// env; an unparseable decrypted payload is corruption and fails.
    pub fn read_env(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
    ) -> Result<Dotenv> {
        let path = self.store.secret_file_path(root, project, env);
        let ciphertext = match self.store.fs.read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Dotenv::default());
            }
            Err(err) => return Err(err.into()),
        };

        let plaintext = Zeroizing::new(self.encrypter.decrypt_dotenv(cancel, &ciphertext)?);
        let text = String::from_utf8_lossy(&plaintext);
        let (dotenv, issues) = parse_dotenv(&text);
        if let Some(issue) = issues
            .iter()
            .find(|i| i.severity == IssueSeverity::Error)
        {
            return Err(DotenvError::VaultPayload {
                line: issue.line,
                message: issue.message.clone(),
            }
            .into());
        }
        Ok(dotenv)
    }

    /// Encrypt and atomically write an env payload (mode 0600).
    pub fn write_env(
        &self,
        cancel: &CancelToken,
        root: &Path,
        project: &str,
        env: &str,
        dotenv: &Dotenv,
        preserve_order: bool,
    ) -> Result<()> {
        let config = self.store.load_config(root)?;
        if config.recipients.is_empty() {
            return Err(ConfigError::NoRecipients.into());
        }

        let plaintext = Zeroizing::new(if preserve_order {
            render_dotenv_ordered(&dotenv.values, &dotenv.order).into_bytes()
        } else {
            render_dotenv(&dotenv.values).into_bytes()
        });
        let ciphertext =
            self.encrypter
                .encrypt_dotenv(cancel, &plaintext, &config.recipients)?;

        let path = self.store.secret_file_path(root, project, env);
        if let Some(parent) = path.parent() {
            self.store.fs.mkdir_all(parent)?;
        }
        debug!(path = %path.display(), keys = dotenv.values.len(), "writing env payload");
        self.store.write_file_atomic(&path, &ciphertext, 0o600)
    }
}

/// Merge key orders after an import: incoming file order first, then vault
/// keys the file lacks, then any stragglers in lexical order.
fn merge_order(
    file_order: &[String],
    vault_order: &[String],
    values: &std::collections::HashMap<String, String>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for key in file_order.iter().chain(vault_order.iter()) {
        if values.contains_key(key) && !out.contains(key) {
            out.push(key.clone());
        }
    }
    if out.len() < values.len() {
        let mut missing: Vec<&String> =
            values.keys().filter(|k| !out.contains(k)).collect();
        missing.sort_unstable();
        out.extend(missing.into_iter().cloned());
    }
    out
}

fn validate_scope(project: &str, env: &str) -> Result<()> {
    validate_identifier(project, "project")?;
    validate_identifier(env, "env")
}
