//! Capability seams for side effects.
//!
//! Every external effect (encryption, git, filesystem, time) sits behind a
//! narrow trait with a production adapter here and in-memory fakes in tests.
//! Services receive these via constructor fields, never globals.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;

mod age;
mod fs;
mod git;

pub use self::age::{identity_available, identity_file_path, AgeEncrypter};
pub use self::fs::OsFileSystem;
pub use self::git::GitCli;

/// Cooperative cancellation token threaded through Encrypter/Git calls.
///
/// Adapters check it before starting work; a cancelled token makes the call
/// fail with [`crate::error::Error::Cancelled`]. No operation defines its
/// own timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail fast if the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(crate::error::Error::Cancelled);
        }
        Ok(())
    }
}

/// Encryption capability.
///
/// Dotenv payloads are text (armored ciphertext); binary blobs stay raw.
/// Decrypt failures must be distinguishable between "no identity configured
/// at all" and "identity present but no recipient matches".
pub trait Encrypter: Send + Sync {
    fn encrypt_dotenv(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>>;

    fn decrypt_dotenv(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>>;

    fn encrypt_binary(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>>;

    fn decrypt_binary(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Backend version string for health checks.
    fn version(&self, cancel: &CancelToken) -> Result<String>;
}

/// Last commit touching a path.
#[derive(Debug, Clone, Default)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub message: String,
    pub time: String,
}

/// Version-control capability, used only for dirty/tracked checks and
/// pull/push. The vault core never interprets repository contents.
pub trait Git: Send + Sync {
    fn is_repo(&self, cancel: &CancelToken, path: &Path) -> Result<bool>;
    fn init_repo(&self, cancel: &CancelToken, path: &Path) -> Result<()>;
    fn top_level(&self, cancel: &CancelToken, path: &Path) -> Result<PathBuf>;
    fn is_path_tracked(&self, cancel: &CancelToken, repo_root: &Path, path: &Path)
        -> Result<bool>;
    fn is_dirty(&self, cancel: &CancelToken, repo_root: &Path) -> Result<bool>;
    fn last_commit_info(
        &self,
        cancel: &CancelToken,
        repo_root: &Path,
        path: &Path,
    ) -> Result<CommitInfo>;
    fn pull(&self, cancel: &CancelToken, repo_root: &Path) -> Result<()>;
    fn push(&self, cancel: &CancelToken, repo_root: &Path) -> Result<()>;
}

/// A single directory entry from [`FileSystem::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Filesystem capability with POSIX-style error semantics: a missing file
/// surfaces as `io::ErrorKind::NotFound`, distinguished from other errors.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
    fn write(&self, path: &Path, data: &[u8], mode: u32) -> std::io::Result<()>;
    fn mkdir_all(&self, path: &Path) -> std::io::Result<()>;
    fn remove(&self, path: &Path) -> std::io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> std::io::Result<bool>;
    fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntry>>;
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;
}

/// Time source, injected for determinism in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_token_trips_once_cancelled() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.check(),
            Err(crate::error::Error::Cancelled)
        ));
    }
}
