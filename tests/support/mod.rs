//! Test support utilities for envlock integration tests.
//!
//! Provides an isolated vault fixture wired with deterministic fakes for
//! encryption, time, and git, so tests can run in parallel without keys or
//! a git binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use envlock::core::files::FileService;
use envlock::core::init::{InitOptions, InitService};
use envlock::core::keys::KeysService;
use envlock::core::listing::ListingService;
use envlock::core::secrets::SecretService;
use envlock::core::store::VaultStore;
use envlock::error::{CipherError, Result};
use envlock::ports::{
    CancelToken, Clock, CommitInfo, Encrypter, FileSystem, Git, OsFileSystem,
};

const DOTENV_PREFIX: &str = "ENC:";
const BINARY_PREFIX: &str = "ENCB:";

/// Install a tracing subscriber once, honoring `RUST_LOG`. Call from tests
/// that need log output while debugging.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Reversible fake cipher: `ENC:<base64>` for dotenv payloads and
/// `ENCB:<base64>` for binary blobs. Records every recipient set used for
/// encryption so tests can assert on rotation targets.
#[derive(Default)]
pub struct FakeEncrypter {
    pub encrypt_recipients: Mutex<Vec<Vec<String>>>,
}

impl FakeEncrypter {
    fn seal(&self, prefix: &str, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>> {
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }
        self.encrypt_recipients
            .lock()
            .unwrap()
            .push(recipients.to_vec());
        Ok(format!("{prefix}{}", BASE64.encode(plaintext)).into_bytes())
    }

    fn open(&self, prefix: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(ciphertext)
            .map_err(|_| CipherError::Decrypt("not utf-8".to_string()))?;
        let payload = text
            .strip_prefix(prefix)
            .ok_or_else(|| CipherError::Decrypt("bad envelope prefix".to_string()))?;
        BASE64
            .decode(payload)
            .map_err(|err| CipherError::Decrypt(err.to_string()).into())
    }
}

impl Encrypter for FakeEncrypter {
    fn encrypt_dotenv(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>> {
        cancel.check()?;
        self.seal(DOTENV_PREFIX, plaintext, recipients)
    }

    fn decrypt_dotenv(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>> {
        cancel.check()?;
        self.open(DOTENV_PREFIX, ciphertext)
    }

    fn encrypt_binary(
        &self,
        cancel: &CancelToken,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>> {
        cancel.check()?;
        self.seal(BINARY_PREFIX, plaintext, recipients)
    }

    fn decrypt_binary(&self, cancel: &CancelToken, ciphertext: &[u8]) -> Result<Vec<u8>> {
        cancel.check()?;
        self.open(BINARY_PREFIX, ciphertext)
    }

    fn version(&self, cancel: &CancelToken) -> Result<String> {
        cancel.check()?;
        Ok("fake-cipher 1.0".to_string())
    }
}

/// Deterministic clock for stable index timestamps.
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn default_time() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self(Self::default_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Git fake that reports "no repository anywhere".
#[derive(Default)]
pub struct NoGit;

impl Git for NoGit {
    fn is_repo(&self, _: &CancelToken, _: &Path) -> Result<bool> {
        Ok(false)
    }
    fn init_repo(&self, _: &CancelToken, _: &Path) -> Result<()> {
        Ok(())
    }
    fn top_level(&self, _: &CancelToken, _: &Path) -> Result<PathBuf> {
        Err(envlock::error::GitError::Command {
            op: "rev-parse",
            message: "not a git repository".to_string(),
        }
        .into())
    }
    fn is_path_tracked(&self, _: &CancelToken, _: &Path, _: &Path) -> Result<bool> {
        Ok(false)
    }
    fn is_dirty(&self, _: &CancelToken, _: &Path) -> Result<bool> {
        Ok(false)
    }
    fn last_commit_info(&self, _: &CancelToken, _: &Path, _: &Path) -> Result<CommitInfo> {
        Ok(CommitInfo::default())
    }
    fn pull(&self, _: &CancelToken, _: &Path) -> Result<()> {
        Ok(())
    }
    fn push(&self, _: &CancelToken, _: &Path) -> Result<()> {
        Ok(())
    }
}

pub const TEST_RECIPIENT: &str = "age1test";

/// An initialized vault in a temp directory with all services wired up.
pub struct Vault {
    pub dir: TempDir,
    pub cancel: CancelToken,
    pub encrypter: Arc<FakeEncrypter>,
    pub store: VaultStore,
    pub secrets: SecretService,
    pub files: FileService,
    pub keys: KeysService,
    pub listing: ListingService,
}

impl Vault {
    pub fn new() -> Self {
        Self::with_recipients(&[TEST_RECIPIENT.to_string()])
    }

    pub fn with_recipients(recipients: &[String]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
        let store = VaultStore::new(fs);
        let encrypter = Arc::new(FakeEncrypter::default());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
        let cancel = CancelToken::new();

        let init = InitService::new(store.clone(), Arc::new(NoGit), clock.clone());
        init.init(
            &cancel,
            &InitOptions {
                root: dir.path().to_path_buf(),
                name: "test-vault".to_string(),
                recipients: recipients.to_vec(),
                force: false,
                init_git: false,
            },
        )
        .expect("failed to initialize vault");

        Self {
            cancel,
            encrypter: encrypter.clone(),
            secrets: SecretService::new(store.clone(), encrypter.clone(), clock.clone()),
            files: FileService::new(store.clone(), encrypter.clone(), clock.clone()),
            keys: KeysService::new(store.clone(), encrypter),
            listing: ListingService::new(store.clone()),
            store,
            dir,
        }
    }

    /// Initialized vault with secrets pre-set under project "app", env "dev".
    pub fn with_secrets(pairs: &[(&str, &str)]) -> Self {
        let vault = Self::new();
        for (key, value) in pairs {
            vault.set(key, value);
        }
        vault
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.secrets
            .set(&self.cancel, self.root(), "app", "dev", key, value)
            .unwrap_or_else(|err| panic!("set {key} failed: {err}"));
    }

    pub fn get(&self, key: &str) -> String {
        self.secrets
            .get(&self.cancel, self.root(), "app", "dev", key)
            .unwrap_or_else(|err| panic!("get {key} failed: {err}"))
    }

    pub fn export(&self) -> String {
        self.secrets
            .export_env(&self.cancel, self.root(), "app", "dev")
            .expect("export failed")
    }

    pub fn secret_path(&self) -> PathBuf {
        self.store.secret_file_path(self.root(), "app", "dev")
    }

    /// Raw ciphertext of the app/dev payload.
    pub fn raw_payload(&self) -> Vec<u8> {
        std::fs::read(self.secret_path()).expect("payload missing")
    }
}
