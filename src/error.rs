use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all envlock operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dotenv(#[from] DotenvError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input validation failures. Always local; never reach a capability.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} contains invalid character '{ch}'")]
    InvalidCharacter { field: &'static str, ch: char },

    #[error("identifier must not contain path separators")]
    PathSeparator,

    #[error("invalid key '{0}'")]
    InvalidEnvKey(String),
}

/// Dotenv parse failures (error-severity issues abort the operation).
#[derive(Error, Debug)]
pub enum DotenvError {
    #[error("dotenv error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("vault dotenv error on line {line}: {message}")]
    VaultPayload { line: usize, message: String },
}

/// Vault configuration and state errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("vault config not found from {}", .0.display())]
    VaultNotFound(PathBuf),

    #[error("vault already initialized (use force to overwrite)")]
    AlreadyInitialized,

    #[error("no recipients configured; add one with `envlock keys add`")]
    NoRecipients,

    #[error("config version must be positive")]
    NonPositiveVersion,

    #[error("recipient cannot be empty")]
    EmptyRecipient,
}

/// Secret and rotation errors.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("file '{0}' not found")]
    FileNotFound(String),

    #[error("no secret files to rotate")]
    NothingToRotate,

    #[error("interactive merge requires a resolver")]
    ResolverRequired,

    #[error("file path is required")]
    FilePathRequired,
}

/// Encryption capability errors. Decrypt failures are classified against an
/// identity-availability probe so callers get an actionable hint instead of
/// backend diagnostic wording.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encrypt failed: {0}")]
    Encrypt(String),

    #[error("decrypt failed: {0}")]
    Decrypt(String),

    #[error("age identity not found; generate one with `age-keygen` and set ENVLOCK_AGE_KEY_FILE")]
    IdentityNotFound,

    #[error("age identity does not match recipients")]
    RecipientMismatch,

    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("no recipients provided")]
    NoRecipients,
}

/// Git capability errors.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git {op} failed: {message}")]
    Command { op: &'static str, message: String },

    #[error("working tree is dirty; commit or pass allow_dirty")]
    DirtyWorkingTree,

    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),
}

/// Guardrail refusals. Always block the write; never downgraded.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("refusing to write plaintext inside the vault repository")]
    InsideVault,

    #[error("output file exists; use force to overwrite")]
    PathExists,

    #[error("refusing to write into git-tracked path without allow_git")]
    TrackedPath,

    #[error("output file exists and is git-tracked; use force and allow_git to override")]
    TrackedExistingPath,
}

pub type Result<T> = std::result::Result<T, Error>;
