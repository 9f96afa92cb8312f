//! On-disk vault layout and crash-safe persistence.
//!
//! Layout under the vault root:
//!
//! ```text
//! .envlock/config.json    vault config
//! .envlock/index.json     plaintext metadata index
//! secrets/<project>/<env>.env        ciphertext dotenv per project/env
//! files/<project>/<env>/<name>.enc   ciphertext blob per project/env/name
//! ```
//!
//! Every artifact is written via temp-file-then-rename in the target's own
//! directory, so readers observe either the old or the new content.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::config::Config;
use super::index::{Index, INDEX_VERSION};
use crate::error::{ConfigError, Result};
use crate::ports::FileSystem;

pub const METADATA_DIR: &str = ".envlock";
pub const CONFIG_FILE: &str = "config.json";
pub const INDEX_FILE: &str = "index.json";
pub const SECRETS_DIR: &str = "secrets";
pub const FILES_DIR: &str = "files";
pub const SECRET_SUFFIX: &str = ".env";
pub const BLOB_SUFFIX: &str = ".enc";

/// Owns physical paths and atomic persistence of config and index.
#[derive(Clone)]
pub struct VaultStore {
    pub fs: Arc<dyn FileSystem>,
}

impl VaultStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn config_path(&self, root: &Path) -> PathBuf {
        root.join(METADATA_DIR).join(CONFIG_FILE)
    }

    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(METADATA_DIR).join(INDEX_FILE)
    }

    pub fn secrets_dir(&self, root: &Path) -> PathBuf {
        root.join(SECRETS_DIR)
    }

    pub fn files_dir(&self, root: &Path) -> PathBuf {
        root.join(FILES_DIR)
    }

    pub fn secret_file_path(&self, root: &Path, project: &str, env: &str) -> PathBuf {
        self.secrets_dir(root)
            .join(project)
            .join(format!("{env}{SECRET_SUFFIX}"))
    }

    pub fn blob_path(&self, root: &Path, project: &str, env: &str, name: &str) -> PathBuf {
        self.files_dir(root)
            .join(project)
            .join(env)
            .join(format!("{name}{BLOB_SUFFIX}"))
    }

    /// Create the metadata and secrets directories; idempotent.
    pub fn ensure_layout(&self, root: &Path) -> Result<()> {
        self.fs.mkdir_all(&root.join(METADATA_DIR))?;
        self.fs.mkdir_all(&self.secrets_dir(root))?;
        Ok(())
    }

    pub fn load_config(&self, root: &Path) -> Result<Config> {
        let path = self.config_path(root);
        debug!(path = %path.display(), "loading config");
        let data = self.fs.read(&path)?;
        let config: Config = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_config(&self, root: &Path, config: &Config) -> Result<()> {
        config.validate()?;
        let data = to_json_pretty(config)?;
        let path = self.config_path(root);
        debug!(path = %path.display(), recipients = config.recipients.len(), "saving config");
        self.write_file_atomic(&path, &data, 0o644)
    }

    /// Load the index; a missing file yields an empty index, and a
    /// non-positive version is normalized to current.
    pub fn load_index(&self, root: &Path) -> Result<Index> {
        let path = self.index_path(root);
        let data = match self.fs.read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Index::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut index: Index = serde_json::from_slice(&data)?;
        if index.version <= 0 {
            index.version = INDEX_VERSION;
        }
        Ok(index)
    }

    pub fn save_index(&self, root: &Path, index: &Index) -> Result<()> {
        let mut index = index.clone();
        if index.version <= 0 {
            index.version = INDEX_VERSION;
        }
        let data = to_json_pretty(&index)?;
        let path = self.index_path(root);
        debug!(path = %path.display(), projects = index.projects.len(), "saving index");
        self.write_file_atomic(&path, &data, 0o644)
    }

    /// All secret files under the secrets directory, recursively.
    ///
    /// A missing secrets directory is not an error; it just means no
    /// secrets were ever written.
    pub fn list_secret_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.secrets_dir(root);
        if !self.fs.exists(&dir) {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        self.walk_secrets(&dir, &mut files)?;
        Ok(files)
    }

    /// All blob files under the files directory, recursively. Missing
    /// directory means no blobs.
    pub fn list_blob_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.files_dir(root);
        if !self.fs.exists(&dir) {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        self.walk_suffix(&dir, BLOB_SUFFIX, &mut files)?;
        Ok(files)
    }

    fn walk_secrets(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        self.walk_suffix(dir, SECRET_SUFFIX, files)
    }

    fn walk_suffix(&self, dir: &Path, suffix: &str, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.fs.read_dir(dir)? {
            let path = dir.join(&entry.name);
            if entry.is_dir {
                self.walk_suffix(&path, suffix, files)?;
            } else if entry.name.ends_with(suffix) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Write via a temp file in the target directory, then rename over the
    /// target. On failure the temp file is removed and the target is left
    /// untouched.
    pub fn write_file_atomic(&self, path: &Path, data: &[u8], mode: u32) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".envlock-tmp.")
            .tempfile_in(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        tmp.write_all(data)?;
        tmp.flush()?;

        let tmp_path = tmp.into_temp_path();
        self.fs.rename(&tmp_path, path)?;
        // The rename consumed the file; dropping the TempPath is a no-op.
        tmp_path.keep().ok();
        Ok(())
    }
}

/// Walk parent directories from `start` until a vault config is found.
pub fn find_vault_root(start: &Path, fs: &dyn FileSystem) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config_path = current.join(METADATA_DIR).join(CONFIG_FILE);
        if fs.exists(&config_path) {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::VaultNotFound(start.to_path_buf()).into());
        }
    }
}

fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    Ok(data)
}
