//! Vault initialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::config::Config;
use super::index::Index;
use super::store::VaultStore;
use crate::error::{ConfigError, Result};
use crate::ports::{CancelToken, Clock, Git};

pub struct InitOptions {
    pub root: PathBuf,
    pub name: String,
    pub recipients: Vec<String>,
    /// Overwrite an existing vault config.
    pub force: bool,
    /// Run `git init` in the vault root if it is not already a repository.
    pub init_git: bool,
}

pub struct InitService {
    pub store: VaultStore,
    pub git: Arc<dyn Git>,
    pub clock: Arc<dyn Clock>,
}

impl InitService {
    pub fn new(store: VaultStore, git: Arc<dyn Git>, clock: Arc<dyn Clock>) -> Self {
        Self { store, git, clock }
    }

    /// Create the vault layout, config, and empty index.
    ///
    /// Initializing is allowed with zero recipients; writes will refuse
    /// until one is added.
    pub fn init(&self, cancel: &CancelToken, opts: &InitOptions) -> Result<Config> {
        let root = opts.root.as_path();
        if self.store.fs.exists(&self.store.config_path(root)) && !opts.force {
            return Err(ConfigError::AlreadyInitialized.into());
        }

        self.store.fs.mkdir_all(root)?;
        self.store.ensure_layout(root)?;

        let config = Config::new(&opts.name, &opts.recipients, self.clock.now());
        self.store.save_config(root, &config)?;
        self.store.save_index(root, &Index::new())?;
        self.seed_readme(root, &config)?;

        if opts.init_git && !self.git.is_repo(cancel, root)? {
            debug!(root = %root.display(), "initializing git repository");
            self.git.init_repo(cancel, root)?;
        }

        info!(root = %root.display(), name = %config.name, "vault initialized");
        Ok(config)
    }

    fn seed_readme(&self, root: &Path, config: &Config) -> Result<()> {
        let path = root.join("README.md");
        if self.store.fs.exists(&path) {
            return Ok(());
        }
        let body = format!(
            "# {name}\n\nEncrypted secrets vault managed by envlock.\n\n\
             Everything under `secrets/` and `files/` is ciphertext and safe\n\
             to commit. Plaintext exports belong outside this repository.\n",
            name = if config.name.is_empty() {
                "envlock vault"
            } else {
                &config.name
            },
        );
        self.store.fs.write(&path, body.as_bytes(), 0o644)?;
        Ok(())
    }
}
