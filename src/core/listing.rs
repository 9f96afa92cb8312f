//! Read-only listings and search over the index.
//!
//! All answers come from the plaintext index, so listing never decrypts
//! anything and works without an identity. Results inherit the index's
//! lexical ordering.

use std::path::Path;

use super::index::{FileInfo, KeyInfo};
use super::store::VaultStore;
use crate::error::Result;

/// A fully-qualified key reference from a cross-vault search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    pub project: String,
    pub env: String,
    pub key: String,
}

/// Listing and search operations for one vault.
pub struct ListingService {
    pub store: VaultStore,
}

impl ListingService {
    pub fn new(store: VaultStore) -> Self {
        Self { store }
    }

    pub fn list_projects(&self, root: &Path) -> Result<Vec<String>> {
        Ok(self.store.load_index(root)?.list_projects())
    }

    pub fn list_envs(&self, root: &Path, project: &str) -> Result<Vec<String>> {
        Ok(self.store.load_index(root)?.list_envs(project))
    }

    pub fn list_keys(&self, root: &Path, project: &str, env: &str) -> Result<Vec<KeyInfo>> {
        Ok(self.store.load_index(root)?.list_keys(project, env))
    }

    pub fn list_files(&self, root: &Path, project: &str, env: &str) -> Result<Vec<FileInfo>> {
        Ok(self.store.load_index(root)?.list_files(project, env))
    }

    /// Every key in the vault as (project, env, key) triples, in lexical
    /// order.
    pub fn list_all_keys(&self, root: &Path) -> Result<Vec<KeyRef>> {
        let index = self.store.load_index(root)?;
        let mut out = Vec::new();
        for (project, project_index) in &index.projects {
            for (env, env_index) in &project_index.envs {
                for key in env_index.keys.keys() {
                    out.push(KeyRef {
                        project: project.clone(),
                        env: env.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Case-insensitive substring search over project, env, and key names.
    pub fn find_keys(&self, root: &Path, query: &str) -> Result<Vec<KeyRef>> {
        let needle = query.to_lowercase();
        let mut refs = self.list_all_keys(root)?;
        refs.retain(|r| {
            r.project.to_lowercase().contains(&needle)
                || r.env.to_lowercase().contains(&needle)
                || r.key.to_lowercase().contains(&needle)
        });
        Ok(refs)
    }
}
