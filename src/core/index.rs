//! Plaintext metadata index.
//!
//! A derived, best-effort cache over the ciphertext files: listings never
//! need decryption, but a crash between a secret write and the index write
//! can leave it stale. `doctor` revalidates by decrypting a sample.
//!
//! Invariant: an env node with no keys and no files must not exist; removal
//! prunes empty env and project nodes immediately.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INDEX_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub version: i64,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectIndex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectIndex {
    #[serde(default)]
    pub envs: BTreeMap<String, EnvIndex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvIndex {
    #[serde(default)]
    pub keys: BTreeMap<String, KeyMetadata>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub size: u64,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// A key listing row.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub name: String,
    pub last_updated: DateTime<Utc>,
}

/// A file listing row.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub sha256: String,
    pub mime: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            projects: BTreeMap::new(),
        }
    }

    fn ensure_env(&mut self, project: &str, env: &str) -> &mut EnvIndex {
        self.projects
            .entry(project.to_string())
            .or_default()
            .envs
            .entry(env.to_string())
            .or_default()
    }

    /// Record a key's last-updated timestamp.
    pub fn set_key(&mut self, project: &str, env: &str, key: &str, updated: DateTime<Utc>) {
        self.ensure_env(project, env).keys.insert(
            key.to_string(),
            KeyMetadata {
                last_updated: updated,
            },
        );
    }

    /// Record a file's content metadata.
    pub fn set_file(&mut self, project: &str, env: &str, name: &str, meta: FileMetadata) {
        self.ensure_env(project, env)
            .files
            .insert(name.to_string(), meta);
    }

    /// Remove a key, pruning empty env/project nodes.
    pub fn remove_key(&mut self, project: &str, env: &str, key: &str) {
        let Some(project_index) = self.projects.get_mut(project) else {
            return;
        };
        let Some(env_index) = project_index.envs.get_mut(env) else {
            return;
        };
        env_index.keys.remove(key);
        if env_index.keys.is_empty() && env_index.files.is_empty() {
            project_index.envs.remove(env);
        }
        if project_index.envs.is_empty() {
            self.projects.remove(project);
        }
    }

    /// Remove a file, pruning empty env/project nodes.
    pub fn remove_file(&mut self, project: &str, env: &str, name: &str) {
        let Some(project_index) = self.projects.get_mut(project) else {
            return;
        };
        let Some(env_index) = project_index.envs.get_mut(env) else {
            return;
        };
        env_index.files.remove(name);
        if env_index.keys.is_empty() && env_index.files.is_empty() {
            project_index.envs.remove(env);
        }
        if project_index.envs.is_empty() {
            self.projects.remove(project);
        }
    }

    pub fn list_projects(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    pub fn list_envs(&self, project: &str) -> Vec<String> {
        self.projects
            .get(project)
            .map(|p| p.envs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_keys(&self, project: &str, env: &str) -> Vec<KeyInfo> {
        self.projects
            .get(project)
            .and_then(|p| p.envs.get(env))
            .map(|e| {
                e.keys
                    .iter()
                    .map(|(name, meta)| KeyInfo {
                        name: name.clone(),
                        last_updated: meta.last_updated,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list_files(&self, project: &str, env: &str) -> Vec<FileInfo> {
        self.projects
            .get(project)
            .and_then(|p| p.envs.get(env))
            .map(|e| {
                e.files
                    .iter()
                    .map(|(name, meta)| FileInfo {
                        name: name.clone(),
                        size: meta.size,
                        sha256: meta.sha256.clone(),
                        mime: meta.mime.clone(),
                        last_updated: meta.last_updated,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn file_metadata(&self, project: &str, env: &str, name: &str) -> Option<&FileMetadata> {
        self.projects
            .get(project)
            .and_then(|p| p.envs.get(env))
            .and_then(|e| e.files.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn set_key_creates_nested_nodes() {
        let mut idx = Index::new();
        idx.set_key("app", "dev", "API_KEY", ts("2024-03-01T12:00:00Z"));

        assert_eq!(idx.list_projects(), vec!["app"]);
        assert_eq!(idx.list_envs("app"), vec!["dev"]);
        let keys = idx.list_keys("app", "dev");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "API_KEY");
    }

    #[test]
    fn remove_last_key_prunes_env_and_project() {
        let mut idx = Index::new();
        idx.set_key("app", "dev", "ONLY", ts("2024-03-01T12:00:00Z"));
        idx.remove_key("app", "dev", "ONLY");

        assert!(idx.projects.is_empty());
    }

    #[test]
    fn remove_key_keeps_env_with_files() {
        let mut idx = Index::new();
        idx.set_key("app", "dev", "ONLY", ts("2024-03-01T12:00:00Z"));
        idx.set_file(
            "app",
            "dev",
            "cert.pem",
            FileMetadata {
                size: 10,
                sha256: "ab".repeat(32),
                mime: "application/octet-stream".to_string(),
                last_updated: Some(ts("2024-03-01T12:00:00Z")),
            },
        );
        idx.remove_key("app", "dev", "ONLY");

        assert_eq!(idx.list_envs("app"), vec!["dev"]);
        assert!(idx.list_keys("app", "dev").is_empty());
        assert_eq!(idx.list_files("app", "dev").len(), 1);
    }

    #[test]
    fn remove_key_in_missing_nodes_is_noop() {
        let mut idx = Index::new();
        idx.remove_key("ghost", "dev", "KEY");
        idx.set_key("app", "dev", "KEY", ts("2024-03-01T12:00:00Z"));
        idx.remove_key("app", "ghost", "KEY");
        assert_eq!(idx.list_keys("app", "dev").len(), 1);
    }

    #[test]
    fn listings_are_sorted() {
        let mut idx = Index::new();
        idx.set_key("zeta", "prod", "B", ts("2024-03-01T12:00:00Z"));
        idx.set_key("alpha", "dev", "A", ts("2024-03-01T12:00:00Z"));
        idx.set_key("alpha", "dev", "C", ts("2024-03-01T12:00:00Z"));

        assert_eq!(idx.list_projects(), vec!["alpha", "zeta"]);
        let keys: Vec<_> = idx
            .list_keys("alpha", "dev")
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(keys, vec!["A", "C"]);
    }

    #[test]
    fn json_contract_shape() {
        let mut idx = Index::new();
        idx.set_key("app", "dev", "API_KEY", ts("2024-03-01T12:00:00Z"));
        let json = serde_json::to_value(&idx).unwrap();
        assert_eq!(json["version"], 1);
        assert!(json["projects"]["app"]["envs"]["dev"]["keys"]["API_KEY"]["lastUpdated"]
            .is_string());
        // Empty file maps are omitted entirely.
        assert!(json["projects"]["app"]["envs"]["dev"].get("files").is_none());
    }

    #[test]
    fn empty_index_round_trips() {
        let idx = Index::new();
        let json = serde_json::to_string(&idx).unwrap();
        let back: Index = serde_json::from_str(&json).unwrap();
        assert!(back.projects.is_empty());
        assert_eq!(back.version, INDEX_VERSION);
    }
}
