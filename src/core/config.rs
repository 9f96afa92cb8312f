//! Vault configuration.
//!
//! Persisted as JSON in the metadata directory. Recipients form an
//! order-preserving, de-duplicated set of public encryption identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const CONFIG_VERSION: i64 = 1;

/// Vault-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: i64,
    pub name: String,
    pub recipients: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Config {
    /// Build a fresh config, trimming and de-duplicating recipients while
    /// keeping their insertion order.
    pub fn new(name: &str, recipients: &[String], now: DateTime<Utc>) -> Self {
        let mut clean: Vec<String> = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let recipient = recipient.trim();
            if recipient.is_empty() || clean.iter().any(|r| r == recipient) {
                continue;
            }
            clean.push(recipient.to_string());
        }

        Self {
            version: CONFIG_VERSION,
            name: name.trim().to_string(),
            recipients: clean,
            created_at: now,
        }
    }

    /// Check structural invariants: positive version, no empty recipient.
    pub fn validate(&self) -> Result<()> {
        if self.version <= 0 {
            return Err(ConfigError::NonPositiveVersion.into());
        }
        if self.recipients.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::EmptyRecipient.into());
        }
        Ok(())
    }

    /// Add a recipient if not already present. Returns whether it was added.
    pub fn add_recipient(&mut self, recipient: &str) -> Result<bool> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(ConfigError::EmptyRecipient.into());
        }
        if self.recipients.iter().any(|r| r == recipient) {
            return Ok(false);
        }
        self.recipients.push(recipient.to_string());
        Ok(true)
    }

    /// Remove a recipient. Returns whether it was present.
    pub fn remove_recipient(&mut self, recipient: &str) -> Result<bool> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(ConfigError::EmptyRecipient.into());
        }
        let before = self.recipients.len();
        self.recipients.retain(|r| r != recipient);
        Ok(self.recipients.len() != before)
    }
}
