//! Git synchronization of the vault repository.
//!
//! The vault only ever syncs ciphertext and metadata; plaintext never
//! enters the repository, so pull/push are plain git operations with a
//! dirty-tree guard.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{GitError, Result};
use crate::ports::{CancelToken, CommitInfo, Git};

pub struct SyncService {
    pub git: Arc<dyn Git>,
}

impl SyncService {
    pub fn new(git: Arc<dyn Git>) -> Self {
        Self { git }
    }

    /// Pull remote changes. Refuses on a dirty working tree unless
    /// `allow_dirty` is set.
    pub fn pull(&self, cancel: &CancelToken, root: &Path, allow_dirty: bool) -> Result<()> {
        self.ensure_clean(cancel, root, allow_dirty)?;
        self.git.pull(cancel, root)?;
        info!(root = %root.display(), "pulled vault repository");
        Ok(())
    }

    /// Push local commits. Same dirty-tree rule as [`Self::pull`].
    pub fn push(&self, cancel: &CancelToken, root: &Path, allow_dirty: bool) -> Result<()> {
        self.ensure_clean(cancel, root, allow_dirty)?;
        self.git.push(cancel, root)?;
        info!(root = %root.display(), "pushed vault repository");
        Ok(())
    }

    /// Last commit that touched `path`, for change attribution in listings.
    pub fn last_change(
        &self,
        cancel: &CancelToken,
        root: &Path,
        path: &Path,
    ) -> Result<CommitInfo> {
        self.git.last_commit_info(cancel, root, path)
    }

    fn ensure_clean(&self, cancel: &CancelToken, root: &Path, allow_dirty: bool) -> Result<()> {
        if allow_dirty {
            return Ok(());
        }
        if self.git.is_dirty(cancel, root)? {
            return Err(GitError::DirtyWorkingTree.into());
        }
        Ok(())
    }
}
