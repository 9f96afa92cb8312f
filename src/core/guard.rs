//! Plaintext write guardrails.
//!
//! Every operation that puts decrypted material on disk funnels through
//! these checks. The rules are monotone: adding `force` or `allow_git`
//! never enables a write that a stricter call would have allowed for a
//! different reason, and the inside-vault refusal has no override at all.
//!
//! Git probes fail open: if tracking status cannot be determined, the path
//! is treated as untracked rather than blocking the write on a broken git
//! setup.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GuardError, Result};
use crate::ports::{CancelToken, FileSystem, Git};

/// Validate a destination for newly written plaintext.
///
/// Returns the absolute, lexically normalized path to write to. The
/// inside-vault refusal is absolute; `allow_git` waives the tracked-path
/// refusal and `force` waives the existing-file refusal, each probed only
/// when its flag is unset. A path that is both tracked and existing gets
/// the combined refusal so callers can surface both required overrides.
pub fn guard_output_path(
    fs: &dyn FileSystem,
    git: Option<&dyn Git>,
    cancel: &CancelToken,
    root: &Path,
    out_path: &Path,
    allow_git: bool,
    force: bool,
) -> Result<PathBuf> {
    cancel.check()?;
    let path = absolute(out_path)?;
    let root = absolute(root)?;

    if is_within(&root, &path) {
        return Err(GuardError::InsideVault.into());
    }

    let tracked = !allow_git && is_tracked(git, cancel, &path);
    let exists = !force && fs.exists(&path);

    if tracked {
        if exists {
            return Err(GuardError::TrackedExistingPath.into());
        }
        return Err(GuardError::TrackedPath.into());
    }
    if exists {
        return Err(GuardError::PathExists.into());
    }

    debug!(path = %path.display(), "output path cleared");
    Ok(path)
}

/// Validate a destination for an in-place plaintext update.
///
/// The file is expected to exist, so no existence refusal applies; the
/// inside-vault and git-tracked rules still do.
pub fn guard_update_path(
    git: Option<&dyn Git>,
    cancel: &CancelToken,
    root: &Path,
    out_path: &Path,
    allow_git: bool,
) -> Result<PathBuf> {
    cancel.check()?;
    let path = absolute(out_path)?;
    let root = absolute(root)?;

    if is_within(&root, &path) {
        return Err(GuardError::InsideVault.into());
    }
    if !allow_git && is_tracked(git, cancel, &path) {
        return Err(GuardError::TrackedPath.into());
    }
    Ok(path)
}

fn is_tracked(git: Option<&dyn Git>, cancel: &CancelToken, path: &Path) -> bool {
    let Some(git) = git else {
        return false;
    };
    let dir = path.parent().unwrap_or(path);
    let repo_root = match git.top_level(cancel, dir) {
        Ok(root) => root,
        // Not a repository, or git itself is broken. Fail open.
        Err(err) => {
            debug!(error = %err, "git toplevel probe failed, treating as untracked");
            return false;
        }
    };
    match git.is_path_tracked(cancel, &repo_root, path) {
        Ok(tracked) => tracked,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "git tracking probe failed, treating as untracked");
            false
        }
    }
}

/// Absolutize against the current directory and normalize `.` and `..`
/// lexically, without touching the filesystem.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}
