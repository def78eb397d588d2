use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::GuardrailError;

/// Symlinks followed before a target is treated as a loop.
const MAX_LINK_HOPS: usize = 40;

/// Enforces workspace-scoped write access.
/// Reads are unrestricted; writes must target paths within the workspace.
pub struct WorkspaceGuard {
    /// Canonical (absolute, symlinks resolved) workspace root.
    canonical_root: PathBuf,
}

impl WorkspaceGuard {
    /// Create a new guard for the given workspace path.
    /// Creates the directory if it doesn't exist and resolves to canonical path.
    pub fn new(workspace_path: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(workspace_path)?;
        let canonical_root = std::fs::canonicalize(workspace_path)?;
        Ok(Self { canonical_root })
    }

    /// Resolve a write target (relative paths are taken from the workspace root)
    /// to an absolute path inside the workspace.
    ///
    /// Parent directories need not exist: the nearest existing ancestor is
    /// canonicalized and the remaining components are appended. Any `..` in
    /// the non-existent tail is rejected. Dangling symlinks are followed to
    /// their target, which must also lie inside the workspace.
    pub fn resolve_write_target(&self, target: &Path) -> Result<PathBuf, GuardrailError> {
        let full = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.canonical_root.join(target)
        };

        self.resolve_within(&full, MAX_LINK_HOPS)
            .ok_or_else(|| GuardrailError::WriteOutsideWorkspace {
                path: target.to_path_buf(),
                workspace: self.canonical_root.clone(),
            })
    }

    fn resolve_within(&self, full: &Path, hops: usize) -> Option<PathBuf> {
        let mut existing = full;
        let mut tail: Vec<&OsStr> = Vec::new();
        // symlink_metadata does not follow links, so a dangling link counts as present.
        while std::fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.components().next_back()) {
                (Some(parent), Some(Component::Normal(name))) => {
                    tail.push(name);
                    existing = parent;
                }
                _ => return None,
            }
        }

        let mut resolved = match std::fs::canonicalize(existing) {
            Ok(path) => path,
            Err(_) => {
                // Dangling link: continue from where it points.
                let hops = hops.checked_sub(1)?;
                let link = std::fs::read_link(existing).ok()?;
                let mut next = existing.parent()?.join(link);
                for name in tail.iter().rev() {
                    next.push(name);
                }
                return self.resolve_within(&next, hops);
            }
        };
        for name in tail.into_iter().rev() {
            resolved.push(name);
        }

        resolved
            .starts_with(&self.canonical_root)
            .then_some(resolved)
    }

    /// Get the canonical workspace root path.
    pub fn canonical_root(&self) -> &Path {
        &self.canonical_root
    }
}
