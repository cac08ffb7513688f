use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::repo::FileChange;

const SEPARATOR: &str = "---------------------------------------------------";

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Failed to build patch for {path}: {source}")]
    Patch {
        path: String,
        #[source]
        source: git2::Error,
    },
}

/// Which kinds of change make it into the generated diff text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeScope {
    /// Only files present and edited on both sides.
    #[default]
    ModifiedOnly,
    /// Added, deleted and renamed files as well.
    All,
}

impl ChangeScope {
    pub fn from_include_all(include_all_changes: bool) -> Self {
        if include_all_changes {
            ChangeScope::All
        } else {
            ChangeScope::ModifiedOnly
        }
    }

    fn includes(self, change: &FileChange) -> bool {
        match self {
            ChangeScope::All => true,
            ChangeScope::ModifiedOnly => matches!(change, FileChange::Modified { .. }),
        }
    }
}

fn is_skipped(change: &FileChange, skip: &[String]) -> bool {
    let skipped = |path: &str| skip.iter().any(|s| s == path);
    match change {
        FileChange::Renamed { from, to, .. } => skipped(from) || skipped(to),
        other => skipped(other.path()),
    }
}

/// Render the changes as one text blob for the language model.
///
/// Each included file gets a `File: <path>` header, a separator line and a
/// unified diff of old against new content. Input order is kept.
pub fn make_git_diff(
    changes: &[FileChange],
    skip: &[String],
    scope: ChangeScope,
) -> Result<String, DiffError> {
    let mut lines: Vec<String> = Vec::new();

    for change in changes {
        if !scope.includes(change) {
            debug!(path = change.path(), kind = change.kind(), "change out of scope");
            continue;
        }
        if is_skipped(change, skip) {
            debug!(path = change.path(), "skipping configured path");
            continue;
        }

        let (header, old_path, new_path, old, new) = match change {
            FileChange::Modified { path, old, new } => {
                (path.clone(), path.as_str(), path.as_str(), old.as_str(), new.as_str())
            }
            FileChange::Added { path, new } => {
                (path.clone(), path.as_str(), path.as_str(), "", new.as_str())
            }
            FileChange::Deleted { path, old } => {
                (path.clone(), path.as_str(), path.as_str(), old.as_str(), "")
            }
            FileChange::Renamed { from, to, old, new } => (
                format!("{} -> {}", from, to),
                from.as_str(),
                to.as_str(),
                old.as_str(),
                new.as_str(),
            ),
        };

        lines.push(format!("File: {}", header));
        lines.push(SEPARATOR.to_string());
        // identical text (mode-only change) yields an empty patch
        let patch = unified_diff(old_path, new_path, old, new)?;
        if !patch.is_empty() {
            lines.push(patch);
        }
    }

    Ok(lines.join("\n"))
}

fn unified_diff(old_path: &str, new_path: &str, old: &str, new: &str) -> Result<String, DiffError> {
    let to_error = |source| DiffError::Patch {
        path: new_path.to_string(),
        source,
    };
    let mut patch = git2::Patch::from_buffers(
        old.as_bytes(),
        Some(Path::new(old_path)),
        new.as_bytes(),
        Some(Path::new(new_path)),
        None,
    )
    .map_err(to_error)?;
    let buf = patch.to_buf().map_err(to_error)?;
    Ok(String::from_utf8_lossy(&buf).trim_end_matches('\n').to_string())
}
