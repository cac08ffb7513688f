use crate::github::PullRequest;

/// One file's change between the default branch and the active branch.
/// Contents are the full text of each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added {
        path: String,
        new: String,
    },
    Modified {
        path: String,
        old: String,
        new: String,
    },
    Deleted {
        path: String,
        old: String,
    },
    Renamed {
        from: String,
        to: String,
        old: String,
        new: String,
    },
}

impl FileChange {
    /// Path on the active branch, or the removed path for deletions.
    pub fn path(&self) -> &str {
        match self {
            FileChange::Added { path, .. }
            | FileChange::Modified { path, .. }
            | FileChange::Deleted { path, .. } => path,
            FileChange::Renamed { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileChange::Added { .. } => "added",
            FileChange::Modified { .. } => "modified",
            FileChange::Deleted { .. } => "deleted",
            FileChange::Renamed { .. } => "renamed",
        }
    }
}

/// What `create_pull_request` would submit, returned without touching the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestPreview {
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestOutcome {
    Preview(PullRequestPreview),
    Created(PullRequest),
    Updated(PullRequest),
}
