use serde::{Deserialize, Serialize};

/// Repository metadata returned by `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub full_name: String,
    /// Branch pull requests target by default (e.g. "main")
    pub default_branch: String,
}

/// The repository a pull request branch lives in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoRef {
    pub full_name: String,
}

/// A branch reference on either side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Null when the head fork has been deleted
    #[serde(default)]
    pub repo: Option<RepoRef>,
}

impl BranchRef {
    /// True when this is `branch` in the repository `full_name`.
    pub fn is_branch_of(&self, full_name: &str, branch: &str) -> bool {
        self.ref_name == branch
            && self
                .repo
                .as_ref()
                .is_some_and(|repo| repo.full_name.eq_ignore_ascii_case(full_name))
    }
}

/// A pull request as returned by the pulls endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    /// GitHub returns null for an empty body
    pub body: Option<String>,
    pub html_url: String,
    pub head: BranchRef,
    pub base: BranchRef,
}

/// Body of `POST /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Body of `PATCH /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestEdit {
    pub title: String,
    pub body: String,
}
