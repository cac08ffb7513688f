pub mod remote;
pub mod types;

pub use remote::{RemoteUrl, RemoteUrlError};
pub use types::{FileChange, PullRequestOutcome, PullRequestPreview};

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{Delta, DiffFindOptions, Oid};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::github::{HostingClient, HostingError, NewPullRequest, PullRequest, PullRequestEdit, Repository};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not a git repository: {}", .0.display())]
    NotARepo(PathBuf),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("No active branch (HEAD is detached or unborn)")]
    NoActiveBranch,

    #[error("Remote `{0}` not found or has no URL")]
    MissingRemote(String),

    #[error(transparent)]
    RemoteUrl(#[from] RemoteUrlError),

    #[error("Default branch `{0}` not found locally or on the remote")]
    BaseNotFound(String),

    #[error("Failed to run git: {0}")]
    GitSpawn(#[from] std::io::Error),

    #[error("`git {command}` failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    #[error(transparent)]
    Hosting(#[from] HostingError),
}

/// A local working copy paired with its repository on the hosting service.
pub struct GitHubRepo<H> {
    git: git2::Repository,
    client: H,
    remote_name: String,
    remote: RemoteUrl,
    hosted: Repository,
}

impl<H: HostingClient> GitHubRepo<H> {
    /// Open the repository containing `path` and look up its hosted
    /// counterpart through `client`, using the URL of `remote_name`.
    #[instrument(skip(client))]
    pub async fn load(path: &Path, client: H, remote_name: &str) -> Result<Self, RepoError> {
        let git = git2::Repository::discover(path)
            .map_err(|_| RepoError::NotARepo(path.to_path_buf()))?;

        let url = git
            .find_remote(remote_name)
            .ok()
            .and_then(|r| r.url().map(str::to_string))
            .ok_or_else(|| RepoError::MissingRemote(remote_name.to_string()))?;
        let remote = RemoteUrl::parse(&url)?;
        debug!(owner = %remote.owner, name = %remote.name, host = %remote.host, "parsed remote URL");

        let hosted = client.get_repository(&remote.owner, &remote.name).await?;
        info!(repo = %hosted.full_name, default_branch = %hosted.default_branch, "loaded repository");

        Ok(Self {
            git,
            client,
            remote_name: remote_name.to_string(),
            remote,
            hosted,
        })
    }

    pub fn owner(&self) -> &str {
        &self.remote.owner
    }

    pub fn name(&self) -> &str {
        &self.remote.name
    }

    pub fn default_branch(&self) -> &str {
        &self.hosted.default_branch
    }

    /// Name of the checked-out branch.
    pub fn active_branch(&self) -> Result<String, RepoError> {
        let head = match self.git.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                return Err(RepoError::NoActiveBranch)
            }
            Err(e) => return Err(e.into()),
        };
        if !head.is_branch() {
            return Err(RepoError::NoActiveBranch);
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or(RepoError::NoActiveBranch)
    }

    fn workdir(&self) -> &Path {
        self.git.workdir().unwrap_or_else(|| self.git.path())
    }

    fn run_git(&self, args: &[&str]) -> Result<(), RepoError> {
        let output = Command::new("git")
            .current_dir(self.workdir())
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(RepoError::GitCommand {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Fetch the remote so its default branch is current.
    pub fn fetch(&self) -> Result<(), RepoError> {
        info!(remote = %self.remote_name, "fetching remote");
        self.run_git(&["fetch", self.remote_name.as_str()])
    }

    /// Fetch, then diff the default branch against the active branch's HEAD.
    pub fn get_diff_from_head(&self) -> Result<Vec<FileChange>, RepoError> {
        self.fetch()?;
        self.diff_against(self.default_branch())
    }

    /// Changes from `base_branch` to HEAD, in the order git reports them.
    ///
    /// The remote-tracking ref is preferred; the local branch is used when
    /// the remote has not been fetched.
    pub fn diff_against(&self, base_branch: &str) -> Result<Vec<FileChange>, RepoError> {
        let base_ref = [
            format!("refs/remotes/{}/{}", self.remote_name, base_branch),
            format!("refs/heads/{}", base_branch),
        ]
        .into_iter()
        .find_map(|name| self.git.find_reference(&name).ok())
        .ok_or_else(|| RepoError::BaseNotFound(base_branch.to_string()))?;
        debug!(base = ?base_ref.name(), "resolved diff base");

        let base_tree = base_ref.peel_to_tree()?;
        let head_tree = self.git.head()?.peel_to_tree()?;

        let mut diff = self
            .git
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
            let new_path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());
            let old = self.blob_text(delta.old_file().id())?;
            let new = self.blob_text(delta.new_file().id())?;

            let change = match (delta.status(), old_path, new_path, old, new) {
                (Delta::Added, _, Some(path), _, Some(new)) => FileChange::Added { path, new },
                (Delta::Modified, _, Some(path), Some(old), Some(new)) => {
                    FileChange::Modified { path, old, new }
                }
                (Delta::Deleted, Some(path), _, Some(old), _) => FileChange::Deleted { path, old },
                (Delta::Renamed, Some(from), Some(to), Some(old), Some(new)) => {
                    FileChange::Renamed { from, to, old, new }
                }
                (status, old_path, new_path, ..) => {
                    debug!(?status, ?old_path, ?new_path, "skipping binary or unsupported change");
                    continue;
                }
            };
            changes.push(change);
        }
        debug!(changes = changes.len(), "computed diff");
        Ok(changes)
    }

    /// Text of a blob; `None` for binary blobs. A zero id reads as empty text.
    fn blob_text(&self, id: Oid) -> Result<Option<String>, RepoError> {
        if id.is_zero() {
            return Ok(Some(String::new()));
        }
        let blob = match self.git.find_blob(id) {
            Ok(blob) => blob,
            // submodule entries point at commits
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if blob.is_binary() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    /// Push the active branch to the identically named remote branch.
    pub fn push(&self) -> Result<(), RepoError> {
        let branch = self.active_branch()?;
        info!(remote = %self.remote_name, branch = %branch, "pushing branch");
        let refspec = format!("{branch}:{branch}");
        self.run_git(&["push", self.remote_name.as_str(), refspec.as_str()])
    }

    /// The open pull request whose head is the active branch of this
    /// repository, if any. Same-named branches on forks do not match.
    pub async fn get_pull_request(&self) -> Result<Option<PullRequest>, RepoError> {
        let head = self.active_branch()?;
        let pulls = self.client.list_open_pulls(self.owner(), self.name()).await?;
        Ok(pulls
            .into_iter()
            .find(|pull| pull.head.is_branch_of(&self.hosted.full_name, &head)))
    }

    /// Open a pull request from the active branch into the default branch.
    ///
    /// With `atomic`, an open pull request for the same head is edited in
    /// place instead. With `dry_run`, nothing is sent and the request that
    /// would have been made is returned.
    #[instrument(skip(self, title, body), fields(repo = %self.remote.full_name()))]
    pub async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        atomic: bool,
        dry_run: bool,
    ) -> Result<PullRequestOutcome, RepoError> {
        let head = self.active_branch()?;
        let base = self.default_branch().to_string();

        if dry_run {
            debug!(%head, %base, "dry run, not contacting GitHub");
            return Ok(PullRequestOutcome::Preview(PullRequestPreview {
                title: title.to_string(),
                body: body.to_string(),
                base,
                head,
            }));
        }

        if atomic {
            if let Some(existing) = self.get_pull_request().await? {
                info!(number = existing.number, "updating existing pull request");
                let edit = PullRequestEdit {
                    title: title.to_string(),
                    body: body.to_string(),
                };
                let updated = self
                    .client
                    .update_pull(self.owner(), self.name(), existing.number, &edit)
                    .await?;
                return Ok(PullRequestOutcome::Updated(updated));
            }
        }

        info!(%head, %base, "creating pull request");
        let request = NewPullRequest {
            title: title.to_string(),
            body: body.to_string(),
            head,
            base,
        };
        let created = self
            .client
            .create_pull(self.owner(), self.name(), &request)
            .await?;
        Ok(PullRequestOutcome::Created(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::{BranchRef, RepoRef};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeState {
        pulls: Vec<PullRequest>,
        pull_calls: usize,
    }

    /// In-memory hosting service that rejects a second open PR for one head.
    #[derive(Clone, Default)]
    struct FakeHosting {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeHosting {
        fn pulls(&self) -> Vec<PullRequest> {
            self.state.lock().unwrap().pulls.clone()
        }

        fn pull_calls(&self) -> usize {
            self.state.lock().unwrap().pull_calls
        }
    }

    #[async_trait]
    impl HostingClient for FakeHosting {
        async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, HostingError> {
            Ok(Repository {
                full_name: format!("{owner}/{name}"),
                default_branch: "main".into(),
            })
        }

        async fn list_open_pulls(
            &self,
            _owner: &str,
            _name: &str,
        ) -> Result<Vec<PullRequest>, HostingError> {
            let mut state = self.state.lock().unwrap();
            state.pull_calls += 1;
            Ok(state.pulls.clone())
        }

        async fn create_pull(
            &self,
            owner: &str,
            name: &str,
            request: &NewPullRequest,
        ) -> Result<PullRequest, HostingError> {
            let mut state = self.state.lock().unwrap();
            state.pull_calls += 1;
            if state.pulls.iter().any(|p| p.head.ref_name == request.head) {
                return Err(HostingError::Status {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    body: "A pull request already exists".into(),
                });
            }
            let number = state.pulls.len() as u64 + 1;
            let pull = PullRequest {
                number,
                title: request.title.clone(),
                body: Some(request.body.clone()),
                html_url: format!("https://github.com/{owner}/{name}/pull/{number}"),
                head: BranchRef {
                    ref_name: request.head.clone(),
                    repo: Some(RepoRef {
                        full_name: format!("{owner}/{name}"),
                    }),
                },
                base: BranchRef {
                    ref_name: request.base.clone(),
                    repo: Some(RepoRef {
                        full_name: format!("{owner}/{name}"),
                    }),
                },
            };
            state.pulls.push(pull.clone());
            Ok(pull)
        }

        async fn update_pull(
            &self,
            _owner: &str,
            _name: &str,
            number: u64,
            edit: &PullRequestEdit,
        ) -> Result<PullRequest, HostingError> {
            let mut state = self.state.lock().unwrap();
            state.pull_calls += 1;
            let pull = state
                .pulls
                .iter_mut()
                .find(|p| p.number == number)
                .ok_or_else(|| HostingError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: "Not Found".into(),
                })?;
            pull.title = edit.title.clone();
            pull.body = Some(edit.body.clone());
            Ok(pull.clone())
        }
    }

    /// Commit `files` as the full tree of `refname`.
    fn commit_files(
        repo: &git2::Repository,
        refname: &str,
        parent: Option<Oid>,
        files: &[(&str, &str)],
    ) -> Oid {
        let mut builder = repo.treebuilder(None).unwrap();
        for (path, content) in files {
            let blob = repo.blob(content.as_bytes()).unwrap();
            builder.insert(path, blob, 0o100644).unwrap();
        }
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = parent
            .map(|oid| repo.find_commit(oid).unwrap())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some(refname), &sig, &sig, "commit", &tree, &parent_refs)
            .unwrap()
    }

    /// Repository with `main` and a checked-out `feature-x` branch.
    fn scratch_repo() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        repo.remote("origin", "git@github.com:octo/widgets.git")
            .unwrap();

        let base = commit_files(
            &repo,
            "refs/heads/main",
            None,
            &[
                ("a.txt", "foo\n"),
                ("gone.txt", "bye\n"),
                ("poetry.lock", "v1\n"),
            ],
        );
        commit_files(
            &repo,
            "refs/heads/feature-x",
            Some(base),
            &[
                ("a.txt", "bar\n"),
                ("new.txt", "hello\n"),
                ("poetry.lock", "v2\n"),
            ],
        );
        repo.set_head("refs/heads/feature-x").unwrap();
        dir
    }

    async fn load(dir: &TempDir, fake: &FakeHosting) -> GitHubRepo<FakeHosting> {
        GitHubRepo::load(dir.path(), fake.clone(), "origin")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_parses_remote() {
        let dir = scratch_repo();
        let repo = load(&dir, &FakeHosting::default()).await;
        assert_eq!(repo.owner(), "octo");
        assert_eq!(repo.name(), "widgets");
        assert_eq!(repo.default_branch(), "main");
        assert_eq!(repo.active_branch().unwrap(), "feature-x");
    }

    #[tokio::test]
    async fn test_load_rejects_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitHubRepo::load(dir.path(), FakeHosting::default(), "origin").await;
        assert!(matches!(err, Err(RepoError::NotARepo(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_missing_remote() {
        let dir = scratch_repo();
        let err = GitHubRepo::load(dir.path(), FakeHosting::default(), "upstream").await;
        assert!(matches!(err, Err(RepoError::MissingRemote(name)) if name == "upstream"));
    }

    #[tokio::test]
    async fn test_diff_against_local_base() {
        let dir = scratch_repo();
        let repo = load(&dir, &FakeHosting::default()).await;
        let changes = repo.diff_against("main").unwrap();

        assert!(changes.contains(&FileChange::Modified {
            path: "a.txt".into(),
            old: "foo\n".into(),
            new: "bar\n".into(),
        }));
        assert!(changes.contains(&FileChange::Added {
            path: "new.txt".into(),
            new: "hello\n".into(),
        }));
        assert!(changes.contains(&FileChange::Deleted {
            path: "gone.txt".into(),
            old: "bye\n".into(),
        }));
        assert_eq!(changes.len(), 4);
    }

    #[tokio::test]
    async fn test_diff_prefers_remote_tracking_ref() {
        let dir = scratch_repo();
        {
            let git = git2::Repository::open(dir.path()).unwrap();
            commit_files(
                &git,
                "refs/remotes/origin/main",
                None,
                &[("a.txt", "bar\n"), ("new.txt", "hello\n"), ("poetry.lock", "v2\n")],
            );
        }
        let repo = load(&dir, &FakeHosting::default()).await;
        let changes = repo.diff_against("main").unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_diff_missing_base() {
        let dir = scratch_repo();
        let repo = load(&dir, &FakeHosting::default()).await;
        assert!(matches!(
            repo.diff_against("develop"),
            Err(RepoError::BaseNotFound(name)) if name == "develop"
        ));
    }

    #[tokio::test]
    async fn test_binary_files_are_skipped() {
        let dir = scratch_repo();
        {
            let git = git2::Repository::open(dir.path()).unwrap();
            let head = git.head().unwrap().target().unwrap();
            commit_files(
                &git,
                "refs/heads/feature-x",
                Some(head),
                &[
                    ("a.txt", "bar\n"),
                    ("image.png", "PNG\0\0\0binary"),
                    ("poetry.lock", "v1\n"),
                    ("gone.txt", "bye\n"),
                ],
            );
        }
        let repo = load(&dir, &FakeHosting::default()).await;
        let changes = repo.diff_against("main").unwrap();
        let paths: Vec<&str> = changes.iter().map(FileChange::path).collect();
        assert_eq!(paths, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_atomic_create_twice_updates_in_place() {
        let dir = scratch_repo();
        let fake = FakeHosting::default();
        let repo = load(&dir, &fake).await;

        let first = repo
            .create_pull_request("First title", "First body", true, false)
            .await
            .unwrap();
        assert!(matches!(first, PullRequestOutcome::Created(_)));

        let second = repo
            .create_pull_request("Second title", "Second body", true, false)
            .await
            .unwrap();
        assert!(matches!(second, PullRequestOutcome::Updated(ref pr) if pr.number == 1));

        let pulls = fake.pulls();
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].title, "Second title");
        assert_eq!(pulls[0].body.as_deref(), Some("Second body"));
        assert_eq!(pulls[0].head.ref_name, "feature-x");
        assert_eq!(pulls[0].base.ref_name, "main");
    }

    #[tokio::test]
    async fn test_non_atomic_duplicate_surfaces_error() {
        let dir = scratch_repo();
        let fake = FakeHosting::default();
        let repo = load(&dir, &fake).await;

        repo.create_pull_request("t", "", false, false).await.unwrap();
        let err = repo
            .create_pull_request("t2", "b2", false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Hosting(HostingError::Status { .. })));
        assert_eq!(fake.pulls().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let dir = scratch_repo();
        let fake = FakeHosting::default();
        let repo = load(&dir, &fake).await;

        let outcome = repo
            .create_pull_request("Title", "Body", true, true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PullRequestOutcome::Preview(PullRequestPreview {
                title: "Title".into(),
                body: "Body".into(),
                base: "main".into(),
                head: "feature-x".into(),
            })
        );
        assert_eq!(fake.pull_calls(), 0);
        assert!(fake.pulls().is_empty());
        assert_eq!(repo.active_branch().unwrap(), "feature-x");
    }

    #[tokio::test]
    async fn test_get_pull_request_matches_head_branch() {
        let dir = scratch_repo();
        let fake = FakeHosting::default();
        let repo = load(&dir, &fake).await;
        assert!(repo.get_pull_request().await.unwrap().is_none());

        fake.create_pull(
            "octo",
            "widgets",
            &NewPullRequest {
                title: "other".into(),
                body: String::new(),
                head: "other-branch".into(),
                base: "main".into(),
            },
        )
        .await
        .unwrap();
        assert!(repo.get_pull_request().await.unwrap().is_none());

        repo.create_pull_request("mine", "", false, false).await.unwrap();
        let found = repo.get_pull_request().await.unwrap().unwrap();
        assert_eq!(found.title, "mine");
    }

    #[tokio::test]
    async fn test_fork_branch_with_same_name_is_not_reused() {
        let dir = scratch_repo();
        let fake = FakeHosting::default();
        let repo = load(&dir, &fake).await;

        fake.state.lock().unwrap().pulls.push(PullRequest {
            number: 9,
            title: "fork work".into(),
            body: None,
            html_url: "https://github.com/octo/widgets/pull/9".into(),
            head: BranchRef {
                ref_name: "feature-x".into(),
                repo: Some(RepoRef {
                    full_name: "someone/widgets".into(),
                }),
            },
            base: BranchRef {
                ref_name: "main".into(),
                repo: None,
            },
        });

        assert!(repo.get_pull_request().await.unwrap().is_none());
    }

    fn git_in(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// Points `origin` at a local bare repository whose `main` differs from
    /// the local `main` only in `a.txt`.
    fn attach_bare_origin(dir: &TempDir) -> TempDir {
        let bare = tempfile::tempdir().unwrap();
        git2::Repository::init_bare(bare.path()).unwrap();

        let git = git2::Repository::open(dir.path()).unwrap();
        commit_files(
            &git,
            "refs/heads/upstream-main",
            None,
            &[
                ("a.txt", "foo\n"),
                ("new.txt", "hello\n"),
                ("poetry.lock", "v2\n"),
            ],
        );
        let bare_url = bare.path().to_string_lossy().into_owned();
        git.remote_set_url("origin", &bare_url).unwrap();
        git_in(dir.path(), &["push", "origin", "upstream-main:main"]);
        bare
    }

    #[tokio::test]
    async fn test_get_diff_from_head_fetches_remote_base() {
        let dir = scratch_repo();
        let repo = load(&dir, &FakeHosting::default()).await;
        let _bare = attach_bare_origin(&dir);

        let changes = repo.get_diff_from_head().unwrap();
        assert_eq!(
            changes,
            vec![FileChange::Modified {
                path: "a.txt".into(),
                old: "foo\n".into(),
                new: "bar\n".into(),
            }]
        );
        let git = git2::Repository::open(dir.path()).unwrap();
        assert!(git.find_reference("refs/remotes/origin/main").is_ok());
    }

    #[tokio::test]
    async fn test_push_creates_branch_and_rejects_non_fast_forward() {
        let dir = scratch_repo();
        let repo = load(&dir, &FakeHosting::default()).await;
        let bare = attach_bare_origin(&dir);

        repo.push().unwrap();
        let git = git2::Repository::open(dir.path()).unwrap();
        let local_tip = git.refname_to_id("refs/heads/feature-x").unwrap();
        let remote = git2::Repository::open_bare(bare.path()).unwrap();
        assert_eq!(
            remote.refname_to_id("refs/heads/feature-x").unwrap(),
            local_tip
        );

        // rewrite feature-x so it no longer descends from the pushed tip
        let main_tip = git.refname_to_id("refs/heads/main").unwrap();
        let amended = commit_files(
            &git,
            "refs/heads/amended",
            Some(main_tip),
            &[("a.txt", "baz\n")],
        );
        git.reference("refs/heads/feature-x", amended, true, "amend")
            .unwrap();

        let err = repo.push().unwrap_err();
        match err {
            RepoError::GitCommand { command, .. } => {
                assert_eq!(command, "push origin feature-x:feature-x");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            remote.refname_to_id("refs/heads/feature-x").unwrap(),
            local_tip
        );
    }
}
