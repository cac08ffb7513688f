pub mod types;

pub use types::{NewPullRequest, PullRequest, PullRequestEdit, Repository};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT_VALUE: &str = "github-gpt";
const PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum HostingError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Pull request operations against the hosting service.
///
/// The repository adapter only talks to the remote through this trait, so
/// tests can substitute an in-memory implementation.
#[async_trait]
pub trait HostingClient: Send + Sync {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, HostingError>;

    /// All open pull requests, across every page.
    async fn list_open_pulls(&self, owner: &str, name: &str)
        -> Result<Vec<PullRequest>, HostingError>;

    async fn create_pull(
        &self,
        owner: &str,
        name: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError>;

    async fn update_pull(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        edit: &PullRequestEdit,
    ) -> Result<PullRequest, HostingError>;
}

/// GitHub REST API client.
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, HostingError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn repo_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{}/{}", self.api_base, owner, name)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HostingError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostingError::Status { status, body });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl HostingClient for GitHubClient {
    #[instrument(skip(self))]
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, HostingError> {
        debug!("fetching repository metadata from GitHub API");
        let repo: Repository = self
            .send_json(self.client.get(self.repo_url(owner, name)))
            .await?;
        debug!(default_branch = %repo.default_branch, "received repository metadata");
        Ok(repo)
    }

    #[instrument(skip(self))]
    async fn list_open_pulls(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<PullRequest>, HostingError> {
        let url = format!("{}/pulls", self.repo_url(owner, name));
        let mut pulls = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Vec<PullRequest> = self
                .send_json(self.client.get(&url).query(&[
                    ("state", "open".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]))
                .await?;
            let done = batch.len() < PER_PAGE;
            pulls.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        debug!(open_pulls = pulls.len(), pages = page, "listed open pull requests");
        Ok(pulls)
    }

    #[instrument(skip(self, request), fields(head = %request.head, base = %request.base))]
    async fn create_pull(
        &self,
        owner: &str,
        name: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError> {
        let url = format!("{}/pulls", self.repo_url(owner, name));
        let pull: PullRequest = self.send_json(self.client.post(url).json(request)).await?;
        debug!(number = pull.number, "created pull request");
        Ok(pull)
    }

    #[instrument(skip(self, edit))]
    async fn update_pull(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        edit: &PullRequestEdit,
    ) -> Result<PullRequest, HostingError> {
        let url = format!("{}/pulls/{}", self.repo_url(owner, name), number);
        let pull: PullRequest = self.send_json(self.client.patch(url).json(edit)).await?;
        debug!(number = pull.number, "updated pull request");
        Ok(pull)
    }
}
