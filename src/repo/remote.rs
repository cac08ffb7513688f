use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteUrlError {
    #[error("Unrecognized remote URL: {0}")]
    Unrecognized(String),
}

/// Owner and repository name parsed from a git remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    pub owner: String,
    pub name: String,
}

const URL_SCHEMES: [&str; 5] = ["https", "http", "ssh", "git", "git+ssh"];

impl RemoteUrl {
    /// Parse an HTTPS, SSH or SCP-style (`git@host:owner/name.git`) remote.
    ///
    /// Owner and name are the last two path segments, so nested paths such as
    /// `https://host/group/sub/name.git` resolve to `sub`/`name`.
    pub fn parse(url: &str) -> Result<RemoteUrl, RemoteUrlError> {
        let url = url.trim();
        let unrecognized = || RemoteUrlError::Unrecognized(url.to_string());

        let (host, path) = if url.contains("://") {
            let parsed = reqwest::Url::parse(url).map_err(|_| unrecognized())?;
            if !URL_SCHEMES.contains(&parsed.scheme()) {
                return Err(unrecognized());
            }
            let host = parsed.host_str().ok_or_else(unrecognized)?.to_string();
            (host, parsed.path().to_string())
        } else {
            parse_scp_like(url).ok_or_else(unrecognized)?
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(unrecognized());
        }
        let owner = segments[segments.len() - 2];
        let last = segments[segments.len() - 1];
        let name = last.strip_suffix(".git").unwrap_or(last);
        if name.is_empty() || host.is_empty() {
            return Err(unrecognized());
        }

        Ok(RemoteUrl {
            host,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name`, as used in API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Split `[user@]host:path` into host and path. Local paths are rejected.
fn parse_scp_like(url: &str) -> Option<(String, String)> {
    let (authority, path) = url.split_once(':')?;
    if authority.contains('/') || path.starts_with("//") {
        return None;
    }
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), path.to_string()))
}
