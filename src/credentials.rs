use std::process::Command;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::GitHubConfig;

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0} not found in environment variable")]
    MissingVariable(&'static str),

    #[error("Failed to run auth helper `{helper}`: {source}")]
    HelperSpawn {
        helper: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Auth helper `{helper} auth token` exited with {status}: {stderr}")]
    HelperFailed {
        helper: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Tokens for both remote services, resolved once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub github_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"[REDACTED]")
            .field("github_token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from the process environment.
    pub fn from_env(github: &GitHubConfig) -> Result<Self, CredentialError> {
        let openai_api_key = require_openai_key(std::env::var(OPENAI_API_KEY_VAR).ok())?;
        let github_token = resolve_github_token(std::env::var(GITHUB_TOKEN_VAR).ok(), github)?;
        Ok(Self {
            openai_api_key,
            github_token,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The OpenAI key has no fallback; its absence stops the run before any side effect.
pub fn require_openai_key(env_value: Option<String>) -> Result<String, CredentialError> {
    non_empty(env_value).ok_or(CredentialError::MissingVariable(OPENAI_API_KEY_VAR))
}

/// Resolve the GitHub token: environment first, then config file, then the
/// local auth helper.
pub fn resolve_github_token(
    env_value: Option<String>,
    github: &GitHubConfig,
) -> Result<String, CredentialError> {
    if let Some(token) = non_empty(env_value) {
        return Ok(token);
    }
    if let Some(token) = non_empty(github.token.clone()) {
        debug!("using GitHub token from config file");
        return Ok(token);
    }
    warn!(
        helper = %github.auth_helper,
        "{} not found in environment variable, attempting auth helper", GITHUB_TOKEN_VAR
    );
    run_auth_helper(&github.auth_helper)
}

/// Run `<helper> auth token` and return its stdout with newlines removed.
pub fn run_auth_helper(helper: &str) -> Result<String, CredentialError> {
    let output = Command::new(helper)
        .args(["auth", "token"])
        .output()
        .map_err(|source| {
            error!(helper, "error running auth token command");
            CredentialError::HelperSpawn {
                helper: helper.to_string(),
                source,
            }
        })?;

    if !output.status.success() {
        error!(helper, status = %output.status, "error running auth token command");
        return Err(CredentialError::HelperFailed {
            helper: helper.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let token = String::from_utf8_lossy(&output.stdout)
        .replace('\n', " ")
        .trim()
        .to_string();
    Ok(token)
}
