use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the optional per-repository config file.
pub const CONFIG_FILE_NAME: &str = ".github-gpt.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .github-gpt.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub diff: DiffConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. Only used when GITHUB_TOKEN is unset.
    pub token: Option<String>,
    pub api_base: String,
    /// Local auth helper, invoked as `<helper> auth token`.
    pub auth_helper: String,
    pub remote: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            auth_helper: "gh".to_string(),
            remote: "origin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub api_base: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Paths left out of the diff sent to the language model
    pub skip: Vec<String>,
    /// Include added, deleted and renamed files, not just modified ones
    pub include_all_changes: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            skip: vec!["poetry.lock".to_string()],
            include_all_changes: false,
        }
    }
}

impl Config {
    /// Load configuration from .github-gpt.toml in the repository directory.
    /// Returns default config if the file doesn't exist.
    pub fn load(repo_path: &Path) -> Result<Config, ConfigError> {
        let path = repo_path.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}
