mod config;
mod credentials;
mod diff;
mod github;
mod output;
mod repo;
mod summary;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::credentials::Credentials;
use crate::diff::ChangeScope;
use crate::github::GitHubClient;
use crate::repo::GitHubRepo;
use crate::summary::{OpenAiClient, Summarizer};

/// github-gpt: summarizes the current branch's diff against the default
/// branch with a language model, pushes the branch and opens (or updates)
/// its GitHub Pull Request.
#[derive(Parser, Debug)]
#[command(name = "github-gpt", version, about)]
struct Cli {
    /// Path to the local git repository
    #[arg(default_value = "./")]
    repo_path: PathBuf,

    /// Generate the title and body but skip the push and pull request creation
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("github_gpt", repo = %cli.repo_path.display()).entered();

    info!("loading configuration");
    let config = config::Config::load(&cli.repo_path)?;

    info!("resolving credentials");
    let credentials = Credentials::from_env(&config.github)?;

    let github = GitHubClient::new(&credentials.github_token, &config.github.api_base)?;
    info!("loading repository");
    let repo = GitHubRepo::load(&cli.repo_path, github, &config.github.remote).await?;

    info!(default_branch = %repo.default_branch(), "computing diff");
    let changes = repo.get_diff_from_head()?;
    let scope = ChangeScope::from_include_all(config.diff.include_all_changes);
    let diff_text = diff::make_git_diff(&changes, &config.diff.skip, scope)?;
    debug!(changes = changes.len(), diff_bytes = diff_text.len(), ?scope, "built diff text");
    if diff_text.is_empty() {
        warn!("no changes in scope, summarizing an empty diff");
    }

    let model = OpenAiClient::new(
        &credentials.openai_api_key,
        &config.openai.api_base,
        &config.openai.model,
    )?;
    let summary = Summarizer::new(model).summarize(&diff_text).await?;

    if cli.dry_run {
        info!("dry run, skipping push");
    } else {
        repo.push()?;
    }

    let outcome = repo
        .create_pull_request(&summary.title, &summary.body, true, cli.dry_run)
        .await?;
    output::print_outcome(&outcome);
    info!("done");

    Ok(())
}
