pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

/// System instruction sent with every prompt.
pub const SYSTEM_PROMPT: &str = "You produce technical, concise responses to questions.";

pub const TITLE_TEMPLATE: PromptTemplate = PromptTemplate::new(
    "Provide a concise summary of this git diff in less than 10 words:\n\n{diff}",
);

pub const BODY_TEMPLATE: PromptTemplate =
    PromptTemplate::new("Provide a summary of changes from this git diff:\n\n{diff}");

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Language model request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Language model API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Language model returned no completion")]
    EmptyResponse,
}

/// A chat-style text generation backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, SummaryError>;
}

/// A fixed prompt with a single `{diff}` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    const SLOT: &'static str = "{diff}";

    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    pub fn render(&self, diff: &str) -> String {
        self.template.replacen(Self::SLOT, diff, 1)
    }
}

/// Generated pull request text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub title: String,
    pub body: String,
}

pub struct Summarizer<M> {
    model: M,
}

impl<M: ChatModel> Summarizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Ask for a title, then a body. Diff text is sent as-is.
    pub async fn summarize(&self, diff: &str) -> Result<Summary, SummaryError> {
        info!(diff_bytes = diff.len(), "generating pull request title");
        let title = self
            .model
            .complete(SYSTEM_PROMPT, &TITLE_TEMPLATE.render(diff))
            .await?;

        info!("generating pull request body");
        let body = self
            .model
            .complete(SYSTEM_PROMPT, &BODY_TEMPLATE.render(diff))
            .await?;

        let summary = Summary {
            title: title.trim().to_string(),
            body: body.trim().to_string(),
        };
        debug!(title = %summary.title, body_bytes = summary.body.len(), "generated summary");
        Ok(summary)
    }
}
