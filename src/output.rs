use colored::Colorize;
use tracing::debug;

use crate::github::PullRequest;
use crate::repo::{PullRequestOutcome, PullRequestPreview};

/// Print the result of `create_pull_request` to stdout.
pub fn print_outcome(outcome: &PullRequestOutcome) {
    debug!("writing outcome to terminal");
    println!();
    println!("{}", render_outcome(outcome));
}

fn render_outcome(outcome: &PullRequestOutcome) -> String {
    match outcome {
        PullRequestOutcome::Preview(preview) => render_preview(preview),
        PullRequestOutcome::Created(pr) => render_pull("Opened", pr),
        PullRequestOutcome::Updated(pr) => render_pull("Updated", pr),
    }
}

fn render_pull(verb: &str, pr: &PullRequest) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} PR {}: \"{}\"\n",
        verb.green().bold(),
        format!("#{}", pr.number).bold(),
        pr.title
    ));
    out.push_str(&format!("{} <- {}\n", pr.base.ref_name, pr.head.ref_name));
    out.push_str(&pr.html_url.cyan().underline().to_string());
    if let Some(body) = pr.body.as_deref().filter(|b| !b.is_empty()) {
        out.push_str("\n\n");
        out.push_str(body);
    }
    out
}

fn render_preview(preview: &PullRequestPreview) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "═══ Dry run: pull request not submitted ═══".yellow().bold()));
    out.push_str(&format!("{} {}\n", "Base:".bold(), preview.base));
    out.push_str(&format!("{} {}\n", "Head:".bold(), preview.head));
    out.push_str(&format!("{} {}\n\n", "Title:".bold(), preview.title));
    out.push_str(&preview.body);
    out
}
