//! Commit title and message selection

use crate::types::{CommitMessageMode, PullSnapshot};
use regex::Regex;
use std::sync::LazyLock;

static COMMIT_MESSAGE_HEADING_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^#+ Commit Message ?:?\s*$").ok());
static HEADING_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^#+ ").ok());

fn matches(re: &LazyLock<Option<Regex>>, line: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(line))
}

/// Commit title and message for a merge, if the policy overrides them
///
/// `title+body` uses the pull request title (with its number) and body.
/// `default` looks for a `# Commit Message` section in the body: its first
/// non-empty line is the title, the rest up to the next heading is the
/// message.
pub fn commit_message(pull: &PullSnapshot, mode: CommitMessageMode) -> Option<(String, String)> {
    let body = pull.body.as_deref().unwrap_or_default();

    if mode == CommitMessageMode::TitleAndBody {
        return Some((format!("{} (#{})", pull.title, pull.number()), body.to_string()));
    }

    let mut found = false;
    let mut lines = Vec::new();
    for line in body.lines() {
        if matches(&COMMIT_MESSAGE_HEADING_RE, line) {
            found = true;
        } else if found && matches(&HEADING_RE, line) {
            break;
        } else if found {
            lines.push(line);
        }
    }

    let mut lines = lines.into_iter().skip_while(|l| l.trim().is_empty());
    let title = lines.next()?.trim().to_string();
    let message = lines
        .skip_while(|l| l.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    Some((title, message))
}
