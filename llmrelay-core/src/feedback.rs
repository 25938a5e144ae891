//! `/feedback` command handling (§4.1 step 2). Recognized entirely inside
//! the pipeline before any routing or upstream dispatch happens — feedback
//! never reaches a model.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use llmrelay_store::Store;

#[derive(Debug, Error, PartialEq)]
pub enum FeedbackError {
    #[error("not a /feedback command")]
    NotAFeedbackCommand,
    #[error("no matching request found")]
    RequestNotFound,
    #[error("no requests recorded yet")]
    NoHistory,
}

fn command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^/feedback\s+(good|bad|[1-5])(?:\s+(\S+))?\s*$").unwrap())
}

fn score_for(token: &str) -> i32 {
    match token.to_ascii_lowercase().as_str() {
        "good" => 5,
        "bad" => 1,
        digit => digit.parse().unwrap_or(3),
    }
}

/// Parsed `/feedback` invocation: a score in `[1, 5]` plus an optional
/// task-id prefix to resolve against instead of the most recent request.
#[derive(Debug)]
pub struct FeedbackCommand {
    pub score: i32,
    pub id_prefix: Option<String>,
}

pub fn parse(text: &str) -> Result<FeedbackCommand, FeedbackError> {
    let caps = command_regex().captures(text.trim()).ok_or(FeedbackError::NotAFeedbackCommand)?;
    let score = score_for(&caps[1]);
    let id_prefix = caps.get(2).map(|m| m.as_str().to_string());
    Ok(FeedbackCommand { score, id_prefix })
}

/// Applies a parsed `/feedback` command: resolves the target request
/// (by id prefix, or the most recent request if none was given), records
/// the score, and returns a synthetic confirmation message — never calls
/// an upstream provider.
pub async fn apply(store: &Store, command: &FeedbackCommand) -> Result<String, FeedbackError> {
    let recent = store.recent_requests(200).await.map_err(|_| FeedbackError::NoHistory)?;

    let target = match &command.id_prefix {
        Some(prefix) => recent
            .iter()
            .find(|r| r.id.starts_with(prefix.as_str()))
            .ok_or(FeedbackError::RequestNotFound)?,
        None => recent.first().ok_or(FeedbackError::NoHistory)?,
    };

    store
        .set_feedback_score(&target.id, command.score)
        .await
        .map_err(|_| FeedbackError::RequestNotFound)?;

    let short_id: String = target.id.chars().take(8).collect();
    Ok(format!("Recorded feedback ({}/5) for request {short_id}.", command.score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_good_bad_and_numeric_scores() {
        assert_eq!(parse("/feedback good").unwrap().score, 5);
        assert_eq!(parse("/feedback bad").unwrap().score, 1);
        assert_eq!(parse("/feedback 3").unwrap().score, 3);
    }

    #[test]
    fn parses_optional_task_id_prefix() {
        let command = parse("/feedback good ab12").unwrap();
        assert_eq!(command.id_prefix.as_deref(), Some("ab12"));
    }

    #[test]
    fn rejects_non_feedback_text() {
        assert_eq!(parse("hello there").unwrap_err(), FeedbackError::NotAFeedbackCommand);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn applies_to_most_recent_request_when_no_id_given() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_request(&llmrelay_store::RequestRecord {
                id: "req-recent".into(),
                created_at: chrono::Utc::now(),
                category: None,
                complexity_score: None,
                tier: "economy".into(),
                provider_id: None,
                model_id: None,
                tokens_in: 0,
                tokens_out: 0,
                cost_usd: 0.0,
                latency_ms: None,
                cache_hit: false,
                compressed_bytes_saved: 0,
                success: Some(true),
                error_message: None,
                feedback_score: None,
            })
            .await
            .unwrap();
        let command = parse("/feedback good").unwrap();
        let confirmation = apply(&store, &command).await.unwrap();
        assert!(confirmation.contains("req-recen"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_id_prefix_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let command = parse("/feedback bad zzz").unwrap();
        assert_eq!(apply(&store, &command).await.unwrap_err(), FeedbackError::RequestNotFound);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_history_at_all_without_an_id_prefix() {
        let store = Store::open_in_memory().unwrap();
        let command = parse("/feedback good").unwrap();
        assert_eq!(apply(&store, &command).await.unwrap_err(), FeedbackError::NoHistory);
    }
}
