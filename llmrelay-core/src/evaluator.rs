//! Heuristic success scoring for a completed response, per §4.10. Combined
//! with the CLI/provider-reported success flag and an optional user rating
//! to produce the final `is_success` recorded against the request.

use std::sync::OnceLock;

use regex::Regex;

use crate::classifier::Category;

const BASE_SCORE: i32 = 70;
const HEURISTIC_PASS_THRESHOLD: i32 = 40;

fn refusal_phrase_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(i cannot|i can't (help|assist)|i'm not able to|as an ai( language model)?|i won't be able to)\b").unwrap()
    })
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```").unwrap())
}

/// Heuristic quality score in `[0, 100]` for `response_text`, given the
/// request's classified category and complexity.
pub fn score_response(response_text: &str, category: Category, complexity: u8) -> u8 {
    let trimmed = response_text.trim();

    let mut score = BASE_SCORE;
    let len = trimmed.chars().count() as i32;
    let complexity = complexity as i32;

    if trimmed.is_empty() {
        score -= 30;
    }
    if len < 20 && complexity > 20 {
        score -= 20;
    }
    if category.is_code_type() && code_fence_regex().is_match(trimmed) {
        score += 15;
    }
    if len > complexity * 5 {
        score += 10;
    }
    if refusal_phrase_regex().is_match(trimmed) {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}

/// Final `is_success` verdict: the CLI/provider success flag gates
/// everything else, then the heuristic score must clear the pass threshold,
/// then an optional user rating (1-5) must be at least 3 if present.
pub fn evaluate(
    cli_success: bool,
    response_text: &str,
    category: Category,
    complexity: u8,
    user_rating: Option<i32>,
) -> (bool, u8) {
    if !cli_success {
        return (false, 0);
    }
    let score = score_response(response_text, category, complexity);
    let heuristic_passes = score as i32 >= HEURISTIC_PASS_THRESHOLD;
    let rating_passes = user_rating.map(|r| r >= 3).unwrap_or(true);
    (heuristic_passes && rating_passes, score)
}
