//! Regex category detection and heuristic complexity scoring, run with no
//! upstream call — the default classification mode.

use std::sync::OnceLock;

use regex::Regex;

use llmrelay_protocol::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CodeGen,
    CodeReview,
    Debug,
    Refactor,
    Explain,
    SimpleQa,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::CodeGen => "code_gen",
            Category::CodeReview => "code_review",
            Category::Debug => "debug",
            Category::Refactor => "refactor",
            Category::Explain => "explain",
            Category::SimpleQa => "simple_qa",
            Category::Other => "other",
        }
    }

    /// Categories whose response is expected to contain code, per the
    /// success evaluator's "code-type category" bonus (§4.10).
    pub fn is_code_type(self) -> bool {
        matches!(self, Category::CodeGen | Category::CodeReview | Category::Debug | Category::Refactor)
    }
}

struct CategoryRule {
    category: Category,
    pattern: &'static str,
}

const RULES: &[CategoryRule] = &[
    CategoryRule { category: Category::Debug, pattern: r"(?i)\b(fix|debug|error|exception|traceback|stack trace|crash(es|ing)?|not working|fails?)\b" },
    CategoryRule { category: Category::CodeReview, pattern: r"(?i)\b(review|pr|pull request|code review|lgtm|feedback on this code)\b" },
    CategoryRule { category: Category::Refactor, pattern: r"(?i)\b(refactor|clean ?up|simplify|restructure|rename|extract (a |the )?(function|method))\b" },
    CategoryRule { category: Category::CodeGen, pattern: r"(?i)\b(write|implement|create|generate|add)\b.*\b(function|class|module|script|program|feature|endpoint|test)\b" },
    CategoryRule { category: Category::Explain, pattern: r"(?i)\b(explain|what does|how does|why (is|does)|walk me through|what is the difference)\b" },
];

fn rules() -> &'static [(Category, Regex)] {
    static COMPILED: OnceLock<Vec<(Category, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|r| (r.category, Regex::new(r.pattern).expect("static category pattern compiles")))
            .collect()
    })
}

fn complex_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(architecture|concurren(cy|t)|distributed|algorithm|optimi[sz]e|performance|security|thread.?safe|race condition|deadlock|scalab)\w*")
            .expect("complex keyword pattern compiles")
    })
}

fn simple_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(hi|hello|thanks|thank you|quick question|just wondering|what is \d|simple)\b")
            .expect("simple keyword pattern compiles")
    })
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```").expect("code fence pattern compiles"))
}

fn last_user_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .unwrap_or_default()
}

fn full_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn system_prompt_len(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text().len())
        .unwrap_or(0)
}

fn looks_tool_definition_heavy(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .map(|text| text.matches("function").count() + text.matches("parameters").count() >= 3)
        .unwrap_or(false)
}

fn detect_category(last_user: &str) -> Category {
    if last_user.len() < 200 && !code_fence_regex().is_match(last_user) {
        return Category::SimpleQa;
    }
    for (category, re) in rules() {
        if re.is_match(last_user) {
            return *category;
        }
    }
    Category::Other
}

/// Heuristic complexity score, per the additive formula in §4.3. Clamped to `[0, 100]`.
fn score_complexity(messages: &[ChatMessage], last_user: &str) -> u8 {
    let full = full_text(messages);
    let mut score: f64 = 10.0;

    score += (last_user.len() as f64 / 4.0 / 200.0).min(15.0);

    let code_blocks = last_user.matches("```").count() / 2;
    score += (code_blocks as f64 * 3.0).min(15.0);

    let complex_matches = complex_keyword_regex().find_iter(&full).count();
    score += complex_matches as f64 * 8.0;

    let simple_matches = simple_keyword_regex().find_iter(last_user).count();
    score -= simple_matches as f64 * 8.0;

    if last_user.len() < 50 {
        score -= 15.0;
    } else if last_user.len() < 150 {
        score -= 5.0;
    }

    let user_turns = messages.iter().filter(|m| m.role == "user").count();
    score += (user_turns as f64 * 1.0).min(5.0);

    let sys_len = system_prompt_len(messages);
    if sys_len > 200 && !looks_tool_definition_heavy(messages) {
        score += 5.0;
    }

    score.clamp(0.0, 100.0).round() as u8
}

/// Classifies a message list with no upstream call: ordered regex category
/// rules plus the additive complexity formula, both over the last user turn
/// (and, for a few signals, the full transcript).
pub fn classify_heuristic(messages: &[ChatMessage]) -> (Category, u8) {
    let last_user = last_user_text(messages);
    let category = detect_category(&last_user);
    let complexity = score_complexity(messages, &last_user);
    (category, complexity)
}
