//! Stage 3: symbol table. Finds phrases of 5-15 words that repeat at least
//! three times across the conversation, assigns each a short symbol
//! (`§1`..`§N`), substitutes every occurrence, and prepends a definitions
//! block mapping symbols back to their text.

use std::collections::HashMap;

use llmrelay_protocol::{ChatMessage, MessageContent};

const MIN_PHRASE_CHARS: usize = 20;
const MIN_WORDS: usize = 5;
const MAX_WORDS: usize = 15;
const MIN_OCCURRENCES: usize = 3;
const MAX_SYMBOLS: usize = 10;

fn full_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Candidate phrases long enough and frequent enough to be worth a symbol,
/// ranked by total bytes saved, longest-first so overlapping shorter
/// candidates are dropped in favor of the phrase that subsumes them.
fn candidate_phrases(corpus: &str) -> Vec<String> {
    let words: Vec<&str> = corpus.split_whitespace().collect();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for window in MIN_WORDS..=MAX_WORDS.min(words.len().max(MIN_WORDS)) {
        if window > words.len() {
            break;
        }
        for start in 0..=words.len() - window {
            let phrase = words[start..start + window].join(" ");
            if phrase.len() < MIN_PHRASE_CHARS {
                continue;
            }
            *counts.entry(phrase).or_insert(0) += 1;
        }
    }

    let mut candidates: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_OCCURRENCES)
        .collect();
    candidates.sort_by(|a, b| {
        let savings_a = a.0.len() * a.1.saturating_sub(1);
        let savings_b = b.0.len() * b.1.saturating_sub(1);
        savings_b.cmp(&savings_a).then_with(|| b.0.len().cmp(&a.0.len()))
    });

    let mut chosen: Vec<String> = Vec::new();
    for (phrase, _) in candidates {
        if chosen.iter().any(|p: &String| p.contains(&phrase) || phrase.contains(p.as_str())) {
            continue;
        }
        chosen.push(phrase);
        if chosen.len() >= MAX_SYMBOLS {
            break;
        }
    }
    chosen
}

fn substitute(text: &str, symbols: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (phrase, symbol) in symbols {
        out = out.replace(phrase.as_str(), symbol);
    }
    out
}

/// `(symbol, phrase)` pairs in `§1..§N` order, longest phrase first.
fn build_symbol_table(messages: &[ChatMessage]) -> Vec<(String, String)> {
    let corpus = full_text(messages);
    candidate_phrases(&corpus)
        .into_iter()
        .enumerate()
        .map(|(i, phrase)| (format!("§{}", i + 1), phrase))
        .collect()
}

fn definitions_message(symbols: &[(String, String)]) -> ChatMessage {
    let mut body = String::from("Symbol definitions (expand before reasoning about content):\n");
    for (symbol, phrase) in symbols {
        body.push_str(&format!("{symbol} = \"{phrase}\"\n"));
    }
    ChatMessage {
        role: "system".into(),
        content: Some(MessageContent::String(body)),
    }
}

pub fn apply(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let table = build_symbol_table(messages);
    if table.is_empty() {
        return messages.to_vec();
    }

    let symbol_by_phrase: Vec<(String, String)> = table.iter().map(|(s, p)| (p.clone(), s.clone())).collect();

    let mut substituted: Vec<ChatMessage> = messages
        .iter()
        .map(|m| match &m.content {
            Some(MessageContent::String(text)) => ChatMessage {
                role: m.role.clone(),
                content: Some(MessageContent::String(substitute(text, &symbol_by_phrase))),
            },
            _ => m.clone(),
        })
        .collect();

    let insert_at = substituted.iter().take_while(|m| m.role == "system").count();
    substituted.insert(insert_at, definitions_message(&table));
    substituted
}
