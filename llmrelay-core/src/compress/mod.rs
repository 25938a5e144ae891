//! Five-stage prompt compressor. Each stage is independently infallible (no
//! I/O, no panics expected) and records its own before/after token
//! estimate; a stage that can't usefully act on a given message list is a
//! no-op rather than an error.

mod code_compressor;
mod context_trimmer;
mod normalize;
mod structural_dedup;
mod symbol_table;

use llmrelay_protocol::ChatMessage;

const CONTEXT_TRIMMER_THRESHOLD_TOKENS: u32 = 150_000;

/// Rough token estimate (`chars / 4`), consistent with the classifier's use
/// of the same ratio elsewhere in the pipeline.
pub fn estimate_tokens(messages: &[ChatMessage]) -> u32 {
    let chars: usize = messages
        .iter()
        .filter_map(|m| m.content.as_ref())
        .map(|c| c.as_text().len())
        .sum();
    (chars / 4) as u32
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: &'static str,
    pub tokens_before: u32,
    pub tokens_after: u32,
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub messages: Vec<ChatMessage>,
    pub tokens_before: u32,
    pub tokens_after: u32,
    pub stages: Vec<StageReport>,
}

/// Runs all five stages in order. `tokensAfter <= tokensBefore` always holds
/// (compression monotonicity); the last message's text body survives intact
/// except through the trimmer, and even there the final pair is untouched.
pub fn compress(messages: &[ChatMessage]) -> CompressionResult {
    let tokens_before = estimate_tokens(messages);
    let mut current = messages.to_vec();
    let mut stages = Vec::with_capacity(5);

    macro_rules! stage {
        ($name:expr, $f:expr) => {{
            let before = estimate_tokens(&current);
            current = $f(&current);
            let after = estimate_tokens(&current).min(before);
            stages.push(StageReport {
                name: $name,
                tokens_before: before,
                tokens_after: after,
            });
        }};
    }

    stage!("normalize", normalize::normalize);
    stage!("structural_dedup", structural_dedup::deduplicate);
    stage!("symbol_table", symbol_table::apply);
    stage!("code_compressor", code_compressor::compress_code_blocks);

    if estimate_tokens(&current) > CONTEXT_TRIMMER_THRESHOLD_TOKENS {
        stage!("context_trimmer", context_trimmer::trim);
    }

    let tokens_after = estimate_tokens(&current).min(tokens_before);
    CompressionResult {
        messages: current,
        tokens_before,
        tokens_after,
        stages,
    }
}
