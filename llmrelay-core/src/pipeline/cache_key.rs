//! Key construction for the response cache and the dedup guard (§4.5).
//! Both hash over the same shape — provider, model, system prompt, and the
//! full message list — the dedup key just omits the resolved model so
//! retries of the same request land on the same fingerprint even before
//! routing decides which model answers it.

use sha2::{Digest, Sha256};

use llmrelay_protocol::ChatCompletionRequest;

fn system_prompt(request: &ChatCompletionRequest) -> String {
    request
        .messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .unwrap_or_default()
}

fn messages_fingerprint(request: &ChatCompletionRequest) -> String {
    request
        .messages
        .iter()
        .map(|m| {
            let text = m.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
            format!("{}:{}", m.role, text)
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// `sha256(provider:model || system prompt || messages)`, keying the
/// response cache.
pub fn cache_key(provider_id: &str, model_id: &str, request: &ChatCompletionRequest) -> String {
    let pinned = format!("{provider_id}:{model_id}");
    hash(&[&pinned, &system_prompt(request), &messages_fingerprint(request)])
}

/// `sha256(system prompt || messages)`, independent of the resolved model,
/// keying the 5-second dedup guard against duplicate client retries fired
/// before routing completes.
pub fn dedup_fingerprint(request: &ChatCompletionRequest) -> String {
    hash(&[&system_prompt(request), &messages_fingerprint(request)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::{ChatMessage, MessageContent};

    fn request(messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages,
            model: "auto".into(),
            stream: false,
            stream_options: None,
            temperature: None,
            max_tokens: None,
            stop: None,
            tools: None,
            tool_choice: None,
        }
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage { role: "user".into(), content: Some(MessageContent::String(text.into())) }
    }

    #[test]
    fn identical_requests_produce_identical_cache_keys() {
        let a = request(vec![user("hello")]);
        let b = request(vec![user("hello")]);
        assert_eq!(cache_key("openai", "gpt-4o-mini", &a), cache_key("openai", "gpt-4o-mini", &b));
    }

    #[test]
    fn different_models_produce_different_cache_keys() {
        let req = request(vec![user("hello")]);
        assert_ne!(cache_key("openai", "gpt-4o-mini", &req), cache_key("openai", "gpt-4o", &req));
    }

    #[test]
    fn dedup_fingerprint_is_model_independent() {
        let req = request(vec![user("hello")]);
        let fp_a = dedup_fingerprint(&req);
        let fp_b = dedup_fingerprint(&req);
        assert_eq!(fp_a, fp_b);
        assert_ne!(fp_a, cache_key("openai", "gpt-4o-mini", &req));
    }
}
