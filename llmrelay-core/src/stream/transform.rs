//! Converts a provider's native event stream into the canonical
//! OpenAI-compatible `chat.completion.chunk` stream every client sees,
//! regardless of which upstream produced it.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};

use llmrelay_protocol::{ChatCompletionChunk, ChunkChoice, ChunkMeta, ChunkUsage, Delta, DeltaToolCall, DeltaToolCallFunction};

use crate::provider::{ProviderError, ProviderStream, ProviderStreamEvent};

use super::tool_call_scanner::{ScanOutput, ToolCallScanner};

struct TransformState {
    source: ProviderStream,
    meta: ChunkMeta,
    scanner: ToolCallScanner,
    pending: VecDeque<ChatCompletionChunk>,
    sent_role: bool,
    next_tool_index: u32,
    done: bool,
}

fn base_chunk(meta: &mut ChunkMeta) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: meta.id.clone(),
        object: ChatCompletionChunk::OBJECT,
        created: meta.created_secs(),
        model: meta.model.clone(),
        choices: vec![],
        usage: None,
    }
}

fn text_chunk(meta: &mut ChunkMeta, text: String, role: Option<String>) -> ChatCompletionChunk {
    let mut chunk = base_chunk(meta);
    chunk.choices.push(ChunkChoice {
        index: 0,
        delta: Delta {
            role,
            content: Some(text),
            tool_calls: None,
        },
        finish_reason: None,
    });
    chunk
}

fn tool_call_chunk(meta: &mut ChunkMeta, index: u32, name: String, arguments: String) -> ChatCompletionChunk {
    let mut chunk = base_chunk(meta);
    chunk.choices.push(ChunkChoice {
        index: 0,
        delta: Delta {
            role: None,
            content: None,
            tool_calls: Some(vec![DeltaToolCall {
                index,
                id: Some(format!("call_{index}")),
                r#type: Some("function".into()),
                function: Some(DeltaToolCallFunction {
                    name: Some(name),
                    arguments: Some(arguments),
                }),
            }]),
        },
        finish_reason: None,
    });
    chunk
}

fn finish_chunk(meta: &mut ChunkMeta, finish_reason: String) -> ChatCompletionChunk {
    let mut chunk = base_chunk(meta);
    chunk.choices.push(ChunkChoice {
        index: 0,
        delta: Delta::default(),
        finish_reason: Some(finish_reason),
    });
    chunk
}

fn usage_chunk(meta: &mut ChunkMeta, prompt_tokens: u32, completion_tokens: u32) -> ChatCompletionChunk {
    let mut chunk = base_chunk(meta);
    chunk.usage = Some(ChunkUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    });
    chunk
}

fn handle_text_delta(state: &mut TransformState, text: String) {
    for output in state.scanner.push(&text) {
        push_scan_output(state, output);
    }
}

fn push_scan_output(state: &mut TransformState, output: ScanOutput) {
    match output {
        ScanOutput::Text(text) => {
            if text.is_empty() {
                return;
            }
            let role = if state.sent_role { None } else { Some("assistant".to_string()) };
            state.sent_role = true;
            state.pending.push_back(text_chunk(&mut state.meta, text, role));
        }
        ScanOutput::ToolCall { name, arguments } => {
            let index = state.next_tool_index;
            state.next_tool_index += 1;
            state.pending.push_back(tool_call_chunk(&mut state.meta, index, name, arguments));
        }
    }
}

/// Converts `source` into a canonical chunk stream. `id`/`model` seed the
/// chunk metadata shared across the whole response.
pub fn transform_stream(
    source: ProviderStream,
    meta: ChunkMeta,
) -> impl Stream<Item = Result<ChatCompletionChunk, ProviderError>> {
    let state = TransformState {
        source,
        meta,
        scanner: ToolCallScanner::new(),
        pending: VecDeque::new(),
        sent_role: false,
        next_tool_index: 0,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.done {
                return None;
            }
            match state.source.next().await {
                Some(Ok(ProviderStreamEvent::TextDelta(text))) => {
                    handle_text_delta(&mut state, text);
                }
                Some(Ok(ProviderStreamEvent::ToolCallDelta { index, name, arguments_delta, .. })) => {
                    let name = name.unwrap_or_default();
                    state.next_tool_index = state.next_tool_index.max(index + 1);
                    state.pending.push_back(tool_call_chunk(&mut state.meta, index, name, arguments_delta));
                }
                Some(Ok(ProviderStreamEvent::Usage(usage))) => {
                    state
                        .pending
                        .push_back(usage_chunk(&mut state.meta, usage.prompt_tokens, usage.completion_tokens));
                }
                Some(Ok(ProviderStreamEvent::Done { finish_reason })) => {
                    if let Some(output) = state.scanner.flush() {
                        push_scan_output(&mut state, output);
                    }
                    state.pending.push_back(finish_chunk(&mut state.meta, finish_reason));
                    state.done = true;
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::ChunkMeta;

    fn provider_stream(events: Vec<ProviderStreamEvent>) -> ProviderStream {
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn plain_text_deltas_become_content_chunks() {
        let source = provider_stream(vec![
            ProviderStreamEvent::TextDelta("hello".into()),
            ProviderStreamEvent::Done { finish_reason: "stop".into() },
        ]);
        let chunks: Vec<_> = transform_stream(source, ChunkMeta::new("id-1", "model-a")).collect().await;
        let chunks: Vec<_> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("hello"));
        assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunks.last().unwrap().choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn inline_tool_call_markers_are_extracted_from_text() {
        let source = provider_stream(vec![
            ProviderStreamEvent::TextDelta(r#"<tool_call>{"name":"search","arguments":{"q":"x"}}</tool_call>"#.into()),
            ProviderStreamEvent::Done { finish_reason: "tool_calls".into() },
        ]);
        let chunks: Vec<_> = transform_stream(source, ChunkMeta::new("id-1", "model-a")).collect().await;
        let chunks: Vec<_> = chunks.into_iter().map(|c| c.unwrap()).collect();
        let tool_call_chunk = chunks.iter().find(|c| c.choices[0].delta.tool_calls.is_some()).unwrap();
        let call = &tool_call_chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.as_ref().unwrap().name.as_deref(), Some("search"));
    }
}
