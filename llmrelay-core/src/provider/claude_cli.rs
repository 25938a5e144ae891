//! Claude CLI subprocess adapter. Spawns the `claude` binary with NDJSON
//! streaming output and offers three dispatch modes (warm pool, pinned,
//! ephemeral), mirroring how a long-lived local tool process is normally
//! driven: `Stdio::piped()` stdin/stdout, line-buffered NDJSON, and a
//! timeout wrapping each exchange.
//!
//! The warm pool tracks, per model, a context log of message digests the
//! process has already observed. A new request's backfill delta (the
//! messages past the longest shared prefix, minus the final turn) is
//! replayed silently before the real turn is sent, so the process's own
//! conversational state stays in sync without resending the full prompt
//! every time.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

use llmrelay_protocol::ChatMessage;

use super::{
    CompletionResponse, ProviderAdapter, ProviderError, ProviderStream, ProviderStreamEvent,
    UpstreamRequest,
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const RESULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    WarmPool,
    Pinned,
    Ephemeral,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchMode::WarmPool => "warm_pool",
            DispatchMode::Pinned => "pinned",
            DispatchMode::Ephemeral => "ephemeral",
        }
    }
}

struct WarmProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    context_log: Vec<String>,
    last_used: Instant,
}

struct Inner {
    binary: String,
    mode: DispatchMode,
    pool: Mutex<HashMap<String, WarmProcess>>,
    last_dispatch_mode: StdMutex<DispatchMode>,
}

/// Subprocess provider. Cheap to clone; clones share the same warm pool.
#[derive(Clone)]
pub struct ClaudeCliAdapter(Arc<Inner>);

impl ClaudeCliAdapter {
    pub fn new(binary: impl Into<String>, mode: DispatchMode) -> Self {
        Self(Arc::new(Inner {
            binary: binary.into(),
            mode,
            pool: Mutex::new(HashMap::new()),
            last_dispatch_mode: StdMutex::new(mode),
        }))
    }

    pub fn last_dispatch_mode(&self) -> DispatchMode {
        *self.0.last_dispatch_mode.lock().unwrap()
    }

    fn digest(message: &ChatMessage) -> String {
        let mut hasher = Sha256::new();
        hasher.update(message.role.as_bytes());
        let text = message.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn spawn(&self, model_id: &str) -> Result<WarmProcess, ProviderError> {
        let mut cmd = Command::new(&self.0.binary);
        cmd.args(["--model", model_id, "--output-format", "stream-json"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| ProviderError::Process(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Process("subprocess has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Process("subprocess has no stdout".into()))?;
        Ok(WarmProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            context_log: Vec::new(),
            last_used: Instant::now(),
        })
    }

    /// Pool key for warm-pool mode is the model id; pinned mode collapses
    /// every model onto a single slot, tearing down a stale model's process.
    fn pool_key(&self, model_id: &str) -> String {
        match self.0.mode {
            DispatchMode::WarmPool => model_id.to_string(),
            DispatchMode::Pinned | DispatchMode::Ephemeral => "pinned".to_string(),
        }
    }

    /// Removes a ready process from the pool (spawning or respawning as
    /// needed), so the caller holds exclusive access for the duration of
    /// one exchange. This is the acquire half of acquire/release.
    async fn acquire(&self, model_id: &str) -> Result<(String, WarmProcess), ProviderError> {
        let key = self.pool_key(model_id);
        let mut pool = self.0.pool.lock().await;
        if let Some(mut proc) = pool.remove(&key) {
            let dead = matches!(proc.child.try_wait(), Ok(Some(_)) | Err(_));
            let stale = self.0.mode == DispatchMode::Pinned && proc.context_log.first().is_some();
            let expired = proc.last_used.elapsed() > IDLE_TIMEOUT;
            if !dead && !expired && !(stale && self.pool_key(model_id) != key) {
                return Ok((key, proc));
            }
            let _ = proc.child.start_kill();
        }
        Ok((key, self.spawn(model_id)?))
    }

    /// Release puts the process back for reuse (warm pool and pinned) or
    /// kills it (ephemeral never keeps a process around).
    async fn release(&self, key: String, mut proc: WarmProcess) {
        if self.0.mode == DispatchMode::Ephemeral {
            let _ = proc.child.start_kill();
            return;
        }
        proc.last_used = Instant::now();
        self.0.pool.lock().await.insert(key, proc);
    }

    async fn send_line(proc: &mut WarmProcess, text: &str) -> Result<(), ProviderError> {
        let line = serde_json::json!({"type": "user", "message": text}).to_string();
        proc.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;
        proc.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))
    }

    /// Sends one message and awaits the terminal `result` event, returning
    /// its text and success flag. Used both for silent backfill replay
    /// (caller discards the text) and for non-streaming completion.
    async fn send_and_await_result(
        proc: &mut WarmProcess,
        text: &str,
    ) -> Result<(String, bool), ProviderError> {
        Self::send_line(proc, text).await?;
        let mut buf = String::new();
        let deadline = Instant::now() + RESULT_TIMEOUT;
        loop {
            if Instant::now() > deadline {
                return Err(ProviderError::Process("subprocess result timed out".into()));
            }
            buf.clear();
            let n = proc
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| ProviderError::Process(e.to_string()))?;
            if n == 0 {
                return Err(ProviderError::Process("subprocess closed stdout".into()));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if event.get("type").and_then(|t| t.as_str()) == Some("result") {
                let text = event.get("result").and_then(|r| r.as_str()).unwrap_or_default().to_string();
                let success = event.get("success").and_then(|s| s.as_bool()).unwrap_or(true);
                return Ok((text, success));
            }
        }
    }

    fn backfill_delta<'a>(context_log: &[String], messages: &'a [ChatMessage]) -> &'a [ChatMessage] {
        let digests: Vec<String> = messages.iter().map(Self::digest).collect();
        let common = context_log
            .iter()
            .zip(digests.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let end = messages.len().saturating_sub(1);
        if common >= end {
            &[]
        } else {
            &messages[common..end]
        }
    }

    async fn run_backfill(proc: &mut WarmProcess, backfill: &[ChatMessage]) -> Result<(), ProviderError> {
        for msg in backfill {
            let text = msg.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
            Self::send_and_await_result(proc, &text).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeCliAdapter {
    fn provider_id(&self) -> &str {
        "claude-cli"
    }

    fn dispatch_mode(&self) -> &'static str {
        self.last_dispatch_mode().as_str()
    }

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
        *self.0.last_dispatch_mode.lock().unwrap() = self.0.mode;
        let (key, mut proc) = self.acquire(&request.model_id).await?;

        let backfill = if self.0.mode == DispatchMode::Ephemeral {
            Vec::new()
        } else {
            Self::backfill_delta(&proc.context_log, &request.messages).to_vec()
        };
        let outcome = async {
            Self::run_backfill(&mut proc, &backfill).await?;
            let final_turn = request
                .messages
                .last()
                .and_then(|m| m.content.as_ref())
                .map(|c| c.as_text())
                .unwrap_or_default();
            Self::send_and_await_result(&mut proc, &final_turn).await
        }
        .await;

        if self.0.mode != DispatchMode::Ephemeral {
            proc.context_log = request.messages.iter().map(Self::digest).collect();
        }
        self.release(key, proc).await;

        let (text, success) = outcome?;
        if !success {
            return Err(ProviderError::Upstream {
                status: 500,
                body: text,
            });
        }
        Ok(CompletionResponse {
            content: text,
            tool_calls: Vec::new(),
            finish_reason: Some("stop".into()),
            usage: None,
        })
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
        *self.0.last_dispatch_mode.lock().unwrap() = self.0.mode;
        let (key, mut proc) = self.acquire(&request.model_id).await?;

        let backfill = if self.0.mode == DispatchMode::Ephemeral {
            Vec::new()
        } else {
            Self::backfill_delta(&proc.context_log, &request.messages).to_vec()
        };
        if let Err(e) = Self::run_backfill(&mut proc, &backfill).await {
            self.release(key, proc).await;
            return Err(e);
        }

        let final_turn = request
            .messages
            .last()
            .and_then(|m| m.content.as_ref())
            .map(|c| c.as_text())
            .unwrap_or_default();
        if let Err(e) = Self::send_line(&mut proc, &final_turn).await {
            self.release(key, proc).await;
            return Err(e);
        }

        let digests: Vec<String> = request.messages.iter().map(Self::digest).collect();
        let ephemeral = self.0.mode == DispatchMode::Ephemeral;
        let adapter = self.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut buf = String::new();
            loop {
                buf.clear();
                let n = match proc.stdout.read_line(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::Process(e.to_string())));
                        break;
                    }
                };
                if n == 0 {
                    let _ = tx.send(Err(ProviderError::Process("subprocess closed stdout".into())));
                    break;
                }
                let trimmed = buf.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let event: serde_json::Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                match event.get("type").and_then(|t| t.as_str()) {
                    Some("content") => {
                        if let Some(text) = event.get("text").and_then(|t| t.as_str()) {
                            if !text.is_empty() {
                                let _ = tx.send(Ok(ProviderStreamEvent::TextDelta(text.to_string())));
                            }
                        }
                    }
                    Some("result") => {
                        let success = event.get("success").and_then(|s| s.as_bool()).unwrap_or(true);
                        let _ = tx.send(Ok(ProviderStreamEvent::Done {
                            finish_reason: if success { "stop".into() } else { "error".into() },
                        }));
                        break;
                    }
                    _ => {}
                }
            }
            if !ephemeral {
                proc.context_log = digests;
            }
            adapter.release(key, proc).await;
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::MessageContent;

    fn msg(role: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: role.into(),
            content: Some(MessageContent::String(text.into())),
        }
    }

    #[test]
    fn digest_differs_for_different_content() {
        let a = ClaudeCliAdapter::digest(&msg("user", "hello"));
        let b = ClaudeCliAdapter::digest(&msg("user", "goodbye"));
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_stable_for_same_content() {
        let a = ClaudeCliAdapter::digest(&msg("user", "hello"));
        let b = ClaudeCliAdapter::digest(&msg("user", "hello"));
        assert_eq!(a, b);
    }

    #[test]
    fn backfill_delta_excludes_shared_prefix_and_final_turn() {
        let context_log = vec![ClaudeCliAdapter::digest(&msg("user", "first"))];
        let messages = vec![
            msg("user", "first"),
            msg("assistant", "reply"),
            msg("user", "second"),
        ];
        let delta = ClaudeCliAdapter::backfill_delta(&context_log, &messages);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].role, "assistant");
    }

    #[test]
    fn backfill_delta_is_empty_when_log_already_covers_all_but_final_turn() {
        let context_log = vec![
            ClaudeCliAdapter::digest(&msg("user", "first")),
            ClaudeCliAdapter::digest(&msg("assistant", "reply")),
        ];
        let messages = vec![msg("user", "first"), msg("assistant", "reply"), msg("user", "second")];
        let delta = ClaudeCliAdapter::backfill_delta(&context_log, &messages);
        assert!(delta.is_empty());
    }
}
