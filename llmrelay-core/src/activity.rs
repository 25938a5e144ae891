//! Process-local registry of in-flight requests, backing the live activity
//! feed (§4.11). Entries are registered at dispatch, updated as streaming
//! chunks arrive, and swept once stale — there is no persistence here, the
//! store crate owns the durable history.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

const SWEEP_AGE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ActiveRequest {
    pub id: String,
    pub category: Option<String>,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    pub started_at: Instant,
}

#[derive(Debug)]
struct Entry {
    request: ActiveRequest,
    text_so_far: String,
    tokens_out_estimate: AtomicU32,
    last_update: std::sync::Mutex<Instant>,
}

/// Tracks requests currently being dispatched. Cheap to clone (wraps an
/// `Arc`-like `DashMap` internally via `Default`); one instance is shared
/// process-wide.
#[derive(Default)]
pub struct ActivityRegistry {
    entries: DashMap<String, Entry>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request: ActiveRequest) {
        let now = Instant::now();
        self.entries.insert(
            request.id.clone(),
            Entry {
                request,
                text_so_far: String::new(),
                tokens_out_estimate: AtomicU32::new(0),
                last_update: std::sync::Mutex::new(now),
            },
        );
    }

    /// Appends a streamed text delta, updating the rough `len / 4`
    /// token-out estimate and bumping the entry's last-seen time.
    pub fn record_chunk(&self, id: &str, delta: &str) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.text_so_far.push_str(delta);
            let estimate = (entry.text_so_far.len() / 4) as u32;
            entry.tokens_out_estimate.store(estimate, Ordering::Relaxed);
            *entry.last_update.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        }
    }

    pub fn tokens_out_estimate(&self, id: &str) -> Option<u32> {
        self.entries.get(id).map(|e| e.tokens_out_estimate.load(Ordering::Relaxed))
    }

    pub fn unregister(&self, id: &str) {
        self.entries.remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of currently tracked requests, for the SSE activity feed.
    pub fn snapshot(&self) -> Vec<ActiveRequest> {
        self.entries.iter().map(|e| e.request.clone()).collect()
    }

    /// Drops entries whose last update is older than the sweep age. A
    /// request that hangs mid-stream (dropped connection, stalled
    /// provider) is not allowed to linger in the feed forever.
    pub fn sweep(&self) {
        self.entries.retain(|_, entry| {
            let last = *entry.last_update.lock().unwrap_or_else(|e| e.into_inner());
            last.elapsed() < SWEEP_AGE
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ActiveRequest {
        ActiveRequest {
            id: id.into(),
            category: Some("code_gen".into()),
            provider_id: Some("openai".into()),
            model_id: Some("gpt-4o-mini".into()),
            started_at: Instant::now(),
        }
    }

    #[test]
    fn register_and_unregister_roundtrip() {
        let registry = ActivityRegistry::new();
        registry.register(request("req-1"));
        assert_eq!(registry.len(), 1);
        registry.unregister("req-1");
        assert!(registry.is_empty());
    }

    #[test]
    fn chunk_accumulation_updates_the_token_estimate() {
        let registry = ActivityRegistry::new();
        registry.register(request("req-1"));
        registry.record_chunk("req-1", "abcd");
        registry.record_chunk("req-1", "efgh");
        assert_eq!(registry.tokens_out_estimate("req-1"), Some(2));
    }

    #[test]
    fn snapshot_reflects_registered_requests() {
        let registry = ActivityRegistry::new();
        registry.register(request("req-1"));
        registry.register(request("req-2"));
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
    }
}
