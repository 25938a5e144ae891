//! Errors from the response cache / dedup guard backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Other(String),
}
