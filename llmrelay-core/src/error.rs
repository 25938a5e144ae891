//! Pipeline-wide error type. Individual modules (provider, store) keep their
//! own error enums; this is what the orchestrator collapses them into before
//! handing a response back to the HTTP layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no model available for tier {0:?}")]
    NoModelForTier(llmrelay_catalog::Tier),
    #[error("budget exhausted for period {0:?}")]
    BudgetExhausted(llmrelay_catalog::BudgetPeriod),
    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),
    #[error("storage error: {0}")]
    Store(#[from] llmrelay_store::StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("all candidate models failed")]
    AllCandidatesFailed,
    #[error("duplicate request: {0}")]
    DuplicateRequest(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}
