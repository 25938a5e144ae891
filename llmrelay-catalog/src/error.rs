//! Catalog-related errors.

use thiserror::Error;

/// Errors that can occur when working with the provider/model/budget catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The requested tier has no enabled models and escalation found nothing above it.
    #[error("no enabled model available for tier {0:?}")]
    NoModelForTier(Tier),
    /// `(provider_id, model_id)` does not name a known model.
    #[error("unknown model {provider_id}:{model_id}")]
    UnknownModel {
        provider_id: String,
        model_id: String,
    },
}

use crate::Tier;
