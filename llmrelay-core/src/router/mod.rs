//! Router: resolves a requested model name plus classification into a
//! concrete (provider, model) pick, with cost-ordered exploration/
//! exploitation over historical success stats.

mod decision;
mod selection;

pub use decision::{resolve, RouteDecision, RouteRequest};
pub use selection::select_for_tier;
