//! SQLite-backed persistence for the provider/model/budget catalog and the
//! per-request history that feeds the activity feed, analytics, and the
//! router's success statistics.

mod catalog;
mod error;
mod requests;
mod schema;
mod stats;
mod steps;
mod store;

pub use error::StoreError;
pub use requests::RequestRecord;
pub use schema::SCHEMA_VERSION;
pub use stats::ModelStats;
pub use steps::{StepRecord, StepStatus};
pub use store::Store;
