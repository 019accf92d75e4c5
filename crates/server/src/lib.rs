//! Process shell around the content pipeline: status API and metrics.

pub mod api;
pub mod metrics;
pub mod state;
