//! Content pipeline stages and their runner.
//!
//! Stages never talk to each other directly. Each one polls the store for
//! work in a particular state and moves it forward:
//!
//! 1. discovery: seed topics to classified, scored keywords
//! 2. scripting: keywords to scripts
//! 3. rendering: scripts to rendered videos, per format
//! 4. scheduling: rendered videos to unlisted uploads under the daily quota
//! 5. publishing: due uploads to public videos

mod config;
mod discovery;
mod policy;
mod publishing;
mod rendering;
mod runner;
mod scheduling;
mod scripting;
mod types;

pub use config::*;
pub use discovery::{
    interest_topics, ChannelSeedProvider, Reprioritizer, SeedProvider, TopicDiscovery,
};
pub use policy::{retry_async, sleep_or_shutdown};
pub use publishing::UploadPublisher;
pub use rendering::RenderStage;
pub use runner::{Pipeline, PipelineServices};
pub use scheduling::{day_window, publish_time, UploadScheduler};
pub use scripting::{ScriptGenerator, ScriptOutcome};
pub use types::{Pass, PipelineError, PipelineStatus, Stage};
