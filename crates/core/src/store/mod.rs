//! Work-item store.
//!
//! Keywords, channels, uploads and topic expansions live here. Pipeline
//! loops never talk to each other directly; they communicate through the
//! lifecycle states recorded in this store.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteStore;
pub use traits::{
    ChannelStore, KeywordStore, StoreError, TopicSearchStore, UploadStore, WorkStore,
};
pub use types::{
    Channel, ChannelFilter, DayWindow, Keyword, KeywordCounts, NewChannel, NewKeyword, NewUpload,
    RenderState, Script, ScriptState, TopicSearch, Upload, UploadCounts, UploadInsert,
    VideoFormat, VideoRef, Visibility,
};
