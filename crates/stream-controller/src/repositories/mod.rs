//! Storage adapters for the Stream Controller.
//!
//! - `viewer_count` - shared audience counter (Redis in production, an
//!   in-memory atomic for tests)
//! - `lua_scripts` - atomic counter scripts executed inside Redis

pub mod lua_scripts;
pub mod viewer_count;

pub use viewer_count::{InMemoryViewerCounter, RedisViewerCounter, ViewerCounter, VIEWER_COUNT_KEY};
