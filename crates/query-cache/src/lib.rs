//! Keyed async query cache.
//!
//! Concurrent reads of one key share a single request, failures keep the last
//! good data, and mutations invalidate explicitly named keys plus anything
//! declared as depending on them.

mod cache;
mod error;
mod key;
mod poll;

pub use cache::{CacheConfig, CacheEvent, QueryCache, QuerySnapshot};
pub use error::QueryError;
pub use key::QueryKey;
pub use poll::{ActivityFlag, PollHandle, RefetchInterval};
