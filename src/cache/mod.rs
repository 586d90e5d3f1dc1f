//! Request cache for backend reads.
//!
//! One [`RequestCache`] instance owns three stores:
//!
//! - **Value store**: key → (value, stored_at, ttl), expired lazily on read
//! - **In-flight tracker**: key → the single shared future for a pending read
//! - **Tag index**: tag ↔ keys, for bulk invalidation after mutations
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_ms = 300000
//! ```
//!
//! With `enabled = false` every read still collapses concurrent identical
//! requests, but nothing is stored.

mod config;
mod error;
mod inflight;
mod keys;
mod lock;
mod orchestrator;
mod registry;
mod store;

pub use config::CacheConfig;
pub use error::FetchError;
pub use inflight::{FetchOutcome, InFlightRequest, InFlightTracker, SharedFetch};
pub use keys::{CacheKey, Tag};
pub use orchestrator::{CacheStats, FetchOptions, RequestCache};
pub use registry::TagIndex;
pub use store::{CacheEntry, CacheStore, CachedValue};
