//! Per-account session caching.

mod cache;

pub use cache::SessionCache;
