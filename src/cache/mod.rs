//! Caching subsystem.
//!
//! [`FifoCache`] is the bounded store behind every translation cache
//! (single texts, UI dictionaries, language detection). Each cache is an
//! explicit instance owned by the service that uses it; there is no shared
//! module-level state.

pub mod fifo;

pub use fifo::{CacheConfig, FifoCache};
