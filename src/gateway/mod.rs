//! Assembled entry point.
//!
//! [`Hermod::builder()`] wires the interceptor, session guard, statistics
//! collector and translation service around one HTTP client and returns a
//! [`HermodContext`] owning them.

mod builder;
mod context;

pub use builder::{Hermod, HermodBuilder};
pub use context::HermodContext;
