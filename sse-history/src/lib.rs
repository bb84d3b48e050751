#![deny(missing_docs)]
//! Append-only history store and the declarative context builder used to
//! assemble a sampling prompt's surrounding history.
//!
//! The store never mutates a step after it is appended; the builder never
//! mutates the store. Together they implement the "query history, join,
//! truncate" pipeline described for the Sampler Oracle's `context` input.

mod context;
mod store;

pub use context::{ContextBuilder, Query, TRUNCATION_NOTICE};
pub use store::HistoryStore;
