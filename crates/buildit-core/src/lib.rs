//! Core domain types and traits for the BuildIt CI/CD execution engine.
//!
//! This crate contains:
//! - Common error types
//! - The pipeline configuration model (`pipeline`): parsed documents,
//!   source spans, and the execution plan
//! - The report model (`report`): pipeline/stage/job reports and status
//! - The `Executor` trait implemented by the container driver
//! - The queue message envelopes (`queue`) carried between the API,
//!   dispatcher, and executor

pub mod error;
pub mod executor;
pub mod pipeline;
pub mod queue;
pub mod report;

pub use error::{Error, Result};
