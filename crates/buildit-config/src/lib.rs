//! Pipeline document parsing and collaborator environment wiring for the
//! BuildIt CI/CD execution engine.
//!
//! This crate handles:
//! - Parsing, validating, and planning pipeline documents (`pipeline`,
//!   backed by the source-span scanner in `span`)
//! - Reading collaborator configuration from the process environment
//!   (`system`)

pub mod error;
pub mod pipeline;
pub mod span;
pub mod system;

pub use error::{ConfigError, ConfigResult};
