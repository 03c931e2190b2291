//! Configuration parsing/validation/planning errors.
//!
//! Every failure in this crate carries the `SourceSpan` of the offending
//! part of the document (or `SourceSpan::ZERO` when no better position is
//! known, e.g. an entirely empty document) — see SPEC_FULL.md §4.1's
//! failure contract.

use buildit_core::pipeline::SourceSpan;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
    pub span: SourceSpan,
}

impl ConfigError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn at_zero(message: impl Into<String>) -> Self {
        Self::new(message, SourceSpan::ZERO)
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
