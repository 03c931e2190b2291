//! Repository traits and implementations.

pub mod report;

pub use report::{Filter, PgReportRepo, ReportRepo};
