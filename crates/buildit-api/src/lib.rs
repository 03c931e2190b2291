//! API server for BuildIt CI/CD.
//!
//! A thin HTTP façade (§6.1) over the report store (C2), the waitboard
//! (C4), and the pipeline queue (C5): pipeline submission, filtered
//! report queries, and waitboard-resolved status lookups. Dispatch and
//! execution happen out of process, in `buildit-scheduler`.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
