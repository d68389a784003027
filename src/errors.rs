//! Typed error hierarchy for buildsmith.
//!
//! Most plumbing returns `anyhow::Result` with context attached. The variants
//! here are the conditions a caller has to tell apart:
//! - `BuildError`: fatal input errors, cancellation and unsafe writes
//! - `BackendError` (in [`crate::llm`]): generation backend failures

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the build pipeline that callers match on.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Specification is empty or missing at {path}")]
    MissingSpec { path: PathBuf },

    #[error("Could not recover a valid {what} from the response after {attempts} strategies")]
    InvalidResponse { what: &'static str, attempts: usize },

    #[error("Planner returned an empty task list")]
    EmptyPlan,

    #[error("Build cancelled by operator")]
    Cancelled,

    #[error("Invalid firewall pattern '{pattern}': {source}")]
    InvalidPolicy {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Refusing to write outside the project root: {path}")]
    UnsafePath { path: String },
}

impl BuildError {
    /// True when the error chain carries an operator cancellation.
    pub fn is_cancellation(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<BuildError>(),
                Some(BuildError::Cancelled)
            )
        })
    }
}
