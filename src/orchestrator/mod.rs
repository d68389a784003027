//! The build state machine: `not_started → planning → building → reviewing → completed`.

pub mod hygiene;
pub mod review;
pub mod runner;
pub mod state;
pub mod workspace;

pub use review::{FixOutcome, FixRecord, ReviewReport};
pub use runner::{BuildOrchestrator, Collaborators};
pub use state::{BuildState, BuildStatus, StateStore, TaskState, TaskStatus, spec_fingerprint};
