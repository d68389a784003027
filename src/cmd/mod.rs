//! CLI command implementations.
//!
//! | Module    | Commands handled                     |
//! |-----------|--------------------------------------|
//! | `build`   | `Build`                              |
//! | `project` | `Init`, `Status`, `Reset`, `Policy`  |

pub mod build;
pub mod project;

pub use build::{BuildOptions, cmd_build};
pub use project::{cmd_init, cmd_policy, cmd_reset, cmd_status};
