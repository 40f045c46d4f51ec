//! Helpers shared by every crate in the workspace.

pub mod clock;
pub mod metrics_defs;
pub mod pagination;
