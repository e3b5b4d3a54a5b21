//! Application lifecycle orchestration.
//!
//! An [`Application`] owns an ordered list of [`Group`]s of services. Groups
//! start sequentially in insertion order and stop in exact reverse order;
//! members inside a group start and stop concurrently. One deadline bounds
//! each whole startup or shutdown pass.

mod application;
mod group;
mod harness;

pub use application::*;
pub use group::*;
pub use harness::*;
