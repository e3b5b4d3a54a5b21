//! Replicated configuration over the bus.
//!
//! The [`Configurator`] microservice owns a [`Repository`] snapshot and
//! serves it to the plane: `values` answers per-service lookups, `refresh`
//! tells every subscribed service to re-pull, and `sync` replicates whole
//! snapshots between peer configurators with timestamp-ordered
//! last-writer-wins reconciliation. [`ConfigClient`] is the subscriber side
//! a service embeds to keep a declared set of properties current.
//!
//! [`Repository`]: crate::Repository

mod client;
mod protocol;
mod service;

pub use client::*;
pub use protocol::*;
pub use service::*;
