//! The lifecycle contract every managed microservice implements.
//!
//! The application core treats services as opaque: it never learns what a
//! service does, only how to start it, stop it, and hand it the identifiers
//! of the communication plane it runs on.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Deployment;
use crate::Result;

/// Minimal capability set the application orchestrates.
///
/// Implementations must tolerate `set_plane`/`set_deployment` being called
/// before `startup`; the application propagates both immediately when a
/// service is added to a group.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Hostname the service answers under on the bus. Used for diagnostics
    /// and for resolving the service's configuration domain.
    fn hostname(&self) -> String;

    /// Bring the service up: subscribe endpoints, spawn workers, warm caches.
    async fn startup(&self) -> Result<()>;

    /// Tear the service down and release its bus subscriptions.
    async fn shutdown(&self) -> Result<()>;

    /// Set the communication plane the service addresses its subjects under.
    fn set_plane(&self, plane: &str);

    /// Set the deployment class the service runs in.
    fn set_deployment(&self, deployment: Deployment);
}
