use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::time::timeout_at;
use tokio::time::Instant;
use tracing::error;
use tracing::info;

use crate::LifecycleError;
use crate::Phase;
use crate::Result;
use crate::Service;

/// Services that start and stop together.
///
/// Members of one group are independent of each other: lifecycle calls fan
/// out concurrently and a member's failure never cancels its siblings.
/// Ordering only exists *between* groups, enforced by the application.
#[derive(Clone, Default)]
pub struct Group {
    members: Vec<Arc<dyn Service>>,
}

impl Group {
    pub fn new(members: Vec<Arc<dyn Service>>) -> Self {
        Group { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drops every member that is the same instance as one of `targets`.
    /// Remaining members keep their relative order.
    pub(crate) fn remove(
        &mut self,
        targets: &[Arc<dyn Service>],
    ) {
        self.members
            .retain(|member| !targets.iter().any(|target| Arc::ptr_eq(member, target)));
    }

    /// Starts every member concurrently and waits for all of them, bounded
    /// by `deadline`.
    ///
    /// All members are always attempted; when several fail, the error of the
    /// lowest-index member is returned and the others are logged. Partially
    /// started groups are not rolled back.
    pub(crate) async fn startup(
        &self,
        group_index: usize,
        deadline: Instant,
    ) -> Result<()> {
        self.run_phase(Phase::Startup, group_index, deadline).await
    }

    /// Symmetric fan-out shutdown with the same aggregation policy as
    /// [`Group::startup`].
    pub(crate) async fn shutdown(
        &self,
        group_index: usize,
        deadline: Instant,
    ) -> Result<()> {
        self.run_phase(Phase::Shutdown, group_index, deadline).await
    }

    async fn run_phase(
        &self,
        phase: Phase,
        group_index: usize,
        deadline: Instant,
    ) -> Result<()> {
        info!(
            "group {}: {} of {} service(s)",
            group_index,
            phase,
            self.members.len()
        );

        let calls = self.members.iter().map(|service| {
            let service = Arc::clone(service);
            async move {
                let call = async {
                    match phase {
                        Phase::Startup => service.startup().await,
                        Phase::Shutdown => service.shutdown().await,
                    }
                };
                match timeout_at(deadline, call).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(match phase {
                        Phase::Startup => LifecycleError::ServiceStartup {
                            hostname: service.hostname(),
                            group: group_index,
                            source: Box::new(e),
                        },
                        Phase::Shutdown => LifecycleError::ServiceShutdown {
                            hostname: service.hostname(),
                            group: group_index,
                            source: Box::new(e),
                        },
                    }
                    .into()),
                    // The member may still be running; the deadline only
                    // bounds how long the group waits for it.
                    Err(_) => Err(LifecycleError::Timeout {
                        phase,
                        hostname: service.hostname(),
                        group: group_index,
                    }
                    .into()),
                }
            }
        });

        let mut first_failure = None;
        for result in join_all(calls).await {
            if let Err(e) = result {
                error!("{}", e);
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Group").field("members", &self.members.len()).finish()
    }
}
