use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::info;

use super::Group;
use crate::constants::PLANE_ALPHABET;
use crate::constants::PLANE_LEN;
use crate::constants::TESTING_TIMEOUT_MS;
use crate::Deployment;
use crate::LifecycleError;
use crate::Result;
use crate::Service;
use crate::Settings;

/// Orchestrates the lifecycle of an ordered list of service groups.
///
/// Groups start in insertion order and stop in exact reverse order, each
/// lifecycle call bounded by one shared deadline; members inside a group run
/// concurrently (see [`Group`]). The application also carries the plane and
/// deployment it stamps onto every added service.
///
/// All methods take `&self`; the group list is guarded internally and
/// startup/shutdown serialize against each other. Calling `startup` twice
/// without a shutdown in between is refused.
pub struct Application {
    plane: String,
    deployment: Deployment,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    groups: Mutex<Vec<Group>>,
    /// Serializes startup/shutdown/add_and_startup against each other.
    lifecycle: tokio::sync::Mutex<()>,
    started: AtomicBool,
    interrupted: Notify,
}

impl Application {
    /// Builds a production application seeded from `settings`. An empty
    /// plane in the settings gets replaced by a freshly generated one.
    pub fn new(settings: &Settings) -> Self {
        let plane = if settings.plane.is_empty() {
            random_plane()
        } else {
            settings.plane.clone()
        };
        info!(
            "new application on plane '{}' ({} deployment)",
            plane, settings.deployment
        );
        Application {
            plane,
            deployment: settings.deployment,
            startup_timeout: Duration::from_millis(settings.startup_timeout_ms),
            shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
            groups: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            started: AtomicBool::new(false),
            interrupted: Notify::new(),
        }
    }

    /// Builds an application for tests: a random plane regardless of the
    /// environment, `TESTING` deployment and short timeouts. The random
    /// plane keeps concurrently running tests invisible to each other even
    /// when they share one bus.
    pub fn new_testing() -> Self {
        let settings = Settings {
            plane: String::new(),
            deployment: Deployment::Testing,
            startup_timeout_ms: TESTING_TIMEOUT_MS,
            shutdown_timeout_ms: TESTING_TIMEOUT_MS,
            ..Settings::default()
        };
        Application::new(&settings)
    }

    pub fn plane(&self) -> &str {
        &self.plane
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn service_count(&self) -> usize {
        self.groups.lock().iter().map(Group::len).sum()
    }

    /// Appends a new group made of `services` and stamps the application's
    /// plane and deployment onto each of them.
    ///
    /// The stamp happens now: changing nothing retroactively is what lets a
    /// service bind its subscriptions to the plane it was added under.
    pub fn add(
        &self,
        services: Vec<Arc<dyn Service>>,
    ) {
        if services.is_empty() {
            return;
        }
        for service in &services {
            service.set_plane(&self.plane);
            service.set_deployment(self.deployment);
        }
        self.groups.lock().push(Group::new(services));
    }

    /// [`Application::add`] followed by startup of only that new group,
    /// bounded by the startup timeout. Previously added groups are left
    /// alone.
    pub async fn add_and_startup(
        &self,
        services: Vec<Arc<dyn Service>>,
    ) -> Result<()> {
        if services.is_empty() {
            return Ok(());
        }
        let _lifecycle = self.lifecycle.lock().await;

        for service in &services {
            service.set_plane(&self.plane);
            service.set_deployment(self.deployment);
        }
        let group = Group::new(services);
        let group_index = {
            let mut groups = self.groups.lock();
            groups.push(group.clone());
            groups.len() - 1
        };

        let deadline = Instant::now() + self.startup_timeout;
        group.startup(group_index, deadline).await
    }

    /// Removes `services` from whichever groups contain them, keeping the
    /// order and grouping of everything else. Groups left empty disappear.
    ///
    /// Removed services are NOT shut down; they keep running under the
    /// caller's direct control.
    pub fn remove(
        &self,
        services: &[Arc<dyn Service>],
    ) {
        let mut groups = self.groups.lock();
        for group in groups.iter_mut() {
            group.remove(services);
        }
        groups.retain(|group| !group.is_empty());
    }

    /// Starts all groups sequentially in insertion order.
    ///
    /// Every group runs under the same deadline, computed once at the start
    /// of this call, so a slow early group shrinks the budget of the later
    /// ones. The first group that fails stops the sequence and leaves the
    /// remaining groups unstarted; already started groups are not rolled
    /// back.
    pub async fn startup(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.started.load(Ordering::Acquire) {
            return Err(LifecycleError::AlreadyStarted.into());
        }

        let groups = self.groups.lock().clone();
        let deadline = Instant::now() + self.startup_timeout;
        info!(
            "starting {} group(s) on plane '{}'",
            groups.len(),
            self.plane
        );
        for (group_index, group) in groups.iter().enumerate() {
            group.startup(group_index, deadline).await?;
        }

        self.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Stops all groups sequentially in reverse insertion order, under one
    /// shared deadline.
    ///
    /// The first group that fails stops the sequence: whatever the failed
    /// group depends on is deliberately left running rather than torn down
    /// underneath it.
    pub async fn shutdown(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.started.load(Ordering::Acquire) {
            return Err(LifecycleError::NotStarted.into());
        }

        let groups = self.groups.lock().clone();
        let deadline = Instant::now() + self.shutdown_timeout;
        info!(
            "stopping {} group(s) on plane '{}'",
            groups.len(),
            self.plane
        );
        for (group_index, group) in groups.iter().enumerate().rev() {
            group.shutdown(group_index, deadline).await?;
        }

        self.started.store(false, Ordering::Release);
        Ok(())
    }

    /// Delivers one interrupt, unblocking one [`Application::wait_for_interrupt`]
    /// caller. The interrupt is remembered when nobody is waiting yet.
    pub fn interrupt(&self) {
        info!("interrupt requested on plane '{}'", self.plane);
        self.interrupted.notify_one();
    }

    /// Blocks until an interrupt arrives, either programmatically through
    /// [`Application::interrupt`] or via SIGINT/SIGTERM/Ctrl+C.
    ///
    /// Each application owns its own interrupt slot, so applications sharing
    /// a process never unblock each other programmatically. Process signals,
    /// by nature, reach every waiter.
    pub async fn wait_for_interrupt(&self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt()).map_err(LifecycleError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(LifecycleError::Signal)?;
        tokio::select! {
            _ = self.interrupted.notified() => {
                info!("interrupt delivered on plane '{}'", self.plane);
            }
            _ = sigint.recv() => {
                info!("SIGINT detected.");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM detected.");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C detected.");
            }
        }
        Ok(())
    }

    /// The long-running process lifecycle: startup, wait for an interrupt,
    /// shutdown.
    ///
    /// A failed startup returns promptly without waiting for an interrupt.
    /// Shutdown errors are returned to the caller, who typically logs them
    /// and exits anyway.
    pub async fn run(&self) -> Result<()> {
        self.startup().await?;
        info!("application running on plane '{}'", self.plane);
        self.wait_for_interrupt().await?;
        self.shutdown().await
    }
}

impl fmt::Debug for Application {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Application")
            .field("plane", &self.plane)
            .field("deployment", &self.deployment)
            .field("groups", &self.group_count())
            .finish()
    }
}

fn random_plane() -> String {
    nanoid::nanoid!(PLANE_LEN, &PLANE_ALPHABET)
}
