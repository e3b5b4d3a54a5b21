use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Journal;
use crate::Deployment;
use crate::Error;
use crate::Result;
use crate::Service;

/// Scripted service for lifecycle tests: configurable delays, scripted
/// failures, and event recording through a shared [`Journal`].
pub struct TestService {
    hostname: String,
    startup_delay: Duration,
    shutdown_delay: Duration,
    fail_startup: bool,
    fail_shutdown: bool,
    journal: Journal,
    plane: Mutex<String>,
    deployment: Mutex<Deployment>,
    started: AtomicBool,
}

impl TestService {
    pub fn new(hostname: &str) -> Self {
        TestService {
            hostname: hostname.to_string(),
            startup_delay: Duration::ZERO,
            shutdown_delay: Duration::ZERO,
            fail_startup: false,
            fail_shutdown: false,
            journal: Journal::default(),
            plane: Mutex::new(String::new()),
            deployment: Mutex::new(Deployment::default()),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_journal(
        mut self,
        journal: &Journal,
    ) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn with_startup_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_shutdown_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.shutdown_delay = delay;
        self
    }

    pub fn failing_startup(mut self) -> Self {
        self.fail_startup = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn plane(&self) -> String {
        self.plane.lock().clone()
    }

    pub fn deployment(&self) -> Deployment {
        *self.deployment.lock()
    }
}

#[async_trait]
impl Service for TestService {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    async fn startup(&self) -> Result<()> {
        if !self.startup_delay.is_zero() {
            tokio::time::sleep(self.startup_delay).await;
        }
        if self.fail_startup {
            self.journal.record(format!("{}:up-failed", self.hostname));
            return Err(Error::Fatal(format!(
                "scripted startup failure of '{}'",
                self.hostname
            )));
        }
        self.started.store(true, Ordering::SeqCst);
        self.journal.record(format!("{}:up", self.hostname));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.shutdown_delay.is_zero() {
            tokio::time::sleep(self.shutdown_delay).await;
        }
        if self.fail_shutdown {
            self.journal.record(format!("{}:down-failed", self.hostname));
            return Err(Error::Fatal(format!(
                "scripted shutdown failure of '{}'",
                self.hostname
            )));
        }
        self.started.store(false, Ordering::SeqCst);
        self.journal.record(format!("{}:down", self.hostname));
        Ok(())
    }

    fn set_plane(
        &self,
        plane: &str,
    ) {
        *self.plane.lock() = plane.to_string();
    }

    fn set_deployment(
        &self,
        deployment: Deployment,
    ) {
        *self.deployment.lock() = deployment;
    }
}
