use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetbus::control_subject;
use fleetbus::Bus;
use fleetbus::DeliveryMode;
use fleetbus::Deployment;
use fleetbus::Result;
use fleetbus::Service;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn eventually(
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn write_source(text: &str) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    std::fs::write(file.path(), text).unwrap();
    file
}

/// Answers `echo` requests on its own hostname with a fixed tag in front of
/// the payload, so tests can tell which instance replied.
pub struct EchoService {
    core: Arc<EchoCore>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

struct EchoCore {
    bus: Arc<dyn Bus>,
    hostname: String,
    tag: String,
    plane: Mutex<String>,
}

impl EchoService {
    pub fn new(
        bus: Arc<dyn Bus>,
        hostname: &str,
        tag: &str,
    ) -> Self {
        EchoService {
            core: Arc::new(EchoCore {
                bus,
                hostname: hostname.to_string(),
                tag: tag.to_string(),
                plane: Mutex::new(String::new()),
            }),
            task: Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Service for EchoService {
    fn hostname(&self) -> String {
        self.core.hostname.clone()
    }

    async fn startup(&self) -> Result<()> {
        let core = Arc::clone(&self.core);
        let plane = core.plane.lock().clone();
        let mut subscription = core
            .bus
            .subscribe(
                &control_subject(&plane, &core.hostname, "echo"),
                DeliveryMode::Balanced,
            )
            .await?;

        let token = CancellationToken::new();
        let serve_token = token.clone();
        *self.task.lock() = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = serve_token.cancelled() => break,
                    Some(mut incoming) = subscription.next() => {
                        let mut reply = core.tag.clone().into_bytes();
                        reply.extend_from_slice(&incoming.envelope.payload);
                        incoming.reply(reply);
                    }
                    else => break,
                }
            }
        }));
        *self.cancel.lock() = Some(token);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        // The guard must be gone before the await.
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }

    fn set_plane(
        &self,
        plane: &str,
    ) {
        *self.core.plane.lock() = plane.to_string();
    }

    fn set_deployment(
        &self,
        _deployment: Deployment,
    ) {
    }
}

/// Takes a fixed time to start, then succeeds. Shutdown is immediate.
pub struct SleepyService {
    hostname: String,
    startup_delay: Duration,
}

impl SleepyService {
    pub fn new(
        hostname: &str,
        startup_delay: Duration,
    ) -> Self {
        SleepyService {
            hostname: hostname.to_string(),
            startup_delay,
        }
    }
}

#[async_trait]
impl Service for SleepyService {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    async fn startup(&self) -> Result<()> {
        tokio::time::sleep(self.startup_delay).await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn set_plane(
        &self,
        _plane: &str,
    ) {
    }

    fn set_deployment(
        &self,
        _deployment: Deployment,
    ) {
    }
}
