use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::protocol::decode;
use super::protocol::encode;
use super::ValuesRequest;
use super::ValuesResponse;
use crate::constants::BROADCAST_HOSTNAME;
use crate::constants::CONFIGURATOR_HOSTNAME;
use crate::constants::CONFIG_REFRESH_ENDPOINT;
use crate::constants::VALUES_ENDPOINT;
use crate::control_subject;
use crate::Bus;
use crate::ConfiguratorSettings;
use crate::DeliveryMode;
use crate::Deployment;
use crate::LifecycleError;
use crate::Result;
use crate::Service;
use crate::Subscription;

type OnChange = Box<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// A configuration property the client tracks by name.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    default: Option<String>,
}

impl Property {
    /// A property with no fallback; unresolved lookups yield `None`.
    pub fn new(name: &str) -> Self {
        Property {
            name: name.to_string(),
            default: None,
        }
    }

    /// A property that falls back to `default` whenever the repository has
    /// no value for it.
    pub fn with_default(
        name: &str,
        default: &str,
    ) -> Self {
        Property {
            name: name.to_string(),
            default: Some(default.to_string()),
        }
    }
}

/// Keeps a set of declared properties current against the configurator.
///
/// The client fetches its values on startup, re-fetches whenever the
/// configurator broadcasts a refresh, and answers [`ConfigClient::value`]
/// from a local map in between, so reads never touch the bus. Declared
/// defaults fill in before the first fetch and whenever the repository
/// stops carrying a value.
pub struct ConfigClient {
    core: Arc<ClientCore>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    cancel: Mutex<Option<CancellationToken>>,
}

struct ClientCore {
    bus: Arc<dyn Bus>,
    hostname: String,
    plane: RwLock<String>,
    deployment: RwLock<Deployment>,
    request_timeout: Duration,
    defaults: HashMap<String, Option<String>>,
    current: RwLock<HashMap<String, Option<String>>>,
    on_change: RwLock<Option<OnChange>>,
}

impl ConfigClient {
    pub fn new(
        bus: Arc<dyn Bus>,
        hostname: &str,
        properties: Vec<Property>,
        settings: &ConfiguratorSettings,
    ) -> Self {
        let defaults: HashMap<String, Option<String>> = properties
            .into_iter()
            .map(|property| (property.name, property.default))
            .collect();
        ConfigClient {
            core: Arc::new(ClientCore {
                bus,
                hostname: hostname.to_string(),
                plane: RwLock::new(String::new()),
                deployment: RwLock::new(Deployment::default()),
                request_timeout: Duration::from_millis(settings.request_timeout_ms),
                current: RwLock::new(defaults.clone()),
                defaults,
                on_change: RwLock::new(None),
            }),
            tasks: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
        }
    }

    /// Registers a handler fired once per property whose effective value
    /// changed during a refresh.
    pub fn with_change_handler<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&str, Option<&str>) + Send + Sync + 'static,
    {
        *self.core.on_change.write() = Some(Box::new(handler));
        self
    }

    /// Current effective value of a declared property.
    ///
    /// `None` for undeclared names and for declared properties that have
    /// neither a repository value nor a default.
    pub fn value(
        &self,
        name: &str,
    ) -> Option<String> {
        self.core.current.read().get(name).cloned().flatten()
    }

    /// Fetches the declared properties from the configurator right now.
    pub async fn refresh(&self) -> Result<()> {
        self.core.refresh().await
    }
}

#[async_trait]
impl Service for ConfigClient {
    fn hostname(&self) -> String {
        self.core.hostname.clone()
    }

    async fn startup(&self) -> Result<()> {
        let core = Arc::clone(&self.core);
        let plane = core.plane();
        let deployment = *core.deployment.read();
        debug!(
            "'{}' tracking {} properties: plane '{}', deployment {}",
            core.hostname,
            core.defaults.len(),
            plane,
            deployment
        );

        let refreshes = core
            .bus
            .subscribe(
                &control_subject(&plane, BROADCAST_HOSTNAME, CONFIG_REFRESH_ENDPOINT),
                DeliveryMode::Pervasive,
            )
            .await?;

        let token = CancellationToken::new();
        self.tasks.lock().push((
            "config-client-listen",
            tokio::spawn(listen(Arc::clone(&core), refreshes, token.clone())),
        ));
        *self.cancel.lock() = Some(token);

        // The configurator may not be up yet; declared defaults cover the
        // gap until the first refresh broadcast lands.
        if let Err(e) = core.refresh().await {
            warn!("'{}' initial fetch failed: {}", core.hostname, e);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for (name, task) in tasks {
            task.await.map_err(|e| LifecycleError::TaskFailure {
                task: name.to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn set_plane(
        &self,
        plane: &str,
    ) {
        *self.core.plane.write() = plane.to_string();
    }

    fn set_deployment(
        &self,
        deployment: Deployment,
    ) {
        *self.core.deployment.write() = deployment;
    }
}

impl ClientCore {
    fn plane(&self) -> String {
        self.plane.read().clone()
    }

    async fn refresh(&self) -> Result<()> {
        let names: Vec<String> = self.defaults.keys().cloned().collect();
        let payload = encode(&ValuesRequest { names })?;
        let subject = control_subject(&self.plane(), CONFIGURATOR_HOSTNAME, VALUES_ENDPOINT);
        let raw = self
            .bus
            .request(&subject, &self.hostname, payload, self.request_timeout)
            .await?;
        let response: ValuesResponse = decode(&subject, &raw)?;
        self.apply(response.values);
        Ok(())
    }

    /// Folds fetched values over the declared defaults and fires the change
    /// handler for every property whose effective value moved.
    fn apply(
        &self,
        fetched: HashMap<String, String>,
    ) {
        let mut changes: Vec<(String, Option<String>)> = Vec::new();
        {
            let mut current = self.current.write();
            for (name, default) in &self.defaults {
                let effective = fetched.get(name).cloned().or_else(|| default.clone());
                if current.get(name) != Some(&effective) {
                    current.insert(name.clone(), effective.clone());
                    changes.push((name.clone(), effective));
                }
            }
        }
        if changes.is_empty() {
            return;
        }

        debug!("'{}' applied {} change(s)", self.hostname, changes.len());
        // Handlers run outside the lock so they can read values freely.
        let handler = self.on_change.read();
        if let Some(handler) = handler.as_ref() {
            for (name, value) in &changes {
                handler(name, value.as_deref());
            }
        }
    }
}

async fn listen(
    core: Arc<ClientCore>,
    mut refreshes: Subscription,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            Some(_) = refreshes.next() => {
                if let Err(e) = core.refresh().await {
                    warn!("'{}' refresh failed: {}", core.hostname, e);
                }
            }
            else => break,
        }
    }
}
