use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::protocol::decode;
use super::protocol::encode;
use super::SyncRequest;
use super::ValuesRequest;
use super::ValuesResponse;
use crate::constants::BROADCAST_HOSTNAME;
use crate::constants::CONFIGURATOR_HOSTNAME;
use crate::constants::CONFIG_REFRESH_ENDPOINT;
use crate::constants::LEGACY_CONFIGURATOR_HOSTNAME;
use crate::constants::REFRESH_ENDPOINT;
use crate::constants::SYNC_ENDPOINT;
use crate::constants::VALUES_ENDPOINT;
use crate::control_subject;
use crate::legacy_subject;
use crate::utils::time::now_millis;
use crate::Bus;
use crate::ConfigError;
use crate::ConfiguratorSettings;
use crate::DeliveryMode;
use crate::Deployment;
use crate::Incoming;
use crate::LifecycleError;
use crate::Repository;
use crate::Result;
use crate::Service;
use crate::Subscription;

/// Immutable pairing of the repository with the moment it was installed.
///
/// Readers load the whole state in one atomic step; writers build a complete
/// replacement and swap it in, so nobody ever observes a half-updated
/// repository. The timestamp arbitrates peer sync conflicts.
#[derive(Debug, Clone, Default)]
pub struct RepoState {
    pub repo: Repository,
    /// Unix milliseconds of the last local install or adopted peer sync.
    pub updated_at_ms: u64,
}

/// The configurator microservice.
///
/// Loads its repository from an optional YAML source file, answers `values`
/// lookups for any service on the plane, broadcasts refresh instructions,
/// and keeps peer replicas convergent through timestamp-ordered snapshot
/// syncs. Endpoint handling runs in background tasks between
/// [`Service::startup`] and [`Service::shutdown`].
pub struct Configurator {
    core: Arc<ConfiguratorCore>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    cancel: Mutex<Option<CancellationToken>>,
}

struct ConfiguratorCore {
    bus: Arc<dyn Bus>,
    state: ArcSwap<RepoState>,
    plane: RwLock<String>,
    deployment: RwLock<Deployment>,
    source_path: Option<PathBuf>,
    refresh_interval: Duration,
}

/// The five live registrations of one configurator replica.
struct Endpoints {
    values: Subscription,
    refresh: Subscription,
    sync: Subscription,
    legacy_values: Subscription,
    legacy_refresh: Subscription,
}

impl Configurator {
    pub fn new(
        bus: Arc<dyn Bus>,
        settings: &ConfiguratorSettings,
    ) -> Self {
        Configurator {
            core: Arc::new(ConfiguratorCore {
                bus,
                state: ArcSwap::from_pointee(RepoState::default()),
                plane: RwLock::new(String::new()),
                deployment: RwLock::new(Deployment::default()),
                source_path: settings.source_path.clone(),
                refresh_interval: Duration::from_secs(settings.refresh_interval_secs),
            }),
            tasks: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
        }
    }

    /// Consistent view of the current repository and its timestamp.
    pub fn snapshot(&self) -> Arc<RepoState> {
        self.core.state.load_full()
    }

    /// Broadcasts the refresh instruction to every service on the plane.
    /// Idempotent; never suppressed, even when nothing changed.
    pub async fn refresh(&self) -> Result<()> {
        self.core.refresh().await
    }

    /// Broadcasts the current snapshot to peer configurators.
    pub async fn sync_with_peers(&self) -> Result<()> {
        self.core.sync_with_peers().await
    }
}

#[async_trait]
impl Service for Configurator {
    fn hostname(&self) -> String {
        CONFIGURATOR_HOSTNAME.to_string()
    }

    async fn startup(&self) -> Result<()> {
        let core = Arc::clone(&self.core);

        // A configured source must load; no source means an empty repository
        // until the first peer sync arrives.
        if let Some(repo) = core.load_source().await? {
            info!("loaded {} domain(s) from source", repo.domain_count());
            core.install(repo);
        }

        let plane = core.plane();
        let deployment = *core.deployment.read();
        info!("configurator starting: plane '{}', deployment {}", plane, deployment);

        let endpoints = Endpoints {
            values: core
                .bus
                .subscribe(
                    &control_subject(&plane, CONFIGURATOR_HOSTNAME, VALUES_ENDPOINT),
                    DeliveryMode::Balanced,
                )
                .await?,
            refresh: core
                .bus
                .subscribe(
                    &control_subject(&plane, CONFIGURATOR_HOSTNAME, REFRESH_ENDPOINT),
                    DeliveryMode::Balanced,
                )
                .await?,
            // Every replica must see every sync; this one is never pooled.
            sync: core
                .bus
                .subscribe(
                    &control_subject(&plane, CONFIGURATOR_HOSTNAME, SYNC_ENDPOINT),
                    DeliveryMode::Pervasive,
                )
                .await?,
            legacy_values: core
                .bus
                .subscribe(
                    &legacy_subject(&plane, LEGACY_CONFIGURATOR_HOSTNAME, VALUES_ENDPOINT),
                    DeliveryMode::Balanced,
                )
                .await?,
            legacy_refresh: core
                .bus
                .subscribe(
                    &legacy_subject(&plane, LEGACY_CONFIGURATOR_HOSTNAME, REFRESH_ENDPOINT),
                    DeliveryMode::Balanced,
                )
                .await?,
        };

        let token = CancellationToken::new();
        {
            let mut tasks = self.tasks.lock();
            tasks.push((
                "configurator-dispatch",
                tokio::spawn(dispatch(Arc::clone(&core), endpoints, token.clone())),
            ));
            tasks.push((
                "configurator-periodic",
                tokio::spawn(periodic(Arc::clone(&core), token.clone())),
            ));
        }
        *self.cancel.lock() = Some(token);

        // Announce the local snapshot; peers adopt it only if strictly newer.
        core.sync_with_peers().await?;
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

impl ConfiguratorCore {
    fn plane(&self) -> String {
        self.plane.read().clone()
    }

    /// Installs a locally produced repository under a fresh timestamp.
    fn install(
        &self,
        repo: Repository,
    ) {
        self.state.store(Arc::new(RepoState {
            repo,
            updated_at_ms: now_millis(),
        }));
    }

    async fn load_source(&self) -> Result<Option<Repository>> {
        let Some(path) = &self.source_path else {
            return Ok(None);
        };
        let text = tokio::fs::read_to_string(path).await.map_err(|e| ConfigError::Source {
            path: path.clone(),
            source: e,
        })?;
        Ok(Some(Repository::parse_yaml(&text)?))
    }

    async fn refresh(&self) -> Result<()> {
        let subject = control_subject(&self.plane(), BROADCAST_HOSTNAME, CONFIG_REFRESH_ENDPOINT);
        debug!("broadcasting refresh on {}", subject);
        self.bus.publish(&subject, CONFIGURATOR_HOSTNAME, Vec::new()).await
    }

    async fn sync_with_peers(&self) -> Result<()> {
        let state = self.state.load();
        let payload = encode(&SyncRequest {
            timestamp_ms: state.updated_at_ms,
            repo: state.repo.clone(),
        })?;
        let subject = control_subject(&self.plane(), CONFIGURATOR_HOSTNAME, SYNC_ENDPOINT);
        debug!(
            "syncing {} domain(s) as of {}",
            state.repo.domain_count(),
            state.updated_at_ms
        );
        self.bus.publish(&subject, CONFIGURATOR_HOSTNAME, payload).await
    }

    async fn handle_values(
        &self,
        mut incoming: Incoming,
    ) -> Result<()> {
        let request: ValuesRequest =
            decode(&incoming.envelope.subject, &incoming.envelope.payload)?;
        let hostname = incoming.envelope.from.clone();

        let state = self.state.load();
        let values = request
            .names
            .iter()
            .filter_map(|name| {
                state
                    .repo
                    .value(&hostname, name)
                    .map(|value| (name.clone(), value))
            })
            .collect();
        let response = ValuesResponse { values };
        debug!(
            "'{}' asked for {} name(s), {} resolved",
            hostname,
            request.names.len(),
            response.values.len()
        );

        incoming.reply(encode(&response)?);
        Ok(())
    }

    async fn handle_refresh(
        &self,
        mut incoming: Incoming,
    ) -> Result<()> {
        self.refresh().await?;
        incoming.reply(Vec::new());
        Ok(())
    }

    async fn handle_sync(
        &self,
        incoming: Incoming,
    ) -> Result<()> {
        let request: SyncRequest =
            decode(&incoming.envelope.subject, &incoming.envelope.payload)?;
        let current = self.state.load();

        // Our own broadcasts come back on this subject too; the equal-or-
        // older rule makes them, and any replayed sync, a clean no-op.
        if request.timestamp_ms <= current.updated_at_ms {
            debug!(
                "ignoring sync from '{}' ({} <= {})",
                incoming.envelope.from, request.timestamp_ms, current.updated_at_ms
            );
            return Ok(());
        }

        info!(
            "adopting snapshot from '{}': {} domain(s), ts {}",
            incoming.envelope.from,
            request.repo.domain_count(),
            request.timestamp_ms
        );
        self.state.store(Arc::new(RepoState {
            repo: request.repo,
            updated_at_ms: request.timestamp_ms,
        }));
        self.refresh().await
    }

    /// One periodic tick: re-read the source, install and announce on
    /// change, and re-sync peers either way as anti-entropy.
    async fn periodic_refresh(&self) {
        match self.load_source().await {
            Ok(Some(repo)) => {
                if repo != self.state.load().repo {
                    info!("source changed, installing {} domain(s)", repo.domain_count());
                    self.install(repo);
                    if let Err(e) = self.refresh().await {
                        warn!("refresh broadcast failed: {}", e);
                    }
                }
            }
            Ok(None) => {}
            // A briefly unreadable or malformed source must not replace the
            // repository we already have.
            Err(e) => warn!("periodic source reload failed: {}", e),
        }

        if let Err(e) = self.sync_with_peers().await {
            warn!("peer sync failed: {}", e);
        }
    }
}

async fn dispatch(
    core: Arc<ConfiguratorCore>,
    mut endpoints: Endpoints,
    token: CancellationToken,
) {
    loop {
        let handled = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            Some(incoming) = endpoints.values.next() => core.handle_values(incoming).await,
            Some(incoming) = endpoints.legacy_values.next() => core.handle_values(incoming).await,
            Some(incoming) = endpoints.refresh.next() => core.handle_refresh(incoming).await,
            Some(incoming) = endpoints.legacy_refresh.next() => core.handle_refresh(incoming).await,
            Some(incoming) = endpoints.sync.next() => core.handle_sync(incoming).await,
            else => break,
        };
        if let Err(e) = handled {
            warn!("configurator endpoint failed: {}", e);
        }
    }
}

async fn periodic(
    core: Arc<ConfiguratorCore>,
    token: CancellationToken,
) {
    let mut ticker = interval(core.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and startup already loaded and
    // synced, so consume it.
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => core.periodic_refresh().await,
        }
    }
}
