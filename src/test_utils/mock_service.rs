use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::control_subject;
use crate::Bus;
use crate::BusError;
use crate::Deployment;
use crate::DeliveryMode;
use crate::LifecycleError;
use crate::Result;
use crate::Service;
use crate::Subscription;

type Handler = Box<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Stand-in for a fleet service with scripted endpoint handlers.
///
/// Stubbed endpoints answer balanced requests on the mock's hostname;
/// calling an endpoint that was never stubbed surfaces
/// [`BusError::NotImplemented`], catching incomplete test setup early.
/// Mocks refuse to start outside LOCAL and TESTING deployments.
pub struct MockService {
    core: Arc<MockCore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

struct MockCore {
    bus: Arc<dyn Bus>,
    hostname: String,
    handlers: RwLock<HashMap<String, Handler>>,
    plane: Mutex<String>,
    deployment: Mutex<Deployment>,
}

impl MockService {
    pub fn new(
        bus: Arc<dyn Bus>,
        hostname: &str,
    ) -> Self {
        MockService {
            core: Arc::new(MockCore {
                bus,
                hostname: hostname.to_string(),
                handlers: RwLock::new(HashMap::new()),
                plane: Mutex::new(String::new()),
                deployment: Mutex::new(Deployment::default()),
            }),
            tasks: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
        }
    }

    /// Registers a canned handler for `endpoint`.
    pub fn stub(
        self,
        endpoint: &str,
        handler: impl Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.core
            .handlers
            .write()
            .insert(endpoint.to_string(), Box::new(handler));
        self
    }

    /// Invokes `endpoint` directly, the way generated client code would.
    pub fn call(
        &self,
        endpoint: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let handlers = self.core.handlers.read();
        match handlers.get(endpoint) {
            Some(handler) => handler(payload),
            None => Err(BusError::NotImplemented(endpoint.to_string()).into()),
        }
    }
}

#[async_trait]
impl Service for MockService {
    fn hostname(&self) -> String {
        self.core.hostname.clone()
    }

    async fn startup(&self) -> Result<()> {
        let deployment = *self.core.deployment.lock();
        if !deployment.allows_mocks() {
            return Err(LifecycleError::MockDisallowed {
                hostname: self.core.hostname.clone(),
                deployment,
            }
            .into());
        }

        let plane = self.core.plane.lock().clone();
        let token = CancellationToken::new();
        let endpoints: Vec<String> = self.core.handlers.read().keys().cloned().collect();

        let mut tasks = Vec::new();
        for endpoint in endpoints {
            let subject = control_subject(&plane, &self.core.hostname, &endpoint);
            let subscription = self.core.bus.subscribe(&subject, DeliveryMode::Balanced).await?;
            tasks.push(tokio::spawn(serve(
                Arc::clone(&self.core),
                endpoint,
                subscription,
                token.clone(),
            )));
        }

        *self.cancel.lock() = Some(token);
        self.tasks.lock().extend(tasks);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.await.map_err(|e| LifecycleError::TaskFailure {
                task: format!("mock '{}'", self.core.hostname),
                source: e,
            })?;
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
        deployment: Deployment,
    ) {
        *self.core.deployment.lock() = deployment;
    }
}

async fn serve(
    core: Arc<MockCore>,
    endpoint: String,
    mut subscription: Subscription,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            incoming = subscription.next() => match incoming {
                Some(mut incoming) => {
                    let outcome = {
                        let handlers = core.handlers.read();
                        match handlers.get(&endpoint) {
                            Some(handler) => handler(&incoming.envelope.payload),
                            None => Err(BusError::NotImplemented(endpoint.clone()).into()),
                        }
                    };
                    match outcome {
                        Ok(reply) => incoming.reply(reply),
                        Err(e) => {
                            error!("mock '{}' endpoint '{}': {}", core.hostname, endpoint, e)
                        }
                    }
                }
                None => break,
            },
        }
    }
}
