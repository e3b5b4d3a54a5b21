use std::future::Future;
use std::sync::Arc;

use super::Application;
use crate::Service;

/// Runs `scenario` against a freshly started testing application.
///
/// The services are added as one group to an application built with
/// [`Application::new_testing`], started before the scenario and shut down
/// after it. A failure in either lifecycle phase panics, failing the
/// surrounding test, so scenarios only have to assert their own behavior.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use fleetbus::{with_test_app, Service};
/// # async fn demo(services: Vec<Arc<dyn Service>>) {
/// with_test_app(services, |app| async move {
///     assert!(app.is_started());
/// })
/// .await;
/// # }
/// ```
pub async fn with_test_app<F, Fut>(
    services: Vec<Arc<dyn Service>>,
    scenario: F,
) where
    F: FnOnce(Arc<Application>) -> Fut,
    Fut: Future<Output = ()>,
{
    let app = Arc::new(Application::new_testing());
    app.add(services);

    if let Err(e) = app.startup().await {
        panic!("application failed to start: {}", e);
    }

    scenario(Arc::clone(&app)).await;

    if let Err(e) = app.shutdown().await {
        panic!("application failed to shut down: {}", e);
    }
}
