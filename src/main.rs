use std::sync::Arc;

use fleetbus::Application;
use fleetbus::Configurator;
use fleetbus::MemoryBus;
use fleetbus::Result;
use fleetbus::Service;
use fleetbus::Settings;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = Arc::new(MemoryBus::new());
    let services: Vec<Arc<dyn Service>> =
        vec![Arc::new(Configurator::new(bus, &settings.configurator))];

    let app = Application::new(&settings);
    app.add(services);

    info!("fleet starting on plane '{}'", app.plane());
    if let Err(e) = app.run().await {
        error!("application stopped: {:?}", e);
    }

    println!("Exiting program.");
    Ok(())
}
