//! Shared test components for the crate's unit tests.

mod mock_service;
mod test_service;

pub use mock_service::*;
pub use test_service::*;


use std::sync::Arc;
use std::time::Duration;

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
/// Returns whether the condition was ever observed true.
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

/// Shared recorder of lifecycle events, for asserting ordering across
/// services.
#[derive(Clone, Default)]
pub struct Journal {
    events: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    pub fn record(
        &self,
        event: impl Into<String>,
    ) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Index of the first occurrence of `event`, if it was recorded.
    pub fn position(
        &self,
        event: &str,
    ) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }
}
