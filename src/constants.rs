// -
// Bus addressing

/// Port segment for control-plane endpoints.
pub(crate) const CONTROL_PORT: u16 = 888;

/// Port segment the deprecated legacy endpoint aliases live on.
pub(crate) const LEGACY_PORT: u16 = 443;

/// Hostname of the configurator core microservice.
pub const CONFIGURATOR_HOSTNAME: &str = "configurator.core";

/// Deprecated hostname alias kept for backward compatibility.
pub(crate) const LEGACY_CONFIGURATOR_HOSTNAME: &str = "configurator.sys";

/// Broadcast pseudo-hostname addressed by control-plane fan-outs.
pub(crate) const BROADCAST_HOSTNAME: &str = "all";

/// Endpoint names on the configurator.
pub(crate) const VALUES_ENDPOINT: &str = "values";
pub(crate) const REFRESH_ENDPOINT: &str = "refresh";
pub(crate) const SYNC_ENDPOINT: &str = "sync";

/// Control-plane endpoint every config-aware service listens on.
pub(crate) const CONFIG_REFRESH_ENDPOINT: &str = "config-refresh";

// -
// Plane identifiers

/// Alphabet for generated plane identifiers (lowercase alphanumeric so the
/// plane can be embedded in subjects and hostnames verbatim).
pub(crate) const PLANE_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Length of generated plane identifiers.
pub(crate) const PLANE_LEN: usize = 12;

// -
// Default timings

/// Default startup budget for a production application.
pub(crate) const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 20_000;

/// Default shutdown budget for a production application.
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 20_000;

/// Shorter lifecycle budget used by test-mode applications.
pub(crate) const TESTING_TIMEOUT_MS: u64 = 4_000;

/// Default interval between periodic refreshes of the configurator's
/// backing source.
pub(crate) const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 20 * 60;

/// Default deadline for request/reply calls over the bus.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

/// Capacity of each subscription's delivery channel.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 64;
