//! Subject-name construction.
//!
//! All fleet traffic follows the `{plane}.{port}.{hostname}.{endpoint}`
//! scheme. Port 888 is the control port every current service listens on;
//! port 443 only remains for deprecated legacy aliases.

use crate::constants::CONTROL_PORT;
use crate::constants::LEGACY_PORT;

/// Builds a fully qualified subject.
pub fn subject(
    plane: &str,
    port: u16,
    hostname: &str,
    endpoint: &str,
) -> String {
    format!("{}.{}.{}.{}", plane, port, hostname, endpoint)
}

/// Subject for `endpoint` of `hostname` on the control port.
pub fn control_subject(
    plane: &str,
    hostname: &str,
    endpoint: &str,
) -> String {
    subject(plane, CONTROL_PORT, hostname, endpoint)
}

/// Deprecated alias subject on the legacy port. New services must not
/// publish here.
pub fn legacy_subject(
    plane: &str,
    hostname: &str,
    endpoint: &str,
) -> String {
    subject(plane, LEGACY_PORT, hostname, endpoint)
}
