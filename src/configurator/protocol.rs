//! Wire messages of the configurator endpoints. Payloads travel
//! bincode-encoded inside [`Envelope`]s.
//!
//! [`Envelope`]: crate::Envelope

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::BusError;
use crate::Repository;
use crate::Result;

/// Asks the configurator to resolve `names` for the requesting service.
/// The service's identity comes from the envelope, not the payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuesRequest {
    pub names: Vec<String>,
}

/// Values that resolved, keyed by requested name. Names with no value
/// anywhere in the caller's domain chain are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuesResponse {
    pub values: HashMap<String, String>,
}

/// Full-snapshot exchange between peer configurators.
///
/// Receivers adopt the snapshot only when `timestamp_ms` is strictly newer
/// than their own; anything else is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Unix milliseconds of the sender's last repository update.
    pub timestamp_ms: u64,
    pub repo: Repository,
}

pub(crate) fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    bincode::serialize(message).map_err(|e| BusError::Encode(e).into())
}

pub(crate) fn decode<T: DeserializeOwned>(
    subject: &str,
    payload: &[u8],
) -> Result<T> {
    bincode::deserialize(payload).map_err(|e| {
        BusError::Decode {
            subject: subject.to_string(),
            source: e,
        }
        .into()
    })
}
