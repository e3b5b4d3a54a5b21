//! Pub/sub seam between services and whatever transport carries their
//! messages.
//!
//! Every message travels on a subject of the form
//! `{plane}.{port}.{hostname}.{endpoint}`. The plane prefix keeps unrelated
//! deployments (and concurrently running tests) isolated from each other even
//! when they share one bus instance. [`MemoryBus`] is the in-process
//! implementation; request timeouts are governed by the caller-supplied
//! deadline on [`Bus::request`].

mod envelope;
mod memory;
mod subjects;

pub use envelope::*;
pub use memory::*;
pub use subjects::*;


// Trait definition of the current module
// -----------------------------------------------------------------------------
// Core seam: every service talks to the fleet through this trait.
//

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Fire-and-forget delivery to the subject's current subscribers.
    ///
    /// Delivery honours each subscriber's [`DeliveryMode`]: every pervasive
    /// subscriber receives a copy, while the balanced subscribers form a pool
    /// of which exactly one member is picked per message. Publishing to a
    /// subject nobody listens on is not an error.
    ///
    /// Must never block the publisher: a subscriber that cannot keep up loses
    /// the message instead of stalling the sender.
    async fn publish(
        &self,
        subject: &str,
        from: &str,
        payload: Vec<u8>,
    ) -> Result<()>;

    /// Point-to-point request: delivers `payload` to one subscriber of
    /// `subject` and waits up to `timeout` for its reply.
    ///
    /// # Errors
    /// - [`BusError::NoResponders`] if the subject has no subscribers
    /// - [`BusError::RequestTimeout`] if no reply arrived within `timeout`
    /// - [`BusError::NoReply`] if the responder dropped the request without
    ///   answering
    ///
    /// [`BusError::NoResponders`]: crate::BusError::NoResponders
    /// [`BusError::RequestTimeout`]: crate::BusError::RequestTimeout
    /// [`BusError::NoReply`]: crate::BusError::NoReply
    async fn request(
        &self,
        subject: &str,
        from: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>>;

    /// Registers a subscriber on `subject` with the given delivery mode.
    ///
    /// The registration lasts as long as the returned [`Subscription`]; it is
    /// removed when the subscription is dropped.
    async fn subscribe(
        &self,
        subject: &str,
        mode: DeliveryMode,
    ) -> Result<Subscription>;
}

/// How a subscriber shares a subject with its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One member of the subject's pool receives each message.
    Balanced,
    /// Every subscriber of the subject receives each message.
    Pervasive,
}
