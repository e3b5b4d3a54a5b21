//! In-process bus implementation.
//!
//! Keeps a registry of subscribers per subject and hands messages over
//! through bounded channels. Good enough to host an entire fleet inside one
//! process, which is also exactly what the test harness needs: planes are
//! isolated by subject prefix, so many applications can share one instance.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use super::Bus;
use super::DeliveryMode;
use super::Envelope;
use super::Incoming;
use super::Subscription;
use crate::constants::SUBSCRIPTION_BUFFER;
use crate::BusError;
use crate::Result;

struct Subscriber {
    id: u64,
    mode: DeliveryMode,
    sender: mpsc::Sender<Incoming>,
}

struct BusInner {
    subjects: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Shared in-memory bus. Cheap to clone; all clones address the same
/// subscriber registry.
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus {
            inner: Arc::new(BusInner {
                subjects: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Delivers `envelope` to every pervasive subscriber of its subject and
    /// to one randomly picked member of the balanced pool.
    fn fan_out(
        &self,
        envelope: Envelope,
    ) {
        let Some(mut subscribers) = self.inner.subjects.get_mut(envelope.subject.as_str()) else {
            debug!("no subscribers on {}", envelope.subject);
            return;
        };

        let pool: Vec<usize> = subscribers
            .iter()
            .enumerate()
            .filter(|(_, s)| s.mode == DeliveryMode::Balanced)
            .map(|(i, _)| i)
            .collect();
        let picked = pool.choose(&mut rand::thread_rng()).copied();

        let mut closed = Vec::new();
        for (i, subscriber) in subscribers.iter().enumerate() {
            if subscriber.mode == DeliveryMode::Balanced && picked != Some(i) {
                continue;
            }
            let incoming = Incoming {
                envelope: envelope.clone(),
                reply: None,
            };
            match subscriber.sender.try_send(incoming) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    // Publishing must never block, so a slow consumer loses
                    // the message.
                    warn!(
                        "subscriber #{} on {} is saturated, dropping message",
                        subscriber.id, envelope.subject
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(subscriber.id),
            }
        }

        if !closed.is_empty() {
            subscribers.retain(|s| !closed.contains(&s.id));
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        MemoryBus::new()
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(
        &self,
        subject: &str,
        from: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.fan_out(Envelope {
            subject: subject.to_string(),
            from: from.to_string(),
            payload,
        });
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        from: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        // Pick one responder while the registry lock is held, send after it
        // is released.
        let target = {
            let Some(subscribers) = self.inner.subjects.get(subject) else {
                return Err(BusError::NoResponders(subject.to_string()).into());
            };
            match subscribers.choose(&mut rand::thread_rng()) {
                Some(subscriber) => subscriber.sender.clone(),
                None => return Err(BusError::NoResponders(subject.to_string()).into()),
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let incoming = Incoming {
            envelope: Envelope {
                subject: subject.to_string(),
                from: from.to_string(),
                payload,
            },
            reply: Some(reply_tx),
        };
        if target.send(incoming).await.is_err() {
            // Responder unsubscribed between pick and send.
            return Err(BusError::NoResponders(subject.to_string()).into());
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(BusError::NoReply {
                subject: subject.to_string(),
            }
            .into()),
            Err(_) => Err(BusError::RequestTimeout {
                subject: subject.to_string(),
                timeout,
            }
            .into()),
        }
    }

    async fn subscribe(
        &self,
        subject: &str,
        mode: DeliveryMode,
    ) -> Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);

        self.inner
            .subjects
            .entry(subject.to_string())
            .or_default()
            .push(Subscriber { id, mode, sender });
        debug!("subscriber #{} ({:?}) registered on {}", id, mode, subject);

        let inner = Arc::clone(&self.inner);
        let key = subject.to_string();
        Ok(Subscription::new(receiver, move || {
            if let Some(mut subscribers) = inner.subjects.get_mut(&key) {
                subscribers.retain(|s| s.id != id);
            }
            inner.subjects.remove_if(&key, |_, subscribers| subscribers.is_empty());
        }))
    }
}
