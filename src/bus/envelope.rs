use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// A message as it travels over the bus.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Subject the message was published on.
    pub subject: String,
    /// Hostname of the publishing service.
    pub from: String,
    /// bincode-encoded body.
    pub payload: Vec<u8>,
}

/// A delivered message, plus the reply channel when the publisher is waiting
/// on an answer.
#[derive(Debug)]
pub struct Incoming {
    pub envelope: Envelope,
    pub(crate) reply: Option<oneshot::Sender<Vec<u8>>>,
}

impl Incoming {
    /// Whether the publisher is waiting on a reply.
    pub fn wants_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Sends `payload` back to the requester.
    ///
    /// Replying to a plain publish, or replying twice, is a no-op. The
    /// requester may already have given up on its timeout, so a closed reply
    /// channel is ignored as well.
    pub fn reply(
        &mut self,
        payload: Vec<u8>,
    ) {
        if let Some(tx) = self.reply.take() {
            let _ = tx.send(payload);
        }
    }
}

/// A live registration on one subject.
///
/// Dropping the subscription removes the registration from the bus; messages
/// already queued are lost.
pub struct Subscription {
    receiver: mpsc::Receiver<Incoming>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Incoming>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            receiver,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Waits for the next message. Returns `None` once the bus side of the
    /// channel is gone.
    pub async fn next(&mut self) -> Option<Incoming> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
