use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

/// Server-to-client side of a session's standalone SSE stream.
///
/// At most one receiver is attached at a time. Messages sent while no stream is
/// connected are dropped; nothing is buffered for later replay.
#[derive(Debug, Clone, Default)]
pub struct NotificationChannel {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Value>>>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StreamAlreadyOpen;

impl NotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new stream. Fails while a previous stream is still connected.
    pub async fn attach(&self) -> Result<mpsc::UnboundedReceiver<Value>, StreamAlreadyOpen> {
        let mut sender = self.sender.lock().await;
        if sender.as_ref().is_some_and(|current| !current.is_closed()) {
            return Err(StreamAlreadyOpen);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *sender = Some(tx);
        Ok(rx)
    }

    /// Returns `true` when the message was handed to a connected stream.
    pub async fn send(&self, message: Value) -> bool {
        let sender = self.sender.lock().await;
        match sender.as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Drops the sender, which ends the attached stream.
    pub async fn detach(&self) {
        self.sender.lock().await.take();
    }

    pub async fn is_attached(&self) -> bool {
        self.sender
            .lock()
            .await
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}
