use super::Fragment;
use crate::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;

/// Outstanding fragments the queue holds before producers start waiting.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayItem {
    pub chat_id: String,
    pub fragment: Fragment,
}

/// Producer half. Cheap to clone, one per in-flight request.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<RelayItem>,
}

/// Consumer half, owned by the reassembly worker.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<RelayItem>,
    poll_interval: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Item(RelayItem),
    /// Nothing arrived within the poll interval.
    Idle,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// Bounded multi-producer, single-consumer fragment queue.
pub fn channel(capacity: usize, poll_interval: Duration) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RelaySender { tx }, RelayReceiver { rx, poll_interval })
}

impl RelaySender {
    /// Enqueues a fragment, waiting for room when the queue is full.
    pub async fn submit(&self, chat_id: impl Into<String>, fragment: Fragment) -> Result<()> {
        let item = RelayItem {
            chat_id: chat_id.into(),
            fragment,
        };
        self.tx.send(item).await.map_err(|_| Error::RelayClosed)
    }

    /// Free slots left before `submit` starts waiting.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

impl RelayReceiver {
    pub async fn next_item(&mut self) -> Received {
        match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
            Ok(Some(item)) => Received::Item(item),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        }
    }
}
