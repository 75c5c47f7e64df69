use super::{Assembler, Received, RelayItem, RelayReceiver};
use crate::{Error, Result, history::MessageStore};
use std::{path::PathBuf, thread};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Drains the relay queue, reassembles replies and commits each finished
/// reply to its own [`MessageStore`].
pub struct ReassemblyWorker {
    store: MessageStore,
    assembler: Assembler,
}

/// Join handle for a worker started with [`ReassemblyWorker::spawn`].
#[derive(Debug)]
pub struct WorkerHandle {
    thread: thread::JoinHandle<()>,
}

impl ReassemblyWorker {
    pub fn new(store: MessageStore) -> Self {
        Self {
            store,
            assembler: Assembler::new(),
        }
    }

    /// Starts the worker on a dedicated thread with its own runtime and its
    /// own store connection to `db_path`.
    ///
    /// Resolves once the worker has opened the store. Any failure before that
    /// point is returned as [`Error::WorkerStartup`].
    pub async fn spawn(db_path: PathBuf, receiver: RelayReceiver) -> Result<WorkerHandle> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        let thread = thread::Builder::new()
            .name("reassembly-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let store = match MessageStore::initialize(&db_path).await {
                        Ok(store) => store,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    ReassemblyWorker::new(store).run(receiver).await;
                });
            })
            .map_err(|e| Error::worker_startup(format!("could not spawn thread: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                debug!("Started reassembly worker");
                Ok(WorkerHandle { thread })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(Error::worker_startup(e.to_string()))
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::worker_startup("worker exited before it was ready"))
            }
        }
    }

    /// Runs until every relay sender has been dropped and the queue is empty.
    pub async fn run(mut self, mut receiver: RelayReceiver) {
        info!("Reassembly worker running");

        loop {
            match receiver.next_item().await {
                Received::Item(item) => self.handle(item).await,
                Received::Idle => {
                    trace!(in_flight = self.assembler.in_flight(), "Relay queue idle");
                }
                Received::Closed => break,
            }
        }

        let leaked = self.assembler.in_flight();
        if leaked > 0 {
            warn!(leaked, "Reassembly worker stopping with unfinished replies");
        }
        self.store.close();
        info!("Reassembly worker stopped");
    }

    async fn handle(&mut self, item: RelayItem) {
        let RelayItem { chat_id, fragment } = item;
        let Some(completed) = self.assembler.push(chat_id, fragment) else {
            return;
        };

        match self
            .store
            .append(&completed.chat_id, &completed.message)
            .await
        {
            Ok(()) => debug!(
                chat_id = %completed.chat_id,
                completion_id = %completed.completion_id,
                "Reply persisted"
            ),
            Err(e) => error!(
                chat_id = %completed.chat_id,
                completion_id = %completed.completion_id,
                "Failed to persist reply, dropping it: {}",
                e
            ),
        }
    }
}

impl WorkerHandle {
    /// Waits for the worker thread to finish. It finishes once all relay
    /// senders are dropped.
    pub async fn join(self) -> Result<()> {
        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|e| Error::internal(format!("Worker join task failed: {e}")))?
            .map_err(|_| Error::internal("Reassembly worker panicked"))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
