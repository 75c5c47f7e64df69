use super::{ChatMessage, StorageGuard};
use crate::{Error, Result};
use libsql::{Builder, Connection, Database};
use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Append-only log of chat turns keyed by conversation id.
///
/// Every operation takes the [`StorageGuard`] and runs on its own short-lived
/// connection, which is dropped before the guard is released. The whole
/// guarded section runs on the blocking pool. Several `MessageStore`
/// instances (in this process or another one) may point at the same file.
pub struct MessageStore {
    path: PathBuf,
    guard: StorageGuard,
    db: Mutex<Option<Arc<Database>>>,
}

impl MessageStore {
    /// Opens or creates the store at `path`, creating parent directories and
    /// the schema when missing. Safe to call against an existing store.
    pub async fn initialize(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = Builder::new_local(&path).build().await?;
        let store = Self {
            guard: StorageGuard::for_store(&path),
            path,
            db: Mutex::new(Some(Arc::new(db))),
        };

        store
            .with_connection(|conn| async move {
                debug!("Initializing chat_history table");
                conn.execute(
                    r#"
                    CREATE TABLE IF NOT EXISTS chat_history (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        chat_id TEXT NOT NULL,
                        created TEXT NOT NULL,
                        role TEXT NOT NULL,
                        content TEXT NOT NULL
                    )
                    "#,
                    (),
                )
                .await?;
                debug!("Initializing chat_id index");
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS chat_history_chat_id ON chat_history (chat_id)",
                    (),
                )
                .await?;
                Ok::<_, Error>(())
            })
            .await?;

        info!("Message store initialized: {}", store.path.display());

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, chat_id: &str, message: &ChatMessage) -> Result<()> {
        let row_chat_id = chat_id.to_string();
        let row = message.clone();

        self.with_connection(move |conn| async move {
            conn.execute(
                "INSERT INTO chat_history (chat_id, created, role, content) VALUES (?, ?, ?, ?)",
                (
                    row_chat_id.as_str(),
                    row.created.as_str(),
                    row.role.as_str(),
                    row.content.as_str(),
                ),
            )
            .await?;
            Ok::<_, Error>(())
        })
        .await?;

        debug!(chat_id, role = %message.role, "Message appended");
        Ok(())
    }

    /// All turns of a conversation, oldest first. Unknown conversations yield
    /// an empty list.
    pub async fn list(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let query_chat_id = chat_id.to_string();

        let messages = self
            .with_connection(move |conn| async move {
                let mut rows = conn
                    .query(
                        "SELECT role, content, created FROM chat_history WHERE chat_id = ? ORDER BY created ASC, id ASC",
                        [query_chat_id.as_str()],
                    )
                    .await?;

                let mut messages = Vec::new();
                while let Some(row) = rows.next().await? {
                    messages.push(ChatMessage {
                        role: row.get(0)?,
                        content: row.get(1)?,
                        created: row.get(2)?,
                    });
                }
                Ok::<_, Error>(messages)
            })
            .await?;

        debug!(chat_id, count = messages.len(), "Messages listed");
        Ok(messages)
    }

    /// Releases the database handle. Later operations fail with
    /// [`Error::StoreClosed`].
    pub fn close(&self) {
        if let Ok(mut db) = self.db.lock() {
            if db.take().is_some() {
                debug!("Message store closed: {}", self.path.display());
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.db.lock().map(|db| db.is_none()).unwrap_or(true)
    }

    /// Runs `op` on a fresh connection while holding the guard. Lock wait,
    /// connection and statements all run on the blocking pool; the connection
    /// is dropped before the guard is released.
    async fn with_connection<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>>,
        T: Send + 'static,
    {
        let db = self.database()?;
        let guard = self.guard.clone();
        let handle = Handle::current();

        tokio::task::spawn_blocking(move || {
            let lease = guard.acquire_blocking()?;
            let conn = db.connect()?;
            let result = handle.block_on(op(conn));
            drop(lease);
            result
        })
        .await
        .map_err(|e| Error::internal(format!("Storage task failed: {e}")))?
    }

    fn database(&self) -> Result<Arc<Database>> {
        let db = self
            .db
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        db.clone().ok_or(Error::StoreClosed)
    }
}
