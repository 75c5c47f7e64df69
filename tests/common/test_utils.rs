use axum::{Router, body::Body, http::Request};
use chat_relay::{
    history::{ChatMessage, MessageStore},
    llm::CompletionClient,
    relay::{self, Fragment, ReassemblyWorker, RelaySender, WorkerHandle},
    server::{self, handlers::AppState},
};
use serde_json::Value;
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// Create a temporary on-disk store for testing
pub async fn create_test_store() -> (TempDir, MessageStore) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let store = MessageStore::initialize(temp_dir.path().join("chat_history.db"))
        .await
        .expect("Failed to initialize store");
    (temp_dir, store)
}

/// Fragments of one assistant reply: a role opener, one fragment per token,
/// and a terminal fragment. Every fragment carries `created`.
pub fn reply_fragments(completion_id: &str, tokens: &[&str], created: &str) -> Vec<Fragment> {
    let mut fragments = vec![
        Fragment::new(completion_id, created)
            .with_role("assistant")
            .with_content(""),
    ];
    fragments.extend(
        tokens
            .iter()
            .map(|token| Fragment::new(completion_id, created).with_content(*token)),
    );
    fragments.push(Fragment::new(completion_id, created).with_finish_reason("stop"));
    fragments
}

/// Polls until the conversation holds `expected` rows or the deadline passes.
pub async fn wait_for_rows(store: &MessageStore, chat_id: &str, expected: usize) -> Vec<ChatMessage> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let rows = store.list(chat_id).await.expect("Failed to list messages");
        if rows.len() >= expected || Instant::now() > deadline {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Router wired to a real store and a running reassembly worker.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MessageStore>,
    pub db_path: PathBuf,
    worker: WorkerHandle,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn new(completions: Arc<dyn CompletionClient>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("chat_history.db");
        let store = Arc::new(MessageStore::initialize(&db_path).await.unwrap());

        let (relay, receiver) = relay::channel(16, Duration::from_millis(20));
        let worker = ReassemblyWorker::spawn(db_path.clone(), receiver)
            .await
            .unwrap();

        let router = server::router(AppState {
            store: store.clone(),
            relay,
            completions,
        });

        Self {
            router,
            store,
            db_path,
            worker,
            _temp_dir: temp_dir,
        }
    }

    /// Drops the router (and with it the last relay sender) and waits for the
    /// worker to drain.
    pub async fn shutdown(self) {
        drop(self.router);
        self.worker.join().await.unwrap();
    }
}

/// Spawns a worker for `db_path` and returns the producer half.
pub async fn spawn_worker(db_path: PathBuf) -> (RelaySender, WorkerHandle) {
    let (relay, receiver) = relay::channel(relay::DEFAULT_CAPACITY, Duration::from_millis(20));
    let worker = ReassemblyWorker::spawn(db_path, receiver).await.unwrap();
    (relay, worker)
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// JSON payloads of the `data:` lines of an SSE body.
pub fn sse_json_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str(data.trim()).ok())
        .collect()
}

/// A timestamp comfortably after "now", for tests that assert reply content
/// rather than ordering. Same-second ordering is exercised with
/// `ScriptedCompletionClient::with_live_timestamps`.
pub fn later_timestamp() -> String {
    (chrono::Utc::now().timestamp() + 60).to_string()
}
