pub mod handlers;
mod stream;
pub mod types;

pub use stream::{ReplyPipeline, encode_fragment};

use crate::{
    Result,
    config::Config,
    history::MessageStore,
    llm::{CompletionClient, OpenAiClient},
    relay::{self, ReassemblyWorker},
};
use axum::{
    Router,
    routing::{get, post},
};
use handlers::AppState;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/chat-history", post(handlers::chat_history))
        .route("/stream-example", get(handlers::stream_example))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let db_path = PathBuf::from(&config.server.database_path);
    let store = Arc::new(MessageStore::initialize(&db_path).await?);

    let (relay, receiver) = relay::channel(
        config.relay.capacity,
        Duration::from_millis(config.relay.poll_interval_ms),
    );
    // The service does not run without its persistence worker
    let worker = ReassemblyWorker::spawn(db_path, receiver).await?;

    let completions: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(config.llm.clone()));

    let app = router(AppState {
        store: store.clone(),
        relay,
        completions,
    });

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for reassembly worker to drain");
    if let Err(e) = worker.join().await {
        error!("Reassembly worker did not stop cleanly: {}", e);
    }
    store.close();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
