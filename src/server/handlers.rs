use super::{
    stream::ReplyPipeline,
    types::{ChatQuery, ErrorResponse, HistoryErrorResponse, HistoryQuery},
};
use crate::{
    Error,
    history::{ChatMessage, MessageStore, timestamp_now},
    llm::CompletionClient,
    relay::RelaySender,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt, stream::BoxStream};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tracing::{debug, error, info};
use uuid::Uuid;

const EXAMPLE_TOKENS: [&str; 7] = ["hello", ", ", "this ", "is ", "a ", "streamed ", "response."];

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MessageStore>,
    pub relay: RelaySender,
    pub completions: Arc<dyn CompletionClient>,
}

pub type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// 500 when our own store failed, 502 when the provider did.
fn status_for(error: &Error) -> StatusCode {
    if error.is_storage_fault() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_GATEWAY
    }
}

pub async fn chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Sse<EventStream>, (StatusCode, Json<ErrorResponse>)> {
    let (chat_id, history) = match query.chat_id {
        Some(chat_id) => {
            let history = state.store.list(&chat_id).await.map_err(|e| {
                error!(chat_id = %chat_id, "Failed to load chat history: {}", e);
                (
                    status_for(&e),
                    Json(ErrorResponse {
                        error: format!("Failed to load chat history: {}", e),
                    }),
                )
            })?;
            (chat_id, history)
        }
        None => (Uuid::new_v4().to_string(), Vec::new()),
    };

    info!(chat_id = %chat_id, history = history.len(), "Received chat message");

    let user_turn = ChatMessage::user(query.message.as_str(), timestamp_now());
    let upstream = state
        .completions
        .stream_completion(&history, &query.message)
        .await
        .map_err(|e| {
            error!(chat_id = %chat_id, "Failed to start completion: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: format!("Completion error: {}", e),
                }),
            )
        })?;

    let events = ReplyPipeline::new(upstream, state.relay.clone(), state.store.clone(), chat_id, user_turn)
        .into_events()
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn chat_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, Json<HistoryErrorResponse>)> {
    match state.store.list(&query.chat_id).await {
        Ok(messages) => {
            debug!(chat_id = %query.chat_id, "Returning {} messages", messages.len());
            Ok(Json(messages))
        }
        Err(e) => {
            error!(chat_id = %query.chat_id, "Failed to get chat history: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HistoryErrorResponse {
                    error: format!("Failed to get chat history: {}", e),
                    messages: Vec::new(),
                }),
            ))
        }
    }
}

/// Streams a fixed sentence one token at a time.
pub async fn stream_example() -> Sse<EventStream> {
    Sse::new(example_tokens(Duration::from_millis(250)).boxed())
}

pub fn example_tokens(delay: Duration) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    futures::stream::iter(EXAMPLE_TOKENS).then(move |token| async move {
        tokio::time::sleep(delay).await;
        debug!("Yielding token: {}", token);
        Ok(Event::default().data(token))
    })
}
