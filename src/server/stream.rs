use crate::{
    Result,
    history::{ChatMessage, MessageStore},
    llm::CompletionStream,
    relay::{Fragment, RelaySender},
};
use axum::response::sse::Event;
use futures::{Stream, StreamExt, stream};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

// events buffered for a slow client before the relay task waits on it
const EVENT_BUFFER: usize = 32;

/// Per-request state of a reply being streamed to the client.
pub struct ReplyPipeline {
    upstream: CompletionStream,
    relay: RelaySender,
    store: Arc<MessageStore>,
    chat_id: String,
    user_turn: Option<ChatMessage>,
    // last non-terminal fragment relayed, used to close a reply cut short upstream
    open_reply: Option<(String, String)>,
}

impl ReplyPipeline {
    pub fn new(
        upstream: CompletionStream,
        relay: RelaySender,
        store: Arc<MessageStore>,
        chat_id: String,
        user_turn: ChatMessage,
    ) -> Self {
        Self {
            upstream,
            relay,
            store,
            chat_id,
            user_turn: Some(user_turn),
            open_reply: None,
        }
    }

    /// SSE events for the client.
    ///
    /// The upstream is consumed by a spawned task, not by the response body,
    /// so the reply is relayed to the worker in full even when the client
    /// disconnects halfway. The user turn is recorded when the first upstream
    /// item arrives. An upstream fault ends the stream with an `error` event
    /// and closes the partial reply so the worker still persists it.
    pub fn into_events(self) -> impl Stream<Item = std::result::Result<Event, Infallible>> + Send {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(self.drive(tx));

        stream::unfold(rx, |mut rx| async move {
            let event = rx.recv().await?;
            Some((Ok(event), rx))
        })
    }

    async fn drive(mut self, events: mpsc::Sender<Event>) {
        let mut client_gone = false;

        while let Some(item) = self.upstream.next().await {
            if let Some(turn) = self.user_turn.take() {
                record_user_turn(&self.store, &self.chat_id, turn).await;
            }

            match item {
                Ok(fragment) => {
                    self.open_reply = (!fragment.is_terminal())
                        .then(|| (fragment.completion_id.clone(), fragment.created.clone()));
                    if let Err(e) = self.relay.submit(self.chat_id.clone(), fragment.clone()).await {
                        error!(chat_id = %self.chat_id, "Failed to relay fragment: {}", e);
                    }
                    if client_gone {
                        continue;
                    }
                    match encode_fragment(&self.chat_id, &fragment) {
                        Ok(event) => {
                            trace!(chat_id = %self.chat_id, "Yielding fragment");
                            if events.send(event).await.is_err() {
                                debug!(chat_id = %self.chat_id, "Client disconnected, relaying the rest of the reply");
                                client_gone = true;
                            }
                        }
                        Err(e) => {
                            warn!(chat_id = %self.chat_id, "Failed to encode fragment: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!(chat_id = %self.chat_id, "Completion stream failed: {}", e);
                    self.close_open_reply().await;
                    if !client_gone {
                        let event = Event::default().event("error").data(e.to_string());
                        let _ = events.send(event).await;
                    }
                    return;
                }
            }
        }
    }

    async fn close_open_reply(&mut self) {
        let Some((completion_id, created)) = self.open_reply.take() else {
            return;
        };
        let terminal = Fragment::new(completion_id, created).with_finish_reason("error");
        if let Err(e) = self.relay.submit(self.chat_id.clone(), terminal).await {
            error!(chat_id = %self.chat_id, "Failed to close partial reply: {}", e);
        }
    }
}

async fn record_user_turn(store: &MessageStore, chat_id: &str, turn: ChatMessage) {
    if let Err(e) = store.append(chat_id, &turn).await {
        error!(chat_id, "Failed to record user turn: {}", e);
    }
}

/// JSON object of the fragment with the resolved `chat_id` added.
pub fn encode_fragment(chat_id: &str, fragment: &Fragment) -> Result<Event> {
    let mut value = serde_json::to_value(fragment)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("chat_id".to_string(), chat_id.into());
    }
    Ok(Event::default().json_data(value)?)
}
