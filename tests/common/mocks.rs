use async_trait::async_trait;
use chat_relay::{
    Error, Result,
    history::{ChatMessage, timestamp_now},
    llm::{CompletionClient, CompletionStream},
    relay::Fragment,
};
use futures::StreamExt;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// One item the scripted provider emits.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Fragment(Fragment),
    Fault(String),
    /// Provider goes quiet for a while before the next item.
    Pause(Duration),
}

/// A recorded `stream_completion` call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub history: Vec<ChatMessage>,
    pub message: String,
}

/// Completion provider that replays a fixed script for every request.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    pub script: Vec<ScriptItem>,
    pub start_error: Option<String>,
    /// Replace every fragment's `created` with the clock at request time.
    pub stamp_now: bool,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments(mut self, fragments: Vec<Fragment>) -> Self {
        self.script
            .extend(fragments.into_iter().map(ScriptItem::Fragment));
        self
    }

    pub fn with_fault(mut self, message: &str) -> Self {
        self.script.push(ScriptItem::Fault(message.to_string()));
        self
    }

    pub fn with_pause(mut self, delay: Duration) -> Self {
        self.script.push(ScriptItem::Pause(delay));
        self
    }

    pub fn with_live_timestamps(mut self) -> Self {
        self.stamp_now = true;
        self
    }

    pub fn with_start_error(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn stream_completion(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<CompletionStream> {
        self.requests.lock().unwrap().push(RecordedRequest {
            history: history.to_vec(),
            message: message.to_string(),
        });

        if let Some(ref error) = self.start_error {
            return Err(Error::llm(error.clone()));
        }

        let stamp = self.stamp_now.then(timestamp_now);
        let items = futures::stream::iter(self.script.clone()).filter_map(move |item| {
            let stamp = stamp.clone();
            async move {
                match item {
                    ScriptItem::Fragment(mut fragment) => {
                        if let Some(created) = stamp {
                            fragment.created = created;
                        }
                        Some(Ok::<Fragment, Error>(fragment))
                    }
                    ScriptItem::Fault(message) => Some(Err(Error::llm(message))),
                    ScriptItem::Pause(delay) => {
                        tokio::time::sleep(delay).await;
                        None
                    }
                }
            }
        });

        Ok(items.boxed())
    }
}
