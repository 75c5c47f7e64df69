use super::types::{fragment_from_chunk, to_openai_message};
use crate::{Result, config::LlmConfig, history::ChatMessage, relay::Fragment};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, warn};

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Starts a streamed completion answering `message` in the context of
    /// `history`.
    async fn stream_completion(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<CompletionStream>;
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key);

        if !config.base_url.is_empty() {
            openai_config = openai_config.with_api_base(config.base_url);
        }

        let client = Client::with_config(openai_config);

        Self {
            client,
            model: config.model,
            system_prompt: config.system_prompt,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(history.len() + 2);

        if let Some(ref prompt) = self.system_prompt {
            let system = ChatCompletionRequestSystemMessageArgs::default()
                .content(ChatCompletionRequestSystemMessageContent::Text(
                    prompt.clone(),
                ))
                .build()
                .map_err(|e| crate::Error::llm(format!("Failed to build system message: {}", e)))?;
            messages.push(system.into());
        }

        for turn in history {
            match to_openai_message(turn) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Skipping history turn: {}", e),
            }
        }

        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                message.to_string(),
            ))
            .build()
            .map_err(|e| crate::Error::llm(format!("Failed to build user message: {}", e)))?;
        messages.push(user.into());

        Ok(messages)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn stream_completion(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<CompletionStream> {
        let messages = self.build_messages(history, message)?;

        debug!(
            "Creating streamed chat completion with {} messages",
            messages.len()
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(stream
            .map(|chunk| chunk.map(fragment_from_chunk).map_err(crate::Error::from))
            .boxed())
    }
}
