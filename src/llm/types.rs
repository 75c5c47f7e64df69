use crate::{Error, Result, history::ChatMessage, relay::Fragment};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionStreamResponse,
};
use serde::Serialize;

/// Converts a stored turn into a request message. Only `system`, `user` and
/// `assistant` turns can be replayed to the provider.
pub fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    match message.role.as_str() {
        "system" => {
            let msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(ChatCompletionRequestSystemMessageContent::Text(
                    message.content.clone(),
                ))
                .build()
                .map_err(|e| Error::llm(format!("Failed to build system message: {}", e)))?;
            Ok(msg.into())
        }
        "user" => {
            let msg = ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(
                    message.content.clone(),
                ))
                .build()
                .map_err(|e| Error::llm(format!("Failed to build user message: {}", e)))?;
            Ok(msg.into())
        }
        "assistant" => {
            let msg = ChatCompletionRequestAssistantMessageArgs::default()
                .content(ChatCompletionRequestAssistantMessageContent::Text(
                    message.content.clone(),
                ))
                .build()
                .map_err(|e| Error::llm(format!("Failed to build assistant message: {}", e)))?;
            Ok(msg.into())
        }
        _ => Err(Error::llm(format!("Unknown message role: {}", message.role))),
    }
}

/// Flattens a streamed chunk into a [`Fragment`] using its first choice.
pub fn fragment_from_chunk(chunk: CreateChatCompletionStreamResponse) -> Fragment {
    let mut fragment = Fragment::new(chunk.id, chunk.created.to_string());

    if let Some(choice) = chunk.choices.into_iter().next() {
        fragment.role = choice.delta.role.as_ref().and_then(wire_name);
        fragment.content = choice.delta.content;
        fragment.finish_reason = choice.finish_reason.as_ref().and_then(wire_name);
    }

    fragment
}

// Enum names as the provider spells them on the wire, e.g. `assistant`, `stop`.
fn wire_name<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value).ok()?.as_str().map(str::to_owned)
}
