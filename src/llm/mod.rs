mod client;
mod types;

pub use client::{CompletionClient, CompletionStream, OpenAiClient};
pub use types::{fragment_from_chunk, to_openai_message};
