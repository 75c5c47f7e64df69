use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Message store is closed")]
    StoreClosed,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Relay queue is closed")]
    RelayClosed,

    #[error("Reassembly worker failed to start: {0}")]
    WorkerStartup(String),

    #[error("HTTP error: {0}")]
    Http(#[from] axum::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn worker_startup(msg: impl Into<String>) -> Self {
        Self::WorkerStartup(msg.into())
    }

    /// True for failures of the backing store: the file could not be opened,
    /// written or read, or the store was already closed.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_) | Self::StoreClosed)
    }
}
