//! Language-model access and usage accounting.
//!
//! The [`LLMClient`] trait is the seam between a session and whatever
//! serves completions. [`OpenAICompatibleClient`] speaks the OpenAI
//! chat-completions protocol, one-shot or streamed; tests substitute their
//! own implementations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use genai_magics::llm::{
//!     collect_stream, ClientConfig, CompletionRequest, LLMClient, OpenAICompatibleClient,
//! };
//! use genai_magics::Message;
//!
//! let client = OpenAICompatibleClient::new(
//!     ClientConfig::new("http://localhost:8000", "meta.llama-3.3-70b-instruct"),
//! )?;
//!
//! let request = CompletionRequest::new()
//!     .with_message(Message::system("You are an expert Data Scientist."))
//!     .with_message(Message::user("What is a left join?"));
//!
//! let text = collect_stream(client.stream(request).await?).await?;
//! ```

mod client;
mod tokenizer;
mod types;
mod usage;

pub use client::{
    collect_stream, collect_stream_with, ChunkSink, ChunkStream, ClientConfig, LLMClient,
    OpenAICompatibleClient,
};
pub use tokenizer::{
    tokenizer_for, ApproxTokenizer, TiktokenTokenizer, Tokenizer, DEFAULT_ENCODING,
};
pub use types::{CompletionRequest, CompletionResponse, StopReason, StreamChunk};
pub use usage::{UsageAccountant, UsageStats};
