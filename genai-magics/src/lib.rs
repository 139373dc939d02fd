//! # genai-magics
//!
//! A conversational data-analysis assistant for interactive computing
//! sessions. It answers questions with a hosted language model, grounding
//! prompts in the variables the question names and, for tabular data,
//! generating and running analysis code before summarizing the result.
//!
//! ## Core Components
//!
//! - **Namespace**: Snapshot of the host session's variables
//! - **Context**: Variable descriptions for prompts and conversation history
//! - **LLM**: OpenAI-compatible chat client, tokenizers and usage accounting
//! - **Codegen**: Generate, sanitize, execute and summarize analysis code
//! - **Session**: The commands a user types, over one shared history
//!
//! ## Example
//!
//! ```rust,ignore
//! use genai_magics::{Command, Namespace, Session};
//!
//! let mut session = Session::from_env()?;
//! let ns = Namespace::new().with("threshold", 3.5);
//!
//! let reply = Command::parse("%ask_data which rows are above threshold")?
//!     .run(&mut session, &ns)
//!     .await?;
//! println!("{}", reply);
//! ```

pub mod codegen;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod inspect;
pub mod llm;
pub mod namespace;
pub mod prompts;
mod proptest;
pub mod repl;
pub mod session;
#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use codegen::{CodeArtifact, CodeGenPipeline, PipelineOutcome, TABLE_BINDING};
pub use commands::{banner, Command, COMMANDS};
pub use config::MagicsConfig;
pub use context::{build_context, ConversationHistory, Message, Role};
pub use error::{Error, Result};
pub use inspect::{describe, ValueKind, VariableDescriptor};
pub use llm::{
    ClientConfig, CompletionRequest, CompletionResponse, LLMClient, OpenAICompatibleClient,
    Tokenizer, UsageAccountant, UsageStats,
};
pub use namespace::{Cell, DataFrame, Namespace, Value};
pub use repl::{CodeExecutor, ExecutionResult, ExecutorConfig, PythonExecutor};
pub use session::Session;
