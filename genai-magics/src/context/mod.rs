//! Conversation state and prompt context.
//!
//! - [`ConversationHistory`]: ordered, role-tagged messages read through a
//!   sliding window
//! - [`build_context`]: descriptions of the namespace variables a query
//!   names, ready to paste into a prompt
//!
//! ```rust,ignore
//! use genai_magics::context::{build_context, ConversationHistory};
//! use genai_magics::namespace::Namespace;
//!
//! let ns = Namespace::new().with("threshold", 3.5);
//! let context = build_context(&ns, "rows above threshold");
//! // -> "Variable: threshold\nType: float\nString representation: 3.5"
//!
//! let mut history = ConversationHistory::new();
//! history.append_turn("rows above threshold", "...");
//! let recent = history.windowed(10);
//! ```

mod assembler;
mod history;
mod types;

pub use assembler::{
    build_context, describe_mentioned, extract_candidates, filter_variables, is_identifier,
    list_variables,
};
pub use history::ConversationHistory;
pub use types::{Message, Role};
