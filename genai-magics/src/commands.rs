//! Line-oriented command surface.
//!
//! A front-end hands each `%command args` line to [`Command::parse`] and
//! shows whatever [`Command::run`] returns. The leading `%` is optional.

use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::session::Session;

/// Command names, in the order they are announced.
pub const COMMANDS: [&str; 9] = [
    "ask",
    "ask_code",
    "ask_data",
    "ask_df",
    "clear_history",
    "clear_stats",
    "genai_stats",
    "show_variables",
    "show_model_config",
];

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    AskCode(String),
    AskData(String),
    AskDf { target: String, question: String },
    ShowVariables,
    ShowModelConfig,
    GenaiStats,
    ClearHistory,
    ClearStats,
}

impl Command {
    /// Parse `%name rest-of-line`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let line = line.strip_prefix('%').unwrap_or(line);
        let (name, rest) = split_word(line);

        match name {
            "ask" => Ok(Self::Ask(rest.to_string())),
            "ask_code" => Ok(Self::AskCode(rest.to_string())),
            "ask_data" => Ok(Self::AskData(rest.to_string())),
            "ask_df" => {
                let (target, question) = split_word(rest);
                if target.is_empty() || question.is_empty() {
                    return Err(Error::Usage("%ask_df <variable> <question>".to_string()));
                }
                Ok(Self::AskDf {
                    target: target.to_string(),
                    question: question.to_string(),
                })
            }
            "show_variables" => Ok(Self::ShowVariables),
            "show_model_config" => Ok(Self::ShowModelConfig),
            "genai_stats" => Ok(Self::GenaiStats),
            "clear_history" => Ok(Self::ClearHistory),
            "clear_stats" => Ok(Self::ClearStats),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::AskCode(_) => "ask_code",
            Self::AskData(_) => "ask_data",
            Self::AskDf { .. } => "ask_df",
            Self::ShowVariables => "show_variables",
            Self::ShowModelConfig => "show_model_config",
            Self::GenaiStats => "genai_stats",
            Self::ClearHistory => "clear_history",
            Self::ClearStats => "clear_stats",
        }
    }

    /// Execute against `session`, returning the text to display.
    pub async fn run(self, session: &mut Session, namespace: &Namespace) -> Result<String> {
        match self {
            Self::Ask(text) => session.ask(&text).await,
            Self::AskCode(text) => Ok(session.ask_code(namespace, &text).await?.sanitized_code),
            Self::AskData(text) => session.ask_data(namespace, &text).await,
            Self::AskDf { target, question } => {
                let outcome = session.analyze(namespace, &target, &question).await?;
                Ok(format!(
                    "Generated code:\n{}\n\n{}",
                    outcome.artifact.code(),
                    outcome.answer
                ))
            }
            Self::ShowVariables => Ok(session.show_variables(namespace)),
            Self::ShowModelConfig => Ok(session.show_model_config()),
            Self::GenaiStats => Ok(session.genai_stats()),
            Self::ClearHistory => {
                session.clear_history();
                Ok("History cleared !".to_string())
            }
            Self::ClearStats => {
                session.clear_stats();
                Ok("Usage statistics cleared !".to_string())
            }
        }
    }
}

/// Announcement shown when the assistant is loaded into a host.
pub fn banner() -> String {
    let mut out = String::from("genai-magics loaded...\nList of magic commands available:");
    for name in COMMANDS {
        out.push_str("\n* ");
        out.push_str(name);
    }
    out
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}
