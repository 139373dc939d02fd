//! Test doubles for the model and executor seams.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, CompletionResponse, LLMClient};
use crate::namespace::{Cell, DataFrame};
use crate::repl::{CodeExecutor, ErrorInfo, ExecutionResult};

/// Replies with queued texts and remembers every request.
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::llm_api("scripted", "no scripted reply left"))?;
        Ok(CompletionResponse {
            id: "scripted".to_string(),
            model: "scripted".to_string(),
            content,
            stop_reason: None,
            timestamp: Utc::now(),
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Prints a fixed text, or raises, and records what it was asked to run.
pub(crate) struct FakeExecutor {
    output: String,
    failure: Option<ErrorInfo>,
    seen: Mutex<Vec<(String, String, DataFrame)>>,
}

impl FakeExecutor {
    pub(crate) fn printing(output: &str) -> Self {
        Self {
            output: output.to_string(),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn raising(error_type: &str, message: &str) -> Self {
        Self {
            output: String::new(),
            failure: Some(ErrorInfo {
                error_type: error_type.to_string(),
                message: message.to_string(),
                traceback: None,
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// `(code, binding, table)` per call.
    pub(crate) fn seen(&self) -> Vec<(String, String, DataFrame)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExecutor for FakeExecutor {
    async fn execute(
        &self,
        code: &str,
        binding: &str,
        table: &DataFrame,
    ) -> Result<ExecutionResult> {
        self.seen
            .lock()
            .unwrap()
            .push((code.to_string(), binding.to_string(), table.clone()));
        Ok(ExecutionResult {
            captured_output: self.output.clone(),
            failure: self.failure.clone(),
            elapsed_ms: 1,
        })
    }
}

/// Two-row restaurant table.
pub(crate) fn restaurants() -> DataFrame {
    DataFrame::new()
        .with_column("name", vec!["Noma".into(), "Dishoom".into()])
        .unwrap()
        .with_column("rating", vec![Cell::Float(4.5), Cell::Float(3.0)])
        .unwrap()
}
