//! Python execution of generated code.
//!
//! [`PythonExecutor`] runs each snippet in a fresh interpreter process. The
//! table is serialized into the request, so the snippet works on its own
//! copy bound under the requested name and the caller's data is never
//! shared. Inside the interpreter a small driver builds a pandas
//! `DataFrame` when pandas is importable (a dict of column lists
//! otherwise), captures stdout for the duration of the run, and reports
//! one JSON line back:
//!
//! ```text
//! {"stdout": "...", "error": null | {"error_type", "message", "traceback"}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::namespace::DataFrame;

const DRIVER: &str = r#"
import contextlib, io, json, sys, traceback

def load_table(payload):
    names = [c["name"] for c in payload["columns"]]
    data = {c["name"]: c["values"] for c in payload["columns"]}
    try:
        import pandas as pd
    except ImportError:
        return data
    return pd.DataFrame(data, columns=names)

request = json.loads(sys.stdin.read())
buffer = io.StringIO()
reply = {"stdout": "", "error": None}
try:
    scope = {"__name__": "__generated__"}
    scope[request["binding"]] = load_table(request["table"])
    with contextlib.redirect_stdout(buffer):
        exec(compile(request["code"], "<generated>", "exec"), scope)
except BaseException as exc:
    reply["error"] = {
        "error_type": type(exc).__name__,
        "message": str(exc),
        "traceback": traceback.format_exc(),
    }
reply["stdout"] = buffer.getvalue()
sys.__stdout__.write(json.dumps(reply) + "\n")
sys.__stdout__.flush()
"#;

/// Exception raised by executed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub message: String,
    pub traceback: Option<String>,
}

/// Outcome of running one snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Everything the snippet printed, in order
    pub captured_output: String,
    /// Set when the snippet raised
    pub failure: Option<ErrorInfo>,
    /// Wall-clock run time in milliseconds
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The result itself, or the raised exception as [`Error::Execution`].
    pub fn into_success(self) -> Result<Self> {
        match self.failure {
            None => Ok(self),
            Some(info) => Err(Error::Execution {
                error_type: info.error_type,
                message: info.message,
                traceback: info.traceback,
            }),
        }
    }
}

/// Runs generated code against a private copy of a table.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute `code` with a copy of `table` bound to `binding`.
    async fn execute(&self, code: &str, binding: &str, table: &DataFrame)
        -> Result<ExecutionResult>;
}

/// Configuration for [`PythonExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Interpreter path; `~` is expanded. Looked up on `PATH` when unset.
    pub python_path: Option<String>,
    /// Kill the interpreter after this many milliseconds
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            timeout_ms: 30_000,
        }
    }
}

impl ExecutorConfig {
    pub fn with_python_path(mut self, path: impl Into<String>) -> Self {
        self.python_path = Some(path.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    code: &'a str,
    binding: &'a str,
    table: &'a DataFrame,
}

#[derive(Debug, Deserialize)]
struct ExecReply {
    stdout: String,
    error: Option<ErrorInfo>,
}

/// Executes snippets in a one-shot Python subprocess.
#[derive(Debug, Clone, Default)]
pub struct PythonExecutor {
    config: ExecutorConfig,
}

impl PythonExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Locate the interpreter to launch.
    pub fn resolve_interpreter(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.config.python_path {
            return Ok(PathBuf::from(shellexpand::tilde(path).into_owned()));
        }

        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|e| {
                Error::Config(format!(
                    "Python interpreter not found on PATH ({}). Set GENAI_PYTHON.",
                    e
                ))
            })
    }
}

#[async_trait]
impl CodeExecutor for PythonExecutor {
    async fn execute(
        &self,
        code: &str,
        binding: &str,
        table: &DataFrame,
    ) -> Result<ExecutionResult> {
        let interpreter = self.resolve_interpreter()?;
        let payload = serde_json::to_vec(&ExecRequest {
            code,
            binding,
            table,
        })?;
        debug!(
            interpreter = %interpreter.display(),
            payload_bytes = payload.len(),
            "Launching Python executor"
        );

        let start = Instant::now();
        let mut child = Command::new(&interpreter)
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::SubprocessComm(format!(
                    "Failed to spawn Python executor (python_path='{}'): {}",
                    interpreter.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SubprocessComm("Failed to get stdin handle".to_string()))?;

        // Dropping the exchange on timeout drops the child, which kills it.
        let exchange = async move {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| Error::SubprocessComm(format!("Failed to send request: {}", e)))?;
            drop(stdin);
            child
                .wait_with_output()
                .await
                .map_err(|e| Error::SubprocessComm(format!("Failed to read result: {}", e)))
        };

        let output = tokio::time::timeout(Duration::from_millis(self.config.timeout_ms), exchange)
            .await
            .map_err(|_| Error::timeout(self.config.timeout_ms))??;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(line) = stdout.lines().rev().find(|l| !l.trim().is_empty()) else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(500).collect();
            return Err(Error::SubprocessComm(format!(
                "Python executor exited without a result ({}); stderr: {}",
                output.status, excerpt
            )));
        };

        let reply: ExecReply = serde_json::from_str(line).map_err(|e| {
            Error::SubprocessComm(format!(
                "Invalid executor reply: {}; payload={}",
                e,
                line.trim()
            ))
        })?;

        debug!(
            elapsed_ms,
            output_chars = reply.stdout.len(),
            failed = reply.error.is_some(),
            "Python executor finished"
        );

        Ok(ExecutionResult {
            captured_output: reply.stdout,
            failure: reply.error,
            elapsed_ms,
        })
    }
}
