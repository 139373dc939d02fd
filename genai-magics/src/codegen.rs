//! Code generation pipeline.
//!
//! A code request moves through fixed stages:
//!
//! ```text
//! AssemblePrompt -> Invoke -> Sanitize -> [InjectHeader] -> Execute
//!     -> CaptureOutput -> AssembleSummaryPrompt -> Invoke -> Done
//! ```
//!
//! Every invoke is reduced to one complete string before the next stage
//! runs, whether the model answered in one shot or as a stream. A failure in
//! the generated code stops the pipeline with
//! [`Error::Execution`](crate::error::Error::Execution).

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MagicsConfig;
use crate::context::Message;
use crate::error::Result;
use crate::llm::{collect_stream_with, ChunkSink, CompletionRequest, LLMClient, UsageAccountant};
use crate::namespace::DataFrame;
use crate::prompts::{
    format_context_request, format_summary_request, PROMPT_ASK_CODE, PROMPT_SUMMARIZE,
    PROVENANCE_HEADER,
};
use crate::repl::{CodeExecutor, ExecutionResult};

/// Name the analyzed table is bound to inside generated code.
pub const TABLE_BINDING: &str = "df";

const FENCE_OPEN: &str = "```python";
const FENCE: &str = "```";

/// Strip code-fence delimiters from model output.
///
/// Removal is by literal substring, so fences quoted inside strings or
/// comments are removed as well.
pub fn sanitize(text: &str) -> String {
    text.replace(FENCE_OPEN, "").replace(FENCE, "")
}

/// Prepend the provenance line.
pub fn inject_header(code: &str) -> String {
    format!("{}\n{}", PROVENANCE_HEADER, code)
}

/// Generated code and the model text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub raw_model_text: String,
    pub sanitized_code: String,
    pub header_injected: bool,
}

impl CodeArtifact {
    pub fn from_model_text(raw: impl Into<String>, with_header: bool) -> Self {
        let raw_model_text = raw.into();
        let code = sanitize(&raw_model_text);
        let sanitized_code = if with_header {
            inject_header(&code)
        } else {
            code
        };
        Self {
            raw_model_text,
            sanitized_code,
            header_injected: with_header,
        }
    }

    pub fn code(&self) -> &str {
        &self.sanitized_code
    }
}

/// Everything a completed pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub artifact: CodeArtifact,
    pub execution: ExecutionResult,
    pub answer: String,
}

/// System prompt, history window, then the context-bearing request.
pub fn code_messages(history: &[Message], context: &str, request: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(PROMPT_ASK_CODE));
    messages.extend_from_slice(history);
    messages.push(Message::user(format_context_request(context, request)));
    messages
}

/// Summarization prompt over captured output.
pub fn summary_messages(output: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(PROMPT_SUMMARIZE),
        Message::user(format_summary_request(output, question)),
    ]
}

/// Send one prompt and return the full response text.
///
/// Streams when the config asks for it; chunks go to `sink` as they
/// arrive. The exchange is recorded in `usage` when tracking is on.
pub(crate) async fn invoke_model(
    client: &dyn LLMClient,
    config: &MagicsConfig,
    usage: &mut UsageAccountant,
    sink: &mut Option<ChunkSink>,
    messages: Vec<Message>,
) -> Result<String> {
    let request = CompletionRequest::new()
        .with_model(&config.model_id)
        .with_messages(messages)
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature)
        .with_top_p(config.top_p);
    debug!(
        messages = request.messages.len(),
        streaming = config.streaming,
        "Invoking model"
    );

    let start = Instant::now();
    let text = if config.streaming {
        let stream = client.stream(request.clone()).await?;
        collect_stream_with(stream, |chunk| {
            if let Some(sink) = sink.as_mut() {
                sink(chunk);
            }
        })
        .await?
    } else {
        let content = client.complete(request.clone()).await?.content;
        if let Some(sink) = sink.as_mut() {
            sink(&content);
        }
        content
    };
    let elapsed = start.elapsed().as_secs_f64();

    if config.track_usage {
        usage.record_turn(elapsed, &request.messages, &text);
    }
    info!(
        elapsed_secs = elapsed,
        response_chars = text.len(),
        "Model turn complete"
    );
    Ok(text)
}

/// One code request, driven stage by stage.
pub struct CodeGenPipeline<'s> {
    client: &'s dyn LLMClient,
    executor: &'s dyn CodeExecutor,
    config: &'s MagicsConfig,
    usage: &'s mut UsageAccountant,
    sink: &'s mut Option<ChunkSink>,
}

impl<'s> CodeGenPipeline<'s> {
    pub fn new(
        client: &'s dyn LLMClient,
        executor: &'s dyn CodeExecutor,
        config: &'s MagicsConfig,
        usage: &'s mut UsageAccountant,
        sink: &'s mut Option<ChunkSink>,
    ) -> Self {
        Self {
            client,
            executor,
            config,
            usage,
            sink,
        }
    }

    /// Invoke, sanitize and optionally stamp the provenance header.
    pub async fn generate_code(&mut self, messages: Vec<Message>) -> Result<CodeArtifact> {
        let raw = invoke_model(self.client, self.config, self.usage, self.sink, messages).await?;
        let artifact = CodeArtifact::from_model_text(raw, self.config.inject_header);
        debug!(
            code_chars = artifact.sanitized_code.len(),
            header = artifact.header_injected,
            "Code generated"
        );
        Ok(artifact)
    }

    /// Run the artifact against a copy of `table`.
    pub async fn execute(
        &self,
        artifact: &CodeArtifact,
        table: &DataFrame,
    ) -> Result<ExecutionResult> {
        let result = self
            .executor
            .execute(artifact.code(), TABLE_BINDING, table)
            .await?;

        if let Some(info) = &result.failure {
            warn!(
                error_type = %info.error_type,
                message = %info.message,
                "Generated code raised"
            );
        }
        let result = result.into_success()?;
        debug!(
            elapsed_ms = result.elapsed_ms,
            output_chars = result.captured_output.len(),
            "Code executed"
        );
        Ok(result)
    }

    /// Turn captured output into the final answer.
    pub async fn summarize(&mut self, output: &str, question: &str) -> Result<String> {
        invoke_model(
            self.client,
            self.config,
            self.usage,
            self.sink,
            summary_messages(output, question),
        )
        .await
    }

    /// Run every stage for `question` over `table`.
    pub async fn run(
        &mut self,
        history: &[Message],
        context: &str,
        question: &str,
        table: &DataFrame,
    ) -> Result<PipelineOutcome> {
        let artifact = self
            .generate_code(code_messages(history, context, question))
            .await?;
        let execution = self.execute(&artifact, table).await?;
        let answer = self
            .summarize(&execution.captured_output, question)
            .await?;

        info!(
            code_chars = artifact.sanitized_code.len(),
            exec_ms = execution.elapsed_ms,
            "Pipeline complete"
        );
        Ok(PipelineOutcome {
            artifact,
            execution,
            answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::error::Error;
    use crate::llm::{ApproxTokenizer, ChunkStream, CompletionResponse, StreamChunk};
    use crate::testing::{restaurants, FakeExecutor, ScriptedClient};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn accountant() -> UsageAccountant {
        UsageAccountant::new(Arc::new(ApproxTokenizer))
    }

    #[test]
    fn test_sanitize_python_fence() {
        assert_eq!(sanitize("```python\ncode\n```"), "\ncode\n");
    }

    #[test]
    fn test_sanitize_without_fences_is_identity() {
        assert_eq!(sanitize("print(1)"), "print(1)");
    }

    #[test]
    fn test_sanitize_removes_quoted_fences() {
        // Literal removal: fences inside strings go too.
        assert_eq!(sanitize("s = '```'\n"), "s = ''\n");
    }

    #[test]
    fn test_artifact_header() {
        let artifact = CodeArtifact::from_model_text("```python\nprint(1)\n```", true);
        assert_eq!(
            artifact.code(),
            "# Code generated by genai-magics\n\nprint(1)\n"
        );
        assert!(artifact.header_injected);
        assert_eq!(artifact.raw_model_text, "```python\nprint(1)\n```");
    }

    #[test]
    fn test_code_messages_layout() {
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let messages = code_messages(&history, "Variable: df", "top rated");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[3].content, "Context: Variable: df\n\ntop rated");
    }

    #[tokio::test]
    async fn test_run_completes_all_stages() {
        let client = ScriptedClient::new(&[
            "```python\nprint(df[df['rating'] > 3.5])\n```",
            "## Top restaurants\n- Noma (4.5)",
        ]);
        let executor = FakeExecutor::printing("Noma 4.5\n");
        let config = MagicsConfig::default().with_streaming(false);
        let mut usage = accountant();
        let mut sink = None;

        let outcome = CodeGenPipeline::new(&client, &executor, &config, &mut usage, &mut sink)
            .run(&[], "Variable: df", "restaurants rated above 3.5", &restaurants())
            .await
            .unwrap();

        assert_eq!(outcome.artifact.code(), "\nprint(df[df['rating'] > 3.5])\n");
        assert_eq!(outcome.execution.captured_output, "Noma 4.5\n");
        assert_eq!(outcome.answer, "## Top restaurants\n- Noma (4.5)");

        let seen = executor.seen();
        assert_eq!(seen[0].1, "df");
        assert_eq!(seen[0].2, restaurants());

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages[0].content, PROMPT_SUMMARIZE);
        assert_eq!(
            requests[1].messages[1].content,
            "Context: Noma 4.5\n\nQuestion: restaurants rated above 3.5\n"
        );
        assert_eq!(usage.stats().request_count, 2);
    }

    #[tokio::test]
    async fn test_execution_failure_stops_pipeline() {
        let client = ScriptedClient::new(&["print(df['price'])", "unused"]);
        let executor = FakeExecutor::raising("KeyError", "'price'");
        let config = MagicsConfig::default();
        let mut usage = accountant();
        let mut sink = None;

        let err = CodeGenPipeline::new(&client, &executor, &config, &mut usage, &mut sink)
            .run(&[], "", "average price", &restaurants())
            .await
            .unwrap_err();

        assert!(err.is_execution());
        assert_eq!(err.to_string(), "Execution error: KeyError: 'price'");
        // The summary pass never ran.
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_streams_to_sink_and_skips_usage_when_disabled() {
        let client = ScriptedClient::new(&["streamed text"]);
        let config = MagicsConfig::default().with_usage_tracking(false);
        let mut usage = accountant();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink_seen = Arc::clone(&seen);
        let mut sink: Option<ChunkSink> = Some(Box::new(move |chunk: &str| {
            sink_seen.lock().unwrap().push_str(chunk)
        }));

        let text = invoke_model(
            &client,
            &config,
            &mut usage,
            &mut sink,
            vec![Message::user("hi")],
        )
        .await
        .unwrap();

        assert_eq!(text, "streamed text");
        assert_eq!(*seen.lock().unwrap(), "streamed text");
        assert_eq!(usage.stats().request_count, 0);
    }

    #[tokio::test]
    async fn test_invoke_sends_config_sampling() {
        let client = ScriptedClient::new(&["ok"]);
        let config = MagicsConfig::default();
        let mut usage = accountant();
        let mut sink = None;

        invoke_model(&client, &config, &mut usage, &mut sink, vec![Message::user("q")])
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].model.as_deref(), Some("meta.llama-3.3-70b-instruct"));
        assert_eq!(requests[0].max_tokens, Some(1024));
        assert_eq!(requests[0].top_p, Some(0.9));
    }

    /// Streams one chunk, then reports a service error.
    struct FailingStreamClient;

    #[async_trait::async_trait]
    impl LLMClient for FailingStreamClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(Error::llm_api("failing", "one-shot not used"))
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream> {
            let items = vec![
                Ok(StreamChunk::new("partial")),
                Err(Error::llm_api("failing", "quota exceeded")),
            ];
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_stream_error_is_not_recorded_as_answer() {
        let config = MagicsConfig::default();
        let mut usage = accountant();
        let mut sink = None;

        let err = invoke_model(
            &FailingStreamClient,
            &config,
            &mut usage,
            &mut sink,
            vec![Message::user("q")],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::LlmApi { .. }));
        assert_eq!(usage.stats().request_count, 0);
    }
}
