//! One interactive assistant session.
//!
//! A [`Session`] owns the conversation history and usage totals for one
//! interactive run, plus handles to the model and the code executor. Every
//! operation takes `&mut self`, so a session serves one request at a time.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::codegen::{
    code_messages, invoke_model, CodeArtifact, CodeGenPipeline, PipelineOutcome, TABLE_BINDING,
};
use crate::config::MagicsConfig;
use crate::context::{
    build_context, describe_mentioned, list_variables, ConversationHistory, Message,
};
use crate::error::{Error, Result};
use crate::inspect::describe;
use crate::llm::{
    tokenizer_for, ChunkSink, LLMClient, OpenAICompatibleClient, UsageAccountant, UsageStats,
};
use crate::namespace::Namespace;
use crate::prompts::{format_context_request, PROMPT_ASK, PROMPT_ASK_DATA};
use crate::repl::{CodeExecutor, PythonExecutor};

/// Assistant state for one interactive run.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: MagicsConfig,
    client: Arc<dyn LLMClient>,
    executor: Arc<dyn CodeExecutor>,
    history: ConversationHistory,
    usage: UsageAccountant,
    sink: Option<ChunkSink>,
}

impl Session {
    /// Create a session over the given model and executor.
    pub fn new(
        config: MagicsConfig,
        client: Arc<dyn LLMClient>,
        executor: Arc<dyn CodeExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        let tokenizer = tokenizer_for(&config.tokenizer)?;

        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client,
            executor,
            history: ConversationHistory::new(),
            usage: UsageAccountant::new(tokenizer),
            sink: None,
            config,
        };
        info!(
            session_id = %session.id,
            model = %session.config.model_id,
            tokenizer = session.usage.tokenizer_name(),
            "Session created"
        );
        Ok(session)
    }

    /// Create a session with the HTTP client and Python executor `config`
    /// describes.
    pub fn from_config(config: MagicsConfig) -> Result<Self> {
        let client = OpenAICompatibleClient::new(config.client_config())?;
        let executor = PythonExecutor::new(config.executor_config());
        Self::new(config, Arc::new(client), Arc::new(executor))
    }

    /// Create a session from `GENAI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_config(MagicsConfig::from_env())
    }

    /// Receive model output as it arrives.
    pub fn with_chunk_sink(mut self, sink: impl FnMut(&str) + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &MagicsConfig {
        &self.config
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn usage_stats(&self) -> &UsageStats {
        self.usage.stats()
    }

    fn window(&self) -> Vec<Message> {
        self.history.windowed(self.config.history_window).to_vec()
    }

    async fn invoke(&mut self, messages: Vec<Message>) -> Result<String> {
        invoke_model(
            self.client.as_ref(),
            &self.config,
            &mut self.usage,
            &mut self.sink,
            messages,
        )
        .await
    }

    /// General question, answered with the recent conversation in view.
    pub async fn ask(&mut self, text: &str) -> Result<String> {
        let mut messages = vec![Message::system(PROMPT_ASK)];
        messages.extend(self.window());
        messages.push(Message::user(text));

        let reply = self.invoke(messages).await?;
        self.history.append_turn(text, reply.as_str());
        Ok(reply)
    }

    /// Python code for `text`, given the variables it mentions.
    ///
    /// The code is returned, not run.
    pub async fn ask_code(&mut self, namespace: &Namespace, text: &str) -> Result<CodeArtifact> {
        let context = build_context(namespace, text);
        let messages = code_messages(&self.window(), &context, text);

        let artifact = CodeGenPipeline::new(
            self.client.as_ref(),
            self.executor.as_ref(),
            &self.config,
            &mut self.usage,
            &mut self.sink,
        )
        .generate_code(messages)
        .await?;

        self.history.append_turn(text, artifact.raw_model_text.as_str());
        Ok(artifact)
    }

    /// Insights about the variables `text` mentions, without code.
    ///
    /// Stateless: prior turns are not sent and this exchange is not kept.
    pub async fn ask_data(&mut self, namespace: &Namespace, text: &str) -> Result<String> {
        let context = build_context(namespace, text);
        let messages = vec![
            Message::system(PROMPT_ASK_DATA),
            Message::user(format_context_request(&context, text)),
        ];
        self.invoke(messages).await
    }

    /// Answer `question` by generating and running code over the table
    /// bound to `target`.
    pub async fn analyze(
        &mut self,
        namespace: &Namespace,
        target: &str,
        question: &str,
    ) -> Result<PipelineOutcome> {
        let value = namespace
            .get(target)
            .ok_or_else(|| Error::Variable(format!("name '{}' is not defined", target)))?;
        let table = value.as_table().ok_or_else(|| {
            Error::Variable(format!(
                "'{}' is a {}, not a DataFrame",
                target,
                value.type_label()
            ))
        })?;

        let mut blocks = vec![describe(TABLE_BINDING, value).to_string()];
        blocks.extend(
            describe_mentioned(namespace, question)
                .into_iter()
                .filter(|d| d.name != target && d.name != TABLE_BINDING)
                .map(|d| d.to_string()),
        );
        let context = blocks.join("\n");
        debug!(table = target, context_chars = context.len(), "Analyzing table");

        let history = self.window();
        let outcome = CodeGenPipeline::new(
            self.client.as_ref(),
            self.executor.as_ref(),
            &self.config,
            &mut self.usage,
            &mut self.sink,
        )
        .run(&history, &context, question, table)
        .await?;

        self.history.append_turn(question, outcome.answer.as_str());
        Ok(outcome)
    }

    /// User-defined variables with their values.
    pub fn show_variables(&self, namespace: &Namespace) -> String {
        let mut out = String::from("User-defined variables in the current session:");
        for line in list_variables(namespace) {
            out.push_str("\n* ");
            out.push_str(&line);
        }
        out
    }

    pub fn show_model_config(&self) -> String {
        let c = &self.config;
        format!(
            "Model configuration:\n\
             * Model: {}\n\
             * Endpoint: {}\n\
             * Temperature: {}\n\
             * Max_tokens: {}\n\
             * Top_p: {}\n\
             * History window: {}",
            c.model_id, c.endpoint, c.temperature, c.max_tokens, c.top_p, c.history_window
        )
    }

    pub fn genai_stats(&self) -> String {
        self.usage.report()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        debug!(session_id = %self.id, "History cleared");
    }

    pub fn clear_stats(&mut self) {
        self.usage.reset();
        debug!(session_id = %self.id, "Usage statistics cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::namespace::{Function, Value};
    use crate::testing::{restaurants, FakeExecutor, ScriptedClient};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn config() -> MagicsConfig {
        MagicsConfig::default().with_tokenizer("approx")
    }

    fn session_with(client: Arc<ScriptedClient>, executor: Arc<FakeExecutor>) -> Session {
        Session::new(config(), client, executor).unwrap()
    }

    fn namespace() -> Namespace {
        Namespace::new()
            .with("df", restaurants())
            .with("threshold", 3.5)
            .with("helper", Function::new("helper"))
            .with("_secret", "hidden")
    }

    #[tokio::test]
    async fn test_ask_stores_turn_and_sends_window() {
        let client = Arc::new(ScriptedClient::new(&["first answer", "second answer"]));
        let mut session = session_with(client.clone(), Arc::new(FakeExecutor::printing("")));

        assert_eq!(session.ask("what is a join?").await.unwrap(), "first answer");
        session.ask("and a left join?").await.unwrap();

        let history = session.history().messages();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "what is a join?");
        assert_eq!(history[3].role, Role::Assistant);

        let second = &client.requests()[1];
        assert_eq!(second.messages[0].content, PROMPT_ASK);
        assert_eq!(second.messages[1].content, "what is a join?");
        assert_eq!(second.messages[2].content, "first answer");
        assert_eq!(second.messages[3].content, "and a left join?");
        assert_eq!(session.usage_stats().request_count, 2);
    }

    #[tokio::test]
    async fn test_history_window_bounds_prompt() {
        let replies: Vec<String> = (0..7).map(|i| format!("a{}", i)).collect();
        let reply_refs: Vec<&str> = replies.iter().map(String::as_str).collect();
        let client = Arc::new(ScriptedClient::new(&reply_refs));
        let mut session = Session::new(
            config().with_history_window(4),
            client.clone(),
            Arc::new(FakeExecutor::printing("")),
        )
        .unwrap();

        for i in 0..7 {
            session.ask(&format!("q{}", i)).await.unwrap();
        }

        let last = client.requests().pop().unwrap();
        // system + 4 windowed messages + the new question
        assert_eq!(last.messages.len(), 6);
        assert_eq!(last.messages[1].content, "q4");
        assert_eq!(last.messages[5].content, "q6");
    }

    #[tokio::test]
    async fn test_ask_code_includes_context_and_stores_raw_reply() {
        let client = Arc::new(ScriptedClient::new(&["```python\nprint(df.head())\n```"]));
        let executor = Arc::new(FakeExecutor::printing(""));
        let mut session = session_with(client.clone(), executor.clone());

        let artifact = session
            .ask_code(&namespace(), "plot df with helper")
            .await
            .unwrap();

        assert_eq!(artifact.code(), "\nprint(df.head())\n");
        assert!(executor.seen().is_empty());

        let user = client.requests()[0].messages.last().unwrap().content.clone();
        assert!(user.starts_with("Context: Variable: df\nType: DataFrame\nShape: (2, 2)"));
        assert!(user.ends_with("\n\nplot df with helper"));
        assert!(!user.contains("Variable: helper"));

        let history = session.history().messages();
        assert_eq!(history[0].content, "plot df with helper");
        assert_eq!(history[1].content, "```python\nprint(df.head())\n```");
    }

    #[tokio::test]
    async fn test_ask_data_is_stateless() {
        let client = Arc::new(ScriptedClient::new(&["earlier", "- Noma: 4.5"]));
        let mut session = session_with(client.clone(), Arc::new(FakeExecutor::printing("")));
        session.ask("hello").await.unwrap();

        let answer = session
            .ask_data(&namespace(), "best rated in df")
            .await
            .unwrap();
        assert_eq!(answer, "- Noma: 4.5");

        let request = &client.requests()[1];
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, PROMPT_ASK_DATA);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_ask_data_with_no_matching_variables_still_invokes() {
        let client = Arc::new(ScriptedClient::new(&["general insight"]));
        let mut session = session_with(client.clone(), Arc::new(FakeExecutor::printing("")));

        session.ask_data(&namespace(), "anything new?").await.unwrap();
        assert_eq!(
            client.requests()[0].messages[1].content,
            "Context: \n\nanything new?"
        );
    }

    #[tokio::test]
    async fn test_analyze_runs_pipeline_on_target() {
        let client = Arc::new(ScriptedClient::new(&[
            "```python\nprint(df[df.rating > threshold])\n```",
            "Noma is the only restaurant above the threshold.",
        ]));
        let executor = Arc::new(FakeExecutor::printing("   name  rating\n0  Noma     4.5\n"));
        let mut session = session_with(client.clone(), executor.clone());
        let ns = namespace().with("sales", restaurants());

        let outcome = session
            .analyze(&ns, "sales", "which rows are above threshold")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Noma is the only restaurant above the threshold.");
        assert_eq!(executor.seen()[0].1, "df");

        let user = client.requests()[0].messages.last().unwrap().content.clone();
        assert!(user.starts_with("Context: Variable: df\nType: DataFrame"));
        assert!(user.contains("Variable: threshold"));

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.usage_stats().request_count, 2);
    }

    #[tokio::test]
    async fn test_analyze_rejects_missing_or_non_table_target() {
        let client = Arc::new(ScriptedClient::new(&[]));
        let mut session = session_with(client.clone(), Arc::new(FakeExecutor::printing("")));

        let err = session.analyze(&namespace(), "nope", "q").await.unwrap_err();
        assert!(matches!(err, Error::Variable(_)));

        let err = session
            .analyze(&namespace(), "threshold", "q")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable error: 'threshold' is a float, not a DataFrame"
        );
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_execution_failure_leaves_history_untouched() {
        let client = Arc::new(ScriptedClient::new(&["print(df.price)"]));
        let executor = Arc::new(FakeExecutor::raising("AttributeError", "no attribute 'price'"));
        let mut session = session_with(client, executor);

        let err = session
            .analyze(&namespace(), "df", "average price")
            .await
            .unwrap_err();
        assert!(err.is_execution());
        assert!(session.history().is_empty());
        assert_eq!(session.usage_stats().request_count, 1);
    }

    #[tokio::test]
    async fn test_model_failure_stores_nothing() {
        let client = Arc::new(ScriptedClient::new(&[]));
        let mut session = session_with(client, Arc::new(FakeExecutor::printing("")));

        assert!(session.ask("hi").await.is_err());
        assert!(session.history().is_empty());
        assert_eq!(session.usage_stats().request_count, 0);
    }

    #[tokio::test]
    async fn test_chunk_sink_sees_output() {
        let client = Arc::new(ScriptedClient::new(&["streamed"]));
        let seen = Arc::new(Mutex::new(String::new()));
        let sink_seen = Arc::clone(&seen);
        let mut session = session_with(client, Arc::new(FakeExecutor::printing("")))
            .with_chunk_sink(move |chunk| sink_seen.lock().unwrap().push_str(chunk));

        session.ask("hi").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), "streamed");
    }

    #[test]
    fn test_show_variables() {
        let session = session_with(
            Arc::new(ScriptedClient::new(&[])),
            Arc::new(FakeExecutor::printing("")),
        );
        let ns = Namespace::new()
            .with("threshold", 3.5)
            .with("city", "London")
            .with("helper", Function::new("helper"))
            .with("Out", Value::Dict(vec![]));

        assert_eq!(
            session.show_variables(&ns),
            "User-defined variables in the current session:\n* threshold: 3.5\n* city: London"
        );
    }

    #[test]
    fn test_show_model_config() {
        let session = session_with(
            Arc::new(ScriptedClient::new(&[])),
            Arc::new(FakeExecutor::printing("")),
        );
        let text = session.show_model_config();
        assert!(text.contains("* Model: meta.llama-3.3-70b-instruct"));
        assert!(text.contains("* Temperature: 0.1"));
        assert!(text.contains("* Max_tokens: 1024"));
    }

    #[tokio::test]
    async fn test_clear_history_and_stats() {
        let client = Arc::new(ScriptedClient::new(&["a"]));
        let mut session = session_with(client, Arc::new(FakeExecutor::printing("")));
        session.ask("q").await.unwrap();

        session.clear_history();
        session.clear_history();
        assert!(session.history().is_empty());

        session.clear_stats();
        assert_eq!(session.usage_stats(), &UsageStats::default());
        assert!(session.genai_stats().contains("No requests recorded yet."));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config();
        bad.top_p = 1.5;
        let result = Session::new(
            bad,
            Arc::new(ScriptedClient::new(&[])),
            Arc::new(FakeExecutor::printing("")),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
