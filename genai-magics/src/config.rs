//! Session configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::llm::{ClientConfig, DEFAULT_ENCODING};
use crate::repl::ExecutorConfig;

/// Model, history, accounting and execution settings for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicsConfig {
    /// Model identifier sent with every request
    pub model_id: String,
    /// Service root of the completion endpoint
    pub endpoint: String,
    /// Bearer token for the endpoint
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    /// Prior messages included in `ask` and `ask_code` prompts
    pub history_window: usize,
    /// Encoding name used for usage accounting
    pub tokenizer: String,
    /// Deliver responses as a stream rather than one-shot
    pub streaming: bool,
    pub track_usage: bool,
    /// Prepend the provenance line to generated code
    pub inject_header: bool,
    pub python_path: Option<String>,
    pub exec_timeout_ms: u64,
}

impl Default for MagicsConfig {
    fn default() -> Self {
        Self {
            model_id: "meta.llama-3.3-70b-instruct".to_string(),
            endpoint: "https://inference.generativeai.eu-frankfurt-1.oci.oraclecloud.com"
                .to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
            top_p: 0.9,
            history_window: 10,
            tokenizer: DEFAULT_ENCODING.to_string(),
            streaming: true,
            track_usage: true,
            inject_header: false,
            python_path: None,
            exec_timeout_ms: 30_000,
        }
    }
}

impl MagicsConfig {
    /// Create a config from `GENAI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a config from any key lookup; unset or unparseable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(default)
        };

        Self {
            model_id: lookup("GENAI_MODEL_ID").unwrap_or(defaults.model_id),
            endpoint: lookup("GENAI_ENDPOINT").unwrap_or(defaults.endpoint),
            api_key: lookup("GENAI_API_KEY").filter(|k| !k.is_empty()),
            temperature: parse_or(lookup("GENAI_TEMPERATURE"), defaults.temperature),
            max_tokens: parse_or(lookup("GENAI_MAX_TOKENS"), defaults.max_tokens),
            top_p: parse_or(lookup("GENAI_TOP_P"), defaults.top_p),
            history_window: parse_or(lookup("GENAI_HISTORY_WINDOW"), defaults.history_window),
            tokenizer: lookup("GENAI_TOKENIZER").unwrap_or(defaults.tokenizer),
            streaming: flag("GENAI_STREAM", defaults.streaming),
            track_usage: flag("GENAI_TRACK_USAGE", defaults.track_usage),
            inject_header: flag("GENAI_INJECT_HEADER", defaults.inject_header),
            python_path: lookup("GENAI_PYTHON"),
            exec_timeout_ms: parse_or(lookup("GENAI_EXEC_TIMEOUT_MS"), defaults.exec_timeout_ms),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_tokenizer(mut self, name: impl Into<String>) -> Self {
        self.tokenizer = name.into();
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_usage_tracking(mut self, track_usage: bool) -> Self {
        self.track_usage = track_usage;
        self
    }

    pub fn with_header_injection(mut self, inject_header: bool) -> Self {
        self.inject_header = inject_header;
        self
    }

    /// Reject sampling settings the endpoint would refuse.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::Config(format!(
                "top_p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    /// HTTP client settings for this config.
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.endpoint, &self.model_id);
        match &self.api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    /// Executor settings for this config.
    pub fn executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::default().with_timeout_ms(self.exec_timeout_ms);
        match &self.python_path {
            Some(path) => config.with_python_path(path),
            None => config,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}
