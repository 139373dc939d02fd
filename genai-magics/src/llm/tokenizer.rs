//! Token counting.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{Error, Result};

/// Encoding used when none is configured.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Counts tokens in text. Only the encoding length is ever used.
pub trait Tokenizer: Send + Sync {
    /// Encoding name, e.g. `cl100k_base`.
    fn name(&self) -> &str;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize;
}

/// BPE tokenizer backed by `tiktoken-rs`.
pub struct TiktokenTokenizer {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load a named encoding.
    pub fn new(name: &str) -> Result<Self> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(Error::Config(format!(
                    "unknown tokenizer encoding '{}'",
                    other
                )))
            }
        }
        .map_err(|e| Error::Tokenizer(format!("failed to load {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }
}

impl fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

/// Offline estimate of roughly four characters per token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenizer;

impl ApproxTokenizer {
    pub const NAME: &'static str = "approx";
    const CHARS_PER_TOKEN: usize = 4;
}

impl Tokenizer for ApproxTokenizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(Self::CHARS_PER_TOKEN)
    }
}

/// Resolve a tokenizer by encoding name.
pub fn tokenizer_for(name: &str) -> Result<Arc<dyn Tokenizer>> {
    if name == ApproxTokenizer::NAME {
        return Ok(Arc::new(ApproxTokenizer));
    }
    Ok(Arc::new(TiktokenTokenizer::new(name)?))
}
