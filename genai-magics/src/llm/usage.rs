//! Per-session token and latency accounting.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::context::Message;

use super::tokenizer::Tokenizer;

/// Running totals for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of recorded request/response pairs
    pub request_count: u64,
    /// Tokens sent to the model
    pub input_tokens: u64,
    /// Tokens received from the model
    pub output_tokens: u64,
    /// Wall-clock time spent waiting on the model
    pub total_elapsed_secs: f64,
}

impl UsageStats {
    pub fn average_input_tokens(&self) -> Option<f64> {
        self.per_request(self.input_tokens as f64)
    }

    pub fn average_output_tokens(&self) -> Option<f64> {
        self.per_request(self.output_tokens as f64)
    }

    pub fn average_elapsed_secs(&self) -> Option<f64> {
        self.per_request(self.total_elapsed_secs)
    }

    fn per_request(&self, total: f64) -> Option<f64> {
        (self.request_count > 0).then(|| total / self.request_count as f64)
    }
}

/// Measures request/response pairs with a fixed tokenizer.
pub struct UsageAccountant {
    stats: UsageStats,
    tokenizer: Arc<dyn Tokenizer>,
}

impl UsageAccountant {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            stats: UsageStats::default(),
            tokenizer,
        }
    }

    /// Total tokens across message contents.
    pub fn count_tokens(&self, messages: &[Message]) -> u64 {
        messages
            .iter()
            .map(|m| self.tokenizer.count(&m.content) as u64)
            .sum()
    }

    /// Record one completed exchange.
    pub fn record_turn(&mut self, elapsed_secs: f64, request: &[Message], response: &str) {
        let input = self.count_tokens(request);
        let output = self.count_tokens(&[Message::assistant(response)]);

        self.stats.request_count += 1;
        self.stats.total_elapsed_secs += elapsed_secs.max(0.0);
        self.stats.input_tokens += input;
        self.stats.output_tokens += output;
    }

    pub fn reset(&mut self) {
        self.stats = UsageStats::default();
    }

    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    pub fn tokenizer_name(&self) -> &str {
        self.tokenizer.name()
    }

    /// Human-readable summary of the totals and averages.
    pub fn report(&self) -> String {
        let s = &self.stats;
        let mut out = format!("Usage statistics (tokenizer: {}):", self.tokenizer_name());
        let _ = write!(out, "\n* Requests: {}", s.request_count);
        let _ = write!(out, "\n* Input tokens: {}", s.input_tokens);
        let _ = write!(out, "\n* Output tokens: {}", s.output_tokens);
        let _ = write!(out, "\n* Total elapsed: {:.2} s", s.total_elapsed_secs);

        match (
            s.average_input_tokens(),
            s.average_output_tokens(),
            s.average_elapsed_secs(),
        ) {
            (Some(input), Some(output), Some(elapsed)) => {
                let _ = write!(out, "\n* Avg input tokens/request: {:.1}", input);
                let _ = write!(out, "\n* Avg output tokens/request: {:.1}", output);
                let _ = write!(out, "\n* Avg elapsed/request: {:.2} s", elapsed);
            }
            _ => out.push_str("\n* No requests recorded yet."),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tokenizer::ApproxTokenizer;
    use pretty_assertions::assert_eq;

    fn accountant() -> UsageAccountant {
        UsageAccountant::new(Arc::new(ApproxTokenizer))
    }

    #[test]
    fn test_count_tokens_sums_messages() {
        let acc = accountant();
        let msgs = vec![
            Message::system("abcdefgh"),
            Message::user("abcd"),
            Message::assistant(""),
        ];
        assert_eq!(acc.count_tokens(&msgs), 3);
        assert_eq!(acc.count_tokens(&[]), 0);
    }

    #[test]
    fn test_record_turn_twice() {
        let mut acc = accountant();
        let msgs = vec![Message::system("be brief"), Message::user("what is df?")];
        let per_request = acc.count_tokens(&msgs);

        acc.record_turn(2.0, &msgs, "answer");
        acc.record_turn(2.0, &msgs, "answer");

        let stats = acc.stats();
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.total_elapsed_secs, 4.0);
        assert_eq!(stats.input_tokens, 2 * per_request);
        assert_eq!(stats.output_tokens, 4);
        assert_eq!(stats.average_elapsed_secs(), Some(2.0));
    }

    #[test]
    fn test_averages_undefined_without_requests() {
        let stats = UsageStats::default();
        assert_eq!(stats.average_input_tokens(), None);
        assert_eq!(stats.average_output_tokens(), None);
        assert_eq!(stats.average_elapsed_secs(), None);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut acc = accountant();
        acc.record_turn(1.5, &[Message::user("hi")], "hello");
        acc.reset();
        assert_eq!(acc.stats(), &UsageStats::default());
    }

    #[test]
    fn test_report() {
        let mut acc = accountant();
        assert!(acc.report().ends_with("No requests recorded yet."));

        acc.record_turn(1.0, &[Message::user("12345678")], "1234");
        let expected = "Usage statistics (tokenizer: approx):\n\
                        * Requests: 1\n\
                        * Input tokens: 2\n\
                        * Output tokens: 1\n\
                        * Total elapsed: 1.00 s\n\
                        * Avg input tokens/request: 2.0\n\
                        * Avg output tokens/request: 1.0\n\
                        * Avg elapsed/request: 1.00 s";
        assert_eq!(acc.report(), expected);
    }
}
