//! Context assembly: pick the variables a query names and describe them.
//!
//! Only variables whose names appear verbatim as whitespace-separated,
//! identifier-shaped tokens of the query are described. Nothing else in the
//! namespace reaches the prompt, even when it is the only thing in scope;
//! this keeps prompts bounded at the cost of asking users to name their
//! subjects.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::inspect::{describe, VariableDescriptor};
use crate::namespace::{is_hidden_name, Namespace, Value};

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{XID_Start}_]\p{XID_Continue}*$").unwrap())
}

/// Whether `token` is shaped like an identifier.
pub fn is_identifier(token: &str) -> bool {
    identifier_re().is_match(token)
}

/// Identifier-shaped tokens of `query`, first occurrence order, no repeats.
pub fn extract_candidates(query: &str) -> Vec<&str> {
    let mut seen = Vec::new();
    for token in query.split_whitespace() {
        if is_identifier(token) && !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

/// Bindings eligible for context: not hidden, not modules, not callables.
pub fn filter_variables(namespace: &Namespace) -> Vec<(&str, &Value)> {
    namespace
        .iter()
        .filter(|(name, value)| {
            !is_hidden_name(name) && !value.is_module() && !value.is_callable()
        })
        .collect()
}

/// Descriptors for every eligible variable the query names.
pub fn describe_mentioned(namespace: &Namespace, query: &str) -> Vec<VariableDescriptor> {
    let visible = filter_variables(namespace);
    extract_candidates(query)
        .into_iter()
        .filter_map(|candidate| visible.iter().find(|(name, _)| *name == candidate))
        .map(|(name, value)| describe(name, value))
        .collect()
}

/// Newline-joined descriptors for the variables `query` names.
///
/// Returns an empty string when nothing matches; that is not an error.
pub fn build_context(namespace: &Namespace, query: &str) -> String {
    let descriptors = describe_mentioned(namespace, query);
    debug!(
        matched = descriptors.len(),
        namespace_size = namespace.len(),
        "Assembled query context"
    );
    descriptors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `name: value` lines for the eligible variables, in namespace order.
pub fn list_variables(namespace: &Namespace) -> Vec<String> {
    filter_variables(namespace)
        .into_iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect()
}
