//! Variable inspection.
//!
//! [`describe`] turns one namespace binding into a [`VariableDescriptor`]: a
//! short, bounded, plain-text account of the value that can be pasted into a
//! prompt. The amount of detail depends on what the value can do, probed in
//! a fixed order:
//!
//! 1. **Tabular**: shape, column types, first rows
//! 2. **Callable**: documentation and source text
//! 3. **Composite**: public attribute names (never their values)
//! 4. **Sized container**: length and a truncated sample
//! 5. **Scalar**: truncated string form and documentation
//!
//! Inspection never fails. A detail that cannot be rendered is left out.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::namespace::{Value, INTERNAL_PREFIX};

/// Rows shown in a table sample.
pub const SAMPLE_ROWS: usize = 5;
/// Character cap on string samples.
pub const SAMPLE_CHARS: usize = 100;
/// Character cap on documentation excerpts.
pub const DOC_CHARS: usize = 500;
/// Appended to anything cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Capability class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Tabular,
    Callable,
    Composite,
    SizedContainer,
    Scalar,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tabular => write!(f, "tabular"),
            Self::Callable => write!(f, "callable"),
            Self::Composite => write!(f, "composite"),
            Self::SizedContainer => write!(f, "sized_container"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

/// Classify a value. The first matching capability wins.
pub fn probe(value: &Value) -> ValueKind {
    if value.as_table().is_some() {
        ValueKind::Tabular
    } else if value.as_function().is_some() {
        ValueKind::Callable
    } else if value.attribute_names().is_some() {
        ValueKind::Composite
    } else if value.len().is_some() {
        ValueKind::SizedContainer
    } else {
        ValueKind::Scalar
    }
}

/// Textual summary of one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub name: String,
    pub type_label: String,
    pub kind: ValueKind,
    pub detail_lines: Vec<String>,
}

impl fmt::Display for VariableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable: {}\nType: {}", self.name, self.type_label)?;
        for line in &self.detail_lines {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Describe the binding `name = value`.
pub fn describe(name: &str, value: &Value) -> VariableDescriptor {
    let kind = probe(value);
    let detail_lines = match kind {
        ValueKind::Tabular => tabular_lines(value),
        ValueKind::Callable => callable_lines(value),
        ValueKind::Composite => composite_lines(value),
        ValueKind::SizedContainer => container_lines(name, value),
        ValueKind::Scalar => scalar_lines(name, value),
    };

    VariableDescriptor {
        name: name.to_string(),
        type_label: value.type_label(),
        kind,
        detail_lines,
    }
}

fn tabular_lines(value: &Value) -> Vec<String> {
    let Some(df) = value.as_table() else {
        return Vec::new();
    };
    let (rows, cols) = df.shape();

    let mut lines = vec![format!("Shape: ({}, {})", rows, cols), "Columns:".to_string()];
    lines.extend(
        df.columns()
            .iter()
            .map(|c| format!("- {} ({})", c.name, c.dtype())),
    );
    lines.push(format!("Sample (first {} rows):", SAMPLE_ROWS));
    lines.push(df.head(SAMPLE_ROWS).to_string());
    lines
}

fn callable_lines(value: &Value) -> Vec<String> {
    let Some(func) = value.as_function() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    if let Some(doc) = func.doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        lines.push(format!("Documentation: {}", doc));
    }
    match &func.source {
        Some(source) => {
            lines.push("Source code:".to_string());
            lines.push(source.clone());
        }
        None => lines.push("Source code: <unavailable>".to_string()),
    }
    lines
}

fn composite_lines(value: &Value) -> Vec<String> {
    let mut lines = vec!["Attributes:".to_string()];
    if let Some(names) = value.attribute_names() {
        lines.extend(
            names
                .into_iter()
                .filter(|n| !n.starts_with(INTERNAL_PREFIX))
                .map(|n| format!("- {}", n)),
        );
    }
    lines
}

fn container_lines(name: &str, value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(len) = value.len() {
        lines.push(format!("Length: {}", len));
    }
    match value.render() {
        Ok(text) => lines.push(format!("Sample: {}", truncate(&text, SAMPLE_CHARS))),
        Err(e) => debug!(variable = name, error = %e, "Omitting container sample"),
    }
    lines
}

fn scalar_lines(name: &str, value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    match value.render() {
        Ok(text) => lines.push(format!(
            "String representation: {}",
            truncate(&text, SAMPLE_CHARS)
        )),
        Err(e) => debug!(variable = name, error = %e, "Omitting string representation"),
    }
    if let Some(doc) = value.doc().map(str::trim).filter(|d| !d.is_empty()) {
        lines.push("Documentation:".to_string());
        lines.push(truncate(doc, DOC_CHARS));
    }
    lines
}
