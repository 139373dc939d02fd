//! Host values as seen by the assistant.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::table::{format_float, DataFrame};

/// A value's string form could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot render value of type {type_name}")]
pub struct FormatError {
    pub type_name: String,
}

/// A user-defined function living in the host session.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub doc: Option<String>,
    /// `None` for builtins and functions defined where source is not kept.
    pub source: Option<String>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            source: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// An instance of a user-defined class.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub class_name: String,
    /// Attribute table, sorted by name.
    pub attributes: BTreeMap<String, Value>,
    pub doc: Option<String>,
}

impl Object {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            attributes: BTreeMap::new(),
            doc: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A value bound in the host namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered mapping.
    Dict(Vec<(String, Value)>),
    Table(DataFrame),
    Function(Function),
    Object(Object),
    /// An imported module, by name.
    Module(String),
    /// A foreign value the host could only partially describe.
    Opaque {
        type_name: String,
        repr: Option<String>,
        doc: Option<String>,
    },
}

impl Value {
    /// Runtime type name as the host would report it.
    pub fn type_label(&self) -> String {
        match self {
            Self::None => "NoneType".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Dict(_) => "dict".to_string(),
            Self::Table(_) => "DataFrame".to_string(),
            Self::Function(_) => "function".to_string(),
            Self::Object(o) => o.class_name.clone(),
            Self::Module(_) => "module".to_string(),
            Self::Opaque { type_name, .. } => type_name.clone(),
        }
    }

    pub fn as_table(&self) -> Option<&DataFrame> {
        match self {
            Self::Table(df) => Some(df),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn is_module(&self) -> bool {
        matches!(self, Self::Module(_))
    }

    /// Attribute names, for values that carry an attribute table.
    pub fn attribute_names(&self) -> Option<Vec<&str>> {
        match self {
            Self::Object(o) => Some(o.attributes.keys().map(String::as_str).collect()),
            _ => None,
        }
    }

    /// Length, for sized containers.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::List(items) => Some(items.len()),
            Self::Dict(entries) => Some(entries.len()),
            Self::Table(df) => Some(df.shape().0),
            _ => None,
        }
    }

    /// Documentation string, when the value carries one.
    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Function(func) => func.doc.as_deref(),
            Self::Object(o) => o.doc.as_deref(),
            Self::Opaque { doc, .. } => doc.as_deref(),
            _ => None,
        }
    }

    /// Human-readable string form (`str()` in the host).
    pub fn render(&self) -> Result<String, FormatError> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            _ => self.repr(),
        }
    }

    /// Quoted form used for elements nested inside containers.
    fn repr(&self) -> Result<String, FormatError> {
        Ok(match self {
            Self::None => "None".to_string(),
            Self::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(x) => format_float(*x),
            Self::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            Self::List(items) => {
                let parts = items
                    .iter()
                    .map(Value::repr)
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", parts.join(", "))
            }
            Self::Dict(entries) => {
                let parts = entries
                    .iter()
                    .map(|(k, v)| Ok(format!("'{}': {}", k, v.repr()?)))
                    .collect::<Result<Vec<_>, FormatError>>()?;
                format!("{{{}}}", parts.join(", "))
            }
            Self::Table(df) => df.to_string(),
            Self::Function(func) => format!("<function {}>", func.name),
            Self::Object(o) => format!("<{} object>", o.class_name),
            Self::Module(name) => format!("<module '{}'>", name),
            Self::Opaque {
                type_name, repr, ..
            } => repr.clone().ok_or_else(|| FormatError {
                type_name: type_name.clone(),
            })?,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "<unrepresentable {}>", self.type_label()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<DataFrame> for Value {
    fn from(value: DataFrame) -> Self {
        Self::Table(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::None.render().unwrap(), "None");
        assert_eq!(Value::Bool(true).render().unwrap(), "True");
        assert_eq!(Value::Float(2.0).render().unwrap(), "2.0");
        assert_eq!(Value::from("plain").render().unwrap(), "plain");
    }

    #[test]
    fn test_render_containers_quote_strings() {
        let list = Value::List(vec![1i64.into(), "a".into(), Value::None]);
        assert_eq!(list.render().unwrap(), "[1, 'a', None]");

        let dict = Value::Dict(vec![("k".to_string(), 1.5.into())]);
        assert_eq!(dict.render().unwrap(), "{'k': 1.5}");
    }

    #[test]
    fn test_opaque_without_repr_fails_to_render() {
        let value = Value::Opaque {
            type_name: "Socket".to_string(),
            repr: None,
            doc: None,
        };
        assert_eq!(
            value.render(),
            Err(FormatError {
                type_name: "Socket".to_string()
            })
        );
        assert_eq!(value.to_string(), "<unrepresentable Socket>");

        let nested = Value::List(vec![value]);
        assert!(nested.render().is_err());
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(Value::from("héllo").len(), Some(5));
        assert_eq!(Value::Int(3).len(), None);
    }

    #[test]
    fn test_object_attributes_sorted() {
        let obj = Object::new("Point")
            .with_attribute("y", 2i64)
            .with_attribute("x", 1i64);
        let value = Value::from(obj);
        assert_eq!(value.attribute_names(), Some(vec!["x", "y"]));
        assert_eq!(value.type_label(), "Point");
    }
}
