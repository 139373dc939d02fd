//! Column-oriented tables handed over by the host session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NaN"),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", format_float(*x)),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Floats always keep a fractional part so `4.0` does not read as an integer.
pub(crate) fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// Inferred element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Bool => write!(f, "bool"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Infer the element type from the non-null cells.
    ///
    /// Integers mixed with floats widen to `float64`; anything else mixed,
    /// and columns with no non-null cell, are `object`.
    pub fn dtype(&self) -> DType {
        let mut inferred: Option<DType> = None;
        for cell in &self.values {
            let cell_type = match cell {
                Cell::Null => continue,
                Cell::Bool(_) => DType::Bool,
                Cell::Int(_) => DType::Int64,
                Cell::Float(_) => DType::Float64,
                Cell::Str(_) => DType::Object,
            };
            inferred = Some(match (inferred, cell_type) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(DType::Int64), DType::Float64) | (Some(DType::Float64), DType::Int64) => {
                    DType::Float64
                }
                _ => return DType::Object,
            });
        }
        inferred.unwrap_or(DType::Object)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An in-memory table with ordered, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<Column>,
}

impl DataFrame {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns, rejecting ragged input.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::new();
        for column in columns {
            frame.push_column(column)?;
        }
        Ok(frame)
    }

    /// Append a column; its length must match the existing row count.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(Error::Variable(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    first.len()
                )));
            }
        }
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(Error::Variable(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Builder form of [`push_column`](Self::push_column).
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<Self> {
        self.push_column(Column::new(name, values))?;
        Ok(self)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        let rows = self.columns.first().map_or(0, Column::len);
        (rows, self.columns.len())
    }

    /// First `n` rows as a new table.
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect()))
                .collect(),
        }
    }
}

impl fmt::Display for DataFrame {
    /// Right-aligned text grid with a leading row index.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape();
        if cols == 0 {
            return write!(f, "Empty DataFrame");
        }

        let rendered: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| c.values.iter().map(ToString::to_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&rendered)
            .map(|(c, cells)| {
                cells
                    .iter()
                    .map(|s| s.chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let index_width = rows.saturating_sub(1).to_string().len();

        write!(f, "{:index_width$}", "")?;
        for (column, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", column.name)?;
        }
        for row in 0..rows {
            write!(f, "\n{:<index_width$}", row)?;
            for (cells, width) in rendered.iter().zip(&widths) {
                write!(f, "  {:>width$}", cells[row])?;
            }
        }
        Ok(())
    }
}
