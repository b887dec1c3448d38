use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Date,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// One typed value in a table row. `Null` is valid in any column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

impl Cell {
    pub fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Cell::Null, _)
                | (Cell::Int(_), ColumnKind::Integer)
                | (Cell::Float(_), ColumnKind::Float)
                | (Cell::Text(_), ColumnKind::Text)
                | (Cell::Date(_), ColumnKind::Date)
                | (Cell::Bool(_), ColumnKind::Boolean)
        )
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<Option<i64>> for Cell {
    fn from(v: Option<i64>) -> Self {
        v.map(Cell::Int).unwrap_or(Cell::Null)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(x) if x.is_finite() => Cell::Float(x),
            _ => Cell::Null,
        }
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<Option<&str>> for Cell {
    fn from(v: Option<&str>) -> Self {
        v.map(Cell::from).unwrap_or(Cell::Null)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

/// A typed row that knows its own column layout.
pub trait Record {
    fn columns() -> Vec<Column>;
    fn cells(&self) -> Vec<Cell>;
}

/// Dataset handed between tasks and appended by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn from_records<R: Record>(records: &[R]) -> Self {
        Self {
            columns: R::columns(),
            rows: records.iter().map(Record::cells).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Checks row width and cell kinds against the column list.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(anyhow!("table has no columns"));
        }
        for (idx, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(anyhow!(
                    "row {idx} has {} cells, expected {}",
                    row.len(),
                    self.columns.len()
                ));
            }
            for (cell, column) in row.iter().zip(&self.columns) {
                if !cell.fits(column.kind) {
                    return Err(anyhow!(
                        "row {idx} column {}: {cell:?} is not {:?}",
                        column.name,
                        column.kind
                    ));
                }
            }
        }
        Ok(())
    }
}
