use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::config::DatabaseConfig;
use crate::postgres_sink::PostgresSink;
use crate::sqlite_sink::SqliteSink;
use crate::table::{Cell, Column, ColumnKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub schema: String,
    pub table: String,
}

impl Destination {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Append-only writer for one database connection.
pub trait TableSink {
    /// Creates the schema when missing. Safe to race with other connections.
    fn ensure_schema(&mut self, schema: &str) -> Result<()>;

    /// Creates the schema and table when missing; never alters an existing one.
    fn ensure_table(&mut self, dest: &Destination, columns: &[Column]) -> Result<()>;

    /// Appends `rows` as one atomic batch.
    fn append_batch(&mut self, dest: &Destination, columns: &[Column], rows: &[Vec<Cell>])
    -> Result<()>;
}

/// Opens a fresh sink per loader task.
pub trait SinkFactory: Sync {
    fn open(&self) -> Result<Box<dyn TableSink>>;
}

#[derive(Debug, Clone)]
pub enum Backend {
    Postgres(DatabaseConfig),
    Sqlite(PathBuf),
}

impl SinkFactory for Backend {
    fn open(&self) -> Result<Box<dyn TableSink>> {
        let sink: Box<dyn TableSink> = match self {
            Backend::Postgres(config) => Box::new(PostgresSink::connect(config)?),
            Backend::Sqlite(path) => Box::new(SqliteSink::open(path)?),
        };
        Ok(sink)
    }
}

/// Keeps every batch in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub schemas: Vec<String>,
    pub tables: Vec<(Destination, Vec<Column>)>,
    pub batches: Vec<(Destination, Vec<Vec<Cell>>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_for(&self, dest: &Destination) -> Vec<Vec<Cell>> {
        self.batches
            .iter()
            .filter(|(d, _)| d == dest)
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }
}

impl TableSink for MemorySink {
    fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        if !self.schemas.iter().any(|s| s == schema) {
            self.schemas.push(schema.to_string());
        }
        Ok(())
    }

    fn ensure_table(&mut self, dest: &Destination, columns: &[Column]) -> Result<()> {
        self.ensure_schema(&dest.schema)?;
        if !self.tables.iter().any(|(d, _)| d == dest) {
            self.tables.push((dest.clone(), columns.to_vec()));
        }
        Ok(())
    }

    fn append_batch(
        &mut self,
        dest: &Destination,
        _columns: &[Column],
        rows: &[Vec<Cell>],
    ) -> Result<()> {
        self.batches.push((dest.clone(), rows.to_vec()));
        Ok(())
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn create_table_sql(
    dest: &Destination,
    columns: &[Column],
    type_name: fn(ColumnKind) -> &'static str,
) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), type_name(c.kind)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({cols})", dest.qualified())
}

pub(crate) fn insert_sql(
    dest: &Destination,
    columns: &[Column],
    placeholder: fn(usize) -> String,
) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=columns.len())
        .map(placeholder)
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({names}) VALUES ({params})", dest.qualified())
}
