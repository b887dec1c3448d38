use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, TransactionBehavior, params, params_from_iter};

use crate::sink::{Destination, TableSink, create_table_sql, insert_sql, quote_ident};
use crate::table::{Cell, Column, ColumnKind};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite backend. Each schema lives in its own attached file next to the main
/// database (`NBA` -> `<dir>/NBA.sqlite`); in-memory sinks attach in-memory
/// databases instead.
pub struct SqliteSink {
    conn: Connection,
    attach_dir: Option<PathBuf>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create sqlite dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("set sqlite busy timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable sqlite wal")?;
        let attach_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            conn,
            attach_dir: Some(attach_dir),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Ok(Self {
            conn,
            attach_dir: None,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Row count of `dest`, mainly for checks after a load.
    pub fn count_rows(&self, dest: &Destination) -> Result<i64> {
        self.attach_schema(&dest.schema)?;
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", dest.qualified()),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("count rows in {dest}"))
    }

    fn attach_schema(&self, schema: &str) -> Result<()> {
        if schema.eq_ignore_ascii_case("main") {
            return Ok(());
        }
        let attached = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_database_list WHERE name = ?1",
                params![schema],
                |row| row.get::<_, i64>(0),
            )
            .context("list attached sqlite schemas")?;
        if attached > 0 {
            return Ok(());
        }

        let file = match &self.attach_dir {
            Some(dir) => dir.join(format!("{schema}.sqlite")).display().to_string(),
            None => ":memory:".to_string(),
        };
        self.conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {}", quote_ident(schema)),
                params![file],
            )
            .with_context(|| format!("attach sqlite schema {schema}"))?;
        if self.attach_dir.is_some() {
            self.conn
                .execute_batch(&format!("PRAGMA {}.journal_mode = WAL;", quote_ident(schema)))
                .context("enable sqlite wal on attached schema")?;
        }
        Ok(())
    }
}

fn sqlite_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Text | ColumnKind::Date => "TEXT",
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Owned(Value::Null),
            Cell::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Cell::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            Cell::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Cell::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
            Cell::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
        })
    }
}

impl TableSink for SqliteSink {
    fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        self.attach_schema(schema)
    }

    fn ensure_table(&mut self, dest: &Destination, columns: &[Column]) -> Result<()> {
        self.attach_schema(&dest.schema)?;
        self.conn
            .execute_batch(&create_table_sql(dest, columns, sqlite_type))
            .with_context(|| format!("create table {dest}"))?;
        Ok(())
    }

    fn append_batch(
        &mut self,
        dest: &Destination,
        columns: &[Column],
        rows: &[Vec<Cell>],
    ) -> Result<()> {
        let sql = insert_sql(dest, columns, |i| format!("?{i}"));
        // Parallel loaders share the file; take the write lock up front.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin load transaction")?;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("prepare insert into {dest}"))?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))
                    .with_context(|| format!("insert into {dest}"))?;
            }
        }
        tx.commit().context("commit load transaction")?;
        Ok(())
    }
}
