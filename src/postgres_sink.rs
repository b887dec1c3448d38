use anyhow::{Context, Result, anyhow};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::sink::{Destination, TableSink, create_table_sql, insert_sql, quote_ident};
use crate::table::{Cell, Column, ColumnKind};

/// One Postgres connection, opened per loader task and closed on drop.
pub struct PostgresSink {
    client: Client,
}

impl PostgresSink {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = postgres::Config::new()
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.database)
            .connect(NoTls)
            .with_context(|| {
                format!(
                    "connect to postgres {}:{}/{}",
                    config.host, config.port, config.database
                )
            })?;
        info!(host = %config.host, database = %config.database, "postgres connected");
        Ok(Self { client })
    }
}

// `CREATE SCHEMA IF NOT EXISTS` can still lose a race against another session
// creating the same schema; the loser sees one of these codes.
fn schema_already_exists(code: Option<&SqlState>) -> bool {
    matches!(code, Some(c) if *c == SqlState::DUPLICATE_SCHEMA || *c == SqlState::UNIQUE_VIOLATION)
}

fn postgres_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "BIGINT",
        ColumnKind::Float => "DOUBLE PRECISION",
        ColumnKind::Text => "TEXT",
        ColumnKind::Date => "DATE",
        ColumnKind::Boolean => "BOOLEAN",
    }
}

// Nulls need a concrete Rust type so the driver can match the column type.
fn bind(column: &Column, cell: &Cell) -> Result<Box<dyn ToSql + Sync>> {
    let bound: Box<dyn ToSql + Sync> = match (column.kind, cell) {
        (ColumnKind::Integer, Cell::Int(v)) => Box::new(Some(*v)),
        (ColumnKind::Integer, Cell::Null) => Box::new(None::<i64>),
        (ColumnKind::Float, Cell::Float(v)) => Box::new(Some(*v)),
        (ColumnKind::Float, Cell::Null) => Box::new(None::<f64>),
        (ColumnKind::Text, Cell::Text(v)) => Box::new(Some(v.clone())),
        (ColumnKind::Text, Cell::Null) => Box::new(None::<String>),
        (ColumnKind::Date, Cell::Date(v)) => Box::new(Some(*v)),
        (ColumnKind::Date, Cell::Null) => Box::new(None::<chrono::NaiveDate>),
        (ColumnKind::Boolean, Cell::Bool(v)) => Box::new(Some(*v)),
        (ColumnKind::Boolean, Cell::Null) => Box::new(None::<bool>),
        (kind, cell) => {
            return Err(anyhow!(
                "column {}: cannot bind {cell:?} as {kind:?}",
                column.name
            ));
        }
    };
    Ok(bound)
}

impl TableSink for PostgresSink {
    fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
        match self.client.batch_execute(&sql) {
            Ok(()) => Ok(()),
            Err(err) if schema_already_exists(err.code()) => {
                debug!(schema, "schema created by another session");
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("create schema {schema}")),
        }
    }

    fn ensure_table(&mut self, dest: &Destination, columns: &[Column]) -> Result<()> {
        self.ensure_schema(&dest.schema)?;
        self.client
            .batch_execute(&create_table_sql(dest, columns, postgres_type))
            .with_context(|| format!("create table {dest}"))
    }

    fn append_batch(
        &mut self,
        dest: &Destination,
        columns: &[Column],
        rows: &[Vec<Cell>],
    ) -> Result<()> {
        let sql = insert_sql(dest, columns, |i| format!("${i}"));
        let mut tx = self
            .client
            .transaction()
            .context("begin load transaction")?;
        let stmt = tx
            .prepare(&sql)
            .with_context(|| format!("prepare insert into {dest}"))?;
        for row in rows {
            let bound = columns
                .iter()
                .zip(row)
                .map(|(column, cell)| bind(column, cell))
                .collect::<Result<Vec<_>>>()?;
            let params = bound
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect::<Vec<_>>();
            tx.execute(&stmt, &params)
                .with_context(|| format!("insert into {dest}"))?;
        }
        tx.commit().context("commit load transaction")?;
        Ok(())
    }
}
