use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::exchange::{self, Exchange};
use crate::sink::{Destination, TableSink};
use crate::table::Table;

pub const DEFAULT_MAX_ROWS: usize = 16384;
pub const DEFAULT_SCHEMA: &str = "NBA";

/// Where a dataset comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub source_task: String,
    pub key: String,
    pub dest: Destination,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: usize,
    pub batches: usize,
}

pub fn batch_count(rows: usize, max_rows: usize) -> usize {
    if max_rows == 0 {
        return 0;
    }
    rows.div_ceil(max_rows)
}

/// Appends `table` to `dest` in consecutive chunks of at most `max_rows`.
///
/// Rows keep their order. Nothing already in the table is touched, so loading
/// the same dataset twice stores it twice.
pub fn load_table(
    table: &Table,
    dest: &Destination,
    max_rows: usize,
    sink: &mut dyn TableSink,
) -> Result<LoadSummary> {
    if max_rows == 0 {
        return Err(anyhow!("max_rows must be at least 1"));
    }
    table
        .validate()
        .with_context(|| format!("dataset for {dest} is malformed"))?;
    sink.ensure_table(dest, &table.columns)?;

    let mut batches = 0;
    for chunk in table.rows.chunks(max_rows) {
        sink.append_batch(dest, &table.columns, chunk)
            .with_context(|| format!("append batch {} to {dest}", batches + 1))?;
        batches += 1;
        debug!(%dest, batch = batches, rows = chunk.len(), "batch appended");
    }

    info!(%dest, rows = table.len(), batches, "dataset loaded");
    Ok(LoadSummary {
        rows: table.len(),
        batches,
    })
}

/// Pulls the referenced dataset from the exchange and appends it.
pub fn load_dataset(
    exchange: &dyn Exchange,
    request: &LoadRequest,
    sink: &mut dyn TableSink,
) -> Result<LoadSummary> {
    let table: Table = exchange::pull(exchange, &request.source_task, &request.key)?;
    load_table(&table, &request.dest, request.max_rows, sink)
}
