//! Task graph of the daily job.
//!
//! Each stage is a named task. Tasks hand datasets to each other through an
//! [`Exchange`] under `(producing task id, key)`. An external scheduler can run
//! tasks one process at a time with `task <id>`; [`Pipeline::run_all`] runs the
//! whole graph in-process with the same retry policy the scheduler applies.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use crate::exchange::{self, Exchange};
use crate::game_extract::extract_game_logs;
use crate::loader::{LoadRequest, LoadSummary, load_dataset};
use crate::model::TeamGameLogRow;
use crate::pacing::Pacer;
use crate::player_extract::extract_players;
use crate::provider::StatsProvider;
use crate::sink::{Destination, SinkFactory};
use crate::table::Table;
use crate::transform::transform_game_logs;

pub const RAW_GAME_LOGS: &str = "raw_game_logs";
pub const GAMES: &str = "games";
pub const GAMES_RESULTS: &str = "games_results";
pub const PLAYER_RESULTS: &str = "player_results";
pub const ACTIVE_PLAYERS: &str = "active_players";

/// Daily at 08:00 in the pipeline timezone. Missed runs are not caught up.
pub const SCHEDULE_CRON: &str = "0 8 * * *";
pub const CATCHUP: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    ExtractGames,
    TransformGames,
    ExtractPlayers,
    LoadGames,
    LoadGamesResults,
    LoadActivePlayers,
    LoadPlayerResults,
}

impl TaskId {
    pub const ALL: [TaskId; 7] = [
        TaskId::ExtractGames,
        TaskId::TransformGames,
        TaskId::ExtractPlayers,
        TaskId::LoadGames,
        TaskId::LoadGamesResults,
        TaskId::LoadActivePlayers,
        TaskId::LoadPlayerResults,
    ];

    pub const LOADS: [TaskId; 4] = [
        TaskId::LoadGames,
        TaskId::LoadGamesResults,
        TaskId::LoadActivePlayers,
        TaskId::LoadPlayerResults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::ExtractGames => "extract_games",
            TaskId::TransformGames => "transform_games",
            TaskId::ExtractPlayers => "extract_players",
            TaskId::LoadGames => "load_games",
            TaskId::LoadGamesResults => "load_games_results",
            TaskId::LoadActivePlayers => "load_active_players",
            TaskId::LoadPlayerResults => "load_player_results",
        }
    }

    pub fn upstream(self) -> &'static [TaskId] {
        match self {
            TaskId::ExtractGames => &[],
            TaskId::TransformGames => &[TaskId::ExtractGames],
            TaskId::ExtractPlayers => &[TaskId::TransformGames],
            TaskId::LoadGames
            | TaskId::LoadGamesResults
            | TaskId::LoadActivePlayers
            | TaskId::LoadPlayerResults => &[TaskId::ExtractPlayers],
        }
    }

    /// Source task, exchange key and destination table of a load task.
    pub fn load_source(self) -> Option<(TaskId, &'static str, &'static str)> {
        match self {
            TaskId::LoadGames => Some((TaskId::TransformGames, GAMES, "GAMES")),
            TaskId::LoadGamesResults => {
                Some((TaskId::TransformGames, GAMES_RESULTS, "GAMES_RESULTS"))
            }
            TaskId::LoadActivePlayers => Some((TaskId::ExtractPlayers, ACTIVE_PLAYERS, "PLAYERS")),
            TaskId::LoadPlayerResults => {
                Some((TaskId::ExtractPlayers, PLAYER_RESULTS, "PLAYER_RESULTS"))
            }
            _ => None,
        }
    }

    pub fn is_load(self) -> bool {
        self.load_source().is_some()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TaskId::ALL
            .into_iter()
            .find(|task| task.as_str() == s.trim())
            .ok_or_else(|| {
                let known = TaskId::ALL.map(TaskId::as_str).join(", ");
                format!("unknown task {s:?} (expected one of: {known})")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(5 * 60),
        }
    }
}

/// Runs `f`, retrying up to `policy.retries` more times after `policy.delay`.
pub fn run_with_retry<T>(
    task: TaskId,
    policy: RetryPolicy,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt <= policy.retries => {
                warn!(
                    %task,
                    attempt,
                    delay_secs = policy.delay.as_secs(),
                    "task failed, retrying: {err:#}"
                );
                thread::sleep(policy.delay);
            }
            Err(err) => {
                error!(%task, attempt, "task failed: {err:#}");
                return Err(err);
            }
        }
    }
}

/// Upstream service plus the pacing applied to it.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub provider: &'a dyn StatsProvider,
    pub team_pacer: &'a dyn Pacer,
    pub player_pacer: &'a dyn Pacer,
}

#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub sinks: &'a dyn SinkFactory,
    pub schema: &'a str,
    pub max_rows: usize,
}

pub struct Pipeline<'a> {
    pub exchange: &'a dyn Exchange,
    pub target: NaiveDate,
    pub season: String,
    pub sources: Option<Sources<'a>>,
    pub load: Option<LoadContext<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Success,
    Failed(String),
    UpstreamFailed,
}

#[derive(Debug, Clone, Default)]
pub struct DagReport {
    pub outcomes: Vec<(TaskId, TaskState)>,
}

impl DagReport {
    pub fn state(&self, task: TaskId) -> Option<&TaskState> {
        self.outcomes
            .iter()
            .find(|(t, _)| *t == task)
            .map(|(_, state)| state)
    }

    pub fn failed_tasks(&self) -> Vec<TaskId> {
        self.outcomes
            .iter()
            .filter(|(_, state)| *state != TaskState::Success)
            .map(|(task, _)| *task)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_tasks().is_empty()
    }
}

impl Pipeline<'_> {
    fn sources(&self) -> Result<Sources<'_>> {
        self.sources
            .ok_or_else(|| anyhow!("no statistics provider configured"))
    }

    pub fn run_task(&self, task: TaskId) -> Result<()> {
        let _span = info_span!("task", task = %task).entered();
        match task {
            TaskId::ExtractGames => {
                let src = self.sources()?;
                let rows = extract_game_logs(src.provider, src.team_pacer, &self.season)?;
                exchange::push(self.exchange, task.as_str(), RAW_GAME_LOGS, &rows)
            }
            TaskId::TransformGames => {
                let rows: Vec<TeamGameLogRow> =
                    exchange::pull(self.exchange, TaskId::ExtractGames.as_str(), RAW_GAME_LOGS)?;
                let out = transform_game_logs(&rows, self.target)?;
                exchange::push(
                    self.exchange,
                    task.as_str(),
                    GAMES,
                    &Table::from_records(&out.games),
                )?;
                exchange::push(
                    self.exchange,
                    task.as_str(),
                    GAMES_RESULTS,
                    &Table::from_records(&out.results),
                )
            }
            TaskId::ExtractPlayers => {
                let src = self.sources()?;
                let out =
                    extract_players(src.provider, src.player_pacer, &self.season, self.target)?;
                if !out.failures.is_empty() {
                    warn!(
                        skipped = out.failures.len(),
                        attempted = out.attempted,
                        "players skipped after fetch errors"
                    );
                }
                exchange::push(
                    self.exchange,
                    task.as_str(),
                    PLAYER_RESULTS,
                    &Table::from_records(&out.results),
                )?;
                exchange::push(
                    self.exchange,
                    task.as_str(),
                    ACTIVE_PLAYERS,
                    &Table::from_records(&out.roster),
                )
            }
            _ => run_load(self.exchange, self.load, task).map(|_| ()),
        }
    }

    /// Runs every task in dependency order; the four loads run in parallel.
    /// A failed task marks everything downstream as `UpstreamFailed`.
    pub fn run_all(&self, policy: RetryPolicy) -> DagReport {
        let mut report = DagReport::default();

        for task in [
            TaskId::ExtractGames,
            TaskId::TransformGames,
            TaskId::ExtractPlayers,
        ] {
            let state = if report.all_succeeded() {
                match run_with_retry(task, policy, || self.run_task(task)) {
                    Ok(()) => TaskState::Success,
                    Err(err) => TaskState::Failed(format!("{err:#}")),
                }
            } else {
                TaskState::UpstreamFailed
            };
            report.outcomes.push((task, state));
        }

        if !report.all_succeeded() {
            for task in TaskId::LOADS {
                report.outcomes.push((task, TaskState::UpstreamFailed));
            }
            return report;
        }

        let exchange = self.exchange;
        let load = self.load;
        // Loaders only race on the shared schema, so create it once up front.
        if let Some(ctx) = load {
            if let Err(err) = prepare_schema(ctx) {
                warn!(schema = ctx.schema, "schema setup before loads failed: {err:#}");
            }
        }
        let loads = TaskId::LOADS
            .par_iter()
            .map(|&task| {
                let result = run_with_retry(task, policy, || run_load(exchange, load, task));
                let state = match result {
                    Ok(_) => TaskState::Success,
                    Err(err) => TaskState::Failed(format!("{err:#}")),
                };
                (task, state)
            })
            .collect::<Vec<_>>();
        report.outcomes.extend(loads);
        report
    }
}

fn prepare_schema(ctx: LoadContext<'_>) -> Result<()> {
    let mut sink = ctx.sinks.open()?;
    sink.ensure_schema(ctx.schema)
}

fn run_load(
    exchange: &dyn Exchange,
    load: Option<LoadContext<'_>>,
    task: TaskId,
) -> Result<LoadSummary> {
    let _span = info_span!("task", task = %task).entered();
    let (source, key, table) = task
        .load_source()
        .ok_or_else(|| anyhow!("{task} is not a load task"))?;
    let ctx = load.ok_or_else(|| anyhow!("no database backend configured"))?;
    let request = LoadRequest {
        source_task: source.as_str().to_string(),
        key: key.to_string(),
        dest: Destination::new(ctx.schema, table),
        max_rows: ctx.max_rows,
    };
    let mut sink = ctx.sinks.open()?;
    let summary = load_dataset(exchange, &request, sink.as_mut())?;
    info!(rows = summary.rows, batches = summary.batches, "load finished");
    Ok(summary)
}

/// Human-readable summary of the graph, schedule and retry policy.
pub fn describe(policy: RetryPolicy, timezone: Tz) -> String {
    let mut out = format!(
        "schedule: {SCHEDULE_CRON} ({timezone}), catchup: {CATCHUP}\n\
         retries: {} after {}s\n",
        policy.retries,
        policy.delay.as_secs()
    );
    for task in TaskId::ALL {
        let upstream = task
            .upstream()
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("{task:<22} <- [{upstream}]"));
        if let Some((source, key, table)) = task.load_source() {
            out.push_str(&format!("  {source}/{key} -> {table}"));
        }
        out.push('\n');
    }
    out
}
