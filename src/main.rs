use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use nba_incremental::config::PipelineConfig;
use nba_incremental::dag::{LoadContext, Pipeline, Sources, TaskId, TaskState, describe};
use nba_incremental::dates::target_date;
use nba_incremental::exchange::{DirExchange, Exchange, MemoryExchange};
use nba_incremental::logging::init_logging;
use nba_incremental::nba_stats::NbaStatsClient;
use nba_incremental::pacing::FixedDelay;
use nba_incremental::sink::Backend;

#[derive(Parser)]
#[command(name = "nba_incremental", about = "Daily NBA game and player stats load")]
struct Cli {
    /// Load into this SQLite file instead of Postgres.
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every task in-process.
    Run {
        /// Keep intermediate datasets in this directory.
        #[arg(long)]
        exchange_dir: Option<PathBuf>,
    },
    /// Run a single task, exchanging datasets through files.
    Task {
        task: TaskId,
        #[arg(long)]
        exchange_dir: PathBuf,
    },
    /// Print the task graph and schedule.
    Dag,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    match cli.command {
        Command::Dag => {
            print!("{}", describe(config.retry, config.timezone));
            Ok(())
        }
        Command::Run { exchange_dir } => {
            let exchange: Box<dyn Exchange> = match exchange_dir {
                Some(dir) => Box::new(DirExchange::new(dir)),
                None => Box::new(MemoryExchange::new()),
            };
            let target = target_date(Utc::now(), config.timezone);
            let season = config.season_for(target);
            let provider = NbaStatsClient::new(&config.provider, &season)?;
            let team_pacer = FixedDelay(config.team_delay);
            let player_pacer = FixedDelay(config.player_delay);
            let backend = backend(cli.sqlite, &config)?;

            let pipeline = Pipeline {
                exchange: exchange.as_ref(),
                target,
                season,
                sources: Some(Sources {
                    provider: &provider,
                    team_pacer: &team_pacer,
                    player_pacer: &player_pacer,
                }),
                load: Some(LoadContext {
                    sinks: &backend,
                    schema: &config.schema,
                    max_rows: config.max_rows,
                }),
            };
            info!(%target, season = %pipeline.season, "daily run started");

            let report = pipeline.run_all(config.retry);
            for (task, state) in &report.outcomes {
                match state {
                    TaskState::Success => info!(%task, "success"),
                    TaskState::Failed(reason) => error!(%task, "failed: {reason}"),
                    TaskState::UpstreamFailed => error!(%task, "upstream failed"),
                }
            }
            if report.all_succeeded() {
                Ok(())
            } else {
                let failed = report
                    .failed_tasks()
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(anyhow!("run did not complete; unfinished tasks: {failed}"))
            }
        }
        Command::Task { task, exchange_dir } => {
            let exchange = DirExchange::new(exchange_dir);
            let target = target_date(Utc::now(), config.timezone);
            let season = config.season_for(target);
            let needs_provider = matches!(task, TaskId::ExtractGames | TaskId::ExtractPlayers);

            let provider = if needs_provider {
                Some(NbaStatsClient::new(&config.provider, &season)?)
            } else {
                None
            };
            let backend = if task.is_load() {
                Some(backend(cli.sqlite, &config)?)
            } else {
                None
            };
            let team_pacer = FixedDelay(config.team_delay);
            let player_pacer = FixedDelay(config.player_delay);

            let pipeline = Pipeline {
                exchange: &exchange,
                target,
                season,
                sources: provider.as_ref().map(|provider| Sources {
                    provider,
                    team_pacer: &team_pacer,
                    player_pacer: &player_pacer,
                }),
                load: backend.as_ref().map(|sinks| LoadContext {
                    sinks,
                    schema: &config.schema,
                    max_rows: config.max_rows,
                }),
            };
            info!(%task, %target, "task started");
            pipeline.run_task(task)
        }
    }
}

fn backend(sqlite: Option<PathBuf>, config: &PipelineConfig) -> Result<Backend> {
    match sqlite {
        Some(path) => Ok(Backend::Sqlite(path)),
        None => Ok(Backend::Postgres(config.database()?)),
    }
}
