use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use nba_incremental::dag::{
    ACTIVE_PLAYERS, GAMES, LoadContext, Pipeline, RetryPolicy, Sources, TaskId, TaskState,
};
use nba_incremental::exchange::{self, MemoryExchange};
use nba_incremental::fake_provider::{
    FakeProvider, player, player_log_row, team, team_log_row,
};
use nba_incremental::game_extract::{extract_game_logs, find_team_id};
use nba_incremental::pacing::{NoDelay, RecordingPacer};
use nba_incremental::player_extract::extract_players;
use nba_incremental::sink::{Destination, SinkFactory, TableSink};
use nba_incremental::table::{Cell, Column, Table};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

const NO_RETRY: RetryPolicy = RetryPolicy {
    retries: 0,
    delay: Duration::ZERO,
};

#[derive(Clone, Default)]
struct SharedSinks {
    events: Arc<Mutex<Vec<String>>>,
    created: Arc<Mutex<Vec<Destination>>>,
    batches: Arc<Mutex<Vec<(Destination, Vec<Vec<Cell>>)>>>,
}

impl SharedSinks {
    fn rows(&self, table: &str) -> Vec<Vec<Cell>> {
        self.batches
            .lock()
            .expect("lock")
            .iter()
            .filter(|(dest, _)| dest.table == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock").clone()
    }

    fn created(&self) -> Vec<String> {
        let mut names = self
            .created
            .lock()
            .expect("lock")
            .iter()
            .map(|dest| dest.to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

struct SharedSink(SharedSinks);

impl TableSink for SharedSink {
    fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        self.0
            .events
            .lock()
            .expect("lock")
            .push(format!("schema:{schema}"));
        Ok(())
    }

    fn ensure_table(&mut self, dest: &Destination, _columns: &[Column]) -> Result<()> {
        self.0
            .events
            .lock()
            .expect("lock")
            .push(format!("table:{dest}"));
        self.0.created.lock().expect("lock").push(dest.clone());
        Ok(())
    }

    fn append_batch(
        &mut self,
        dest: &Destination,
        _columns: &[Column],
        rows: &[Vec<Cell>],
    ) -> Result<()> {
        self.0
            .batches
            .lock()
            .expect("lock")
            .push((dest.clone(), rows.to_vec()));
        Ok(())
    }
}

impl SinkFactory for SharedSinks {
    fn open(&self) -> Result<Box<dyn TableSink>> {
        Ok(Box::new(SharedSink(self.clone())))
    }
}

fn two_team_provider(target: NaiveDate) -> FakeProvider {
    let earlier = day(2024, 10, 30);
    FakeProvider::new()
        .with_team(
            team(1610612747, "Los Angeles Lakers", "LAL"),
            vec![
                team_log_row(1610612747, "0022400205", target, "LAL vs. TOR", true, 131),
                team_log_row(1610612747, "0022400186", earlier, "LAL @ CLE", false, 123),
            ],
        )
        .with_team(
            team(1610612761, "Toronto Raptors", "TOR"),
            vec![team_log_row(
                1610612761,
                "0022400205",
                target,
                "TOR @ LAL",
                false,
                125,
            )],
        )
        .with_player(
            player(2544, "LeBron", "James", true),
            "LAL",
            vec![
                player_log_row(2544, "0022400205", target, "LAL vs. TOR", 19),
                player_log_row(2544, "0022400186", earlier, "LAL @ CLE", 26),
            ],
        )
        .with_player(player(1627832, "Fred", "VanVleet", false), "HOU", vec![])
}

#[test]
fn daily_run_loads_one_game_two_results_and_the_roster() {
    let target = day(2024, 11, 2);
    let provider = two_team_provider(target);
    let exchange = MemoryExchange::new();
    let sinks = SharedSinks::default();

    let pipeline = Pipeline {
        exchange: &exchange,
        target,
        season: "2024-25".to_string(),
        sources: Some(Sources {
            provider: &provider,
            team_pacer: &NoDelay,
            player_pacer: &NoDelay,
        }),
        load: Some(LoadContext {
            sinks: &sinks,
            schema: "NBA",
            max_rows: 16384,
        }),
    };
    let report = pipeline.run_all(NO_RETRY);
    assert!(report.all_succeeded(), "{report:?}");
    assert_eq!(report.outcomes.len(), TaskId::ALL.len());

    let games = sinks.rows("GAMES");
    assert_eq!(games.len(), 1);
    assert_eq!(games[0][0], Cell::Int(22400205));
    assert_eq!(games[0][1], Cell::Date(target));
    assert_eq!(games[0][2], Cell::Text("LAL".into()));
    assert_eq!(games[0][3], Cell::Text("TOR".into()));

    let results = sinks.rows("GAMES_RESULTS");
    assert_eq!(results.len(), 2);
    assert_eq!(results[1][0], Cell::Int(1610612761));

    let player_results = sinks.rows("PLAYER_RESULTS");
    assert_eq!(player_results.len(), 1);
    assert_eq!(player_results[0][1], Cell::Int(2544));

    let roster = sinks.rows("PLAYERS");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0][6], Cell::Text("LeBron James (LAL)".into()));

    assert_eq!(
        sinks.created(),
        vec![
            "NBA.GAMES",
            "NBA.GAMES_RESULTS",
            "NBA.PLAYERS",
            "NBA.PLAYER_RESULTS"
        ]
    );

    // The shared schema is set up once, before any loader touches its table.
    let events = sinks.events();
    assert_eq!(events[0], "schema:NBA");
    assert_eq!(events.iter().filter(|e| e.starts_with("schema:")).count(), 1);
    assert_eq!(events.iter().filter(|e| e.starts_with("table:")).count(), 4);

    let stored: Table = exchange::pull(&exchange, "transform_games", GAMES).expect("games");
    assert_eq!(stored.len(), 1);
    let roster: Table =
        exchange::pull(&exchange, "extract_players", ACTIVE_PLAYERS).expect("roster");
    assert_eq!(roster.len(), 1);
}

#[test]
fn quiet_day_still_creates_every_table() {
    let target = day(2024, 11, 3);
    let provider = two_team_provider(day(2024, 11, 2));
    let exchange = MemoryExchange::new();
    let sinks = SharedSinks::default();

    let pipeline = Pipeline {
        exchange: &exchange,
        target,
        season: "2024-25".to_string(),
        sources: Some(Sources {
            provider: &provider,
            team_pacer: &NoDelay,
            player_pacer: &NoDelay,
        }),
        load: Some(LoadContext {
            sinks: &sinks,
            schema: "NBA",
            max_rows: 16384,
        }),
    };
    let report = pipeline.run_all(NO_RETRY);
    assert!(report.all_succeeded(), "{report:?}");
    assert_eq!(sinks.created().len(), 4);
    assert!(sinks.rows("GAMES").is_empty());
    assert!(sinks.rows("PLAYER_RESULTS").is_empty());
    // The roster does not depend on the date.
    assert_eq!(sinks.rows("PLAYERS").len(), 1);
}

#[test]
fn failed_extract_skips_everything_downstream() {
    let target = day(2024, 11, 2);
    let provider = two_team_provider(target).fail_team_log(1610612761);
    let exchange = MemoryExchange::new();
    let sinks = SharedSinks::default();

    let pipeline = Pipeline {
        exchange: &exchange,
        target,
        season: "2024-25".to_string(),
        sources: Some(Sources {
            provider: &provider,
            team_pacer: &NoDelay,
            player_pacer: &NoDelay,
        }),
        load: Some(LoadContext {
            sinks: &sinks,
            schema: "NBA",
            max_rows: 16384,
        }),
    };
    let retry_once = RetryPolicy {
        retries: 1,
        delay: Duration::ZERO,
    };
    let report = pipeline.run_all(retry_once);

    assert!(matches!(
        report.state(TaskId::ExtractGames),
        Some(TaskState::Failed(_))
    ));
    for task in [TaskId::TransformGames, TaskId::ExtractPlayers]
        .into_iter()
        .chain(TaskId::LOADS)
    {
        assert_eq!(report.state(task), Some(&TaskState::UpstreamFailed));
    }
    assert_eq!(report.failed_tasks().len(), TaskId::ALL.len());
    assert!(sinks.created().is_empty());
    assert!(sinks.events().is_empty());

    let attempts = provider
        .calls()
        .iter()
        .filter(|c| *c == "team_game_log:1610612761")
        .count();
    assert_eq!(attempts, 2);
}

#[test]
fn player_failure_is_skipped_and_later_players_continue() {
    let target = day(2024, 11, 2);
    let provider = FakeProvider::new()
        .with_player(
            player(1, "Ayo", "First", true),
            "CHI",
            vec![player_log_row(1, "0022400201", target, "CHI vs. NYK", 12)],
        )
        .with_player(player(2, "Xavier", "Broken", true), "NYK", vec![])
        .with_player(
            player(3, "Cole", "Later", true),
            "NYK",
            vec![player_log_row(3, "0022400201", target, "NYK @ CHI", 8)],
        )
        .with_player(player(4, "Old", "Timer", false), "", vec![])
        .fail_player_info(2);
    let pacer = RecordingPacer::new();

    let out = extract_players(&provider, &pacer, "2024-25", target).expect("extract");

    assert_eq!(out.attempted, 3);
    assert_eq!(pacer.pauses(), 3);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].player_id, 2);
    assert!(out.failures[0].message.contains("player info"));
    assert_eq!(
        out.roster.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert_eq!(
        out.results.iter().map(|r| r.player_id).collect::<Vec<_>>(),
        vec![1, 3]
    );

    let calls = provider.calls();
    assert!(!calls.contains(&"player_game_log:2".to_string()));
    assert!(!calls.contains(&"player_info:4".to_string()));
}

#[test]
fn game_extract_pauses_after_every_team() {
    let target = day(2024, 11, 2);
    let provider = two_team_provider(target);
    let pacer = RecordingPacer::new();

    let rows = extract_game_logs(&provider, &pacer, "2024-25").expect("extract");
    assert_eq!(rows.len(), 3);
    assert_eq!(pacer.pauses(), 2);
}

#[test]
fn team_lookup_is_by_exact_full_name() {
    let provider = two_team_provider(day(2024, 11, 2));
    assert_eq!(
        find_team_id(&provider, "Los Angeles Lakers").expect("lookup"),
        Some(1610612747)
    );
    assert_eq!(find_team_id(&provider, "Lakers").expect("lookup"), None);
}
