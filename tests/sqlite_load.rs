use chrono::NaiveDate;
use nba_incremental::dag::{GAMES_RESULTS, TaskId};
use nba_incremental::exchange::{self, DirExchange};
use nba_incremental::fake_provider::team_log_row;
use nba_incremental::loader::{LoadRequest, load_dataset, load_table};
use nba_incremental::model::GameResult;
use nba_incremental::sink::{Backend, Destination, SinkFactory};
use nba_incremental::sqlite_sink::SqliteSink;
use nba_incremental::table::Table;
use nba_incremental::transform::transform_game_logs;

fn results_for(n: usize) -> Table {
    let date = NaiveDate::from_ymd_opt(2024, 11, 2).expect("valid date");
    let rows = (0..n)
        .map(|i| {
            team_log_row(
                1610612700 + i as i64,
                &format!("00224{:05}", i),
                date,
                "LAL vs. TOR",
                i % 2 == 0,
                100 + i as i64,
            )
        })
        .collect::<Vec<_>>();
    let out = transform_game_logs(&rows, date).expect("transform");
    Table::from_records::<GameResult>(&out.results)
}

#[test]
fn batches_land_in_order_in_the_schema_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("nba.sqlite");
    let dest = Destination::new("NBA", "GAMES_RESULTS");
    let table = results_for(7);

    let mut sink = Backend::Sqlite(db.clone()).open().expect("open");
    let summary = load_table(&table, &dest, 3, sink.as_mut()).expect("load");
    assert_eq!(summary.batches, 3);
    drop(sink);

    assert!(dir.path().join("NBA.sqlite").exists());
    let sink = SqliteSink::open(&db).expect("reopen");
    assert_eq!(sink.count_rows(&dest).expect("count"), 7);

    let mut stmt = sink
        .connection()
        .prepare("SELECT PTS FROM \"NBA\".\"GAMES_RESULTS\" ORDER BY rowid")
        .expect("prepare");
    let points = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows");
    assert_eq!(points, (100..107).collect::<Vec<i64>>());
}

#[test]
fn loading_twice_appends_twice() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exchange = DirExchange::new(dir.path().join("exchange"));
    exchange::push(
        &exchange,
        TaskId::TransformGames.as_str(),
        GAMES_RESULTS,
        &results_for(2),
    )
    .expect("push");

    let request = LoadRequest {
        source_task: TaskId::TransformGames.as_str().to_string(),
        key: GAMES_RESULTS.to_string(),
        dest: Destination::new("NBA", "GAMES_RESULTS"),
        max_rows: 16384,
    };
    let mut sink = SqliteSink::in_memory().expect("sqlite");
    load_dataset(&exchange, &request, &mut sink).expect("first load");
    load_dataset(&exchange, &request, &mut sink).expect("second load");

    assert_eq!(sink.count_rows(&request.dest).expect("count"), 4);
}
