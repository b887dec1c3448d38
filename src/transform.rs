use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

use crate::dates::parse_game_date;
use crate::model::{Game, GameResult, TeamGameLogRow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("game {game_id}: matchup {matchup:?} is shorter than 3 characters")]
    MalformedMatchup { game_id: String, matchup: String },
    #[error("game {game_id}: unrecognized game date {raw:?}")]
    BadDate { game_id: String, raw: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub games: Vec<Game>,
    pub results: Vec<GameResult>,
}

/// `"0022400061"` -> `Some(22400061)`; anything unparsable is null.
pub fn coerce_game_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// First and last three characters of a matchup such as `LAL @ BOS`.
///
/// The input is trimmed and sliced by `char`. Strings of three to five
/// characters yield overlapping codes; shorter ones yield `None`.
pub fn matchup_codes(matchup: &str) -> Option<(String, String)> {
    let chars = matchup.trim().chars().collect::<Vec<_>>();
    if chars.len() < 3 {
        return None;
    }
    let first = chars[..3].iter().collect();
    let last = chars[chars.len() - 3..].iter().collect();
    Some((first, last))
}

/// Builds the `games` and `games_results` datasets for `target`.
///
/// Every row is validated before filtering, so a malformed row fails the run
/// even when it is not from the target date.
pub fn transform_game_logs(
    rows: &[TeamGameLogRow],
    target: NaiveDate,
) -> Result<TransformOutput, TransformError> {
    let mut results = Vec::new();

    for row in rows {
        let game_date = parse_game_date(&row.game_date).ok_or_else(|| TransformError::BadDate {
            game_id: row.game_id.clone(),
            raw: row.game_date.clone(),
        })?;
        let (team_1, team_2) =
            matchup_codes(&row.matchup).ok_or_else(|| TransformError::MalformedMatchup {
                game_id: row.game_id.clone(),
                matchup: row.matchup.clone(),
            })?;
        if game_date != target {
            continue;
        }
        results.push(GameResult {
            team_id: row.team_id,
            game_id: coerce_game_id(&row.game_id),
            game_date,
            matchup: row.matchup.clone(),
            wl: row.wl.clone(),
            w: row.w,
            l: row.l,
            w_pct: row.w_pct,
            box_score: row.box_score.clone(),
            team_1,
            team_2,
        });
    }

    let games = dedup_games(&results);
    info!(
        %target,
        input = rows.len(),
        games = games.len(),
        results = results.len(),
        "game logs transformed"
    );
    Ok(TransformOutput { games, results })
}

fn dedup_games(results: &[GameResult]) -> Vec<Game> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for r in results {
        if seen.insert(r.game_id) {
            out.push(Game {
                game_id: r.game_id,
                game_date: r.game_date,
                team_1: r.team_1.clone(),
                team_2: r.team_2.clone(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_provider::team_log_row;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn away_matchup_slices_both_ends() {
        assert_eq!(
            matchup_codes("LAL @ BOS"),
            Some(("LAL".to_string(), "BOS".to_string()))
        );
    }

    #[test]
    fn home_matchup_slices_both_ends() {
        assert_eq!(
            matchup_codes("BOS vs. LAL"),
            Some(("BOS".to_string(), "LAL".to_string()))
        );
    }

    #[test]
    fn short_matchups_are_rejected_or_overlap() {
        assert_eq!(matchup_codes("LA"), None);
        assert_eq!(matchup_codes("   "), None);
        assert_eq!(
            matchup_codes(" LAL "),
            Some(("LAL".to_string(), "LAL".to_string()))
        );
        assert_eq!(
            matchup_codes("LALBO"),
            Some(("LAL".to_string(), "LBO".to_string()))
        );
    }

    #[test]
    fn multibyte_matchup_slices_by_char() {
        assert_eq!(
            matchup_codes("ÉÉÉ @ ÅÅÅ"),
            Some(("ÉÉÉ".to_string(), "ÅÅÅ".to_string()))
        );
    }

    #[test]
    fn game_id_coercion() {
        assert_eq!(coerce_game_id("0022400061"), Some(22400061));
        assert_eq!(coerce_game_id(" 7 "), Some(7));
        assert_eq!(coerce_game_id("n/a"), None);
    }

    #[test]
    fn malformed_rows_fail_with_typed_errors() {
        let target = day(2024, 11, 2);

        let short = team_log_row(1, "0022400001", target, "LA", true, 100);
        assert_eq!(
            transform_game_logs(&[short], target),
            Err(TransformError::MalformedMatchup {
                game_id: "0022400001".into(),
                matchup: "LA".into(),
            })
        );

        let mut bad_date = team_log_row(1, "0022400002", target, "LAL @ BOS", true, 100);
        bad_date.game_date = "2024/11/02".into();
        assert_eq!(
            transform_game_logs(&[bad_date], target),
            Err(TransformError::BadDate {
                game_id: "0022400002".into(),
                raw: "2024/11/02".into(),
            })
        );

        // Rows from other days are validated too.
        let good = team_log_row(1, "0022400003", target, "LAL @ BOS", true, 100);
        let old_short = team_log_row(2, "0022400004", day(2024, 10, 30), " ", false, 90);
        assert!(matches!(
            transform_game_logs(&[good, old_short], target),
            Err(TransformError::MalformedMatchup { .. })
        ));
    }

    #[test]
    fn games_are_unique_and_dated_on_the_target_day() {
        let target = day(2024, 11, 2);
        let earlier = day(2024, 11, 1);
        let rows = vec![
            team_log_row(1, "0022400101", target, "LAL vs. TOR", true, 120),
            team_log_row(2, "0022400102", target, "BOS vs. NYK", false, 99),
            team_log_row(3, "0022400101", earlier, "LAL @ CLE", false, 101),
            team_log_row(4, "0022400103", target, "MIA vs. CHI", true, 110),
            team_log_row(5, "0022400101", target, "TOR @ LAL", false, 115),
            team_log_row(6, "0022400102", target, "NYK @ BOS", true, 104),
            team_log_row(7, "0022400103", target, "CHI @ MIA", false, 98),
        ];

        let out = transform_game_logs(&rows, target).expect("transform");

        let ids = out.games.iter().map(|g| g.game_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![Some(22400101), Some(22400102), Some(22400103)]);
        let unique = ids.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), ids.len());
        assert!(out.games.iter().all(|g| g.game_date == target));
        // First row of each game decides its codes.
        let codes = out
            .games
            .iter()
            .map(|g| (g.team_1.as_str(), g.team_2.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(codes, vec![("LAL", "TOR"), ("BOS", "NYK"), ("MIA", "CHI")]);

        assert_eq!(out.results.len(), 6);
        assert!(out.results.iter().all(|r| r.game_date == target));
        assert!(out.results.iter().all(|r| r.team_id != 3));
    }
}
