use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::table::{Cell, Column, ColumnKind, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub full_name: String,
    pub abbreviation: String,
    pub nickname: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(rename = "PERSON_ID", deserialize_with = "de_i64")]
    pub person_id: i64,
    #[serde(rename = "DISPLAY_FIRST_LAST", default)]
    pub display_first_last: Option<String>,
    #[serde(rename = "TEAM_ABBREVIATION", default, deserialize_with = "de_opt_string")]
    pub team_abbreviation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    RegularSeason,
    PreSeason,
    Playoffs,
    AllStar,
}

impl SeasonType {
    pub fn as_param(self) -> &'static str {
        match self {
            SeasonType::RegularSeason => "Regular Season",
            SeasonType::PreSeason => "Pre Season",
            SeasonType::Playoffs => "Playoffs",
            SeasonType::AllStar => "All Star",
        }
    }
}

/// Box-score columns shared by team and player game logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxScore {
    #[serde(rename = "MIN", default, deserialize_with = "de_opt_f64")]
    pub min: Option<f64>,
    #[serde(rename = "FGM", default, deserialize_with = "de_opt_i64")]
    pub fgm: Option<i64>,
    #[serde(rename = "FGA", default, deserialize_with = "de_opt_i64")]
    pub fga: Option<i64>,
    #[serde(rename = "FG_PCT", default, deserialize_with = "de_opt_f64")]
    pub fg_pct: Option<f64>,
    #[serde(rename = "FG3M", default, deserialize_with = "de_opt_i64")]
    pub fg3m: Option<i64>,
    #[serde(rename = "FG3A", default, deserialize_with = "de_opt_i64")]
    pub fg3a: Option<i64>,
    #[serde(rename = "FG3_PCT", default, deserialize_with = "de_opt_f64")]
    pub fg3_pct: Option<f64>,
    #[serde(rename = "FTM", default, deserialize_with = "de_opt_i64")]
    pub ftm: Option<i64>,
    #[serde(rename = "FTA", default, deserialize_with = "de_opt_i64")]
    pub fta: Option<i64>,
    #[serde(rename = "FT_PCT", default, deserialize_with = "de_opt_f64")]
    pub ft_pct: Option<f64>,
    #[serde(rename = "OREB", default, deserialize_with = "de_opt_i64")]
    pub oreb: Option<i64>,
    #[serde(rename = "DREB", default, deserialize_with = "de_opt_i64")]
    pub dreb: Option<i64>,
    #[serde(rename = "REB", default, deserialize_with = "de_opt_i64")]
    pub reb: Option<i64>,
    #[serde(rename = "AST", default, deserialize_with = "de_opt_i64")]
    pub ast: Option<i64>,
    #[serde(rename = "STL", default, deserialize_with = "de_opt_i64")]
    pub stl: Option<i64>,
    #[serde(rename = "BLK", default, deserialize_with = "de_opt_i64")]
    pub blk: Option<i64>,
    #[serde(rename = "TOV", default, deserialize_with = "de_opt_i64")]
    pub tov: Option<i64>,
    #[serde(rename = "PF", default, deserialize_with = "de_opt_i64")]
    pub pf: Option<i64>,
    #[serde(rename = "PTS", default, deserialize_with = "de_opt_i64")]
    pub pts: Option<i64>,
}

impl BoxScore {
    fn columns() -> Vec<Column> {
        use ColumnKind::{Float, Integer};
        vec![
            Column::new("MIN", Float),
            Column::new("FGM", Integer),
            Column::new("FGA", Integer),
            Column::new("FG_PCT", Float),
            Column::new("FG3M", Integer),
            Column::new("FG3A", Integer),
            Column::new("FG3_PCT", Float),
            Column::new("FTM", Integer),
            Column::new("FTA", Integer),
            Column::new("FT_PCT", Float),
            Column::new("OREB", Integer),
            Column::new("DREB", Integer),
            Column::new("REB", Integer),
            Column::new("AST", Integer),
            Column::new("STL", Integer),
            Column::new("BLK", Integer),
            Column::new("TOV", Integer),
            Column::new("PF", Integer),
            Column::new("PTS", Integer),
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.min.into(),
            self.fgm.into(),
            self.fga.into(),
            self.fg_pct.into(),
            self.fg3m.into(),
            self.fg3a.into(),
            self.fg3_pct.into(),
            self.ftm.into(),
            self.fta.into(),
            self.ft_pct.into(),
            self.oreb.into(),
            self.dreb.into(),
            self.reb.into(),
            self.ast.into(),
            self.stl.into(),
            self.blk.into(),
            self.tov.into(),
            self.pf.into(),
            self.pts.into(),
        ]
    }
}

/// One row of a team's season game log, as the provider returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameLogRow {
    #[serde(rename = "Team_ID", deserialize_with = "de_i64")]
    pub team_id: i64,
    #[serde(rename = "Game_ID", deserialize_with = "de_string")]
    pub game_id: String,
    #[serde(rename = "GAME_DATE")]
    pub game_date: String,
    #[serde(rename = "MATCHUP")]
    pub matchup: String,
    #[serde(rename = "WL", default, deserialize_with = "de_opt_string")]
    pub wl: Option<String>,
    #[serde(rename = "W", default, deserialize_with = "de_opt_i64")]
    pub w: Option<i64>,
    #[serde(rename = "L", default, deserialize_with = "de_opt_i64")]
    pub l: Option<i64>,
    #[serde(rename = "W_PCT", default, deserialize_with = "de_opt_f64")]
    pub w_pct: Option<f64>,
    #[serde(flatten)]
    pub box_score: BoxScore,
}

/// One row of a player's season game log, as the provider returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameLogRow {
    #[serde(rename = "SEASON_ID", default, deserialize_with = "de_opt_string")]
    pub season_id: Option<String>,
    #[serde(rename = "Player_ID", deserialize_with = "de_i64")]
    pub player_id: i64,
    #[serde(rename = "Game_ID", deserialize_with = "de_string")]
    pub game_id: String,
    #[serde(rename = "GAME_DATE")]
    pub game_date: String,
    #[serde(rename = "MATCHUP")]
    pub matchup: String,
    #[serde(rename = "WL", default, deserialize_with = "de_opt_string")]
    pub wl: Option<String>,
    #[serde(flatten)]
    pub box_score: BoxScore,
    #[serde(rename = "PLUS_MINUS", default, deserialize_with = "de_opt_i64")]
    pub plus_minus: Option<i64>,
    #[serde(rename = "VIDEO_AVAILABLE", default, deserialize_with = "de_opt_i64")]
    pub video_available: Option<i64>,
}

/// Slim per-game row: one per game id.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub game_id: Option<i64>,
    pub game_date: NaiveDate,
    pub team_1: String,
    pub team_2: String,
}

impl Record for Game {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("Game_ID", ColumnKind::Integer),
            Column::new("GAME_DATE", ColumnKind::Date),
            Column::new("TEAM_1", ColumnKind::Text),
            Column::new("TEAM_2", ColumnKind::Text),
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.game_id.into(),
            self.game_date.into(),
            self.team_1.as_str().into(),
            self.team_2.as_str().into(),
        ]
    }
}

/// Team game log row on the target date, one per team.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub team_id: i64,
    pub game_id: Option<i64>,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub wl: Option<String>,
    pub w: Option<i64>,
    pub l: Option<i64>,
    pub w_pct: Option<f64>,
    pub box_score: BoxScore,
    pub team_1: String,
    pub team_2: String,
}

impl Record for GameResult {
    fn columns() -> Vec<Column> {
        use ColumnKind::{Date, Float, Integer, Text};
        let mut cols = vec![
            Column::new("Team_ID", Integer),
            Column::new("Game_ID", Integer),
            Column::new("GAME_DATE", Date),
            Column::new("MATCHUP", Text),
            Column::new("WL", Text),
            Column::new("W", Integer),
            Column::new("L", Integer),
            Column::new("W_PCT", Float),
        ];
        cols.extend(BoxScore::columns());
        cols.push(Column::new("TEAM_1", Text));
        cols.push(Column::new("TEAM_2", Text));
        cols
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![
            self.team_id.into(),
            self.game_id.into(),
            self.game_date.into(),
            self.matchup.as_str().into(),
            self.wl.as_deref().into(),
            self.w.into(),
            self.l.into(),
            self.w_pct.into(),
        ];
        cells.extend(self.box_score.cells());
        cells.push(self.team_1.as_str().into());
        cells.push(self.team_2.as_str().into());
        cells
    }
}

/// Player game log row on the target date.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerResult {
    pub season_id: Option<String>,
    pub player_id: i64,
    pub game_id: Option<i64>,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub wl: Option<String>,
    pub box_score: BoxScore,
    pub plus_minus: Option<i64>,
    pub video_available: Option<i64>,
}

impl Record for PlayerResult {
    fn columns() -> Vec<Column> {
        use ColumnKind::{Date, Integer, Text};
        let mut cols = vec![
            Column::new("SEASON_ID", Text),
            Column::new("Player_ID", Integer),
            Column::new("Game_ID", Integer),
            Column::new("GAME_DATE", Date),
            Column::new("MATCHUP", Text),
            Column::new("WL", Text),
        ];
        cols.extend(BoxScore::columns());
        cols.push(Column::new("PLUS_MINUS", Integer));
        cols.push(Column::new("VIDEO_AVAILABLE", Integer));
        cols
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![
            self.season_id.as_deref().into(),
            self.player_id.into(),
            self.game_id.into(),
            self.game_date.into(),
            self.matchup.as_str().into(),
            self.wl.as_deref().into(),
        ];
        cells.extend(self.box_score.cells());
        cells.push(self.plus_minus.into());
        cells.push(self.video_available.into());
        cells
    }
}

/// Roster snapshot row for a player whose details were fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlayer {
    pub id: i64,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub team_abbreviation: String,
    pub display_name: String,
}

impl Record for ActivePlayer {
    fn columns() -> Vec<Column> {
        use ColumnKind::{Boolean, Integer, Text};
        vec![
            Column::new("id", Integer),
            Column::new("full_name", Text),
            Column::new("first_name", Text),
            Column::new("last_name", Text),
            Column::new("is_active", Boolean),
            Column::new("team_abbreviation", Text),
            Column::new("display_name", Text),
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.id.into(),
            self.full_name.as_str().into(),
            self.first_name.as_str().into(),
            self.last_name.as_str().into(),
            self.is_active.into(),
            self.team_abbreviation.as_str().into(),
            self.display_name.as_str().into(),
        ]
    }
}

pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

// Minutes arrive either as a number or as "MM:SS".
pub(crate) fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if let Some((m, sec)) = s.split_once(':') {
                let m = m.trim().parse::<f64>().ok()?;
                let sec = sec.trim().parse::<f64>().ok()?;
                return Some(m + sec / 60.0);
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    value_as_i64(&v).ok_or_else(|| D::Error::custom(format!("expected integer, got {v}")))
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    if is_blank(&v) {
        return Ok(None);
    }
    value_as_i64(&v)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected integer, got {v}")))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    if is_blank(&v) {
        return Ok(None);
    }
    value_as_f64(&v)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected number, got {v}")))
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string, got {other}"))),
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected string, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minutes_accept_clock_format() {
        assert_eq!(value_as_f64(&json!("34:30")), Some(34.5));
        assert_eq!(value_as_f64(&json!(240)), Some(240.0));
        assert_eq!(value_as_f64(&json!("n/a")), None);
    }

    #[test]
    fn team_row_accepts_numeric_game_id_and_null_stats() {
        let row: TeamGameLogRow = serde_json::from_value(json!({
            "Team_ID": 1610612747,
            "Game_ID": 22400061,
            "GAME_DATE": "OCT 22, 2024",
            "MATCHUP": "LAL vs. MIN",
            "WL": "W",
            "W": 1,
            "L": 0,
            "W_PCT": 1.0,
            "MIN": 240,
            "PTS": 110,
            "FG3_PCT": null
        }))
        .expect("row should deserialize");
        assert_eq!(row.game_id, "22400061");
        assert_eq!(row.box_score.pts, Some(110));
        assert_eq!(row.box_score.fg3_pct, None);
        assert_eq!(row.box_score.reb, None);
    }

    #[test]
    fn non_numeric_stat_is_rejected() {
        let err = serde_json::from_value::<TeamGameLogRow>(json!({
            "Team_ID": 1,
            "Game_ID": "1",
            "GAME_DATE": "OCT 22, 2024",
            "MATCHUP": "LAL vs. MIN",
            "PTS": "lots"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn game_result_columns_match_cells() {
        let result = GameResult {
            team_id: 1,
            game_id: Some(2),
            game_date: NaiveDate::from_ymd_opt(2024, 10, 22).expect("valid date"),
            matchup: "LAL @ BOS".into(),
            wl: Some("L".into()),
            w: Some(0),
            l: Some(1),
            w_pct: Some(0.0),
            box_score: BoxScore::default(),
            team_1: "LAL".into(),
            team_2: "BOS".into(),
        };
        assert_eq!(GameResult::columns().len(), result.cells().len());
        assert_eq!(GameResult::columns().last().map(|c| c.name.as_str()), Some("TEAM_2"));
    }
}
