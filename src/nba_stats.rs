use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::http_client::build_http_client;
use crate::model::{
    Player, PlayerGameLogRow, PlayerInfo, SeasonType, Team, TeamGameLogRow, value_as_i64,
};
use crate::provider::StatsProvider;

pub const DEFAULT_BASE_URL: &str = "https://stats.nba.com/stats";
const LEAGUE_ID: &str = "00";

/// Franchise directory: id, full name, abbreviation, nickname, city.
const TEAM_DIRECTORY: &[(i64, &str, &str, &str, &str)] = &[
    (1610612737, "Atlanta Hawks", "ATL", "Hawks", "Atlanta"),
    (1610612738, "Boston Celtics", "BOS", "Celtics", "Boston"),
    (1610612739, "Cleveland Cavaliers", "CLE", "Cavaliers", "Cleveland"),
    (1610612740, "New Orleans Pelicans", "NOP", "Pelicans", "New Orleans"),
    (1610612741, "Chicago Bulls", "CHI", "Bulls", "Chicago"),
    (1610612742, "Dallas Mavericks", "DAL", "Mavericks", "Dallas"),
    (1610612743, "Denver Nuggets", "DEN", "Nuggets", "Denver"),
    (1610612744, "Golden State Warriors", "GSW", "Warriors", "Golden State"),
    (1610612745, "Houston Rockets", "HOU", "Rockets", "Houston"),
    (1610612746, "Los Angeles Clippers", "LAC", "Clippers", "Los Angeles"),
    (1610612747, "Los Angeles Lakers", "LAL", "Lakers", "Los Angeles"),
    (1610612748, "Miami Heat", "MIA", "Heat", "Miami"),
    (1610612749, "Milwaukee Bucks", "MIL", "Bucks", "Milwaukee"),
    (1610612750, "Minnesota Timberwolves", "MIN", "Timberwolves", "Minnesota"),
    (1610612751, "Brooklyn Nets", "BKN", "Nets", "Brooklyn"),
    (1610612752, "New York Knicks", "NYK", "Knicks", "New York"),
    (1610612753, "Orlando Magic", "ORL", "Magic", "Orlando"),
    (1610612754, "Indiana Pacers", "IND", "Pacers", "Indiana"),
    (1610612755, "Philadelphia 76ers", "PHI", "76ers", "Philadelphia"),
    (1610612756, "Phoenix Suns", "PHX", "Suns", "Phoenix"),
    (1610612757, "Portland Trail Blazers", "POR", "Trail Blazers", "Portland"),
    (1610612758, "Sacramento Kings", "SAC", "Kings", "Sacramento"),
    (1610612759, "San Antonio Spurs", "SAS", "Spurs", "San Antonio"),
    (1610612760, "Oklahoma City Thunder", "OKC", "Thunder", "Oklahoma City"),
    (1610612761, "Toronto Raptors", "TOR", "Raptors", "Toronto"),
    (1610612762, "Utah Jazz", "UTA", "Jazz", "Utah"),
    (1610612763, "Memphis Grizzlies", "MEM", "Grizzlies", "Memphis"),
    (1610612764, "Washington Wizards", "WAS", "Wizards", "Washington"),
    (1610612765, "Detroit Pistons", "DET", "Pistons", "Detroit"),
    (1610612766, "Charlotte Hornets", "CHA", "Hornets", "Charlotte"),
];

pub fn team_directory() -> Vec<Team> {
    TEAM_DIRECTORY
        .iter()
        .map(|(id, full_name, abbreviation, nickname, city)| Team {
            id: *id,
            full_name: full_name.to_string(),
            abbreviation: abbreviation.to_string(),
            nickname: nickname.to_string(),
            city: city.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(crate::http_client::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Blocking client for the stats.nba.com endpoints the pipeline reads.
pub struct NbaStatsClient {
    client: Client,
    base_url: String,
    season: String,
}

impl NbaStatsClient {
    /// `season` scopes the player directory call.
    pub fn new(config: &ProviderConfig, season: &str) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            season: season.to_string(),
        })
    }

    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, ?query, "stats request");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .with_context(|| format!("request {endpoint} failed"))?;
        let status = resp.status();
        let body = resp
            .text()
            .with_context(|| format!("failed reading {endpoint} body"))?;
        if !status.is_success() {
            return Err(anyhow!("{endpoint}: http {status}: {}", snippet(&body)));
        }
        Ok(body)
    }
}

impl StatsProvider for NbaStatsClient {
    fn teams(&self) -> Result<Vec<Team>> {
        Ok(team_directory())
    }

    fn players(&self) -> Result<Vec<Player>> {
        let body = self.get(
            "commonallplayers",
            &[
                ("LeagueID", LEAGUE_ID.to_string()),
                ("Season", self.season.clone()),
                ("IsOnlyCurrentSeason", "0".to_string()),
            ],
        )?;
        parse_all_players_json(&body)
    }

    fn team_game_log(
        &self,
        team_id: i64,
        season: &str,
        season_type: SeasonType,
    ) -> Result<Vec<TeamGameLogRow>> {
        let body = self.get(
            "teamgamelog",
            &[
                ("TeamID", team_id.to_string()),
                ("Season", season.to_string()),
                ("SeasonType", season_type.as_param().to_string()),
                ("LeagueID", String::new()),
                ("DateFrom", String::new()),
                ("DateTo", String::new()),
            ],
        )?;
        parse_team_game_log_json(&body)
            .with_context(|| format!("team {team_id} game log"))
    }

    fn player_game_log(&self, player_id: i64, season: &str) -> Result<Vec<PlayerGameLogRow>> {
        let body = self.get(
            "playergamelog",
            &[
                ("PlayerID", player_id.to_string()),
                ("Season", season.to_string()),
                ("SeasonType", SeasonType::RegularSeason.as_param().to_string()),
                ("LeagueID", String::new()),
                ("DateFrom", String::new()),
                ("DateTo", String::new()),
            ],
        )?;
        parse_player_game_log_json(&body)
            .with_context(|| format!("player {player_id} game log"))
    }

    fn player_info(&self, player_id: i64) -> Result<PlayerInfo> {
        let body = self.get(
            "commonplayerinfo",
            &[
                ("PlayerID", player_id.to_string()),
                ("LeagueID", String::new()),
            ],
        )?;
        parse_player_info_json(&body).with_context(|| format!("player {player_id} info"))
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets", alias = "resultSet", deserialize_with = "one_or_many")]
    result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    name: String,
    headers: Vec<String>,
    #[serde(rename = "rowSet")]
    row_set: Vec<Vec<Value>>,
}

fn one_or_many<'de, D>(d: D) -> std::result::Result<Vec<ResultSet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ResultSet>),
        One(ResultSet),
    }
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::Many(sets) => sets,
        OneOrMany::One(set) => vec![set],
    })
}

/// Decodes the named result set into typed rows by zipping `headers` with each
/// `rowSet` entry.
pub fn parse_result_set<T: DeserializeOwned>(raw: &str, name: &str) -> Result<Vec<T>> {
    let resp: StatsResponse =
        serde_json::from_str(raw.trim()).context("invalid stats response json")?;
    let set = resp
        .result_sets
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| anyhow!("missing result set {name}"))?;

    let mut out = Vec::with_capacity(set.row_set.len());
    for (idx, row) in set.row_set.into_iter().enumerate() {
        if row.len() != set.headers.len() {
            return Err(anyhow!(
                "{name} row {idx} has {} values for {} headers",
                row.len(),
                set.headers.len()
            ));
        }
        let record = set
            .headers
            .iter()
            .cloned()
            .zip(row)
            .collect::<Map<String, Value>>();
        let parsed = serde_json::from_value::<T>(Value::Object(record))
            .with_context(|| format!("{name} row {idx}"))?;
        out.push(parsed);
    }
    Ok(out)
}

pub fn parse_team_game_log_json(raw: &str) -> Result<Vec<TeamGameLogRow>> {
    parse_result_set(raw, "TeamGameLog")
}

pub fn parse_player_game_log_json(raw: &str) -> Result<Vec<PlayerGameLogRow>> {
    parse_result_set(raw, "PlayerGameLog")
}

pub fn parse_player_info_json(raw: &str) -> Result<PlayerInfo> {
    parse_result_set::<PlayerInfo>(raw, "CommonPlayerInfo")?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("CommonPlayerInfo has no rows"))
}

#[derive(Debug, Deserialize)]
struct AllPlayersRow {
    #[serde(rename = "PERSON_ID")]
    person_id: Value,
    #[serde(rename = "DISPLAY_LAST_COMMA_FIRST", default)]
    last_comma_first: Option<String>,
    #[serde(rename = "DISPLAY_FIRST_LAST", default)]
    first_last: Option<String>,
    #[serde(rename = "ROSTERSTATUS", default)]
    roster_status: Value,
}

pub fn parse_all_players_json(raw: &str) -> Result<Vec<Player>> {
    let rows = parse_result_set::<AllPlayersRow>(raw, "CommonAllPlayers")?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id = value_as_i64(&row.person_id)
            .ok_or_else(|| anyhow!("invalid PERSON_ID {}", row.person_id))?;
        let full_name = row.first_last.unwrap_or_default().trim().to_string();
        let (last_name, first_name) = match row.last_comma_first.as_deref() {
            Some(raw) => match raw.split_once(',') {
                Some((last, first)) => (last.trim().to_string(), first.trim().to_string()),
                None => (raw.trim().to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };
        out.push(Player {
            id,
            full_name,
            first_name,
            last_name,
            is_active: value_as_i64(&row.roster_status).unwrap_or(0) == 1,
        });
    }
    Ok(out)
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    &body[..end]
}
