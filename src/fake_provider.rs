//! Canned statistics provider for offline runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::dates::format_game_date;
use crate::model::{
    BoxScore, Player, PlayerGameLogRow, PlayerInfo, SeasonType, Team, TeamGameLogRow,
};
use crate::provider::StatsProvider;

#[derive(Debug, Default)]
pub struct FakeProvider {
    teams: Vec<Team>,
    team_logs: HashMap<i64, Vec<TeamGameLogRow>>,
    players: Vec<Player>,
    player_logs: HashMap<i64, Vec<PlayerGameLogRow>>,
    player_teams: HashMap<i64, String>,
    failing_team_logs: HashSet<i64>,
    failing_player_info: HashSet<i64>,
    failing_player_logs: HashSet<i64>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team(mut self, team: Team, log: Vec<TeamGameLogRow>) -> Self {
        self.team_logs.insert(team.id, log);
        self.teams.push(team);
        self
    }

    pub fn with_player(
        mut self,
        player: Player,
        team_abbreviation: &str,
        log: Vec<PlayerGameLogRow>,
    ) -> Self {
        self.player_teams
            .insert(player.id, team_abbreviation.to_string());
        self.player_logs.insert(player.id, log);
        self.players.push(player);
        self
    }

    pub fn fail_team_log(mut self, team_id: i64) -> Self {
        self.failing_team_logs.insert(team_id);
        self
    }

    pub fn fail_player_info(mut self, player_id: i64) -> Self {
        self.failing_player_info.insert(player_id);
        self
    }

    pub fn fail_player_log(mut self, player_id: i64) -> Self {
        self.failing_player_logs.insert(player_id);
        self
    }

    /// Calls received so far, e.g. `player_info:2544`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl StatsProvider for FakeProvider {
    fn teams(&self) -> Result<Vec<Team>> {
        self.record("teams".to_string());
        Ok(self.teams.clone())
    }

    fn players(&self) -> Result<Vec<Player>> {
        self.record("players".to_string());
        Ok(self.players.clone())
    }

    fn team_game_log(
        &self,
        team_id: i64,
        _season: &str,
        _season_type: SeasonType,
    ) -> Result<Vec<TeamGameLogRow>> {
        self.record(format!("team_game_log:{team_id}"));
        if self.failing_team_logs.contains(&team_id) {
            return Err(anyhow!("teamgamelog {team_id}: HTTP 503"));
        }
        Ok(self.team_logs.get(&team_id).cloned().unwrap_or_default())
    }

    fn player_game_log(&self, player_id: i64, _season: &str) -> Result<Vec<PlayerGameLogRow>> {
        self.record(format!("player_game_log:{player_id}"));
        if self.failing_player_logs.contains(&player_id) {
            return Err(anyhow!("playergamelog {player_id}: HTTP 503"));
        }
        Ok(self.player_logs.get(&player_id).cloned().unwrap_or_default())
    }

    fn player_info(&self, player_id: i64) -> Result<PlayerInfo> {
        self.record(format!("player_info:{player_id}"));
        if self.failing_player_info.contains(&player_id) {
            return Err(anyhow!("commonplayerinfo {player_id}: read timed out"));
        }
        Ok(PlayerInfo {
            person_id: player_id,
            display_first_last: self
                .players
                .iter()
                .find(|p| p.id == player_id)
                .map(|p| p.full_name.clone()),
            team_abbreviation: self.player_teams.get(&player_id).cloned(),
        })
    }
}

pub fn team(id: i64, full_name: &str, abbreviation: &str) -> Team {
    let (city, nickname) = full_name.rsplit_once(' ').unwrap_or((full_name, full_name));
    Team {
        id,
        full_name: full_name.to_string(),
        abbreviation: abbreviation.to_string(),
        nickname: nickname.to_string(),
        city: city.to_string(),
    }
}

pub fn player(id: i64, first_name: &str, last_name: &str, is_active: bool) -> Player {
    Player {
        id,
        full_name: format!("{first_name} {last_name}"),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        is_active,
    }
}

pub fn team_log_row(
    team_id: i64,
    game_id: &str,
    date: NaiveDate,
    matchup: &str,
    won: bool,
    pts: i64,
) -> TeamGameLogRow {
    TeamGameLogRow {
        team_id,
        game_id: game_id.to_string(),
        game_date: format_game_date(date),
        matchup: matchup.to_string(),
        wl: Some(if won { "W" } else { "L" }.to_string()),
        w: Some(i64::from(won)),
        l: Some(i64::from(!won)),
        w_pct: Some(if won { 1.0 } else { 0.0 }),
        box_score: BoxScore {
            min: Some(240.0),
            pts: Some(pts),
            ..BoxScore::default()
        },
    }
}

pub fn player_log_row(
    player_id: i64,
    game_id: &str,
    date: NaiveDate,
    matchup: &str,
    pts: i64,
) -> PlayerGameLogRow {
    PlayerGameLogRow {
        season_id: Some("22024".to_string()),
        player_id,
        game_id: game_id.to_string(),
        game_date: format_game_date(date),
        matchup: matchup.to_string(),
        wl: Some("W".to_string()),
        box_score: BoxScore {
            min: Some(34.0),
            pts: Some(pts),
            ..BoxScore::default()
        },
        plus_minus: Some(5),
        video_available: Some(1),
    }
}
