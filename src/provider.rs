use anyhow::Result;

use crate::model::{Player, PlayerGameLogRow, PlayerInfo, SeasonType, Team, TeamGameLogRow};

/// Read-only view of the upstream statistics service.
pub trait StatsProvider {
    fn teams(&self) -> Result<Vec<Team>>;

    fn players(&self) -> Result<Vec<Player>>;

    fn team_game_log(
        &self,
        team_id: i64,
        season: &str,
        season_type: SeasonType,
    ) -> Result<Vec<TeamGameLogRow>>;

    fn player_game_log(&self, player_id: i64, season: &str) -> Result<Vec<PlayerGameLogRow>>;

    fn player_info(&self, player_id: i64) -> Result<PlayerInfo>;
}
