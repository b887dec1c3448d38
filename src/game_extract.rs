use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::{SeasonType, TeamGameLogRow};
use crate::pacing::Pacer;
use crate::provider::StatsProvider;

/// Exact full-name lookup in the provider's team directory.
pub fn find_team_id(provider: &dyn StatsProvider, full_name: &str) -> Result<Option<i64>> {
    let teams = provider.teams().context("list teams")?;
    Ok(teams
        .into_iter()
        .find(|team| team.full_name == full_name)
        .map(|team| team.id))
}

/// Concatenates every team's regular-season game log. Any failed fetch aborts.
pub fn extract_game_logs(
    provider: &dyn StatsProvider,
    pacer: &dyn Pacer,
    season: &str,
) -> Result<Vec<TeamGameLogRow>> {
    let teams = provider.teams().context("list teams")?;
    let mut all_games = Vec::new();

    for team in &teams {
        let games = provider
            .team_game_log(team.id, season, SeasonType::RegularSeason)
            .with_context(|| format!("fetch game log for {} ({})", team.full_name, team.id))?;
        debug!(team = %team.abbreviation, rows = games.len(), "team game log");
        all_games.extend(games);

        pacer.pause();
    }

    info!(
        teams = teams.len(),
        rows = all_games.len(),
        season,
        "team game logs extracted"
    );
    Ok(all_games)
}
