use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::dates::parse_game_date;
use crate::model::{ActivePlayer, Player, PlayerGameLogRow, PlayerResult};
use crate::pacing::Pacer;
use crate::provider::StatsProvider;
use crate::transform::coerce_game_id;

/// Everything fetched for one player.
#[derive(Debug, Clone)]
pub struct PlayerFetch {
    pub player: Player,
    pub team_abbreviation: String,
    pub display_name: String,
    pub game_log: Vec<PlayerGameLogRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerFailure {
    pub player_id: i64,
    pub full_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerExtractOutput {
    pub attempted: usize,
    pub results: Vec<PlayerResult>,
    pub roster: Vec<ActivePlayer>,
    pub failures: Vec<PlayerFailure>,
}

/// Team affiliation, then season game log.
pub fn fetch_player(
    provider: &dyn StatsProvider,
    player: &Player,
    season: &str,
) -> Result<PlayerFetch> {
    let info = provider
        .player_info(player.id)
        .context("fetch player info")?;
    let team_abbreviation = info.team_abbreviation.unwrap_or_default();
    let game_log = provider
        .player_game_log(player.id, season)
        .context("fetch player game log")?;

    Ok(PlayerFetch {
        display_name: format!("{} ({team_abbreviation})", player.full_name),
        player: player.clone(),
        team_abbreviation,
        game_log,
    })
}

/// Walks the active roster one player at a time. A player whose fetch fails is
/// logged, recorded in `failures` and left out of both datasets.
pub fn extract_players(
    provider: &dyn StatsProvider,
    pacer: &dyn Pacer,
    season: &str,
    target: NaiveDate,
) -> Result<PlayerExtractOutput> {
    let active = provider
        .players()
        .context("list players")?
        .into_iter()
        .filter(|p| p.is_active)
        .collect::<Vec<_>>();

    let mut fetched = Vec::with_capacity(active.len());
    let mut failures = Vec::new();
    for player in &active {
        match fetch_player(provider, player, season) {
            Ok(fetch) => fetched.push(fetch),
            Err(err) => {
                warn!(
                    player_id = player.id,
                    player = %player.full_name,
                    "skipping player: {err:#}"
                );
                failures.push(PlayerFailure {
                    player_id: player.id,
                    full_name: player.full_name.clone(),
                    message: format!("{err:#}"),
                });
            }
        }
        pacer.pause();
    }

    let mut results = Vec::new();
    let mut roster = Vec::with_capacity(fetched.len());
    for fetch in fetched {
        for row in &fetch.game_log {
            let game_date = parse_game_date(&row.game_date).ok_or_else(|| {
                anyhow!(
                    "player {} game {}: unrecognized game date {:?}",
                    row.player_id,
                    row.game_id,
                    row.game_date
                )
            })?;
            if game_date == target {
                results.push(player_result(row, game_date));
            }
        }
        roster.push(ActivePlayer {
            id: fetch.player.id,
            full_name: fetch.player.full_name,
            first_name: fetch.player.first_name,
            last_name: fetch.player.last_name,
            is_active: fetch.player.is_active,
            team_abbreviation: fetch.team_abbreviation,
            display_name: fetch.display_name,
        });
    }

    info!(
        %target,
        attempted = active.len(),
        fetched = roster.len(),
        failed = failures.len(),
        results = results.len(),
        "player game logs extracted"
    );
    Ok(PlayerExtractOutput {
        attempted: active.len(),
        results,
        roster,
        failures,
    })
}

fn player_result(row: &PlayerGameLogRow, game_date: NaiveDate) -> PlayerResult {
    PlayerResult {
        season_id: row.season_id.clone(),
        player_id: row.player_id,
        game_id: coerce_game_id(&row.game_id),
        game_date,
        matchup: row.matchup.clone(),
        wl: row.wl.clone(),
        box_score: row.box_score.clone(),
        plus_minus: row.plus_minus,
        video_available: row.video_available,
    }
}
