// League setup and membership: creating leagues, joining teams, roster
// drops, season week advancement, and player reference data import.

use std::path::Path;

use tracing::info;

use crate::error::{CoreError, Result};
use crate::model::{
    DraftStatus, FantasyTeam, League, LeagueId, NewLeague, NflPlayer, PlayerId, TeamId, UserId,
    SUPPORTED_CAPACITIES,
};
use crate::store::LeagueStore;

/// Create a league with the draft `Scheduled` and the season at week 1.
pub async fn create_league<S: LeagueStore + ?Sized>(
    store: &S,
    new_league: &NewLeague,
) -> Result<League> {
    if new_league.name.trim().is_empty() {
        return Err(CoreError::Invalid("league name must not be empty".into()));
    }
    if !SUPPORTED_CAPACITIES.contains(&new_league.capacity) {
        return Err(CoreError::Invalid(format!(
            "capacity must be one of {:?}, got {}",
            SUPPORTED_CAPACITIES, new_league.capacity
        )));
    }
    if new_league.roster_slots.total() == 0 {
        return Err(CoreError::Invalid("roster must have at least one slot".into()));
    }

    let league = store.create_league(new_league).await?;
    info!(
        "League created: id={}, name={:?}, capacity={}, scoring={}",
        league.id,
        league.name,
        league.capacity,
        league.scoring_mode.as_str()
    );
    Ok(league)
}

/// Add a team owned by `user_id` to the end of the league's join order.
pub async fn join_league<S: LeagueStore + ?Sized>(
    store: &S,
    league_id: LeagueId,
    user_id: UserId,
    team_name: &str,
) -> Result<FantasyTeam> {
    let team_name = team_name.trim();
    if team_name.is_empty() {
        return Err(CoreError::Invalid("team name must not be empty".into()));
    }

    let league = store
        .get_league(league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;

    if league.draft_status != DraftStatus::Scheduled {
        return Err(CoreError::conflict("draft has already started"));
    }
    if store
        .get_team_for_user_in_league(user_id, league_id)
        .await?
        .is_some()
    {
        return Err(CoreError::conflict("you are already a member of this league"));
    }
    if league.is_full() {
        return Err(CoreError::conflict(format!(
            "league is full ({} of {} teams)",
            league.team_ids.len(),
            league.capacity
        )));
    }

    // The store re-checks capacity and membership inside its write.
    let team = store.create_team(league_id, user_id, team_name).await?;
    info!(
        "Team joined: league={}, team={}, owner={}, slot {} of {}",
        league_id,
        team.id,
        user_id,
        league.team_ids.len() + 1,
        league.capacity
    );
    Ok(team)
}

/// Release a player from a team's roster.
pub async fn drop_player<S: LeagueStore + ?Sized>(
    store: &S,
    team_id: TeamId,
    player_id: PlayerId,
) -> Result<FantasyTeam> {
    store
        .get_team(team_id)
        .await?
        .ok_or_else(|| CoreError::not_found("team not found"))?;

    if !store.remove_player_from_roster(team_id, player_id).await? {
        return Err(CoreError::not_found(format!(
            "player {player_id} is not on this roster"
        )));
    }
    info!("Player dropped: team={}, player={}", team_id, player_id);

    store
        .get_team(team_id)
        .await?
        .ok_or_else(|| CoreError::not_found("team not found"))
}

/// Move the league's current season week forward. Setting the current
/// week again is a no-op; moving backwards is a conflict.
pub async fn advance_week<S: LeagueStore + ?Sized>(
    store: &S,
    league_id: LeagueId,
    week: u32,
) -> Result<League> {
    if week == 0 {
        return Err(CoreError::Invalid("week numbers start at 1".into()));
    }
    let league = store
        .get_league(league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;
    if week < league.current_week {
        return Err(CoreError::conflict(format!(
            "league is already at week {}",
            league.current_week
        )));
    }

    store.set_current_week(league_id, week).await?;
    info!(
        "Week advanced: league={}, {} -> {}",
        league_id, league.current_week, week
    );
    Ok(League {
        current_week: week,
        ..league
    })
}

/// Parse a JSON array of players.
pub fn parse_players(json: &str) -> Result<Vec<NflPlayer>> {
    let players: Vec<NflPlayer> = serde_json::from_str(json)
        .map_err(|e| CoreError::Invalid(format!("malformed player data: {e}")))?;
    for p in &players {
        if p.name.trim().is_empty() {
            return Err(CoreError::Invalid(format!("player {} has no name", p.id)));
        }
        if !p.projected_points.is_finite() {
            return Err(CoreError::Invalid(format!(
                "player {} has non-numeric projected points",
                p.id
            )));
        }
    }
    Ok(players)
}

/// Load player reference data from a JSON file, upserting by id.
pub async fn import_players<S: LeagueStore + ?Sized>(store: &S, path: &Path) -> Result<usize> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Invalid(format!("cannot read player file {}: {e}", path.display()))
    })?;
    let players = parse_players(&json)?;
    let count = store.upsert_players(&players).await?;
    info!("Imported {} players from {}", count, path.display());
    Ok(count)
}
