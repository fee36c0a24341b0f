// Round-robin season schedule generation.

use tracing::info;

use crate::error::{CoreError, Result};
use crate::model::{LeagueId, ScheduleMatchup, TeamId};
use crate::store::LeagueStore;

/// Generate a round-robin schedule using the circle method.
///
/// Team 0 stays fixed while the rest rotate one place each week; each week
/// pairs the first half of the rotation against the reversed second half.
/// An odd team count gets a bye placeholder, and bye pairings are dropped.
/// Returns `n - 1` weeks for even `n` and `n` weeks for odd `n`; every
/// unordered pair meets exactly once.
pub fn generate_schedule(teams: &[TeamId]) -> Vec<ScheduleMatchup> {
    if teams.len() < 2 {
        return Vec::new();
    }

    let mut rotation: Vec<Option<TeamId>> = teams.iter().copied().map(Some).collect();
    if rotation.len() % 2 == 1 {
        rotation.push(None);
    }
    let n = rotation.len();
    let weeks = n - 1;

    let mut matchups = Vec::with_capacity(weeks * n / 2);
    for week in 1..=weeks as u32 {
        for i in 0..n / 2 {
            if let (Some(team1), Some(team2)) = (rotation[i], rotation[n - 1 - i]) {
                matchups.push(ScheduleMatchup { week, team1, team2 });
            }
        }
        rotation[1..].rotate_right(1);
    }
    matchups
}

/// Number of weeks a schedule for `num_teams` teams spans.
pub fn weeks_for(num_teams: usize) -> u32 {
    match num_teams {
        0 | 1 => 0,
        n if n % 2 == 0 => (n - 1) as u32,
        n => n as u32,
    }
}

/// Whether games in `week` have been played.
pub fn is_week_completed(week: u32, current_week: u32) -> bool {
    week <= current_week
}

/// Generate and persist the league's schedule from its join order. A
/// league's schedule is written once and never regenerated.
pub async fn create_schedule<S: LeagueStore + ?Sized>(
    store: &S,
    league_id: LeagueId,
) -> Result<Vec<ScheduleMatchup>> {
    let league = store
        .get_league(league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;

    if league.team_ids.len() < 2 {
        return Err(CoreError::Invalid(format!(
            "a schedule needs at least 2 teams, league has {}",
            league.team_ids.len()
        )));
    }
    if !store.get_schedule(league_id).await?.is_empty() {
        return Err(CoreError::conflict("league already has a schedule"));
    }

    let matchups = generate_schedule(&league.team_ids);
    store.save_schedule(league_id, &matchups).await?;
    info!(
        "Schedule created: league={}, {} weeks, {} matchups",
        league_id,
        weeks_for(league.team_ids.len()),
        matchups.len()
    );
    Ok(matchups)
}

/// The league's persisted schedule, ordered by week.
pub async fn get_schedule<S: LeagueStore + ?Sized>(
    store: &S,
    league_id: LeagueId,
) -> Result<Vec<ScheduleMatchup>> {
    store
        .get_league(league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;
    Ok(store.get_schedule(league_id).await?)
}
