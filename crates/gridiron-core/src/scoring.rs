// Weekly team scoring, matchup outcomes, and league standings.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::model::{FantasyTeam, LeagueId, PlayerId, Position, ScheduleMatchup, TeamId};
use crate::schedule::is_week_completed;
use crate::store::LeagueStore;

/// Round to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Team scores
// ---------------------------------------------------------------------------

/// One starter's contribution to a weekly score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerScore {
    pub player_id: PlayerId,
    pub name: String,
    pub position: Position,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamScore {
    pub team_id: TeamId,
    pub week: u32,
    /// Sum of starters' points, rounded to one decimal.
    pub total: f64,
    pub breakdown: Vec<PlayerScore>,
}

/// Score a team's saved lineup for `week`. Starters earn their projected
/// points; bench players earn nothing. Starters missing from the player
/// table contribute zero and are left out of the breakdown.
pub async fn team_score<S: LeagueStore + ?Sized>(
    store: &S,
    team_id: TeamId,
    week: u32,
) -> Result<TeamScore> {
    let lineup = store
        .get_weekly_lineup(team_id, week)
        .await?
        .ok_or_else(|| CoreError::not_found("no lineup found"))?;

    let players = store.get_players_by_ids(&lineup.starters).await?;
    let breakdown: Vec<PlayerScore> = players
        .into_iter()
        .map(|p| PlayerScore {
            player_id: p.id,
            name: p.name,
            position: p.position,
            points: p.projected_points,
        })
        .collect();
    let total = round1(breakdown.iter().map(|p| p.points).sum());

    debug!(
        "Scored team {} week {}: {:.1} from {} starters",
        team_id,
        week,
        total,
        breakdown.len()
    );
    Ok(TeamScore {
        team_id,
        week,
        total,
        breakdown,
    })
}

// ---------------------------------------------------------------------------
// Matchups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchResult {
    W,
    L,
    T,
}

/// Results for (team 1, team 2). Only exact equality ties.
pub fn matchup_outcome(score1: f64, score2: f64) -> (MatchResult, MatchResult) {
    if score1 > score2 {
        (MatchResult::W, MatchResult::L)
    } else if score2 > score1 {
        (MatchResult::L, MatchResult::W)
    } else {
        (MatchResult::T, MatchResult::T)
    }
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStanding {
    pub rank: u32,
    pub team_id: TeamId,
    pub team_name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
    pub points_against: f64,
    pub win_pct: f64,
}

impl TeamStanding {
    fn new(team: &FantasyTeam) -> Self {
        TeamStanding {
            rank: 0,
            team_id: team.id,
            team_name: team.name.clone(),
            wins: 0,
            losses: 0,
            ties: 0,
            points_for: 0.0,
            points_against: 0.0,
            win_pct: 0.0,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    fn record(&mut self, result: MatchResult, scored: f64, allowed: f64) {
        match result {
            MatchResult::W => self.wins += 1,
            MatchResult::L => self.losses += 1,
            MatchResult::T => self.ties += 1,
        }
        self.points_for += scored;
        self.points_against += allowed;
    }
}

/// How much lineup data backed the standings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// Every completed matchup was scored.
    Complete,
    /// Some matchups were skipped for missing lineups.
    Partial,
    /// Nothing could be scored; standings are all zeros.
    Incomplete,
}

/// A completed matchup left out of the standings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMatchup {
    pub week: u32,
    pub team1: TeamId,
    pub team2: TeamId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsReport {
    pub league_id: LeagueId,
    pub through_week: u32,
    pub standings: Vec<TeamStanding>,
    pub completeness: Completeness,
    pub games_scored: usize,
    pub skipped: Vec<SkippedMatchup>,
}

/// A scored game ready to fold into standings.
#[derive(Debug, Clone, Copy)]
pub struct GameResult {
    pub team1: TeamId,
    pub team2: TeamId,
    pub score1: f64,
    pub score2: f64,
}

/// Fold game results into ranked standings. `teams` must be in join order,
/// which breaks ties that survive win percentage and points-for. Games
/// naming a team outside `teams` are ignored.
pub fn rank_standings(teams: &[FantasyTeam], games: &[GameResult]) -> Vec<TeamStanding> {
    let mut rows: Vec<TeamStanding> = teams.iter().map(TeamStanding::new).collect();
    let index: HashMap<TeamId, usize> = teams.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

    for game in games {
        let (Some(&i1), Some(&i2)) = (index.get(&game.team1), index.get(&game.team2)) else {
            continue;
        };
        let (r1, r2) = matchup_outcome(game.score1, game.score2);
        rows[i1].record(r1, game.score1, game.score2);
        rows[i2].record(r2, game.score2, game.score1);
    }

    for row in &mut rows {
        row.points_for = round1(row.points_for);
        row.points_against = round1(row.points_against);
        let played = row.games_played();
        row.win_pct = if played == 0 {
            0.0
        } else {
            row.wins as f64 / played as f64
        };
    }

    // Stable sort keeps join order for full ties.
    rows.sort_by(|a, b| {
        b.win_pct
            .total_cmp(&a.win_pct)
            .then_with(|| b.points_for.total_cmp(&a.points_for))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
    rows
}

/// Standings through the league's current week. Matchups where either
/// side has no saved lineup are skipped and reported, never fatal.
pub async fn get_standings<S: LeagueStore + ?Sized>(
    store: &S,
    league_id: LeagueId,
) -> Result<StandingsReport> {
    let league = store
        .get_league(league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;
    let teams = store.get_teams_in_league(league_id).await?;
    if teams.is_empty() {
        return Err(CoreError::not_found("no teams found"));
    }

    let schedule = store.get_schedule(league_id).await?;
    let completed: Vec<&ScheduleMatchup> = schedule
        .iter()
        .filter(|m| is_week_completed(m.week, league.current_week))
        .collect();

    let mut scores: HashMap<(TeamId, u32), Option<f64>> = HashMap::new();
    let mut games = Vec::with_capacity(completed.len());
    let mut skipped = Vec::new();

    for m in completed {
        let s1 = cached_score(store, &mut scores, m.team1, m.week).await?;
        let s2 = cached_score(store, &mut scores, m.team2, m.week).await?;
        match (s1, s2) {
            (Some(score1), Some(score2)) => games.push(GameResult {
                team1: m.team1,
                team2: m.team2,
                score1,
                score2,
            }),
            _ => {
                let missing: Vec<String> = [(m.team1, s1), (m.team2, s2)]
                    .iter()
                    .filter(|(_, s)| s.is_none())
                    .map(|(t, _)| t.to_string())
                    .collect();
                let reason = format!("no lineup for team {}", missing.join(", "));
                warn!(
                    "Skipping week {} matchup {} vs {}: {}",
                    m.week, m.team1, m.team2, reason
                );
                skipped.push(SkippedMatchup {
                    week: m.week,
                    team1: m.team1,
                    team2: m.team2,
                    reason,
                });
            }
        }
    }

    let completeness = if games.is_empty() {
        Completeness::Incomplete
    } else if skipped.is_empty() {
        Completeness::Complete
    } else {
        Completeness::Partial
    };

    let standings = rank_standings(&teams, &games);
    info!(
        "Standings computed: league={}, through week {}, {} games scored, {} skipped",
        league_id,
        league.current_week,
        games.len(),
        skipped.len()
    );

    Ok(StandingsReport {
        league_id,
        through_week: league.current_week,
        standings,
        completeness,
        games_scored: games.len(),
        skipped,
    })
}

/// Score each (team, week) once. `None` means the lineup is missing; other
/// failures propagate.
async fn cached_score<S: LeagueStore + ?Sized>(
    store: &S,
    cache: &mut HashMap<(TeamId, u32), Option<f64>>,
    team_id: TeamId,
    week: u32,
) -> Result<Option<f64>> {
    if let Some(score) = cache.get(&(team_id, week)) {
        return Ok(*score);
    }
    let score = match team_score(store, team_id, week).await {
        Ok(s) => Some(s.total),
        Err(CoreError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };
    cache.insert((team_id, week), score);
    Ok(score)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
