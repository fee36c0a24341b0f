// Weekly lineup validation and persistence.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::model::{
    count_by_position, LeagueId, NflPlayer, PlayerId, Position, RosterSlots, TeamId,
    WeeklyLineup,
};
use crate::store::LeagueStore;

/// A single reason a proposed lineup is illegal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineupViolation {
    NotOnRoster { player_id: PlayerId },
    Duplicate { player_id: PlayerId },
    Unassigned { player_id: PlayerId },
    UnknownPlayer { player_id: PlayerId },
    PositionCount { position: Position, expected: u32, actual: u32 },
    FlexCount { expected: u32, actual: u32 },
    Unavailable { player_id: PlayerId, name: String, reason: String },
}

impl fmt::Display for LineupViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineupViolation::NotOnRoster { player_id } => {
                write!(f, "player {player_id} is not on this roster")
            }
            LineupViolation::Duplicate { player_id } => {
                write!(f, "player {player_id} is listed more than once")
            }
            LineupViolation::Unassigned { player_id } => {
                write!(f, "player {player_id} must be assigned to starters or bench")
            }
            LineupViolation::UnknownPlayer { player_id } => {
                write!(f, "player {player_id} has no player record")
            }
            LineupViolation::PositionCount { position, expected, actual } => {
                write!(f, "{position}: expected {expected} starter(s), got {actual}")
            }
            LineupViolation::FlexCount { expected, actual } => write!(
                f,
                "FLEX: expected {expected} extra RB/WR/TE starter(s), got {actual}"
            ),
            LineupViolation::Unavailable { name, reason, .. } => {
                write!(f, "{name} cannot start: {reason}")
            }
        }
    }
}

/// Result of validating a proposed lineup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineupCheck {
    pub is_valid: bool,
    pub violations: Vec<LineupViolation>,
}

impl LineupCheck {
    fn from_violations(violations: Vec<LineupViolation>) -> Self {
        LineupCheck {
            is_valid: violations.is_empty(),
            violations,
        }
    }
}

/// Check a starters/bench split against the roster and slot rules.
///
/// Every rule is evaluated and every violation collected, in this order:
/// roster membership, duplicates, unassigned roster players, position
/// counts (QB/RB/WR/TE/K/DEF then FLEX), starter availability.
/// `players` supplies position and status for the ids involved; ids
/// without a record are reported as `UnknownPlayer` when starting.
pub fn validate(
    starters: &[PlayerId],
    bench: &[PlayerId],
    roster: &BTreeSet<PlayerId>,
    slots: &RosterSlots,
    players: &[NflPlayer],
) -> LineupCheck {
    let mut violations = Vec::new();
    let combined: Vec<PlayerId> = starters.iter().chain(bench).copied().collect();

    // Roster membership, once per offending id.
    let mut reported = HashSet::new();
    for &id in &combined {
        if !roster.contains(&id) && reported.insert(id) {
            violations.push(LineupViolation::NotOnRoster { player_id: id });
        }
    }

    // Duplicates across starters and bench.
    let mut seen = HashSet::new();
    let mut duplicated = HashSet::new();
    for &id in &combined {
        if !seen.insert(id) && duplicated.insert(id) {
            violations.push(LineupViolation::Duplicate { player_id: id });
        }
    }

    // Every roster player must be placed somewhere.
    for &id in roster {
        if !seen.contains(&id) {
            violations.push(LineupViolation::Unassigned { player_id: id });
        }
    }

    let by_id: HashMap<PlayerId, &NflPlayer> = players.iter().map(|p| (p.id, p)).collect();
    let mut unique_starters = Vec::new();
    let mut starter_seen = HashSet::new();
    for &id in starters {
        if starter_seen.insert(id) {
            match by_id.get(&id) {
                Some(player) => unique_starters.push(*player),
                None => violations.push(LineupViolation::UnknownPlayer { player_id: id }),
            }
        }
    }

    violations.extend(position_violations(&unique_starters, slots));

    for player in &unique_starters {
        if let Some(reason) = player.status.start_blocker() {
            violations.push(LineupViolation::Unavailable {
                player_id: player.id,
                name: player.name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    LineupCheck::from_violations(violations)
}

/// Starter counts per position. RB/WR/TE may exceed their fixed counts only
/// by exactly the FLEX count in total; every other position must match.
fn position_violations(starters: &[&NflPlayer], slots: &RosterSlots) -> Vec<LineupViolation> {
    let counts = count_by_position(starters.iter().copied());
    let mut violations = Vec::new();
    let mut flex_used = 0;

    for pos in Position::ALL {
        let expected = slots.required(pos);
        let actual = counts.get(&pos).copied().unwrap_or(0);
        if slots.flex > 0 && pos.is_flex_eligible() {
            if actual < expected {
                violations.push(LineupViolation::PositionCount { position: pos, expected, actual });
            } else {
                flex_used += actual - expected;
            }
        } else if actual != expected {
            violations.push(LineupViolation::PositionCount { position: pos, expected, actual });
        }
    }

    if slots.flex > 0 && flex_used != slots.flex {
        violations.push(LineupViolation::FlexCount {
            expected: slots.flex,
            actual: flex_used,
        });
    }
    violations
}

/// A proposed lineup for one team and week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupRequest {
    pub team_id: TeamId,
    pub league_id: LeagueId,
    pub week: u32,
    pub starters: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
}

/// Load the team, league, and player records and validate without writing.
pub async fn check_lineup<S: LeagueStore + ?Sized>(
    store: &S,
    request: &LineupRequest,
) -> Result<LineupCheck> {
    if request.week == 0 {
        return Err(CoreError::Invalid("week numbers start at 1".to_string()));
    }

    let team = store
        .get_team(request.team_id)
        .await?
        .filter(|t| t.league_id == request.league_id)
        .ok_or_else(|| CoreError::not_found("team not found in league"))?;
    let league = store
        .get_league(request.league_id)
        .await?
        .ok_or_else(|| CoreError::not_found("league not found"))?;

    let ids: Vec<PlayerId> = team
        .roster
        .iter()
        .chain(&request.starters)
        .chain(&request.bench)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let players = store.get_players_by_ids(&ids).await?;

    Ok(validate(
        &request.starters,
        &request.bench,
        &team.roster,
        &league.roster_slots,
        &players,
    ))
}

/// Validate and upsert the lineup for `(team, week)`. Nothing is written
/// when any violation is found.
pub async fn save_lineup<S: LeagueStore + ?Sized>(
    store: &S,
    request: &LineupRequest,
) -> Result<WeeklyLineup> {
    let check = check_lineup(store, request).await?;
    if !check.is_valid {
        debug!(
            "Rejected lineup: team={}, week={}, {} violation(s)",
            request.team_id,
            request.week,
            check.violations.len()
        );
        return Err(CoreError::InvalidLineup(check.violations));
    }

    let lineup = WeeklyLineup {
        team_id: request.team_id,
        league_id: request.league_id,
        week: request.week,
        starters: request.starters.clone(),
        bench: request.bench.clone(),
        updated_at: Utc::now(),
    };
    let stored = store.upsert_weekly_lineup(&lineup).await?;
    info!(
        "Lineup saved: team={}, week={}, {} starters, {} bench",
        stored.team_id,
        stored.week,
        stored.starters.len(),
        stored.bench.len()
    );
    Ok(stored)
}
