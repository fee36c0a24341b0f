// Snake draft order generation.

use crate::model::{DraftPick, TeamId};

/// Round (1-based) that pick `pick_number` falls in for a draft of
/// `num_teams` teams.
pub fn round_of(pick_number: u32, num_teams: u32) -> u32 {
    if num_teams == 0 {
        return 0;
    }
    (pick_number + num_teams - 1) / num_teams
}

/// Team on the clock for `pick_number`. Odd rounds run in join order, even
/// rounds run in reverse.
pub fn team_for_pick(pick_number: u32, teams: &[TeamId]) -> Option<TeamId> {
    if teams.is_empty() || pick_number == 0 {
        return None;
    }
    let n = teams.len() as u32;
    let round = round_of(pick_number, n);
    let offset = ((pick_number - 1) % n) as usize;
    let idx = if round % 2 == 1 {
        offset
    } else {
        teams.len() - 1 - offset
    };
    teams.get(idx).copied()
}

/// Every pick of a `rounds`-round snake draft, all pending.
pub fn snake_order(teams: &[TeamId], rounds: u32) -> Vec<DraftPick> {
    let n = teams.len() as u32;
    (1..=rounds * n)
        .filter_map(|pick_number| {
            team_for_pick(pick_number, teams).map(|team_id| DraftPick {
                pick_number,
                round: round_of(pick_number, n),
                team_id,
                player_id: None,
                picked_at: None,
            })
        })
        .collect()
}
