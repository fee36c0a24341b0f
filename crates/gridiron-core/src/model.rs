// Domain records shared by the draft, lineup, scoring, and schedule engines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LeagueId = i64;
pub type TeamId = i64;
pub type UserId = i64;
pub type PlayerId = i64;
pub type DraftId = i64;

// ---------------------------------------------------------------------------
// Positions and player reference data
// ---------------------------------------------------------------------------

/// Football positions a player can be rostered and started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DEF")]
    Defense,
}

impl Position {
    /// Every starting position, in lineup display order.
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position abbreviation. Accepts "DST"/"D/ST" as aliases for DEF
    /// and "PK" for K.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" | "PK" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" => Some(Position::Defense),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
        }
    }

    /// Whether a starter at this position may fill a FLEX slot.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Weekly availability of an NFL player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Active,
    #[serde(rename = "Injured_Out")]
    InjuredOut,
    #[serde(rename = "Injured_Questionable")]
    InjuredQuestionable,
    Bye,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Active => "Active",
            PlayerStatus::InjuredOut => "Injured_Out",
            PlayerStatus::InjuredQuestionable => "Injured_Questionable",
            PlayerStatus::Bye => "Bye",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(PlayerStatus::Active),
            "Injured_Out" => Some(PlayerStatus::InjuredOut),
            "Injured_Questionable" => Some(PlayerStatus::InjuredQuestionable),
            "Bye" => Some(PlayerStatus::Bye),
            _ => None,
        }
    }

    /// Reason a player with this status cannot start, if any.
    pub fn start_blocker(&self) -> Option<&'static str> {
        match self {
            PlayerStatus::InjuredOut => Some("injured (out)"),
            PlayerStatus::Bye => Some("on a bye week"),
            PlayerStatus::Active | PlayerStatus::InjuredQuestionable => None,
        }
    }
}

/// Reference data for a single NFL player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NflPlayer {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    /// NFL team abbreviation (e.g. "KC").
    pub nfl_team: String,
    pub status: PlayerStatus,
    pub projected_points: f64,
}

// ---------------------------------------------------------------------------
// League configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    Standard,
    Ppr,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Standard => "standard",
            ScoringMode::Ppr => "ppr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Some(ScoringMode::Standard),
            "ppr" => Some(ScoringMode::Ppr),
            _ => None,
        }
    }
}

/// League sizes a league may be created with.
pub const SUPPORTED_CAPACITIES: [u32; 3] = [8, 10, 12];

/// Draft lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::InProgress => "in_progress",
            DraftStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(DraftStatus::Scheduled),
            "in_progress" => Some(DraftStatus::InProgress),
            "completed" => Some(DraftStatus::Completed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is the single allowed forward step.
    pub fn can_advance_to(&self, next: DraftStatus) -> bool {
        matches!(
            (self, next),
            (DraftStatus::Scheduled, DraftStatus::InProgress)
                | (DraftStatus::InProgress, DraftStatus::Completed)
        )
    }
}

/// Number of roster slots per position, plus FLEX and bench.
///
/// Deserializes from the uppercase keys used in config files
/// (`QB = 1`, `RB = 2`, ..., `BENCH = 6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSlots {
    #[serde(rename = "QB")]
    pub qb: u32,
    #[serde(rename = "RB")]
    pub rb: u32,
    #[serde(rename = "WR")]
    pub wr: u32,
    #[serde(rename = "TE")]
    pub te: u32,
    #[serde(rename = "K")]
    pub k: u32,
    #[serde(rename = "DEF")]
    pub def: u32,
    #[serde(rename = "FLEX", default)]
    pub flex: u32,
    #[serde(rename = "BENCH")]
    pub bench: u32,
}

impl Default for RosterSlots {
    fn default() -> Self {
        RosterSlots {
            qb: 1,
            rb: 2,
            wr: 2,
            te: 1,
            k: 1,
            def: 1,
            flex: 0,
            bench: 6,
        }
    }
}

impl RosterSlots {
    /// Fixed starter count for a position (FLEX excluded).
    pub fn required(&self, pos: Position) -> u32 {
        match pos {
            Position::Quarterback => self.qb,
            Position::RunningBack => self.rb,
            Position::WideReceiver => self.wr,
            Position::TightEnd => self.te,
            Position::Kicker => self.k,
            Position::Defense => self.def,
        }
    }

    /// Total starters per week, FLEX included.
    pub fn starters(&self) -> u32 {
        Position::ALL.iter().map(|&p| self.required(p)).sum::<u32>() + self.flex
    }

    /// Total roster size. This is also the number of draft rounds.
    pub fn total(&self) -> u32 {
        self.starters() + self.bench
    }
}

/// A fantasy league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub commissioner_id: UserId,
    pub capacity: u32,
    pub scoring_mode: ScoringMode,
    pub draft_status: DraftStatus,
    pub current_week: u32,
    /// Participating teams in join order.
    pub team_ids: Vec<TeamId>,
    pub roster_slots: RosterSlots,
}

impl League {
    pub fn is_full(&self) -> bool {
        self.team_ids.len() as u32 >= self.capacity
    }
}

/// Inputs for creating a league.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLeague {
    pub name: String,
    pub commissioner_id: UserId,
    pub capacity: u32,
    pub scoring_mode: ScoringMode,
    pub roster_slots: RosterSlots,
}

/// A team within a league and the players it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FantasyTeam {
    pub id: TeamId,
    pub league_id: LeagueId,
    pub owner_id: UserId,
    pub name: String,
    pub roster: BTreeSet<PlayerId>,
}

// ---------------------------------------------------------------------------
// Draft records
// ---------------------------------------------------------------------------

/// One slot in the draft order. `player_id` stays `None` until the pick is made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    /// 1-based, contiguous across the whole draft.
    pub pick_number: u32,
    pub round: u32,
    pub team_id: TeamId,
    pub player_id: Option<PlayerId>,
    pub picked_at: Option<DateTime<Utc>>,
}

impl DraftPick {
    pub fn is_made(&self) -> bool {
        self.player_id.is_some()
    }
}

/// Persisted state of a league's draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    pub id: DraftId,
    pub league_id: LeagueId,
    /// All picks ordered by pick number, made and pending.
    pub picks: Vec<DraftPick>,
    /// Pick number of the next pick to be made. Exceeds the last pick once
    /// the draft is complete.
    pub current_pick: u32,
    pub is_complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DraftState {
    /// The pick the pointer is on, or `None` once the draft is complete.
    pub fn current(&self) -> Option<&DraftPick> {
        if self.is_complete {
            return None;
        }
        self.picks.iter().find(|p| p.pick_number == self.current_pick)
    }

    pub fn total_picks(&self) -> u32 {
        self.picks.len() as u32
    }

    /// Whether the player has already been taken in this draft.
    pub fn is_drafted(&self, player_id: PlayerId) -> bool {
        self.picks.iter().any(|p| p.player_id == Some(player_id))
    }
}

// ---------------------------------------------------------------------------
// Lineups and schedule
// ---------------------------------------------------------------------------

/// A team's starter/bench split for one week. At most one per (team, week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyLineup {
    pub team_id: TeamId,
    pub league_id: LeagueId,
    pub week: u32,
    pub starters: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
    pub updated_at: DateTime<Utc>,
}

/// One head-to-head game in a league's season schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMatchup {
    pub week: u32,
    pub team1: TeamId,
    pub team2: TeamId,
}

impl ScheduleMatchup {
    pub fn involves(&self, team_id: TeamId) -> bool {
        self.team1 == team_id || self.team2 == team_id
    }
}

/// Per-position starter counts, keyed in display order.
pub fn count_by_position<'a>(players: impl IntoIterator<Item = &'a NflPlayer>) -> BTreeMap<Position, u32> {
    let mut counts = BTreeMap::new();
    for player in players {
        *counts.entry(player.position).or_insert(0) += 1;
    }
    counts
}
