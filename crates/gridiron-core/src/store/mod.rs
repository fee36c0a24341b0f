// Persistence seam consumed by the engines.

pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{
    DraftId, DraftPick, DraftState, FantasyTeam, League, LeagueId, NewLeague, NflPlayer,
    PlayerId, ScheduleMatchup, TeamId, UserId, WeeklyLineup,
};

pub use sqlite::SqliteStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything needed to accept one draft pick in a single atomic write.
#[derive(Debug, Clone)]
pub struct PickCommit {
    pub draft_id: DraftId,
    pub league_id: LeagueId,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    /// The pointer value the pick was validated against. The write fails
    /// with `StoreError::Stale` if the stored pointer has moved on.
    pub pick_number: u32,
    /// Set when this is the last pick of the draft.
    pub completes_draft: bool,
    pub picked_at: DateTime<Utc>,
}

/// Data access for leagues, teams, rosters, players, drafts, lineups, and
/// schedules. Implementations must be safe to share across request tasks.
#[async_trait]
pub trait LeagueStore: Send + Sync {
    // -- leagues ------------------------------------------------------------

    async fn create_league(&self, league: &NewLeague) -> StoreResult<League>;

    async fn get_league(&self, league_id: LeagueId) -> StoreResult<Option<League>>;

    async fn set_current_week(&self, league_id: LeagueId, week: u32) -> StoreResult<()>;

    // -- teams and rosters --------------------------------------------------

    /// Add a team to the league's join order. Fails with `Stale` if the
    /// league filled up or the user already owns a team there.
    async fn create_team(
        &self,
        league_id: LeagueId,
        owner_id: UserId,
        name: &str,
    ) -> StoreResult<FantasyTeam>;

    async fn get_team(&self, team_id: TeamId) -> StoreResult<Option<FantasyTeam>>;

    /// Teams in join order.
    async fn get_teams_in_league(&self, league_id: LeagueId) -> StoreResult<Vec<FantasyTeam>>;

    async fn get_team_for_user_in_league(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> StoreResult<Option<FantasyTeam>>;

    /// Every player rostered by any team in the league.
    async fn get_owned_player_ids(&self, league_id: LeagueId) -> StoreResult<HashSet<PlayerId>>;

    /// Fails with `Stale` if another team in the league already owns the player.
    async fn add_player_to_roster(&self, team_id: TeamId, player_id: PlayerId) -> StoreResult<()>;

    /// Returns `false` if the player was not on the roster.
    async fn remove_player_from_roster(
        &self,
        team_id: TeamId,
        player_id: PlayerId,
    ) -> StoreResult<bool>;

    // -- players ------------------------------------------------------------

    async fn upsert_players(&self, players: &[NflPlayer]) -> StoreResult<usize>;

    async fn get_player_by_id(&self, player_id: PlayerId) -> StoreResult<Option<NflPlayer>>;

    /// Unknown ids are silently skipped.
    async fn get_players_by_ids(&self, player_ids: &[PlayerId]) -> StoreResult<Vec<NflPlayer>>;

    // -- drafts -------------------------------------------------------------

    async fn get_draft_state(&self, league_id: LeagueId) -> StoreResult<Option<DraftState>>;

    /// Persist a fresh draft with its full pick order and move the league
    /// from `Scheduled` to `InProgress`. Fails with `Stale` if the league is
    /// no longer `Scheduled`.
    async fn create_draft_state(
        &self,
        league_id: LeagueId,
        picks: &[DraftPick],
    ) -> StoreResult<DraftState>;

    /// Fill a pending pick. Fails with `Stale` if the pick was already made
    /// or the player is taken elsewhere in the draft.
    async fn record_pick(
        &self,
        draft_id: DraftId,
        pick_number: u32,
        player_id: PlayerId,
    ) -> StoreResult<DraftPick>;

    /// Move the pointer forward by one, returning the new pointer.
    async fn advance_pointer(&self, draft_id: DraftId) -> StoreResult<u32>;

    /// Set the completion flag and move the league to `Completed`.
    async fn mark_complete(&self, draft_id: DraftId) -> StoreResult<()>;

    /// Record the pick, roster the player, advance the pointer, and complete
    /// the draft if requested, all or nothing.
    async fn commit_pick(&self, commit: &PickCommit) -> StoreResult<DraftPick>;

    // -- lineups ------------------------------------------------------------

    async fn get_weekly_lineup(
        &self,
        team_id: TeamId,
        week: u32,
    ) -> StoreResult<Option<WeeklyLineup>>;

    /// Insert or overwrite the lineup for `(team_id, week)`.
    async fn upsert_weekly_lineup(&self, lineup: &WeeklyLineup) -> StoreResult<WeeklyLineup>;

    // -- schedule -----------------------------------------------------------

    /// Matchups ordered by week.
    async fn get_schedule(&self, league_id: LeagueId) -> StoreResult<Vec<ScheduleMatchup>>;

    /// Fails with `Stale` if the league already has a schedule.
    async fn save_schedule(
        &self,
        league_id: LeagueId,
        matchups: &[ScheduleMatchup],
    ) -> StoreResult<()>;
}
