// Snake draft state machine: start, pick, and status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::order::snake_order;
use crate::error::{CoreError, Result};
use crate::model::{
    DraftPick, DraftState, DraftStatus, LeagueId, NflPlayer, PlayerId, TeamId, UserId,
};
use crate::store::{LeagueStore, PickCommit};

/// Outcome of checking whether a league's draft can start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftReadiness {
    pub ready: bool,
    /// Every failed precondition, in check order.
    pub problems: Vec<String>,
}

/// Where the pointer currently sits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub current_pick: Option<u32>,
    pub current_round: Option<u32>,
    pub current_team_id: Option<TeamId>,
    pub picks_made: u32,
    pub total_picks: u32,
    pub is_complete: bool,
}

impl DraftSummary {
    fn of(state: &DraftState) -> Self {
        let current = state.current();
        DraftSummary {
            current_pick: current.map(|p| p.pick_number),
            current_round: current.map(|p| p.round),
            current_team_id: current.map(|p| p.team_id),
            picks_made: state.picks.iter().filter(|p| p.is_made()).count() as u32,
            total_picks: state.total_picks(),
            is_complete: state.is_complete,
        }
    }

    fn not_started() -> Self {
        DraftSummary {
            current_pick: None,
            current_round: None,
            current_team_id: None,
            picks_made: 0,
            total_picks: 0,
            is_complete: false,
        }
    }
}

/// Read-only view of a league's draft.
#[derive(Debug, Clone, Serialize)]
pub struct DraftStatusView {
    pub league_id: LeagueId,
    pub draft_status: DraftStatus,
    pub summary: DraftSummary,
    /// The requesting user's team, when a user was given and has one.
    pub my_team_id: Option<TeamId>,
    pub is_my_turn: Option<bool>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Full pick history, made and pending.
    pub picks: Vec<DraftPick>,
}

/// Result of an accepted pick.
#[derive(Debug, Clone, Serialize)]
pub struct PickOutcome {
    pub pick: DraftPick,
    pub player: NflPlayer,
    pub summary: DraftSummary,
}

/// One async mutex per league so pick acceptance is serialized per draft.
/// An entry lives until that league's draft completes; unknown league ids
/// are released on the failed lookup.
#[derive(Default)]
struct DraftLocks {
    inner: Mutex<HashMap<LeagueId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DraftLocks {
    fn for_league(&self, league_id: LeagueId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(league_id).or_default().clone()
    }

    /// Drop a finished draft's mutex. Late callers still holding a clone
    /// find the draft complete and are rejected by the state check.
    fn release(&self, league_id: LeagueId) {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&league_id);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Runs drafts against a shared store. Construct once per process.
pub struct DraftEngine<S: LeagueStore + ?Sized> {
    store: Arc<S>,
    locks: DraftLocks,
}

impl<S: LeagueStore + ?Sized> DraftEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        DraftEngine {
            store,
            locks: DraftLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Check every precondition for starting the draft without changing
    /// anything.
    pub async fn validate_draft_start(&self, league_id: LeagueId) -> Result<DraftReadiness> {
        let league = self
            .store
            .get_league(league_id)
            .await?
            .ok_or_else(|| CoreError::not_found("league not found"))?;

        let mut problems = Vec::new();
        if !league.draft_status.can_advance_to(DraftStatus::InProgress) {
            let state = match league.draft_status {
                DraftStatus::InProgress => "in progress",
                _ => "completed",
            };
            problems.push(format!("draft already {state}"));
        }
        let joined = league.team_ids.len() as u32;
        if joined != league.capacity {
            problems.push(format!(
                "league not full ({joined} of {} teams)",
                league.capacity
            ));
        }
        if league.roster_slots.total() == 0 {
            problems.push("roster has no slots to draft".to_string());
        }

        Ok(DraftReadiness {
            ready: problems.is_empty(),
            problems,
        })
    }

    /// Generate the snake order and move the league's draft to `InProgress`.
    pub async fn start_draft(&self, league_id: LeagueId) -> Result<DraftStatusView> {
        let lock = self.locks.for_league(league_id);
        let _guard = lock.lock().await;

        let Some(league) = self.store.get_league(league_id).await? else {
            self.locks.release(league_id);
            return Err(CoreError::not_found("league not found"));
        };
        let readiness = self.validate_draft_start(league_id).await?;
        if !readiness.ready {
            if league.draft_status == DraftStatus::Completed {
                self.locks.release(league_id);
            }
            return Err(CoreError::conflict(readiness.problems.join("; ")));
        }

        let rounds = league.roster_slots.total();
        let order = snake_order(&league.team_ids, rounds);
        let state = self.store.create_draft_state(league_id, &order).await?;

        info!(
            "Draft started: league={}, {} teams, {} rounds, {} picks",
            league_id,
            league.team_ids.len(),
            rounds,
            state.total_picks()
        );

        Ok(DraftStatusView {
            league_id,
            draft_status: DraftStatus::InProgress,
            summary: DraftSummary::of(&state),
            my_team_id: None,
            is_my_turn: None,
            completed_at: None,
            picks: state.picks,
        })
    }

    /// Accept a pick from `user_id`. Checks run in a fixed order and the
    /// first failure wins; nothing is written unless every check passes.
    pub async fn make_pick(
        &self,
        league_id: LeagueId,
        user_id: UserId,
        player_id: PlayerId,
    ) -> Result<PickOutcome> {
        let lock = self.locks.for_league(league_id);
        let _guard = lock.lock().await;

        // State is read under the lock so the turn check sees the latest pointer.
        if self.store.get_league(league_id).await?.is_none() {
            self.locks.release(league_id);
            return Err(CoreError::not_found("league not found"));
        }
        let state = self
            .store
            .get_draft_state(league_id)
            .await?
            .ok_or_else(|| CoreError::not_found("draft not found"))?;

        if state.is_complete {
            self.locks.release(league_id);
            return Err(CoreError::conflict("draft is already complete"));
        }

        let team = self
            .store
            .get_team_for_user_in_league(user_id, league_id)
            .await?
            .ok_or_else(|| CoreError::forbidden("you are not part of this league"))?;

        let current = state
            .current()
            .cloned()
            .ok_or_else(|| CoreError::conflict("draft is already complete"))?;
        if current.team_id != team.id {
            debug!(
                "Rejected out-of-turn pick: league={}, team={}, on_clock={}",
                league_id, team.id, current.team_id
            );
            return Err(CoreError::forbidden("it is not your turn"));
        }

        let player = self
            .store
            .get_player_by_id(player_id)
            .await?
            .ok_or_else(|| CoreError::not_found("player not found"))?;

        if state.is_drafted(player_id)
            || self
                .store
                .get_owned_player_ids(league_id)
                .await?
                .contains(&player_id)
        {
            return Err(CoreError::conflict(format!(
                "{} has already been drafted",
                player.name
            )));
        }

        let completes_draft = current.pick_number >= state.total_picks();
        let commit = PickCommit {
            draft_id: state.id,
            league_id,
            team_id: team.id,
            player_id,
            pick_number: current.pick_number,
            completes_draft,
            picked_at: Utc::now(),
        };
        let pick = self.store.commit_pick(&commit).await?;

        info!(
            "Pick {} (round {}): league={}, team={} took {} ({})",
            pick.pick_number, pick.round, league_id, team.id, player.name, player.position
        );
        if completes_draft {
            info!("Draft completed: league={}", league_id);
            self.locks.release(league_id);
        }

        let updated = self
            .store
            .get_draft_state(league_id)
            .await?
            .ok_or_else(|| CoreError::not_found("draft not found"))?;

        Ok(PickOutcome {
            pick,
            player,
            summary: DraftSummary::of(&updated),
        })
    }

    /// Current pointer, full pick history, and completion. When `user_id` is
    /// given the view also says whether it is that user's turn.
    pub async fn draft_status(
        &self,
        league_id: LeagueId,
        user_id: Option<UserId>,
    ) -> Result<DraftStatusView> {
        let league = self
            .store
            .get_league(league_id)
            .await?
            .ok_or_else(|| CoreError::not_found("league not found"))?;

        let my_team_id = match user_id {
            Some(user_id) => self
                .store
                .get_team_for_user_in_league(user_id, league_id)
                .await?
                .map(|t| t.id),
            None => None,
        };

        let Some(state) = self.store.get_draft_state(league_id).await? else {
            return Ok(DraftStatusView {
                league_id,
                draft_status: league.draft_status,
                summary: DraftSummary::not_started(),
                my_team_id,
                is_my_turn: user_id.map(|_| false),
                completed_at: None,
                picks: Vec::new(),
            });
        };

        let summary = DraftSummary::of(&state);
        let is_my_turn = user_id.map(|_| {
            my_team_id.is_some() && summary.current_team_id == my_team_id
        });

        Ok(DraftStatusView {
            league_id,
            draft_status: league.draft_status,
            summary,
            my_team_id,
            is_my_turn,
            completed_at: state.completed_at,
            picks: state.picks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewLeague, NflPlayer, PlayerStatus, Position, RosterSlots, ScoringMode};
    use crate::store::SqliteStore;

    /// Tiny roster so full drafts stay short: 2 rounds.
    fn two_round_slots() -> RosterSlots {
        RosterSlots {
            qb: 1,
            rb: 0,
            wr: 0,
            te: 0,
            k: 0,
            def: 0,
            flex: 0,
            bench: 1,
        }
    }

    /// Helper: an 8-team league (users 1..=8) with `players` players seeded.
    async fn full_league(slots: RosterSlots, players: i64) -> (DraftEngine<SqliteStore>, LeagueId) {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        let league = store
            .create_league(&NewLeague {
                name: "Test".into(),
                commissioner_id: 1,
                capacity: 8,
                scoring_mode: ScoringMode::Standard,
                roster_slots: slots,
            })
            .await
            .unwrap();
        for user in 1..=8 {
            store
                .create_team(league.id, user, &format!("Team {user}"))
                .await
                .unwrap();
        }
        let pool: Vec<NflPlayer> = (1..=players)
            .map(|id| NflPlayer {
                id,
                name: format!("Player {id}"),
                position: Position::Quarterback,
                nfl_team: "BUF".into(),
                status: PlayerStatus::Active,
                projected_points: 15.0,
            })
            .collect();
        store.upsert_players(&pool).await.unwrap();
        (DraftEngine::new(store), league.id)
    }

    /// User who owns the team on the clock.
    async fn user_on_clock(engine: &DraftEngine<SqliteStore>, league_id: LeagueId) -> UserId {
        let view = engine.draft_status(league_id, None).await.unwrap();
        let team_id = view.summary.current_team_id.expect("draft should be live");
        engine.store().get_team(team_id).await.unwrap().unwrap().owner_id
    }

    #[tokio::test]
    async fn validate_reports_league_not_full() {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        let league = store
            .create_league(&NewLeague {
                name: "Half".into(),
                commissioner_id: 1,
                capacity: 10,
                scoring_mode: ScoringMode::Ppr,
                roster_slots: RosterSlots::default(),
            })
            .await
            .unwrap();
        store.create_team(league.id, 1, "Only").await.unwrap();
        let engine = DraftEngine::new(store);

        let readiness = engine.validate_draft_start(league.id).await.unwrap();
        assert!(!readiness.ready);
        assert_eq!(readiness.problems, vec!["league not full (1 of 10 teams)"]);

        let err = engine.start_draft(league.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref m) if m.contains("league not full")));
    }

    #[tokio::test]
    async fn start_draft_builds_rounds_from_roster_total() {
        let (engine, league_id) = full_league(RosterSlots::default(), 0).await;
        let view = engine.start_draft(league_id).await.unwrap();
        assert_eq!(view.draft_status, DraftStatus::InProgress);
        assert_eq!(view.picks.len(), 8 * 14);
        assert_eq!(view.summary.current_pick, Some(1));
        assert_eq!(view.summary.current_round, Some(1));

        let err = engine.start_draft(league_id).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_league_is_not_found() {
        let (engine, _) = full_league(two_round_slots(), 0).await;
        let err = engine.make_pick(999, 1, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(ref m) if m == "league not found"));
    }

    #[tokio::test]
    async fn pick_before_start_is_not_found() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        let err = engine.make_pick(league_id, 1, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(ref m) if m == "draft not found"));
    }

    #[tokio::test]
    async fn outsider_is_forbidden() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        engine.start_draft(league_id).await.unwrap();
        let err = engine.make_pick(league_id, 4242, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(ref m) if m.contains("not part of this league")));
    }

    #[tokio::test]
    async fn out_of_turn_is_forbidden() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        engine.start_draft(league_id).await.unwrap();
        let on_clock = user_on_clock(&engine, league_id).await;
        let someone_else = if on_clock == 1 { 2 } else { 1 };

        let err = engine.make_pick(league_id, someone_else, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(ref m) if m.contains("not your turn")));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        engine.start_draft(league_id).await.unwrap();
        let user = user_on_clock(&engine, league_id).await;
        let err = engine.make_pick(league_id, user, 777).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(ref m) if m == "player not found"));
    }

    #[tokio::test]
    async fn drafted_player_is_conflict() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        engine.start_draft(league_id).await.unwrap();
        let first = user_on_clock(&engine, league_id).await;
        engine.make_pick(league_id, first, 1).await.unwrap();

        let second = user_on_clock(&engine, league_id).await;
        let err = engine.make_pick(league_id, second, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref m) if m.contains("already been drafted")));

        // Rejected pick left the pointer where it was.
        let view = engine.draft_status(league_id, None).await.unwrap();
        assert_eq!(view.summary.current_pick, Some(2));
    }

    #[tokio::test]
    async fn full_draft_advances_one_pick_at_a_time_and_completes() {
        let (engine, league_id) = full_league(two_round_slots(), 16).await;
        engine.start_draft(league_id).await.unwrap();

        for expected in 1..=16u32 {
            let user = user_on_clock(&engine, league_id).await;
            let outcome = engine
                .make_pick(league_id, user, expected as PlayerId)
                .await
                .unwrap();
            assert_eq!(outcome.pick.pick_number, expected);
            assert_eq!(outcome.summary.picks_made, expected);
            assert_eq!(outcome.summary.is_complete, expected == 16);
            if expected < 16 {
                assert_eq!(outcome.summary.current_pick, Some(expected + 1));
            } else {
                assert_eq!(outcome.summary.current_pick, None);
            }
        }

        let view = engine.draft_status(league_id, Some(1)).await.unwrap();
        assert_eq!(view.draft_status, DraftStatus::Completed);
        assert!(view.completed_at.is_some());
        assert_eq!(view.is_my_turn, Some(false));
        assert!(view.picks.iter().all(|p| p.is_made()));

        let err = engine.make_pick(league_id, 1, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref m) if m.contains("already complete")));
        assert_eq!(engine.locks.tracked(), 0);

        // Every team rostered exactly two players.
        for team in engine.store().get_teams_in_league(league_id).await.unwrap() {
            assert_eq!(team.roster.len(), 2);
        }
    }

    #[tokio::test]
    async fn validate_rejects_started_and_finished_drafts() {
        let (engine, league_id) = full_league(two_round_slots(), 16).await;
        assert!(engine.validate_draft_start(league_id).await.unwrap().ready);

        engine.start_draft(league_id).await.unwrap();
        let readiness = engine.validate_draft_start(league_id).await.unwrap();
        assert!(!readiness.ready);
        assert_eq!(readiness.problems, vec!["draft already in progress"]);
        assert_eq!(engine.locks.tracked(), 1);

        for player in 1..=16 {
            let user = user_on_clock(&engine, league_id).await;
            engine.make_pick(league_id, user, player).await.unwrap();
        }
        let readiness = engine.validate_draft_start(league_id).await.unwrap();
        assert_eq!(readiness.problems, vec!["draft already completed"]);
        assert_eq!(engine.locks.tracked(), 0);

        let err = engine.start_draft(league_id).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref m) if m == "draft already completed"));
        assert_eq!(engine.locks.tracked(), 0);
    }

    #[tokio::test]
    async fn unknown_league_leaves_no_lock_behind() {
        let (engine, _) = full_league(two_round_slots(), 0).await;
        assert!(matches!(engine.start_draft(999).await, Err(CoreError::NotFound(_))));
        assert!(matches!(engine.make_pick(999, 1, 1).await, Err(CoreError::NotFound(_))));
        assert_eq!(engine.locks.tracked(), 0);
    }

    #[tokio::test]
    async fn status_annotates_my_turn() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;

        let before = engine.draft_status(league_id, Some(1)).await.unwrap();
        assert_eq!(before.draft_status, DraftStatus::Scheduled);
        assert!(before.picks.is_empty());
        assert_eq!(before.is_my_turn, Some(false));

        engine.start_draft(league_id).await.unwrap();
        let on_clock = user_on_clock(&engine, league_id).await;
        let mine = engine.draft_status(league_id, Some(on_clock)).await.unwrap();
        assert_eq!(mine.is_my_turn, Some(true));
        assert!(mine.my_team_id.is_some());

        let anonymous = engine.draft_status(league_id, None).await.unwrap();
        assert_eq!(anonymous.is_my_turn, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_picks_accept_exactly_one() {
        let (engine, league_id) = full_league(two_round_slots(), 4).await;
        engine.start_draft(league_id).await.unwrap();
        let user = user_on_clock(&engine, league_id).await;
        let engine = Arc::new(engine);

        let a = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.make_pick(league_id, user, 1).await })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.make_pick(league_id, user, 2).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(
            matches!(loser, CoreError::Forbidden(_) | CoreError::Conflict(_)),
            "unexpected loser error: {loser:?}"
        );

        let view = engine.draft_status(league_id, None).await.unwrap();
        assert_eq!(view.summary.picks_made, 1);
        assert_eq!(view.summary.current_pick, Some(2));
    }
}
