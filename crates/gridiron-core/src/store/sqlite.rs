// SQLite persistence layer for leagues, rosters, drafts, lineups, and schedules.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{LeagueStore, PickCommit, StoreResult};
use crate::error::StoreError;
use crate::model::{
    DraftId, DraftPick, DraftState, DraftStatus, FantasyTeam, League, LeagueId, NewLeague,
    NflPlayer, PlayerId, PlayerStatus, Position, RosterSlots, ScheduleMatchup, ScoringMode,
    TeamId, UserId, WeeklyLineup,
};

/// SQLite-backed `LeagueStore`. A single connection guarded by a mutex; every
/// multi-statement write runs inside a transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leagues (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL,
                commissioner_id INTEGER NOT NULL,
                capacity       INTEGER NOT NULL,
                scoring_mode   TEXT NOT NULL,
                draft_status   TEXT NOT NULL DEFAULT 'scheduled',
                current_week   INTEGER NOT NULL DEFAULT 1,
                roster_slots   TEXT NOT NULL,
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS teams (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id  INTEGER NOT NULL REFERENCES leagues(id),
                owner_id   INTEGER NOT NULL,
                name       TEXT NOT NULL,
                join_order INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(league_id, owner_id),
                UNIQUE(league_id, join_order)
            );

            CREATE TABLE IF NOT EXISTS players (
                id               INTEGER PRIMARY KEY,
                name             TEXT NOT NULL,
                position         TEXT NOT NULL,
                nfl_team         TEXT NOT NULL,
                status           TEXT NOT NULL,
                projected_points REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS roster_entries (
                team_id   INTEGER NOT NULL REFERENCES teams(id),
                league_id INTEGER NOT NULL REFERENCES leagues(id),
                player_id INTEGER NOT NULL REFERENCES players(id),
                added_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (team_id, player_id),
                UNIQUE(league_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS draft_states (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id    INTEGER NOT NULL UNIQUE REFERENCES leagues(id),
                current_pick INTEGER NOT NULL DEFAULT 1,
                is_complete  INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                draft_id    INTEGER NOT NULL REFERENCES draft_states(id),
                pick_number INTEGER NOT NULL,
                round       INTEGER NOT NULL,
                team_id     INTEGER NOT NULL REFERENCES teams(id),
                player_id   INTEGER REFERENCES players(id),
                picked_at   TEXT,
                PRIMARY KEY (draft_id, pick_number),
                UNIQUE(draft_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS weekly_lineups (
                team_id    INTEGER NOT NULL REFERENCES teams(id),
                week       INTEGER NOT NULL,
                league_id  INTEGER NOT NULL REFERENCES leagues(id),
                starters   TEXT NOT NULL,
                bench      TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (team_id, week)
            );

            CREATE TABLE IF NOT EXISTS schedule_matchups (
                league_id INTEGER NOT NULL REFERENCES leagues(id),
                week      INTEGER NOT NULL,
                team1     INTEGER NOT NULL REFERENCES teams(id),
                team2     INTEGER NOT NULL REFERENCES teams(id),
                PRIMARY KEY (league_id, week, team1)
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_roster_entries_league ON roster_entries(league_id);",
        )
        .context("failed to create roster index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }
}

// ---------------------------------------------------------------------------
// Row helpers (usable on a plain connection or inside a transaction)
// ---------------------------------------------------------------------------

fn to_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid timestamp {raw:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Map a failed write: constraint violations become `Stale(message)`,
/// everything else is a backend error with `context`.
fn write_error(err: rusqlite::Error, stale: &str, context: &'static str) -> StoreError {
    if is_constraint_violation(&err) {
        StoreError::Stale(stale.to_string())
    } else {
        StoreError::Backend(anyhow::Error::new(err).context(context))
    }
}

fn load_league(conn: &Connection, league_id: LeagueId) -> anyhow::Result<Option<League>> {
    let row = conn
        .query_row(
            "SELECT id, name, commissioner_id, capacity, scoring_mode, draft_status,
                    current_week, roster_slots
             FROM leagues WHERE id = ?1",
            params![league_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()
        .context("failed to query league")?;

    let Some((id, name, commissioner_id, capacity, scoring, status, current_week, slots_json)) =
        row
    else {
        return Ok(None);
    };

    let scoring_mode = ScoringMode::parse(&scoring)
        .with_context(|| format!("unknown scoring mode {scoring:?}"))?;
    let draft_status = DraftStatus::parse(&status)
        .with_context(|| format!("unknown draft status {status:?}"))?;
    let roster_slots: RosterSlots =
        serde_json::from_str(&slots_json).context("failed to deserialize roster slots")?;

    let mut stmt = conn
        .prepare("SELECT id FROM teams WHERE league_id = ?1 ORDER BY join_order")
        .context("failed to prepare league teams query")?;
    let team_ids = stmt
        .query_map(params![league_id], |row| row.get::<_, TeamId>(0))
        .context("failed to query league teams")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to map league team rows")?;

    Ok(Some(League {
        id,
        name,
        commissioner_id,
        capacity,
        scoring_mode,
        draft_status,
        current_week,
        team_ids,
        roster_slots,
    }))
}

fn load_roster(conn: &Connection, team_id: TeamId) -> anyhow::Result<BTreeSet<PlayerId>> {
    let mut stmt = conn
        .prepare("SELECT player_id FROM roster_entries WHERE team_id = ?1")
        .context("failed to prepare roster query")?;
    let roster = stmt
        .query_map(params![team_id], |row| row.get::<_, PlayerId>(0))
        .context("failed to query roster")?
        .collect::<Result<BTreeSet<_>, _>>()
        .context("failed to map roster rows")?;
    Ok(roster)
}

fn load_team_where(
    conn: &Connection,
    clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> anyhow::Result<Vec<FantasyTeam>> {
    let sql = format!(
        "SELECT id, league_id, owner_id, name FROM teams WHERE {clause} ORDER BY join_order"
    );
    let mut stmt = conn.prepare(&sql).context("failed to prepare team query")?;
    let heads = stmt
        .query_map(args, |row| {
            Ok((
                row.get::<_, TeamId>(0)?,
                row.get::<_, LeagueId>(1)?,
                row.get::<_, UserId>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .context("failed to query teams")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to map team rows")?;

    heads
        .into_iter()
        .map(|(id, league_id, owner_id, name)| {
            Ok(FantasyTeam {
                id,
                league_id,
                owner_id,
                name,
                roster: load_roster(conn, id)?,
            })
        })
        .collect()
}

fn load_player(conn: &Connection, player_id: PlayerId) -> anyhow::Result<Option<NflPlayer>> {
    let row = conn
        .query_row(
            "SELECT id, name, position, nfl_team, status, projected_points
             FROM players WHERE id = ?1",
            params![player_id],
            |row| {
                Ok((
                    row.get::<_, PlayerId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            },
        )
        .optional()
        .context("failed to query player")?;

    let Some((id, name, position, nfl_team, status, projected_points)) = row else {
        return Ok(None);
    };

    Ok(Some(NflPlayer {
        id,
        name,
        position: Position::from_str_pos(&position)
            .with_context(|| format!("unknown position {position:?} for player {id}"))?,
        nfl_team,
        status: PlayerStatus::parse(&status)
            .with_context(|| format!("unknown status {status:?} for player {id}"))?,
        projected_points,
    }))
}

fn load_pick(conn: &Connection, draft_id: DraftId, pick_number: u32) -> anyhow::Result<DraftPick> {
    let (pick_number, round, team_id, player_id, picked_at) = conn
        .query_row(
            "SELECT pick_number, round, team_id, player_id, picked_at
             FROM draft_picks WHERE draft_id = ?1 AND pick_number = ?2",
            params![draft_id, pick_number],
            |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, TeamId>(2)?,
                    row.get::<_, Option<PlayerId>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .context("failed to query draft pick")?;

    Ok(DraftPick {
        pick_number,
        round,
        team_id,
        player_id,
        picked_at: picked_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn load_draft_state(conn: &Connection, league_id: LeagueId) -> anyhow::Result<Option<DraftState>> {
    let row = conn
        .query_row(
            "SELECT id, current_pick, is_complete, completed_at
             FROM draft_states WHERE league_id = ?1",
            params![league_id],
            |row| {
                Ok((
                    row.get::<_, DraftId>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()
        .context("failed to query draft state")?;

    let Some((id, current_pick, is_complete, completed_at)) = row else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT pick_number, round, team_id, player_id, picked_at
             FROM draft_picks WHERE draft_id = ?1 ORDER BY pick_number",
        )
        .context("failed to prepare draft picks query")?;
    let rows = stmt
        .query_map(params![id], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, TeamId>(2)?,
                row.get::<_, Option<PlayerId>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })
        .context("failed to query draft picks")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to map draft pick rows")?;

    let picks = rows
        .into_iter()
        .map(|(pick_number, round, team_id, player_id, picked_at)| {
            Ok(DraftPick {
                pick_number,
                round,
                team_id,
                player_id,
                picked_at: picked_at.as_deref().map(parse_ts).transpose()?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Some(DraftState {
        id,
        league_id,
        picks,
        current_pick,
        is_complete,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
    }))
}

fn load_lineup(conn: &Connection, team_id: TeamId, week: u32) -> anyhow::Result<Option<WeeklyLineup>> {
    let row = conn
        .query_row(
            "SELECT league_id, starters, bench, updated_at
             FROM weekly_lineups WHERE team_id = ?1 AND week = ?2",
            params![team_id, week],
            |row| {
                Ok((
                    row.get::<_, LeagueId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .context("failed to query weekly lineup")?;

    let Some((league_id, starters, bench, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(WeeklyLineup {
        team_id,
        league_id,
        week,
        starters: serde_json::from_str(&starters).context("failed to deserialize starters")?,
        bench: serde_json::from_str(&bench).context("failed to deserialize bench")?,
        updated_at: parse_ts(&updated_at)?,
    }))
}

fn add_to_roster(conn: &Connection, team_id: TeamId, player_id: PlayerId) -> StoreResult<()> {
    let league_id: LeagueId = conn
        .query_row(
            "SELECT league_id FROM teams WHERE id = ?1",
            params![team_id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up team league")?
        .with_context(|| format!("team {team_id} does not exist"))?;

    conn.execute(
        "INSERT INTO roster_entries (team_id, league_id, player_id) VALUES (?1, ?2, ?3)",
        params![team_id, league_id, player_id],
    )
    .map_err(|e| {
        write_error(
            e,
            &format!("player {player_id} is already rostered in this league"),
            "failed to add player to roster",
        )
    })?;
    Ok(())
}

fn record_pick_on(
    conn: &Connection,
    draft_id: DraftId,
    pick_number: u32,
    player_id: PlayerId,
    at: &DateTime<Utc>,
) -> StoreResult<DraftPick> {
    let changed = conn
        .execute(
            "UPDATE draft_picks SET player_id = ?3, picked_at = ?4
             WHERE draft_id = ?1 AND pick_number = ?2 AND player_id IS NULL",
            params![draft_id, pick_number, player_id, to_ts(at)],
        )
        .map_err(|e| {
            write_error(
                e,
                &format!("player {player_id} has already been drafted"),
                "failed to record draft pick",
            )
        })?;

    if changed == 0 {
        return Err(StoreError::Stale(format!(
            "pick {pick_number} has already been made"
        )));
    }
    Ok(load_pick(conn, draft_id, pick_number)?)
}

fn advance_pointer_on(
    conn: &Connection,
    draft_id: DraftId,
    expected: Option<u32>,
) -> StoreResult<u32> {
    let changed = match expected {
        Some(pick_number) => conn.execute(
            "UPDATE draft_states SET current_pick = current_pick + 1
             WHERE id = ?1 AND is_complete = 0 AND current_pick = ?2",
            params![draft_id, pick_number],
        ),
        None => conn.execute(
            "UPDATE draft_states SET current_pick = current_pick + 1
             WHERE id = ?1 AND is_complete = 0",
            params![draft_id],
        ),
    }
    .context("failed to advance draft pointer")?;

    if changed == 0 {
        return Err(StoreError::Stale(match expected {
            Some(pick_number) => format!("pick {pick_number} is no longer on the clock"),
            None => "draft is already complete".to_string(),
        }));
    }

    let pointer: u32 = conn
        .query_row(
            "SELECT current_pick FROM draft_states WHERE id = ?1",
            params![draft_id],
            |row| row.get(0),
        )
        .context("failed to read draft pointer")?;
    Ok(pointer)
}

fn mark_complete_on(conn: &Connection, draft_id: DraftId, at: &DateTime<Utc>) -> StoreResult<()> {
    let changed = conn
        .execute(
            "UPDATE draft_states SET is_complete = 1, completed_at = ?2
             WHERE id = ?1 AND is_complete = 0",
            params![draft_id, to_ts(at)],
        )
        .context("failed to mark draft complete")?;
    if changed == 0 {
        return Err(StoreError::Stale("draft is already complete".to_string()));
    }

    conn.execute(
        "UPDATE leagues SET draft_status = ?2
         WHERE id = (SELECT league_id FROM draft_states WHERE id = ?1) AND draft_status = ?3",
        params![
            draft_id,
            DraftStatus::Completed.as_str(),
            DraftStatus::InProgress.as_str()
        ],
    )
    .context("failed to complete league draft status")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// LeagueStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl LeagueStore for SqliteStore {
    async fn create_league(&self, league: &NewLeague) -> StoreResult<League> {
        let conn = self.conn()?;
        let slots_json =
            serde_json::to_string(&league.roster_slots).context("failed to serialize roster slots")?;
        let id: LeagueId = conn
            .query_row(
                "INSERT INTO leagues (name, commissioner_id, capacity, scoring_mode, draft_status, roster_slots)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
                params![
                    league.name,
                    league.commissioner_id,
                    league.capacity,
                    league.scoring_mode.as_str(),
                    DraftStatus::Scheduled.as_str(),
                    slots_json,
                ],
                |row| row.get(0),
            )
            .context("failed to insert league")?;

        let created = load_league(&conn, id)?.context("league vanished after insert")?;
        Ok(created)
    }

    async fn get_league(&self, league_id: LeagueId) -> StoreResult<Option<League>> {
        let conn = self.conn()?;
        Ok(load_league(&conn, league_id)?)
    }

    async fn set_current_week(&self, league_id: LeagueId, week: u32) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE leagues SET current_week = ?2 WHERE id = ?1 AND current_week <= ?2",
                params![league_id, week],
            )
            .context("failed to update current week")?;
        if changed == 0 {
            return Err(StoreError::Stale(format!(
                "league {league_id} is already past week {week}"
            )));
        }
        Ok(())
    }

    async fn create_team(
        &self,
        league_id: LeagueId,
        owner_id: UserId,
        name: &str,
    ) -> StoreResult<FantasyTeam> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;

        let capacity: u32 = tx
            .query_row(
                "SELECT capacity FROM leagues WHERE id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read league capacity")?
            .with_context(|| format!("league {league_id} does not exist"))?;

        let members: u32 = tx
            .query_row(
                "SELECT COUNT(*) FROM teams WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .context("failed to count league members")?;

        if members >= capacity {
            return Err(StoreError::Stale(format!("league {league_id} is full")));
        }

        tx.execute(
            "INSERT INTO teams (league_id, owner_id, name, join_order) VALUES (?1, ?2, ?3, ?4)",
            params![league_id, owner_id, name, members],
        )
        .map_err(|e| {
            write_error(
                e,
                &format!("user {owner_id} already has a team in league {league_id}"),
                "failed to insert team",
            )
        })?;
        let team_id = tx.last_insert_rowid();

        tx.commit().context("failed to commit create_team")?;

        Ok(FantasyTeam {
            id: team_id,
            league_id,
            owner_id,
            name: name.to_string(),
            roster: BTreeSet::new(),
        })
    }

    async fn get_team(&self, team_id: TeamId) -> StoreResult<Option<FantasyTeam>> {
        let conn = self.conn()?;
        let mut teams = load_team_where(&conn, "id = ?1", &[&team_id])?;
        Ok(teams.pop())
    }

    async fn get_teams_in_league(&self, league_id: LeagueId) -> StoreResult<Vec<FantasyTeam>> {
        let conn = self.conn()?;
        Ok(load_team_where(&conn, "league_id = ?1", &[&league_id])?)
    }

    async fn get_team_for_user_in_league(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> StoreResult<Option<FantasyTeam>> {
        let conn = self.conn()?;
        let mut teams =
            load_team_where(&conn, "owner_id = ?1 AND league_id = ?2", &[&user_id, &league_id])?;
        Ok(teams.pop())
    }

    async fn get_owned_player_ids(&self, league_id: LeagueId) -> StoreResult<HashSet<PlayerId>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT player_id FROM roster_entries WHERE league_id = ?1")
            .context("failed to prepare owned players query")?;
        let owned = stmt
            .query_map(params![league_id], |row| row.get::<_, PlayerId>(0))
            .context("failed to query owned players")?
            .collect::<Result<HashSet<_>, _>>()
            .context("failed to map owned player rows")?;
        Ok(owned)
    }

    async fn add_player_to_roster(&self, team_id: TeamId, player_id: PlayerId) -> StoreResult<()> {
        let conn = self.conn()?;
        add_to_roster(&conn, team_id, player_id)
    }

    async fn remove_player_from_roster(
        &self,
        team_id: TeamId,
        player_id: PlayerId,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "DELETE FROM roster_entries WHERE team_id = ?1 AND player_id = ?2",
                params![team_id, player_id],
            )
            .context("failed to remove player from roster")?;
        Ok(changed > 0)
    }

    async fn upsert_players(&self, players: &[NflPlayer]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for player in players {
            tx.execute(
                "INSERT INTO players (id, name, position, nfl_team, status, projected_points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name             = excluded.name,
                    position         = excluded.position,
                    nfl_team         = excluded.nfl_team,
                    status           = excluded.status,
                    projected_points = excluded.projected_points",
                params![
                    player.id,
                    player.name,
                    player.position.display_str(),
                    player.nfl_team,
                    player.status.as_str(),
                    player.projected_points,
                ],
            )
            .context("failed to upsert player")?;
        }
        tx.commit().context("failed to commit player import")?;
        Ok(players.len())
    }

    async fn get_player_by_id(&self, player_id: PlayerId) -> StoreResult<Option<NflPlayer>> {
        let conn = self.conn()?;
        Ok(load_player(&conn, player_id)?)
    }

    async fn get_players_by_ids(&self, player_ids: &[PlayerId]) -> StoreResult<Vec<NflPlayer>> {
        let conn = self.conn()?;
        let mut players = Vec::with_capacity(player_ids.len());
        for &id in player_ids {
            if let Some(player) = load_player(&conn, id)? {
                players.push(player);
            }
        }
        Ok(players)
    }

    async fn get_draft_state(&self, league_id: LeagueId) -> StoreResult<Option<DraftState>> {
        let conn = self.conn()?;
        Ok(load_draft_state(&conn, league_id)?)
    }

    async fn create_draft_state(
        &self,
        league_id: LeagueId,
        picks: &[DraftPick],
    ) -> StoreResult<DraftState> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;

        let changed = tx
            .execute(
                "UPDATE leagues SET draft_status = ?2 WHERE id = ?1 AND draft_status = ?3",
                params![
                    league_id,
                    DraftStatus::InProgress.as_str(),
                    DraftStatus::Scheduled.as_str()
                ],
            )
            .context("failed to start league draft")?;
        if changed == 0 {
            return Err(StoreError::Stale(format!(
                "draft for league {league_id} has already started"
            )));
        }

        tx.execute(
            "INSERT INTO draft_states (league_id, current_pick, is_complete) VALUES (?1, 1, 0)",
            params![league_id],
        )
        .map_err(|e| {
            write_error(
                e,
                &format!("league {league_id} already has a draft"),
                "failed to insert draft state",
            )
        })?;
        let draft_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO draft_picks (draft_id, pick_number, round, team_id)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare draft pick insert")?;
            for pick in picks {
                stmt.execute(params![draft_id, pick.pick_number, pick.round, pick.team_id])
                    .context("failed to insert draft pick")?;
            }
        }

        let state = load_draft_state(&tx, league_id)?.context("draft vanished after insert")?;
        tx.commit().context("failed to commit draft creation")?;
        Ok(state)
    }

    async fn record_pick(
        &self,
        draft_id: DraftId,
        pick_number: u32,
        player_id: PlayerId,
    ) -> StoreResult<DraftPick> {
        let conn = self.conn()?;
        record_pick_on(&conn, draft_id, pick_number, player_id, &Utc::now())
    }

    async fn advance_pointer(&self, draft_id: DraftId) -> StoreResult<u32> {
        let conn = self.conn()?;
        advance_pointer_on(&conn, draft_id, None)
    }

    async fn mark_complete(&self, draft_id: DraftId) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        mark_complete_on(&tx, draft_id, &Utc::now())?;
        tx.commit().context("failed to commit draft completion")?;
        Ok(())
    }

    async fn commit_pick(&self, commit: &PickCommit) -> StoreResult<DraftPick> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin pick transaction")?;

        advance_pointer_on(&tx, commit.draft_id, Some(commit.pick_number))?;
        let pick = record_pick_on(
            &tx,
            commit.draft_id,
            commit.pick_number,
            commit.player_id,
            &commit.picked_at,
        )?;
        add_to_roster(&tx, commit.team_id, commit.player_id)?;
        if commit.completes_draft {
            mark_complete_on(&tx, commit.draft_id, &commit.picked_at)?;
        }

        tx.commit().context("failed to commit draft pick")?;
        Ok(pick)
    }

    async fn get_weekly_lineup(
        &self,
        team_id: TeamId,
        week: u32,
    ) -> StoreResult<Option<WeeklyLineup>> {
        let conn = self.conn()?;
        Ok(load_lineup(&conn, team_id, week)?)
    }

    async fn upsert_weekly_lineup(&self, lineup: &WeeklyLineup) -> StoreResult<WeeklyLineup> {
        let conn = self.conn()?;
        let starters =
            serde_json::to_string(&lineup.starters).context("failed to serialize starters")?;
        let bench = serde_json::to_string(&lineup.bench).context("failed to serialize bench")?;
        conn.execute(
            "INSERT INTO weekly_lineups (team_id, week, league_id, starters, bench, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(team_id, week) DO UPDATE SET
                league_id  = excluded.league_id,
                starters   = excluded.starters,
                bench      = excluded.bench,
                updated_at = excluded.updated_at",
            params![
                lineup.team_id,
                lineup.week,
                lineup.league_id,
                starters,
                bench,
                to_ts(&lineup.updated_at),
            ],
        )
        .context("failed to upsert weekly lineup")?;

        let stored = load_lineup(&conn, lineup.team_id, lineup.week)?
            .context("lineup vanished after upsert")?;
        Ok(stored)
    }

    async fn get_schedule(&self, league_id: LeagueId) -> StoreResult<Vec<ScheduleMatchup>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT week, team1, team2 FROM schedule_matchups
                 WHERE league_id = ?1 ORDER BY week, rowid",
            )
            .context("failed to prepare schedule query")?;
        let matchups = stmt
            .query_map(params![league_id], |row| {
                Ok(ScheduleMatchup {
                    week: row.get(0)?,
                    team1: row.get(1)?,
                    team2: row.get(2)?,
                })
            })
            .context("failed to query schedule")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to map schedule rows")?;
        Ok(matchups)
    }

    async fn save_schedule(
        &self,
        league_id: LeagueId,
        matchups: &[ScheduleMatchup],
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin schedule transaction")?;

        let existing: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schedule_matchups WHERE league_id = ?1)",
                params![league_id],
                |row| row.get(0),
            )
            .context("failed to check existing schedule")?;
        if existing {
            return Err(StoreError::Stale(format!(
                "league {league_id} already has a schedule"
            )));
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO schedule_matchups (league_id, week, team1, team2)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare schedule insert")?;
            for m in matchups {
                stmt.execute(params![league_id, m.week, m.team1, m.team2])
                    .context("failed to insert matchup")?;
            }
        }

        tx.commit().context("failed to commit schedule")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a fresh in-memory store for each test.
    fn test_store() -> SqliteStore {
        SqliteStore::open(":memory:").expect("in-memory database should open")
    }

    fn new_league(capacity: u32) -> NewLeague {
        NewLeague {
            name: "Sunday Scaries".to_string(),
            commissioner_id: 1,
            capacity,
            scoring_mode: ScoringMode::Ppr,
            roster_slots: RosterSlots::default(),
        }
    }

    fn player(id: PlayerId, position: Position) -> NflPlayer {
        NflPlayer {
            id,
            name: format!("Player {id}"),
            position,
            nfl_team: "KC".to_string(),
            status: PlayerStatus::Active,
            projected_points: 10.0 + id as f64,
        }
    }

    /// Helper: a league with two teams, players 1..=4, and a draft of two picks.
    async fn drafting_store() -> (SqliteStore, League, DraftState) {
        let store = test_store();
        let league = store.create_league(&new_league(8)).await.unwrap();
        let a = store.create_team(league.id, 10, "A").await.unwrap();
        let b = store.create_team(league.id, 20, "B").await.unwrap();
        store
            .upsert_players(&(1..=4).map(|i| player(i, Position::WideReceiver)).collect::<Vec<_>>())
            .await
            .unwrap();
        let picks = vec![
            DraftPick { pick_number: 1, round: 1, team_id: a.id, player_id: None, picked_at: None },
            DraftPick { pick_number: 2, round: 1, team_id: b.id, player_id: None, picked_at: None },
        ];
        let draft = store.create_draft_state(league.id, &picks).await.unwrap();
        // Reload so `team_ids` reflects the joins above.
        let league = store.get_league(league.id).await.unwrap().unwrap();
        assert_eq!(league.team_ids, vec![a.id, b.id]);
        (store, league, draft)
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let store = test_store();
        let conn = store.conn().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "draft_picks",
            "draft_states",
            "leagues",
            "players",
            "roster_entries",
            "schedule_matchups",
            "teams",
            "weekly_lineups",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    // ------------------------------------------------------------------
    // Leagues and teams
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn create_and_load_league() {
        let store = test_store();
        let created = store.create_league(&new_league(10)).await.unwrap();

        let loaded = store.get_league(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Sunday Scaries");
        assert_eq!(loaded.capacity, 10);
        assert_eq!(loaded.scoring_mode, ScoringMode::Ppr);
        assert_eq!(loaded.draft_status, DraftStatus::Scheduled);
        assert_eq!(loaded.current_week, 1);
        assert_eq!(loaded.roster_slots, RosterSlots::default());
        assert!(loaded.team_ids.is_empty());
    }

    #[tokio::test]
    async fn get_league_missing_returns_none() {
        let store = test_store();
        assert!(store.get_league(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn teams_keep_join_order() {
        let store = test_store();
        let league = store.create_league(&new_league(8)).await.unwrap();
        let first = store.create_team(league.id, 7, "Seven").await.unwrap();
        let second = store.create_team(league.id, 3, "Three").await.unwrap();

        let loaded = store.get_league(league.id).await.unwrap().unwrap();
        assert_eq!(loaded.team_ids, vec![first.id, second.id]);

        let teams = store.get_teams_in_league(league.id).await.unwrap();
        assert_eq!(teams.iter().map(|t| t.owner_id).collect::<Vec<_>>(), vec![7, 3]);

        let mine = store.get_team_for_user_in_league(3, league.id).await.unwrap();
        assert_eq!(mine.map(|t| t.id), Some(second.id));
        assert!(store.get_team_for_user_in_league(99, league.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_team_rejects_duplicate_owner() {
        let store = test_store();
        let league = store.create_league(&new_league(8)).await.unwrap();
        store.create_team(league.id, 7, "Seven").await.unwrap();

        let err = store.create_team(league.id, 7, "Again").await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn create_team_rejects_full_league() {
        let store = test_store();
        let league = store.create_league(&new_league(8)).await.unwrap();
        for owner in 0..8 {
            store.create_team(league.id, owner, "T").await.unwrap();
        }
        let err = store.create_team(league.id, 100, "Late").await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(ref m) if m.contains("full")));
    }

    #[tokio::test]
    async fn set_current_week_never_moves_backwards() {
        let store = test_store();
        let league = store.create_league(&new_league(8)).await.unwrap();
        store.set_current_week(league.id, 5).await.unwrap();
        store.set_current_week(league.id, 5).await.unwrap();
        let err = store.set_current_week(league.id, 4).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
        assert_eq!(store.get_league(league.id).await.unwrap().unwrap().current_week, 5);
    }

    // ------------------------------------------------------------------
    // Rosters and players
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn roster_ownership_is_unique_within_league() {
        let (store, league, _) = drafting_store().await;
        let a = league.team_ids[0];
        let b = league.team_ids[1];

        store.add_player_to_roster(a, 1).await.unwrap();
        let err = store.add_player_to_roster(b, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        let owned = store.get_owned_player_ids(league.id).await.unwrap();
        assert_eq!(owned, HashSet::from([1]));

        assert!(store.remove_player_from_roster(a, 1).await.unwrap());
        assert!(!store.remove_player_from_roster(a, 1).await.unwrap());
        store.add_player_to_roster(b, 1).await.unwrap();
        let team_b = store.get_team(b).await.unwrap().unwrap();
        assert_eq!(team_b.roster, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn upsert_players_overwrites_existing() {
        let store = test_store();
        store.upsert_players(&[player(1, Position::Quarterback)]).await.unwrap();

        let mut hurt = player(1, Position::Quarterback);
        hurt.status = PlayerStatus::InjuredOut;
        hurt.projected_points = 0.0;
        store.upsert_players(&[hurt.clone()]).await.unwrap();

        assert_eq!(store.get_player_by_id(1).await.unwrap(), Some(hurt));
    }

    #[tokio::test]
    async fn get_players_by_ids_skips_unknown() {
        let store = test_store();
        store
            .upsert_players(&[player(1, Position::Kicker), player(2, Position::Defense)])
            .await
            .unwrap();
        let found = store.get_players_by_ids(&[2, 99, 1]).await.unwrap();
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    // ------------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn create_draft_state_moves_league_in_progress() {
        let (store, league, draft) = drafting_store().await;
        assert_eq!(draft.current_pick, 1);
        assert_eq!(draft.picks.len(), 2);
        assert!(!draft.is_complete);

        let reloaded = store.get_league(league.id).await.unwrap().unwrap();
        assert_eq!(reloaded.draft_status, DraftStatus::InProgress);

        let err = store.create_draft_state(league.id, &draft.picks).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
    }

    #[tokio::test]
    async fn commit_pick_applies_all_writes() {
        let (store, league, draft) = drafting_store().await;
        let commit = PickCommit {
            draft_id: draft.id,
            league_id: league.id,
            team_id: league.team_ids[0],
            player_id: 3,
            pick_number: 1,
            completes_draft: false,
            picked_at: Utc::now(),
        };
        let pick = store.commit_pick(&commit).await.unwrap();
        assert_eq!(pick.player_id, Some(3));
        assert!(pick.picked_at.is_some());

        let state = store.get_draft_state(league.id).await.unwrap().unwrap();
        assert_eq!(state.current_pick, 2);
        assert!(state.is_drafted(3));
        let team = store.get_team(league.team_ids[0]).await.unwrap().unwrap();
        assert!(team.roster.contains(&3));
    }

    #[tokio::test]
    async fn commit_pick_with_stale_pointer_writes_nothing() {
        let (store, league, draft) = drafting_store().await;
        let first = PickCommit {
            draft_id: draft.id,
            league_id: league.id,
            team_id: league.team_ids[0],
            player_id: 1,
            pick_number: 1,
            completes_draft: false,
            picked_at: Utc::now(),
        };
        store.commit_pick(&first).await.unwrap();

        let racer = PickCommit { player_id: 2, ..first };
        let err = store.commit_pick(&racer).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        let owned = store.get_owned_player_ids(league.id).await.unwrap();
        assert!(!owned.contains(&2));
        let state = store.get_draft_state(league.id).await.unwrap().unwrap();
        assert_eq!(state.current_pick, 2);
        assert!(!state.is_drafted(2));
    }

    #[tokio::test]
    async fn commit_pick_rolls_back_when_player_already_drafted() {
        let (store, league, draft) = drafting_store().await;
        let first = PickCommit {
            draft_id: draft.id,
            league_id: league.id,
            team_id: league.team_ids[0],
            player_id: 1,
            pick_number: 1,
            completes_draft: false,
            picked_at: Utc::now(),
        };
        store.commit_pick(&first).await.unwrap();

        let same_player = PickCommit {
            team_id: league.team_ids[1],
            pick_number: 2,
            ..first
        };
        let err = store.commit_pick(&same_player).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(ref m) if m.contains("already been drafted")));

        // The pointer advance inside the failed transaction was rolled back.
        let state = store.get_draft_state(league.id).await.unwrap().unwrap();
        assert_eq!(state.current_pick, 2);
    }

    #[tokio::test]
    async fn final_commit_completes_draft_and_league() {
        let (store, league, draft) = drafting_store().await;
        for (n, team_id) in [(1u32, league.team_ids[0]), (2, league.team_ids[1])] {
            store
                .commit_pick(&PickCommit {
                    draft_id: draft.id,
                    league_id: league.id,
                    team_id,
                    player_id: n as PlayerId,
                    pick_number: n,
                    completes_draft: n == 2,
                    picked_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let state = store.get_draft_state(league.id).await.unwrap().unwrap();
        assert!(state.is_complete);
        assert!(state.completed_at.is_some());
        assert_eq!(state.current_pick, 3);
        let reloaded = store.get_league(league.id).await.unwrap().unwrap();
        assert_eq!(reloaded.draft_status, DraftStatus::Completed);
    }

    #[tokio::test]
    async fn granular_pick_writes() {
        let (store, league, draft) = drafting_store().await;
        let pick = store.record_pick(draft.id, 1, 4).await.unwrap();
        assert_eq!(pick.player_id, Some(4));

        let err = store.record_pick(draft.id, 1, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        assert_eq!(store.advance_pointer(draft.id).await.unwrap(), 2);
        store.mark_complete(draft.id).await.unwrap();
        let err = store.advance_pointer(draft.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
        let err = store.mark_complete(draft.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        let reloaded = store.get_league(league.id).await.unwrap().unwrap();
        assert_eq!(reloaded.draft_status, DraftStatus::Completed);
    }

    // ------------------------------------------------------------------
    // Lineups and schedule
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn upsert_lineup_overwrites_single_row() {
        let (store, league, _) = drafting_store().await;
        let team_id = league.team_ids[0];
        let mut lineup = WeeklyLineup {
            team_id,
            league_id: league.id,
            week: 2,
            starters: vec![1, 2],
            bench: vec![3],
            updated_at: Utc::now(),
        };
        store.upsert_weekly_lineup(&lineup).await.unwrap();

        lineup.starters = vec![3];
        lineup.bench = vec![1, 2];
        let stored = store.upsert_weekly_lineup(&lineup).await.unwrap();
        assert_eq!(stored.starters, vec![3]);
        assert_eq!(stored.bench, vec![1, 2]);

        let conn = store.conn().unwrap();
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM weekly_lineups WHERE team_id = ?1 AND week = 2",
                params![team_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn missing_lineup_returns_none() {
        let (store, league, _) = drafting_store().await;
        assert!(store
            .get_weekly_lineup(league.team_ids[0], 9)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn schedule_is_saved_once() {
        let (store, league, _) = drafting_store().await;
        let matchups = vec![
            ScheduleMatchup { week: 1, team1: league.team_ids[0], team2: league.team_ids[1] },
            ScheduleMatchup { week: 2, team1: league.team_ids[1], team2: league.team_ids[0] },
        ];
        store.save_schedule(league.id, &matchups).await.unwrap();
        assert_eq!(store.get_schedule(league.id).await.unwrap(), matchups);

        let err = store.save_schedule(league.id, &matchups).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
    }
}
