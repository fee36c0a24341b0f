// Dispatch from parsed commands to core operations.
//
// Each command returns its success payload as JSON; failures stay typed so
// `main` can render them and choose an exit code.

use std::path::PathBuf;

use gridiron_core::config::LeagueDefaults;
use gridiron_core::draft::DraftEngine;
use gridiron_core::lineup::{self, LineupRequest};
use gridiron_core::model::NewLeague;
use gridiron_core::store::LeagueStore;
use gridiron_core::{league, schedule, scoring, CoreError};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::{
    Commands, DraftCmd, LeagueCmd, LineupArgs, LineupCmd, PlayersCmd, ScheduleCmd,
};

/// Process-wide dependencies, built once in `main`.
pub struct Context<S: LeagueStore + ?Sized> {
    pub engine: DraftEngine<S>,
    pub league_defaults: LeagueDefaults,
    pub players_file: PathBuf,
}

impl<S: LeagueStore + ?Sized> Context<S> {
    fn store(&self) -> &S {
        self.engine.store()
    }
}

type CmdResult = Result<Value, CoreError>;

fn to_json<T: Serialize>(value: &T) -> CmdResult {
    serde_json::to_value(value).map_err(|e| CoreError::from(anyhow::Error::new(e)))
}

pub async fn run<S: LeagueStore + ?Sized>(ctx: &Context<S>, command: Commands) -> CmdResult {
    match command {
        Commands::League { cmd } => run_league(ctx, cmd).await,
        Commands::Players { cmd } => run_players(ctx, cmd).await,
        Commands::Draft { cmd } => run_draft(ctx, cmd).await,
        Commands::Lineup { cmd } => run_lineup(ctx, cmd).await,
        Commands::Score { team, week } => {
            to_json(&scoring::team_score(ctx.store(), team, week).await?)
        }
        Commands::Standings { league } => {
            to_json(&scoring::get_standings(ctx.store(), league).await?)
        }
        Commands::Schedule { cmd } => run_schedule(ctx, cmd).await,
    }
}

async fn run_league<S: LeagueStore + ?Sized>(ctx: &Context<S>, cmd: LeagueCmd) -> CmdResult {
    let store = ctx.store();
    match cmd {
        LeagueCmd::Create {
            name,
            commissioner,
            capacity,
            scoring,
        } => {
            let defaults = &ctx.league_defaults;
            let new_league = NewLeague {
                name,
                commissioner_id: commissioner,
                capacity: capacity.unwrap_or(defaults.capacity),
                scoring_mode: scoring.unwrap_or(defaults.scoring_mode),
                roster_slots: defaults.roster,
            };
            to_json(&league::create_league(store, &new_league).await?)
        }
        LeagueCmd::Show { league } => {
            let found = store
                .get_league(league)
                .await?
                .ok_or_else(|| CoreError::not_found("league not found"))?;
            to_json(&found)
        }
        LeagueCmd::Join {
            league,
            user,
            team_name,
        } => to_json(&league::join_league(store, league, user, &team_name).await?),
        LeagueCmd::Teams { league } => {
            store
                .get_league(league)
                .await?
                .ok_or_else(|| CoreError::not_found("league not found"))?;
            to_json(&store.get_teams_in_league(league).await?)
        }
        LeagueCmd::AdvanceWeek { league, week } => {
            to_json(&league::advance_week(store, league, week).await?)
        }
        LeagueCmd::DropPlayer { team, player } => {
            to_json(&league::drop_player(store, team, player).await?)
        }
    }
}

async fn run_players<S: LeagueStore + ?Sized>(ctx: &Context<S>, cmd: PlayersCmd) -> CmdResult {
    match cmd {
        PlayersCmd::Import { file } => {
            let path = file.unwrap_or_else(|| ctx.players_file.clone());
            let imported = league::import_players(ctx.store(), &path).await?;
            Ok(json!({ "imported": imported, "file": path.display().to_string() }))
        }
        PlayersCmd::Show { player } => {
            let found = ctx
                .store()
                .get_player_by_id(player)
                .await?
                .ok_or_else(|| CoreError::not_found("player not found"))?;
            to_json(&found)
        }
    }
}

async fn run_draft<S: LeagueStore + ?Sized>(ctx: &Context<S>, cmd: DraftCmd) -> CmdResult {
    let engine = &ctx.engine;
    match cmd {
        DraftCmd::Validate { league } => to_json(&engine.validate_draft_start(league).await?),
        DraftCmd::Start { league } => to_json(&engine.start_draft(league).await?),
        DraftCmd::Pick {
            league,
            user,
            player,
        } => to_json(&engine.make_pick(league, user, player).await?),
        DraftCmd::Status { league, user } => to_json(&engine.draft_status(league, user).await?),
    }
}

fn lineup_request(args: LineupArgs) -> LineupRequest {
    LineupRequest {
        team_id: args.team,
        league_id: args.league,
        week: args.week,
        starters: args.starters,
        bench: args.bench,
    }
}

async fn run_lineup<S: LeagueStore + ?Sized>(ctx: &Context<S>, cmd: LineupCmd) -> CmdResult {
    let store = ctx.store();
    match cmd {
        LineupCmd::Validate { args } => {
            to_json(&lineup::check_lineup(store, &lineup_request(args)).await?)
        }
        LineupCmd::Save { args } => {
            to_json(&lineup::save_lineup(store, &lineup_request(args)).await?)
        }
        LineupCmd::Show { team, week } => {
            let saved = store
                .get_weekly_lineup(team, week)
                .await?
                .ok_or_else(|| CoreError::not_found("no lineup found"))?;
            to_json(&saved)
        }
    }
}

async fn run_schedule<S: LeagueStore + ?Sized>(ctx: &Context<S>, cmd: ScheduleCmd) -> CmdResult {
    match cmd {
        ScheduleCmd::Generate { league } => {
            to_json(&schedule::create_schedule(ctx.store(), league).await?)
        }
        ScheduleCmd::Show { league, week } => {
            let mut matchups = schedule::get_schedule(ctx.store(), league).await?;
            if let Some(week) = week {
                matchups.retain(|m| m.week == week);
            }
            to_json(&matchups)
        }
    }
}

/// JSON body for a failed command.
pub fn error_body(err: &CoreError) -> Value {
    let mut body = json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    });
    if let CoreError::InvalidLineup(violations) = err {
        body["error"]["violations"] = json!(violations
            .iter()
            .map(|v| json!({ "detail": v.to_string(), "violation": v }))
            .collect::<Vec<_>>());
    }
    body
}

/// Process exit code for a failure kind.
pub fn exit_code(err: &CoreError) -> i32 {
    match err {
        CoreError::NotFound(_) => 2,
        CoreError::Forbidden(_) => 3,
        CoreError::Conflict(_) => 4,
        CoreError::InvalidLineup(_) => 5,
        CoreError::Invalid(_) => 6,
        CoreError::Store(_) => 1,
    }
}
