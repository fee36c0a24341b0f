// Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gridiron_core::model::{LeagueId, PlayerId, ScoringMode, TeamId, UserId};

fn parse_scoring_mode(s: &str) -> Result<ScoringMode, String> {
    ScoringMode::parse(s).ok_or_else(|| format!("unknown scoring mode `{s}` (standard, ppr)"))
}

#[derive(Debug, Parser)]
#[clap(name = "gridiron", about = "Fantasy football league manager", version)]
pub struct Gridiron {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, join, and manage leagues.
    League {
        #[clap(subcommand)]
        cmd: LeagueCmd,
    },

    /// Manage NFL player reference data.
    Players {
        #[clap(subcommand)]
        cmd: PlayersCmd,
    },

    /// Run a league's snake draft.
    Draft {
        #[clap(subcommand)]
        cmd: DraftCmd,
    },

    /// Check or save a weekly lineup.
    Lineup {
        #[clap(subcommand)]
        cmd: LineupCmd,
    },

    /// Score a team's saved lineup for one week.
    Score {
        #[clap(long)]
        team: TeamId,

        #[clap(long, short)]
        week: u32,
    },

    /// Ranked standings through the league's current week.
    Standings {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Generate or show the season schedule.
    Schedule {
        #[clap(subcommand)]
        cmd: ScheduleCmd,
    },
}

#[derive(Debug, Subcommand)]
pub enum LeagueCmd {
    /// Create a league. Capacity, scoring, and roster slots default to the
    /// `[league_defaults]` config section.
    Create {
        #[clap(long)]
        name: String,

        /// User id of the commissioner.
        #[clap(long)]
        commissioner: UserId,

        /// Number of teams (8, 10, or 12).
        #[clap(long)]
        capacity: Option<u32>,

        /// Scoring mode: standard or ppr.
        #[clap(long, value_parser = parse_scoring_mode)]
        scoring: Option<ScoringMode>,
    },

    /// Show a league.
    Show {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Join a league with a new team.
    Join {
        #[clap(long, short)]
        league: LeagueId,

        #[clap(long, short)]
        user: UserId,

        /// Team name.
        #[clap(long)]
        team_name: String,
    },

    /// List a league's teams in join order.
    Teams {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Set the league's current season week.
    AdvanceWeek {
        #[clap(long, short)]
        league: LeagueId,

        #[clap(long, short)]
        week: u32,
    },

    /// Release a player from a team's roster.
    DropPlayer {
        #[clap(long)]
        team: TeamId,

        #[clap(long, short)]
        player: PlayerId,
    },
}

#[derive(Debug, Subcommand)]
pub enum PlayersCmd {
    /// Load players from a JSON file (defaults to `data.players` in config).
    Import {
        #[clap(long, short)]
        file: Option<PathBuf>,
    },

    /// Show one player.
    Show {
        #[clap(long, short)]
        player: PlayerId,
    },
}

#[derive(Debug, Subcommand)]
pub enum DraftCmd {
    /// Report whether the draft can start, listing every blocker.
    Validate {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Generate the snake order and open the draft.
    Start {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Draft a player for the user on the clock.
    Pick {
        #[clap(long, short)]
        league: LeagueId,

        #[clap(long, short)]
        user: UserId,

        #[clap(long, short)]
        player: PlayerId,
    },

    /// Show the draft board.
    Status {
        #[clap(long, short)]
        league: LeagueId,

        /// Include whether it is this user's turn.
        #[clap(long, short)]
        user: Option<UserId>,
    },
}

#[derive(Debug, clap::Args)]
pub struct LineupArgs {
    #[clap(long)]
    pub team: TeamId,

    #[clap(long, short)]
    pub league: LeagueId,

    #[clap(long, short)]
    pub week: u32,

    /// Starter player ids, comma separated: `--starters 1,2,3`.
    #[clap(long, value_delimiter = ',')]
    pub starters: Vec<PlayerId>,

    /// Bench player ids, comma separated.
    #[clap(long, value_delimiter = ',')]
    pub bench: Vec<PlayerId>,
}

#[derive(Debug, Subcommand)]
pub enum LineupCmd {
    /// Report every violation without saving.
    Validate {
        #[clap(flatten)]
        args: LineupArgs,
    },

    /// Validate and save; rejected lineups are not written.
    Save {
        #[clap(flatten)]
        args: LineupArgs,
    },

    /// Show the saved lineup for a week.
    Show {
        #[clap(long)]
        team: TeamId,

        #[clap(long, short)]
        week: u32,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCmd {
    /// Build the round-robin schedule from the league's join order.
    Generate {
        #[clap(long, short)]
        league: LeagueId,
    },

    /// Print the saved schedule.
    Show {
        #[clap(long, short)]
        league: LeagueId,

        /// Only this week.
        #[clap(long, short)]
        week: Option<u32>,
    },
}
