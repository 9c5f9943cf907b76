//! # GradPath CLI (`gpath`)
//!
//! The `gpath` binary is the primary interface for GradPath. It
//! provides commands for database initialization, profile intake,
//! recommendation generation, candidate pool curation, and version
//! history management.
//!
//! ## Usage
//!
//! ```bash
//! gpath --config ./config/gpath.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gpath init` | Create the SQLite database and run schema migrations |
//! | `gpath profile import` | Import a student profile from JSON |
//! | `gpath profile show <student>` | Show a profile (and derived criteria) |
//! | `gpath match <student>` | Run a QuickMatch or DeepSearch generation |
//! | `gpath pool list <student>` | List/filter the candidate pool |
//! | `gpath pool accept <student>` | Accept saved results into the pool |
//! | `gpath pool set <student> <id>` | Change a candidate's stage/status |
//! | `gpath pool stats <student>` | Pool counts by stage/status/source |
//! | `gpath versions list <student>` | List recommendation versions |
//! | `gpath versions adopt <student> <id>` | Mark the adopted version |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gradpath::config::load_config;
use gradpath::match_cmd::{self, MatchArgs};
use gradpath::migrate;
use gradpath::pool_cmd::{self, AcceptArgs, AddArgs, ListArgs, SetArgs};
use gradpath::profile_cmd;
use gradpath::progress::ProgressMode;
use gradpath::versions_cmd;

/// GradPath CLI — a criteria-driven program matching and candidate
/// curation engine for study-abroad planning.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file with the database path, catalog path, weight
/// sliders, and pipeline tuning.
#[derive(Parser)]
#[command(
    name = "gpath",
    about = "GradPath — criteria-driven program matching and candidate curation",
    version,
    long_about = "GradPath derives match criteria from a student profile, runs a staged \
    scoring pipeline over a program corpus with live progress and Ctrl-C cancellation, \
    and curates the results into a candidate pool with stage/status lifecycle and an \
    append-only recommendation version history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gpath.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (profiles, candidates, versions). Idempotent — running it
    /// multiple times is safe.
    Init,

    /// Manage student profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Run a recommendation generation for a student.
    ///
    /// QuickMatch does a single filter-and-score pass; DeepSearch runs
    /// the full staged pipeline (parsing → loading → initialFilter →
    /// conditionMatch → deepAnalysis → scoring → caseComparison →
    /// sorting) with live progress on stderr. Requires at least one
    /// target country and one target program on the profile.
    Match {
        /// Student id (profile must be imported first).
        student: String,

        /// Search mode: `quick` or `deep`.
        #[arg(long, default_value = "quick")]
        mode: String,

        /// Override the profile's risk preference:
        /// 稳健/均衡/进取 (conservative/balanced/aggressive).
        #[arg(long)]
        risk: Option<String>,

        /// Result cap for quick mode.
        #[arg(long)]
        limit: Option<usize>,

        /// Annual budget floor (USD).
        #[arg(long)]
        budget_min: Option<f64>,

        /// Annual budget ceiling (USD).
        #[arg(long)]
        budget_max: Option<f64>,

        /// Archive the completed run as a recommendation version.
        #[arg(long)]
        save: bool,

        /// Print the report as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Curate the candidate pool.
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },

    /// Inspect and adopt recommendation versions.
    Versions {
        #[command(subcommand)]
        action: VersionsAction,
    },
}

/// Profile management subcommands.
#[derive(Subcommand)]
enum ProfileAction {
    /// Import (or replace) a student profile from a JSON file.
    Import {
        /// Path to the profile JSON document.
        #[arg(long)]
        file: PathBuf,
    },
    /// Show a stored profile.
    Show {
        /// Student id.
        student: String,
        /// Also print the match criteria derived from the profile.
        #[arg(long)]
        criteria: bool,
    },
}

/// Candidate pool subcommands.
#[derive(Subcommand)]
enum PoolAction {
    /// List pool entries, optionally filtered.
    ///
    /// All provided filters combine with AND; `--text` matches
    /// case-insensitively against school, program, and notes.
    List {
        /// Student id.
        student: String,
        /// Free-text filter.
        #[arg(long)]
        text: Option<String>,
        /// Stage filter: 冲刺/匹配/保底 (reach/match/safety).
        #[arg(long)]
        stage: Option<String>,
        /// Status filter: 待讨论/通过/淘汰 (pending/approved/rejected).
        #[arg(long)]
        status: Option<String>,
        /// Source filter: AI推荐/人工添加 (ai/manual).
        #[arg(long)]
        source: Option<String>,
        /// Print entries as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Add a manual candidate to the pool.
    Add {
        /// Student id.
        student: String,
        /// School name.
        #[arg(long)]
        school: String,
        /// Program name.
        #[arg(long)]
        program: String,
        /// Stage: 冲刺/匹配/保底 (reach/match/safety).
        #[arg(long, default_value = "匹配")]
        stage: String,
        /// Free-form notes.
        #[arg(long, default_value = "")]
        notes: String,
        /// Owner (advisor) of the entry.
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Accept results from a saved version into the pool.
    ///
    /// Results whose (school, program) already exists in the pool are
    /// skipped; the rest of the batch proceeds.
    Accept {
        /// Student id.
        student: String,
        /// Version id to accept from (defaults to the most recent).
        #[arg(long)]
        version: Option<String>,
        /// Comma-separated result ids to accept.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// Accept every result in the version.
        #[arg(long)]
        all: bool,
        /// Owner (advisor) for the new entries.
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Change a candidate's stage and/or status.
    Set {
        /// Student id.
        student: String,
        /// Candidate id (from `pool list`).
        id: String,
        /// New stage: 冲刺/匹配/保底 (reach/match/safety).
        #[arg(long)]
        stage: Option<String>,
        /// New status: 待讨论/通过/淘汰 (pending/approved/rejected).
        #[arg(long)]
        status: Option<String>,
    },
    /// Pool counts by stage, status, and source.
    Stats {
        /// Student id.
        student: String,
    },
}

/// Version history subcommands.
#[derive(Subcommand)]
enum VersionsAction {
    /// List versions in append order; `*` marks the adopted one.
    List {
        /// Student id.
        student: String,
        /// Print versions as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Mark a version as adopted, clearing the previous adoption.
    Adopt {
        /// Student id.
        student: String,
        /// Version id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => migrate::run_migrations(&config).await,

        Commands::Profile { action } => match action {
            ProfileAction::Import { file } => profile_cmd::run_import(&config, &file).await,
            ProfileAction::Show { student, criteria } => {
                profile_cmd::run_show(&config, &student, criteria).await
            }
        },

        Commands::Match {
            student,
            mode,
            risk,
            limit,
            budget_min,
            budget_max,
            save,
            json,
            progress,
        } => {
            let progress = match progress {
                Some(value) => ProgressMode::parse(&value)?,
                None => ProgressMode::default_for_tty(),
            };
            let args = MatchArgs {
                student,
                mode: mode.parse()?,
                risk: risk.map(|r| r.parse()).transpose()?,
                limit,
                budget_min,
                budget_max,
                save,
                json,
                progress,
            };
            match_cmd::run_match(&config, args).await
        }

        Commands::Pool { action } => match action {
            PoolAction::List {
                student,
                text,
                stage,
                status,
                source,
                json,
            } => {
                pool_cmd::run_list(
                    &config,
                    ListArgs {
                        student,
                        text,
                        stage: stage.map(|s| s.parse()).transpose()?,
                        status: status.map(|s| s.parse()).transpose()?,
                        source: source.map(|s| s.parse()).transpose()?,
                        json,
                    },
                )
                .await
            }
            PoolAction::Add {
                student,
                school,
                program,
                stage,
                notes,
                owner,
            } => {
                pool_cmd::run_add(
                    &config,
                    AddArgs {
                        student,
                        school,
                        program,
                        stage: stage.parse()?,
                        notes,
                        owner,
                    },
                )
                .await
            }
            PoolAction::Accept {
                student,
                version,
                ids,
                all,
                owner,
            } => {
                pool_cmd::run_accept(
                    &config,
                    AcceptArgs {
                        student,
                        version,
                        ids,
                        all,
                        owner,
                    },
                )
                .await
            }
            PoolAction::Set {
                student,
                id,
                stage,
                status,
            } => {
                pool_cmd::run_set(
                    &config,
                    SetArgs {
                        student,
                        id,
                        stage: stage.map(|s| s.parse()).transpose()?,
                        status: status.map(|s| s.parse()).transpose()?,
                    },
                )
                .await
            }
            PoolAction::Stats { student } => pool_cmd::run_stats(&config, &student).await,
        },

        Commands::Versions { action } => match action {
            VersionsAction::List { student, json } => {
                versions_cmd::run_list(&config, &student, json).await
            }
            VersionsAction::Adopt { student, id } => {
                versions_cmd::run_adopt(&config, &student, &id).await
            }
        },
    }
}
