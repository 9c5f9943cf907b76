//! # GradPath
//!
//! A criteria-driven program matching and candidate curation engine
//! for study-abroad planning.
//!
//! GradPath derives match criteria from a student profile, runs a
//! staged scoring pipeline (QuickMatch or DeepSearch) over a program
//! corpus with observable progress and cooperative cancellation, and
//! feeds a curated candidate pool with lifecycle states plus an
//! append-only recommendation version history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌───────────┐
//! │ JSON catalog │──▶│  SearchPipeline    │──▶│  SQLite   │
//! │ (programs +  │   │ filter→match→score │   │ pool +    │
//! │  case refs)  │   │ →tier  (+progress) │   │ versions  │
//! └──────────────┘   └─────────┬─────────┘   └────┬──────┘
//!                              │                  │
//!                              ▼                  ▼
//!                        ┌──────────┐       ┌──────────┐
//!                        │  stderr  │       │   CLI    │
//!                        │ progress │       │ (gpath)  │
//!                        └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gpath init                            # create database
//! gpath profile import --file s1.json   # load a student profile
//! gpath match s1 --mode deep --save     # run a generation, archive it
//! gpath pool accept s1 --all            # accept results into the pool
//! gpath pool set s1 <id> --status 通过   # curate
//! gpath versions adopt s1 <version-id>  # mark the adopted version
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`catalog`] | JSON-file program corpus |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite planning-session store |
//! | [`progress`] | stderr progress reporters |
//! | [`match_cmd`] | The `match` command |
//! | [`pool_cmd`] | Candidate pool commands |
//! | [`versions_cmd`] | Version history commands |
//! | [`profile_cmd`] | Profile import/show |

pub mod catalog;
pub mod config;
pub mod db;
pub mod match_cmd;
pub mod migrate;
pub mod pool_cmd;
pub mod profile_cmd;
pub mod progress;
pub mod sqlite_store;
pub mod versions_cmd;
