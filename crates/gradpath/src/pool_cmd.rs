//! Candidate pool commands.
//!
//! Each command is one serialized write for the student's session:
//! load the pool, apply a single mutation through
//! [`CandidatePool`], and save it back in one transaction.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use gradpath_core::models::{CandidateSource, CandidateStatus, Tier};
use gradpath_core::pool::{CandidatePool, NewCandidate, PoolQuery, TransitionPatch};
use gradpath_core::store::PlanStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqlitePlanStore;

async fn open_store(config: &Config) -> Result<SqlitePlanStore> {
    Ok(SqlitePlanStore::new(db::connect(config).await?))
}

pub struct ListArgs {
    pub student: String,
    pub text: Option<String>,
    pub stage: Option<Tier>,
    pub status: Option<CandidateStatus>,
    pub source: Option<CandidateSource>,
    pub json: bool,
}

pub async fn run_list(config: &Config, args: ListArgs) -> Result<()> {
    let store = open_store(config).await?;
    let pool = CandidatePool::from_entries(store.load_pool(&args.student).await?);

    let query = PoolQuery {
        text: args.text,
        stage: args.stage,
        status: args.status,
        source: args.source,
    };
    let hits = pool.filter(&query);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No candidates match the filter.");
        return Ok(());
    }
    for entry in hits {
        let score = entry
            .match_score
            .map(|s| format!("{:>5.1}", s))
            .unwrap_or_else(|| "    -".to_string());
        println!(
            "[{}] {}  {} / {} / {}  {} — {}",
            entry.id,
            score,
            entry.stage,
            entry.status,
            entry.source,
            entry.school,
            entry.program
        );
        if !entry.notes.is_empty() {
            println!("       {}", entry.notes);
        }
    }
    Ok(())
}

pub struct AddArgs {
    pub student: String,
    pub school: String,
    pub program: String,
    pub stage: Tier,
    pub notes: String,
    pub owner: String,
}

pub async fn run_add(config: &Config, args: AddArgs) -> Result<()> {
    let store = open_store(config).await?;
    let mut pool = CandidatePool::from_entries(store.load_pool(&args.student).await?);

    let entry = pool
        .add_manual(
            NewCandidate {
                school: args.school,
                program: args.program,
                stage: args.stage,
                notes: args.notes,
                owner: args.owner,
            },
            Utc::now().timestamp(),
        )?
        .clone();

    store.save_pool(&args.student, pool.entries()).await?;
    println!(
        "Added candidate [{}]: {} — {} ({})",
        entry.id, entry.school, entry.program, entry.stage
    );
    Ok(())
}

pub struct AcceptArgs {
    pub student: String,
    /// Version to accept from; defaults to the most recent.
    pub version: Option<String>,
    /// Result ids to accept. Ignored when `all` is set.
    pub ids: Vec<String>,
    pub all: bool,
    pub owner: String,
}

pub async fn run_accept(config: &Config, args: AcceptArgs) -> Result<()> {
    let store = open_store(config).await?;
    let versions = store.load_versions(&args.student).await?;

    let version = match &args.version {
        Some(id) => versions
            .iter()
            .find(|v| &v.id == id)
            .with_context(|| format!("Version not found: '{}'.", id))?,
        None => versions
            .last()
            .context("No saved versions. Run `gpath match --save` first.")?,
    };

    let selected: Vec<_> = version
        .results
        .iter()
        .filter(|r| args.all || args.ids.iter().any(|id| id == &r.id))
        .cloned()
        .collect();
    if selected.is_empty() {
        bail!("No results selected. Pass --all or --ids with ids from the version.");
    }

    let mut pool = CandidatePool::from_entries(store.load_pool(&args.student).await?);
    let inserted = pool.accept_results(&selected, &args.owner, Utc::now().timestamp());
    store.save_pool(&args.student, pool.entries()).await?;

    println!(
        "Accepted {} of {} selected into the pool ({} duplicates skipped)",
        inserted.len(),
        selected.len(),
        selected.len() - inserted.len()
    );
    Ok(())
}

pub struct SetArgs {
    pub student: String,
    pub id: String,
    pub stage: Option<Tier>,
    pub status: Option<CandidateStatus>,
}

pub async fn run_set(config: &Config, args: SetArgs) -> Result<()> {
    if args.stage.is_none() && args.status.is_none() {
        bail!("Nothing to change: pass --stage and/or --status.");
    }

    let store = open_store(config).await?;
    let mut pool = CandidatePool::from_entries(store.load_pool(&args.student).await?);

    let updated = pool
        .transition(
            &args.id,
            TransitionPatch {
                stage: args.stage,
                status: args.status,
            },
        )?
        .clone();

    store.save_pool(&args.student, pool.entries()).await?;
    println!(
        "Updated [{}]: {} — {} is now {} / {}",
        updated.id, updated.school, updated.program, updated.stage, updated.status
    );
    Ok(())
}

pub async fn run_stats(config: &Config, student: &str) -> Result<()> {
    let store = open_store(config).await?;
    let pool = CandidatePool::from_entries(store.load_pool(student).await?);
    let stats = pool.stats();

    println!("Candidate pool — {}", student);
    println!("  Total:     {}", stats.total);
    println!(
        "  Stage:     {} 冲刺 / {} 匹配 / {} 保底",
        stats.reach, stats.matched, stats.safety
    );
    println!(
        "  Status:    {} 待讨论 / {} 通过 / {} 淘汰",
        stats.pending, stats.approved, stats.rejected
    );
    println!(
        "  Source:    {} AI推荐 / {} 人工添加",
        stats.recommended, stats.manual
    );

    let versions = store.load_versions(student).await?;
    if let Some(adopted) = versions.iter().find(|v| v.adopted) {
        println!("  Adopted:   {} ({})", adopted.id, adopted.summary);
    }
    Ok(())
}
