//! The `gpath match` command.
//!
//! Wires the stored profile, the JSON catalog, and the configured
//! weights/policy into one pipeline run. Progress renders on stderr
//! while stdout carries the results (human or `--json`). Ctrl-C
//! cancels cooperatively: the run stops at its next suspension point
//! and no results are printed.

use anyhow::{Context, Result};
use chrono::Utc;

use gradpath_core::criteria::{BudgetRange, CriteriaPatch, MatchCriteria, SearchMode};
use gradpath_core::models::{RiskPreference, Tier};
use gradpath_core::pipeline::{RunOutcome, SearchPipeline, SearchReport};
use gradpath_core::progress::CancelToken;
use gradpath_core::scoring::TierPolicy;
use gradpath_core::store::PlanStore;
use gradpath_core::versions::build_version;

use crate::catalog::JsonCatalog;
use crate::config::Config;
use crate::db;
use crate::progress::ProgressMode;
use crate::sqlite_store::SqlitePlanStore;

pub struct MatchArgs {
    pub student: String,
    pub mode: SearchMode,
    pub risk: Option<RiskPreference>,
    pub limit: Option<usize>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub save: bool,
    pub json: bool,
    pub progress: ProgressMode,
}

pub async fn run_match(config: &Config, args: MatchArgs) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqlitePlanStore::new(pool);
    let profile = store
        .get_profile(&args.student)
        .await?
        .with_context(|| {
            format!(
                "Profile not found: '{}'. Import one with `gpath profile import`.",
                args.student
            )
        })?;

    let mut patch = CriteriaPatch {
        mode: Some(args.mode),
        ..Default::default()
    };
    if let Some(max) = args.budget_max {
        patch.budget = Some(BudgetRange {
            min: args.budget_min.unwrap_or(0.0),
            max,
            currency: "USD".to_string(),
        });
    }
    let criteria = MatchCriteria::derive(&profile).apply(&patch);

    let catalog = JsonCatalog::load(&config.catalog.path)?;
    let policy = TierPolicy {
        distribution: profile.distribution,
        risk: args.risk.unwrap_or(profile.risk),
        risk_bias: config.matching.risk_bias,
    };
    let mut options = config.pipeline.to_options();
    if let Some(limit) = args.limit {
        options.quick_limit = limit;
    }

    let pipeline = SearchPipeline::new(
        &catalog,
        config.matching.weights.to_weight_config(),
        policy,
    )
    .with_options(options);

    let cancel = CancelToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let reporter = args.progress.reporter();
    let outcome = pipeline.run(&criteria, reporter.as_ref(), &cancel).await?;

    let report = match outcome {
        RunOutcome::Cancelled => {
            eprintln!("match cancelled — no results");
            return Ok(());
        }
        RunOutcome::Completed(report) => report,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if args.save {
        let version = build_version(
            &args.student,
            "gpath",
            criteria.mode.as_str(),
            report.results.clone(),
            Utc::now().timestamp(),
        );
        store.append_version(&args.student, &version).await?;
        println!("Saved version: {}", version.id);
    }

    Ok(())
}

fn print_report(report: &SearchReport) {
    println!(
        "{} results ({} 冲刺 / {} 匹配 / {} 保底), scanned {}, filtered {}, matched {}",
        report.results.len(),
        report.tier_counts.reach,
        report.tier_counts.matched,
        report.tier_counts.safety,
        report.scanned,
        report.filtered,
        report.matched,
    );

    for tier in Tier::ALL {
        let group: Vec<_> = report.results.iter().filter(|r| r.tier == tier).collect();
        if group.is_empty() {
            continue;
        }
        println!();
        println!("{} ({})", tier.label(), group.len());
        for r in group {
            println!("  [{}] {:>5.1}  {} — {}", r.id, r.score, r.school, r.program);
            println!("         {}", r.match_reason);
            if !r.requirement_notes.is_empty() {
                println!("         {}", r.requirement_notes.join(" · "));
            }
            for case in &r.similar_cases {
                println!("         case: {} ({})", case.title, case.outcome);
            }
        }
    }
}
