//! Recommendation version history commands.

use anyhow::Result;

use gradpath_core::models::format_ts_iso;
use gradpath_core::store::PlanStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqlitePlanStore;

pub async fn run_list(config: &Config, student: &str, json: bool) -> Result<()> {
    let store = SqlitePlanStore::new(db::connect(config).await?);
    let versions = store.load_versions(student).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No versions recorded for '{}'.", student);
        return Ok(());
    }
    for v in &versions {
        let marker = if v.adopted { "*" } else { " " };
        println!(
            "{} {}  {}  {}  {}",
            marker,
            v.id,
            format_ts_iso(v.created_at),
            v.created_by,
            v.summary
        );
    }
    Ok(())
}

pub async fn run_adopt(config: &Config, student: &str, version_id: &str) -> Result<()> {
    let store = SqlitePlanStore::new(db::connect(config).await?);
    store.mark_adopted(student, version_id).await?;
    println!("Adopted version: {}", version_id);
    Ok(())
}
