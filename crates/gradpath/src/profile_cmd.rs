//! Profile import and inspection commands.
//!
//! Profiles enter the system as JSON documents from the intake
//! collaborator; the core never embeds sample data. `show --criteria`
//! prints the match criteria the builder derives from the stored
//! free-text fields, which is the fastest way to check that a profile
//! parses the way an advisor expects.

use std::path::Path;

use anyhow::{Context, Result};

use gradpath_core::criteria::MatchCriteria;
use gradpath_core::models::StudentProfile;
use gradpath_core::store::PlanStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqlitePlanStore;

pub async fn run_import(config: &Config, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read profile file: {}", file.display()))?;
    let profile: StudentProfile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse profile file: {}", file.display()))?;

    let pool = db::connect(config).await?;
    let store = SqlitePlanStore::new(pool);
    store.put_profile(&profile).await?;

    println!("Profile imported: {} ({})", profile.name, profile.id);
    Ok(())
}

pub async fn run_show(config: &Config, student: &str, show_criteria: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqlitePlanStore::new(pool);
    let profile = store
        .get_profile(student)
        .await?
        .with_context(|| format!("Profile not found: '{}'.", student))?;

    println!("Student:        {} ({})", profile.name, profile.id);
    println!("Undergraduate:  {}", profile.undergraduate_school);
    println!("GPA:            {}", profile.gpa_text);
    println!("Language:       {}", profile.language_text);
    println!("Tests:          {}", profile.test_text);
    println!("Countries:      {}", profile.target_countries.join(", "));
    println!("Programs:       {}", profile.target_programs.join(", "));
    if let Some(term) = &profile.intake_term {
        println!("Intake:         {}", term);
    }
    println!(
        "Distribution:   {:.0} 冲刺 / {:.0} 匹配 / {:.0} 保底, risk {}",
        profile.distribution.reach_pct,
        profile.distribution.match_pct,
        profile.distribution.safety_pct,
        profile.risk
    );

    if show_criteria {
        let criteria = MatchCriteria::derive(&profile);
        println!();
        println!("Derived criteria:");
        println!("{}", serde_json::to_string_pretty(&criteria)?);
        if !criteria.can_generate() {
            println!();
            println!("Note: generation is blocked until at least one target country and one target program are set.");
        }
    }

    Ok(())
}
