use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Student profiles (free-text intake fields plus targets)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            undergraduate_school TEXT NOT NULL DEFAULT '',
            gpa_text TEXT NOT NULL DEFAULT '',
            language_text TEXT NOT NULL DEFAULT '',
            test_text TEXT NOT NULL DEFAULT '',
            target_countries TEXT NOT NULL DEFAULT '[]',
            target_programs TEXT NOT NULL DEFAULT '[]',
            intake_term TEXT,
            reach_pct REAL NOT NULL DEFAULT 20.0,
            match_pct REAL NOT NULL DEFAULT 50.0,
            safety_pct REAL NOT NULL DEFAULT 30.0,
            risk TEXT NOT NULL DEFAULT '均衡'
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Candidate pool entries, one row per curated program
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            school TEXT NOT NULL,
            program TEXT NOT NULL,
            source TEXT NOT NULL,
            stage TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            owner TEXT NOT NULL DEFAULT '',
            match_score REAL,
            match_reason TEXT,
            rationale TEXT,
            added_at INTEGER NOT NULL,
            UNIQUE(student_id, school, program)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidates_student ON candidates(student_id)",
    )
    .execute(&pool)
    .await?;

    // Recommendation versions: append-only result-set snapshots
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            student_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            summary TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            adopted INTEGER NOT NULL DEFAULT 0,
            results_json TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_versions_student ON versions(student_id)")
        .execute(&pool)
        .await?;

    println!("Database initialized: {}", config.db.path.display());
    Ok(())
}
