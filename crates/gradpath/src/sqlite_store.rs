//! SQLite-backed [`PlanStore`] implementation.
//!
//! Maps each [`PlanStore`] operation to SQL against the schema created
//! by [`crate::migrate`]. Pool saves and adoption flips run inside a
//! transaction so a student's planning state never becomes partially
//! written.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use gradpath_core::models::{
    CandidateProgram, RecommendationVersion, RiskPreference, StudentProfile, TargetDistribution,
};
use gradpath_core::store::PlanStore;

/// SQLite implementation of the [`PlanStore`] trait.
pub struct SqlitePlanStore {
    pool: SqlitePool,
}

impl SqlitePlanStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_candidate(row: &sqlx::sqlite::SqliteRow) -> Result<CandidateProgram> {
    Ok(CandidateProgram {
        id: row.try_get("id")?,
        school: row.try_get("school")?,
        program: row.try_get("program")?,
        source: row.try_get::<String, _>("source")?.parse()?,
        stage: row.try_get::<String, _>("stage")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        notes: row.try_get("notes")?,
        owner: row.try_get("owner")?,
        match_score: row.try_get("match_score")?,
        match_reason: row.try_get("match_reason")?,
        rationale: row.try_get("rationale")?,
        added_at: row.try_get("added_at")?,
    })
}

#[async_trait]
impl PlanStore for SqlitePlanStore {
    async fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let countries: Vec<String> =
            serde_json::from_str(&row.try_get::<String, _>("target_countries")?)
                .unwrap_or_default();
        let programs: Vec<String> =
            serde_json::from_str(&row.try_get::<String, _>("target_programs")?)
                .unwrap_or_default();
        let risk: RiskPreference = row
            .try_get::<String, _>("risk")?
            .parse()
            .unwrap_or_default();

        Ok(Some(StudentProfile {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            undergraduate_school: row.try_get("undergraduate_school")?,
            gpa_text: row.try_get("gpa_text")?,
            language_text: row.try_get("language_text")?,
            test_text: row.try_get("test_text")?,
            target_countries: countries,
            target_programs: programs,
            intake_term: row.try_get("intake_term")?,
            distribution: TargetDistribution {
                reach_pct: row.try_get("reach_pct")?,
                match_pct: row.try_get("match_pct")?,
                safety_pct: row.try_get("safety_pct")?,
            },
            risk,
        }))
    }

    async fn put_profile(&self, profile: &StudentProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, undergraduate_school, gpa_text, language_text,
                                  test_text, target_countries, target_programs, intake_term,
                                  reach_pct, match_pct, safety_pct, risk)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                undergraduate_school = excluded.undergraduate_school,
                gpa_text = excluded.gpa_text,
                language_text = excluded.language_text,
                test_text = excluded.test_text,
                target_countries = excluded.target_countries,
                target_programs = excluded.target_programs,
                intake_term = excluded.intake_term,
                reach_pct = excluded.reach_pct,
                match_pct = excluded.match_pct,
                safety_pct = excluded.safety_pct,
                risk = excluded.risk
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.undergraduate_school)
        .bind(&profile.gpa_text)
        .bind(&profile.language_text)
        .bind(&profile.test_text)
        .bind(serde_json::to_string(&profile.target_countries)?)
        .bind(serde_json::to_string(&profile.target_programs)?)
        .bind(&profile.intake_term)
        .bind(profile.distribution.reach_pct)
        .bind(profile.distribution.match_pct)
        .bind(profile.distribution.safety_pct)
        .bind(profile.risk.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_pool(&self, student_id: &str) -> Result<Vec<CandidateProgram>> {
        let rows = sqlx::query(
            "SELECT * FROM candidates WHERE student_id = ? ORDER BY added_at ASC, id ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_candidate).collect()
    }

    async fn save_pool(&self, student_id: &str, entries: &[CandidateProgram]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM candidates WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO candidates (id, student_id, school, program, source, stage,
                                        status, notes, owner, match_score, match_reason,
                                        rationale, added_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(student_id)
            .bind(&entry.school)
            .bind(&entry.program)
            .bind(entry.source.to_string())
            .bind(entry.stage.to_string())
            .bind(entry.status.to_string())
            .bind(&entry.notes)
            .bind(&entry.owner)
            .bind(entry.match_score)
            .bind(&entry.match_reason)
            .bind(&entry.rationale)
            .bind(entry.added_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_versions(&self, student_id: &str) -> Result<Vec<RecommendationVersion>> {
        let rows = sqlx::query("SELECT * FROM versions WHERE student_id = ? ORDER BY seq ASC")
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let results = serde_json::from_str(&row.try_get::<String, _>("results_json")?)?;
                Ok(RecommendationVersion {
                    id: row.try_get("id")?,
                    student_id: row.try_get("student_id")?,
                    created_at: row.try_get("created_at")?,
                    created_by: row.try_get("created_by")?,
                    summary: row.try_get("summary")?,
                    content_hash: row.try_get("content_hash")?,
                    adopted: row.try_get::<i64, _>("adopted")? != 0,
                    results,
                })
            })
            .collect()
    }

    async fn append_version(
        &self,
        student_id: &str,
        version: &RecommendationVersion,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO versions (id, student_id, created_at, created_by, summary,
                                  content_hash, adopted, results_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.id)
        .bind(student_id)
        .bind(version.created_at)
        .bind(&version.created_by)
        .bind(&version.summary)
        .bind(&version.content_hash)
        .bind(version.adopted as i64)
        .bind(serde_json::to_string(&version.results)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_adopted(&self, student_id: &str, version_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM versions WHERE student_id = ? AND id = ?")
                .bind(student_id)
                .bind(version_id)
                .fetch_one(&mut *tx)
                .await?;
        if exists == 0 {
            bail!("Version not found: '{}'.", version_id);
        }

        sqlx::query("UPDATE versions SET adopted = 0 WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE versions SET adopted = 1 WHERE student_id = ? AND id = ?")
            .bind(student_id)
            .bind(version_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
