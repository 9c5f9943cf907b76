//! Recommendation version history.
//!
//! Every completed generation run can be archived as an immutable
//! [`RecommendationVersion`]. The log is append-only — corrections
//! append new versions, never rewrite history — and at most one version
//! is adopted per student at any time.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{RecommendationResult, RecommendationVersion, Tier};

/// Build a version snapshot from a completed run.
///
/// The summary records mode and tier counts; the content hash is sha256
/// over the ordered result ids, so two snapshots of the same result set
/// are recognizable without diffing payloads.
pub fn build_version(
    student_id: &str,
    created_by: &str,
    mode: &str,
    results: Vec<RecommendationResult>,
    now: i64,
) -> RecommendationVersion {
    let reach = results.iter().filter(|r| r.tier == Tier::Reach).count();
    let matched = results.iter().filter(|r| r.tier == Tier::Match).count();
    let safety = results.iter().filter(|r| r.tier == Tier::Safety).count();

    let mut hasher = Sha256::new();
    for r in &results {
        hasher.update(r.id.as_bytes());
        hasher.update(b"\n");
    }
    let content_hash = format!("{:x}", hasher.finalize());

    RecommendationVersion {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        created_at: now,
        created_by: created_by.to_string(),
        summary: format!(
            "{} run, {} results ({} 冲刺 / {} 匹配 / {} 保底)",
            mode,
            results.len(),
            reach,
            matched,
            safety
        ),
        content_hash,
        adopted: false,
        results,
    }
}

/// Append-only log of one student's versions.
#[derive(Debug, Clone, Default)]
pub struct VersionLog {
    versions: Vec<RecommendationVersion>,
}

impl VersionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_versions(versions: Vec<RecommendationVersion>) -> Self {
        Self { versions }
    }

    /// Versions in append order.
    pub fn versions(&self) -> &[RecommendationVersion] {
        &self.versions
    }

    pub fn into_versions(self) -> Vec<RecommendationVersion> {
        self.versions
    }

    pub fn append(&mut self, version: RecommendationVersion) -> &RecommendationVersion {
        self.versions.push(version);
        let idx = self.versions.len() - 1;
        &self.versions[idx]
    }

    /// Mark `id` adopted, clearing any previously adopted version.
    /// Unknown ids are a lookup failure that leaves the log unchanged.
    pub fn adopt(&mut self, id: &str) -> Result<()> {
        if !self.versions.iter().any(|v| v.id == id) {
            bail!("Version not found: '{}'.", id);
        }
        for v in self.versions.iter_mut() {
            v.adopted = v.id == id;
        }
        Ok(())
    }

    pub fn adopted(&self) -> Option<&RecommendationVersion> {
        self.versions.iter().find(|v| v.adopted)
    }
}
