//! The curated candidate pool.
//!
//! A [`CandidatePool`] is the mutable, human-curated set of programs a
//! student is actively tracking, merged from accepted recommendations
//! and manual entries. Entries change only through the explicit
//! operations here — accept, add, transition, full-record update —
//! never by silent merging. The pool is a single-writer structure per
//! student session; persistence wraps it through
//! [`crate::store::PlanStore`].

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CandidateProgram, CandidateSource, CandidateStatus, RecommendationResult, Tier,
};

/// Input for a manually added pool entry.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub school: String,
    pub program: String,
    pub stage: Tier,
    pub notes: String,
    pub owner: String,
}

/// Stage/status transition. Only the named fields change.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPatch {
    pub stage: Option<Tier>,
    pub status: Option<CandidateStatus>,
}

/// Pool filter. All provided fields combine with logical AND; `text`
/// matches case-insensitively against school, program, and notes.
#[derive(Debug, Clone, Default)]
pub struct PoolQuery {
    pub text: Option<String>,
    pub stage: Option<Tier>,
    pub status: Option<CandidateStatus>,
    pub source: Option<CandidateSource>,
}

/// Aggregate pool counts by stage, status, and source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub reach: usize,
    pub matched: usize,
    pub safety: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub recommended: usize,
    pub manual: usize,
}

/// One student's candidate pool.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: Vec<CandidateProgram>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<CandidateProgram>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CandidateProgram] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CandidateProgram> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, school: &str, program: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.school == school && e.program == program)
    }

    /// Accept recommendation results into the pool.
    ///
    /// Each result becomes an AI-sourced entry at its tier with status
    /// 待讨论. Results whose (school, program) already exists in the
    /// pool are skipped silently — the rest of the batch proceeds.
    /// Returns the ids of the entries actually inserted.
    pub fn accept_results(
        &mut self,
        results: &[RecommendationResult],
        owner: &str,
        now: i64,
    ) -> Vec<String> {
        let mut inserted = Vec::new();
        for result in results {
            if self.contains(&result.school, &result.program) {
                continue;
            }
            let entry = CandidateProgram {
                id: Uuid::new_v4().to_string(),
                school: result.school.clone(),
                program: result.program.clone(),
                source: CandidateSource::Recommended,
                stage: result.tier,
                status: CandidateStatus::Pending,
                notes: String::new(),
                owner: owner.to_string(),
                match_score: Some(result.score),
                match_reason: Some(result.match_reason.clone()),
                rationale: Some(result.rationale.clone()),
                added_at: now,
            };
            inserted.push(entry.id.clone());
            self.entries.push(entry);
        }
        inserted
    }

    /// Add a manually entered candidate. An existing (school, program)
    /// pair is an explicit error, never an overwrite.
    pub fn add_manual(&mut self, candidate: NewCandidate, now: i64) -> Result<&CandidateProgram> {
        if self.contains(&candidate.school, &candidate.program) {
            bail!(
                "Candidate already in pool: {} {}.",
                candidate.school,
                candidate.program
            );
        }
        let entry = CandidateProgram {
            id: Uuid::new_v4().to_string(),
            school: candidate.school,
            program: candidate.program,
            source: CandidateSource::Manual,
            stage: candidate.stage,
            status: CandidateStatus::Pending,
            notes: candidate.notes,
            owner: candidate.owner,
            match_score: None,
            match_reason: None,
            rationale: None,
            added_at: now,
        };
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        Ok(&self.entries[idx])
    }

    /// Apply a stage/status transition to one entry by id.
    ///
    /// Unknown ids are a lookup failure; the pool is left unchanged.
    pub fn transition(&mut self, id: &str, patch: TransitionPatch) -> Result<&CandidateProgram> {
        let entry = match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry,
            None => bail!("Candidate not found: '{}'.", id),
        };
        if let Some(stage) = patch.stage {
            entry.stage = stage;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        Ok(entry)
    }

    /// Replace one entry with a full updated record, keyed by id.
    ///
    /// Callers supply the complete record; the pool never merges
    /// partial updates from different writers into one entry.
    pub fn update(&mut self, candidate: CandidateProgram) -> Result<()> {
        match self.entries.iter_mut().find(|e| e.id == candidate.id) {
            Some(entry) => {
                *entry = candidate;
                Ok(())
            }
            None => bail!("Candidate not found: '{}'.", candidate.id),
        }
    }

    /// Filter entries; all provided query fields AND together.
    pub fn filter(&self, query: &PoolQuery) -> Vec<&CandidateProgram> {
        let needle = query.text.as_ref().map(|t| t.to_lowercase());
        self.entries
            .iter()
            .filter(|e| {
                if let Some(stage) = query.stage {
                    if e.stage != stage {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if e.status != status {
                        return false;
                    }
                }
                if let Some(source) = query.source {
                    if e.source != source {
                        return false;
                    }
                }
                if let Some(ref needle) = needle {
                    let hit = e.school.to_lowercase().contains(needle)
                        || e.program.to_lowercase().contains(needle)
                        || e.notes.to_lowercase().contains(needle);
                    if !hit {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total: self.entries.len(),
            ..Default::default()
        };
        for e in &self.entries {
            match e.stage {
                Tier::Reach => stats.reach += 1,
                Tier::Match => stats.matched += 1,
                Tier::Safety => stats.safety += 1,
            }
            match e.status {
                CandidateStatus::Pending => stats.pending += 1,
                CandidateStatus::Approved => stats.approved += 1,
                CandidateStatus::Rejected => stats.rejected += 1,
            }
            match e.source {
                CandidateSource::Recommended => stats.recommended += 1,
                CandidateSource::Manual => stats.manual += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(school: &str, program: &str, tier: Tier) -> RecommendationResult {
        RecommendationResult {
            id: Uuid::new_v4().to_string(),
            school: school.to_string(),
            program: program.to_string(),
            tier,
            score: 80.0,
            match_reason: "strong fit".to_string(),
            rationale: "matches research interests".to_string(),
            highlights: vec![],
            requirement_notes: vec![],
            similar_cases: vec![],
            selected: true,
        }
    }

    #[test]
    fn accept_twice_adds_only_distinct_pairs() {
        let mut pool = CandidatePool::new();
        let batch_a = vec![
            result("CMU", "MSCS", Tier::Reach),
            result("UIUC", "MCS", Tier::Match),
        ];
        let batch_b = vec![
            result("CMU", "MSCS", Tier::Reach), // overlap
            result("NEU", "MSCS", Tier::Safety),
        ];

        let first = pool.accept_results(&batch_a, "advisor", 100);
        let second = pool.accept_results(&batch_b, "advisor", 101);

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(pool.len(), 3);

        let entry = &pool.entries()[0];
        assert_eq!(entry.source, CandidateSource::Recommended);
        assert_eq!(entry.status, CandidateStatus::Pending);
        assert_eq!(entry.stage, Tier::Reach);
        assert_eq!(entry.match_score, Some(80.0));
    }

    #[test]
    fn manual_duplicate_is_an_explicit_error() {
        let mut pool = CandidatePool::new();
        pool.accept_results(&[result("CMU", "MSCS", Tier::Reach)], "advisor", 100);

        let dup = pool.add_manual(
            NewCandidate {
                school: "CMU".to_string(),
                program: "MSCS".to_string(),
                stage: Tier::Match,
                notes: String::new(),
                owner: "advisor".to_string(),
            },
            101,
        );
        assert!(dup.is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn transition_updates_only_named_fields() {
        let mut pool = CandidatePool::new();
        let ids = pool.accept_results(&[result("CMU", "MSCS", Tier::Reach)], "advisor", 100);

        pool.transition(
            &ids[0],
            TransitionPatch {
                status: Some(CandidateStatus::Approved),
                stage: None,
            },
        )
        .unwrap();

        let entry = &pool.entries()[0];
        assert_eq!(entry.status, CandidateStatus::Approved);
        assert_eq!(entry.stage, Tier::Reach, "stage must be untouched");
    }

    #[test]
    fn transition_missing_id_leaves_pool_unchanged() {
        let mut pool = CandidatePool::new();
        pool.accept_results(&[result("CMU", "MSCS", Tier::Reach)], "advisor", 100);
        let before = pool.entries().to_vec();

        let outcome = pool.transition(
            "missing-id",
            TransitionPatch {
                status: Some(CandidateStatus::Approved),
                stage: None,
            },
        );

        assert!(outcome.is_err());
        assert_eq!(pool.len(), before.len());
        assert_eq!(pool.entries()[0].status, before[0].status);
    }

    #[test]
    fn update_replaces_the_full_record_by_id() {
        let mut pool = CandidatePool::new();
        let ids = pool.accept_results(&[result("CMU", "MSCS", Tier::Reach)], "advisor", 100);

        let mut replacement = pool.entries()[0].clone();
        replacement.notes = "面谈后更新".to_string();
        replacement.owner = "lead-advisor".to_string();
        pool.update(replacement).unwrap();

        let entry = &pool.entries()[0];
        assert_eq!(entry.id, ids[0]);
        assert_eq!(entry.notes, "面谈后更新");
        assert_eq!(entry.owner, "lead-advisor");

        let mut missing = pool.entries()[0].clone();
        missing.id = "missing-id".to_string();
        assert!(pool.update(missing).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn filter_by_status_returns_exactly_approved() {
        let mut pool = CandidatePool::new();
        let ids = pool.accept_results(
            &[
                result("CMU", "MSCS", Tier::Reach),
                result("UIUC", "MCS", Tier::Match),
                result("NEU", "MSCS", Tier::Safety),
            ],
            "advisor",
            100,
        );
        pool.transition(
            &ids[1],
            TransitionPatch {
                status: Some(CandidateStatus::Approved),
                stage: None,
            },
        )
        .unwrap();
        pool.transition(
            &ids[2],
            TransitionPatch {
                status: Some(CandidateStatus::Rejected),
                stage: None,
            },
        )
        .unwrap();

        let approved = pool.filter(&PoolQuery {
            status: Some(CandidateStatus::Approved),
            ..Default::default()
        });
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].school, "UIUC");
    }

    #[test]
    fn filters_combine_with_and() {
        let mut pool = CandidatePool::new();
        pool.accept_results(
            &[
                result("CMU", "MSCS", Tier::Reach),
                result("CMU", "MSML", Tier::Match),
            ],
            "advisor",
            100,
        );

        let hits = pool.filter(&PoolQuery {
            text: Some("cmu".to_string()),
            stage: Some(Tier::Match),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].program, "MSML");

        let none = pool.filter(&PoolQuery {
            text: Some("stanford".to_string()),
            stage: Some(Tier::Match),
            ..Default::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn stats_count_all_axes() {
        let mut pool = CandidatePool::new();
        let ids = pool.accept_results(
            &[
                result("CMU", "MSCS", Tier::Reach),
                result("UIUC", "MCS", Tier::Match),
            ],
            "advisor",
            100,
        );
        pool.add_manual(
            NewCandidate {
                school: "NUS".to_string(),
                program: "MComp".to_string(),
                stage: Tier::Safety,
                notes: "家长推荐".to_string(),
                owner: "advisor".to_string(),
            },
            101,
        )
        .unwrap();
        pool.transition(
            &ids[0],
            TransitionPatch {
                status: Some(CandidateStatus::Approved),
                stage: None,
            },
        )
        .unwrap();

        let stats = pool.stats();
        assert_eq!(stats.total, 3);
        assert_eq!((stats.reach, stats.matched, stats.safety), (1, 1, 1));
        assert_eq!((stats.pending, stats.approved, stats.rejected), (2, 1, 0));
        assert_eq!((stats.recommended, stats.manual), (2, 1));
    }
}
