//! In-memory store implementations for testing and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread
//! safety. All futures resolve immediately.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{
    CandidateProgram, CaseRef, ProgramRecord, RecommendationVersion, StudentProfile,
};

use super::{PlanStore, ProgramCatalog};

/// A fixed program corpus held in memory.
pub struct MemoryCatalog {
    programs: Vec<ProgramRecord>,
    cases: HashMap<String, Vec<CaseRef>>,
}

fn case_key(school: &str, program: &str) -> String {
    format!("{}|{}", school, program)
}

impl MemoryCatalog {
    pub fn new(programs: Vec<ProgramRecord>) -> Self {
        Self {
            programs,
            cases: HashMap::new(),
        }
    }

    /// Attach similar-case references for one (school, program) pair.
    pub fn with_cases(mut self, school: &str, program: &str, cases: Vec<CaseRef>) -> Self {
        self.cases.insert(case_key(school, program), cases);
        self
    }
}

#[async_trait]
impl ProgramCatalog for MemoryCatalog {
    async fn count(&self) -> Result<u64> {
        Ok(self.programs.len() as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<ProgramRecord>> {
        let start = (offset as usize).min(self.programs.len());
        let end = (start + limit as usize).min(self.programs.len());
        Ok(self.programs[start..end].to_vec())
    }

    async fn similar_cases(&self, school: &str, program: &str) -> Result<Vec<CaseRef>> {
        Ok(self
            .cases
            .get(&case_key(school, program))
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`PlanStore`] keyed by student id.
#[derive(Default)]
pub struct MemoryPlanStore {
    profiles: RwLock<HashMap<String, StudentProfile>>,
    pools: RwLock<HashMap<String, Vec<CandidateProgram>>>,
    versions: RwLock<HashMap<String, Vec<RecommendationVersion>>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        Ok(self.profiles.read().unwrap().get(student_id).cloned())
    }

    async fn put_profile(&self, profile: &StudentProfile) -> Result<()> {
        self.profiles
            .write()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn load_pool(&self, student_id: &str) -> Result<Vec<CandidateProgram>> {
        Ok(self
            .pools
            .read()
            .unwrap()
            .get(student_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_pool(&self, student_id: &str, entries: &[CandidateProgram]) -> Result<()> {
        self.pools
            .write()
            .unwrap()
            .insert(student_id.to_string(), entries.to_vec());
        Ok(())
    }

    async fn load_versions(&self, student_id: &str) -> Result<Vec<RecommendationVersion>> {
        Ok(self
            .versions
            .read()
            .unwrap()
            .get(student_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_version(
        &self,
        student_id: &str,
        version: &RecommendationVersion,
    ) -> Result<()> {
        self.versions
            .write()
            .unwrap()
            .entry(student_id.to_string())
            .or_default()
            .push(version.clone());
        Ok(())
    }

    async fn mark_adopted(&self, student_id: &str, version_id: &str) -> Result<()> {
        let mut versions = self.versions.write().unwrap();
        let list = match versions.get_mut(student_id) {
            Some(list) => list,
            None => bail!("No versions recorded for student '{}'.", student_id),
        };
        if !list.iter().any(|v| v.id == version_id) {
            bail!("Version not found: '{}'.", version_id);
        }
        for v in list.iter_mut() {
            v.adopted = v.id == version_id;
        }
        Ok(())
    }
}
