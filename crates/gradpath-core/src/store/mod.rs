//! Storage abstraction for GradPath.
//!
//! Two seams separate the core from its collaborators:
//!
//! - [`ProgramCatalog`] supplies the program corpus. The core never
//!   defines how it is fetched or paginated — only that it reports a
//!   total count and serves pages. The corpus is read-only to the
//!   pipeline.
//! - [`PlanStore`] persists one student's planning session: profile,
//!   candidate pool, and recommendation version history.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory`] holds in-memory implementations for tests and embedding;
//! the application crate provides the SQLite-backed ones.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CandidateProgram, CaseRef, ProgramRecord, RecommendationVersion, StudentProfile,
};

/// An enumerable, read-only collection of [`ProgramRecord`]s.
#[async_trait]
pub trait ProgramCatalog: Send + Sync {
    /// Total number of programs available.
    async fn count(&self) -> Result<u64>;

    /// Fetch one page of programs. Offsets past the end return an empty
    /// page, not an error.
    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<ProgramRecord>>;

    /// Similar historical-case references for one program. Optional
    /// enrichment — the default implementation reports none, and an
    /// empty answer is never an error.
    async fn similar_cases(&self, _school: &str, _program: &str) -> Result<Vec<CaseRef>> {
        Ok(Vec::new())
    }
}

/// Persistence seam for one student's planning session.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_profile`](PlanStore::get_profile) | Load a student profile |
/// | [`put_profile`](PlanStore::put_profile) | Insert or replace a profile |
/// | [`load_pool`](PlanStore::load_pool) | Load the candidate pool |
/// | [`save_pool`](PlanStore::save_pool) | Replace the candidate pool atomically |
/// | [`load_versions`](PlanStore::load_versions) | Load version history, append order |
/// | [`append_version`](PlanStore::append_version) | Append an immutable version |
/// | [`mark_adopted`](PlanStore::mark_adopted) | Flip the single adopted flag |
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>>;

    async fn put_profile(&self, profile: &StudentProfile) -> Result<()>;

    async fn load_pool(&self, student_id: &str) -> Result<Vec<CandidateProgram>>;

    /// Replace the student's whole pool in one write. Pool mutation
    /// semantics live in [`crate::pool::CandidatePool`]; callers load,
    /// mutate, and save within one serialized command (single-writer
    /// per student session).
    async fn save_pool(&self, student_id: &str, entries: &[CandidateProgram]) -> Result<()>;

    async fn load_versions(&self, student_id: &str) -> Result<Vec<RecommendationVersion>>;

    /// Append an immutable version. Versions are never mutated after
    /// this call; corrections append new versions.
    async fn append_version(&self, student_id: &str, version: &RecommendationVersion)
        -> Result<()>;

    /// Mark `version_id` as the adopted version, clearing any previous
    /// adopted flag for the student in the same write. Unknown ids are
    /// a lookup failure that leaves the store unchanged.
    async fn mark_adopted(&self, student_id: &str, version_id: &str) -> Result<()>;
}
