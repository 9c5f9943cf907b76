//! JSON-file program catalog.
//!
//! Loads the program corpus (and an optional historical-case library)
//! from a single JSON file and serves it through the
//! [`ProgramCatalog`] trait. The pipeline only ever sees pages and a
//! total count, so swapping this for a remote data source touches
//! nothing in the core.
//!
//! File shape:
//!
//! ```json
//! {
//!   "programs": [ { "id": "...", "school": "...", ... } ],
//!   "case_library": [
//!     { "school": "CMU", "program": "MSCS",
//!       "cases": [ { "title": "...", "outcome": "admitted" } ] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use gradpath_core::models::{CaseRef, ProgramRecord};
use gradpath_core::store::ProgramCatalog;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    programs: Vec<ProgramRecord>,
    #[serde(default)]
    case_library: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
struct CaseEntry {
    school: String,
    program: String,
    cases: Vec<CaseRef>,
}

/// A read-only corpus backed by a JSON file, loaded once per command.
pub struct JsonCatalog {
    programs: Vec<ProgramRecord>,
    cases: HashMap<String, Vec<CaseRef>>,
}

fn case_key(school: &str, program: &str) -> String {
    format!("{}|{}", school, program)
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        let mut cases = HashMap::new();
        for entry in file.case_library {
            cases.insert(case_key(&entry.school, &entry.program), entry.cases);
        }

        Ok(Self {
            programs: file.programs,
            cases,
        })
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[async_trait]
impl ProgramCatalog for JsonCatalog {
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
