//! Match criteria derivation and editing.
//!
//! [`MatchCriteria`] is the immutable input snapshot of one generation
//! run. It is seeded from a [`StudentProfile`] with deterministic
//! free-text parsing (first numeric token after a known label, e.g.
//! "TOEFL: 106" → 106), then edited through [`CriteriaPatch`] — every
//! edit produces a new snapshot, never a mutation of a running one.
//!
//! Generation requires at least one target country and one target
//! program. This is a hard precondition checked before any pipeline
//! stage starts, not a soft warning.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::StudentProfile;

/// Which pipeline variant a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Quick,
    Deep,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Quick
    }
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Quick => "quick",
            SearchMode::Deep => "deep",
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "quick" => Ok(SearchMode::Quick),
            "deep" => Ok(SearchMode::Deep),
            other => bail!("Unknown search mode: '{}'. Use quick or deep.", other),
        }
    }
}

/// GPA scale tag. The 100-point scale is normalized to 4.0 for
/// threshold comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpaScale {
    #[serde(rename = "4.0")]
    FourPoint,
    #[serde(rename = "100")]
    Hundred,
}

/// A GPA value together with its scale tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gpa {
    pub value: f64,
    pub scale: GpaScale,
}

impl Gpa {
    /// The value on the 4.0 scale regardless of the stored tag.
    pub fn normalized(&self) -> f64 {
        match self.scale {
            GpaScale::FourPoint => self.value,
            GpaScale::Hundred => self.value / 25.0,
        }
    }
}

/// Optional standardized-test and language scores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LanguageScores {
    #[serde(default)]
    pub toefl: Option<f64>,
    #[serde(default)]
    pub ielts: Option<f64>,
    #[serde(default)]
    pub gre: Option<f64>,
    #[serde(default)]
    pub gmat: Option<f64>,
}

/// Requested annual budget window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

/// The immutable input snapshot of one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub mode: SearchMode,
    pub target_countries: Vec<String>,
    pub target_programs: Vec<String>,
    #[serde(default)]
    pub current_school: Option<String>,
    #[serde(default)]
    pub gpa: Option<Gpa>,
    #[serde(default)]
    pub language: LanguageScores,
    #[serde(default)]
    pub budget: Option<BudgetRange>,
}

/// Partial edit applied to a criteria snapshot.
///
/// `toggle_*` entries flip membership: a value already in the target set
/// is removed, a missing one is added. Scalar fields are set-if-present.
#[derive(Debug, Clone, Default)]
pub struct CriteriaPatch {
    pub mode: Option<SearchMode>,
    pub toggle_countries: Vec<String>,
    pub toggle_programs: Vec<String>,
    pub gpa: Option<Gpa>,
    pub toefl: Option<f64>,
    pub ielts: Option<f64>,
    pub gre: Option<f64>,
    pub gmat: Option<f64>,
    pub budget: Option<BudgetRange>,
}

impl MatchCriteria {
    /// Seed criteria from a profile.
    ///
    /// Target sets come over verbatim (deduplicated, order preserved);
    /// GPA and scores are parsed from the profile's free-text fields.
    pub fn derive(profile: &StudentProfile) -> MatchCriteria {
        let language = LanguageScores {
            toefl: parse_labeled_number(&profile.language_text, &["toefl", "托福"]),
            ielts: parse_labeled_number(&profile.language_text, &["ielts", "雅思"]),
            gre: parse_labeled_number(&profile.test_text, &["gre"]),
            gmat: parse_labeled_number(&profile.test_text, &["gmat"]),
        };

        MatchCriteria {
            mode: SearchMode::default(),
            target_countries: dedup_preserving(&profile.target_countries),
            target_programs: dedup_preserving(&profile.target_programs),
            current_school: if profile.undergraduate_school.is_empty() {
                None
            } else {
                Some(profile.undergraduate_school.clone())
            },
            gpa: parse_gpa(&profile.gpa_text),
            language,
            budget: None,
        }
    }

    /// Apply a patch, returning a new snapshot.
    pub fn apply(&self, patch: &CriteriaPatch) -> MatchCriteria {
        let mut next = self.clone();

        if let Some(mode) = patch.mode {
            next.mode = mode;
        }
        for country in &patch.toggle_countries {
            toggle(&mut next.target_countries, country);
        }
        for program in &patch.toggle_programs {
            toggle(&mut next.target_programs, program);
        }
        if let Some(gpa) = patch.gpa {
            next.gpa = Some(gpa);
        }
        if let Some(v) = patch.toefl {
            next.language.toefl = Some(v);
        }
        if let Some(v) = patch.ielts {
            next.language.ielts = Some(v);
        }
        if let Some(v) = patch.gre {
            next.language.gre = Some(v);
        }
        if let Some(v) = patch.gmat {
            next.language.gmat = Some(v);
        }
        if let Some(ref budget) = patch.budget {
            next.budget = Some(budget.clone());
        }

        next
    }

    /// Whether a generation run may start.
    pub fn can_generate(&self) -> bool {
        !self.target_countries.is_empty() && !self.target_programs.is_empty()
    }

    /// The precondition check run by the pipeline before any stage.
    pub fn validate_for_run(&self) -> Result<()> {
        if self.target_countries.is_empty() {
            bail!("Cannot generate: no target country selected.");
        }
        if self.target_programs.is_empty() {
            bail!("Cannot generate: no target program selected.");
        }
        Ok(())
    }
}

fn toggle(set: &mut Vec<String>, value: &str) {
    if let Some(pos) = set.iter().position(|v| v == value) {
        set.remove(pos);
    } else {
        set.push(value.to_string());
    }
}

fn dedup_preserving(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !v.is_empty() && !out.iter().any(|seen| seen == v) {
            out.push(v.clone());
        }
    }
    out
}

/// First numeric token after the earliest occurrence of any label,
/// case-insensitive. Returns `None` when no label or no number follows.
pub fn parse_labeled_number(text: &str, labels: &[&str]) -> Option<f64> {
    let haystack = text.to_lowercase();
    let mut best: Option<usize> = None;
    for label in labels {
        if let Some(pos) = haystack.find(&label.to_lowercase()) {
            let end = pos + label.len();
            best = Some(match best {
                Some(prev) => prev.min(end),
                None => end,
            });
        }
    }
    let start = best?;
    first_number_at(&haystack, start).map(|(v, _)| v)
}

/// Parse a GPA string: "3.7/4.0", "GPA 3.7", "87/100", "87".
///
/// With an explicit `/scale` suffix the scale tag follows the
/// denominator; otherwise values above 5 are read as 100-scale.
pub fn parse_gpa(text: &str) -> Option<Gpa> {
    let haystack = text.to_lowercase();
    let label_end = haystack.find("gpa").map(|p| p + 3).unwrap_or(0);
    let (value, value_end) = first_number_at(&haystack, label_end)?;

    let rest = haystack[value_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix('/') {
        if let Some((denominator, _)) = first_number_at(stripped, 0) {
            let scale = if denominator > 5.0 {
                GpaScale::Hundred
            } else {
                GpaScale::FourPoint
            };
            return Some(Gpa { value, scale });
        }
    }

    let scale = if value > 5.0 {
        GpaScale::Hundred
    } else {
        GpaScale::FourPoint
    };
    Some(Gpa { value, scale })
}

/// First contiguous `[0-9.]` token at or after `start` (byte offset).
/// Returns the parsed value and the byte offset just past the token.
fn first_number_at(text: &str, start: usize) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut i = start.min(bytes.len());
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let token_start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let token = &text[token_start..i];
            if let Ok(v) = token.trim_end_matches('.').parse::<f64>() {
                return Some((v, i));
            }
        } else {
            i += 1;
        }
    }
    None
}
