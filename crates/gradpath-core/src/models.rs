//! Core data models used throughout GradPath.
//!
//! These types represent the student profiles, program records, scored
//! recommendations, and curated candidates that flow through the matching
//! pipeline and the planning stores. Domain labels that surface to
//! advisors (tier, candidate status, candidate source, risk preference)
//! keep their original Chinese wire form via serde renames; Rust code
//! works with the enum variants.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Classification of a recommendation by admission difficulty.
///
/// Ordering is by descending difficulty: Reach (冲刺), Match (匹配),
/// Safety (保底). The same labels double as the stage of a curated
/// candidate in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "冲刺")]
    Reach,
    #[serde(rename = "匹配")]
    Match,
    #[serde(rename = "保底")]
    Safety,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Reach, Tier::Match, Tier::Safety];

    /// The advisor-facing label (冲刺/匹配/保底).
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Reach => "冲刺",
            Tier::Match => "匹配",
            Tier::Safety => "保底",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "冲刺" | "reach" | "sprint" => Ok(Tier::Reach),
            "匹配" | "match" => Ok(Tier::Match),
            "保底" | "safety" => Ok(Tier::Safety),
            other => bail!("Unknown tier: '{}'. Use 冲刺/匹配/保底 (reach/match/safety).", other),
        }
    }
}

/// How aggressively tier cutoffs lean toward Reach classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskPreference {
    #[serde(rename = "稳健")]
    Conservative,
    #[serde(rename = "均衡")]
    Balanced,
    #[serde(rename = "进取")]
    Aggressive,
}

impl Default for RiskPreference {
    fn default() -> Self {
        RiskPreference::Balanced
    }
}

impl fmt::Display for RiskPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskPreference::Conservative => "稳健",
            RiskPreference::Balanced => "均衡",
            RiskPreference::Aggressive => "进取",
        };
        f.write_str(label)
    }
}

impl FromStr for RiskPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "稳健" | "conservative" => Ok(RiskPreference::Conservative),
            "均衡" | "balanced" => Ok(RiskPreference::Balanced),
            "进取" | "aggressive" => Ok(RiskPreference::Aggressive),
            other => bail!(
                "Unknown risk preference: '{}'. Use 稳健/均衡/进取 (conservative/balanced/aggressive).",
                other
            ),
        }
    }
}

/// Target share of each tier in a generated result set, in percent.
///
/// The shares do not need to sum to exactly 100; tier assignment
/// renormalizes them over the actual run size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetDistribution {
    pub reach_pct: f64,
    pub match_pct: f64,
    pub safety_pct: f64,
}

impl Default for TargetDistribution {
    fn default() -> Self {
        Self {
            reach_pct: 20.0,
            match_pct: 50.0,
            safety_pct: 30.0,
        }
    }
}

/// One scoring dimension of a program/criteria pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthKey {
    Ranking,
    Research,
    Internship,
    Language,
    Budget,
    Location,
}

impl StrengthKey {
    pub const ALL: [StrengthKey; 6] = [
        StrengthKey::Ranking,
        StrengthKey::Research,
        StrengthKey::Internship,
        StrengthKey::Language,
        StrengthKey::Budget,
        StrengthKey::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthKey::Ranking => "ranking",
            StrengthKey::Research => "research",
            StrengthKey::Internship => "internship",
            StrengthKey::Language => "language",
            StrengthKey::Budget => "budget",
            StrengthKey::Location => "location",
        }
    }
}

/// A corpus item: one degree program at one school.
///
/// Supplied by a catalog collaborator and read-only to the pipeline.
/// Attribute fields feed the dimension rules in [`crate::scoring`];
/// `min_*` fields are admission thresholds used by soft eligibility
/// matching, absent when the program does not publish one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: String,
    pub school: String,
    pub program: String,
    pub country: String,
    /// Program category used by hard filtering (e.g. "CS", "EE", "Finance").
    pub category: String,
    /// Prestige band, 1 = most selective.
    pub prestige_tier: u8,
    /// Research emphasis, 0–100.
    pub research_emphasis: f64,
    /// Internship/industry emphasis, 0–100.
    pub internship_emphasis: f64,
    #[serde(default)]
    pub min_gpa: Option<f64>,
    #[serde(default)]
    pub min_toefl: Option<f64>,
    #[serde(default)]
    pub min_ielts: Option<f64>,
    /// Annual tuition in `currency` units.
    pub tuition_per_year: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Selling points surfaced on recommendations.
    #[serde(default)]
    pub highlights: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A student profile as supplied by the intake collaborator.
///
/// Free-text fields (`gpa_text`, `language_text`, `test_text`) hold what
/// the advisor actually typed; [`crate::criteria`] parses them with
/// deterministic rules when deriving match criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub undergraduate_school: String,
    /// e.g. "GPA 3.7/4.0" or "87/100".
    #[serde(default)]
    pub gpa_text: String,
    /// e.g. "TOEFL: 106" or "IELTS 7.0".
    #[serde(default)]
    pub language_text: String,
    /// e.g. "GRE: 325, GMAT 700".
    #[serde(default)]
    pub test_text: String,
    #[serde(default)]
    pub target_countries: Vec<String>,
    #[serde(default)]
    pub target_programs: Vec<String>,
    #[serde(default)]
    pub intake_term: Option<String>,
    #[serde(default)]
    pub distribution: TargetDistribution,
    #[serde(default)]
    pub risk: RiskPreference,
}

/// A reference to a similar historical admission case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRef {
    /// e.g. "2024 Fall admit, GPA 3.6, TOEFL 104".
    pub title: String,
    /// e.g. "admitted" / "waitlisted".
    pub outcome: String,
}

/// One scored, tier-classified recommendation produced by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub id: String,
    pub school: String,
    pub program: String,
    pub tier: Tier,
    /// Composite score in [0, 100].
    pub score: f64,
    /// One-line reason shown in result lists.
    pub match_reason: String,
    /// Longer explanation of the fit.
    pub rationale: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub requirement_notes: Vec<String>,
    #[serde(default)]
    pub similar_cases: Vec<CaseRef>,
    /// Curation state within the current session; not persisted.
    #[serde(default)]
    pub selected: bool,
}

/// Where a pool candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateSource {
    #[serde(rename = "AI推荐")]
    Recommended,
    #[serde(rename = "人工添加")]
    Manual,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateSource::Recommended => "AI推荐",
            CandidateSource::Manual => "人工添加",
        };
        f.write_str(label)
    }
}

impl FromStr for CandidateSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AI推荐" | "recommended" | "ai" => Ok(CandidateSource::Recommended),
            "人工添加" | "manual" => Ok(CandidateSource::Manual),
            other => bail!("Unknown candidate source: '{}'. Use AI推荐/人工添加 (ai/manual).", other),
        }
    }
}

/// Review status of a pool candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateStatus {
    #[serde(rename = "待讨论")]
    Pending,
    #[serde(rename = "通过")]
    Approved,
    #[serde(rename = "淘汰")]
    Rejected,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateStatus::Pending => "待讨论",
            CandidateStatus::Approved => "通过",
            CandidateStatus::Rejected => "淘汰",
        };
        f.write_str(label)
    }
}

impl FromStr for CandidateStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "待讨论" | "pending" => Ok(CandidateStatus::Pending),
            "通过" | "approved" => Ok(CandidateStatus::Approved),
            "淘汰" | "rejected" => Ok(CandidateStatus::Rejected),
            other => bail!(
                "Unknown candidate status: '{}'. Use 待讨论/通过/淘汰 (pending/approved/rejected).",
                other
            ),
        }
    }
}

/// A curated entry in a student's candidate pool.
///
/// Created either by bulk-accepting selected recommendations or by manual
/// entry. Mutated only through explicit operations on
/// [`crate::pool::CandidatePool`]; updates are keyed by `id` and callers
/// supply the fields to change, never a silent merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProgram {
    pub id: String,
    pub school: String,
    pub program: String,
    pub source: CandidateSource,
    pub stage: Tier,
    pub status: CandidateStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub owner: String,
    /// Present when `source` is [`CandidateSource::Recommended`].
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub match_reason: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    /// Unix timestamp of insertion into the pool.
    pub added_at: i64,
}

/// An immutable snapshot of one completed generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationVersion {
    pub id: String,
    pub student_id: String,
    pub created_at: i64,
    pub created_by: String,
    /// e.g. "deep run, 18 results (4 冲刺 / 9 匹配 / 5 保底)".
    pub summary: String,
    /// sha256 over the ordered result ids, for provenance.
    pub content_hash: String,
    pub adopted: bool,
    pub results: Vec<RecommendationResult>,
}

/// Format a Unix timestamp as ISO 8601.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_labels_round_trip() {
        for tier in Tier::ALL {
            let parsed: Tier = tier.label().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert_eq!("reach".parse::<Tier>().unwrap(), Tier::Reach);
        assert!("冠军".parse::<Tier>().is_err());
    }

    #[test]
    fn status_serializes_to_chinese_label() {
        let json = serde_json::to_string(&CandidateStatus::Approved).unwrap();
        assert_eq!(json, "\"通过\"");
        let back: CandidateStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CandidateStatus::Approved);
    }

    #[test]
    fn program_record_defaults_fill_optional_fields() {
        let json = r#"{
            "id": "p1",
            "school": "CMU",
            "program": "MSCS",
            "country": "美国",
            "category": "CS",
            "prestige_tier": 1,
            "research_emphasis": 90.0,
            "internship_emphasis": 80.0,
            "tuition_per_year": 58000.0
        }"#;
        let rec: ProgramRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.currency, "USD");
        assert!(rec.min_gpa.is_none());
        assert!(rec.highlights.is_empty());
    }
}
