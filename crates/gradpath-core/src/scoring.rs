//! Scoring engine: dimension subscores, weighted composite, tier cuts.
//!
//! `score_program` is a pure function of (program, criteria, weights) —
//! identical inputs always yield identical output. Weight and score
//! inputs are sanitized at this boundary (NaN → 0, clamped to [0, 100])
//! so one malformed slider value cannot corrupt a whole run.
//!
//! Tier assignment is a policy over the whole run, not a per-program
//! rule: programs are sorted by composite descending and cut points are
//! placed where the target distribution percentages land, with the Reach
//! share scaled by the student's risk preference.

use serde::{Deserialize, Serialize};

use crate::criteria::MatchCriteria;
use crate::models::{ProgramRecord, RiskPreference, StrengthKey, TargetDistribution, Tier};

/// Per-dimension weights, each in [0, 100].
///
/// Weights need not sum to any fixed total; the composite normalizes by
/// the weight sum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightConfig {
    pub ranking: f64,
    pub research: f64,
    pub internship: f64,
    pub language: f64,
    pub budget: f64,
    pub location: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            ranking: 70.0,
            research: 55.0,
            internship: 45.0,
            language: 60.0,
            budget: 50.0,
            location: 40.0,
        }
    }
}

impl WeightConfig {
    pub fn get(&self, key: StrengthKey) -> f64 {
        match key {
            StrengthKey::Ranking => self.ranking,
            StrengthKey::Research => self.research,
            StrengthKey::Internship => self.internship,
            StrengthKey::Language => self.language,
            StrengthKey::Budget => self.budget,
            StrengthKey::Location => self.location,
        }
    }

    /// Clamp every weight into [0, 100]; NaN becomes 0.
    pub fn sanitized(&self) -> WeightConfig {
        WeightConfig {
            ranking: sanitize_weight(self.ranking),
            research: sanitize_weight(self.research),
            internship: sanitize_weight(self.internship),
            language: sanitize_weight(self.language),
            budget: sanitize_weight(self.budget),
            location: sanitize_weight(self.location),
        }
    }
}

fn sanitize_weight(w: f64) -> f64 {
    if !w.is_finite() {
        return 0.0;
    }
    w.clamp(0.0, 100.0)
}

fn clamp_score(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

/// One subscore per [`StrengthKey`], each in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionScores {
    pub ranking: f64,
    pub research: f64,
    pub internship: f64,
    pub language: f64,
    pub budget: f64,
    pub location: f64,
}

impl DimensionScores {
    pub fn get(&self, key: StrengthKey) -> f64 {
        match key {
            StrengthKey::Ranking => self.ranking,
            StrengthKey::Research => self.research,
            StrengthKey::Internship => self.internship,
            StrengthKey::Language => self.language,
            StrengthKey::Budget => self.budget,
            StrengthKey::Location => self.location,
        }
    }

    /// Dimensions sorted by subscore, strongest first. Ties resolve in
    /// declaration order of [`StrengthKey::ALL`] so output is stable.
    pub fn ranked(&self) -> Vec<(StrengthKey, f64)> {
        let mut out: Vec<(StrengthKey, f64)> =
            StrengthKey::ALL.iter().map(|&k| (k, self.get(k))).collect();
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        out
    }
}

/// A program with its computed scores. `tier` is provisional
/// ([`Tier::Match`]) until [`assign_tiers`] runs over the whole set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramScore {
    pub program_id: String,
    pub school: String,
    pub program: String,
    pub dimensions: DimensionScores,
    pub composite: f64,
    pub tier: Tier,
}

/// Compute all dimension subscores and the composite for one program.
pub fn score_program(
    program: &ProgramRecord,
    criteria: &MatchCriteria,
    weights: &WeightConfig,
) -> ProgramScore {
    let dimensions = DimensionScores {
        ranking: ranking_score(program.prestige_tier),
        research: clamp_score(program.research_emphasis),
        internship: clamp_score(program.internship_emphasis),
        language: language_score(program, criteria),
        budget: budget_score(program, criteria),
        location: location_score(program, criteria),
    };

    ProgramScore {
        program_id: program.id.clone(),
        school: program.school.clone(),
        program: program.program.clone(),
        composite: composite(&dimensions, weights),
        dimensions,
        tier: Tier::Match,
    }
}

/// Weighted mean of the subscores: `Σ(w·s) / Σw`, clamped to [0, 100].
/// A zero (or fully sanitized-away) weight sum yields 0.
pub fn composite(dimensions: &DimensionScores, weights: &WeightConfig) -> f64 {
    let weights = weights.sanitized();
    let mut weighted = 0.0;
    let mut total = 0.0;
    for key in StrengthKey::ALL {
        let w = weights.get(key);
        weighted += w * clamp_score(dimensions.get(key));
        total += w;
    }
    if total <= f64::EPSILON {
        return 0.0;
    }
    clamp_score(weighted / total)
}

fn ranking_score(prestige_tier: u8) -> f64 {
    match prestige_tier {
        0 | 1 => 95.0,
        2 => 85.0,
        3 => 75.0,
        4 => 65.0,
        _ => 55.0,
    }
}

/// Language fit. Prefers the TOEFL pairing when both student score and
/// program threshold exist, falls back to IELTS. Decreases as the
/// program's minimum requirement exceeds the student's score; a met
/// requirement earns a small surplus bonus. Neutral values when either
/// side is silent.
fn language_score(program: &ProgramRecord, criteria: &MatchCriteria) -> f64 {
    let toefl = criteria.language.toefl.filter(|v| v.is_finite());
    let ielts = criteria.language.ielts.filter(|v| v.is_finite());

    if let (Some(req), Some(score)) = (program.min_toefl, toefl) {
        return gap_score(req, score, 8.0, 2.0);
    }
    if let (Some(req), Some(score)) = (program.min_ielts, ielts) {
        return gap_score(req, score, 25.0, 8.0);
    }
    if program.min_toefl.is_some() || program.min_ielts.is_some() {
        // Requirement published but no comparable student score.
        return 55.0;
    }
    75.0
}

fn gap_score(requirement: f64, score: f64, deficit_slope: f64, surplus_slope: f64) -> f64 {
    let deficit = requirement - score;
    if deficit > 0.0 {
        clamp_score(90.0 - deficit * deficit_slope)
    } else {
        clamp_score(90.0 + (-deficit) * surplus_slope)
    }
}

/// Budget fit: 100 inside the requested range, decreasing as cost exits
/// it. Overshooting the ceiling is penalized harder than undershooting
/// the floor. Neutral when no budget was requested.
fn budget_score(program: &ProgramRecord, criteria: &MatchCriteria) -> f64 {
    let budget = match &criteria.budget {
        Some(b) if b.max > 0.0 => b,
        _ => return 70.0,
    };
    let cost = program.tuition_per_year;
    if cost <= budget.max && cost >= budget.min {
        return 100.0;
    }
    if cost > budget.max {
        let over = (cost - budget.max) / budget.max;
        return clamp_score(100.0 - over * 250.0);
    }
    let under = (budget.min - cost) / budget.min.max(1.0);
    clamp_score(100.0 - under * 50.0)
}

fn location_score(program: &ProgramRecord, criteria: &MatchCriteria) -> f64 {
    if criteria
        .target_countries
        .iter()
        .any(|c| c == &program.country)
    {
        100.0
    } else {
        30.0
    }
}

/// Tier cut policy: target distribution plus risk bias.
///
/// `risk_bias` scales the Reach share — conservative multiplies it by
/// `1 - risk_bias`, aggressive by `1 + risk_bias` — before the three
/// shares are renormalized over the run. Both knobs come from
/// configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierPolicy {
    pub distribution: TargetDistribution,
    pub risk: RiskPreference,
    pub risk_bias: f64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            distribution: TargetDistribution::default(),
            risk: RiskPreference::Balanced,
            risk_bias: 0.5,
        }
    }
}

impl TierPolicy {
    /// Effective (reach, match, safety) shares, renormalized to sum 1.
    fn shares(&self) -> (f64, f64, f64) {
        let factor = match self.risk {
            RiskPreference::Conservative => 1.0 - self.risk_bias,
            RiskPreference::Balanced => 1.0,
            RiskPreference::Aggressive => 1.0 + self.risk_bias,
        };
        let reach = (self.distribution.reach_pct.max(0.0)) * factor.max(0.0);
        let matched = self.distribution.match_pct.max(0.0);
        let safety = self.distribution.safety_pct.max(0.0);
        let total = reach + matched + safety;
        if total <= f64::EPSILON {
            // Degenerate distribution: everything is a Match.
            return (0.0, 1.0, 0.0);
        }
        (reach / total, matched / total, safety / total)
    }
}

/// Sort by composite descending (program id ascending on ties) and
/// assign tiers by the policy's cut points.
pub fn assign_tiers(scored: &mut [ProgramScore], policy: &TierPolicy) {
    scored.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.program_id.cmp(&b.program_id))
    });

    let n = scored.len();
    let (reach_share, match_share, _) = policy.shares();
    let reach_cut = ((n as f64) * reach_share).round() as usize;
    let match_cut = reach_cut + ((n as f64) * match_share).round() as usize;

    for (i, item) in scored.iter_mut().enumerate() {
        item.tier = if i < reach_cut {
            Tier::Reach
        } else if i < match_cut.min(n) {
            Tier::Match
        } else {
            Tier::Safety
        };
    }
}
