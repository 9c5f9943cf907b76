//! The staged search pipeline.
//!
//! Orchestrates QuickMatch and DeepSearch over a [`ProgramCatalog`],
//! invoking the scoring engine per candidate and producing a ranked,
//! tier-classified [`SearchReport`]. Execution is cooperative: the
//! pipeline awaits the catalog between pages and checks its
//! [`CancelToken`] at every stage boundary and batch sub-step, so a
//! caller can abort between any two ticks. Once cancelled, no further
//! progress is emitted and no results are returned —
//! [`RunOutcome::Cancelled`] is a defined terminal state, not an error.
//!
//! An empty corpus, or a corpus that fails every filter, completes
//! normally with zero results. The only synchronous failure is the
//! generation precondition (at least one target country and program),
//! rejected before any event is emitted.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::criteria::{MatchCriteria, SearchMode};
use crate::models::{ProgramRecord, RecommendationResult, StrengthKey, Tier};
use crate::progress::{CancelToken, ProgressReporter, SearchProgress, Stage};
use crate::scoring::{
    assign_tiers, composite, score_program, DimensionScores, ProgramScore, TierPolicy,
    WeightConfig,
};
use crate::store::ProgramCatalog;

/// Tuning knobs for a pipeline instance. Soft-eligibility slacks are
/// policy, not constants — advisors tune them per market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Result cap for QuickMatch.
    pub quick_limit: usize,
    /// Corpus page size during the loading stage.
    pub page_size: u64,
    /// Items per sub-step in analysis stages (one cancellation check
    /// and progress tick per batch).
    pub analysis_batch: usize,
    /// GPA shortfall tolerated by condition matching (4.0 scale).
    pub gpa_slack: f64,
    /// TOEFL shortfall tolerated by condition matching.
    pub toefl_slack: f64,
    /// IELTS shortfall tolerated by condition matching.
    pub ielts_slack: f64,
    /// Tuition may exceed the budget ceiling by this factor before the
    /// program is dropped (scoring still penalizes the overshoot).
    pub budget_stretch: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            quick_limit: 24,
            page_size: 40,
            analysis_batch: 10,
            gpa_slack: 0.15,
            toefl_slack: 8.0,
            ielts_slack: 1.0,
            budget_stretch: 1.3,
        }
    }
}

/// Result counts per tier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub reach: usize,
    pub matched: usize,
    pub safety: usize,
}

/// The final product of a non-cancelled run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub mode: SearchMode,
    /// Grouped Reach → Match → Safety, composite descending within a
    /// tier.
    pub results: Vec<RecommendationResult>,
    pub tier_counts: TierCounts,
    pub scanned: u64,
    pub filtered: u64,
    pub matched: u64,
}

/// Terminal state of a run. Cancellation is distinct from both success
/// and failure; an empty result set is a normal completion.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(SearchReport),
    Cancelled,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

/// Percent band owned by one stage: contiguous, monotone across the
/// run.
const DEEP_BANDS: [(Stage, u8, u8); 8] = [
    (Stage::Parsing, 0, 5),
    (Stage::Loading, 5, 25),
    (Stage::InitialFilter, 25, 38),
    (Stage::ConditionMatch, 38, 52),
    (Stage::DeepAnalysis, 52, 72),
    (Stage::Scoring, 72, 82),
    (Stage::CaseComparison, 82, 94),
    (Stage::Sorting, 94, 100),
];

const QUICK_BANDS: [(Stage, u8, u8); 5] = [
    (Stage::Parsing, 0, 10),
    (Stage::Loading, 10, 40),
    (Stage::InitialFilter, 40, 60),
    (Stage::Scoring, 60, 85),
    (Stage::Sorting, 85, 100),
];

fn band(bands: &[(Stage, u8, u8)], stage: Stage) -> (u8, u8) {
    bands
        .iter()
        .find(|(s, _, _)| *s == stage)
        .map(|(_, lo, hi)| (*lo, *hi))
        .unwrap_or((100, 100))
}

fn lerp(lo: u8, hi: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return hi;
    }
    let span = (hi - lo) as f64;
    lo + (span * done as f64 / total as f64).floor() as u8
}

/// Event emitter that enforces monotone percent and counts for one run.
struct Emitter<'a> {
    reporter: &'a dyn ProgressReporter,
    percent: u8,
    scanned: Option<u64>,
    total: Option<u64>,
    filtered: Option<u64>,
    matched: Option<u64>,
    analyzed: Option<u64>,
}

impl<'a> Emitter<'a> {
    fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            percent: 0,
            scanned: None,
            total: None,
            filtered: None,
            matched: None,
            analyzed: None,
        }
    }

    fn bump(slot: &mut Option<u64>, value: u64) {
        *slot = Some(slot.map_or(value, |prev| prev.max(value)));
    }

    fn emit(&mut self, stage: Stage, percent: u8, message: impl Into<String>) {
        self.emit_with(stage, percent, message, Vec::new());
    }

    fn emit_with(
        &mut self,
        stage: Stage,
        percent: u8,
        message: impl Into<String>,
        details: Vec<String>,
    ) {
        self.percent = self.percent.max(percent.min(100));
        self.reporter.report(SearchProgress {
            stage,
            percent: self.percent,
            scanned: self.scanned,
            total: self.total,
            filtered: self.filtered,
            matched: self.matched,
            analyzed: self.analyzed,
            message: message.into(),
            details,
        });
    }
}

/// One configured pipeline over a catalog. Stateless between runs;
/// independent runs may proceed concurrently, each with its own
/// reporter and token.
pub struct SearchPipeline<'a, C: ProgramCatalog + ?Sized> {
    catalog: &'a C,
    weights: WeightConfig,
    policy: TierPolicy,
    options: PipelineOptions,
}

impl<'a, C: ProgramCatalog + ?Sized> SearchPipeline<'a, C> {
    pub fn new(catalog: &'a C, weights: WeightConfig, policy: TierPolicy) -> Self {
        Self {
            catalog,
            weights: weights.sanitized(),
            policy,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one generation run.
    ///
    /// The precondition (≥1 target country and program) is checked
    /// before any event; a violation is a synchronous error. After
    /// that, the only observable terminal states are completion and
    /// cancellation.
    pub async fn run(
        &self,
        criteria: &MatchCriteria,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        criteria.validate_for_run()?;

        match criteria.mode {
            SearchMode::Quick => self.run_quick(criteria, reporter, cancel).await,
            SearchMode::Deep => self.run_deep(criteria, reporter, cancel).await,
        }
    }

    async fn load_corpus(
        &self,
        bands: &[(Stage, u8, u8)],
        emitter: &mut Emitter<'_>,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<ProgramRecord>>> {
        let (lo, hi) = band(bands, Stage::Loading);
        let total = self.catalog.count().await?;
        Emitter::bump(&mut emitter.total, total);
        emitter.emit(
            Stage::Loading,
            lo,
            format!("Loading program corpus ({} programs)", total),
        );

        let mut corpus: Vec<ProgramRecord> = Vec::with_capacity(total as usize);
        let mut offset = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let page = self.catalog.fetch(offset, self.options.page_size).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;
            corpus.extend(page);
            Emitter::bump(&mut emitter.scanned, corpus.len() as u64);
            let percent = lerp(lo, hi, corpus.len(), total.max(1) as usize);
            emitter.emit(
                Stage::Loading,
                percent,
                format!("Scanned {} / {} programs", corpus.len(), total),
            );
            if offset >= total {
                break;
            }
        }
        emitter.emit(Stage::Loading, hi, "Corpus loaded");
        Ok(Some(corpus))
    }

    fn hard_filter(&self, corpus: Vec<ProgramRecord>, criteria: &MatchCriteria) -> Vec<ProgramRecord> {
        corpus
            .into_iter()
            .filter(|p| {
                criteria.target_countries.iter().any(|c| c == &p.country)
                    && criteria.target_programs.iter().any(|c| c == &p.category)
            })
            .collect()
    }

    /// Soft eligibility for condition matching. `Err` carries the
    /// drop reason for the detail log.
    fn passes_soft_rules(
        &self,
        program: &ProgramRecord,
        criteria: &MatchCriteria,
    ) -> std::result::Result<(), String> {
        if let (Some(min), Some(gpa)) = (program.min_gpa, criteria.gpa) {
            if gpa.normalized() + self.options.gpa_slack < min {
                return Err(format!(
                    "{} {}: GPA below requirement ({:.2} < {:.2})",
                    program.school,
                    program.program,
                    gpa.normalized(),
                    min
                ));
            }
        }
        if let (Some(req), Some(score)) = (program.min_toefl, criteria.language.toefl) {
            if score + self.options.toefl_slack < req {
                return Err(format!(
                    "{} {}: TOEFL below requirement ({} < {})",
                    program.school, program.program, score, req
                ));
            }
        } else if let (Some(req), Some(score)) = (program.min_ielts, criteria.language.ielts) {
            if score + self.options.ielts_slack < req {
                return Err(format!(
                    "{} {}: IELTS below requirement ({} < {})",
                    program.school, program.program, score, req
                ));
            }
        }
        if let Some(budget) = &criteria.budget {
            if budget.max > 0.0 && program.tuition_per_year > budget.max * self.options.budget_stretch
            {
                return Err(format!(
                    "{} {}: tuition far above budget ({} > {})",
                    program.school, program.program, program.tuition_per_year, budget.max
                ));
            }
        }
        Ok(())
    }

    async fn run_quick(
        &self,
        criteria: &MatchCriteria,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let bands = &QUICK_BANDS[..];
        let mut emitter = Emitter::new(reporter);

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::Parsing);
        emitter.emit(Stage::Parsing, lo, "Validating match criteria");
        emitter.emit(Stage::Parsing, hi, "Criteria ready");

        let corpus = match self.load_corpus(bands, &mut emitter, cancel).await? {
            Some(corpus) => corpus,
            None => return Ok(RunOutcome::Cancelled),
        };
        let scanned = corpus.len() as u64;

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (_, hi) = band(bands, Stage::InitialFilter);
        let kept = self.hard_filter(corpus, criteria);
        Emitter::bump(&mut emitter.filtered, kept.len() as u64);
        emitter.emit(
            Stage::InitialFilter,
            hi,
            format!("{} programs pass country/category filters", kept.len()),
        );

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::Scoring);
        emitter.emit(Stage::Scoring, lo, "Scoring candidates");
        let mut records: HashMap<String, ProgramRecord> = HashMap::new();
        let mut scored: Vec<ProgramScore> = Vec::with_capacity(kept.len());
        for (i, chunk) in kept.chunks(self.options.analysis_batch.max(1)).enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            for program in chunk {
                scored.push(score_program(program, criteria, &self.weights));
                records.insert(program.id.clone(), program.clone());
            }
            Emitter::bump(&mut emitter.analyzed, scored.len() as u64);
            let done = (i + 1) * self.options.analysis_batch.max(1);
            emitter.emit(
                Stage::Scoring,
                lerp(lo, hi, done.min(kept.len()), kept.len()),
                format!("Scored {} / {} programs", scored.len(), kept.len()),
            );
        }
        Emitter::bump(&mut emitter.matched, scored.len() as u64);

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, _) = band(bands, Stage::Sorting);
        emitter.emit(Stage::Sorting, lo, "Ranking and classifying tiers");
        assign_tiers(&mut scored, &self.policy);
        scored.truncate(self.options.quick_limit);
        let report = self.assemble(criteria, scored, &records, scanned, &mut emitter)?;

        emitter.emit(
            Stage::Completed,
            100,
            format!("Quick match complete: {} results", report.results.len()),
        );
        Ok(RunOutcome::Completed(report))
    }

    async fn run_deep(
        &self,
        criteria: &MatchCriteria,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let bands = &DEEP_BANDS[..];
        let mut emitter = Emitter::new(reporter);
        let batch = self.options.analysis_batch.max(1);

        // parsing
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::Parsing);
        emitter.emit(Stage::Parsing, lo, "Validating match criteria");
        emitter.emit(
            Stage::Parsing,
            hi,
            format!(
                "Criteria ready: {} countries, {} program categories",
                criteria.target_countries.len(),
                criteria.target_programs.len()
            ),
        );

        // loading
        let corpus = match self.load_corpus(bands, &mut emitter, cancel).await? {
            Some(corpus) => corpus,
            None => return Ok(RunOutcome::Cancelled),
        };
        let scanned = corpus.len() as u64;

        // initialFilter
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::InitialFilter);
        emitter.emit(Stage::InitialFilter, lo, "Applying country/category filters");
        let total_before = corpus.len();
        let kept = self.hard_filter(corpus, criteria);
        Emitter::bump(&mut emitter.filtered, kept.len() as u64);
        emitter.emit(
            Stage::InitialFilter,
            hi,
            format!(
                "{} of {} programs pass hard filters",
                kept.len(),
                total_before
            ),
        );

        // conditionMatch
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::ConditionMatch);
        emitter.emit(Stage::ConditionMatch, lo, "Checking eligibility conditions");
        let mut matched: Vec<ProgramRecord> = Vec::with_capacity(kept.len());
        let kept_len = kept.len();
        for (i, chunk) in kept.chunks(batch).enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            let mut dropped: Vec<String> = Vec::new();
            for program in chunk {
                match self.passes_soft_rules(program, criteria) {
                    Ok(()) => matched.push(program.clone()),
                    Err(reason) => dropped.push(reason),
                }
            }
            Emitter::bump(&mut emitter.matched, matched.len() as u64);
            let done = ((i + 1) * batch).min(kept_len);
            emitter.emit_with(
                Stage::ConditionMatch,
                lerp(lo, hi, done, kept_len),
                format!("{} / {} programs eligible", matched.len(), done),
                dropped,
            );
        }
        Emitter::bump(&mut emitter.matched, matched.len() as u64);
        emitter.emit(
            Stage::ConditionMatch,
            hi,
            format!("{} programs eligible", matched.len()),
        );

        // deepAnalysis
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::DeepAnalysis);
        emitter.emit(Stage::DeepAnalysis, lo, "Computing dimension scores");
        let mut records: HashMap<String, ProgramRecord> = HashMap::new();
        let mut analyzed: Vec<(String, DimensionScores)> = Vec::with_capacity(matched.len());
        let matched_len = matched.len();
        for (i, chunk) in matched.chunks(batch).enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            for program in chunk {
                let score = score_program(program, criteria, &self.weights);
                analyzed.push((program.id.clone(), score.dimensions));
                records.insert(program.id.clone(), program.clone());
            }
            Emitter::bump(&mut emitter.analyzed, analyzed.len() as u64);
            let done = ((i + 1) * batch).min(matched_len);
            emitter.emit(
                Stage::DeepAnalysis,
                lerp(lo, hi, done, matched_len),
                format!("Analyzed {} / {} programs", analyzed.len(), matched_len),
            );
        }
        emitter.emit(Stage::DeepAnalysis, hi, "Dimension analysis complete");

        // scoring
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::Scoring);
        emitter.emit(Stage::Scoring, lo, "Computing composite scores");
        let mut scored: Vec<ProgramScore> = analyzed
            .iter()
            .filter_map(|(id, dims)| {
                let record = records.get(id)?;
                Some(ProgramScore {
                    program_id: id.clone(),
                    school: record.school.clone(),
                    program: record.program.clone(),
                    dimensions: *dims,
                    composite: composite(dims, &self.weights),
                    tier: Tier::Match,
                })
            })
            .collect();
        assign_tiers(&mut scored, &self.policy);
        emitter.emit(
            Stage::Scoring,
            hi,
            format!("Composite scores ready for {} programs", scored.len()),
        );

        // caseComparison
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, hi) = band(bands, Stage::CaseComparison);
        emitter.emit(Stage::CaseComparison, lo, "Matching historical cases");
        let mut cases: HashMap<String, Vec<crate::models::CaseRef>> = HashMap::new();
        let scored_len = scored.len();
        for (i, chunk) in scored.chunks(batch).enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            for item in chunk {
                // Optional enrichment: a failed or empty lookup leaves
                // the result without case references.
                if let Ok(found) = self
                    .catalog
                    .similar_cases(&item.school, &item.program)
                    .await
                {
                    if !found.is_empty() {
                        cases.insert(item.program_id.clone(), found);
                    }
                }
            }
            let done = ((i + 1) * batch).min(scored_len);
            emitter.emit(
                Stage::CaseComparison,
                lerp(lo, hi, done, scored_len),
                format!("Compared {} / {} programs", done, scored_len),
            );
        }
        emitter.emit(Stage::CaseComparison, hi, "Case comparison complete");

        // sorting
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let (lo, _) = band(bands, Stage::Sorting);
        emitter.emit(Stage::Sorting, lo, "Finalizing ranking and tiers");
        let mut report = self.assemble(criteria, scored, &records, scanned, &mut emitter)?;
        for result in report.results.iter_mut() {
            if let Some(found) = cases.remove(&result.id) {
                result.similar_cases = found;
            }
        }

        emitter.emit(
            Stage::Completed,
            100,
            format!("Deep search complete: {} results", report.results.len()),
        );
        Ok(RunOutcome::Completed(report))
    }

    /// Group scored programs Reach → Match → Safety (composite
    /// descending within a tier) and build the final results.
    fn assemble(
        &self,
        criteria: &MatchCriteria,
        scored: Vec<ProgramScore>,
        records: &HashMap<String, ProgramRecord>,
        scanned: u64,
        emitter: &mut Emitter<'_>,
    ) -> Result<SearchReport> {
        let mut counts = TierCounts::default();
        let mut results: Vec<RecommendationResult> = Vec::with_capacity(scored.len());

        for tier in Tier::ALL {
            for item in scored.iter().filter(|s| s.tier == tier) {
                let record = match records.get(&item.program_id) {
                    Some(record) => record,
                    // Degrade: an item with no backing record yields no
                    // result, never a run-level fault.
                    None => continue,
                };
                match tier {
                    Tier::Reach => counts.reach += 1,
                    Tier::Match => counts.matched += 1,
                    Tier::Safety => counts.safety += 1,
                }
                results.push(build_result(item, record));
            }
        }

        Ok(SearchReport {
            mode: criteria.mode,
            results,
            tier_counts: counts,
            scanned,
            filtered: emitter.filtered.unwrap_or(0),
            matched: emitter.matched.unwrap_or(emitter.filtered.unwrap_or(0)),
        })
    }
}

fn strength_phrase(key: StrengthKey) -> &'static str {
    match key {
        StrengthKey::Ranking => "school ranking",
        StrengthKey::Research => "research emphasis",
        StrengthKey::Internship => "internship pipeline",
        StrengthKey::Language => "language fit",
        StrengthKey::Budget => "budget fit",
        StrengthKey::Location => "location match",
    }
}

fn build_result(item: &ProgramScore, record: &ProgramRecord) -> RecommendationResult {
    let ranked = item.dimensions.ranked();
    let match_reason = if ranked[0].1 >= 60.0 {
        format!(
            "Strong {} and {}",
            strength_phrase(ranked[0].0),
            strength_phrase(ranked[1].0)
        )
    } else {
        "Moderate overall fit".to_string()
    };

    let rationale = format!(
        "{} {} scores {:.1} overall ({} tier). Strongest dimensions: {} {:.0}, {} {:.0}.",
        record.school,
        record.program,
        item.composite,
        item.tier,
        strength_phrase(ranked[0].0),
        ranked[0].1,
        strength_phrase(ranked[1].0),
        ranked[1].1,
    );

    let mut requirement_notes = Vec::new();
    if let Some(min) = record.min_gpa {
        requirement_notes.push(format!("GPA ≥ {:.1}", min));
    }
    if let Some(min) = record.min_toefl {
        requirement_notes.push(format!("TOEFL ≥ {:.0}", min));
    }
    if let Some(min) = record.min_ielts {
        requirement_notes.push(format!("IELTS ≥ {:.1}", min));
    }
    requirement_notes.push(format!(
        "Tuition {:.0} {} / year",
        record.tuition_per_year, record.currency
    ));

    RecommendationResult {
        id: record.id.clone(),
        school: record.school.clone(),
        program: record.program.clone(),
        tier: item.tier,
        score: item.composite,
        match_reason,
        rationale,
        highlights: record.highlights.clone(),
        requirement_notes,
        similar_cases: Vec::new(),
        selected: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Gpa, GpaScale, LanguageScores};
    use crate::models::CaseRef;
    use crate::progress::BufferedReporter;
    use crate::store::memory::MemoryCatalog;
    use std::sync::Mutex;

    fn program(id: &str, country: &str, category: &str) -> ProgramRecord {
        ProgramRecord {
            id: id.to_string(),
            school: format!("School {}", id),
            program: format!("MS {}", category),
            country: country.to_string(),
            category: category.to_string(),
            prestige_tier: 2,
            research_emphasis: 75.0,
            internship_emphasis: 65.0,
            min_gpa: Some(3.0),
            min_toefl: Some(95.0),
            min_ielts: None,
            tuition_per_year: 50000.0,
            currency: "USD".to_string(),
            city: None,
            highlights: vec!["STEM".to_string()],
        }
    }

    fn criteria(mode: SearchMode) -> MatchCriteria {
        MatchCriteria {
            mode,
            target_countries: vec!["美国".to_string()],
            target_programs: vec!["CS".to_string()],
            current_school: None,
            gpa: Some(Gpa {
                value: 3.7,
                scale: GpaScale::FourPoint,
            }),
            language: LanguageScores {
                toefl: Some(106.0),
                ..Default::default()
            },
            budget: None,
        }
    }

    fn five_item_corpus() -> Vec<ProgramRecord> {
        vec![
            program("p1", "美国", "CS"),
            program("p2", "美国", "CS"),
            program("p3", "美国", "CS"),
            program("p4", "英国", "CS"),   // wrong country
            program("p5", "美国", "Finance"), // wrong category
        ]
    }

    fn pipeline(catalog: &MemoryCatalog) -> SearchPipeline<'_, MemoryCatalog> {
        SearchPipeline::new(catalog, WeightConfig::default(), TierPolicy::default())
    }

    /// Records events and cancels the shared token when a trigger
    /// stage first reports.
    struct CancellingReporter {
        events: Mutex<Vec<SearchProgress>>,
        token: CancelToken,
        at: Stage,
    }

    impl ProgressReporter for CancellingReporter {
        fn report(&self, event: SearchProgress) {
            if event.stage == self.at {
                self.token.cancel();
            }
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn deep_run_visits_all_stages_in_order_with_monotone_percent() {
        let catalog = MemoryCatalog::new(five_item_corpus());
        let reporter = BufferedReporter::new();
        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &CancelToken::new())
            .await
            .unwrap();

        let events = reporter.events();
        assert!(!events.is_empty());

        // Stage sequence: the 8 deep stages in order, then completed.
        let mut seen: Vec<Stage> = Vec::new();
        for e in &events {
            if seen.last() != Some(&e.stage) {
                seen.push(e.stage);
            }
        }
        let mut expected: Vec<Stage> = Stage::DEEP_ORDER.to_vec();
        expected.push(Stage::Completed);
        assert_eq!(seen, expected);

        // Percent monotone, ending at 100.
        let mut last = 0u8;
        for e in &events {
            assert!(e.percent >= last, "percent regressed: {} < {}", e.percent, last);
            last = e.percent;
        }
        assert_eq!(events.last().unwrap().percent, 100);
        assert_eq!(events.last().unwrap().stage, Stage::Completed);

        match outcome {
            RunOutcome::Completed(report) => {
                assert_eq!(report.scanned, 5);
                assert_eq!(report.filtered, 3);
                assert_eq!(report.results.len(), 3);
            }
            RunOutcome::Cancelled => panic!("run must complete"),
        }
    }

    #[tokio::test]
    async fn counts_never_decrease_within_a_run() {
        let corpus: Vec<ProgramRecord> = (0..90)
            .map(|i| program(&format!("p{:03}", i), "美国", "CS"))
            .collect();
        let catalog = MemoryCatalog::new(corpus);
        let reporter = BufferedReporter::new();
        pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &CancelToken::new())
            .await
            .unwrap();

        let mut last = (0u64, 0u64, 0u64, 0u64, 0u64);
        for e in reporter.events() {
            let now = (
                e.scanned.unwrap_or(last.0),
                e.total.unwrap_or(last.1),
                e.filtered.unwrap_or(last.2),
                e.matched.unwrap_or(last.3),
                e.analyzed.unwrap_or(last.4),
            );
            assert!(now.0 >= last.0 && now.1 >= last.1 && now.2 >= last.2);
            assert!(now.3 >= last.3 && now.4 >= last.4);
            last = now;
        }
    }

    #[tokio::test]
    async fn cancel_after_initial_filter_stops_the_run() {
        let catalog = MemoryCatalog::new(five_item_corpus());
        let token = CancelToken::new();
        let reporter = CancellingReporter {
            events: Mutex::new(Vec::new()),
            token: token.clone(),
            at: Stage::InitialFilter,
        };

        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &token)
            .await
            .unwrap();

        assert!(outcome.is_cancelled());
        let forbidden = [
            Stage::ConditionMatch,
            Stage::DeepAnalysis,
            Stage::Scoring,
            Stage::CaseComparison,
            Stage::Sorting,
            Stage::Completed,
        ];
        for e in reporter.events.lock().unwrap().iter() {
            assert!(
                !forbidden.contains(&e.stage),
                "event after cancellation: {:?}",
                e.stage
            );
        }
    }

    #[tokio::test]
    async fn empty_corpus_completes_with_zero_results() {
        let catalog = MemoryCatalog::new(Vec::new());
        let reporter = BufferedReporter::new();
        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &CancelToken::new())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed(report) => {
                assert!(report.results.is_empty());
                assert_eq!(report.matched, 0);
                assert_eq!(report.tier_counts.reach, 0);
            }
            RunOutcome::Cancelled => panic!("empty corpus is a normal completion"),
        }
        let events = reporter.events();
        assert_eq!(events.last().unwrap().stage, Stage::Completed);
        assert_eq!(events.last().unwrap().percent, 100);
    }

    #[tokio::test]
    async fn quick_match_on_stub_corpus_returns_filtered_tiered_results() {
        let catalog = MemoryCatalog::new(five_item_corpus());
        let reporter = BufferedReporter::new();
        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Quick), &reporter, &CancelToken::new())
            .await
            .unwrap();

        let report = match outcome {
            RunOutcome::Completed(report) => report,
            RunOutcome::Cancelled => panic!("run must complete"),
        };
        assert!(report.results.len() <= 3);
        for r in &report.results {
            assert!(["冲刺", "匹配", "保底"].contains(&r.tier.label()));
        }
        // Grouped Reach → Match → Safety.
        let tiers: Vec<Tier> = report.results.iter().map(|r| r.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[tokio::test]
    async fn precondition_violation_rejects_before_any_event() {
        let catalog = MemoryCatalog::new(five_item_corpus());
        let reporter = BufferedReporter::new();
        let mut bad = criteria(SearchMode::Deep);
        bad.target_programs.clear();

        let outcome = pipeline(&catalog)
            .run(&bad, &reporter, &CancelToken::new())
            .await;

        assert!(outcome.is_err());
        assert!(reporter.events().is_empty(), "no events before rejection");
    }

    #[tokio::test]
    async fn soft_rules_drop_ineligible_programs_in_deep_mode() {
        let mut strict = program("p9", "美国", "CS");
        strict.min_gpa = Some(3.95); // above student's 3.7 + slack
        let catalog = MemoryCatalog::new(vec![program("p1", "美国", "CS"), strict]);
        let reporter = BufferedReporter::new();
        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &CancelToken::new())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed(report) => {
                assert_eq!(report.filtered, 2);
                assert_eq!(report.matched, 1);
                assert_eq!(report.results.len(), 1);
                assert_eq!(report.results[0].id, "p1");
            }
            RunOutcome::Cancelled => panic!("run must complete"),
        }
        // The drop reason lands in a detail log line.
        let has_detail = reporter
            .events()
            .iter()
            .any(|e| e.details.iter().any(|d| d.contains("GPA below requirement")));
        assert!(has_detail);
    }

    #[tokio::test]
    async fn case_references_attach_during_deep_runs() {
        let catalog = MemoryCatalog::new(vec![program("p1", "美国", "CS")]).with_cases(
            "School p1",
            "MS CS",
            vec![CaseRef {
                title: "2024 Fall admit, GPA 3.6, TOEFL 104".to_string(),
                outcome: "admitted".to_string(),
            }],
        );
        let reporter = BufferedReporter::new();
        let outcome = pipeline(&catalog)
            .run(&criteria(SearchMode::Deep), &reporter, &CancelToken::new())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed(report) => {
                assert_eq!(report.results[0].similar_cases.len(), 1);
                assert_eq!(report.results[0].similar_cases[0].outcome, "admitted");
            }
            RunOutcome::Cancelled => panic!("run must complete"),
        }
    }

    #[tokio::test]
    async fn identical_runs_return_identical_orderings() {
        let catalog = MemoryCatalog::new(five_item_corpus());
        let run = || async {
            match pipeline(&catalog)
                .run(&criteria(SearchMode::Deep), &NoopReporter, &CancelToken::new())
                .await
                .unwrap()
            {
                RunOutcome::Completed(report) => {
                    report.results.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
                }
                RunOutcome::Cancelled => panic!("run must complete"),
            }
        };
        assert_eq!(run().await, run().await);
    }

    struct NoopReporter;
    impl ProgressReporter for NoopReporter {
        fn report(&self, _event: SearchProgress) {}
    }
}
