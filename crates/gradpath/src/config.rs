use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use gradpath_core::pipeline::PipelineOptions;
use gradpath_core::scoring::WeightConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Path to the JSON corpus file (programs + optional case library).
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default)]
    pub weights: WeightsConfig,
    /// How strongly risk preference scales the Reach share of the tier
    /// distribution.
    #[serde(default = "default_risk_bias")]
    pub risk_bias: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            risk_bias: default_risk_bias(),
        }
    }
}

fn default_risk_bias() -> f64 {
    0.5
}

/// Per-dimension weight sliders, 0–100 each. Out-of-range values are
/// clamped at the scoring boundary, not here.
#[derive(Debug, Deserialize, Clone)]
pub struct WeightsConfig {
    #[serde(default = "default_ranking_weight")]
    pub ranking: f64,
    #[serde(default = "default_research_weight")]
    pub research: f64,
    #[serde(default = "default_internship_weight")]
    pub internship: f64,
    #[serde(default = "default_language_weight")]
    pub language: f64,
    #[serde(default = "default_budget_weight")]
    pub budget: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            ranking: default_ranking_weight(),
            research: default_research_weight(),
            internship: default_internship_weight(),
            language: default_language_weight(),
            budget: default_budget_weight(),
            location: default_location_weight(),
        }
    }
}

fn default_ranking_weight() -> f64 {
    70.0
}
fn default_research_weight() -> f64 {
    55.0
}
fn default_internship_weight() -> f64 {
    45.0
}
fn default_language_weight() -> f64 {
    60.0
}
fn default_budget_weight() -> f64 {
    50.0
}
fn default_location_weight() -> f64 {
    40.0
}

impl WeightsConfig {
    pub fn to_weight_config(&self) -> WeightConfig {
        WeightConfig {
            ranking: self.ranking,
            research: self.research,
            internship: self.internship,
            language: self.language,
            budget: self.budget,
            location: self.location,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_quick_limit")]
    pub quick_limit: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_analysis_batch")]
    pub analysis_batch: usize,
    #[serde(default = "default_gpa_slack")]
    pub gpa_slack: f64,
    #[serde(default = "default_toefl_slack")]
    pub toefl_slack: f64,
    #[serde(default = "default_ielts_slack")]
    pub ielts_slack: f64,
    #[serde(default = "default_budget_stretch")]
    pub budget_stretch: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quick_limit: default_quick_limit(),
            page_size: default_page_size(),
            analysis_batch: default_analysis_batch(),
            gpa_slack: default_gpa_slack(),
            toefl_slack: default_toefl_slack(),
            ielts_slack: default_ielts_slack(),
            budget_stretch: default_budget_stretch(),
        }
    }
}

fn default_quick_limit() -> usize {
    24
}
fn default_page_size() -> u64 {
    40
}
fn default_analysis_batch() -> usize {
    10
}
fn default_gpa_slack() -> f64 {
    0.15
}
fn default_toefl_slack() -> f64 {
    8.0
}
fn default_ielts_slack() -> f64 {
    1.0
}
fn default_budget_stretch() -> f64 {
    1.3
}

impl PipelineConfig {
    pub fn to_options(&self) -> PipelineOptions {
        PipelineOptions {
            quick_limit: self.quick_limit,
            page_size: self.page_size,
            analysis_batch: self.analysis_batch,
            gpa_slack: self.gpa_slack,
            toefl_slack: self.toefl_slack,
            ielts_slack: self.ielts_slack,
            budget_stretch: self.budget_stretch,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
