//! Run report and JSON writer for the demo layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::CohortComparison;
use crate::error::{DegenerateInput, Result};
use crate::lift::ContentPerformance;
use crate::pipeline::{AnalysisRun, Dataset, DatasetSummary};
use crate::types::{ContentId, FeatureName, Recommendation, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub feature: FeatureName,
    pub value: Option<f64>,
}

/// Recommendations shown for one user in the demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub user_id: UserId,
    pub goal: String,
    pub session_number: u32,
    pub seen_content: Vec<ContentId>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub dataset: DatasetSummary,
    pub churn_rate: Option<f64>,
    pub oracle: String,
    /// Ascending; undefined correlations last
    pub correlations: Vec<FeatureScore>,
    pub cohort_comparison: Option<BTreeMap<FeatureName, CohortComparison>>,
    /// Descending
    pub importances: Vec<FeatureScore>,
    pub retention_lift_fallback: f64,
    pub content_performance: Vec<ContentPerformance>,
    pub recommendations: Vec<RecommendationSet>,
    pub warnings: Vec<DegenerateInput>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn from_run(dataset: &Dataset, run: &AnalysisRun, generated_at: DateTime<Utc>) -> Self {
        let diagnostics = &run.diagnostics;
        let mut warnings = diagnostics.warnings.clone();
        warnings.extend(run.lift.warnings.iter().cloned());

        Self {
            generated_at,
            dataset: dataset.summary(),
            churn_rate: diagnostics.churn_rate(),
            oracle: diagnostics.oracle.clone(),
            correlations: diagnostics
                .sorted_correlations()
                .into_iter()
                .map(|(feature, value)| FeatureScore { feature, value })
                .collect(),
            cohort_comparison: diagnostics.cohort_means.clone(),
            importances: diagnostics
                .ranked_importances()
                .into_iter()
                .map(|(feature, value)| FeatureScore {
                    feature,
                    value: Some(value),
                })
                .collect(),
            retention_lift_fallback: run.lift.fallback(),
            content_performance: run.content_performance.clone(),
            recommendations: Vec::new(),
            warnings,
            elapsed_ms: run.elapsed_ms,
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<RecommendationSet>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

/// Writes pretty JSON files into `<output_dir>/run_YYYYMMDD_HHMMSS`.
pub struct ResultsWriter {
    run_dir: PathBuf,
}

impl ResultsWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_timestamp(output_dir, Utc::now())
    }

    pub fn with_timestamp(output_dir: impl AsRef<Path>, timestamp: DateTime<Utc>) -> Result<Self> {
        let run_dir = output_dir
            .as_ref()
            .join(format!("run_{}", timestamp.format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&run_dir)?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.run_dir.join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Full report plus one file per section. Returns section name to path.
    pub fn write_report(&self, report: &RunReport) -> Result<BTreeMap<String, PathBuf>> {
        let mut paths = BTreeMap::new();
        paths.insert("run_summary".to_string(), self.write_json("run_summary", report)?);
        paths.insert(
            "churn_correlations".to_string(),
            self.write_json("churn_correlations", &report.correlations)?,
        );
        if let Some(cohorts) = &report.cohort_comparison {
            paths.insert(
                "cohort_comparison".to_string(),
                self.write_json("cohort_comparison", cohorts)?,
            );
        }
        paths.insert(
            "feature_importance".to_string(),
            self.write_json("feature_importance", &report.importances)?,
        );
        paths.insert(
            "content_performance".to_string(),
            self.write_json("content_performance", &report.content_performance)?,
        );
        paths.insert(
            "recommendations".to_string(),
            self.write_json("recommendations", &report.recommendations)?,
        );

        tracing::info!(run_dir = %self.run_dir.display(), files = paths.len(), "wrote run report");
        Ok(paths)
    }
}
