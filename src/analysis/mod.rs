//! Correlation & Importance Engine
//!
//! Joins feature vectors with churn labels and produces:
//! - Pearson correlation of each feature with `churned` as {0, 1}
//! - mean of each feature per cohort, with absolute and relative differences
//! - an importance ranking from an [`ImportanceOracle`]
//!
//! Undefined statistics are `None` and come with a [`DegenerateInput`]
//! warning instead of a misleading number.

pub mod importance;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DegenerateInput, EngineError, Result};
use crate::sanitize;
use crate::types::{FeatureName, FeatureVector, UserId, EPSILON, FEATURE_COUNT};

pub use importance::{ForestImportance, ImportanceOracle, LogisticImportance};

/// Mean of one feature in each cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortComparison {
    pub churned_mean: f64,
    pub retained_mean: f64,
    /// `retained_mean - churned_mean`
    pub difference: f64,
    /// `difference / churned_mean * 100`; `None` when the churned mean is zero
    pub pct_difference: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnDiagnostics {
    pub sample_size: usize,
    pub churned_count: usize,
    pub retained_count: usize,
    pub oracle: String,
    /// `None` marks an undefined correlation
    pub correlations: BTreeMap<FeatureName, Option<f64>>,
    pub importances: BTreeMap<FeatureName, f64>,
    /// `None` when either cohort is empty
    pub cohort_means: Option<BTreeMap<FeatureName, CohortComparison>>,
    pub warnings: Vec<DegenerateInput>,
}

impl ChurnDiagnostics {
    /// Defined correlations ascending (strongest retention signal first), undefined ones last.
    pub fn sorted_correlations(&self) -> Vec<(FeatureName, Option<f64>)> {
        let mut sorted: Vec<_> = self.correlations.iter().map(|(k, v)| (*k, *v)).collect();
        sorted.sort_by(|a, b| match (a.1, b.1) {
            (Some(x), Some(y)) => x.total_cmp(&y).then(a.0.cmp(&b.0)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        sorted
    }

    /// Importances descending; ties by feature order.
    pub fn ranked_importances(&self) -> Vec<(FeatureName, f64)> {
        let mut ranked: Vec<_> = self.importances.iter().map(|(k, v)| (*k, *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    pub fn churn_rate(&self) -> Option<f64> {
        if self.sample_size == 0 {
            None
        } else {
            Some(self.churned_count as f64 / self.sample_size as f64)
        }
    }
}

pub struct CorrelationEngine<'a> {
    oracle: &'a dyn ImportanceOracle,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(oracle: &'a dyn ImportanceOracle) -> Self {
        Self { oracle }
    }

    /// Every user in `features` must have a label; extra labels are ignored.
    pub fn analyze(
        &self,
        features: &BTreeMap<UserId, FeatureVector>,
        labels: &BTreeMap<UserId, bool>,
    ) -> Result<ChurnDiagnostics> {
        let mut rows = Vec::with_capacity(features.len());
        let mut churned = Vec::with_capacity(features.len());
        for (user_id, vector) in features {
            let label = labels
                .get(user_id)
                .ok_or_else(|| EngineError::MissingLabel(user_id.clone()))?;
            rows.push(*vector);
            churned.push(*label);
        }

        let mut warnings = Vec::new();
        let label_values: Vec<f64> = churned.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect();
        let churned_count = churned.iter().filter(|c| **c).count();
        let retained_count = churned.len() - churned_count;

        let correlations = self.correlations(&rows, &label_values, &mut warnings);
        let cohort_means = cohort_comparison(&rows, &churned, &mut warnings);
        let importances = self.importances(&rows, &churned, &mut warnings)?;

        for warning in &warnings {
            tracing::warn!(%warning, "degenerate churn statistic");
        }
        tracing::info!(
            users = rows.len(),
            churned = churned_count,
            retained = retained_count,
            oracle = self.oracle.name(),
            "churn analysis complete"
        );

        Ok(ChurnDiagnostics {
            sample_size: rows.len(),
            churned_count,
            retained_count,
            oracle: self.oracle.name().to_string(),
            correlations,
            importances,
            cohort_means,
            warnings,
        })
    }

    fn correlations(
        &self,
        rows: &[FeatureVector],
        label_values: &[f64],
        warnings: &mut Vec<DegenerateInput>,
    ) -> BTreeMap<FeatureName, Option<f64>> {
        let label_constant = stats::is_constant(label_values);
        if label_constant {
            warnings.push(DegenerateInput::ConstantLabel);
        }

        FeatureName::ALL
            .iter()
            .map(|&name| {
                let column = column(rows, name);
                if stats::is_constant(&column) {
                    warnings.push(DegenerateInput::ZeroVariance { feature: name });
                }
                let r = if label_constant {
                    None
                } else {
                    stats::pearson(&column, label_values)
                };
                (name, r)
            })
            .collect()
    }

    fn importances(
        &self,
        rows: &[FeatureVector],
        churned: &[bool],
        warnings: &mut Vec<DegenerateInput>,
    ) -> Result<BTreeMap<FeatureName, f64>> {
        let raw = self.oracle.fit(rows, churned)?;
        if raw.len() != FEATURE_COUNT {
            return Err(EngineError::Oracle(format!(
                "{} returned {} weights for {} features",
                self.oracle.name(),
                raw.len(),
                FEATURE_COUNT
            )));
        }
        if sanitize::has_invalid_values(&raw) || raw.iter().any(|w| *w < 0.0) {
            return Err(EngineError::Oracle(format!(
                "{} returned negative or non-finite weights: {:?}",
                self.oracle.name(),
                raw
            )));
        }

        let total: f64 = raw.iter().sum();
        if total <= EPSILON {
            warnings.push(DegenerateInput::DegenerateImportance);
        }
        Ok(FeatureName::ALL
            .iter()
            .zip(raw.iter())
            .map(|(&name, &w)| (name, if total > EPSILON { w / total } else { 0.0 }))
            .collect())
    }
}

fn column(rows: &[FeatureVector], name: FeatureName) -> Vec<f64> {
    rows.iter().map(|r| r.get(name)).collect()
}

fn cohort_comparison(
    rows: &[FeatureVector],
    churned: &[bool],
    warnings: &mut Vec<DegenerateInput>,
) -> Option<BTreeMap<FeatureName, CohortComparison>> {
    let (churned_rows, retained_rows): (Vec<(&FeatureVector, bool)>, Vec<(&FeatureVector, bool)>) =
        rows.iter()
            .zip(churned.iter().copied())
            .partition(|(_, c)| *c);

    if churned_rows.is_empty() {
        warnings.push(DegenerateInput::EmptyCohort { churned: true });
    }
    if retained_rows.is_empty() {
        warnings.push(DegenerateInput::EmptyCohort { churned: false });
    }
    if churned_rows.is_empty() || retained_rows.is_empty() {
        return None;
    }

    let mut comparison = BTreeMap::new();
    for name in FeatureName::ALL {
        let churned_values: Vec<f64> = churned_rows.iter().map(|(r, _)| r.get(name)).collect();
        let retained_values: Vec<f64> = retained_rows.iter().map(|(r, _)| r.get(name)).collect();
        let churned_mean = stats::mean(&churned_values)?;
        let retained_mean = stats::mean(&retained_values)?;
        let difference = retained_mean - churned_mean;
        let pct_difference = if churned_mean == 0.0 {
            warnings.push(DegenerateInput::ZeroBaseline { feature: name });
            None
        } else {
            Some(difference / churned_mean * 100.0)
        };
        comparison.insert(
            name,
            CohortComparison {
                churned_mean,
                retained_mean,
                difference,
                pct_difference,
            },
        );
    }
    Some(comparison)
}
