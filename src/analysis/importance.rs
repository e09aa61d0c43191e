//! Feature-importance oracles.
//!
//! The correlation engine only needs "a non-negative weight per feature,
//! summing to ~1" from whatever model sits behind [`ImportanceOracle`].
//! Two implementations are provided:
//!
//! - [`ForestImportance`] - bagged Gini trees, mean decrease in impurity
//! - [`LogisticImportance`] - |coefficient| of an L2 logistic regression on standardised features
//!
//! Both are seeded or fully deterministic, so a fixed input gives a fixed ranking.

use rand::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::stats::{self, gini};
use crate::config::ImportanceConfig;
use crate::error::{EngineError, Result};
use crate::types::{FeatureVector, EPSILON, FEATURE_COUNT};

/// Pluggable importance model: `fit(features, labels) -> weight per feature`.
pub trait ImportanceOracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// One weight per entry of [`FeatureName::ALL`](crate::types::FeatureName::ALL).
    fn fit(&self, rows: &[FeatureVector], churned: &[bool]) -> Result<Vec<f64>>;
}

// ==================== Random Forest ====================

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [FeatureVector],
    labels: &'a [bool],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    importances: [f64; FEATURE_COUNT],
    rng: ChaCha8Rng,
}

impl<'a> TreeBuilder<'a> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| self.labels[i]).count();
        if depth >= self.max_depth
            || n < self.min_samples_split
            || gini(positives as f64, n as f64) <= 0.0
        {
            return;
        }

        let mut candidates: Vec<usize> = (0..FEATURE_COUNT).collect();
        candidates.shuffle(&mut self.rng);
        candidates.truncate(self.max_features);

        let mut best: Option<Split> = None;
        for feature in candidates {
            if let Some(split) = self.best_split(&indices, feature, positives) {
                if best.map_or(true, |b| split.decrease > b.decrease) {
                    best = Some(split);
                }
            }
        }

        let split = match best {
            Some(split) if split.decrease > EPSILON => split,
            _ => return,
        };
        self.importances[split.feature] += split.decrease;

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.rows[i].as_slice()[split.feature] <= split.threshold);
        self.grow(left, depth + 1);
        self.grow(right, depth + 1);
    }

    /// Best threshold on one feature, scored as the drop in sample-weighted Gini impurity.
    fn best_split(&self, indices: &[usize], feature: usize, positives: usize) -> Option<Split> {
        let mut sorted: Vec<(f64, bool)> = indices
            .iter()
            .map(|&i| (self.rows[i].as_slice()[feature], self.labels[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len() as f64;
        let parent = gini(positives as f64, n) * n;
        let mut left_pos = 0.0;
        let mut best: Option<Split> = None;

        for k in 0..sorted.len().saturating_sub(1) {
            if sorted[k].1 {
                left_pos += 1.0;
            }
            if sorted[k].0 == sorted[k + 1].0 {
                continue;
            }
            let n_left = (k + 1) as f64;
            let n_right = n - n_left;
            let right_pos = positives as f64 - left_pos;
            let child = gini(left_pos, n_left) * n_left + gini(right_pos, n_right) * n_right;
            let decrease = parent - child;
            if best.map_or(true, |b| decrease > b.decrease) {
                best = Some(Split {
                    feature,
                    threshold: sorted[k].0,
                    decrease,
                });
            }
        }
        best
    }
}

/// Bagged ensemble of depth-limited Gini trees.
///
/// Tree `t` draws its bootstrap sample and feature subsets from
/// `ChaCha8Rng::seed_from_u64(seed + t)`, so trees can be grown on any thread
/// without changing the result.
#[derive(Debug, Clone)]
pub struct ForestImportance {
    seed: u64,
    trees: usize,
    max_depth: usize,
    min_samples_split: usize,
}

impl ForestImportance {
    pub fn new(config: &ImportanceConfig) -> Self {
        Self {
            seed: config.seed,
            trees: config.trees.max(1),
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split.max(2),
        }
    }

    fn grow_tree(&self, rows: &[FeatureVector], labels: &[bool], tree_index: usize) -> [f64; FEATURE_COUNT] {
        let n = rows.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_index as u64));
        let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let mut builder = TreeBuilder {
            rows,
            labels,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: ((FEATURE_COUNT as f64).sqrt() as usize).max(1),
            importances: [0.0; FEATURE_COUNT],
            rng,
        };
        builder.grow(sample, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > EPSILON {
            for v in importances.iter_mut() {
                *v /= total;
            }
        }
        importances
    }
}

impl Default for ForestImportance {
    fn default() -> Self {
        Self::new(&ImportanceConfig::default())
    }
}

impl ImportanceOracle for ForestImportance {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&self, rows: &[FeatureVector], churned: &[bool]) -> Result<Vec<f64>> {
        check_aligned(self.name(), rows, churned)?;
        if rows.is_empty() {
            return Ok(vec![0.0; FEATURE_COUNT]);
        }

        let per_tree: Vec<[f64; FEATURE_COUNT]> = (0..self.trees)
            .into_par_iter()
            .map(|t| self.grow_tree(rows, churned, t))
            .collect();

        let mut totals = vec![0.0; FEATURE_COUNT];
        for tree in &per_tree {
            for (total, v) in totals.iter_mut().zip(tree.iter()) {
                *total += v;
            }
        }
        for total in totals.iter_mut() {
            *total /= per_tree.len() as f64;
        }
        Ok(totals)
    }
}

// ==================== Logistic Regression ====================

/// L2-regularised logistic regression fitted by batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticImportance {
    learning_rate: f64,
    regularization: f64,
    max_iterations: u32,
    convergence_threshold: f64,
}

impl LogisticImportance {
    pub fn new(config: &ImportanceConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            regularization: config.regularization,
            max_iterations: config.max_iterations,
            convergence_threshold: config.convergence_threshold,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Z-scores each column; constant columns become all zeros.
    fn standardize(rows: &[FeatureVector]) -> Vec<[f64; FEATURE_COUNT]> {
        let mut scaled = vec![[0.0; FEATURE_COUNT]; rows.len()];
        for j in 0..FEATURE_COUNT {
            let column: Vec<f64> = rows.iter().map(|r| r.as_slice()[j]).collect();
            let m = stats::mean(&column).unwrap_or(0.0);
            let sd = stats::standard_deviation(&column).unwrap_or(0.0);
            if sd <= EPSILON {
                continue;
            }
            for (i, v) in column.iter().enumerate() {
                scaled[i][j] = (v - m) / sd;
            }
        }
        scaled
    }
}

impl Default for LogisticImportance {
    fn default() -> Self {
        Self::new(&ImportanceConfig::default())
    }
}

impl ImportanceOracle for LogisticImportance {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&self, rows: &[FeatureVector], churned: &[bool]) -> Result<Vec<f64>> {
        check_aligned(self.name(), rows, churned)?;
        if rows.is_empty() {
            return Ok(vec![0.0; FEATURE_COUNT]);
        }

        let x = Self::standardize(rows);
        let n = x.len() as f64;
        // Last slot is the intercept.
        let mut weights = [0.0; FEATURE_COUNT + 1];
        let mut prev_loss = f64::INFINITY;

        for _ in 0..self.max_iterations {
            let mut gradients = [0.0; FEATURE_COUNT + 1];
            let mut loss = 0.0;

            for (row, &label) in x.iter().zip(churned.iter()) {
                let logit = row
                    .iter()
                    .zip(weights.iter())
                    .map(|(a, w)| a * w)
                    .sum::<f64>()
                    + weights[FEATURE_COUNT];
                let pred = Self::sigmoid(logit);
                let y = if label { 1.0 } else { 0.0 };
                loss += -y * (pred + EPSILON).ln() - (1.0 - y) * (1.0 - pred + EPSILON).ln();

                let error = pred - y;
                for j in 0..FEATURE_COUNT {
                    gradients[j] += error * row[j];
                }
                gradients[FEATURE_COUNT] += error;
            }

            for j in 0..FEATURE_COUNT {
                loss += (self.regularization / 2.0) * weights[j] * weights[j];
                gradients[j] += self.regularization * weights[j];
            }

            for j in 0..=FEATURE_COUNT {
                weights[j] -= self.learning_rate * gradients[j] / n;
            }

            if (prev_loss - loss).abs() < self.convergence_threshold {
                break;
            }
            prev_loss = loss;
        }

        Ok(weights[..FEATURE_COUNT].iter().map(|w| w.abs()).collect())
    }
}

fn check_aligned(oracle: &str, rows: &[FeatureVector], churned: &[bool]) -> Result<()> {
    if rows.len() != churned.len() {
        return Err(EngineError::Oracle(format!(
            "{oracle} got {} rows but {} labels",
            rows.len(),
            churned.len()
        )));
    }
    Ok(())
}
