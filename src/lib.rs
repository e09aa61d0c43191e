//! # retention-engine - churn features and retention-aware recommendations
//!
//! Batch pipeline over a wellness app's interaction log:
//!
//! - **Feature Aggregator** - per-user engagement features over the observation window
//! - **Churn Labeler** - churned iff no activity in the churn window
//! - **Correlation & Importance** - Pearson correlation, cohort means, pluggable importance oracle
//! - **Retention Lift** - retention rate of users who met an item in their first session
//! - **Recommendation Scorer** - goal, retention, completion and freshness terms with
//!   session-bucketed weights
//!
//! ## Modules
//!
//! - [`features`] - feature aggregation
//! - [`labeling`] - churn labels
//! - [`analysis`] - correlations, cohort comparison, importance oracles
//! - [`lift`] - retention lift table and content performance
//! - [`recommend`] - recommendation scoring
//! - [`pipeline`] - end-to-end run
//! - [`synthetic`] - seeded synthetic dataset
//! - [`report`] - JSON run report
//! - [`config`] / [`error`] / [`logging`] / [`sanitize`] / [`types`]
//!
//! ## Example
//!
//! ```rust
//! use retention_engine::{synthetic, EngineConfig, RetentionPipeline, UserProfile};
//! use std::collections::BTreeSet;
//!
//! let dataset = synthetic::generate(42, 50, 12).unwrap();
//! let pipeline = RetentionPipeline::new(EngineConfig::default()).unwrap();
//! let run = pipeline.run(&dataset).unwrap();
//!
//! let profile = UserProfile::new("u_new", "better_sleep");
//! let recs = pipeline.recommend(&run, &dataset.catalog, &profile, 1, &BTreeSet::new(), 3);
//! assert!(recs.len() <= 3);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod types;
pub mod features;
pub mod labeling;
pub mod analysis;
pub mod lift;
pub mod recommend;
pub mod pipeline;
pub mod synthetic;
pub mod report;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use analysis::{
    ChurnDiagnostics, CohortComparison, CorrelationEngine, ForestImportance, ImportanceOracle,
    LogisticImportance,
};
pub use config::{
    EngineConfig, ImportanceConfig, LiftConfig, ScoreWeights, ScoringConfig, WindowConfig,
};
pub use error::{DegenerateInput, EngineError, Result};
pub use features::FeatureAggregator;
pub use labeling::ChurnLabeler;
pub use lift::{ContentPerformance, RetentionLiftCalculator, RetentionLiftTable};
pub use pipeline::{AnalysisRun, Dataset, RetentionPipeline};
pub use recommend::{RecommendationScorer, ScoreBreakdown};
pub use report::{RecommendationSet, ResultsWriter, RunReport};
