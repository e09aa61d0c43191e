//! Batch analysis run
//!
//! Per-user features are computed in parallel. Correlation, importance and
//! lift only start once every user's vector is in, then run side by side
//! since they read disjoint inputs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::analysis::{ChurnDiagnostics, CorrelationEngine, ForestImportance, ImportanceOracle};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::features::FeatureAggregator;
use crate::labeling::{retention_rate, ChurnLabeler};
use crate::lift::{ContentPerformance, RetentionLiftCalculator, RetentionLiftTable};
use crate::recommend::RecommendationScorer;
use crate::types::{
    ContentCatalog, ContentId, FeatureVector, Interaction, Recommendation, UserId, UserProfile,
    UserRecord,
};

/// Users, catalog and interaction log for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub users: Vec<UserRecord>,
    pub catalog: ContentCatalog,
    pub interactions: Vec<Interaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub users: usize,
    pub content_items: usize,
    pub categories: usize,
    pub interactions: usize,
    pub active_users: usize,
}

impl Dataset {
    pub fn new(
        users: Vec<UserRecord>,
        catalog: ContentCatalog,
        interactions: Vec<Interaction>,
    ) -> Self {
        Self {
            users,
            catalog,
            interactions,
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        let active: BTreeSet<&str> = self
            .interactions
            .iter()
            .map(|i| i.user_id.as_str())
            .collect();
        DatasetSummary {
            users: self.users.len(),
            content_items: self.catalog.len(),
            categories: self.catalog.category_count(),
            interactions: self.interactions.len(),
            active_users: active.len(),
        }
    }

    pub fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(UserProfile::from)
    }

    /// Content the user touched on any day before `before_day`.
    pub fn seen_content(&self, user_id: &str, before_day: i32) -> BTreeSet<ContentId> {
        self.interactions
            .iter()
            .filter(|i| i.user_id == user_id && i.day < before_day)
            .map(|i| i.content_id.clone())
            .collect()
    }
}

/// Everything one run derives; read-only once built
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub features: BTreeMap<UserId, FeatureVector>,
    pub labels: BTreeMap<UserId, bool>,
    pub diagnostics: ChurnDiagnostics,
    pub lift: RetentionLiftTable,
    pub content_performance: Vec<ContentPerformance>,
    pub elapsed_ms: u64,
}

impl AnalysisRun {
    pub fn retention_rate(&self) -> Option<f64> {
        retention_rate(&self.labels)
    }
}

pub struct RetentionPipeline {
    config: EngineConfig,
    oracle: Box<dyn ImportanceOracle>,
    scorer: RecommendationScorer,
}

impl RetentionPipeline {
    /// Pipeline with the seeded forest oracle.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let oracle = Box::new(ForestImportance::new(&config.importance));
        Self::with_oracle(config, oracle)
    }

    pub fn with_oracle(config: EngineConfig, oracle: Box<dyn ImportanceOracle>) -> Result<Self> {
        config.validate()?;
        let scorer = RecommendationScorer::new(config.scoring.clone())?;
        Ok(Self {
            config,
            oracle,
            scorer,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scorer(&self) -> &RecommendationScorer {
        &self.scorer
    }

    pub fn run(&self, dataset: &Dataset) -> Result<AnalysisRun> {
        let started = Instant::now();
        let windows = self.config.windows;

        let aggregator = FeatureAggregator::new(&dataset.catalog, windows)?;
        let features = aggregator.aggregate_population(
            &dataset.users,
            &dataset.interactions,
            windows.observation_end,
        )?;
        let labels = ChurnLabeler::new(windows)?
            .label_population(&dataset.users, &dataset.interactions)?;

        let engine = CorrelationEngine::new(self.oracle.as_ref());
        let calculator =
            RetentionLiftCalculator::new(&dataset.catalog, windows, self.config.lift.clone());

        let (diagnostics, lift_outputs) = rayon::join(
            || engine.analyze(&features, &labels),
            || -> Result<_> {
                let lift = calculator.lift(&dataset.interactions, &labels)?;
                let performance = calculator.content_performance(&dataset.interactions, &labels)?;
                Ok((lift, performance))
            },
        );
        let diagnostics = diagnostics?;
        let (lift, content_performance) = lift_outputs?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            users = features.len(),
            interactions = dataset.interactions.len(),
            content_items = dataset.catalog.len(),
            churned = diagnostics.churned_count,
            elapsed_ms,
            "analysis run complete"
        );

        Ok(AnalysisRun {
            features,
            labels,
            diagnostics,
            lift,
            content_performance,
            elapsed_ms,
        })
    }

    pub fn recommend(
        &self,
        run: &AnalysisRun,
        catalog: &ContentCatalog,
        profile: &UserProfile,
        session_number: u32,
        seen_content: &BTreeSet<ContentId>,
        top_k: usize,
    ) -> Vec<Recommendation> {
        self.scorer
            .recommend(profile, catalog, &run.lift, session_number, seen_content, top_k)
    }
}
