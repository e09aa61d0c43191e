//! Feature Aggregator
//!
//! Reduces each user's interaction stream, restricted to the observation
//! window `[0, observation_end)`, to a fixed [`FeatureVector`].
//!
//! Per-user reductions are independent and run on the rayon pool; the
//! result map is only assembled once every user is done.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::WindowConfig;
use crate::error::{EngineError, Result};
use crate::sanitize;
use crate::types::{ContentCatalog, FeatureName, FeatureVector, Interaction, UserId, UserRecord};

/// Recency assigned to users with nothing in the window.
///
/// Real gaps fall in `1..=observation_end`, so `observation_end + 1` can never
/// be mistaken for one.
pub fn recency_sentinel(observation_end: i32) -> f64 {
    (observation_end + 1) as f64
}

pub struct FeatureAggregator<'a> {
    catalog: &'a ContentCatalog,
    windows: WindowConfig,
}

impl<'a> FeatureAggregator<'a> {
    pub fn new(catalog: &'a ContentCatalog, windows: WindowConfig) -> Result<Self> {
        windows.validate()?;
        Ok(Self { catalog, windows })
    }

    /// Features for every user appearing anywhere in the log.
    ///
    /// Users whose only activity is on or after `observation_end` get the
    /// inactive vector.
    pub fn aggregate(
        &self,
        interactions: &[Interaction],
        observation_end: i32,
    ) -> Result<BTreeMap<UserId, FeatureVector>> {
        self.check_observation_end(observation_end)?;
        sanitize::validate_interactions(interactions, self.catalog, &self.windows)?;

        let grouped = group_by_user(interactions);
        let vectors = grouped
            .par_iter()
            .map(|(user_id, records)| {
                compute_user_features(records, observation_end, self.catalog)
                    .map(|vector| (user_id.to_string(), vector))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            users = vectors.len(),
            interactions = interactions.len(),
            observation_end,
            "aggregated user features"
        );
        Ok(vectors.into_iter().collect())
    }

    /// Like [`aggregate`](Self::aggregate), but every user record gets an entry,
    /// including users with no interactions at all.
    pub fn aggregate_population(
        &self,
        users: &[UserRecord],
        interactions: &[Interaction],
        observation_end: i32,
    ) -> Result<BTreeMap<UserId, FeatureVector>> {
        let mut vectors = self.aggregate(interactions, observation_end)?;
        let sentinel = recency_sentinel(observation_end);
        for user in users {
            vectors
                .entry(user.user_id.clone())
                .or_insert_with(|| FeatureVector::inactive(sentinel));
        }
        Ok(vectors)
    }

    fn check_observation_end(&self, observation_end: i32) -> Result<()> {
        let windows = WindowConfig {
            observation_end,
            ..self.windows
        };
        windows.validate()
    }
}

pub(crate) fn group_by_user(interactions: &[Interaction]) -> BTreeMap<&str, Vec<&Interaction>> {
    let mut grouped: BTreeMap<&str, Vec<&Interaction>> = BTreeMap::new();
    for interaction in interactions {
        grouped
            .entry(interaction.user_id.as_str())
            .or_default()
            .push(interaction);
    }
    grouped
}

/// Reduces one user's records. Records at or after `observation_end` are ignored.
pub fn compute_user_features(
    records: &[&Interaction],
    observation_end: i32,
    catalog: &ContentCatalog,
) -> Result<FeatureVector> {
    let observed: Vec<&Interaction> = records
        .iter()
        .copied()
        .filter(|r| r.day < observation_end)
        .collect();

    let (first_day, last_day) = match (
        observed.iter().map(|r| r.day).min(),
        observed.iter().map(|r| r.day).max(),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(FeatureVector::inactive(recency_sentinel(observation_end))),
    };

    let views = observed.len() as f64;
    let completions = observed.iter().filter(|r| r.completed).count() as f64;
    let total_time: f64 = observed.iter().map(|r| r.time_spent_minutes).sum();
    let active_days = observed.iter().map(|r| r.day).collect::<BTreeSet<_>>().len() as f64;
    let first_session_completions = observed
        .iter()
        .filter(|r| r.day == first_day && r.completed)
        .count() as f64;

    let mut categories = BTreeSet::new();
    for record in &observed {
        let item = catalog
            .get(&record.content_id)
            .ok_or_else(|| EngineError::UnknownContent(record.content_id.clone()))?;
        categories.insert(item.category.as_str());
    }

    let mut vector = FeatureVector::inactive(0.0);
    vector.set(FeatureName::TotalSessions, active_days);
    vector.set(FeatureName::TotalContentViews, views);
    vector.set(FeatureName::TotalTimeMinutes, total_time);
    vector.set(FeatureName::CompletionRate, completions / views);
    vector.set(FeatureName::AvgTimePerContent, total_time / views);
    vector.set(FeatureName::UniqueDaysActive, active_days);
    vector.set(
        FeatureName::DaysSinceLastActivity,
        (observation_end - last_day) as f64,
    );
    vector.set(FeatureName::FirstSessionCompletions, first_session_completions);
    vector.set(FeatureName::CategoryDiversity, categories.len() as f64);
    Ok(vector)
}
