//! Content Retention-Lift Calculator
//!
//! `lift[c]` is the share of retained users among the users whose first
//! recorded session (their minimum active day) included content `c`.
//! Items nobody met in a first session get the population retention rate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{LiftConfig, WindowConfig};
use crate::error::{DegenerateInput, EngineError, Result};
use crate::features::group_by_user;
use crate::labeling::retention_rate;
use crate::sanitize;
use crate::types::{ContentCatalog, ContentId, Interaction, UserId};

/// Population rate used when there are no labelled users at all
pub const NEUTRAL_RETENTION: f64 = 0.5;

/// Retention lift per content item, with an explicit fallback for unseen items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionLiftTable {
    values: BTreeMap<ContentId, f64>,
    first_session_users: BTreeMap<ContentId, usize>,
    fallback: f64,
    pub warnings: Vec<DegenerateInput>,
}

impl RetentionLiftTable {
    /// Table where every item gets `fallback`.
    pub fn uniform(fallback: f64) -> Self {
        Self {
            values: BTreeMap::new(),
            first_session_users: BTreeMap::new(),
            fallback: fallback.clamp(0.0, 1.0),
            warnings: Vec::new(),
        }
    }

    pub fn from_values(values: BTreeMap<ContentId, f64>, fallback: f64) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k, v.clamp(0.0, 1.0)))
                .collect(),
            first_session_users: BTreeMap::new(),
            fallback: fallback.clamp(0.0, 1.0),
            warnings: Vec::new(),
        }
    }

    /// Lift for `content_id`; unknown ids get the fallback.
    pub fn get(&self, content_id: &str) -> f64 {
        self.values.get(content_id).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    /// Number of users who met `content_id` in their first session.
    pub fn exposures(&self, content_id: &str) -> usize {
        self.first_session_users.get(content_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// First-session performance of one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPerformance {
    pub content_id: ContentId,
    pub view_count: usize,
    pub completion_rate: f64,
    pub retention_rate: f64,
    pub avg_time_spent: f64,
    pub category: String,
    pub format: String,
    pub duration_minutes: f64,
}

pub struct RetentionLiftCalculator<'a> {
    catalog: &'a ContentCatalog,
    windows: WindowConfig,
    config: LiftConfig,
}

impl<'a> RetentionLiftCalculator<'a> {
    pub fn new(catalog: &'a ContentCatalog, windows: WindowConfig, config: LiftConfig) -> Self {
        Self {
            catalog,
            windows,
            config,
        }
    }

    /// Builds the lift table covering every catalog item.
    pub fn lift(
        &self,
        interactions: &[Interaction],
        labels: &BTreeMap<UserId, bool>,
    ) -> Result<RetentionLiftTable> {
        sanitize::validate_interactions(interactions, self.catalog, &self.windows)?;

        let mut warnings = Vec::new();
        let fallback = match retention_rate(labels) {
            Some(rate) => rate,
            None => {
                warnings.push(DegenerateInput::EmptyPopulation);
                tracing::warn!("no labelled users; retention lift falls back to neutral prior");
                NEUTRAL_RETENTION
            }
        };

        // content -> (users exposed in first session, of which retained)
        let mut exposure: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for (user_id, records) in first_sessions(interactions) {
            let churned = *labels
                .get(user_id)
                .ok_or_else(|| EngineError::MissingLabel(user_id.to_string()))?;
            let contents: BTreeSet<&str> = records.iter().map(|r| r.content_id.as_str()).collect();
            for content_id in contents {
                let entry = exposure.entry(content_id).or_insert((0, 0));
                entry.0 += 1;
                if !churned {
                    entry.1 += 1;
                }
            }
        }

        let mut values = BTreeMap::new();
        let mut first_session_users = BTreeMap::new();
        for item in self.catalog.iter() {
            let (exposed, retained) = exposure
                .get(item.content_id.as_str())
                .copied()
                .unwrap_or((0, 0));
            let value = if exposed > 0 && exposed >= self.config.min_first_session_users {
                retained as f64 / exposed as f64
            } else {
                fallback
            };
            values.insert(item.content_id.clone(), value.clamp(0.0, 1.0));
            first_session_users.insert(item.content_id.clone(), exposed);
        }

        tracing::debug!(
            items = values.len(),
            observed = exposure.len(),
            fallback,
            "computed retention lift"
        );

        Ok(RetentionLiftTable {
            values,
            first_session_users,
            fallback,
            warnings,
        })
    }

    /// First-session engagement and retention per item, for items with at
    /// least `report_min_views` first-session views. Best retention first.
    pub fn content_performance(
        &self,
        interactions: &[Interaction],
        labels: &BTreeMap<UserId, bool>,
    ) -> Result<Vec<ContentPerformance>> {
        sanitize::validate_interactions(interactions, self.catalog, &self.windows)?;

        #[derive(Default)]
        struct Acc {
            views: usize,
            completed: usize,
            retained: usize,
            time: f64,
        }

        let mut stats: BTreeMap<&str, Acc> = BTreeMap::new();
        for (user_id, records) in first_sessions(interactions) {
            let churned = *labels
                .get(user_id)
                .ok_or_else(|| EngineError::MissingLabel(user_id.to_string()))?;
            for record in records {
                let acc = stats.entry(record.content_id.as_str()).or_default();
                acc.views += 1;
                acc.time += record.time_spent_minutes;
                if record.completed {
                    acc.completed += 1;
                }
                if !churned {
                    acc.retained += 1;
                }
            }
        }

        let mut report: Vec<ContentPerformance> = stats
            .into_iter()
            .filter(|(_, acc)| acc.views >= self.config.report_min_views.max(1))
            .filter_map(|(content_id, acc)| {
                let item = self.catalog.get(content_id)?;
                let views = acc.views as f64;
                Some(ContentPerformance {
                    content_id: content_id.to_string(),
                    view_count: acc.views,
                    completion_rate: acc.completed as f64 / views,
                    retention_rate: acc.retained as f64 / views,
                    avg_time_spent: acc.time / views,
                    category: item.category.clone(),
                    format: item.format.clone(),
                    duration_minutes: item.duration_minutes,
                })
            })
            .collect();

        report.sort_by(|a, b| {
            b.retention_rate
                .total_cmp(&a.retention_rate)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        Ok(report)
    }
}

/// Records on each user's minimum active day.
fn first_sessions(interactions: &[Interaction]) -> Vec<(&str, Vec<&Interaction>)> {
    group_by_user(interactions)
        .into_iter()
        .filter_map(|(user_id, records)| {
            let first_day = records.iter().map(|r| r.day).min()?;
            let first: Vec<&Interaction> = records.into_iter().filter(|r| r.day == first_day).collect();
            Some((user_id, first))
        })
        .collect()
}
