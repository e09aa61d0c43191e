//! Churn Labeler
//!
//! A user is churned iff they have no interaction with a day in
//! `[churn_start, churn_end)`.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::WindowConfig;
use crate::error::Result;
use crate::sanitize;
use crate::types::{Interaction, UserId, UserRecord};

pub struct ChurnLabeler {
    windows: WindowConfig,
}

impl ChurnLabeler {
    /// Fails if the observation window reaches into the churn window.
    pub fn new(windows: WindowConfig) -> Result<Self> {
        windows.validate()?;
        Ok(Self { windows })
    }

    /// Labels every user appearing anywhere in the log.
    pub fn label(
        &self,
        interactions: &[Interaction],
        churn_start: i32,
        churn_end: i32,
    ) -> Result<BTreeMap<UserId, bool>> {
        let windows = WindowConfig {
            churn_start,
            churn_end,
            ..self.windows
        };
        windows.validate()?;
        sanitize::validate_records(interactions, &windows)?;

        let active: BTreeSet<&str> = interactions
            .iter()
            .filter(|i| i.day >= churn_start && i.day < churn_end)
            .map(|i| i.user_id.as_str())
            .collect();

        let labels: BTreeMap<UserId, bool> = interactions
            .iter()
            .map(|i| (i.user_id.clone(), !active.contains(i.user_id.as_str())))
            .collect();

        tracing::debug!(
            users = labels.len(),
            retained = active.len(),
            churn_start,
            churn_end,
            "labelled churn"
        );
        Ok(labels)
    }

    /// Labels every user record. Users absent from the log are churned.
    pub fn label_population(
        &self,
        users: &[UserRecord],
        interactions: &[Interaction],
    ) -> Result<BTreeMap<UserId, bool>> {
        let mut labels = self.label(interactions, self.windows.churn_start, self.windows.churn_end)?;
        for user in users {
            labels.entry(user.user_id.clone()).or_insert(true);
        }
        Ok(labels)
    }

    pub fn windows(&self) -> &WindowConfig {
        &self.windows
    }
}

/// Fraction of labelled users that were retained, `None` when nobody is labelled.
pub fn retention_rate(labels: &BTreeMap<UserId, bool>) -> Option<f64> {
    if labels.is_empty() {
        return None;
    }
    let retained = labels.values().filter(|churned| !**churned).count();
    Some(retained as f64 / labels.len() as f64)
}
