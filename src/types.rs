//! Common Types and Constants
//!
//! Shared data structures used across the pipeline and scorer modules.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};

// ==================== Constants ====================

/// Exclusive end of the observation window (days `0..7`)
pub const OBSERVATION_WINDOW_END: i32 = 7;

/// Inclusive start of the churn window
pub const CHURN_WINDOW_START: i32 = 14;

/// Exclusive end of the churn window
pub const CHURN_WINDOW_END: i32 = 21;

/// Number of simulated days an interaction may fall on
pub const HORIZON_DAYS: i32 = 21;

/// Number of engagement features per user
pub const FEATURE_COUNT: usize = 9;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

pub type UserId = String;
pub type ContentId = String;

// ==================== Interaction Types ====================

/// One user/content engagement on a given day. Multiple records per pair are allowed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub content_id: ContentId,
    /// Day offset from signup, `0..HORIZON_DAYS`
    pub day: i32,
    pub time_spent_minutes: f64,
    pub completed: bool,
}

impl Interaction {
    pub fn new(
        user_id: impl Into<String>,
        content_id: impl Into<String>,
        day: i32,
        time_spent_minutes: f64,
        completed: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            content_id: content_id.into(),
            day,
            time_spent_minutes,
            completed,
        }
    }
}

// ==================== Content Types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(EngineError::InvalidConfig(format!("unknown difficulty: {other}"))),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry, read-only input to every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: ContentId,
    pub category: String,
    pub duration_minutes: f64,
    pub difficulty: Difficulty,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ContentItem {
    pub fn new(
        content_id: impl Into<String>,
        category: impl Into<String>,
        duration_minutes: f64,
        difficulty: Difficulty,
        format: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            category: category.into(),
            duration_minutes,
            difficulty,
            format: format.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// One-line label for logs: `title (category, format, N min, difficulty)`.
    pub fn describe(&self) -> String {
        format!(
            "{} ({}, {}, {:.0} min, {})",
            self.title.as_deref().unwrap_or(&self.content_id),
            self.category,
            self.format,
            self.duration_minutes,
            self.difficulty
        )
    }
}

/// Content library keyed by content id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentCatalog {
    items: BTreeMap<ContentId, ContentItem>,
}

impl ContentCatalog {
    /// Builds a catalog, rejecting duplicate ids and non-finite or negative durations.
    pub fn new(items: Vec<ContentItem>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for item in items {
            if !item.duration_minutes.is_finite() || item.duration_minutes < 0.0 {
                return Err(EngineError::InvalidDuration {
                    content_id: item.content_id,
                    value: item.duration_minutes,
                });
            }
            if map.contains_key(&item.content_id) {
                return Err(EngineError::DuplicateContent(item.content_id));
            }
            map.insert(item.content_id.clone(), item);
        }
        Ok(Self { items: map })
    }

    pub fn get(&self, content_id: &str) -> Option<&ContentItem> {
        self.items.get(content_id)
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.items.contains_key(content_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in ascending content id order
    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.values()
    }

    pub fn category_count(&self) -> usize {
        self.items
            .values()
            .map(|item| item.category.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// ==================== User Types ====================

/// User record as supplied by the interaction store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub goal: String,
    pub age: u32,
    pub gender: String,
    pub signup_day: u32,
}

/// The part of a user the scorer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub goal: String,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            goal: goal.into(),
        }
    }
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self::new(record.user_id.clone(), record.goal.clone())
    }
}

// ==================== Feature Types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    TotalSessions,
    TotalContentViews,
    TotalTimeMinutes,
    CompletionRate,
    AvgTimePerContent,
    UniqueDaysActive,
    DaysSinceLastActivity,
    FirstSessionCompletions,
    CategoryDiversity,
}

impl FeatureName {
    pub const ALL: [FeatureName; FEATURE_COUNT] = [
        FeatureName::TotalSessions,
        FeatureName::TotalContentViews,
        FeatureName::TotalTimeMinutes,
        FeatureName::CompletionRate,
        FeatureName::AvgTimePerContent,
        FeatureName::UniqueDaysActive,
        FeatureName::DaysSinceLastActivity,
        FeatureName::FirstSessionCompletions,
        FeatureName::CategoryDiversity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::TotalSessions => "total_sessions",
            FeatureName::TotalContentViews => "total_content_views",
            FeatureName::TotalTimeMinutes => "total_time_minutes",
            FeatureName::CompletionRate => "completion_rate",
            FeatureName::AvgTimePerContent => "avg_time_per_content",
            FeatureName::UniqueDaysActive => "unique_days_active",
            FeatureName::DaysSinceLastActivity => "days_since_last_activity",
            FeatureName::FirstSessionCompletions => "first_session_completions",
            FeatureName::CategoryDiversity => "category_diversity",
        }
    }

    pub fn to_index(&self) -> usize {
        match self {
            FeatureName::TotalSessions => 0,
            FeatureName::TotalContentViews => 1,
            FeatureName::TotalTimeMinutes => 2,
            FeatureName::CompletionRate => 3,
            FeatureName::AvgTimePerContent => 4,
            FeatureName::UniqueDaysActive => 5,
            FeatureName::DaysSinceLastActivity => 6,
            FeatureName::FirstSessionCompletions => 7,
            FeatureName::CategoryDiversity => 8,
        }
    }
}

impl std::fmt::Display for FeatureName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-width engagement feature vector, indexed by [`FeatureName`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Vector for a user with no observed activity: all zeros except the recency sentinel.
    pub fn inactive(recency_sentinel: f64) -> Self {
        let mut vector = Self {
            values: [0.0; FEATURE_COUNT],
        };
        vector.set(FeatureName::DaysSinceLastActivity, recency_sentinel);
        vector
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        self.values[name.to_index()]
    }

    pub fn set(&mut self, name: FeatureName, value: f64) {
        self.values[name.to_index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.iter().map(move |name| (*name, self.get(*name)))
    }
}

// ==================== Recommendation Types ====================

/// One ranked content suggestion with the reasons it was cited for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub content_id: ContentId,
    pub score: f64,
    pub reasons: Vec<String>,
}
