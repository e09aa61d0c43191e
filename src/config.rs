use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::types::{
    Difficulty, CHURN_WINDOW_END, CHURN_WINDOW_START, HORIZON_DAYS, OBSERVATION_WINDOW_END,
};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Features use days strictly below this bound
    pub observation_end: i32,
    /// Churn window, `[churn_start, churn_end)`
    pub churn_start: i32,
    pub churn_end: i32,
    /// Valid interaction days are `0..horizon_days`
    pub horizon_days: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            observation_end: OBSERVATION_WINDOW_END,
            churn_start: CHURN_WINDOW_START,
            churn_end: CHURN_WINDOW_END,
            horizon_days: HORIZON_DAYS,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.observation_end <= 0 {
            return Err(EngineError::InvalidWindow(format!(
                "observation end {} must be positive",
                self.observation_end
            )));
        }
        if self.observation_end > self.churn_start {
            return Err(EngineError::InvalidWindow(format!(
                "observation window [0, {}) overlaps churn window starting at {}",
                self.observation_end, self.churn_start
            )));
        }
        if self.churn_start >= self.churn_end {
            return Err(EngineError::InvalidWindow(format!(
                "churn window [{}, {}) is empty or inverted",
                self.churn_start, self.churn_end
            )));
        }
        if self.churn_end > self.horizon_days {
            return Err(EngineError::InvalidWindow(format!(
                "churn window end {} exceeds horizon {}",
                self.churn_end, self.horizon_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftConfig {
    /// Items with fewer first-session users than this get the population rate
    pub min_first_session_users: usize,
    /// Minimum first-session views for an item to appear in the performance report
    pub report_min_views: usize,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            min_first_session_users: 1,
            report_min_views: 5,
        }
    }
}

/// Weights of the four score terms. Always sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub goal_alignment: f64,
    pub retention_lift: f64,
    pub completion_friendly: f64,
    pub freshness: f64,
}

impl ScoreWeights {
    pub fn new(
        goal_alignment: f64,
        retention_lift: f64,
        completion_friendly: f64,
        freshness: f64,
    ) -> Result<Self> {
        let weights = Self {
            goal_alignment,
            retention_lift,
            completion_friendly,
            freshness,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn first_session() -> Self {
        Self {
            goal_alignment: 0.40,
            retention_lift: 0.25,
            completion_friendly: 0.25,
            freshness: 0.10,
        }
    }

    pub fn later_sessions() -> Self {
        Self {
            goal_alignment: 0.30,
            retention_lift: 0.30,
            completion_friendly: 0.15,
            freshness: 0.25,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.goal_alignment,
            self.retention_lift,
            self.completion_friendly,
            self.freshness,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(EngineError::InvalidWeights(format!(
                "weights must be finite and non-negative: {:?}",
                self
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvalidWeights(format!(
                "weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

/// Duration preference: 1.0 inside `[band_min, band_max]`, linear falloff outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationCurve {
    pub band_min: f64,
    pub band_max: f64,
    /// Minutes outside the band over which the score drops from 1 to 0
    pub falloff: f64,
}

impl Default for DurationCurve {
    fn default() -> Self {
        Self {
            band_min: 5.0,
            band_max: 15.0,
            falloff: 30.0,
        }
    }
}

impl DurationCurve {
    pub fn score(&self, duration_minutes: f64) -> f64 {
        let distance = if duration_minutes < self.band_min {
            self.band_min - duration_minutes
        } else if duration_minutes > self.band_max {
            duration_minutes - self.band_max
        } else {
            0.0
        };
        (1.0 - distance / self.falloff).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyScores {
    pub beginner: f64,
    pub intermediate: f64,
    pub advanced: f64,
}

impl Default for DifficultyScores {
    fn default() -> Self {
        Self {
            beginner: 1.0,
            intermediate: 0.6,
            advanced: 0.3,
        }
    }
}

impl DifficultyScores {
    pub fn score(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Beginner => self.beginner,
            Difficulty::Intermediate => self.intermediate,
            Difficulty::Advanced => self.advanced,
        }
    }
}

/// Goal to preferred-category mapping. Goals without an entry align with nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalCategoryMap(pub BTreeMap<String, Vec<String>>);

impl Default for GoalCategoryMap {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("weight_loss".to_string(), vec!["fitness".to_string(), "nutrition".to_string()]);
        map.insert("stress_reduction".to_string(), vec!["meditation".to_string(), "sleep".to_string()]);
        map.insert("better_sleep".to_string(), vec!["sleep".to_string(), "meditation".to_string()]);
        map.insert("build_strength".to_string(), vec!["strength".to_string(), "fitness".to_string()]);
        Self(map)
    }
}

impl GoalCategoryMap {
    pub fn aligns(&self, goal: &str, category: &str) -> bool {
        self.0
            .get(goal)
            .map(|categories| categories.iter().any(|c| c == category))
            .unwrap_or(false)
    }

    pub fn categories(&self, goal: &str) -> &[String] {
        self.0.get(goal).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub first_session: ScoreWeights,
    pub later_sessions: ScoreWeights,
    pub duration: DurationCurve,
    pub difficulty: DifficultyScores,
    /// Share of the duration sub-score in the completion-friendly term
    pub duration_share: f64,
    /// A term is cited as a reason when its value exceeds this fraction of its maximum
    pub materiality: f64,
    pub goal_categories: GoalCategoryMap,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            first_session: ScoreWeights::first_session(),
            later_sessions: ScoreWeights::later_sessions(),
            duration: DurationCurve::default(),
            difficulty: DifficultyScores::default(),
            duration_share: 0.5,
            materiality: 0.7,
            goal_categories: GoalCategoryMap::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        self.first_session.validate()?;
        self.later_sessions.validate()?;
        if !(0.0..=1.0).contains(&self.duration_share) {
            return Err(EngineError::InvalidConfig(format!(
                "duration share {} outside [0, 1]",
                self.duration_share
            )));
        }
        if !(0.0..=1.0).contains(&self.materiality) {
            return Err(EngineError::InvalidConfig(format!(
                "materiality {} outside [0, 1]",
                self.materiality
            )));
        }
        let d = &self.duration;
        let finite = d.band_min.is_finite() && d.band_max.is_finite() && d.falloff.is_finite();
        if !finite || d.band_min < 0.0 || d.band_min > d.band_max || d.falloff <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "invalid duration curve {:?}",
                d
            )));
        }
        let s = &self.difficulty;
        if [s.beginner, s.intermediate, s.advanced]
            .iter()
            .any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(EngineError::InvalidConfig(format!(
                "difficulty scores must be in [0, 1]: {:?}",
                s
            )));
        }
        Ok(())
    }

    /// Two-bucket policy: first session vs every later one.
    pub fn weights_for_session(&self, session_number: u32) -> ScoreWeights {
        if session_number <= 1 {
            self.first_session
        } else {
            self.later_sessions
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceConfig {
    pub seed: u64,
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub max_iterations: u32,
    pub convergence_threshold: f64,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            learning_rate: 0.1,
            regularization: 0.01,
            max_iterations: 1000,
            convergence_threshold: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub windows: WindowConfig,
    pub lift: LiftConfig,
    pub scoring: ScoringConfig,
    pub importance: ImportanceConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<i32>("RETENTION_OBSERVATION_END") {
            config.windows.observation_end = val;
        }
        if let Some(val) = env_parse::<i32>("RETENTION_CHURN_START") {
            config.windows.churn_start = val;
        }
        if let Some(val) = env_parse::<i32>("RETENTION_CHURN_END") {
            config.windows.churn_end = val;
        }
        if let Some(val) = env_parse::<u64>("RETENTION_IMPORTANCE_SEED") {
            config.importance.seed = val;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.windows.validate()?;
        self.scoring.validate()?;
        if self.importance.trees == 0 {
            return Err(EngineError::InvalidConfig(
                "importance forest needs at least one tree".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}
