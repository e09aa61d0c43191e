use serde::{Deserialize, Serialize};

use crate::types::FeatureName;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Terminal failures. Any of these aborts the run that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("interaction for user {user_id} has negative day {day}")]
    NegativeDay { user_id: String, day: i32 },
    #[error("interaction for user {user_id} has day {day} outside horizon 0..{horizon}")]
    DayOutOfHorizon { user_id: String, day: i32, horizon: i32 },
    #[error("interaction for user {user_id} has invalid time spent {value}")]
    InvalidTimeSpent { user_id: String, value: f64 },
    #[error("unknown content reference: {0}")]
    UnknownContent(String),
    #[error("duplicate content id in catalog: {0}")]
    DuplicateContent(String),
    #[error("content {content_id} has invalid duration {value}")]
    InvalidDuration { content_id: String, value: f64 },
    #[error("no churn label for user {0}")]
    MissingLabel(String),
    #[error("invalid window configuration: {0}")]
    InvalidWindow(String),
    #[error("invalid score weights: {0}")]
    InvalidWeights(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("importance oracle contract violated: {0}")]
    Oracle(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for malformed or out-of-range input records.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::NegativeDay { .. }
                | EngineError::DayOutOfHorizon { .. }
                | EngineError::InvalidTimeSpent { .. }
                | EngineError::UnknownContent(_)
                | EngineError::DuplicateContent(_)
                | EngineError::InvalidDuration { .. }
                | EngineError::MissingLabel(_)
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidWindow(_)
                | EngineError::InvalidWeights(_)
                | EngineError::InvalidConfig(_)
        )
    }
}

/// Statistically meaningless results. Reported next to normal output, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegenerateInput {
    /// Feature is constant across the cohort; its correlation is undefined
    ZeroVariance { feature: FeatureName },
    /// Every user shares the same label; no correlation is defined
    ConstantLabel,
    /// One cohort has no users; cohort comparison is unavailable
    EmptyCohort { churned: bool },
    /// Churned mean is zero; percentage difference is undefined
    ZeroBaseline { feature: FeatureName },
    /// No labelled users; population retention falls back to a neutral prior
    EmptyPopulation,
    /// Oracle returned all-zero importances
    DegenerateImportance,
}

impl std::fmt::Display for DegenerateInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateInput::ZeroVariance { feature } => {
                write!(f, "feature {feature} has zero variance; correlation undefined")
            }
            DegenerateInput::ConstantLabel => {
                write!(f, "all users share one label; correlations undefined")
            }
            DegenerateInput::EmptyCohort { churned } => {
                let cohort = if *churned { "churned" } else { "retained" };
                write!(f, "{cohort} cohort is empty; cohort comparison unavailable")
            }
            DegenerateInput::ZeroBaseline { feature } => {
                write!(f, "churned mean of {feature} is zero; percentage difference undefined")
            }
            DegenerateInput::EmptyPopulation => {
                write!(f, "no labelled users; population retention uses neutral prior")
            }
            DegenerateInput::DegenerateImportance => {
                write!(f, "importance oracle returned all-zero weights")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = EngineError::NegativeDay {
            user_id: "u_1".to_string(),
            day: -1,
        };
        assert!(err.is_validation());
        assert!(!err.is_config());

        let err = EngineError::InvalidWindow("inverted".to_string());
        assert!(err.is_config());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_degenerate_input_serializes_tagged() {
        let warning = DegenerateInput::ZeroVariance {
            feature: FeatureName::CompletionRate,
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "zero_variance");
        assert_eq!(json["feature"], "completion_rate");
    }
}
