//! Input Validation
//!
//! Fail-fast checks applied before any aggregation.
//!
//! Functions:
//! - Interaction record validation (day range, time spent)
//! - Catalog reference validation
//! - Numeric helpers shared by the statistics code

use crate::config::WindowConfig;
use crate::error::{EngineError, Result};
use crate::types::{ContentCatalog, Interaction};

/// True if any value is NaN or infinite
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// Validates one record's day and time spent.
pub fn validate_record(interaction: &Interaction, horizon_days: i32) -> Result<()> {
    if interaction.day < 0 {
        return Err(EngineError::NegativeDay {
            user_id: interaction.user_id.clone(),
            day: interaction.day,
        });
    }
    if interaction.day >= horizon_days {
        return Err(EngineError::DayOutOfHorizon {
            user_id: interaction.user_id.clone(),
            day: interaction.day,
            horizon: horizon_days,
        });
    }
    if !interaction.time_spent_minutes.is_finite() || interaction.time_spent_minutes < 0.0 {
        return Err(EngineError::InvalidTimeSpent {
            user_id: interaction.user_id.clone(),
            value: interaction.time_spent_minutes,
        });
    }
    Ok(())
}

/// Validates every record, including its catalog reference.
///
/// The whole log is checked, not just the window a caller is about to use:
/// a malformed record anywhere aborts the run instead of being dropped.
pub fn validate_interactions(
    interactions: &[Interaction],
    catalog: &ContentCatalog,
    windows: &WindowConfig,
) -> Result<()> {
    for interaction in interactions {
        validate_record(interaction, windows.horizon_days)?;
        if !catalog.contains(&interaction.content_id) {
            return Err(EngineError::UnknownContent(interaction.content_id.clone()));
        }
    }
    Ok(())
}

/// Same as [`validate_interactions`] without the catalog lookup.
pub fn validate_records(interactions: &[Interaction], windows: &WindowConfig) -> Result<()> {
    interactions
        .iter()
        .try_for_each(|interaction| validate_record(interaction, windows.horizon_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentItem, Difficulty};

    fn catalog() -> ContentCatalog {
        ContentCatalog::new(vec![ContentItem::new(
            "c_000",
            "fitness",
            10.0,
            Difficulty::Beginner,
            "video",
        )])
        .unwrap()
    }

    #[test]
    fn test_has_invalid_values() {
        assert!(!has_invalid_values(&[1.0, 2.0]));
        assert!(has_invalid_values(&[1.0, f64::NAN]));
        assert!(has_invalid_values(&[f64::INFINITY]));
    }

    #[test]
    fn test_negative_day_rejected() {
        let records = vec![Interaction::new("u_1", "c_000", -1, 5.0, true)];
        let err = validate_interactions(&records, &catalog(), &WindowConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::NegativeDay { day: -1, .. }));
    }

    #[test]
    fn test_day_beyond_horizon_rejected() {
        let records = vec![Interaction::new("u_1", "c_000", 21, 5.0, true)];
        let err = validate_records(&records, &WindowConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::DayOutOfHorizon { day: 21, horizon: 21, .. }));
    }

    #[test]
    fn test_unknown_content_rejected() {
        let records = vec![Interaction::new("u_1", "c_999", 3, 5.0, false)];
        let err = validate_interactions(&records, &catalog(), &WindowConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownContent(id) if id == "c_999"));
    }

    #[test]
    fn test_invalid_time_rejected() {
        let records = vec![Interaction::new("u_1", "c_000", 3, f64::NAN, false)];
        assert!(validate_records(&records, &WindowConfig::default()).is_err());
        let records = vec![Interaction::new("u_1", "c_000", 3, -2.0, false)];
        assert!(validate_records(&records, &WindowConfig::default()).is_err());
    }

    #[test]
    fn test_valid_records_pass() {
        let records = vec![
            Interaction::new("u_1", "c_000", 0, 5.0, true),
            Interaction::new("u_1", "c_000", 20, 0.0, false),
        ];
        assert!(validate_interactions(&records, &catalog(), &WindowConfig::default()).is_ok());
    }
}
