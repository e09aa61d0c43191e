//! Recommendation Scorer
//!
//! ```text
//! score(c) = w1·GoalAlignment(c) + w2·RetentionLift(c) + w3·CompletionFriendly(c) + w4·Freshness(c)
//! ```
//!
//! Weights come from a two-bucket policy (first session / later sessions).
//! Cold start needs no separate path: an empty seen-set makes freshness 1
//! everywhere and the remaining terms drive the ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{ScoreWeights, ScoringConfig};
use crate::error::Result;
use crate::lift::RetentionLiftTable;
use crate::types::{ContentCatalog, ContentId, ContentItem, Recommendation, UserProfile};

/// Unweighted term values, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub goal_alignment: f64,
    pub retention_lift: f64,
    pub completion_friendly: f64,
    pub freshness: f64,
}

impl ScoreBreakdown {
    pub fn weighted_total(&self, weights: &ScoreWeights) -> f64 {
        weights.goal_alignment * self.goal_alignment
            + weights.retention_lift * self.retention_lift
            + weights.completion_friendly * self.completion_friendly
            + weights.freshness * self.freshness
    }
}

pub struct RecommendationScorer {
    config: ScoringConfig,
}

impl RecommendationScorer {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn weights_for_session(&self, session_number: u32) -> ScoreWeights {
        self.config.weights_for_session(session_number)
    }

    pub fn completion_friendly(&self, item: &ContentItem) -> f64 {
        let duration = self.config.duration.score(item.duration_minutes);
        let difficulty = self.config.difficulty.score(item.difficulty);
        let share = self.config.duration_share;
        (share * duration + (1.0 - share) * difficulty).clamp(0.0, 1.0)
    }

    pub fn breakdown(
        &self,
        item: &ContentItem,
        profile: &UserProfile,
        retention_lift: &RetentionLiftTable,
        seen_content: &BTreeSet<ContentId>,
    ) -> ScoreBreakdown {
        let aligned = self
            .config
            .goal_categories
            .aligns(&profile.goal, &item.category);
        ScoreBreakdown {
            goal_alignment: if aligned { 1.0 } else { 0.0 },
            retention_lift: retention_lift.get(&item.content_id).clamp(0.0, 1.0),
            completion_friendly: self.completion_friendly(item),
            freshness: if seen_content.contains(&item.content_id) {
                0.0
            } else {
                1.0
            },
        }
    }

    /// Reasons for every term whose weighted contribution exceeds the
    /// materiality fraction of its maximum, in fixed priority order.
    pub fn reasons(
        &self,
        breakdown: &ScoreBreakdown,
        weights: &ScoreWeights,
        profile: &UserProfile,
    ) -> Vec<String> {
        let material = |weight: f64, value: f64| weight > 0.0 && weight * value > self.config.materiality * weight;

        let mut reasons = Vec::new();
        if material(weights.goal_alignment, breakdown.goal_alignment) {
            reasons.push(format!("Matches your {} goal", profile.goal));
        }
        if material(weights.retention_lift, breakdown.retention_lift) {
            reasons.push("High retention content".to_string());
        }
        if material(weights.completion_friendly, breakdown.completion_friendly) {
            reasons.push("Easy to complete".to_string());
        }
        if material(weights.freshness, breakdown.freshness) {
            reasons.push("New for you".to_string());
        }
        reasons
    }

    /// Ranks the whole catalog for one user and returns the best `top_k`.
    ///
    /// Ordering is score descending, then content id ascending. Ids in
    /// `seen_content` that are not in the catalog have no effect.
    pub fn recommend(
        &self,
        profile: &UserProfile,
        catalog: &ContentCatalog,
        retention_lift: &RetentionLiftTable,
        session_number: u32,
        seen_content: &BTreeSet<ContentId>,
        top_k: usize,
    ) -> Vec<Recommendation> {
        let weights = self.weights_for_session(session_number);

        let mut ranked: Vec<Recommendation> = catalog
            .iter()
            .map(|item| {
                let breakdown = self.breakdown(item, profile, retention_lift, seen_content);
                Recommendation {
                    content_id: item.content_id.clone(),
                    score: breakdown.weighted_total(&weights),
                    reasons: self.reasons(&breakdown, &weights, profile),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        ranked.truncate(top_k);

        tracing::debug!(
            user_id = %profile.user_id,
            goal = %profile.goal,
            session_number,
            seen = seen_content.len(),
            returned = ranked.len(),
            "ranked recommendations"
        );
        ranked
    }
}

impl Default for RecommendationScorer {
    fn default() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;
    use std::collections::BTreeMap;

    fn lift(pairs: &[(&str, f64)], fallback: f64) -> RetentionLiftTable {
        let values: BTreeMap<ContentId, f64> =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        RetentionLiftTable::from_values(values, fallback)
    }

    fn seen(ids: &[&str]) -> BTreeSet<ContentId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_beginner_short_beats_advanced_long() {
        let catalog = ContentCatalog::new(vec![
            ContentItem::new("c_easy", "fitness", 11.0, Difficulty::Beginner, "video"),
            ContentItem::new("c_hard", "fitness", 40.0, Difficulty::Advanced, "video"),
        ])
        .unwrap();
        let lift = lift(&[("c_easy", 0.8), ("c_hard", 0.8)], 0.5);
        let scorer = RecommendationScorer::default();
        let profile = UserProfile::new("u_new", "weight_loss");

        let recs = scorer.recommend(&profile, &catalog, &lift, 1, &BTreeSet::new(), 5);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].content_id, "c_easy");
        // 0.40·1 + 0.25·0.8 + 0.25·1 + 0.10·1
        assert!((recs[0].score - 0.95).abs() < 1e-12);
        assert!(recs[1].score < recs[0].score);
        assert_eq!(
            recs[0].reasons,
            vec![
                "Matches your weight_loss goal".to_string(),
                "High retention content".to_string(),
                "Easy to complete".to_string(),
                "New for you".to_string(),
            ]
        );
        assert!(!recs[1].reasons.contains(&"Easy to complete".to_string()));
    }

    #[test]
    fn test_empty_catalog_yields_empty_list() {
        let catalog = ContentCatalog::default();
        let recs = RecommendationScorer::default().recommend(
            &UserProfile::new("u", "weight_loss"),
            &catalog,
            &RetentionLiftTable::uniform(0.5),
            1,
            &BTreeSet::new(),
            3,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn test_unknown_goal_degrades_to_other_terms() {
        let catalog = ContentCatalog::new(vec![
            ContentItem::new("c_1", "fitness", 10.0, Difficulty::Beginner, "video"),
            ContentItem::new("c_2", "sleep", 10.0, Difficulty::Beginner, "audio"),
        ])
        .unwrap();
        let lift = lift(&[("c_1", 0.2), ("c_2", 0.9)], 0.5);
        let profile = UserProfile::new("u", "become_astronaut");
        let recs = RecommendationScorer::default().recommend(&profile, &catalog, &lift, 1, &BTreeSet::new(), 2);
        assert_eq!(recs[0].content_id, "c_2");
        assert!(recs.iter().all(|r| !r.reasons.iter().any(|s| s.starts_with("Matches"))));
    }

    #[test]
    fn test_seen_content_loses_freshness() {
        let catalog = ContentCatalog::new(vec![
            ContentItem::new("c_1", "fitness", 10.0, Difficulty::Beginner, "video"),
            ContentItem::new("c_2", "fitness", 10.0, Difficulty::Beginner, "video"),
        ])
        .unwrap();
        let lift = RetentionLiftTable::uniform(0.5);
        let scorer = RecommendationScorer::default();
        let profile = UserProfile::new("u", "weight_loss");
        let seen = seen(&["c_1", "c_unknown"]);

        let recs = scorer.recommend(&profile, &catalog, &lift, 2, &seen, 2);
        assert_eq!(recs[0].content_id, "c_2");
        let gap = recs[0].score - recs[1].score;
        assert!((gap - ScoreWeights::later_sessions().freshness).abs() < 1e-12);
        assert!(!recs[1].reasons.contains(&"New for you".to_string()));

        let item = catalog.get("c_1").unwrap();
        let breakdown = scorer.breakdown(item, &profile, &lift, &seen);
        assert_eq!(breakdown.freshness, 0.0);
    }

    #[test]
    fn test_ties_broken_by_content_id() {
        let catalog = ContentCatalog::new(vec![
            ContentItem::new("c_b", "sleep", 10.0, Difficulty::Beginner, "audio"),
            ContentItem::new("c_a", "sleep", 10.0, Difficulty::Beginner, "audio"),
            ContentItem::new("c_c", "sleep", 10.0, Difficulty::Beginner, "audio"),
        ])
        .unwrap();
        let recs = RecommendationScorer::default().recommend(
            &UserProfile::new("u", "better_sleep"),
            &catalog,
            &RetentionLiftTable::uniform(0.4),
            1,
            &BTreeSet::new(),
            10,
        );
        let ids: Vec<&str> = recs.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, vec!["c_a", "c_b", "c_c"]);
    }

    #[test]
    fn test_top_k_truncates() {
        let catalog = ContentCatalog::new(
            (0..10)
                .map(|i| ContentItem::new(format!("c_{i:03}"), "fitness", 10.0, Difficulty::Beginner, "video"))
                .collect(),
        )
        .unwrap();
        let scorer = RecommendationScorer::default();
        let profile = UserProfile::new("u", "weight_loss");
        let lift = RetentionLiftTable::uniform(0.5);
        assert_eq!(scorer.recommend(&profile, &catalog, &lift, 1, &BTreeSet::new(), 3).len(), 3);
        assert!(scorer.recommend(&profile, &catalog, &lift, 1, &BTreeSet::new(), 0).is_empty());
    }

    #[test]
    fn test_session_buckets() {
        let scorer = RecommendationScorer::default();
        assert_eq!(scorer.weights_for_session(1), ScoreWeights::first_session());
        assert_eq!(scorer.weights_for_session(2), ScoreWeights::later_sessions());
        assert_eq!(scorer.weights_for_session(30), ScoreWeights::later_sessions());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let config = ScoringConfig {
            first_session: ScoreWeights {
                goal_alignment: 0.5,
                retention_lift: 0.5,
                completion_friendly: 0.5,
                freshness: 0.0,
            },
            ..Default::default()
        };
        assert!(RecommendationScorer::new(config).is_err());
    }

    #[test]
    fn test_nan_duration_curve_rejected() {
        let config = ScoringConfig {
            duration: crate::config::DurationCurve {
                falloff: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(RecommendationScorer::new(config).is_err());
    }
}
