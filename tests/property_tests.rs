//! Property-Based Tests for the retention engine
//!
//! Tests the following invariants:
//! - Feature bounds: completion_rate in [0, 1], category_diversity <= catalog categories
//! - Window separation: churn-window records never change features
//! - Lift bounds: every lift value in [0, 1], fallback equals population retention
//! - Determinism: identical inputs rank identically
//! - Freshness: seen items lose exactly the freshness weight

use proptest::prelude::*;
use std::collections::BTreeSet;

use retention_engine::labeling::retention_rate;
use retention_engine::{
    ChurnLabeler, ContentCatalog, ContentItem, Difficulty, FeatureAggregator, FeatureName,
    Interaction, RecommendationScorer, RetentionLiftCalculator, UserProfile, WindowConfig,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

const CONTENT_IDS: [&str; 6] = ["c_000", "c_001", "c_002", "c_003", "c_004", "c_005"];
const USER_GOALS: [&str; 5] = [
    "weight_loss",
    "stress_reduction",
    "better_sleep",
    "build_strength",
    "unmapped_goal",
];

fn catalog() -> ContentCatalog {
    ContentCatalog::new(vec![
        ContentItem::new("c_000", "fitness", 12.0, Difficulty::Beginner, "video"),
        ContentItem::new("c_001", "fitness", 45.0, Difficulty::Advanced, "video"),
        ContentItem::new("c_002", "sleep", 20.0, Difficulty::Intermediate, "audio"),
        ContentItem::new("c_003", "meditation", 6.0, Difficulty::Beginner, "audio"),
        ContentItem::new("c_004", "nutrition", 3.0, Difficulty::Beginner, "article"),
        ContentItem::new("c_005", "strength", 25.0, Difficulty::Intermediate, "video"),
    ])
    .unwrap()
}

fn arb_interaction(max_day: i32) -> impl Strategy<Value = Interaction> {
    (0usize..8, 0usize..CONTENT_IDS.len(), 0..max_day, 0u32..=600, any::<bool>()).prop_map(
        |(user, content, day, tenths, completed)| {
            Interaction::new(
                format!("u_{user}"),
                CONTENT_IDS[content],
                day,
                tenths as f64 / 10.0,
                completed,
            )
        },
    )
}

fn arb_interactions(max_day: i32) -> impl Strategy<Value = Vec<Interaction>> {
    prop::collection::vec(arb_interaction(max_day), 0..60)
}

fn arb_seen() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop_oneof![
            (0usize..CONTENT_IDS.len()).prop_map(|i| CONTENT_IDS[i].to_string()),
            Just("c_missing".to_string()),
        ],
        0..5,
    )
}

fn arb_goal() -> impl Strategy<Value = String> {
    (0usize..USER_GOALS.len()).prop_map(|i| USER_GOALS[i].to_string())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_feature_bounds(interactions in arb_interactions(21)) {
        let catalog = catalog();
        let windows = WindowConfig::default();
        let features = FeatureAggregator::new(&catalog, windows)
            .unwrap()
            .aggregate(&interactions, windows.observation_end)
            .unwrap();

        for vector in features.values() {
            let rate = vector.get(FeatureName::CompletionRate);
            prop_assert!((0.0..=1.0).contains(&rate));
            prop_assert!(vector.get(FeatureName::CategoryDiversity) <= catalog.category_count() as f64);
            prop_assert!(vector.get(FeatureName::DaysSinceLastActivity) >= 1.0);
            prop_assert!(vector.as_slice().iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn prop_churn_window_never_changes_features(
        observed in arb_interactions(7),
        later in prop::collection::vec(arb_interaction(21), 0..30),
    ) {
        let catalog = catalog();
        let windows = WindowConfig::default();
        let aggregator = FeatureAggregator::new(&catalog, windows).unwrap();

        let later: Vec<Interaction> = later.into_iter().filter(|i| i.day >= 14).collect();
        let mut combined = observed.clone();
        combined.extend(later);

        let before = aggregator.aggregate(&observed, windows.observation_end).unwrap();
        let after = aggregator.aggregate(&combined, windows.observation_end).unwrap();
        for (user_id, vector) in &before {
            prop_assert_eq!(vector, &after[user_id]);
        }
    }

    #[test]
    fn prop_lift_bounds_and_fallback(interactions in arb_interactions(21)) {
        let catalog = catalog();
        let windows = WindowConfig::default();
        let labels = ChurnLabeler::new(windows)
            .unwrap()
            .label(&interactions, windows.churn_start, windows.churn_end)
            .unwrap();
        let lift = RetentionLiftCalculator::new(&catalog, windows, Default::default())
            .lift(&interactions, &labels)
            .unwrap();

        prop_assert_eq!(lift.len(), catalog.len());
        for (content_id, value) in lift.iter() {
            prop_assert!((0.0..=1.0).contains(&value));
            if lift.exposures(content_id) == 0 {
                prop_assert_eq!(value, lift.fallback());
            }
        }
        if let Some(rate) = retention_rate(&labels) {
            prop_assert_eq!(lift.fallback(), rate);
        }
    }

    #[test]
    fn prop_recommend_is_deterministic(
        interactions in arb_interactions(21),
        goal in arb_goal(),
        seen in arb_seen(),
        session in 1u32..6,
        top_k in 0usize..8,
    ) {
        let catalog = catalog();
        let windows = WindowConfig::default();
        let labels = ChurnLabeler::new(windows)
            .unwrap()
            .label(&interactions, windows.churn_start, windows.churn_end)
            .unwrap();
        let lift = RetentionLiftCalculator::new(&catalog, windows, Default::default())
            .lift(&interactions, &labels)
            .unwrap();
        let scorer = RecommendationScorer::default();

        let alice = UserProfile::new("u_alice", goal.clone());
        let bob = UserProfile::new("u_bob", goal);
        let first = scorer.recommend(&alice, &catalog, &lift, session, &seen, top_k);
        let second = scorer.recommend(&bob, &catalog, &lift, session, &seen, top_k);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), top_k.min(catalog.len()));
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].content_id < pair[1].content_id);
            }
        }
        prop_assert!(first.iter().all(|r| (0.0..=1.0 + 1e-12).contains(&r.score)));
    }

    #[test]
    fn prop_seen_items_lose_freshness(
        goal in arb_goal(),
        seen in arb_seen(),
        session in 1u32..6,
    ) {
        let catalog = catalog();
        let lift = retention_engine::RetentionLiftTable::uniform(0.6);
        let scorer = RecommendationScorer::default();
        let profile = UserProfile::new("u", goal);
        let weights = scorer.weights_for_session(session);

        let baseline = scorer.recommend(&profile, &catalog, &lift, session, &BTreeSet::new(), catalog.len());
        let ranked = scorer.recommend(&profile, &catalog, &lift, session, &seen, catalog.len());

        for rec in &ranked {
            let fresh = baseline.iter().find(|r| r.content_id == rec.content_id).unwrap();
            let item = catalog.get(&rec.content_id).unwrap();
            let breakdown = scorer.breakdown(item, &profile, &lift, &seen);
            if seen.contains(&rec.content_id) {
                prop_assert_eq!(breakdown.freshness, 0.0);
                prop_assert!((fresh.score - rec.score - weights.freshness).abs() < 1e-9);
            } else {
                prop_assert_eq!(breakdown.freshness, 1.0);
                prop_assert_eq!(fresh.score, rec.score);
            }
        }
    }
}
