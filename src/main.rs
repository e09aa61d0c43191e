use std::collections::BTreeSet;

use chrono::Utc;

use retention_engine::logging::{init_tracing, LoggingOptions};
use retention_engine::report::{RecommendationSet, ResultsWriter, RunReport};
use retention_engine::synthetic::{DatasetGenerator, SyntheticConfig, GOALS};
use retention_engine::{ContentCatalog, EngineConfig, Result, RetentionPipeline, UserProfile};

const TOP_K: usize = 5;

fn main() {
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing(&LoggingOptions::from_env());

    if let Err(err) = run() {
        tracing::error!(error = %err, "retention demo failed");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = EngineConfig::from_env();
    let synthetic = SyntheticConfig {
        seed: env_or("RETENTION_DATA_SEED", 42),
        users: env_or("RETENTION_USERS", 500),
        content_items: env_or("RETENTION_CONTENT_ITEMS", 50),
        ..Default::default()
    };
    let output_dir = std::env::var("RETENTION_OUTPUT_DIR").unwrap_or_else(|_| "output".to_string());

    tracing::info!(seed = synthetic.seed, users = synthetic.users, "[1/3] generating synthetic data");
    let dataset = DatasetGenerator::new(synthetic)?
        .with_goal_categories(config.scoring.goal_categories.clone())
        .generate()?;

    tracing::info!("[2/3] running churn analysis");
    let pipeline = RetentionPipeline::new(config)?;
    let run = pipeline.run(&dataset)?;

    if let Some(rate) = run.diagnostics.churn_rate() {
        tracing::info!(churn_rate = %format!("{:.1}%", rate * 100.0), "churn window 14-21");
    }
    for (feature, importance) in run.diagnostics.ranked_importances().into_iter().take(3) {
        tracing::info!(%feature, importance = %format!("{importance:.3}"), "top churn driver");
    }
    for (feature, correlation) in run.diagnostics.sorted_correlations() {
        match correlation {
            Some(r) => tracing::info!(%feature, correlation = %format!("{r:+.3}"), "correlation with churn"),
            None => tracing::info!(%feature, "correlation with churn undefined"),
        }
    }

    tracing::info!("[3/3] demonstrating recommendations");
    let mut sets = Vec::new();
    let no_history = BTreeSet::new();
    for goal in GOALS {
        let profile = UserProfile::new(format!("new_{goal}"), goal);
        let recommendations =
            pipeline.recommend(&run, &dataset.catalog, &profile, 1, &no_history, TOP_K);
        log_recommendations(&dataset.catalog, &profile, 1, &recommendations);
        sets.push(RecommendationSet {
            user_id: profile.user_id.clone(),
            goal: profile.goal.clone(),
            session_number: 1,
            seen_content: Vec::new(),
            recommendations,
        });
    }

    let returning = UserProfile::new("returning_user", "weight_loss");
    let seen: BTreeSet<String> = ["c_001", "c_005", "c_010"]
        .iter()
        .map(|id| id.to_string())
        .collect();
    let recommendations = pipeline.recommend(&run, &dataset.catalog, &returning, 2, &seen, TOP_K);
    log_recommendations(&dataset.catalog, &returning, 2, &recommendations);
    sets.push(RecommendationSet {
        user_id: returning.user_id.clone(),
        goal: returning.goal.clone(),
        session_number: 2,
        seen_content: seen.into_iter().collect(),
        recommendations,
    });

    let report = RunReport::from_run(&dataset, &run, Utc::now()).with_recommendations(sets);
    let writer = ResultsWriter::new(&output_dir)?;
    writer.write_report(&report)?;
    tracing::info!(run_dir = %writer.run_dir().display(), "demo complete");
    Ok(())
}

fn log_recommendations(
    catalog: &ContentCatalog,
    profile: &UserProfile,
    session_number: u32,
    recommendations: &[retention_engine::Recommendation],
) {
    for (rank, rec) in recommendations.iter().enumerate() {
        let content = catalog
            .get(&rec.content_id)
            .map(|item| item.describe())
            .unwrap_or_else(|| rec.content_id.clone());
        tracing::info!(
            goal = %profile.goal,
            session_number,
            rank = rank + 1,
            content_id = %rec.content_id,
            %content,
            score = %format!("{:.3}", rec.score),
            reasons = %rec.reasons.join("; "),
            "recommendation"
        );
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
