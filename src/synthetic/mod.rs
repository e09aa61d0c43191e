//! Seeded synthetic wellness dataset
//!
//! Stands in for the interaction store in the demo and benches. Users lean
//! toward goal-aligned content, engagement propensity is Beta(2, 2), and
//! users planned to churn go quiet after a churn day drawn from `[3, 14)`.
//! Content carries a hidden quality score that only drives completion.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GoalCategoryMap;
use crate::error::{EngineError, Result};
use crate::pipeline::Dataset;
use crate::types::{ContentCatalog, ContentItem, Difficulty, Interaction, UserRecord, EPSILON};

pub const GOALS: [&str; 4] = ["weight_loss", "stress_reduction", "better_sleep", "build_strength"];
pub const CONTENT_CATEGORIES: [&str; 5] = ["fitness", "meditation", "sleep", "nutrition", "strength"];

const FORMATS: [(&str, f64); 3] = [("video", 0.5), ("audio", 0.3), ("article", 0.2)];
const DIFFICULTIES: [(Difficulty, f64); 3] = [
    (Difficulty::Beginner, 0.4),
    (Difficulty::Intermediate, 0.4),
    (Difficulty::Advanced, 0.2),
];
const GENDERS: [(&str, f64); 3] = [("M", 0.45), ("F", 0.50), ("Other", 0.05)];
const ITEMS_PER_SESSION: [(usize, f64); 3] = [(1, 0.5), (2, 0.35), (3, 0.15)];

const MAX_GAMMA_ITERATIONS: usize = 1000;
const MAX_GAMMA_RECURSION: usize = 10;

/// Chance of picking from the goal-aligned pool
const ALIGNED_PICK_PROBABILITY: f64 = 0.7;
/// Chance a churned user still shows up on a given day
const RETURN_AFTER_CHURN_PROBABILITY: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub users: usize,
    pub content_items: usize,
    pub simulation_days: i32,
    /// Signup days are spread over `[0, signup_spread_days)`
    pub signup_spread_days: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            users: 500,
            content_items: 50,
            simulation_days: 21,
            signup_spread_days: 30,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.simulation_days <= 0 {
            return Err(EngineError::InvalidConfig(format!(
                "simulation_days must be positive, got {}",
                self.simulation_days
            )));
        }
        if self.signup_spread_days == 0 {
            return Err(EngineError::InvalidConfig(
                "signup_spread_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn base_duration(category: &str) -> f64 {
    match category {
        "fitness" => 15.0,
        "meditation" => 10.0,
        "sleep" => 20.0,
        "nutrition" => 5.0,
        "strength" => 20.0,
        _ => 10.0,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct DatasetGenerator {
    config: SyntheticConfig,
    goal_categories: GoalCategoryMap,
    rng: ChaCha8Rng,
}

impl DatasetGenerator {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            goal_categories: GoalCategoryMap::default(),
            rng,
        })
    }

    pub fn with_goal_categories(mut self, goal_categories: GoalCategoryMap) -> Self {
        self.goal_categories = goal_categories;
        self
    }

    /// Content library, users, then simulated sessions, all from one seeded stream.
    pub fn generate(mut self) -> Result<Dataset> {
        let (catalog, quality) = self.generate_content_library()?;
        let users = self.generate_users()?;
        let interactions = self.simulate_sessions(&users, &catalog, &quality)?;

        tracing::info!(
            seed = self.config.seed,
            users = users.len(),
            content_items = catalog.len(),
            interactions = interactions.len(),
            "generated synthetic dataset"
        );
        Ok(Dataset::new(users, catalog, interactions))
    }

    fn generate_content_library(&mut self) -> Result<(ContentCatalog, BTreeMap<String, f64>)> {
        let mut items = Vec::with_capacity(self.config.content_items);
        let mut quality = BTreeMap::new();

        for i in 0..self.config.content_items {
            let category = CONTENT_CATEGORIES[self.rng.gen_range(0..CONTENT_CATEGORIES.len())];
            let duration = (base_duration(category) * self.rng.gen_range(0.5..1.5)).floor().max(1.0);
            let quality_score = self.sample_beta(5.0, 2.0);
            let format = self.choose_weighted(&FORMATS)?;
            let difficulty = self.choose_weighted(&DIFFICULTIES)?;

            let content_id = format!("c_{i:03}");
            quality.insert(content_id.clone(), quality_score);
            items.push(
                ContentItem::new(content_id, category, duration, difficulty, format)
                    .with_title(format!("{} Session {}", title_case(category), i + 1)),
            );
        }

        Ok((ContentCatalog::new(items)?, quality))
    }

    fn generate_users(&mut self) -> Result<Vec<UserRecord>> {
        let mut users = Vec::with_capacity(self.config.users);
        for i in 0..self.config.users {
            let age = (35.0 + 12.0 * self.sample_normal()).floor().clamp(18.0, 70.0) as u32;
            let goal = GOALS[self.rng.gen_range(0..GOALS.len())];
            let gender = self.choose_weighted(&GENDERS)?;
            users.push(UserRecord {
                user_id: format!("u_{i:05}"),
                goal: goal.to_string(),
                age,
                gender: gender.to_string(),
                signup_day: self.rng.gen_range(0..self.config.signup_spread_days),
            });
        }
        Ok(users)
    }

    fn simulate_sessions(
        &mut self,
        users: &[UserRecord],
        catalog: &ContentCatalog,
        quality: &BTreeMap<String, f64>,
    ) -> Result<Vec<Interaction>> {
        let items: Vec<&ContentItem> = catalog.iter().collect();
        let mut interactions = Vec::new();
        if items.is_empty() {
            return Ok(interactions);
        }

        for user in users {
            let aligned: Vec<&ContentItem> = items
                .iter()
                .copied()
                .filter(|item| self.goal_categories.aligns(&user.goal, &item.category))
                .collect();

            let base_engagement = self.sample_beta(2.0, 2.0);
            // 20%..70% churn probability
            let churn_probability = 0.7 - base_engagement * 0.5;
            let churn_day = if self.rng.gen::<f64>() < churn_probability {
                Some(self.rng.gen_range(3..14))
            } else {
                None
            };

            for day in 0..self.config.simulation_days {
                if let Some(churn_day) = churn_day {
                    if day >= churn_day && self.rng.gen::<f64>() > RETURN_AFTER_CHURN_PROBABILITY {
                        continue;
                    }
                }

                let decay = match churn_day {
                    Some(churn_day) => (1.0 - (day as f64 / churn_day as f64) * 0.5).max(0.1),
                    None => (1.0 + day as f64 * 0.02).min(1.2),
                };
                if self.rng.gen::<f64>() > base_engagement * decay * 0.6 {
                    continue;
                }

                let session_items = self.choose_weighted(&ITEMS_PER_SESSION)?;
                for _ in 0..session_items {
                    let pool = if !aligned.is_empty()
                        && self.rng.gen::<f64>() < ALIGNED_PICK_PROBABILITY
                    {
                        &aligned
                    } else {
                        &items
                    };
                    let item = pool[self.rng.gen_range(0..pool.len())];
                    let is_aligned = self.goal_categories.aligns(&user.goal, &item.category);
                    let quality_score = quality.get(&item.content_id).copied().unwrap_or(0.5);

                    let completion_probability = (0.3
                        + quality_score * 0.3
                        + if is_aligned { 0.2 } else { 0.0 }
                        - (item.duration_minutes / 60.0) * 0.2
                        + base_engagement * 0.2)
                        .clamp(0.1, 0.95);
                    let completed = self.rng.gen::<f64>() < completion_probability;

                    let fraction = if completed {
                        self.rng.gen_range(0.9..1.1)
                    } else {
                        self.rng.gen_range(0.1..0.7)
                    };
                    let time_spent = (item.duration_minutes * fraction * 10.0).round() / 10.0;

                    interactions.push(Interaction::new(
                        user.user_id.clone(),
                        item.content_id.clone(),
                        day,
                        time_spent,
                        completed,
                    ));
                }
            }
        }

        Ok(interactions)
    }

    fn choose_weighted<T: Copy>(&mut self, options: &[(T, f64)]) -> Result<T> {
        options
            .choose_weighted(&mut self.rng, |option| option.1)
            .map(|option| option.0)
            .map_err(|e| EngineError::InvalidConfig(format!("weighted choice: {e}")))
    }

    /// Beta(alpha, beta) as Gamma(alpha) / (Gamma(alpha) + Gamma(beta))
    fn sample_beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let x = self.sample_gamma(alpha.max(EPSILON), 0);
        let y = self.sample_gamma(beta.max(EPSILON), 0);
        let sum = x + y;
        if sum > 0.0 && sum.is_finite() {
            x / sum
        } else {
            0.5
        }
    }

    /// Marsaglia-Tsang, unit scale
    fn sample_gamma(&mut self, shape: f64, depth: usize) -> f64 {
        if shape <= 0.0 {
            return 0.0;
        }
        if depth >= MAX_GAMMA_RECURSION {
            return shape;
        }
        if shape < 1.0 {
            let u: f64 = self.rng.gen::<f64>().max(EPSILON);
            return self.sample_gamma(1.0 + shape, depth + 1) * u.powf(1.0 / shape);
        }

        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        for _ in 0..MAX_GAMMA_ITERATIONS {
            let x = self.sample_normal();
            let v = 1.0 + c * x;
            if v <= 0.0 {
                continue;
            }
            let v = v.powi(3);
            let u: f64 = self.rng.gen();
            let x2 = x * x;
            if u < 1.0 - 0.0331 * x2 * x2 {
                return d * v;
            }
            if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
        shape
    }

    /// Box-Muller
    fn sample_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(EPSILON);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Generates a dataset with default shape and the given seed.
pub fn generate(seed: u64, users: usize, content_items: usize) -> Result<Dataset> {
    DatasetGenerator::new(SyntheticConfig {
        seed,
        users,
        content_items,
        ..Default::default()
    })?
    .generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;
    use crate::sanitize;

    #[test]
    fn test_same_seed_same_dataset() {
        let a = generate(7, 40, 12).unwrap();
        let b = generate(7, 40, 12).unwrap();
        assert_eq!(a.interactions, b.interactions);
        assert_eq!(a.users, b.users);

        let c = generate(8, 40, 12).unwrap();
        assert_ne!(a.interactions, c.interactions);
    }

    #[test]
    fn test_generated_records_are_valid() {
        let data = generate(42, 60, 20).unwrap();
        assert_eq!(data.users.len(), 60);
        assert_eq!(data.catalog.len(), 20);
        assert!(!data.interactions.is_empty());
        sanitize::validate_interactions(&data.interactions, &data.catalog, &WindowConfig::default())
            .unwrap();

        for user in &data.users {
            assert!((18..=70).contains(&user.age));
            assert!(GOALS.contains(&user.goal.as_str()));
            assert!(user.signup_day < 30);
        }
        for item in data.catalog.iter() {
            assert!(CONTENT_CATEGORIES.contains(&item.category.as_str()));
            assert!(item.duration_minutes >= 1.0);
            assert!(item.title.is_some());
        }
    }

    #[test]
    fn test_empty_catalog_produces_no_interactions() {
        let data = generate(1, 10, 0).unwrap();
        assert!(data.catalog.is_empty());
        assert!(data.interactions.is_empty());
        assert_eq!(data.users.len(), 10);
    }

    #[test]
    fn test_beta_sample_range() {
        let mut generator = DatasetGenerator::new(SyntheticConfig::default()).unwrap();
        let samples: Vec<f64> = (0..2000).map(|_| generator.sample_beta(2.0, 2.0)).collect();
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(s)));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("fitness"), "Fitness");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_custom_goal_categories_steer_picks() {
        let sleep_share = |data: &Dataset| {
            let sleep = data
                .interactions
                .iter()
                .filter(|i| data.catalog.get(&i.content_id).map(|c| c.category.as_str()) == Some("sleep"))
                .count();
            sleep as f64 / data.interactions.len() as f64
        };
        let config = SyntheticConfig {
            seed: 5,
            users: 150,
            content_items: 50,
            ..Default::default()
        };
        let all_sleep = GoalCategoryMap(
            GOALS
                .iter()
                .map(|goal| (goal.to_string(), vec!["sleep".to_string()]))
                .collect(),
        );

        let default = DatasetGenerator::new(config.clone()).unwrap().generate().unwrap();
        let steered = DatasetGenerator::new(config)
            .unwrap()
            .with_goal_categories(all_sleep)
            .generate()
            .unwrap();

        assert!(default.catalog.iter().any(|c| c.category == "sleep"));
        assert!(sleep_share(&steered) > 0.6);
        assert!(sleep_share(&steered) > sleep_share(&default));
    }

    #[test]
    fn test_rejects_empty_simulation() {
        let config = SyntheticConfig {
            simulation_days: 0,
            ..Default::default()
        };
        assert!(DatasetGenerator::new(config).is_err());
    }
}
