//! Configuration types for cost-aware prompt optimization runs.

use serde::{Deserialize, Serialize};

/// Top-level configuration for an optimization run.
///
/// Immutable once a run starts. Every tunable carries a serde default so a
/// partial JSON config deserializes into something runnable; `validate()` is
/// still required before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Number of candidates kept after each generation's replacement step.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Maximum total evaluator calls across the whole run.
    #[serde(default = "default_budget")]
    pub budget: u64,
    /// Extra linear pressure on artifact length, applied on top of the
    /// weighted length objective. Zero disables it.
    #[serde(default)]
    pub length_penalty: f64,
    /// Evaluations a candidate receives before it becomes eligible for
    /// racing deactivation. Evaluation spend per candidate is capped here.
    #[serde(default = "default_racing_threshold")]
    pub racing_threshold: u32,
    /// Relative weights of the three objectives. Must sum to 1.0.
    #[serde(default)]
    pub weights: ObjectiveWeights,
    /// Probability that an offspring is mutated (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Probability that a parent pair is recombined (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Stop after this many consecutive generations without a strictly
    /// better best fitness.
    #[serde(default = "default_patience")]
    pub early_stopping_patience: usize,
    /// Reference length for normalizing the length objective, in characters.
    #[serde(default = "default_length_scale")]
    pub length_scale: f64,
    /// Reference cost for normalizing the cost objective, in dollars.
    #[serde(default = "default_cost_scale")]
    pub cost_scale: f64,
    /// Price per estimated token for the deterministic cost model, in
    /// dollars. Used when the evaluator reports no measured cost.
    #[serde(default = "default_cost_per_token")]
    pub cost_per_token: f64,
    /// Length-reduction floor: mutation never shrinks an artifact below
    /// this fraction of its original length.
    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,
    /// Maximum few-shot examples kept after crossover.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
    /// Evaluator retries before falling back to a default score.
    #[serde(default = "default_eval_retries")]
    pub eval_retries: u32,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            budget: default_budget(),
            length_penalty: 0.0,
            racing_threshold: default_racing_threshold(),
            weights: ObjectiveWeights::default(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            max_generations: default_max_generations(),
            early_stopping_patience: default_patience(),
            length_scale: default_length_scale(),
            cost_scale: default_cost_scale(),
            cost_per_token: default_cost_per_token(),
            min_length_ratio: default_min_length_ratio(),
            max_examples: default_max_examples(),
            eval_retries: default_eval_retries(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    10
}
fn default_budget() -> u64 {
    200
}
fn default_racing_threshold() -> u32 {
    3
}
fn default_mutation_rate() -> f64 {
    0.9
}
fn default_crossover_rate() -> f64 {
    0.5
}
fn default_max_generations() -> usize {
    20
}
fn default_patience() -> usize {
    5
}
fn default_length_scale() -> f64 {
    1000.0
}
fn default_cost_scale() -> f64 {
    0.01
}
fn default_cost_per_token() -> f64 {
    1e-5
}
fn default_min_length_ratio() -> f64 {
    0.3
}
fn default_max_examples() -> usize {
    3
}
fn default_eval_retries() -> u32 {
    2
}

/// Relative weights of the performance, length, and cost objectives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Weight of task performance.
    pub performance: f64,
    /// Weight of the normalized length objective.
    pub length: f64,
    /// Weight of the normalized cost objective.
    pub cost: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            performance: 0.5,
            length: 0.25,
            cost: 0.25,
        }
    }
}

impl ObjectiveWeights {
    /// Sum of all three weights.
    pub fn sum(&self) -> f64 {
        self.performance + self.length + self.cost
    }
}

/// Tolerance for the weight-sum check.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl OptimizerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize);
        }
        if self.budget == 0 {
            return Err(ConfigError::InvalidBudget);
        }
        if self.racing_threshold == 0 {
            return Err(ConfigError::InvalidRacingThreshold);
        }
        if self.max_generations == 0 {
            return Err(ConfigError::InvalidMaxGenerations);
        }
        if self.early_stopping_patience == 0 {
            return Err(ConfigError::InvalidPatience);
        }
        if self.length_penalty < 0.0 {
            return Err(ConfigError::NegativeLengthPenalty);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::RateOutOfRange {
                name: "mutation_rate",
                value: self.mutation_rate,
            });
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(ConfigError::RateOutOfRange {
                name: "crossover_rate",
                value: self.crossover_rate,
            });
        }
        if self.weights.performance < 0.0 || self.weights.length < 0.0 || self.weights.cost < 0.0 {
            return Err(ConfigError::NegativeWeight);
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }
        if self.length_scale <= 0.0 {
            return Err(ConfigError::InvalidScale { name: "length_scale" });
        }
        if self.cost_scale <= 0.0 {
            return Err(ConfigError::InvalidScale { name: "cost_scale" });
        }
        if self.cost_per_token < 0.0 {
            return Err(ConfigError::InvalidScale {
                name: "cost_per_token",
            });
        }
        if self.min_length_ratio <= 0.0 || self.min_length_ratio > 1.0 {
            return Err(ConfigError::InvalidLengthRatio {
                value: self.min_length_ratio,
            });
        }
        if self.max_examples == 0 {
            return Err(ConfigError::InvalidMaxExamples);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    InvalidPopulationSize,
    #[error("Evaluation budget must be non-zero")]
    InvalidBudget,
    #[error("Racing threshold must be non-zero")]
    InvalidRacingThreshold,
    #[error("Maximum generations must be non-zero")]
    InvalidMaxGenerations,
    #[error("Early-stopping patience must be non-zero")]
    InvalidPatience,
    #[error("Length penalty must be non-negative")]
    NegativeLengthPenalty,
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
    #[error("Objective weights must be non-negative")]
    NegativeWeight,
    #[error("Objective weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne { sum: f64 },
    #[error("{name} must be positive")]
    InvalidScale { name: &'static str },
    #[error("Minimum length ratio must be within (0, 1], got {value}")]
    InvalidLengthRatio { value: f64 },
    #[error("Maximum example count must be non-zero")]
    InvalidMaxExamples,
}
