//! Report types for finished optimization runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Serializable view of a candidate at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Unique identifier within the run.
    pub id: u64,
    /// Full rendered artifact.
    pub prompt: String,
    /// Instructional portion of the artifact.
    pub instructions: String,
    /// Few-shot example strings, in order.
    pub examples: Vec<String>,
    /// Task performance in [0, 1].
    pub performance: f64,
    /// Monetary cost in dollars.
    pub cost: f64,
    /// Artifact length in characters.
    pub length: usize,
    /// Weighted scalar fitness.
    pub fitness: f64,
    /// Times this candidate has been scored.
    pub evaluation_count: u32,
    /// False once the racing scheduler stopped spending budget on it.
    pub active: bool,
    /// Generation this candidate was created in.
    pub generation: usize,
    /// Parent candidate ids.
    pub parents: Vec<u64>,
}

/// One per-generation history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Generation index, starting at 0.
    pub generation: usize,
    /// Best fitness in the population after evaluation.
    pub best_fitness: f64,
    /// Mean fitness across the population.
    pub avg_fitness: f64,
    /// Cumulative evaluator calls at the end of this generation.
    pub evaluations: u64,
    /// Evaluator calls that exhausted their retries this generation.
    pub evaluator_failures: u32,
}

/// Current phase of the run state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Phase {
    /// Population seeded, nothing evaluated yet.
    #[default]
    Initialized,
    /// Racing scheduler is spending evaluation budget.
    Evaluating,
    /// Choosing the next generation's parent set.
    Selecting,
    /// Producing offspring from the parent set.
    Reproducing,
    /// Run finished.
    Terminated,
}

/// Reason the run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Total evaluations reached the configured budget.
    BudgetExhausted,
    /// Generation count reached the configured maximum.
    MaxGenerations,
    /// No strict best-fitness improvement for the configured patience.
    Stagnation,
}

/// Aggregate statistics for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Generations completed.
    pub generations: usize,
    /// Total evaluator calls issued.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Mean fitness of the final population.
    pub final_avg_fitness: f64,
    /// Wall-clock time of the run.
    pub elapsed_seconds: f64,
    /// What terminated the run.
    pub stop_reason: StopReason,
}

/// Final result of an optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Best candidate found, by fitness.
    pub best: CandidateSnapshot,
    /// The original seed candidate, as scored in generation 0.
    pub seed: CandidateSnapshot,
    /// Full text of the best artifact.
    pub best_prompt: String,
    /// Instructional portion of the best artifact.
    pub best_instructions: String,
    /// Few-shot examples of the best artifact.
    pub best_few_shot_examples: Vec<String>,
    /// The seed artifact as given to `optimize()`.
    pub original_prompt: String,
    /// Generations completed.
    pub iterations: usize,
    /// Cost reduction versus the seed, in percent.
    pub cost_reduction_pct: f64,
    /// Performance improvement versus the seed, in percent.
    pub performance_improvement_pct: f64,
    /// Length reduction versus the seed, in percent.
    pub length_reduction_pct: f64,
    /// Total evaluator calls issued.
    pub total_evaluations: u64,
    /// Non-dominated subset of the final population.
    pub pareto_front: Vec<CandidateSnapshot>,
    /// Per-generation history.
    pub history: Vec<GenerationRecord>,
    /// Aggregate run statistics.
    pub stats: RunStats,
}

impl OptimizationReport {
    /// Save the report as pretty-printed JSON.
    ///
    /// Returns the path written to.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_string(&StopReason::BudgetExhausted).unwrap();
        let parsed: StopReason = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, StopReason::BudgetExhausted);
    }
}
