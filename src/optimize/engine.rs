//! The generation loop: initialization, racing, selection, reproduction,
//! and report assembly.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, info};

use crate::schema::{
    GenerationRecord, OptimizationReport, OptimizerConfig, Phase, RunStats, StopReason,
};

use super::candidate::Candidate;
use super::evaluator::{Evaluator, ScoredEvaluator};
use super::operators::{PromptRng, crossover, mutate_checked};
use super::pareto::pareto_front;
use super::racing::{evaluate_batch, racing_round};

/// Cost-aware prompt optimizer.
///
/// Owns the run configuration, the evaluator collaborator, and the seeded
/// random source. All run-level state (population, Pareto front, counters,
/// history) lives inside one `optimize()` invocation and is dropped when
/// the report is returned.
pub struct Optimizer<E: Evaluator> {
    config: OptimizerConfig,
    evaluator: E,
    rng: PromptRng,
    phase: Phase,
}

impl<E: Evaluator> Optimizer<E> {
    /// Create a new optimizer. Fails fast on an invalid configuration;
    /// this is the only error the public API surfaces.
    pub fn new(config: OptimizerConfig, evaluator: E) -> Result<Self, crate::schema::ConfigError> {
        config.validate()?;
        let rng = match config.random_seed {
            Some(seed) => PromptRng::new(seed),
            None => PromptRng::random(),
        };
        Ok(Self {
            config,
            evaluator,
            rng,
            phase: Phase::Initialized,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Current phase of the run state machine.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Optimize `seed_prompt` for `task`.
    pub fn optimize(&mut self, seed_prompt: &str, task: &str) -> OptimizationReport {
        self.optimize_with_dataset(seed_prompt, task, None)
    }

    /// Optimize `seed_prompt` for `task`, evaluating against a named
    /// dataset.
    pub fn optimize_with_dataset(
        &mut self,
        seed_prompt: &str,
        task: &str,
        dataset: Option<&str>,
    ) -> OptimizationReport {
        let start = Instant::now();
        let config = self.config.clone();
        let scorer = ScoredEvaluator::new(&self.evaluator, config.eval_retries);
        let rng = &mut self.rng;
        let counter = AtomicU64::new(0);
        let mut next_id = 0u64;

        self.phase = Phase::Initialized;
        info!(
            "starting optimization: population={} budget={} max_generations={}",
            config.population_size, config.budget, config.max_generations
        );

        // Seed candidate plus mutated variants.
        let mut population = Vec::with_capacity(config.population_size);
        population.push(Candidate::new(next_id, seed_prompt.to_string(), 0, vec![]));
        for _ in 1..config.population_size {
            next_id += 1;
            let text = mutate_checked(seed_prompt, task, rng, &config);
            population.push(Candidate::new(next_id, text, 0, vec![0]));
        }
        let (_, mut pending_failures) = evaluate_batch(
            &mut population,
            |c| c.evaluation_count == 0,
            &scorer,
            task,
            dataset,
            &counter,
            &config,
        );

        // The original seed, as first scored. Reduction percentages in the
        // report are measured against this.
        let seed_snapshot = population[0].to_snapshot();

        let mut history: Vec<GenerationRecord> = Vec::new();
        let mut best_fitness = f64::NEG_INFINITY;
        let mut stagnation = 0usize;
        let mut generations = 0usize;

        let stop_reason = loop {
            self.phase = Phase::Evaluating;
            let outcome = racing_round(&mut population, &scorer, task, dataset, &counter, &config);

            let gen_best = population
                .iter()
                .map(|c| c.fitness)
                .fold(f64::NEG_INFINITY, f64::max);
            let avg_fitness =
                population.iter().map(|c| c.fitness).sum::<f64>() / population.len() as f64;
            let total_evaluations = counter.load(Ordering::Acquire);

            history.push(GenerationRecord {
                generation: generations,
                best_fitness: gen_best,
                avg_fitness,
                evaluations: total_evaluations,
                evaluator_failures: pending_failures + outcome.failures,
            });
            pending_failures = 0;

            if gen_best > best_fitness {
                best_fitness = gen_best;
                stagnation = 0;
            } else {
                stagnation += 1;
            }
            generations += 1;

            info!(
                "gen {generations}: best={gen_best:.4} avg={avg_fitness:.4} evals={total_evaluations} issued={} deactivated={}",
                outcome.evaluations, outcome.deactivated
            );

            if total_evaluations >= config.budget {
                break StopReason::BudgetExhausted;
            }
            if generations >= config.max_generations {
                break StopReason::MaxGenerations;
            }
            if stagnation >= config.early_stopping_patience {
                break StopReason::Stagnation;
            }

            self.phase = Phase::Selecting;
            let front = pareto_front(&population);
            debug!("pareto front size {}", front.len());
            let parents = select_parents(&population, &front, config.population_size);

            self.phase = Phase::Reproducing;
            let mut offspring =
                reproduce(&parents, task, rng, &mut next_id, generations, &config);
            let (_, offspring_failures) = evaluate_batch(
                &mut offspring,
                |c| c.evaluation_count == 0,
                &scorer,
                task,
                dataset,
                &counter,
                &config,
            );
            pending_failures = offspring_failures;

            population = replace_population(parents, offspring, &population, config.population_size);
        };
        self.phase = Phase::Terminated;

        let front_indices = pareto_front(&population);
        let pareto_snapshot: Vec<_> = front_indices
            .iter()
            .map(|&i| population[i].to_snapshot())
            .collect();
        let best = population
            .iter()
            .max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(CmpOrdering::Equal))
            .map(Candidate::to_snapshot)
            .unwrap_or_else(|| seed_snapshot.clone());
        let final_avg_fitness =
            population.iter().map(|c| c.fitness).sum::<f64>() / population.len() as f64;
        let total_evaluations = counter.load(Ordering::Acquire);

        info!(
            "finished after {generations} generations, {total_evaluations} evaluations ({stop_reason:?})"
        );

        OptimizationReport {
            best_prompt: best.prompt.clone(),
            best_instructions: best.instructions.clone(),
            best_few_shot_examples: best.examples.clone(),
            original_prompt: seed_prompt.to_string(),
            iterations: generations,
            cost_reduction_pct: reduction_pct(seed_snapshot.cost, best.cost),
            performance_improvement_pct: improvement_pct(seed_snapshot.performance, best.performance),
            length_reduction_pct: reduction_pct(seed_snapshot.length as f64, best.length as f64),
            total_evaluations,
            pareto_front: pareto_snapshot,
            history,
            stats: RunStats {
                generations,
                total_evaluations,
                best_fitness: best.fitness,
                final_avg_fitness,
                elapsed_seconds: start.elapsed().as_secs_f64(),
                stop_reason,
            },
            best,
            seed: seed_snapshot,
        }
    }
}

/// Percentage change from `seed` down to `best`, guarded against a zero
/// baseline.
fn reduction_pct(seed: f64, best: f64) -> f64 {
    if seed.abs() < f64::EPSILON {
        0.0
    } else {
        (seed - best) / seed * 100.0
    }
}

/// Percentage improvement from `seed` up to `best`, guarded against a zero
/// baseline.
fn improvement_pct(seed: f64, best: f64) -> f64 {
    if seed.abs() < f64::EPSILON {
        0.0
    } else {
        (best - seed) / seed * 100.0
    }
}

/// Parent set for the next generation: the Pareto front, then the best of
/// the remainder by fitness, capped at `cap` members.
fn select_parents(population: &[Candidate], front: &[usize], cap: usize) -> Vec<Candidate> {
    let mut parents: Vec<Candidate> = front
        .iter()
        .take(cap)
        .map(|&i| population[i].clone())
        .collect();
    if parents.len() < cap {
        let mut remainder: Vec<&Candidate> = population
            .iter()
            .enumerate()
            .filter(|(i, _)| !front.contains(i))
            .map(|(_, c)| c)
            .collect();
        remainder.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(CmpOrdering::Equal)
        });
        for candidate in remainder {
            if parents.len() == cap {
                break;
            }
            parents.push(candidate.clone());
        }
    }
    parents
}

/// Produce one offspring cohort from the parent set.
fn reproduce(
    parents: &[Candidate],
    task: &str,
    rng: &mut PromptRng,
    next_id: &mut u64,
    generation: usize,
    config: &OptimizerConfig,
) -> Vec<Candidate> {
    let mut offspring = Vec::with_capacity(config.population_size);
    while offspring.len() < config.population_size {
        let a = &parents[rng.pick_index(parents.len())];
        let b = &parents[rng.pick_index(parents.len())];

        let (mut text_a, mut text_b) = if rng.chance(config.crossover_rate) {
            crossover(&a.parts, &b.parts, config.max_examples)
        } else {
            (a.text.clone(), b.text.clone())
        };
        if rng.chance(config.mutation_rate) {
            text_a = mutate_checked(&text_a, task, rng, config);
        }
        if rng.chance(config.mutation_rate) {
            text_b = mutate_checked(&text_b, task, rng, config);
        }

        for (text, parent_ids) in [(text_a, vec![a.id, b.id]), (text_b, vec![b.id, a.id])] {
            if offspring.len() == config.population_size {
                break;
            }
            *next_id += 1;
            offspring.push(Candidate::new(*next_id, text, generation, parent_ids));
        }
    }
    offspring
}

/// Replacement step: combine parents and offspring, keep the best `cap` by
/// fitness, and pad from the previous population if the combined pool runs
/// short.
fn replace_population(
    parents: Vec<Candidate>,
    offspring: Vec<Candidate>,
    previous: &[Candidate],
    cap: usize,
) -> Vec<Candidate> {
    let mut next: Vec<Candidate> = parents.into_iter().chain(offspring).collect();
    next.sort_by(|a, b| {
        b.fitness
            .partial_cmp(&a.fitness)
            .unwrap_or(CmpOrdering::Equal)
    });
    next.truncate(cap);

    if next.len() < cap {
        let mut remainder: Vec<&Candidate> = previous
            .iter()
            .filter(|c| next.iter().all(|kept| kept.id != c.id))
            .collect();
        remainder.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(CmpOrdering::Equal)
        });
        for candidate in remainder {
            if next.len() == cap {
                break;
            }
            next.push(candidate.clone());
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::evaluator::{EvalError, Evaluation};
    use crate::schema::ObjectiveWeights;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    /// Deterministic evaluator that rewards shorter prompts.
    struct LengthEvaluator;

    impl Evaluator for LengthEvaluator {
        fn evaluate(
            &self,
            prompt: &str,
            _task: &str,
            _dataset: Option<&str>,
        ) -> Result<Evaluation, EvalError> {
            let length = prompt.chars().count() as f64;
            Ok(Evaluation {
                performance: 1.0 / (1.0 + length / 400.0),
                cost: 0.0,
                latency_ms: 1,
            })
        }
    }

    /// Counts calls; used to prove construction never evaluates.
    struct CountingEvaluator {
        calls: Arc<AtomicU32>,
    }

    impl Evaluator for CountingEvaluator {
        fn evaluate(
            &self,
            _prompt: &str,
            _task: &str,
            _dataset: Option<&str>,
        ) -> Result<Evaluation, EvalError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Evaluation {
                performance: 0.5,
                cost: 0.0,
                latency_ms: 1,
            })
        }
    }

    struct AlwaysFailingEvaluator;

    impl Evaluator for AlwaysFailingEvaluator {
        fn evaluate(
            &self,
            _prompt: &str,
            _task: &str,
            _dataset: Option<&str>,
        ) -> Result<Evaluation, EvalError> {
            Err(EvalError::Failed("backend unavailable".to_string()))
        }
    }

    const SEED_PROMPT: &str = "Please kindly classify the sentiment of the given review. \
It would be great if you could make sure to answer with one word. \
Perhaps the review might be ambiguous sometimes.\n\n\
Example: great plot -> positive\n\
Example 2: terrible acting -> negative";

    fn test_config() -> OptimizerConfig {
        OptimizerConfig {
            population_size: 5,
            budget: 60,
            racing_threshold: 3,
            max_generations: 4,
            early_stopping_patience: 3,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_weights_fail_before_any_evaluation() {
        let calls = Arc::new(AtomicU32::new(0));
        let evaluator = CountingEvaluator {
            calls: Arc::clone(&calls),
        };
        let config = OptimizerConfig {
            weights: ObjectiveWeights {
                performance: 0.5,
                length: 0.2,
                cost: 0.2,
            },
            ..test_config()
        };
        assert!(Optimizer::new(config, evaluator).is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let config = OptimizerConfig {
            budget: 12,
            ..test_config()
        };
        let mut optimizer = Optimizer::new(config, LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");
        assert!(report.total_evaluations <= 12);
        assert_eq!(report.stats.stop_reason, StopReason::BudgetExhausted);
    }

    #[test]
    fn test_seed_is_scored_and_best_never_regresses() {
        let mut optimizer = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");

        assert_eq!(report.original_prompt, SEED_PROMPT);
        assert_eq!(report.seed.prompt, SEED_PROMPT);
        assert_eq!(report.seed.generation, 0);
        assert!(report.best.fitness >= report.seed.fitness);
        assert!(report.total_evaluations <= optimizer.config().budget);
        assert_eq!(optimizer.phase(), Phase::Terminated);
    }

    #[test]
    fn test_shorter_prompts_win_with_length_rewarding_evaluator() {
        let mut optimizer = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");
        assert!(report.best.length <= report.seed.length);
        assert!(report.length_reduction_pct >= 0.0);
        assert!(report.cost_reduction_pct >= 0.0);
    }

    #[test]
    fn test_identical_seeded_runs_are_identical() {
        let mut first = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let mut second = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report_a = first.optimize(SEED_PROMPT, "classification");
        let report_b = second.optimize(SEED_PROMPT, "classification");

        assert_eq!(report_a.best_prompt, report_b.best_prompt);
        let front_a: Vec<&str> = report_a.pareto_front.iter().map(|c| c.prompt.as_str()).collect();
        let front_b: Vec<&str> = report_b.pareto_front.iter().map(|c| c.prompt.as_str()).collect();
        assert_eq!(front_a, front_b);
        assert_eq!(report_a.total_evaluations, report_b.total_evaluations);
    }

    #[test]
    fn test_front_is_mutually_non_dominated() {
        let mut optimizer = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");
        for a in &report.pareto_front {
            for b in &report.pareto_front {
                if a.id == b.id {
                    continue;
                }
                let dominates = a.performance >= b.performance
                    && a.length <= b.length
                    && a.cost <= b.cost
                    && (a.performance > b.performance || a.length < b.length || a.cost < b.cost);
                assert!(!dominates, "front members {} and {} dominate", a.id, b.id);
            }
        }
    }

    #[test]
    fn test_history_evaluations_are_cumulative() {
        let mut optimizer = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");
        assert!(!report.history.is_empty());
        for pair in report.history.windows(2) {
            assert!(pair[1].evaluations >= pair[0].evaluations);
            assert_eq!(pair[1].generation, pair[0].generation + 1);
        }
        assert_eq!(report.iterations, report.history.len());
    }

    #[test]
    fn test_evaluator_failures_fall_back_and_are_recorded() {
        let config = OptimizerConfig {
            budget: 20,
            max_generations: 2,
            ..test_config()
        };
        let mut optimizer = Optimizer::new(config, AlwaysFailingEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");

        assert_eq!(report.best.performance, 0.0);
        let recorded: u32 = report.history.iter().map(|g| g.evaluator_failures).sum();
        assert!(recorded > 0);
        assert!(report.total_evaluations <= 20);
    }

    #[test]
    fn test_percentage_helpers_guard_zero_baseline() {
        assert_eq!(reduction_pct(0.01, 0.005), 50.0);
        assert_eq!(reduction_pct(0.0, 0.005), 0.0);
        assert!((improvement_pct(0.5, 0.6) - 20.0).abs() < 1e-9);
        assert_eq!(improvement_pct(0.0, 0.6), 0.0);
    }

    #[test]
    fn test_select_parents_prefers_front_then_fitness() {
        let mut population: Vec<Candidate> = (0..4)
            .map(|i| {
                let mut c = Candidate::new(i, format!("candidate {i}"), 0, vec![]);
                c.fitness = i as f64 / 10.0;
                c.performance = 0.5;
                c.length = 100;
                c.cost = 0.001;
                c
            })
            .collect();
        // Candidate 3 dominates the rest on performance.
        population[3].performance = 0.9;
        let front = pareto_front(&population);
        let parents = select_parents(&population, &front, 2);
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().any(|c| c.id == 3));
    }

    #[test]
    fn test_replacement_maintains_population_size() {
        let make = |id: u64, fitness: f64| {
            let mut c = Candidate::new(id, format!("candidate {id}"), 0, vec![]);
            c.fitness = fitness;
            c
        };
        let parents = vec![make(0, 0.9), make(1, 0.5)];
        let offspring = vec![make(2, 0.7), make(3, 0.2)];
        let previous = vec![make(0, 0.9), make(1, 0.5), make(4, 0.4)];

        let next = replace_population(parents, offspring, &previous, 3);
        assert_eq!(next.len(), 3);
        assert_eq!(next[0].id, 0);
        assert_eq!(next[1].id, 2);
        assert_eq!(next[2].id, 1);

        // Shortfall pads from the previous population.
        let padded = replace_population(vec![make(0, 0.9)], vec![], &previous, 3);
        assert_eq!(padded.len(), 3);
        assert!(padded.iter().any(|c| c.id == 4));
    }

    #[test]
    fn test_report_json_export() {
        let mut optimizer = Optimizer::new(test_config(), LengthEvaluator).unwrap();
        let report = optimizer.optimize(SEED_PROMPT, "classification");

        let dir = tempfile::tempdir().unwrap();
        let path = report.save(dir.path().join("report.json")).unwrap();
        let json = std::fs::read_to_string(path).unwrap();
        let parsed: OptimizationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.best_prompt, report.best_prompt);
        assert_eq!(parsed.history.len(), report.history.len());
    }
}
