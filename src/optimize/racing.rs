//! Racing scheduler: budget-capped evaluation with early deactivation.
//!
//! Candidates below the racing threshold keep consuming evaluation budget;
//! once a candidate reaches it, its spend is capped and it is measured
//! against the population baseline. The baseline is a plain mean over all
//! threshold-reached candidates with a fixed 0.8 factor — a heuristic
//! early-stopping policy, not a sequential significance test.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::debug;
use rayon::prelude::*;

use crate::schema::OptimizerConfig;

use super::candidate::{Candidate, model_cost};
use super::evaluator::ScoredEvaluator;
use super::fitness::fitness;

/// A candidate is deactivated when its performance falls below this
/// fraction of the matured-population mean.
const DEACTIVATION_FACTOR: f64 = 0.8;

/// Result of one racing round.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RacingOutcome {
    /// Evaluator calls issued this round.
    pub evaluations: u64,
    /// Calls that fell back after exhausted retries.
    pub failures: u32,
    /// Candidates deactivated this round.
    pub deactivated: usize,
}

/// Evaluate every candidate matching `pending`, in population order, up to
/// the remaining budget.
///
/// The batch is dispatched in parallel and joined before returning, so
/// generation boundaries stay deterministic. The shared counter is bumped
/// atomically once per issued call; calls beyond the budget cap are never
/// issued and their candidates keep their pre-batch scores.
pub(crate) fn evaluate_batch<F>(
    population: &mut [Candidate],
    pending: F,
    scorer: &ScoredEvaluator<'_>,
    task: &str,
    dataset: Option<&str>,
    counter: &AtomicU64,
    config: &OptimizerConfig,
) -> (u64, u32)
where
    F: Fn(&Candidate) -> bool,
{
    let slots = config.budget.saturating_sub(counter.load(Ordering::Acquire)) as usize;
    if slots == 0 {
        return (0, 0);
    }

    let mut chosen = vec![false; population.len()];
    let mut selected = 0usize;
    for (i, candidate) in population.iter().enumerate() {
        if selected == slots {
            break;
        }
        if pending(candidate) {
            chosen[i] = true;
            selected += 1;
        }
    }
    if selected == 0 {
        return (0, 0);
    }

    // Worst cost observed so far, used as the fallback for failed calls.
    let worst_cost = population
        .iter()
        .map(|c| c.cost)
        .fold(0.0f64, f64::max);

    let failures = AtomicU32::new(0);
    population
        .par_iter_mut()
        .enumerate()
        .filter(|(i, _)| chosen[*i])
        .for_each(|(_, candidate)| {
            let measurement = scorer.measure(&candidate.text, task, dataset, worst_cost);
            counter.fetch_add(1, Ordering::AcqRel);
            if measurement.failed {
                failures.fetch_add(1, Ordering::Relaxed);
            }

            candidate.performance = measurement.performance;
            candidate.cost = if measurement.cost > 0.0 {
                measurement.cost
            } else {
                model_cost(&candidate.text, config.cost_per_token)
            };
            candidate.length = candidate.text.chars().count();
            candidate.fitness = fitness(
                candidate.performance,
                candidate.length,
                candidate.cost,
                config,
            );
            candidate.evaluation_count += 1;
        });

    (selected as u64, failures.load(Ordering::Relaxed))
}

/// Run one racing round: re-evaluate every active candidate still below
/// the threshold, then deactivate matured underperformers.
pub(crate) fn racing_round(
    population: &mut [Candidate],
    scorer: &ScoredEvaluator<'_>,
    task: &str,
    dataset: Option<&str>,
    counter: &AtomicU64,
    config: &OptimizerConfig,
) -> RacingOutcome {
    let threshold = config.racing_threshold;
    let (evaluations, failures) = evaluate_batch(
        population,
        |c| c.is_active && c.evaluation_count < threshold,
        scorer,
        task,
        dataset,
        counter,
        config,
    );

    let matured: Vec<f64> = population
        .iter()
        .filter(|c| c.evaluation_count >= threshold)
        .map(|c| c.performance)
        .collect();

    let mut deactivated = 0;
    if !matured.is_empty() {
        let baseline = matured.iter().sum::<f64>() / matured.len() as f64;
        let cutoff = DEACTIVATION_FACTOR * baseline;
        for candidate in population.iter_mut() {
            if candidate.is_active
                && candidate.evaluation_count >= threshold
                && candidate.performance < cutoff
            {
                candidate.is_active = false;
                deactivated += 1;
                debug!(
                    "deactivated candidate {} (performance {:.3} < cutoff {:.3})",
                    candidate.id, candidate.performance, cutoff
                );
            }
        }
    }

    RacingOutcome {
        evaluations,
        failures,
        deactivated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::evaluator::{EvalError, Evaluation, Evaluator};

    /// Deterministic evaluator keyed on the trailing digit of the prompt.
    struct DigitEvaluator {
        scores: Vec<f64>,
    }

    impl Evaluator for DigitEvaluator {
        fn evaluate(
            &self,
            prompt: &str,
            _task: &str,
            _dataset: Option<&str>,
        ) -> Result<Evaluation, EvalError> {
            let digit = prompt
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .ok_or_else(|| EvalError::Malformed("no id digit".to_string()))?;
            Ok(Evaluation {
                performance: self.scores[digit as usize],
                cost: 0.0,
                latency_ms: 1,
            })
        }
    }

    fn population(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate::new(i as u64, format!("prompt variant {i}"), 0, vec![]))
            .collect()
    }

    fn config(budget: u64, racing_threshold: u32) -> OptimizerConfig {
        OptimizerConfig {
            population_size: 5,
            budget,
            racing_threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_underperformer_is_deactivated_within_budget() {
        let evaluator = DigitEvaluator {
            scores: vec![0.9, 0.85, 0.9, 0.88, 0.1],
        };
        let scorer = ScoredEvaluator::new(&evaluator, 0);
        let config = config(20, 3);
        let counter = AtomicU64::new(0);
        let mut pop = population(5);

        for _ in 0..3 {
            racing_round(&mut pop, &scorer, "task", None, &counter, &config);
        }

        assert!(counter.load(Ordering::Relaxed) <= 20);
        assert!(!pop[4].is_active);
        assert!(pop[..4].iter().all(|c| c.is_active));
    }

    #[test]
    fn test_no_reevaluation_past_threshold() {
        let evaluator = DigitEvaluator {
            scores: vec![0.5, 0.5, 0.5, 0.5, 0.5],
        };
        let scorer = ScoredEvaluator::new(&evaluator, 0);
        let config = config(100, 2);
        let counter = AtomicU64::new(0);
        let mut pop = population(5);

        for _ in 0..5 {
            racing_round(&mut pop, &scorer, "task", None, &counter, &config);
        }

        // 5 candidates x 2 evaluations, then nothing further.
        assert_eq!(counter.load(Ordering::Relaxed), 10);
        assert!(pop.iter().all(|c| c.evaluation_count == 2));
    }

    #[test]
    fn test_budget_caps_the_batch_in_population_order() {
        let evaluator = DigitEvaluator {
            scores: vec![0.5; 10],
        };
        let scorer = ScoredEvaluator::new(&evaluator, 0);
        let config = config(3, 1);
        let counter = AtomicU64::new(0);
        let mut pop = population(5);

        racing_round(&mut pop, &scorer, "task", None, &counter, &config);

        assert_eq!(counter.load(Ordering::Relaxed), 3);
        assert!(pop[..3].iter().all(|c| c.evaluation_count == 1));
        assert!(pop[3..].iter().all(|c| c.evaluation_count == 0));
    }

    #[test]
    fn test_model_cost_fills_in_when_unmetered() {
        let evaluator = DigitEvaluator {
            scores: vec![0.5; 10],
        };
        let scorer = ScoredEvaluator::new(&evaluator, 0);
        let config = config(10, 1);
        let counter = AtomicU64::new(0);
        let mut pop = population(2);

        racing_round(&mut pop, &scorer, "task", None, &counter, &config);

        for candidate in &pop {
            let expected = model_cost(&candidate.text, config.cost_per_token);
            assert!((candidate.cost - expected).abs() < 1e-12);
        }
    }
}
