//! The external evaluator contract and its failure-absorbing wrapper.

use log::warn;

/// One measurement of a candidate artifact.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    /// Task performance in [0, 1].
    pub performance: f64,
    /// Measured monetary cost in dollars, non-negative. Zero means the
    /// evaluator did not meter cost; the deterministic model fills in.
    pub cost: f64,
    /// Wall-clock latency of the evaluation.
    pub latency_ms: u64,
}

/// Evaluator failures. All variants are treated identically by the retry
/// wrapper; a timeout is just another failure.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation timed out")]
    Timeout,
    #[error("evaluator failed: {0}")]
    Failed(String),
    #[error("malformed evaluator response: {0}")]
    Malformed(String),
}

/// External collaborator that scores a candidate artifact.
///
/// Implementations may be stochastic; the optimizer never assumes two calls
/// with the same input agree. Implementations own their timeout policy and
/// surface expiry as [`EvalError::Timeout`].
pub trait Evaluator: Send + Sync {
    /// Score `prompt` against `task`, optionally on a named dataset.
    fn evaluate(
        &self,
        prompt: &str,
        task: &str,
        dataset: Option<&str>,
    ) -> Result<Evaluation, EvalError>;
}

/// A single measurement after retries, possibly the fallback.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Measurement {
    pub performance: f64,
    pub cost: f64,
    /// True when every attempt failed and the fallback score was used.
    pub failed: bool,
}

/// Retrying wrapper around the external evaluator.
///
/// A call that fails `retries + 1` times is absorbed into a fallback score
/// (performance 0, worst observed cost) instead of aborting the run.
pub(crate) struct ScoredEvaluator<'a> {
    evaluator: &'a dyn Evaluator,
    retries: u32,
}

impl<'a> ScoredEvaluator<'a> {
    pub fn new(evaluator: &'a dyn Evaluator, retries: u32) -> Self {
        Self { evaluator, retries }
    }

    /// Measure `prompt`, falling back to `fallback_cost` after exhausted
    /// retries. Performance is clamped to [0, 1] and cost to non-negative
    /// regardless of what the evaluator reports.
    pub fn measure(
        &self,
        prompt: &str,
        task: &str,
        dataset: Option<&str>,
        fallback_cost: f64,
    ) -> Measurement {
        let mut last_error = None;
        for _ in 0..=self.retries {
            match self.evaluator.evaluate(prompt, task, dataset) {
                Ok(evaluation) => {
                    return Measurement {
                        performance: evaluation.performance.clamp(0.0, 1.0),
                        cost: evaluation.cost.max(0.0),
                        failed: false,
                    };
                }
                Err(error) => last_error = Some(error),
            }
        }
        if let Some(error) = last_error {
            warn!("evaluator failed after {} retries: {error}", self.retries);
        }
        Measurement {
            performance: 0.0,
            cost: fallback_cost.max(0.0),
            failed: true,
        }
    }
}
