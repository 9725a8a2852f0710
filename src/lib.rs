//! CAPO - Cost-aware prompt optimization.
//!
//! This crate provides an evolutionary optimizer over prompt artifacts
//! that jointly maximizes task performance while minimizing monetary cost
//! and artifact length.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, snapshot, and report types for runs
//! - `optimize`: The algorithmic core (candidates, operators, racing,
//!   Pareto front, generation loop)
//!
//! Scoring a candidate is delegated to an external [`Evaluator`]
//! collaborator; the optimizer itself never talks to a network or a
//! ledger. Each generation re-evaluates active candidates under a racing
//! policy, recomputes the Pareto front over (performance, length, cost),
//! and breeds the next population from the front plus the best of the
//! remainder, until the evaluation budget, generation cap, or stagnation
//! patience is exhausted.
//!
//! # Example
//!
//! ```rust,no_run
//! use capo::{Evaluation, Evaluator, EvalError, Optimizer, OptimizerConfig};
//!
//! struct MyEvaluator;
//!
//! impl Evaluator for MyEvaluator {
//!     fn evaluate(
//!         &self,
//!         prompt: &str,
//!         _task: &str,
//!         _dataset: Option<&str>,
//!     ) -> Result<Evaluation, EvalError> {
//!         // Call out to a model/backtest here.
//!         Ok(Evaluation {
//!             performance: 0.8,
//!             cost: 0.002,
//!             latency_ms: 120,
//!         })
//!     }
//! }
//!
//! let config = OptimizerConfig {
//!     random_seed: Some(42),
//!     ..Default::default()
//! };
//! let mut optimizer = Optimizer::new(config, MyEvaluator).expect("valid config");
//! let report = optimizer.optimize(
//!     "Please kindly classify the sentiment of the review.",
//!     "sentiment classification",
//! );
//!
//! println!("best prompt: {}", report.best_prompt);
//! println!("cost reduction: {:.1}%", report.cost_reduction_pct);
//! ```

pub mod optimize;
pub mod schema;

// Re-export commonly used types
pub use optimize::{EvalError, Evaluation, Evaluator, Optimizer, PromptParts};
pub use schema::{ConfigError, ObjectiveWeights, OptimizationReport, OptimizerConfig};
