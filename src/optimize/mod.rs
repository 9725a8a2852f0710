//! Optimization core: candidates, operators, racing, Pareto front, and
//! the generation-loop engine.
//!
//! # Overview
//!
//! The optimizer searches a space of prompt artifacts to jointly maximize
//! task performance while minimizing monetary cost and artifact length:
//!
//! - **Candidates** (`candidate`): structured artifacts plus measured
//!   objectives.
//! - **Operators** (`operators`): seeded mutation and crossover over
//!   instruction text and few-shot examples.
//! - **Racing** (`racing`): budget-capped re-evaluation with heuristic
//!   early deactivation of underperformers.
//! - **Pareto front** (`pareto`): the non-dominated subset of the
//!   population, recomputed every generation.
//! - **Engine** (`engine`): the generation loop, from seeding through
//!   termination and report assembly.
//!
//! The only external collaborator is the [`Evaluator`] trait; the core
//! never performs I/O of its own beyond optional report export.

mod candidate;
mod engine;
mod evaluator;
mod fitness;
mod operators;
mod pareto;
mod prompt;
mod racing;

pub use candidate::{Candidate, estimated_tokens, model_cost};
pub use engine::Optimizer;
pub use evaluator::{EvalError, Evaluation, Evaluator};
pub use fitness::{fitness, norm_cost, norm_length};
pub use operators::{MutationOp, OPERATORS, PromptRng, crossover, mutate};
pub use pareto::{dominates, pareto_front};
pub use prompt::PromptParts;
