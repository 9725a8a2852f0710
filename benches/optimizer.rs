//! Benchmarks for full optimization runs against an in-process evaluator.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use capo::{EvalError, Evaluation, Evaluator, Optimizer, OptimizerConfig};

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
            latency_ms: 0,
        })
    }
}

const SEED_PROMPT: &str = "Please kindly classify the sentiment of the given review. \
It would be great if you could make sure to answer with one word. \
Perhaps the review might be ambiguous sometimes.\n\n\
Example: great plot -> positive\n\
Example 2: terrible acting -> negative";

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");

    for population_size in [5, 10, 20] {
        let config = OptimizerConfig {
            population_size,
            budget: (population_size as u64) * 12,
            max_generations: 8,
            random_seed: Some(42),
            ..Default::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("population_{population_size}")),
            &config,
            |b, config| {
                b.iter(|| {
                    let mut optimizer =
                        Optimizer::new(config.clone(), LengthEvaluator).expect("valid config");
                    black_box(optimizer.optimize(SEED_PROMPT, "sentiment classification"));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
