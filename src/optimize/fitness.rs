//! Scalar fitness: weighted combination of the three normalized objectives.

use crate::schema::OptimizerConfig;

/// Normalized length objective: 1 at zero length, 0 at or beyond the scale.
pub fn norm_length(length: usize, length_scale: f64) -> f64 {
    (1.0 - length as f64 / length_scale).clamp(0.0, 1.0)
}

/// Normalized cost objective: 1 at zero cost, 0 at or beyond the scale.
pub fn norm_cost(cost: f64, cost_scale: f64) -> f64 {
    (1.0 - cost / cost_scale).clamp(0.0, 1.0)
}

/// Weighted fitness of one (performance, length, cost) triple.
///
/// The optional `length_penalty` subtracts an extra linear term on top of
/// the weighted length objective; it is zero by default.
pub fn fitness(performance: f64, length: usize, cost: f64, config: &OptimizerConfig) -> f64 {
    let weights = &config.weights;
    let weighted = weights.performance * performance.clamp(0.0, 1.0)
        + weights.length * norm_length(length, config.length_scale)
        + weights.cost * norm_cost(cost, config.cost_scale);
    weighted - config.length_penalty * (length as f64 / config.length_scale)
}
