//! Pareto dominance over (performance, length, cost).

use super::candidate::Candidate;

/// True when `a` dominates `b`: at least as good on every objective
/// (higher performance, lower length, lower cost) and strictly better on
/// at least one.
pub fn dominates(a: &Candidate, b: &Candidate) -> bool {
    let at_least_as_good =
        a.performance >= b.performance && a.length <= b.length && a.cost <= b.cost;
    let strictly_better =
        a.performance > b.performance || a.length < b.length || a.cost < b.cost;
    at_least_as_good && strictly_better
}

/// Indices of the non-dominated members of `population`, in population
/// order.
pub fn pareto_front(population: &[Candidate]) -> Vec<usize> {
    (0..population.len())
        .filter(|&i| {
            population
                .iter()
                .enumerate()
                .all(|(j, other)| j == i || !dominates(other, &population[i]))
        })
        .collect()
}
