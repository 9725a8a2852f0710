//! Candidate artifacts and the deterministic cost model.

use crate::schema::CandidateSnapshot;

use super::prompt::PromptParts;

/// Characters per estimated token. The cost model's single unit is
/// estimated tokens; dollar cost is `tokens * cost_per_token`.
const CHARS_PER_TOKEN: usize = 4;

/// A candidate artifact under optimization, with its measured objectives.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier within the run.
    pub id: u64,
    /// Full rendered artifact.
    pub text: String,
    /// Structural split of `text`.
    pub parts: PromptParts,
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
    /// False once the racing scheduler stopped spending budget on it. An
    /// inactive candidate is never re-evaluated but may still be selected
    /// as a parent.
    pub is_active: bool,
    /// Generation this candidate was created in.
    pub generation: usize,
    /// Parent candidate ids.
    pub parents: Vec<u64>,
}

impl Candidate {
    /// Create an unevaluated candidate from raw text.
    ///
    /// Scores start at their fallback values; the engine applies the first
    /// measurement and fitness.
    pub fn new(id: u64, text: String, generation: usize, parents: Vec<u64>) -> Self {
        let parts = PromptParts::parse(&text);
        let length = text.chars().count();
        Self {
            id,
            text,
            parts,
            performance: 0.0,
            cost: 0.0,
            length,
            fitness: 0.0,
            evaluation_count: 0,
            is_active: true,
            generation,
            parents,
        }
    }

    /// Estimated token count of this candidate's text.
    pub fn estimated_tokens(&self) -> u64 {
        estimated_tokens(&self.text)
    }

    /// Deterministic model cost of this candidate's text, in dollars.
    pub fn model_cost(&self, cost_per_token: f64) -> f64 {
        model_cost(&self.text, cost_per_token)
    }

    /// Serializable view of the current state.
    pub fn to_snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id,
            prompt: self.text.clone(),
            instructions: self.parts.instructions.clone(),
            examples: self.parts.examples.clone(),
            performance: self.performance,
            cost: self.cost,
            length: self.length,
            fitness: self.fitness,
            evaluation_count: self.evaluation_count,
            active: self.is_active,
            generation: self.generation,
            parents: self.parents.clone(),
        }
    }
}

/// Estimated token count: ceil(chars / 4).
pub fn estimated_tokens(text: &str) -> u64 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Deterministic dollar cost keyed on estimated token count.
pub fn model_cost(text: &str, cost_per_token: f64) -> f64 {
    estimated_tokens(text) as f64 * cost_per_token
}
