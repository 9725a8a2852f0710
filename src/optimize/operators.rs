//! Mutation and crossover operators over prompt artifacts.
//!
//! All randomness flows through [`PromptRng`], a seeded wrapper; the
//! operators themselves are deterministic text rewrites.

use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use crate::schema::OptimizerConfig;

use super::prompt::PromptParts;

/// Seeded random number source for operator selection and reproduction.
pub struct PromptRng {
    rng: StdRng,
}

impl PromptRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with an entropy seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Bernoulli draw with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p)
    }

    /// Uniform index into `0..len`.
    pub fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Pick a mutation operator uniformly.
    pub fn pick_op(&mut self) -> MutationOp {
        *OPERATORS.choose(&mut self.rng).unwrap_or(&MutationOp::RewriteInstructions)
    }

    /// Pick a mutation operator other than `not`.
    pub fn pick_other_op(&mut self, not: MutationOp) -> MutationOp {
        let remaining: Vec<MutationOp> = OPERATORS.iter().copied().filter(|op| *op != not).collect();
        *remaining.choose(&mut self.rng).unwrap_or(&not)
    }

    /// Generate the next u64, for seeding or hashing.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// The available mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    /// Strip filler and hedging language from the instruction text.
    RewriteInstructions,
    /// Apply the same simplification to each few-shot example.
    TightenExamples,
    /// Drop hedging sentences across the artifact, bounded by the
    /// configured minimum length ratio.
    ReduceLength,
    /// Lossless abbreviation and contraction substitutions.
    AbbreviateCost,
    /// Canonical-verb rewrites keyed on the task description.
    RewriteForTask,
}

/// All operators, in selection order.
pub const OPERATORS: [MutationOp; 5] = [
    MutationOp::RewriteInstructions,
    MutationOp::TightenExamples,
    MutationOp::ReduceLength,
    MutationOp::AbbreviateCost,
    MutationOp::RewriteForTask,
];

/// Attempts before a degenerate mutation gives up and keeps the parent.
const DEGENERATE_RETRIES: usize = 3;

/// Filler and politeness phrases removed by the rewrite operators. Pairs
/// with a non-empty right side are replacements rather than deletions.
const FILLER_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("i would like you to", ""),
    ("it would be great if you could", ""),
    ("i want you to", ""),
    ("if possible,", ""),
    ("feel free to", ""),
    ("go ahead and", ""),
    ("make sure to", ""),
    ("be sure to", ""),
    ("remember to", ""),
    ("please", ""),
    ("kindly", ""),
    ("very", ""),
    ("really", ""),
    ("quite", ""),
    ("simply", ""),
    ("basically", ""),
    ("actually", ""),
    ("in order to", "to"),
    ("as well as", "and"),
];

/// Lossless abbreviation and contraction table, longest match first.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("as soon as possible", "ASAP"),
    ("that is to say", "i.e."),
    ("with respect to", "w.r.t."),
    ("for example", "e.g."),
    ("for instance", "e.g."),
    ("and so on", "etc."),
    ("that is", "i.e."),
    ("approximately", "approx."),
    ("documentation", "docs"),
    ("configuration", "config"),
    ("specification", "spec"),
    ("information", "info"),
    ("maximum", "max"),
    ("minimum", "min"),
    ("does not", "doesn't"),
    ("do not", "don't"),
    ("cannot", "can't"),
    ("it is", "it's"),
    ("you are", "you're"),
    ("versus", "vs."),
];

/// Sentence-level hedging markers for the length-reduction operator.
const HEDGE_MARKERS: &[&str] = &[
    "perhaps",
    "maybe",
    "might",
    "possibly",
    "i think",
    "i believe",
    "it seems",
    "arguably",
    "in my opinion",
    "generally speaking",
    "note that",
    "keep in mind",
];

const CLASSIFICATION_REWRITES: &[(&str, &str)] = &[
    ("determine the category of", "classify"),
    ("identify the category of", "classify"),
    ("decide which category applies to", "classify"),
    ("assign a label to", "label"),
];

const SUMMARIZATION_REWRITES: &[(&str, &str)] = &[
    ("provide a summary of", "summarize"),
    ("give a brief overview of", "summarize"),
    ("write a short summary of", "summarize"),
];

const GENERATION_REWRITES: &[(&str, &str)] = &[
    ("come up with", "generate"),
    ("produce a piece of text about", "write about"),
    ("craft a response to", "answer"),
];

const TRANSLATION_REWRITES: &[(&str, &str)] = &[
    ("convert the following text into", "translate to"),
    ("rewrite the text in", "translate to"),
];

const GENERIC_REWRITES: &[(&str, &str)] = &[
    ("carry out the following task", "do the task"),
    ("your task is to", ""),
];

/// Substitution table for the task-aware operator, keyed on keywords in
/// the task description.
fn task_rewrites(task: &str) -> &'static [(&'static str, &'static str)] {
    let task = task.to_ascii_lowercase();
    if task.contains("classif") {
        CLASSIFICATION_REWRITES
    } else if task.contains("summar") {
        SUMMARIZATION_REWRITES
    } else if task.contains("translat") {
        TRANSLATION_REWRITES
    } else if task.contains("generat") || task.contains("writ") {
        GENERATION_REWRITES
    } else {
        GENERIC_REWRITES
    }
}

/// Apply one mutation operator to `text`.
pub fn mutate(text: &str, task: &str, op: MutationOp, config: &OptimizerConfig) -> String {
    match op {
        MutationOp::RewriteInstructions => {
            let mut parts = PromptParts::parse(text);
            parts.instructions = apply_substitutions(&parts.instructions, FILLER_SUBSTITUTIONS);
            parts.render()
        }
        MutationOp::TightenExamples => {
            let mut parts = PromptParts::parse(text);
            for example in &mut parts.examples {
                *example = apply_substitutions(example, FILLER_SUBSTITUTIONS);
            }
            parts.render()
        }
        MutationOp::ReduceLength => reduce_length(text, config.min_length_ratio),
        MutationOp::AbbreviateCost => apply_substitutions(text, ABBREVIATIONS),
        MutationOp::RewriteForTask => apply_substitutions(text, task_rewrites(task)),
    }
}

/// Mutate with degenerate-output protection: an empty or whitespace-only
/// result triggers a retry with a different operator, and the parent text
/// is kept unchanged once the retries are spent.
pub(crate) fn mutate_checked(
    text: &str,
    task: &str,
    rng: &mut PromptRng,
    config: &OptimizerConfig,
) -> String {
    let mut op = rng.pick_op();
    for _ in 0..DEGENERATE_RETRIES {
        let mutated = mutate(text, task, op, config);
        if !mutated.trim().is_empty() {
            return mutated;
        }
        warn!("operator {op:?} produced a degenerate artifact, retrying");
        op = rng.pick_other_op(op);
    }
    text.to_string()
}

/// Recombine two parents into two children.
///
/// Instructions are concatenated in both orders; examples are merged
/// (first parent leading) and truncated to `max_examples`.
pub fn crossover(a: &PromptParts, b: &PromptParts, max_examples: usize) -> (String, String) {
    let child_a = PromptParts {
        instructions: join_instructions(&a.instructions, &b.instructions),
        examples: merge_examples(&a.examples, &b.examples, max_examples),
    };
    let child_b = PromptParts {
        instructions: join_instructions(&b.instructions, &a.instructions),
        examples: merge_examples(&b.examples, &a.examples, max_examples),
    };
    (child_a.render(), child_b.render())
}

fn join_instructions(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}\n{second}"),
    }
}

fn merge_examples(first: &[String], second: &[String], max_examples: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(max_examples);
    for example in first.iter().chain(second.iter()) {
        if !merged.contains(example) {
            merged.push(example.clone());
        }
        if merged.len() == max_examples {
            break;
        }
    }
    merged
}

/// Case-insensitive substring search from `from`. The needle must be
/// ASCII, which keeps every match a valid char boundary.
fn find_ci(hay: &str, needle: &str, from: usize) -> Option<usize> {
    let h = hay.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() || from > h.len() - n.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Replace every word-boundary occurrence of `from` with `to`,
/// case-insensitively.
fn replace_all_ci(text: &str, from: &str, to: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut search = 0;
    while let Some(pos) = find_ci(text, from, search) {
        let end = pos + from.len();
        let boundary_before = pos == 0 || !is_word_byte(bytes[pos - 1]);
        let boundary_after = end == bytes.len() || !is_word_byte(bytes[end]);
        if boundary_before && boundary_after {
            out.push_str(&text[cursor..pos]);
            out.push_str(to);
            cursor = end;
            search = end;
        } else {
            search = pos + 1;
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Apply a substitution table, then tidy the whitespace and punctuation
/// left behind by deletions.
fn apply_substitutions(text: &str, table: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (from, to) in table {
        out = replace_all_ci(&out, from, to);
    }
    tidy_whitespace(&out)
}

fn is_clause_punct(c: char) -> bool {
    matches!(c, ',' | '.' | ';' | ':' | '!' | '?')
}

/// Collapse space runs, strip spaces before punctuation, and drop the
/// stray commas deletions leave at clause ends.
fn tidy_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line_start = out.len();
        let mut last_space = true;
        for c in line.chars() {
            if c == ' ' || c == '\t' {
                if !last_space {
                    out.push(' ');
                    last_space = true;
                }
                continue;
            }
            if is_clause_punct(c) {
                while out.ends_with(' ') {
                    out.pop();
                }
                if c == '.' && (out.ends_with(',') || out.ends_with(';')) {
                    out.pop();
                }
                if out.len() == line_start {
                    // Line reduced to bare punctuation; drop it.
                    continue;
                }
            }
            out.push(c);
            last_space = false;
        }
        while out.ends_with(' ') {
            out.pop();
        }
    }
    out.trim().to_string()
}

/// Drop hedging sentences, never shrinking below `min_ratio` of the
/// original character count.
fn reduce_length(text: &str, min_ratio: f64) -> String {
    let original_len = text.chars().count();
    let floor = (original_len as f64 * min_ratio).ceil() as usize;
    let mut remaining = original_len;

    let mut out_lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let mut kept: Vec<&str> = Vec::new();
        for sentence in split_sentences(line) {
            let len = sentence.chars().count();
            if contains_hedge(sentence) && remaining >= len && remaining - len >= floor {
                remaining -= len;
            } else {
                kept.push(sentence);
            }
        }
        out_lines.push(kept.join(" "));
    }

    let reduced = out_lines.join("\n").trim().to_string();
    if reduced.is_empty() {
        text.to_string()
    } else {
        reduced
    }
}

/// Split a line into sentence-ish segments, terminators included.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = line.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let at_break = matches!(c, '.' | '!' | '?')
            && iter.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_break {
            let end = i + c.len_utf8();
            let sentence = line[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn contains_hedge(sentence: &str) -> bool {
    HEDGE_MARKERS.iter().any(|marker| {
        let mut search = 0;
        while let Some(pos) = find_ci(sentence, marker, search) {
            let bytes = sentence.as_bytes();
            let end = pos + marker.len();
            let before = pos == 0 || !is_word_byte(bytes[pos - 1]);
            let after = end == bytes.len() || !is_word_byte(bytes[end]);
            if before && after {
                return true;
            }
            search = pos + 1;
        }
        false
    })
}
