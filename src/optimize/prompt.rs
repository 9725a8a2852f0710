//! Structural split of a prompt artifact into instructions and examples.
//!
//! The split is a bounded line-based contract, not a grammar: a line whose
//! head matches a recognized example marker (`Example`, `Example 2:`,
//! `Input:`, `Q:`, case-insensitive) starts an example block that runs to
//! the next blank line or the next marker; every other line is instruction
//! text. Markers buried inside prose are not distinguished, and exotic
//! few-shot layouts collapse into instruction text.

/// A prompt artifact split into its instructional text and its ordered
/// few-shot examples.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromptParts {
    /// Free instruction text, with example blocks removed.
    pub instructions: String,
    /// Example bodies, marker stripped, in document order.
    pub examples: Vec<String>,
}

/// Line heads that start an example block.
const EXAMPLE_MARKERS: &[&str] = &["example", "input:", "q:"];

/// If `line` starts an example block, return the offset of its body.
fn example_body_offset(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    for marker in EXAMPLE_MARKERS {
        if !starts_with_ignore_ascii_case(trimmed, marker) {
            continue;
        }
        let mut rest = &trimmed[marker.len()..];
        if *marker == "example" {
            // Accept "Example:", "Example 3:", "Example-", but not
            // "Examples are useful" prose.
            let digits = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits > 0 {
                let skipped = rest.len() - rest.trim_start().len() + digits;
                rest = &rest[skipped..];
            }
            match rest.chars().next() {
                Some(':') | Some('-') => rest = &rest[1..],
                _ => continue,
            }
        }
        return Some(indent + trimmed.len() - rest.len());
    }
    None
}

fn starts_with_ignore_ascii_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

impl PromptParts {
    /// Split `text` into instructions and examples.
    pub fn parse(text: &str) -> Self {
        let mut instructions = String::new();
        let mut examples: Vec<String> = Vec::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            if let Some(offset) = example_body_offset(line) {
                if let Some(block) = current.take() {
                    push_example(&mut examples, block);
                }
                current = Some(line[offset..].trim().to_string());
            } else if line.trim().is_empty() {
                if let Some(block) = current.take() {
                    push_example(&mut examples, block);
                }
            } else if let Some(block) = &mut current {
                if !block.is_empty() {
                    block.push('\n');
                }
                block.push_str(line.trim());
            } else {
                if !instructions.is_empty() {
                    instructions.push('\n');
                }
                instructions.push_str(line.trim_end());
            }
        }
        if let Some(block) = current.take() {
            push_example(&mut examples, block);
        }

        Self {
            instructions: instructions.trim().to_string(),
            examples,
        }
    }

    /// Rebuild the full artifact text: instructions, a blank line, then one
    /// `Example:` block per example.
    pub fn render(&self) -> String {
        let mut text = self.instructions.trim().to_string();
        for example in &self.examples {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str("Example: ");
            text.push_str(example.trim());
        }
        text
    }
}

fn push_example(examples: &mut Vec<String>, block: String) {
    let block = block.trim().to_string();
    if !block.is_empty() {
        examples.push(block);
    }
}
