//! Personality trait parsers.

use tracing::warn;

use super::types::{PersonalityTraits, TraitFormat, TraitValue};

pub trait TraitParser: Send + Sync {
    fn parse(&self, instructions: &str) -> PersonalityTraits;
}

/// Parser for the given format.
pub fn parser_for(format: TraitFormat) -> Box<dyn TraitParser> {
    match format {
        TraitFormat::Heuristic => Box::new(HeuristicTraitParser),
        TraitFormat::Structured => Box::new(StructuredTraitParser),
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

// ─────────────────────────────────────────────────────────────────
// Heuristic
// ─────────────────────────────────────────────────────────────────

/// Bullet list following a line that mentions "personality" or "traits".
///
/// Collection stops at the first line that is not blank, not a heading
/// and not a bullet. Malformed or missing sections yield no traits.
pub struct HeuristicTraitParser;

impl TraitParser for HeuristicTraitParser {
    fn parse(&self, instructions: &str) -> PersonalityTraits {
        let mut traits = PersonalityTraits::new();
        let mut collecting = false;

        for line in instructions.lines() {
            let line = line.trim();
            let lower = line.to_lowercase();

            if lower.contains("personality") || lower.contains("traits") {
                collecting = true;
                continue;
            }
            if !collecting || is_rule(line) {
                continue;
            }

            if let Some(item) = strip_bullet(line) {
                match item.split_once(':') {
                    Some((key, value)) => {
                        traits.insert(normalize_key(key), TraitValue::Text(value.trim().to_string()));
                    }
                    None => {
                        traits.insert(normalize_key(item), TraitValue::Flag(true));
                    }
                }
            } else if !line.is_empty() && !line.starts_with('#') {
                break;
            }
        }

        traits.retain(|k, _| !k.is_empty());
        traits
    }
}

/// Markdown horizontal rule
fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

fn strip_bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .or_else(|| line.strip_prefix('-'))
        .map(str::trim)
}

// ─────────────────────────────────────────────────────────────────
// Structured
// ─────────────────────────────────────────────────────────────────

/// TOML inside a fenced block tagged `traits`:
///
/// ````text
/// ```traits
/// tone = "warm"
/// proactive = true
/// ```
/// ````
pub struct StructuredTraitParser;

impl StructuredTraitParser {
    fn block(instructions: &str) -> Option<String> {
        let mut lines = instructions.lines();
        lines.find(|l| {
            let l = l.trim();
            l.starts_with("```") && l.trim_start_matches('`').trim() == "traits"
        })?;

        let body: Vec<&str> = lines.take_while(|l| !l.trim().starts_with("```")).collect();
        Some(body.join("\n"))
    }
}

impl TraitParser for StructuredTraitParser {
    fn parse(&self, instructions: &str) -> PersonalityTraits {
        let Some(block) = Self::block(instructions) else {
            return PersonalityTraits::new();
        };

        let table: toml::Table = match toml::from_str(&block) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e.message(), "Ignoring malformed traits block");
                return PersonalityTraits::new();
            }
        };

        table
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::Boolean(b) => TraitValue::Flag(b),
                    toml::Value::String(s) => TraitValue::Text(s),
                    other => TraitValue::Text(other.to_string()),
                };
                (normalize_key(&key), value)
            })
            .collect()
    }
}
