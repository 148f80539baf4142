//! Character-level cleanup of extraction artifacts.
//!
//! Upstream PDF extraction renders some math and punctuation glyphs as
//! unrelated Latin-1 characters (`¼` for `=`, `À` for a minus sign, ...).
//! The table of fixes depends on the extractor, so it is data, not code.
//!
//! Normalization is not idempotent in general: a substitution may produce
//! text that a pattern matches on a second pass.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One literal replacement, applied to every occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

impl Substitution {
    pub fn new(from: &str, to: &str) -> Self {
        Substitution {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Matches that look like `<digits>e<digits>` are extraction damage, not
/// scientific notation.
pub const DIGIT_E_DIGIT: &str = r"\d+e\d+";

pub fn default_substitutions() -> Vec<Substitution> {
    vec![
        Substitution::new("À", "-"),
        Substitution::new("¼", "="),
        Substitution::new("þ", "+"),
        Substitution::new("Â", "x"),
        Substitution::new("$", "~"),
        Substitution::new("−", "-"),
        Substitution::new("–", "-"),
    ]
}

pub fn default_patterns() -> Vec<String> {
    vec![DIGIT_E_DIGIT.to_string()]
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    substitutions: Vec<Substitution>,
    patterns: Vec<Regex>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            substitutions: default_substitutions(),
            patterns: vec![Regex::new(DIGIT_E_DIGIT).unwrap()],
        }
    }
}

impl Normalizer {
    /// Build from a substitution table and a list of pattern sources.
    /// An empty `from` or an invalid pattern is a configuration error.
    pub fn new(substitutions: Vec<Substitution>, patterns: &[String]) -> Result<Self> {
        if let Some(bad) = substitutions.iter().find(|s| s.from.is_empty()) {
            return Err(Error::configuration(format!(
                "substitution to {:?} has an empty source string",
                bad.to
            )));
        }
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| Error::configuration(format!("invalid pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Normalizer {
            substitutions,
            patterns,
        })
    }

    /// Apply the substitution table in order, then rewrite `e` to `-` inside
    /// every pattern match.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = text.to_string();
        for sub in &self.substitutions {
            if out.contains(sub.from.as_str()) {
                out = out.replace(sub.from.as_str(), &sub.to);
            }
        }
        for re in &self.patterns {
            out = re
                .replace_all(&out, |caps: &regex::Captures| caps[0].replace('e', "-"))
                .into_owned();
        }
        out
    }
}
