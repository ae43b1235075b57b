//! Stateless line transforms: pass-through and regular-expression replace.

use crate::error::Result;
use crate::stage::{LineTransform, Stage};
use regex::Regex;

/// Forwards every line unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl LineTransform for PassThrough {
    fn transform(&mut self, line: &str) -> Result<Vec<String>> {
        Ok(vec![line.to_string()])
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Replaces every non-overlapping match of a pattern in each line.
///
/// The replacement uses `regex` template syntax: `$1` or `${1}` for
/// positional groups, `${name}` for named groups and `$$` for a literal
/// dollar. Write `${1}x` rather than `$1x` when a group is followed by
/// identifier characters.
#[derive(Debug, Clone)]
pub struct PatternReplacer {
    pattern: Regex,
    replacement: String,
}

impl PatternReplacer {
    /// Compile `pattern`; an invalid expression is reported here, before
    /// any stage can start.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Get the pattern source
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Get the replacement template
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Apply the substitution to one line
    pub fn apply(&self, line: &str) -> String {
        self.pattern
            .replace_all(line, self.replacement.as_str())
            .into_owned()
    }
}

impl LineTransform for PatternReplacer {
    fn transform(&mut self, line: &str) -> Result<Vec<String>> {
        Ok(vec![self.apply(line)])
    }

    fn name(&self) -> &str {
        "pattern-replace"
    }
}

/// Create a pass-through stage with a single output
pub fn pass_through(name: impl Into<String>) -> Stage<PassThrough> {
    Stage::new(name, PassThrough)
}

/// Create a pattern-replace stage
pub fn pattern_replace(
    name: impl Into<String>,
    pattern: &str,
    replacement: impl Into<String>,
) -> Result<Stage<PatternReplacer>> {
    Ok(Stage::new(name, PatternReplacer::new(pattern, replacement)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_replaces_every_match() {
        let replacer = PatternReplacer::new("world", "mum").unwrap();
        assert_eq!(
            replacer.apply("hello world! goodbye cruel world, goodbye!"),
            "hello mum! goodbye cruel mum, goodbye!"
        );
    }

    #[test]
    fn test_no_match_unchanged() {
        let replacer = PatternReplacer::new("world", "mum").unwrap();
        assert_eq!(replacer.apply("nothing here"), "nothing here");
    }

    #[test]
    fn test_positional_groups() {
        let replacer = PatternReplacer::new("(.*)[Dd]inn(.*)", "${1}Smith${2}").unwrap();
        assert_eq!(replacer.apply("adinn: Andrew Dinn, ok"), "adinn: Andrew Smith, ok");
    }

    #[test]
    fn test_character_class() {
        let mut replacer = PatternReplacer::new("[Aa]ndrew", "Michael").unwrap();
        let out = replacer.transform("andrew and Andrew").unwrap();
        assert_eq!(out, vec!["Michael and Michael".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PatternReplacer::new("(unclosed", "x").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPattern(_)));
        assert!(pattern_replace("bad", "[", "x").is_err());
    }
}
