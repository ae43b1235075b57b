//! The two halves of the binding race: a binder that records pattern
//! matches in a [`BindingTable`], and a replacer that resolves `${id}`
//! references against the same table.
//!
//! The stages run on separate threads, so whether a reference resolves
//! depends only on whether the binder has already handled the line that
//! binds it. That outcome is left to scheduling on purpose.

use crate::binding::BindingTable;
use crate::error::Result;
use crate::stage::{LineTransform, Stage};
use regex::{Captures, Match, Regex};
use std::sync::Arc;

/// What a binder does with the text it matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Record bindings and forward the line unchanged
    #[default]
    Observe,
    /// Record bindings and replace each bound span with its `${id}` reference
    Insert,
}

/// Binds the value captured by each match of a pattern.
///
/// The bound value is capture group 1, or the whole match when the pattern
/// has no groups. Matches where that span is empty or absent bind nothing.
#[derive(Debug, Clone)]
pub struct Binder {
    pattern: Regex,
    prefix: String,
    table: Arc<BindingTable>,
    mode: BindMode,
}

impl Binder {
    /// Create a binder for `pattern`, allocating identifiers under `prefix`
    pub fn new(
        pattern: &str,
        prefix: impl Into<String>,
        table: Arc<BindingTable>,
        mode: BindMode,
    ) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            prefix: prefix.into(),
            table,
            mode,
        })
    }

    /// Get the identifier prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Get the bind mode
    pub fn mode(&self) -> BindMode {
        self.mode
    }

    /// Get a reference to the shared binding table
    pub fn table(&self) -> &Arc<BindingTable> {
        &self.table
    }

    fn bound_span<'h>(&self, caps: &Captures<'h>) -> Option<Match<'h>> {
        let span = if self.pattern.captures_len() > 1 {
            caps.get(1)
        } else {
            caps.get(0)
        };
        span.filter(|m| !m.is_empty())
    }

    /// Bind every match in `line` and return the line to forward
    pub fn apply(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut last = 0;

        for caps in self.pattern.captures_iter(line) {
            let Some(span) = self.bound_span(&caps) else {
                continue;
            };
            let id = self.table.allocate_or_get(&self.prefix, span.as_str());
            if self.mode == BindMode::Insert {
                out.push_str(&line[last..span.start()]);
                out.push_str("${");
                out.push_str(&id);
                out.push('}');
                last = span.end();
            }
        }

        out.push_str(&line[last..]);
        out
    }
}

impl LineTransform for Binder {
    fn transform(&mut self, line: &str) -> Result<Vec<String>> {
        Ok(vec![self.apply(line)])
    }

    fn name(&self) -> &str {
        match self.mode {
            BindMode::Observe => "binder",
            BindMode::Insert => "binding-inserter",
        }
    }
}

/// Substitutes `${id}` references with their bound values.
/// Unbound references are left exactly as written.
#[derive(Debug, Clone)]
pub struct BindingReplacer {
    table: Arc<BindingTable>,
}

impl BindingReplacer {
    /// Create a replacer reading from `table`
    pub fn new(table: Arc<BindingTable>) -> Self {
        Self { table }
    }

    /// Get a reference to the shared binding table
    pub fn table(&self) -> &Arc<BindingTable> {
        &self.table
    }

    /// Resolve every reference in `line` against the table as it is now
    pub fn apply(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;

        while let Some(open) = rest.find("${") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            // a body stops at the first `$`, `{` or `}`; only `}` closes a token
            match after.find(['$', '{', '}']) {
                Some(close) if close > 0 && after[close..].starts_with('}') => {
                    let id = &after[..close];
                    match self.table.lookup(id) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&rest[open..open + close + 3]),
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push_str("${");
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

impl LineTransform for BindingReplacer {
    fn transform(&mut self, line: &str) -> Result<Vec<String>> {
        Ok(vec![self.apply(line)])
    }

    fn name(&self) -> &str {
        "binding-replacer"
    }
}

/// Create a binder stage that forwards lines unchanged
pub fn binder(
    name: impl Into<String>,
    pattern: &str,
    prefix: impl Into<String>,
    table: Arc<BindingTable>,
) -> Result<Stage<Binder>> {
    let binder = Binder::new(pattern, prefix, table, BindMode::Observe)?;
    Ok(Stage::new(name, binder))
}

/// Create a binder stage that rewrites bound spans as `${id}` references
pub fn binding_inserter(
    name: impl Into<String>,
    pattern: &str,
    prefix: impl Into<String>,
    table: Arc<BindingTable>,
) -> Result<Stage<Binder>> {
    let binder = Binder::new(pattern, prefix, table, BindMode::Insert)?;
    Ok(Stage::new(name, binder))
}

/// Create a binding-replacer stage
pub fn binding_replacer(name: impl Into<String>, table: Arc<BindingTable>) -> Stage<BindingReplacer> {
    Stage::new(name, BindingReplacer::new(table))
}
