//! `${name}` substitution against the two property maps
//!
//! A token is looked up under its own name first, then under a mangled form
//! suited to environment variable names:
//!
//! 1. `resolved[name]`, then `default[name]`
//! 2. `name` with every character that is not an ASCII letter or digit
//!    replaced by `_` (`x.y` becomes `x_y`)
//! 3. the mangled name uppercased (`X_Y`)
//!
//! A value that is found is substituted itself before it is inserted. A token
//! nobody can satisfy, or one that refers back to itself, stays in the output
//! as written and is reported as an
//! [`UnresolvedVariable`](crate::diagnostic::Diagnostic::UnresolvedVariable).
//! The same happens to tokens met after one substitution has used up its
//! [`EXPANSION_BUDGET`].

use indexmap::IndexMap;
use serde::Serialize;

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::interpolation::{self, Segment};

/// Work allowed for one substitution: every expanded token costs one unit and
/// every byte appended to an intermediate or final result costs one unit
pub const EXPANSION_BUDGET: usize = 1 << 20;

/// The outcome of substituting one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Substitution {
    /// The text with every resolvable token replaced
    pub text: String,
    /// Unresolved tokens, in the order they were met
    pub diagnostics: Diagnostics,
}

impl Substitution {
    /// Whether every token was resolved
    pub fn is_complete(&self) -> bool {
        self.diagnostics.unresolved_names().is_empty()
    }
}

/// Looks up and expands tokens over a pair of maps
pub(crate) struct Substitutor<'a> {
    resolved: &'a IndexMap<String, String>,
    defaults: &'a IndexMap<String, String>,
}

impl<'a> Substitutor<'a> {
    pub(crate) fn new(
        resolved: &'a IndexMap<String, String>,
        defaults: &'a IndexMap<String, String>,
    ) -> Self {
        Self { resolved, defaults }
    }

    /// Find the raw value for a token name, returning the key it was found under
    pub(crate) fn lookup(&self, name: &str) -> Option<(String, &'a str)> {
        let mangled = mangle(name);
        let upper = mangled.to_ascii_uppercase();

        let mut candidates = vec![name.to_string()];
        for candidate in [mangled, upper] {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        candidates.into_iter().find_map(|key| {
            let value = self
                .resolved
                .get(&key)
                .or_else(|| self.defaults.get(&key))?;
            Some((key, value.as_str()))
        })
    }

    /// Substitute every token in `text`
    pub(crate) fn substitute(&self, text: &str) -> Substitution {
        let mut expansion = Expansion {
            resolution_stack: Vec::new(),
            diagnostics: Diagnostics::new(),
            budget: EXPANSION_BUDGET,
        };
        let text = self.expand(text, &mut expansion);
        Substitution {
            text,
            diagnostics: expansion.diagnostics,
        }
    }

    fn expand(&self, text: &str, expansion: &mut Expansion) -> String {
        let mut out = String::with_capacity(text.len());

        for segment in interpolation::parse(text) {
            let (name, raw) = match segment {
                Segment::Literal(s) => {
                    expansion.spend(s.len());
                    out.push_str(s);
                    continue;
                }
                Segment::Variable { name, raw } => (name, raw),
            };

            if expansion.budget == 0 {
                expansion.unresolved(name);
                out.push_str(raw);
                continue;
            }

            let Some((key, value)) = self.lookup(name) else {
                expansion.unresolved(name);
                out.push_str(raw);
                continue;
            };

            if expansion.resolution_stack.contains(&key) {
                log::debug!(
                    "Circular reference through '{}' ({})",
                    key,
                    expansion.resolution_stack.join(" -> ")
                );
                expansion.unresolved(name);
                out.push_str(raw);
                continue;
            }

            if key != name {
                log::trace!("'{}' resolved through '{}'", name, key);
            }

            expansion.spend(1);
            expansion.resolution_stack.push(key);
            let expanded = self.expand(value, expansion);
            expansion.resolution_stack.pop();

            expansion.spend(expanded.len());
            out.push_str(&expanded);
        }

        out
    }
}

/// State of one substitution
struct Expansion {
    resolution_stack: Vec<String>,
    diagnostics: Diagnostics,
    budget: usize,
}

impl Expansion {
    fn spend(&mut self, units: usize) {
        if self.budget > 0 && units >= self.budget {
            log::warn!(
                "Substitution exceeds {} units, leaving remaining references unexpanded",
                EXPANSION_BUDGET
            );
        }
        self.budget = self.budget.saturating_sub(units);
    }

    fn unresolved(&mut self, name: &str) {
        self.diagnostics.push(Diagnostic::UnresolvedVariable {
            name: name.to_string(),
        });
    }
}

/// Replace every character that is not an ASCII letter or digit with `_`
pub fn mangle(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
