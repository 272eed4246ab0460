//! Non-fatal findings produced while resolving configuration
//!
//! Missing optional files, include cycles and unresolved variables never abort
//! a resolution. They are logged where they happen and handed back to the
//! caller alongside the result.

use std::path::PathBuf;

use serde::Serialize;

/// What kind of resource a missing-resource diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A server configuration document (`server.xml` or a dropin)
    Document,
    /// A document referenced by `<include>`
    Include,
    /// A document referenced by `<include optional="true">`
    OptionalInclude,
    /// A `bootstrap.properties` file or one of its includes
    BootstrapProperties,
    /// A `server.env` file
    ServerEnv,
    /// A variables source directory
    VariablesDirectory,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ResourceKind::Document => "configuration document",
            ResourceKind::Include => "included document",
            ResourceKind::OptionalInclude => "optional included document",
            ResourceKind::BootstrapProperties => "bootstrap properties",
            ResourceKind::ServerEnv => "server.env",
            ResourceKind::VariablesDirectory => "variables directory",
        };
        f.write_str(label)
    }
}

/// A non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A referenced file or directory does not exist
    #[error("{kind} not found: {}", path.display())]
    MissingResource { kind: ResourceKind, path: PathBuf },

    /// A document or properties file was already entered in the current chain
    #[error("skipping circular include of {}", path.display())]
    IncludeCycle { path: PathBuf },

    /// An included document exists but could not be parsed
    #[error("ignoring unreadable include {}: {message}", path.display())]
    UnreadableInclude { path: PathBuf, message: String },

    /// An include location that cannot be loaded from the local file system
    #[error("ignoring unsupported include location '{location}'")]
    UnsupportedLocation { location: String },

    /// A `${name}` token that no source could satisfy
    #[error("variable '{name}' could not be resolved")]
    UnresolvedVariable { name: String },
}

impl Diagnostic {
    /// Emit this diagnostic through the `log` facade.
    ///
    /// Missing optional files are expected and only logged at debug level.
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::MissingResource { kind, .. } if *kind != ResourceKind::Include => {
                log::debug!("{}", self)
            }
            _ => log::warn!("{}", self),
        }
    }
}

/// Ordered collection of diagnostics gathered during one resolution call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.0.push(diagnostic);
    }

    /// Append diagnostics that were already logged by a nested call
    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Names of all unresolved variables, in the order they were reported
    pub fn unresolved_names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|d| match d {
                Diagnostic::UnresolvedVariable { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
