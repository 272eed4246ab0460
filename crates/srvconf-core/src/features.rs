//! Feature resolution across a document's include graph
//!
//! Each `<featureManager>` adds its `<feature>` entries to the current
//! document's result. Each `<include>` is resolved on its own and combined
//! with what the including document has accumulated *at that point in
//! document order*, according to its `onConflict` policy:
//!
//! | policy  | effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | MERGE   | union with the current result                                 |
//! | REPLACE | replaces the current result, unless the include yields nothing |
//! | IGNORE  | the include is not visited                                    |
//!
//! # Example
//!
//! ```rust,no_run
//! use srvconf_core::FeatureResolver;
//!
//! let resolution = FeatureResolver::new()
//!     .resolve_server_dir("/opt/wlp/usr/servers/defaultServer")
//!     .unwrap();
//! for feature in &resolution.features {
//!     println!("{}", feature);
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use crate::diagnostic::Diagnostics;
use crate::document::{Element, ParserOptions};
use crate::error::Result;
use crate::include::{IncludeReference, OnConflict};
use crate::layout::ServerLayout;
use crate::store::PropertyStore;
use crate::walk::{Collector, IncludeWalker};

/// Element listing enabled features
pub const FEATURE_MANAGER_ELEMENT: &str = "featureManager";
/// A single enabled feature inside `<featureManager>`
pub const FEATURE_ELEMENT: &str = "feature";

/// Deduplicated feature names, ordered for stable output
pub type FeatureSet = BTreeSet<String>;

/// Result of a feature resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureResolution {
    pub features: FeatureSet,
    pub diagnostics: Diagnostics,
}

/// Resolves the set of enabled features
#[derive(Debug, Clone, Default)]
pub struct FeatureResolver<'a> {
    parser: ParserOptions,
    properties: Option<&'a PropertyStore>,
}

impl FeatureResolver<'static> {
    /// Create a resolver with default parser settings
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> FeatureResolver<'a> {
    /// Use specific parser settings
    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Substitute `${...}` in include locations using a property store
    pub fn with_properties<'b>(self, properties: &'b PropertyStore) -> FeatureResolver<'b> {
        FeatureResolver {
            parser: self.parser,
            properties: Some(properties),
        }
    }

    /// Resolve features starting from a single document.
    ///
    /// Fails only if the document itself cannot be read or parsed.
    pub fn resolve_file(&self, path: impl AsRef<Path>) -> Result<FeatureResolution> {
        let (collected, diagnostics) =
            IncludeWalker::new(&self.parser, self.properties).walk_file::<Features>(path.as_ref())?;
        Ok(FeatureResolution {
            features: collected.0,
            diagnostics,
        })
    }

    /// Resolve features of a server configuration directory:
    /// `configDropins/defaults`, then `server.xml`, then `configDropins/overrides`,
    /// each resolved independently and unioned.
    pub fn resolve_server_dir(&self, config_dir: impl AsRef<Path>) -> Result<FeatureResolution> {
        self.resolve_layout(&ServerLayout::new(config_dir.as_ref()))
    }

    /// Same as [`resolve_server_dir`](Self::resolve_server_dir) for an existing layout
    pub fn resolve_layout(&self, layout: &ServerLayout) -> Result<FeatureResolution> {
        let (collected, diagnostics) =
            IncludeWalker::new(&self.parser, self.properties).walk_server::<Features>(layout)?;
        log::debug!(
            "Resolved {} feature(s) for {}",
            collected.0.len(),
            layout.config_dir.display()
        );
        Ok(FeatureResolution {
            features: collected.0,
            diagnostics,
        })
    }
}

/// Feature names contributed by a document
#[derive(Debug, Default)]
struct Features(FeatureSet);

impl Collector for Features {
    fn wants(&self, include: &IncludeReference) -> bool {
        include.on_conflict != OnConflict::Ignore
    }

    fn element(&mut self, element: &Element) {
        if element.name() != FEATURE_MANAGER_ELEMENT {
            return;
        }
        for feature in element.children_named(FEATURE_ELEMENT) {
            let name = feature.text().trim();
            if !name.is_empty() {
                self.0.insert(name.to_string());
            }
        }
    }

    fn include(&mut self, include: &IncludeReference, included: Self) {
        match include.on_conflict {
            OnConflict::Merge => self.0.extend(included.0),
            OnConflict::Replace if included.0.is_empty() => {
                log::debug!(
                    "Include {} has no features; keeping current features",
                    include.location
                );
            }
            OnConflict::Replace => self.0 = included.0,
            OnConflict::Ignore => {}
        }
    }

    fn overlay(&mut self, later: Self) {
        self.0.extend(later.0);
    }
}
