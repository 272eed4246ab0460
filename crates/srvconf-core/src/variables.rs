//! `<variable>` declarations gathered across a document's include graph

use indexmap::IndexMap;

use crate::document::Element;
use crate::include::{IncludeReference, OnConflict};
use crate::walk::Collector;

/// Element declaring a variable
pub const VARIABLE_ELEMENT: &str = "variable";

/// `defaultValue` and `value` declarations, kept apart
#[derive(Debug, Default)]
pub(crate) struct VariableDeclarations {
    pub(crate) defaults: IndexMap<String, String>,
    pub(crate) values: IndexMap<String, String>,
}

impl Collector for VariableDeclarations {
    fn wants(&self, include: &IncludeReference) -> bool {
        include.on_conflict != OnConflict::Ignore
    }

    fn element(&mut self, element: &Element) {
        if element.name() != VARIABLE_ELEMENT {
            return;
        }
        let Some(name) = element.attribute("name").map(str::trim).filter(|n| !n.is_empty()) else {
            log::warn!("Ignoring <variable> without a name at line {}", element.line());
            return;
        };

        if let Some(default) = element.attribute("defaultValue") {
            self.defaults.insert(name.to_string(), default.to_string());
        }
        if let Some(value) = element.attribute("value") {
            self.values.insert(name.to_string(), value.to_string());
        }
    }

    fn include(&mut self, _include: &IncludeReference, included: Self) {
        self.overlay(included);
    }

    fn overlay(&mut self, later: Self) {
        self.defaults.extend(later.defaults);
        self.values.extend(later.values);
    }
}
