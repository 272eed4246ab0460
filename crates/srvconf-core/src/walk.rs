//! Depth-first traversal of a document and its `<include>` graph
//!
//! The walker knows how to find, load and guard included documents. What is
//! gathered along the way is up to a [`Collector`]: every recursive step
//! builds a fresh collector for the included document and hands it to the
//! including document's collector, which decides how to combine the two.

use std::path::{Path, PathBuf};

use crate::diagnostic::{Diagnostic, Diagnostics, ResourceKind};
use crate::document::{ConfigDocument, Element, ParserOptions};
use crate::error::{Error, Result};
use crate::include::{IncludeChain, IncludeReference, IncludeTarget};
use crate::layout::ServerLayout;
use crate::store::PropertyStore;

/// Something gathered from a document tree
pub(crate) trait Collector: Default {
    /// Whether an include should be visited at all
    fn wants(&self, include: &IncludeReference) -> bool;

    /// Called for each non-include child of a document's root, in order
    fn element(&mut self, element: &Element);

    /// Combine what an included document produced into this collector
    fn include(&mut self, include: &IncludeReference, included: Self);

    /// Combine the result of a later, higher-precedence root document
    fn overlay(&mut self, later: Self);
}

/// Walks include graphs with a fixed parser configuration
pub(crate) struct IncludeWalker<'a> {
    parser: &'a ParserOptions,
    properties: Option<&'a PropertyStore>,
}

impl<'a> IncludeWalker<'a> {
    pub(crate) fn new(parser: &'a ParserOptions, properties: Option<&'a PropertyStore>) -> Self {
        Self { parser, properties }
    }

    /// Walk a single root document. Failing to load the root is an error.
    pub(crate) fn walk_file<C: Collector>(&self, path: &Path) -> Result<(C, Diagnostics)> {
        let mut diagnostics = Diagnostics::new();
        let doc = ConfigDocument::load(path, self.parser)?;
        let chain = IncludeChain::starting_at(doc.path());
        let collected = self.walk_document(&doc, &chain, &mut diagnostics);
        Ok((collected, diagnostics))
    }

    /// Walk `configDropins/defaults`, `server.xml` and `configDropins/overrides`
    /// of a server, overlaying each root's result on the previous ones.
    ///
    /// A missing `server.xml` is reported, not an error; a document that
    /// exists but cannot be parsed is an error.
    pub(crate) fn walk_server<C: Collector>(&self, layout: &ServerLayout) -> Result<(C, Diagnostics)> {
        let mut diagnostics = Diagnostics::new();
        let mut result = C::default();

        let mut roots = dropin_documents(&layout.dropins_defaults_dir())?;
        let server_xml = layout.server_xml();
        if server_xml.is_file() {
            roots.push(server_xml);
        } else {
            diagnostics.push(Diagnostic::MissingResource {
                kind: ResourceKind::Document,
                path: server_xml,
            });
        }
        roots.extend(dropin_documents(&layout.dropins_overrides_dir())?);

        for root in roots {
            log::debug!("Walking root document {}", root.display());
            let (collected, diags) = self.walk_file::<C>(&root)?;
            diagnostics.extend(diags);
            result.overlay(collected);
        }

        Ok((result, diagnostics))
    }

    fn walk_document<C: Collector>(
        &self,
        doc: &ConfigDocument,
        chain: &IncludeChain,
        diagnostics: &mut Diagnostics,
    ) -> C {
        let mut collector = C::default();

        for child in doc.root().children() {
            let Some(include) = IncludeReference::from_element(child) else {
                collector.element(child);
                continue;
            };

            if !collector.wants(&include) {
                log::debug!(
                    "Not descending into {} (onConflict={:?})",
                    include.location,
                    include.on_conflict
                );
                continue;
            }

            let Some(path) = self.locate(&include, doc.directory(), diagnostics) else {
                continue;
            };

            if chain.contains(&path) {
                diagnostics.push(Diagnostic::IncludeCycle { path });
                continue;
            }

            if !path.is_file() {
                let kind = if include.optional {
                    ResourceKind::OptionalInclude
                } else {
                    ResourceKind::Include
                };
                diagnostics.push(Diagnostic::MissingResource { kind, path });
                continue;
            }

            let included_doc = match ConfigDocument::load(&path, self.parser) {
                Ok(d) => d,
                Err(e) => {
                    diagnostics.push(Diagnostic::UnreadableInclude {
                        path,
                        message: e.cause.unwrap_or_else(|| format!("{:?}", e.kind)),
                    });
                    continue;
                }
            };

            log::trace!(
                "Entering {} at depth {}",
                included_doc.path().display(),
                chain.depth()
            );
            let included =
                self.walk_document::<C>(&included_doc, &chain.extended(&path), diagnostics);
            collector.include(&include, included);
        }

        collector
    }

    /// Turn an include location into a local path, substituting variables
    /// when a property store is available
    fn locate(
        &self,
        include: &IncludeReference,
        base_dir: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Option<PathBuf> {
        let location = match self.properties {
            Some(store) => {
                let substitution = store.resolve(&include.location);
                diagnostics.extend(substitution.diagnostics);
                substitution.text
            }
            None => include.location.clone(),
        };

        match IncludeTarget::from_location(&location, base_dir) {
            IncludeTarget::File(path) => Some(path),
            IncludeTarget::Remote(location) => {
                diagnostics.push(Diagnostic::UnsupportedLocation { location });
                None
            }
        }
    }
}

/// `*.xml` files of a dropins directory in file-name order; none if the
/// directory does not exist
fn dropin_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, &e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Records visited element names, combining includes by appending
    #[derive(Default, Debug)]
    struct Trace(Vec<String>);

    impl Collector for Trace {
        fn wants(&self, _include: &IncludeReference) -> bool {
            true
        }

        fn element(&mut self, element: &Element) {
            if let Some(name) = element.attribute("name") {
                self.0.push(name.to_string());
            }
        }

        fn include(&mut self, _include: &IncludeReference, included: Self) {
            self.0.extend(included.0);
        }

        fn overlay(&mut self, later: Self) {
            self.0.extend(later.0);
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_walk_document_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = write(
            tmp.path(),
            "server.xml",
            r#"<server><e name="1"/><include location="a.xml"/><e name="3"/></server>"#,
        );
        write(tmp.path(), "a.xml", r#"<server><e name="2"/></server>"#);

        let parser = ParserOptions::default();
        let (trace, diags) = IncludeWalker::new(&parser, None)
            .walk_file::<Trace>(&root)
            .unwrap();

        assert_eq!(trace.0, vec!["1", "2", "3"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_walk_cycle_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let root = write(
            tmp.path(),
            "a.xml",
            r#"<server><e name="a"/><include location="b.xml"/></server>"#,
        );
        write(
            tmp.path(),
            "b.xml",
            r#"<server><e name="b"/><include location="a.xml"/></server>"#,
        );

        let parser = ParserOptions::default();
        let (trace, diags) = IncludeWalker::new(&parser, None)
            .walk_file::<Trace>(&root)
            .unwrap();

        assert_eq!(trace.0, vec!["a", "b"]);
        assert!(matches!(
            diags.iter().next(),
            Some(Diagnostic::IncludeCycle { .. })
        ));
    }

    #[test]
    fn test_walk_unparseable_include_is_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let root = write(
            tmp.path(),
            "server.xml",
            r#"<server><include location="bad.xml"/><e name="ok"/></server>"#,
        );
        write(tmp.path(), "bad.xml", "<server><oops></server>");

        let parser = ParserOptions::default();
        let (trace, diags) = IncludeWalker::new(&parser, None)
            .walk_file::<Trace>(&root)
            .unwrap();

        assert_eq!(trace.0, vec!["ok"]);
        assert!(matches!(
            diags.iter().next(),
            Some(Diagnostic::UnreadableInclude { .. })
        ));
    }

    #[test]
    fn test_walk_remote_location_is_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let root = write(
            tmp.path(),
            "server.xml",
            r#"<server><include location="http://example.com/x.xml"/></server>"#,
        );

        let parser = ParserOptions::default();
        let (_, diags) = IncludeWalker::new(&parser, None)
            .walk_file::<Trace>(&root)
            .unwrap();

        assert_eq!(
            diags.iter().next(),
            Some(&Diagnostic::UnsupportedLocation {
                location: "http://example.com/x.xml".into()
            })
        );
    }

    #[test]
    fn test_walk_server_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "server.xml", r#"<server><e name="server"/></server>"#);
        write(
            tmp.path(),
            "configDropins/defaults/b.xml",
            r#"<server><e name="defaults-b"/></server>"#,
        );
        write(
            tmp.path(),
            "configDropins/defaults/a.xml",
            r#"<server><e name="defaults-a"/></server>"#,
        );
        write(
            tmp.path(),
            "configDropins/overrides/o.xml",
            r#"<server><e name="overrides"/></server>"#,
        );
        write(tmp.path(), "configDropins/overrides/notes.txt", "not xml");

        let parser = ParserOptions::default();
        let layout = ServerLayout::new(tmp.path());
        let (trace, diags) = IncludeWalker::new(&parser, None)
            .walk_server::<Trace>(&layout)
            .unwrap();

        assert_eq!(
            trace.0,
            vec!["defaults-a", "defaults-b", "server", "overrides"]
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_walk_server_without_server_xml() {
        let tmp = tempfile::tempdir().unwrap();
        let parser = ParserOptions::default();
        let layout = ServerLayout::new(tmp.path());
        let (trace, diags) = IncludeWalker::new(&parser, None)
            .walk_server::<Trace>(&layout)
            .unwrap();

        assert!(trace.0.is_empty());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_walk_root_parse_error_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let root = write(tmp.path(), "server.xml", "<server>");
        let parser = ParserOptions::default();
        assert!(IncludeWalker::new(&parser, None)
            .walk_file::<Trace>(&root)
            .is_err());
    }
}
