//! Hardened loading of server configuration documents
//!
//! Documents are parsed with [`roxmltree`], which never fetches external
//! resources and never processes XInclude. On top of that, DTDs are rejected
//! outright so no entity declaration (internal or external) is ever expanded.
//! The parsed tree is copied into an owned, immutable [`Element`] tree so a
//! [`ConfigDocument`] does not borrow the source text.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Name of the root element every configuration document must have
pub const SERVER_ELEMENT: &str = "server";

/// Parser settings passed explicitly to every parse call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Keep element namespaces instead of matching on local names only
    pub namespace_aware: bool,
    /// Upper bound on the number of XML nodes in a single document
    pub nodes_limit: u32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            namespace_aware: false,
            nodes_limit: 1_000_000,
        }
    }
}

impl ParserOptions {
    /// Set whether element namespaces are retained
    pub fn with_namespace_aware(mut self, namespace_aware: bool) -> Self {
        self.namespace_aware = namespace_aware;
        self
    }

    /// Set the maximum number of nodes a document may contain
    pub fn with_nodes_limit(mut self, limit: u32) -> Self {
        self.nodes_limit = limit;
        self
    }

    fn roxmltree(&self) -> roxmltree::ParsingOptions {
        roxmltree::ParsingOptions {
            allow_dtd: false,
            nodes_limit: self.nodes_limit,
            ..roxmltree::ParsingOptions::default()
        }
    }
}

/// An element of a parsed configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: IndexMap<String, String>,
    text: String,
    children: Vec<Element>,
    line: u32,
}

impl Element {
    /// Local name of the element
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace URI; always `None` unless parsed namespace-aware
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Value of an attribute by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Value of an attribute, matching the name without regard to ASCII case
    pub fn attribute_ignore_case(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text content directly inside this element
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Child elements in document order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Child elements with the given local name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// 1-based line on which the element starts
    pub fn line(&self) -> u32 {
        self.line
    }

    fn from_node(node: roxmltree::Node<'_, '_>, doc: &roxmltree::Document<'_>, options: &ParserOptions) -> Self {
        let tag = node.tag_name();
        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Element::from_node(child, doc, options));
            } else if child.is_text() {
                if let Some(t) = child.text() {
                    text.push_str(t);
                }
            }
        }

        Self {
            name: tag.name().to_string(),
            namespace: if options.namespace_aware {
                tag.namespace().map(str::to_string)
            } else {
                None
            },
            attributes,
            text,
            children,
            line: doc.text_pos_at(node.range().start).row,
        }
    }
}

/// An immutable parsed configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    path: PathBuf,
    root: Element,
}

impl ConfigDocument {
    /// Read and parse a configuration document from disk
    pub fn load(path: impl AsRef<Path>, options: &ParserOptions) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, &e))?;
        Self::parse(path, &content, options)
    }

    /// Parse document text, recording `path` as its origin
    pub fn parse(path: impl AsRef<Path>, content: &str, options: &ParserOptions) -> Result<Self> {
        let path = std::path::absolute(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());

        let doc = roxmltree::Document::parse_with_options(content, options.roxmltree()).map_err(|e| {
            let pos = e.pos();
            Error::parse(&path, e.to_string()).with_position(pos.row, pos.col)
        })?;

        let root_node = doc.root_element();
        if root_node.tag_name().name() != SERVER_ELEMENT {
            let pos = doc.text_pos_at(root_node.range().start);
            return Err(Error::parse(
                &path,
                format!(
                    "expected <{}> root element, found <{}>",
                    SERVER_ELEMENT,
                    root_node.tag_name().name()
                ),
            )
            .with_position(pos.row, pos.col)
            .with_help("A server configuration document must have a single <server> root element"));
        }

        log::trace!("Parsed configuration document {}", path.display());

        Ok(Self {
            root: Element::from_node(root_node, &doc, options),
            path,
        })
    }

    /// Absolute path the document was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The `<server>` root element
    pub fn root(&self) -> &Element {
        &self.root
    }
}
