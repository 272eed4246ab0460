//! `<include>` directives and the chain used to stop circular includes

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::document::Element;

/// Element name of an include directive
pub const INCLUDE_ELEMENT: &str = "include";

/// How an included document's contents combine with the including document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnConflict {
    /// Combine with what is already present
    #[default]
    Merge,
    /// Included contents take the place of what is already present
    Replace,
    /// The included contents are not used
    Ignore,
}

impl FromStr for OnConflict {
    type Err = std::convert::Infallible;

    /// Case-insensitive; anything unrecognized is `Merge`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let policy = match s.trim() {
            v if v.eq_ignore_ascii_case("replace") => OnConflict::Replace,
            v if v.eq_ignore_ascii_case("ignore") => OnConflict::Ignore,
            v if v.eq_ignore_ascii_case("merge") => OnConflict::Merge,
            other => {
                log::debug!("Unrecognized onConflict value '{}', using MERGE", other);
                OnConflict::Merge
            }
        };
        Ok(policy)
    }
}

/// An `<include>` directive as written in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeReference {
    /// The `location` attribute, possibly containing `${...}` references
    pub location: String,
    pub on_conflict: OnConflict,
    /// `optional="true"`: a missing target is expected
    pub optional: bool,
}

impl IncludeReference {
    /// Read an include directive from an element.
    ///
    /// Returns `None` for elements that are not includes or have no location.
    pub fn from_element(element: &Element) -> Option<Self> {
        if element.name() != INCLUDE_ELEMENT {
            return None;
        }
        let location = element.attribute("location")?.trim();
        if location.is_empty() {
            log::warn!(
                "Ignoring <include> without a location at line {}",
                element.line()
            );
            return None;
        }

        let on_conflict = element
            .attribute_ignore_case("onConflict")
            .map(|v| v.parse::<OnConflict>().unwrap_or_default())
            .unwrap_or_default();
        let optional = element
            .attribute("optional")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Some(Self {
            location: location.to_string(),
            on_conflict,
            optional,
        })
    }
}

/// Where an include location points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTarget {
    /// A file on the local file system
    File(PathBuf),
    /// A location with a scheme other than `file:`
    Remote(String),
}

impl IncludeTarget {
    /// Interpret an (already substituted) location relative to `base_dir`
    pub fn from_location(location: &str, base_dir: &Path) -> Self {
        if let Some(rest) = location.strip_prefix("file:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            return IncludeTarget::File(base_dir.join(path));
        }
        if has_remote_scheme(location) {
            return IncludeTarget::Remote(location.to_string());
        }
        IncludeTarget::File(base_dir.join(location))
    }
}

/// `scheme:` followed by something other than a drive-letter path
fn has_remote_scheme(location: &str) -> bool {
    let Some((scheme, _)) = location.split_once(':') else {
        return false;
    };
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// The documents entered on the way from the root to the current document.
///
/// Each recursive step gets its own extended copy, so sibling includes do not
/// see each other's entries.
#[derive(Debug, Clone, Default)]
pub struct IncludeChain {
    entries: Vec<PathBuf>,
}

impl IncludeChain {
    /// Start a chain at the root document
    pub fn starting_at(root: &Path) -> Self {
        Self {
            entries: vec![identity(root)],
        }
    }

    /// Whether `path` was already entered
    pub fn contains(&self, path: &Path) -> bool {
        let id = identity(path);
        self.entries.contains(&id)
    }

    /// A new chain with `path` appended
    pub fn extended(&self, path: &Path) -> Self {
        let mut entries = self.entries.clone();
        entries.push(identity(path));
        Self { entries }
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

/// Canonical form of a path when it exists, the path itself otherwise
fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ConfigDocument, ParserOptions};
    use pretty_assertions::assert_eq;

    fn first_child(xml: &str) -> Element {
        let doc = ConfigDocument::parse("/srv/server.xml", xml, &ParserOptions::default()).unwrap();
        doc.root().children()[0].clone()
    }

    #[test]
    fn test_on_conflict_parsing() {
        assert_eq!("MERGE".parse::<OnConflict>().unwrap(), OnConflict::Merge);
        assert_eq!("replace".parse::<OnConflict>().unwrap(), OnConflict::Replace);
        assert_eq!("Ignore".parse::<OnConflict>().unwrap(), OnConflict::Ignore);
        assert_eq!("bogus".parse::<OnConflict>().unwrap(), OnConflict::Merge);
        assert_eq!("".parse::<OnConflict>().unwrap(), OnConflict::Merge);
    }

    #[test]
    fn test_reference_from_element() {
        let el = first_child(r#"<server><include location="a.xml" onConflict="REPLACE"/></server>"#);
        let inc = IncludeReference::from_element(&el).unwrap();
        assert_eq!(inc.location, "a.xml");
        assert_eq!(inc.on_conflict, OnConflict::Replace);
        assert!(!inc.optional);
    }

    #[test]
    fn test_reference_defaults_and_optional() {
        let el = first_child(r#"<server><include location=" b.xml " optional="true"/></server>"#);
        let inc = IncludeReference::from_element(&el).unwrap();
        assert_eq!(inc.location, "b.xml");
        assert_eq!(inc.on_conflict, OnConflict::Merge);
        assert!(inc.optional);
    }

    #[test]
    fn test_reference_without_location() {
        let el = first_child(r#"<server><include/></server>"#);
        assert_eq!(IncludeReference::from_element(&el), None);

        let el = first_child(r#"<server><variable name="a"/></server>"#);
        assert_eq!(IncludeReference::from_element(&el), None);
    }

    #[test]
    fn test_target_from_location() {
        let base = Path::new("/srv/s1");
        assert_eq!(
            IncludeTarget::from_location("extra.xml", base),
            IncludeTarget::File(PathBuf::from("/srv/s1/extra.xml"))
        );
        assert_eq!(
            IncludeTarget::from_location("/etc/common.xml", base),
            IncludeTarget::File(PathBuf::from("/etc/common.xml"))
        );
        assert_eq!(
            IncludeTarget::from_location("file:///etc/common.xml", base),
            IncludeTarget::File(PathBuf::from("/etc/common.xml"))
        );
        assert_eq!(
            IncludeTarget::from_location("https://example.com/a.xml", base),
            IncludeTarget::Remote("https://example.com/a.xml".into())
        );
    }

    #[test]
    fn test_drive_letter_is_not_a_scheme() {
        assert!(!has_remote_scheme("C:/config/a.xml"));
        assert!(has_remote_scheme("http://host/a.xml"));
        assert!(!has_remote_scheme("a.xml"));
    }

    #[test]
    fn test_chain() {
        let chain = IncludeChain::starting_at(Path::new("/srv/a.xml"));
        assert!(chain.contains(Path::new("/srv/a.xml")));
        assert!(!chain.contains(Path::new("/srv/b.xml")));

        let extended = chain.extended(Path::new("/srv/b.xml"));
        assert!(extended.contains(Path::new("/srv/b.xml")));
        assert_eq!(extended.depth(), 2);
        assert_eq!(chain.depth(), 1);
    }
}
