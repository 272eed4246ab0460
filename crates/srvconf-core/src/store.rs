//! Layered property store
//!
//! Properties come from seven sources applied weakest first. Each tier has
//! its own `apply_*` method; calling them in order builds the store:
//!
//! | tier | source                                   | map      |
//! |------|------------------------------------------|----------|
//! | 1    | `<variable defaultValue>` in server.xml   | default  |
//! | 2    | process environment, then `server.env`   | resolved |
//! | 3    | `bootstrap.properties`                   | resolved |
//! | 4    | system properties                        | resolved |
//! | 5    | variables directories                    | resolved |
//! | 6    | `<variable value>` in server.xml          | resolved |
//! | 7    | command line                             | resolved |
//!
//! A later tier overwrites an earlier one for the same key. Values in the
//! default map are only consulted when a key has no resolved value.
//!
//! # Example
//!
//! ```rust,no_run
//! use srvconf_core::{PropertyStore, ServerLayout};
//!
//! let mut store = PropertyStore::new(ServerLayout::infer("/opt/wlp/usr/servers/app"));
//! store
//!     .apply_location_variables()
//!     .apply_server_xml_defaults()?
//!     .apply_process_environment()
//!     .apply_server_env()?
//!     .apply_bootstrap_properties(Vec::<(String, String)>::new())?
//!     .apply_variables_directories()?
//!     .apply_server_xml_values()?;
//!
//! let url = store.resolve("http://${host}:${http.port}/");
//! println!("{}", url.text);
//! # Ok::<(), srvconf_core::Error>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use indexmap::IndexMap;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::diagnostic::{Diagnostic, Diagnostics, ResourceKind};
use crate::document::ParserOptions;
use crate::error::{Error, Result};
use crate::include::IncludeChain;
use crate::layout::ServerLayout;
use crate::properties_file::{parse_properties, parse_server_env};
use crate::substitution::{Substitution, Substitutor};
use crate::variables::VariableDeclarations;
use crate::walk::IncludeWalker;

/// Key in `bootstrap.properties` naming another file to load first
pub const BOOTSTRAP_INCLUDE: &str = "bootstrap.include";
/// Property listing additional variables directories
pub const VARIABLE_SOURCE_DIRS: &str = "VARIABLE_SOURCE_DIRS";

const PROPERTIES_EXTENSION: &str = "properties";

/// Where a property value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Directories of the server layout
    Location,
    /// `<variable defaultValue>` declarations
    ServerXmlDefaults,
    /// Environment variables
    Environment,
    /// `server.env` files
    ServerEnv,
    /// `bootstrap.properties` and caller overrides
    Bootstrap,
    /// System properties
    SystemProperties,
    /// Files in variables directories
    VariablesDirectory,
    /// `<variable value>` declarations
    ServerXmlValues,
    /// Variables given on the command line
    CommandLine,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Location => "location",
            Tier::ServerXmlDefaults => "server.xml defaults",
            Tier::Environment => "environment",
            Tier::ServerEnv => "server.env",
            Tier::Bootstrap => "bootstrap.properties",
            Tier::SystemProperties => "system properties",
            Tier::VariablesDirectory => "variables directory",
            Tier::ServerXmlValues => "server.xml",
            Tier::CommandLine => "command line",
        };
        f.write_str(label)
    }
}

/// Everything needed to build a store in one call
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub parser: ParserOptions,
    /// Primary variables directory; `<config dir>/variables` when unset
    pub variables_dir: Option<PathBuf>,
    /// Snapshot the process environment into tier 2
    pub include_process_env: bool,
    /// Extra environment variables, applied after the process snapshot
    pub environment: IndexMap<String, String>,
    pub system_properties: IndexMap<String, String>,
    /// Layered over `bootstrap.properties`
    pub bootstrap_overrides: IndexMap<String, String>,
    pub command_line: IndexMap<String, String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            parser: ParserOptions::default(),
            variables_dir: None,
            include_process_env: true,
            environment: IndexMap::new(),
            system_properties: IndexMap::new(),
            bootstrap_overrides: IndexMap::new(),
            command_line: IndexMap::new(),
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_variables_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.variables_dir = Some(dir.into());
        self
    }

    /// Whether to read the process environment
    pub fn with_process_env(mut self, include: bool) -> Self {
        self.include_process_env = include;
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_system_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_bootstrap_override(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.bootstrap_overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_command_line_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.command_line.insert(key.into(), value.into());
        self
    }
}

/// Default and resolved property maps for one server
#[derive(Debug, Clone)]
pub struct PropertyStore {
    layout: ServerLayout,
    parser: ParserOptions,
    variables_dir: Option<PathBuf>,
    defaults: IndexMap<String, String>,
    resolved: IndexMap<String, String>,
    /// Tier that last set each resolved key
    sources: IndexMap<String, Tier>,
    diagnostics: Diagnostics,
}

impl PropertyStore {
    /// Create an empty store for a server
    pub fn new(layout: ServerLayout) -> Self {
        Self {
            layout,
            parser: ParserOptions::default(),
            variables_dir: None,
            defaults: IndexMap::new(),
            resolved: IndexMap::new(),
            sources: IndexMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Build a store by applying every tier in order
    pub fn build(layout: ServerLayout, options: &StoreOptions) -> Result<Self> {
        let mut store = Self::new(layout).with_parser_options(options.parser);
        if let Some(dir) = &options.variables_dir {
            store = store.with_variables_dir(dir);
        }

        store
            .apply_location_variables()
            .apply_server_xml_defaults()?;
        if options.include_process_env {
            store.apply_process_environment();
        }
        store
            .apply_environment(options.environment.clone())
            .apply_server_env()?
            .apply_bootstrap_properties(options.bootstrap_overrides.clone())?
            .apply_system_properties(options.system_properties.clone())
            .apply_variables_directories()?
            .apply_server_xml_values()?
            .apply_command_line(options.command_line.clone());

        log::debug!(
            "Built property store for {}: {} resolved, {} default, {} diagnostic(s)",
            store.layout.config_dir.display(),
            store.resolved.len(),
            store.defaults.len(),
            store.diagnostics.len()
        );
        Ok(store)
    }

    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Use a primary variables directory other than `<config dir>/variables`
    pub fn with_variables_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.variables_dir = Some(dir.into());
        self
    }

    pub fn layout(&self) -> &ServerLayout {
        &self.layout
    }

    // ----- tiers -----

    /// Seed the location variables of the layout (`server.config.dir`, ...)
    pub fn apply_location_variables(&mut self) -> &mut Self {
        for (key, value) in self.layout.location_variables() {
            self.set(Tier::Location, key, value);
        }
        self
    }

    /// Tier 1: `defaultValue` declarations of the server directory
    pub fn apply_server_xml_defaults(&mut self) -> Result<&mut Self> {
        let layout = self.layout.clone();
        let declarations = self.walk(|walker| walker.walk_server(&layout))?;
        self.extend_defaults(declarations.defaults);
        Ok(self)
    }

    /// Tier 1 for a single document and its includes
    pub fn apply_document_defaults(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let declarations = self.walk(|walker| walker.walk_file(path.as_ref()))?;
        self.extend_defaults(declarations.defaults);
        Ok(self)
    }

    /// Tier 2: environment variables, inserted as-is
    pub fn apply_environment<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(Tier::Environment, key.into(), value.into());
        }
        self
    }

    /// Tier 2: snapshot of the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn apply_process_environment(&mut self) -> &mut Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        self.apply_environment(vars)
    }

    /// `server.env` files from `etc/`, `shared/` and the configuration
    /// directory, each overwriting the previous
    pub fn apply_server_env(&mut self) -> Result<&mut Self> {
        for path in self.layout.server_env_files() {
            if !path.is_file() {
                self.diagnostics.push(Diagnostic::MissingResource {
                    kind: ResourceKind::ServerEnv,
                    path,
                });
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, &e))?;
            let entries = parse_server_env(&content);
            log::debug!("Read {} entries from {}", entries.len(), path.display());
            for (key, value) in entries {
                self.set(Tier::ServerEnv, key, value);
            }
        }
        Ok(self)
    }

    /// Tier 3: `bootstrap.properties` of the configuration directory,
    /// following `bootstrap.include`, then `overrides` on top
    pub fn apply_bootstrap_properties<I, K, V>(&mut self, overrides: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let path = self.layout.bootstrap_properties();
        let mut diagnostics = Diagnostics::new();
        let chain = IncludeChain::starting_at(&path);
        let entries = self.read_bootstrap(&path, &chain, &mut diagnostics)?;
        self.diagnostics.extend(diagnostics);

        for (key, value) in entries {
            self.set(Tier::Bootstrap, key, value);
        }
        for (key, value) in overrides {
            self.set(Tier::Bootstrap, key.into(), value.into());
        }
        Ok(self)
    }

    /// Tier 4: system properties
    pub fn apply_system_properties<I, K, V>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in properties {
            self.set(Tier::SystemProperties, key.into(), value.into());
        }
        self
    }

    /// Tier 5: the primary variables directory, then every directory listed
    /// in `VARIABLE_SOURCE_DIRS`. Earlier directories win.
    pub fn apply_variables_directories(&mut self) -> Result<&mut Self> {
        let mut collected = IndexMap::new();
        for dir in self.variables_directories() {
            if !dir.is_dir() {
                self.diagnostics.push(Diagnostic::MissingResource {
                    kind: ResourceKind::VariablesDirectory,
                    path: dir,
                });
                continue;
            }
            read_variables_dir(&dir, &mut collected)?;
        }

        for (key, value) in collected {
            self.set(Tier::VariablesDirectory, key, value);
        }
        Ok(self)
    }

    /// Tier 6: `value` declarations of the server directory
    pub fn apply_server_xml_values(&mut self) -> Result<&mut Self> {
        let layout = self.layout.clone();
        let declarations = self.walk(|walker| walker.walk_server(&layout))?;
        self.extend_values(declarations.values);
        Ok(self)
    }

    /// Tier 6 for a single document and its includes
    pub fn apply_document_values(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let declarations = self.walk(|walker| walker.walk_file(path.as_ref()))?;
        self.extend_values(declarations.values);
        Ok(self)
    }

    /// Tier 7: command-line variables, overriding everything
    pub fn apply_command_line<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(Tier::CommandLine, key.into(), value.into());
        }
        self
    }

    // ----- queries -----

    /// Raw value of a key: resolved first, then default
    pub fn get(&self, key: &str) -> Option<&str> {
        self.resolved
            .get(key)
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }

    /// Substitute every `${name}` token in `text`
    pub fn resolve(&self, text: &str) -> Substitution {
        Substitutor::new(&self.resolved, &self.defaults).substitute(text)
    }

    /// Substitute the value of `key`, looked up the same way a `${key}`
    /// token would be
    pub fn resolve_key(&self, key: &str) -> Option<Substitution> {
        let substitutor = Substitutor::new(&self.resolved, &self.defaults);
        let (_, raw) = substitutor.lookup(key)?;
        Some(substitutor.substitute(raw))
    }

    /// Resolve a key and read it as an integer
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let Some(substitution) = self.resolve_key(key) else {
            return Ok(None);
        };
        substitution
            .text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::configuration_format(key, &substitution.text, "an integer"))
    }

    /// Resolve a key and read it as a boolean (`true` or `false`, any case)
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(substitution) = self.resolve_key(key) else {
            return Ok(None);
        };
        match substitution.text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(Error::configuration_format(
                key,
                &substitution.text,
                "a boolean (\"true\" or \"false\")",
            )),
        }
    }

    pub fn default_properties(&self) -> &IndexMap<String, String> {
        &self.defaults
    }

    pub fn resolved_properties(&self) -> &IndexMap<String, String> {
        &self.resolved
    }

    /// Tier that supplied the current resolved value of `key`
    pub fn source_of(&self, key: &str) -> Option<Tier> {
        self.sources.get(key).copied()
    }

    /// Tier of every resolved key
    pub fn sources(&self) -> &IndexMap<String, Tier> {
        &self.sources
    }

    /// Diagnostics gathered while applying tiers
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ----- internals -----

    fn set(&mut self, tier: Tier, key: String, value: String) {
        if let Some(previous) = self.sources.get(&key) {
            log::trace!("'{}' from {} overrides {}", key, tier, previous);
        }
        self.sources.insert(key.clone(), tier);
        self.resolved.insert(key, value);
    }

    fn extend_defaults(&mut self, defaults: IndexMap<String, String>) {
        log::debug!("Applying {} declared default(s)", defaults.len());
        self.defaults.extend(defaults);
    }

    fn extend_values(&mut self, values: IndexMap<String, String>) {
        log::debug!("Applying {} declared value(s)", values.len());
        for (key, value) in values {
            self.set(Tier::ServerXmlValues, key, value);
        }
    }

    /// Walk server.xml documents with this store substituting include locations
    fn walk<F>(&mut self, run: F) -> Result<VariableDeclarations>
    where
        F: FnOnce(&IncludeWalker<'_>) -> Result<(VariableDeclarations, Diagnostics)>,
    {
        let parser = self.parser;
        let (declarations, diagnostics) = run(&IncludeWalker::new(&parser, Some(&*self)))?;
        self.diagnostics.extend(diagnostics);
        Ok(declarations)
    }

    /// Read a bootstrap file, loading its `bootstrap.include` first
    fn read_bootstrap(
        &self,
        path: &Path,
        chain: &IncludeChain,
        diagnostics: &mut Diagnostics,
    ) -> Result<IndexMap<String, String>> {
        if !path.is_file() {
            diagnostics.push(Diagnostic::MissingResource {
                kind: ResourceKind::BootstrapProperties,
                path: path.to_path_buf(),
            });
            return Ok(IndexMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, &e))?;
        let own = parse_properties(&content);

        let mut entries = IndexMap::new();
        if let Some(location) = own.get(BOOTSTRAP_INCLUDE) {
            let substitution = self.resolve(location);
            diagnostics.extend(substitution.diagnostics);

            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let included = base.join(substitution.text.trim());
            if chain.contains(&included) {
                diagnostics.push(Diagnostic::IncludeCycle { path: included });
            } else {
                log::debug!("{} includes {}", path.display(), included.display());
                entries = self.read_bootstrap(&included, &chain.extended(&included), diagnostics)?;
            }
        }

        entries.extend(own);
        Ok(entries)
    }

    /// The primary variables directory followed by `VARIABLE_SOURCE_DIRS`
    fn variables_directories(&mut self) -> Vec<PathBuf> {
        let primary = self
            .variables_dir
            .clone()
            .unwrap_or_else(|| self.layout.variables_dir());
        let mut dirs = vec![primary];

        let listed = self.get(VARIABLE_SOURCE_DIRS).map(str::to_string);
        if let Some(list) = listed {
            let substitution = self.resolve(&list);
            let extra = std::env::split_paths(&substitution.text)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| self.layout.config_dir.join(p))
                .collect::<Vec<_>>();
            log::debug!("{} lists {} directories", VARIABLE_SOURCE_DIRS, extra.len());
            self.diagnostics.extend(substitution.diagnostics);
            dirs.extend(extra);
        }

        dirs
    }
}

/// Add every file below `root` to `out`, keyed by its path relative to `root`.
/// Keys already present are kept.
fn read_variables_dir(root: &Path, out: &mut IndexMap<String, String>) -> Result<()> {
    let entries = WalkDir::new(root)
        .sort_by_file_name()
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in entries {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, &std::io::Error::from(e))
        })?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            continue;
        }
        // Symlinked files are read, symlinked directories are not descended
        if !path.is_file() {
            log::debug!("Skipping {}", path.display());
            continue;
        }

        let bytes = std::fs::read(path).map_err(|e| Error::io(path, &e))?;
        let content = String::from_utf8_lossy(&bytes);

        if path
            .extension()
            .is_some_and(|ext| ext == PROPERTIES_EXTENSION)
        {
            for (key, value) in parse_properties(&content) {
                out.entry(key).or_insert(value);
            }
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(MAIN_SEPARATOR_STR);
        out.entry(key).or_insert_with(|| content.trim().to_string());
    }

    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn store_for(dir: &Path) -> PropertyStore {
        PropertyStore::new(ServerLayout::new(dir))
    }

    #[test]
    fn test_empty_server_has_empty_maps() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "server.xml", "<server/>");

        let mut store = store_for(tmp.path());
        store.apply_server_xml_defaults().unwrap();

        assert!(store.default_properties().is_empty());
        assert!(store.resolved_properties().is_empty());
    }

    #[test]
    fn test_default_and_value_maps() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "server.xml",
            r#"<server>
                <variable name="d" defaultValue="dv"/>
                <variable name="v" value="vv"/>
            </server>"#,
        );

        let mut store = store_for(tmp.path());
        store.apply_server_xml_defaults().unwrap();
        assert_eq!(store.default_properties()["d"], "dv");
        assert!(store.resolved_properties().is_empty());

        store.apply_server_xml_values().unwrap();
        assert_eq!(store.resolved_properties()["v"], "vv");
        assert_eq!(store.source_of("v"), Some(Tier::ServerXmlValues));
        assert!(!store.default_properties().contains_key("v"));
    }

    #[test]
    fn test_resolved_wins_over_default() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "server.xml",
            r#"<server><variable name="port" defaultValue="1"/></server>"#,
        );

        let mut store = store_for(tmp.path());
        store
            .apply_server_xml_defaults()
            .unwrap()
            .apply_environment([("port", "2")]);

        assert_eq!(store.get("port"), Some("2"));
        assert_eq!(store.resolve("${port}").text, "2");
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "server.xml",
            r#"<server><variable name="k" value="server-xml"/></server>"#,
        );
        write(tmp.path(), "bootstrap.properties", "k=bootstrap\nb=bootstrap\n");
        write(tmp.path(), "server.env", "k=server-env\ne=server-env\n");
        write(tmp.path(), "variables/k", "variables\n");

        let mut store = store_for(tmp.path());
        store
            .apply_environment([("k", "env"), ("e", "env")])
            .apply_server_env()
            .unwrap();
        assert_eq!(store.get("k"), Some("server-env"));
        assert_eq!(store.get("e"), Some("server-env"));

        store
            .apply_bootstrap_properties(Vec::<(String, String)>::new())
            .unwrap();
        assert_eq!(store.get("k"), Some("bootstrap"));

        store.apply_system_properties([("k", "system")]);
        assert_eq!(store.get("k"), Some("system"));

        store.apply_variables_directories().unwrap();
        assert_eq!(store.get("k"), Some("variables"));
        assert_eq!(store.source_of("k"), Some(Tier::VariablesDirectory));

        store.apply_server_xml_values().unwrap();
        assert_eq!(store.get("k"), Some("server-xml"));

        store.apply_command_line([("k", "cli")]);
        assert_eq!(store.get("k"), Some("cli"));
        assert_eq!(store.source_of("k"), Some(Tier::CommandLine));
        assert_eq!(store.get("b"), Some("bootstrap"));
    }

    #[test]
    fn test_server_env_order() {
        let tmp = tempfile::tempdir().unwrap();
        let install = tmp.path();
        let config = install.join("usr/servers/s1");
        write(install, "etc/server.env", "A=etc\nB=etc\nC=etc\n");
        write(install, "usr/shared/server.env", "B=shared\nC=shared\n");
        write(&config, "server.env", "export C=config\n");

        let mut store = PropertyStore::new(ServerLayout::infer(&config));
        store.apply_server_env().unwrap();

        assert_eq!(store.get("A"), Some("etc"));
        assert_eq!(store.get("B"), Some("shared"));
        assert_eq!(store.get("C"), Some("config"));
        assert_eq!(store.source_of("C"), Some(Tier::ServerEnv));
    }

    #[test]
    fn test_missing_server_env_is_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_for(tmp.path());
        store.apply_server_env().unwrap();

        assert_eq!(
            store.diagnostics().iter().next(),
            Some(&Diagnostic::MissingResource {
                kind: ResourceKind::ServerEnv,
                path: tmp.path().join("server.env"),
            })
        );
    }

    #[test]
    fn test_bootstrap_include_loads_first() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "bootstrap.properties",
            "bootstrap.include=conf/common.properties\nshared=mine\n",
        );
        write(
            tmp.path(),
            "conf/common.properties",
            "shared=common\nonly.common=yes\n",
        );

        let mut store = store_for(tmp.path());
        store
            .apply_bootstrap_properties([("override", "caller")])
            .unwrap();

        assert_eq!(store.get("shared"), Some("mine"));
        assert_eq!(store.get("only.common"), Some("yes"));
        assert_eq!(store.get("override"), Some("caller"));
    }

    #[test]
    fn test_bootstrap_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "bootstrap.properties", "a=file\n");

        let mut store = store_for(tmp.path());
        store.apply_bootstrap_properties([("a", "override")]).unwrap();
        assert_eq!(store.get("a"), Some("override"));
    }

    #[test]
    fn test_bootstrap_include_cycle_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "bootstrap.properties",
            "bootstrap.include=other.properties\nroot=1\n",
        );
        write(
            tmp.path(),
            "other.properties",
            "bootstrap.include=bootstrap.properties\nother=2\n",
        );

        let mut store = store_for(tmp.path());
        store
            .apply_bootstrap_properties(Vec::<(String, String)>::new())
            .unwrap();

        assert_eq!(store.get("root"), Some("1"));
        assert_eq!(store.get("other"), Some("2"));
        assert!(store
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::IncludeCycle { .. })));
    }

    #[test]
    fn test_variables_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "variables/http.port", "  9080\n");
        write(tmp.path(), "variables/db/password", "secret");
        write(tmp.path(), "variables/.hidden", "nope");
        write(tmp.path(), "variables/.git/config", "nope");
        write(tmp.path(), "variables/extra.properties", "from.props=1\n");

        let mut store = store_for(tmp.path());
        store.apply_variables_directories().unwrap();

        assert_eq!(store.get("http.port"), Some("9080"));
        let nested = format!("db{}password", MAIN_SEPARATOR_STR);
        assert_eq!(store.get(&nested), Some("secret"));
        assert_eq!(store.get(".hidden"), None);
        let hidden_nested = format!(".git{}config", MAIN_SEPARATOR_STR);
        assert_eq!(store.get(&hidden_nested), None);
        assert_eq!(store.get("from.props"), Some("1"));
        assert_eq!(store.get("extra.properties"), None);
    }

    #[test]
    fn test_variable_source_dirs_earlier_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        write(&first, "a", "first");
        write(&second, "a", "second");
        write(&second, "b", "second");
        write(tmp.path(), "variables/c", "primary");

        let list = std::env::join_paths([&first, &second])
            .unwrap()
            .into_string()
            .unwrap();

        let mut store = store_for(tmp.path());
        store
            .apply_environment([(VARIABLE_SOURCE_DIRS.to_string(), list)])
            .apply_variables_directories()
            .unwrap();

        assert_eq!(store.get("a"), Some("first"));
        assert_eq!(store.get("b"), Some("second"));
        assert_eq!(store.get("c"), Some("primary"));
    }

    #[test]
    fn test_missing_variables_directory_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_for(tmp.path()).with_variables_dir(tmp.path().join("nope"));
        store.apply_variables_directories().unwrap();

        assert!(store.resolved_properties().is_empty());
        assert_eq!(store.diagnostics().len(), 1);
    }

    #[test]
    fn test_location_variables_seeded() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_for(tmp.path());
        store.apply_location_variables();

        assert_eq!(
            store.get("server.config.dir"),
            Some(tmp.path().display().to_string().as_str())
        );
        assert_eq!(store.source_of("server.config.dir"), Some(Tier::Location));
    }

    #[test]
    fn test_mangled_lookup_through_store() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_for(tmp.path());
        store.apply_environment([("X_Y", "from-env")]);

        assert_eq!(store.resolve("${x.y}").text, "from-env");
        assert_eq!(
            store.resolve_key("x.y").map(|s| s.text),
            Some("from-env".to_string())
        );
    }

    #[test]
    fn test_typed_access() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_for(tmp.path());
        store.apply_command_line([
            ("port", " ${base.port}"),
            ("base.port", "9080"),
            ("secure", "TRUE"),
            ("bad", "${undefined}"),
        ]);

        assert_eq!(store.get_i64("port").unwrap(), Some(9080));
        assert_eq!(store.get_bool("secure").unwrap(), Some(true));
        assert_eq!(store.get_i64("missing").unwrap(), None);

        let err = store.get_i64("bad").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ConfigurationFormat);
        assert_eq!(err.key.as_deref(), Some("bad"));
        assert!(store.get_bool("port").is_err());
    }

    #[test]
    fn test_include_location_substituted() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "server.xml",
            r#"<server><include location="${conf.dir}/extra.xml"/></server>"#,
        );
        write(
            tmp.path(),
            "conf/extra.xml",
            r#"<server><variable name="x" value="1"/></server>"#,
        );

        let mut store = store_for(tmp.path());
        store
            .apply_command_line([("conf.dir", tmp.path().join("conf").display().to_string())])
            .apply_server_xml_values()
            .unwrap();

        assert_eq!(store.get("x"), Some("1"));
    }

    #[test]
    fn test_build_runs_all_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "server.xml",
            r#"<server>
                <variable name="host" defaultValue="localhost"/>
                <variable name="url" value="http://${host}:${http.port}"/>
            </server>"#,
        );
        write(tmp.path(), "server.env", "HTTP_PORT=9080\n");

        let options = StoreOptions::new()
            .with_process_env(false)
            .with_command_line_var("extra", "yes");
        let store = PropertyStore::build(ServerLayout::new(tmp.path()), &options).unwrap();

        assert_eq!(store.resolve("${url}").text, "http://localhost:9080");
        assert_eq!(store.get("extra"), Some("yes"));
        assert!(store.get("server.config.dir").is_some());
    }
}
