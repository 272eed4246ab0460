//! Directory layout of a server installation
//!
//! A server's configuration directory conventionally lives at
//! `<install>/usr/servers/<name>`. The layout knows where to find the files
//! that feed feature and variable resolution and which location variables
//! (`server.config.dir`, `wlp.user.dir`, ...) describe it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// File name of the primary configuration document
pub const SERVER_XML: &str = "server.xml";
/// File name of the bootstrap properties
pub const BOOTSTRAP_PROPERTIES: &str = "bootstrap.properties";
/// File name of the server environment files
pub const SERVER_ENV: &str = "server.env";
/// Name of the default variables directory inside the configuration directory
pub const VARIABLES_DIR: &str = "variables";
/// Directory holding the configuration overlays
pub const CONFIG_DROPINS: &str = "configDropins";

/// Locations of one server's configuration inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    /// Server configuration directory (contains `server.xml`)
    pub config_dir: PathBuf,
    /// Server output directory; defaults to the configuration directory
    pub output_dir: Option<PathBuf>,
    /// User directory (`<install>/usr`), holding `shared/`
    pub user_dir: Option<PathBuf>,
    /// Installation root, holding `etc/`
    pub install_dir: Option<PathBuf>,
}

impl ServerLayout {
    /// Create a layout that only knows the configuration directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            output_dir: None,
            user_dir: None,
            install_dir: None,
        }
    }

    /// Create a layout from a configuration directory, inferring the user and
    /// install directories when it sits at `<install>/usr/servers/<name>`
    pub fn infer(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let mut layout = Self::new(config_dir.clone());

        let servers = config_dir.parent();
        if servers.and_then(Path::file_name).is_some_and(|n| n == "servers") {
            layout.user_dir = servers.and_then(Path::parent).map(Path::to_path_buf);
            layout.install_dir = layout
                .user_dir
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf);
        }

        log::trace!(
            "Inferred layout for {}: user_dir={:?}, install_dir={:?}",
            config_dir.display(),
            layout.user_dir,
            layout.install_dir
        );
        layout
    }

    /// Set the user directory
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    /// Set the installation root
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Name of the server (the configuration directory's name)
    pub fn server_name(&self) -> Option<&str> {
        self.config_dir.file_name().and_then(|n| n.to_str())
    }

    pub fn server_xml(&self) -> PathBuf {
        self.config_dir.join(SERVER_XML)
    }

    pub fn bootstrap_properties(&self) -> PathBuf {
        self.config_dir.join(BOOTSTRAP_PROPERTIES)
    }

    /// Default primary variables directory
    pub fn variables_dir(&self) -> PathBuf {
        self.config_dir.join(VARIABLES_DIR)
    }

    pub fn dropins_defaults_dir(&self) -> PathBuf {
        self.config_dir.join(CONFIG_DROPINS).join("defaults")
    }

    pub fn dropins_overrides_dir(&self) -> PathBuf {
        self.config_dir.join(CONFIG_DROPINS).join("overrides")
    }

    /// `shared/` under the user directory
    pub fn shared_dir(&self) -> Option<PathBuf> {
        self.user_dir.as_ref().map(|u| u.join("shared"))
    }

    /// `server.env` locations in increasing precedence:
    /// install `etc/`, user `shared/`, then the configuration directory
    pub fn server_env_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::with_capacity(3);
        if let Some(install) = &self.install_dir {
            files.push(install.join("etc").join(SERVER_ENV));
        }
        if let Some(shared) = self.shared_dir() {
            files.push(shared.join(SERVER_ENV));
        }
        files.push(self.config_dir.join(SERVER_ENV));
        files
    }

    /// Location variables describing this layout, as far as it is known
    pub fn location_variables(&self) -> IndexMap<String, String> {
        fn dir(p: &Path) -> String {
            p.display().to_string()
        }

        let mut vars = IndexMap::new();
        vars.insert("server.config.dir".to_string(), dir(&self.config_dir));
        vars.insert(
            "server.output.dir".to_string(),
            dir(self.output_dir.as_deref().unwrap_or(&self.config_dir)),
        );
        if let Some(name) = self.server_name() {
            vars.insert("wlp.server.name".to_string(), name.to_string());
        }
        if let Some(user) = &self.user_dir {
            vars.insert("wlp.user.dir".to_string(), dir(user));
        }
        if let Some(shared) = self.shared_dir() {
            vars.insert("shared.config.dir".to_string(), dir(&shared.join("config")));
            vars.insert("shared.app.dir".to_string(), dir(&shared.join("apps")));
            vars.insert(
                "shared.resource.dir".to_string(),
                dir(&shared.join("resources")),
            );
        }
        if let Some(install) = &self.install_dir {
            vars.insert("wlp.install.dir".to_string(), dir(install));
        }
        vars
    }
}
