//! srvconf CLI - inspect the resolved configuration of a server directory
//!
//! Usage:
//!   srvconf features usr/servers/defaultServer
//!   srvconf vars usr/servers/defaultServer --var http.port=9080
//!   srvconf resolve usr/servers/defaultServer 'http://${host}:${http.port}'
//!   srvconf check server.xml extra.xml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexMap;
use srvconf_core::{
    ConfigDocument, Diagnostics, FeatureResolution, FeatureResolver, ParserOptions,
    PropertyStore, ServerLayout, StoreOptions,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// srvconf - Layered server configuration resolution
#[derive(Parser, Debug)]
#[command(name = "srvconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace); otherwise RUST_LOG applies
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the enabled features of a server directory or a single document
    Features {
        /// Server configuration directory or configuration document
        path: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the variables of a server directory after all sources are applied
    Vars {
        /// Server configuration directory
        server_dir: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Show the declared defaults instead of the resolved values
        #[arg(long, conflicts_with = "sources")]
        defaults: bool,

        /// Show the source of each resolved value instead of the value
        #[arg(long)]
        sources: bool,
    },

    /// Substitute ${...} references in a piece of text
    Resolve {
        /// Server configuration directory
        server_dir: PathBuf,

        /// Text containing ${name} references
        text: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Fail when a reference cannot be resolved
        #[arg(long)]
        strict: bool,
    },

    /// Check that configuration documents parse
    Check {
        /// Configuration document(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Inputs for building a property store
#[derive(Args, Debug, Default)]
struct StoreArgs {
    /// Bootstrap property, overriding bootstrap.properties (repeatable)
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    bootstrap_overrides: Vec<(String, String)>,

    /// System property, overriding bootstrap properties (repeatable)
    #[arg(long = "system-property", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    system_properties: Vec<(String, String)>,

    /// Command-line variable, overriding every other source (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    vars: Vec<(String, String)>,

    /// Do not read the process environment
    #[arg(long)]
    no_env: bool,

    /// Primary variables directory (default: <server dir>/variables)
    #[arg(long, value_name = "DIR")]
    variables_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn options(&self) -> StoreOptions {
        let mut options = StoreOptions::new().with_process_env(!self.no_env);
        if let Some(dir) = &self.variables_dir {
            options = options.with_variables_dir(dir);
        }
        for (key, value) in &self.bootstrap_overrides {
            options = options.with_bootstrap_override(key, value);
        }
        for (key, value) in &self.system_properties {
            options = options.with_system_property(key, value);
        }
        for (key, value) in &self.vars {
            options = options.with_command_line_var(key, value);
        }
        options
    }
}

/// Parse `key=value`
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = crate::logging::init(cli.verbose) {
        eprintln!("{}: {}", "Warning: logging unavailable".yellow(), e);
    }

    match cli.command {
        Commands::Features {
            path,
            store,
            format,
        } => cmd_features(&path, &store, &format),

        Commands::Vars {
            server_dir,
            store,
            format,
            defaults,
            sources,
        } => cmd_vars(&server_dir, &store, &format, defaults, sources),

        Commands::Resolve {
            server_dir,
            text,
            store,
            strict,
        } => cmd_resolve(&server_dir, &text, &store, strict),

        Commands::Check { files } => cmd_check(files),
    }
}

fn build_store(server_dir: &Path, args: &StoreArgs) -> Result<PropertyStore, String> {
    PropertyStore::build(ServerLayout::infer(server_dir), &args.options())
        .map_err(|e| format!("Failed to load {}: {}", server_dir.display(), e))
}

/// Resolve features for a directory or a single document.
///
/// A directory gets the full dropins treatment; a document only its own
/// include graph. Either way include locations are substituted through a
/// store built for the surrounding server directory.
fn resolve_features(path: &Path, args: &StoreArgs) -> Result<FeatureResolution, String> {
    let server_dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or_else(|| Path::new("."))
    };
    let store = build_store(server_dir, args)?;
    let resolver = FeatureResolver::new().with_properties(&store);

    let resolution = if path.is_dir() {
        resolver.resolve_layout(store.layout())
    } else {
        resolver.resolve_file(path)
    };
    resolution.map_err(|e| format!("Failed to resolve features of {}: {}", path.display(), e))
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        eprintln!("{} {}", "warning:".yellow(), diagnostic);
    }
}

fn cmd_features(path: &Path, args: &StoreArgs, format: &str) -> ExitCode {
    let resolution = match resolve_features(path, args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    if format == "text" {
        print_diagnostics(&resolution.diagnostics);
    }
    match render_features(&resolution, format) {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

/// Render a feature resolution as one feature per line or as JSON
fn render_features(resolution: &FeatureResolution, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(resolution)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "text" => Ok(resolution
            .features
            .iter()
            .map(|feature| format!("{}\n", feature))
            .collect()),
        other => Err(format!("Unsupported format: {}. Use text or json.", other)),
    }
}

/// Serialize a string map as YAML or JSON
fn render_map<V: serde::Serialize>(map: &IndexMap<String, V>, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(map)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::to_string(map).map_err(|e| e.to_string()),
        other => Err(format!("Unsupported format: {}. Use yaml or json.", other)),
    }
}

fn cmd_vars(
    server_dir: &Path,
    args: &StoreArgs,
    format: &str,
    defaults: bool,
    sources: bool,
) -> ExitCode {
    let store = match build_store(server_dir, args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    print_diagnostics(store.diagnostics());

    let rendered = if sources {
        let labels: IndexMap<String, String> = store
            .sources()
            .iter()
            .map(|(key, tier)| (key.clone(), tier.to_string()))
            .collect();
        render_map(&labels, format)
    } else if defaults {
        render_map(store.default_properties(), format)
    } else {
        render_map(store.resolved_properties(), format)
    };

    match rendered {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_resolve(server_dir: &Path, text: &str, args: &StoreArgs, strict: bool) -> ExitCode {
    let store = match build_store(server_dir, args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let substitution = store.resolve(text);
    println!("{}", substitution.text);

    if substitution.is_complete() {
        return ExitCode::SUCCESS;
    }

    let names = substitution.diagnostics.unresolved_names().join(", ");
    if strict {
        eprintln!("{} Unresolved: {}", "✗".red(), names);
        ExitCode::from(1)
    } else {
        eprintln!("{} Unresolved: {}", "warning:".yellow(), names);
        ExitCode::SUCCESS
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let options = ParserOptions::default();
    let mut all_valid = true;

    for file in files {
        match ConfigDocument::load(&file, &options) {
            Ok(doc) => {
                println!(
                    "{} {}: valid ({} top-level elements)",
                    "✓".green(),
                    file.display(),
                    doc.root().children().len()
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
