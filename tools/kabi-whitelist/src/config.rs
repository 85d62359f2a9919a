//! Configuration loading and resolution.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags, an optional `kabi.toml`, and built-in defaults. Everything is
//! validated here, before any binary is inspected.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kabi::inspect::{DEFAULT_NM, DEFAULT_TIMEOUT};
use kabi::locate::ModuleFilter;
use kabi::symbol::validate_symbol;
use kabi::whitelist::{DEFAULT_ALWAYS_INCLUDE, Destination, validate_destination};
use serde::Deserialize;

use crate::cli::Cli;

/// Config file looked up in the scanned directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "kabi.toml";

/// Top-level configuration loaded from `kabi.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
}

/// `[whitelist]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistConfig {
    /// Replaces the built-in always-included set when present.
    #[serde(default, rename = "always-include")]
    pub always_include: Option<Vec<String>>,
}

/// `[inspector]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InspectorConfig {
    pub nm: Option<PathBuf>,
    /// Seconds; 0 disables the timeout.
    pub timeout: Option<u64>,
    pub jobs: Option<usize>,
}

/// Parse a config file's contents.
pub fn parse(text: &str) -> Result<ConfigFile> {
    toml::from_str(text).context("parsing configuration")
}

/// Load the config file named on the command line, or `kabi.toml` from
/// `root` if it exists, or the defaults.
pub fn load(explicit: Option<&Path>, root: &Path) -> Result<ConfigFile> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = root.join(CONFIG_FILE_NAME);
            if !implicit.is_file() {
                return Ok(ConfigFile::default());
            }
            implicit
        }
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse(&text).with_context(|| format!("in {}", path.display()))
}

/// Fully resolved run settings.
#[derive(Debug)]
pub struct Settings {
    pub root: PathBuf,
    pub destination: Destination,
    pub include_module_exports: bool,
    pub emit_module_whitelists: bool,
    pub module_grouping: bool,
    pub report_missing: bool,
    pub print_modules: bool,
    pub filter: ModuleFilter,
    pub always_include: Vec<String>,
    pub nm: PathBuf,
    pub timeout: Option<Duration>,
    pub jobs: usize,
}

/// Merge command-line flags over the config file and validate the result.
pub fn resolve(cli: &Cli, file: ConfigFile) -> Result<Settings> {
    let destination = match cli.whitelist.as_deref() {
        None => Destination::Stdout,
        Some(path) if path == Path::new("-") => Destination::Stdout,
        Some(path) => Destination::File(path.to_path_buf()),
    };
    validate_destination(&destination, cli.emit_module_whitelists)?;

    let filter = ModuleFilter::new(&cli.module_filters)?;

    let mut always_include = file.whitelist.always_include.unwrap_or_else(|| {
        DEFAULT_ALWAYS_INCLUDE.iter().map(|s| (*s).to_string()).collect()
    });
    always_include.extend(cli.always_include.iter().cloned());
    for symbol in &always_include {
        validate_symbol(symbol).context("always-included symbol")?;
    }

    let timeout_secs = cli.timeout.or(file.inspector.timeout);
    let timeout = match timeout_secs {
        None => Some(DEFAULT_TIMEOUT),
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
    };

    Ok(Settings {
        root: cli.root.clone(),
        destination,
        include_module_exports: cli.include_module_exports,
        emit_module_whitelists: cli.emit_module_whitelists,
        module_grouping: !cli.skip_module_grouping,
        // Filtering breaks inter-module dependency closure.
        report_missing: !cli.skip_report_missing && filter.is_empty(),
        print_modules: cli.print_modules,
        filter,
        always_include,
        nm: cli
            .nm
            .clone()
            .or(file.inspector.nm)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NM)),
        timeout,
        jobs: cli.jobs.or(file.inspector.jobs).unwrap_or(0),
    })
}

/// Print resolved settings (verbose mode).
pub fn print_settings(settings: &Settings) {
    eprintln!("Settings:");
    eprintln!("  root: {}", settings.root.display());
    match &settings.destination {
        Destination::Stdout => eprintln!("  whitelist: <stdout>"),
        Destination::File(path) => eprintln!("  whitelist: {}", path.display()),
    }
    eprintln!("  include-module-exports: {}", settings.include_module_exports);
    eprintln!("  emit-module-whitelists: {}", settings.emit_module_whitelists);
    eprintln!("  module-grouping: {}", settings.module_grouping);
    eprintln!("  report-missing: {}", settings.report_missing);
    eprintln!("  always-include: {}", settings.always_include.join(", "));
    eprintln!("  nm: {}", settings.nm.display());
    match settings.timeout {
        Some(t) => eprintln!("  timeout: {}s", t.as_secs()),
        None => eprintln!("  timeout: none"),
    }
    eprintln!("  jobs: {}", settings.jobs);
}
