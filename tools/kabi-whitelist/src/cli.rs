//! Command-line interface definitions for kabi-whitelist.

use std::path::PathBuf;

use clap::Parser;

/// Extract the kernel symbols a set of modules depends on and write an ABI
/// whitelist.
#[derive(Parser, Debug)]
#[command(name = "kabi-whitelist", version, about)]
pub struct Cli {
    /// Directory to scan for `vmlinux` and `*.ko` files.
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Whitelist output file (default: standard output).
    #[arg(long, value_name = "PATH")]
    pub whitelist: Option<PathBuf>,

    /// Count symbols exported by modules as available, not just vmlinux exports.
    #[arg(long)]
    pub include_module_exports: bool,

    /// Also write one standalone whitelist per module next to the whitelist.
    #[arg(long)]
    pub emit_module_whitelists: bool,

    /// Put every referenced export in the common section instead of grouping by module.
    #[arg(long)]
    pub skip_module_grouping: bool,

    /// Do not report symbols that modules need but nothing exports.
    #[arg(long)]
    pub skip_report_missing: bool,

    /// Only consider modules whose file name matches this glob (repeatable).
    #[arg(long = "module-filter", value_name = "PATTERN")]
    pub module_filters: Vec<String>,

    /// Print the modules being considered.
    #[arg(long)]
    pub print_modules: bool,

    /// Symbol always placed in the common section, in addition to the configured set (repeatable).
    #[arg(long = "always-include", value_name = "SYMBOL")]
    pub always_include: Vec<String>,

    /// Configuration file (default: `kabi.toml` in the scanned directory, if present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Symbol listing program (must accept `--undefined-only` and `--defined-only`).
    #[arg(long, value_name = "PROGRAM")]
    pub nm: Option<PathBuf>,

    /// Per-invocation timeout for the listing program in seconds (0 = no timeout).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of parallel workers (0 or omitted = auto-detect from CPU count).
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Only print errors.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print timings and extraction details.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
