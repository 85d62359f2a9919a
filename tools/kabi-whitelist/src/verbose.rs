//! Diagnostic output on stderr.
//!
//! `-q` keeps stderr to errors only, `-v` adds settings, counts and stage
//! timings. The whitelist may be written to stdout, so nothing here ever
//! touches it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use kabi::check::MissingSymbol;

const QUIET: u8 = 0;
const NORMAL: u8 = 1;
const VERBOSE: u8 = 2;

static LEVEL: AtomicU8 = AtomicU8::new(NORMAL);

fn level_for(quiet: bool, verbose: bool) -> u8 {
    match (quiet, verbose) {
        (true, _) => QUIET,
        (false, true) => VERBOSE,
        (false, false) => NORMAL,
    }
}

/// Set the process-wide level from the `-q`/`-v` flags.
pub fn init(quiet: bool, verbose: bool) {
    LEVEL.store(level_for(quiet, verbose), Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    LEVEL.load(Ordering::Relaxed) >= VERBOSE
}

fn is_quiet() -> bool {
    LEVEL.load(Ordering::Relaxed) == QUIET
}

/// `eprintln!` that only fires under `-v`.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// Run one pipeline stage, printing how long it took under `-v`.
pub fn stage<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    if is_verbose() {
        eprintln!("  {label}: {:.1?}", start.elapsed());
    }
    out
}

/// Print one line per unresolved reference unless `-q` was given.
pub fn missing_report(missing: &[MissingSymbol]) {
    if !is_quiet() {
        for record in missing {
            eprintln!("{record}");
        }
    }
    vprintln!("{} unresolved references", missing.len());
}

/// Warn about entries the binary scan had to skip, unless `-q` was given.
pub fn unreadable(paths: &[PathBuf]) {
    if !is_quiet() {
        for path in paths {
            eprintln!("warning: skipped unreadable {}", path.display());
        }
    }
}

/// Print the considered modules, sorted by name. Requested explicitly with
/// `--print-modules`, so `-q` does not hide it.
pub fn module_list(mut names: Vec<String>) {
    names.sort();
    eprintln!("Considering the following modules:");
    for name in &names {
        eprintln!("  {name}");
    }
}
