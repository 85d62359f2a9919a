//! Symbol extraction from kernel binaries.
//!
//! Parses inspector listings into undefined references and exported
//! definitions, and runs every extraction for a set of binaries on a bounded
//! worker pool. Nothing downstream sees results until every job has finished.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};

use crate::error::{Error, Result};
use crate::inspect::SymbolInspector;
use crate::locate::module_name;
use crate::symbol::{ModuleSymbols, symbol_sort};

/// Marker that precedes a symbol name in the export table.
pub const EXPORT_MARKER: &str = " __ksymtab_";

/// Parse an undefined-only listing. The symbol name is the second field.
pub fn parse_undefined(binary: &Path, listing: &str) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_whitespace().nth(1) {
            Some(name) => symbols.push(name.to_string()),
            None => {
                return Err(Error::MalformedSymbolListing {
                    binary: binary.to_path_buf(),
                    line: line.to_string(),
                });
            }
        }
    }
    Ok(symbols)
}

/// Parse a defined-only listing, keeping only symbols under the export marker.
pub fn parse_exported(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let pos = line.find(EXPORT_MARKER)?;
            let name = line[pos + EXPORT_MARKER.len()..].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Sorted undefined references of `binary`.
pub fn extract_undefined<I>(inspector: &I, binary: &Path) -> Result<Vec<String>>
where
    I: SymbolInspector + ?Sized,
{
    let listing = inspector.list_undefined(binary)?;
    symbol_sort(parse_undefined(binary, &listing)?)
}

/// Sorted exported symbols of `binary`.
pub fn extract_exported<I>(inspector: &I, binary: &Path) -> Result<Vec<String>>
where
    I: SymbolInspector + ?Sized,
{
    let listing = inspector.list_defined(binary)?;
    symbol_sort(parse_exported(&listing))
}

/// Knobs for [`extract_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Also extract the exports of every module.
    pub module_exports: bool,
    /// Maximum number of parallel workers (0 = available parallelism).
    pub jobs: usize,
}

/// Everything extracted from one kernel image and its modules.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Symbols exported by the kernel image.
    pub kernel_exports: Vec<String>,
    /// Union of the symbols exported by every module, including modules
    /// that share a base name. Empty unless requested.
    pub module_exports: BTreeSet<String>,
    /// Undefined references of each module.
    pub undefined: ModuleSymbols,
}

impl Extraction {
    /// Kernel exports plus every module's exports.
    pub fn all_exports(&self) -> BTreeSet<String> {
        let mut all = self.module_exports.clone();
        all.extend(self.kernel_exports.iter().cloned());
        all
    }

    /// Symbols considered available for whitelisting.
    pub fn export_universe(&self, include_module_exports: bool) -> BTreeSet<String> {
        if include_module_exports {
            self.all_exports()
        } else {
            self.kernel_exports.iter().cloned().collect()
        }
    }
}

/// One unit of extraction work.
#[derive(Debug, Clone, Copy)]
enum Job {
    KernelExports,
    Undefined(usize),
    ModuleExports(usize),
}

/// Extract everything needed for analysis from `kernel_image` and `modules`.
///
/// Jobs run concurrently on up to `options.jobs` workers. Each job has its
/// own result slot; if any job fails the earliest failure (in job order) is
/// returned and no partial extraction escapes.
pub fn extract_all<I>(
    inspector: &I,
    kernel_image: &Path,
    modules: &[PathBuf],
    options: ExtractOptions,
) -> Result<Extraction>
where
    I: SymbolInspector + ?Sized,
{
    let mut jobs = vec![Job::KernelExports];
    jobs.extend((0..modules.len()).map(Job::Undefined));
    if options.module_exports {
        jobs.extend((0..modules.len()).map(Job::ModuleExports));
    }

    let run_job = |job: Job| -> Result<Vec<String>> {
        match job {
            Job::KernelExports => extract_exported(inspector, kernel_image),
            Job::Undefined(i) => extract_undefined(inspector, &modules[i]),
            Job::ModuleExports(i) => extract_exported(inspector, &modules[i]),
        }
    };

    let num_workers = match options.jobs {
        0 => std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
        n => n,
    }
    .min(jobs.len());

    let mut slots: Vec<Option<Result<Vec<String>>>> = Vec::with_capacity(jobs.len());
    slots.resize_with(jobs.len(), || None);

    let (job_tx, job_rx) = mpsc::channel::<usize>();
    let (result_tx, result_rx) = mpsc::channel::<(usize, Result<Vec<String>>)>();
    let job_rx = Mutex::new(job_rx);

    for idx in 0..jobs.len() {
        // The receiver lives until the scope below ends.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    let jobs_ref = &jobs;
    let job_rx_ref = &job_rx;
    let run_job_ref = &run_job;

    std::thread::scope(|s| {
        for _ in 0..num_workers {
            let tx = result_tx.clone();
            s.spawn(move || {
                loop {
                    let next = match job_rx_ref.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(idx) = next else { break };
                    let outcome = run_job_ref(jobs_ref[idx]);
                    if tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (idx, outcome) in result_rx.iter() {
            slots[idx] = Some(outcome);
        }
    });

    let mut extraction = Extraction::default();
    for (job, slot) in jobs.iter().zip(slots) {
        let Some(outcome) = slot else {
            return Err(Error::InspectionFailed {
                binary: job_binary(*job, kernel_image, modules).to_path_buf(),
                reason: "extraction worker exited without a result".into(),
                source: None,
            });
        };
        let symbols = outcome?;
        match *job {
            Job::KernelExports => extraction.kernel_exports = symbols,
            Job::Undefined(i) => extraction.undefined.insert(module_name(&modules[i]), symbols),
            Job::ModuleExports(_) => extraction.module_exports.extend(symbols),
        }
    }
    Ok(extraction)
}

fn job_binary<'a>(job: Job, kernel_image: &'a Path, modules: &'a [PathBuf]) -> &'a Path {
    match job {
        Job::KernelExports => kernel_image,
        Job::Undefined(i) | Job::ModuleExports(i) => &modules[i],
    }
}
