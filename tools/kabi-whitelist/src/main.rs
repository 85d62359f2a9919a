//! ABI whitelist generator for kernel modules.
//!
//! Scans a build output directory for `vmlinux` and `*.ko` files, asks
//! `llvm-nm` which symbols each module needs and which the kernel exports,
//! and writes the exported symbols the modules depend on as an ABI whitelist.
//!
//! Pipeline: resolve settings → locate binaries → filter modules →
//!           extract symbols → report missing symbols → build whitelist →
//!           write documents.

mod cli;
mod config;
mod verbose;

use anyhow::{Context, Result};
use clap::Parser;
use kabi::extract::{ExtractOptions, extract_all};
use kabi::inspect::NmInspector;
use kabi::locate::{find_binaries, module_name};
use kabi::whitelist::{self, WhitelistOptions};

use crate::verbose::vprintln;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);
    run(&cli)
}

fn run(cli: &cli::Cli) -> Result<()> {
    if !cli.root.is_dir() {
        return Err(kabi::Error::RootNotFound(cli.root.clone()).into());
    }

    // Every configuration error surfaces here, before any binary is touched.
    let file = config::load(cli.config.as_deref(), &cli.root)?;
    let settings = config::resolve(cli, file)?;
    if verbose::is_verbose() {
        config::print_settings(&settings);
    }

    let binaries = verbose::stage("binary scan", || find_binaries(&settings.root))?;
    verbose::unreadable(&binaries.unreadable);
    let found = binaries.modules.len();
    let modules = settings.filter.apply(binaries.modules);
    vprintln!("Found {found} modules, considering {}", modules.len());

    if settings.print_modules {
        verbose::module_list(modules.iter().map(|m| module_name(m)).collect());
    }

    let kernel_image = binaries
        .kernel_image
        .ok_or_else(|| kabi::Error::KernelImageNotFound(settings.root.clone()))?;
    vprintln!("Kernel image: {}", kernel_image.display());

    let inspector = NmInspector::new(&settings.nm).with_timeout(settings.timeout);
    let extract_options = ExtractOptions {
        module_exports: settings.include_module_exports || settings.report_missing,
        jobs: settings.jobs,
    };
    let extraction = verbose::stage("symbol extraction", || {
        extract_all(&inspector, &kernel_image, &modules, extract_options)
    })
    .context("extracting symbols")?;
    vprintln!(
        "Extracted {} kernel exports, undefined references of {} modules",
        extraction.kernel_exports.len(),
        extraction.undefined.len()
    );

    if settings.report_missing {
        let missing = kabi::check::find_missing(&extraction.undefined, &extraction.all_exports());
        verbose::missing_report(&missing);
    }

    let universe = extraction.export_universe(settings.include_module_exports);
    let options = WhitelistOptions {
        module_grouping: settings.module_grouping,
        always_include: settings.always_include.clone(),
    };
    let wl = verbose::stage("whitelist build", || {
        whitelist::build(&extraction.undefined, &universe, &options)
    })?;
    let docs = whitelist::documents(
        &wl,
        &extraction.undefined,
        &universe,
        &settings.destination,
        settings.emit_module_whitelists,
    )?;
    whitelist::write_documents(&docs)?;

    vprintln!(
        "Whitelist: {} common symbols, {} module sections, {} documents",
        wl.common.len(),
        wl.sections.len(),
        docs.len()
    );
    Ok(())
}
