//! Kernel module ABI analysis.
//!
//! Works out which exported kernel symbols a set of loadable modules depends
//! on and writes that down as an ABI whitelist. The pipeline is:
//!
//! 1. [`locate`] the kernel image and modules under a directory,
//! 2. [`extract`] undefined references and exported symbols through a
//!    [`inspect::SymbolInspector`],
//! 3. [`check`] references against exports,
//! 4. build and write the [`whitelist`].
//!
//! All symbol lists are ordered with [`symbol::symbol_sort`] so output is
//! stable between runs.

pub mod check;
pub mod error;
pub mod extract;
pub mod inspect;
pub mod locate;
pub mod symbol;
pub mod whitelist;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use crate::check::find_missing;
    use crate::extract::{ExtractOptions, extract_all};
    use crate::inspect::fixture::FixtureInspector;
    use crate::locate::ModuleFilter;
    use crate::whitelist::{WhitelistOptions, build};

    fn scenario() -> FixtureInspector {
        FixtureInspector::default()
            .exports("vmlinux", &["alpha", "beta"])
            .undefined("m1.ko", &["alpha"])
            .undefined("m2.ko", &["alpha", "beta"])
    }

    #[test]
    fn vmlinux_with_two_modules() {
        let modules = [PathBuf::from("m1.ko"), PathBuf::from("m2.ko")];
        let ex = extract_all(&scenario(), Path::new("vmlinux"), &modules, ExtractOptions::default())
            .unwrap();
        let wl = build(&ex.undefined, &ex.export_universe(false), &WhitelistOptions::default())
            .unwrap();

        assert_eq!(wl.common, ["alpha", "module_layout"]);
        assert_eq!(wl.sections.len(), 1);
        assert_eq!(wl.sections[0].module, "m2.ko");
        assert_eq!(wl.sections[0].symbols, ["beta"]);
    }

    #[test]
    fn filter_matching_nothing_leaves_only_always_included() {
        let modules = vec![PathBuf::from("m1.ko"), PathBuf::from("m2.ko")];
        let modules = ModuleFilter::new(&["nothing_*"]).unwrap().apply(modules);
        assert!(modules.is_empty());

        let ex = extract_all(&scenario(), Path::new("vmlinux"), &modules, ExtractOptions::default())
            .unwrap();
        assert!(ex.undefined.is_empty());

        let wl = build(&ex.undefined, &ex.export_universe(false), &WhitelistOptions::default())
            .unwrap();
        assert_eq!(wl.render(), "[abi_whitelist]\n# commonly used symbols\n  module_layout\n");
    }

    #[test]
    fn ghost_symbol_reported_once() {
        let inspector = FixtureInspector::default()
            .exports("vmlinux", &["alpha"])
            .exports("helper.ko", &["helper_fn"])
            .undefined("helper.ko", &["alpha"])
            .undefined("m.ko", &["alpha", "ghost_fn", "helper_fn"]);
        let modules = [PathBuf::from("helper.ko"), PathBuf::from("m.ko")];
        let ex = extract_all(
            &inspector,
            Path::new("vmlinux"),
            &modules,
            ExtractOptions { module_exports: true, jobs: 0 },
        )
        .unwrap();

        let missing = find_missing(&ex.undefined, &ex.all_exports());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].module, "m.ko");
        assert_eq!(missing[0].symbol, "ghost_fn");
    }

    #[test]
    fn module_exports_widen_the_universe() {
        let inspector = FixtureInspector::default()
            .exports("vmlinux", &["alpha"])
            .exports("helper.ko", &["helper_fn"])
            .undefined("helper.ko", &["alpha"])
            .undefined("m.ko", &["helper_fn"]);
        let modules = [PathBuf::from("helper.ko"), PathBuf::from("m.ko")];
        let ex = extract_all(
            &inspector,
            Path::new("vmlinux"),
            &modules,
            ExtractOptions { module_exports: true, jobs: 2 },
        )
        .unwrap();
        let options = WhitelistOptions::default();

        let narrow = build(&ex.undefined, &ex.export_universe(false), &options).unwrap();
        assert_eq!(narrow.sections.len(), 1);
        assert_eq!(narrow.sections[0].module, "helper.ko");

        let wide = build(&ex.undefined, &ex.export_universe(true), &options).unwrap();
        let modules: Vec<_> = wide.sections.iter().map(|s| s.module.as_str()).collect();
        assert_eq!(modules, ["helper.ko", "m.ko"]);
        assert_eq!(wide.sections[1].symbols, ["helper_fn"]);
    }
}
