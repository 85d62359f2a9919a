//! Cross-check of module references against exported symbols.

use std::collections::BTreeSet;
use std::fmt;

use crate::symbol::ModuleSymbols;

/// A symbol a module needs that no binary exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSymbol {
    /// Module identity.
    pub module: String,
    /// The unresolved symbol.
    pub symbol: String,
}

impl fmt::Display for MissingSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Symbol {} required by {} but not provided",
            self.symbol, self.module
        )
    }
}

/// Every `(module, symbol)` reference that `exported` does not satisfy.
///
/// Records follow module discovery order, then each module's symbol order.
pub fn find_missing(undefined: &ModuleSymbols, exported: &BTreeSet<String>) -> Vec<MissingSymbol> {
    undefined
        .iter()
        .flat_map(|(module, symbols)| {
            symbols
                .iter()
                .filter(move |s| !exported.contains(*s))
                .map(move |s| MissingSymbol {
                    module: module.to_string(),
                    symbol: s.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn reports_each_unresolved_reference_once() {
        let mut undefined = ModuleSymbols::new();
        undefined.insert("m.ko", vec!["alpha".into(), "ghost_fn".into()]);
        undefined.insert("n.ko", vec!["alpha".into()]);

        let missing = find_missing(&undefined, &set(&["alpha", "beta"]));
        assert_eq!(
            missing,
            [MissingSymbol {
                module: "m.ko".into(),
                symbol: "ghost_fn".into(),
            }]
        );
        assert_eq!(
            missing[0].to_string(),
            "Symbol ghost_fn required by m.ko but not provided"
        );
    }

    #[test]
    fn nothing_missing_when_all_resolved() {
        let mut undefined = ModuleSymbols::new();
        undefined.insert("m.ko", vec!["alpha".into()]);
        assert!(find_missing(&undefined, &set(&["alpha"])).is_empty());
    }

    #[test]
    fn same_symbol_missing_from_two_modules() {
        let mut undefined = ModuleSymbols::new();
        undefined.insert("a.ko", vec!["x".into()]);
        undefined.insert("b.ko", vec!["x".into()]);
        let missing = find_missing(&undefined, &BTreeSet::new());
        let modules: Vec<_> = missing.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(modules, ["a.ko", "b.ko"]);
    }
}
