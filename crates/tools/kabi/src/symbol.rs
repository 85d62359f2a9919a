//! Symbol ordering and per-module symbol tables.
//!
//! Every list of symbols that ends up in a report or whitelist goes through
//! [`symbol_sort`], so diffs between two runs only show real changes.
//! The ordering ignores case and underscores, which keeps `foo`, `_foo` and
//! `__foo` next to each other with the least-prefixed form first.

use crate::error::{Error, Result};

/// Comparison key for a symbol name.
///
/// Fields compare in declaration order: the folded body first, then the
/// number of leading underscores, then the raw name so the order is total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    body: String,
    leading: usize,
    raw: String,
}

/// Reject names that cannot be symbols.
pub fn validate_symbol(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidSymbol(name.to_string()));
    }
    Ok(())
}

/// Compute the ordering key for `name`.
pub fn sort_key(name: &str) -> Result<SortKey> {
    validate_symbol(name)?;
    let leading = name.chars().take_while(|&c| c == '_').count();
    let body = name
        .chars()
        .filter(|&c| c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    Ok(SortKey {
        body,
        leading,
        raw: name.to_string(),
    })
}

/// Deduplicate `symbols` and return them in symbol order.
pub fn symbol_sort<I, S>(symbols: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keyed = symbols
        .into_iter()
        .map(|s| sort_key(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_unstable();
    keyed.dedup_by(|a, b| a.raw == b.raw);
    Ok(keyed.into_iter().map(|k| k.raw).collect())
}

/// Symbols keyed by module identity, in discovery order.
///
/// Module identity is the base file name, so two modules with the same name
/// in different directories share one entry: a later insert replaces the
/// symbols but keeps the original position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleSymbols {
    entries: Vec<(String, Vec<String>)>,
}

impl ModuleSymbols {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the symbols for `module`.
    pub fn insert(&mut self, module: impl Into<String>, symbols: Vec<String>) {
        let module = module.into();
        match self.entries.iter_mut().find(|(name, _)| *name == module) {
            Some(entry) => entry.1 = symbols,
            None => self.entries.push((module, symbols)),
        }
    }

    /// Symbols for `module`, if present.
    pub fn get(&self, module: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == module)
            .map(|(_, syms)| syms.as_slice())
    }

    /// Iterate `(module, symbols)` pairs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, syms)| (name.as_str(), syms.as_slice()))
    }

    /// Module identities in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no module has been inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
