//! ABI whitelist construction and output.
//!
//! A whitelist lists the exported symbols modules depend on. Symbols used by
//! more than one module are factored into a common section; the rest are
//! listed under the single module that needs them:
//!
//! ```text
//! [abi_whitelist]
//! # commonly used symbols
//!   alpha
//!   module_layout
//!
//! # required by m2.ko
//!   beta
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::symbol::{ModuleSymbols, symbol_sort};

/// Section header that opens every whitelist document.
pub const SECTION_HEADER: &str = "[abi_whitelist]";

/// Symbols placed in the common section of every whitelist by default.
pub const DEFAULT_ALWAYS_INCLUDE: &[&str] = &["module_layout"];

/// Whitelist construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistOptions {
    /// Only symbols used by several modules go to the common section.
    /// When disabled every referenced export is common.
    pub module_grouping: bool,
    /// Symbols always placed in the common section.
    pub always_include: Vec<String>,
}

impl Default for WhitelistOptions {
    fn default() -> Self {
        Self {
            module_grouping: true,
            always_include: DEFAULT_ALWAYS_INCLUDE.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Symbols only one module (or no other module) needs beyond the common set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSection {
    /// Module identity.
    pub module: String,
    /// Sorted symbols.
    pub symbols: Vec<String>,
}

/// A complete whitelist document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    /// Sorted common symbols.
    pub common: Vec<String>,
    /// Per-module sections in module discovery order.
    pub sections: Vec<ModuleSection>,
    grouped: bool,
}

/// Build the whitelist for `undefined` references against `universe`.
pub fn build(
    undefined: &ModuleSymbols,
    universe: &BTreeSet<String>,
    options: &WhitelistOptions,
) -> Result<Whitelist> {
    // Number of distinct modules referencing each symbol.
    let mut usage: HashMap<&str, usize> = HashMap::new();
    for (_, symbols) in undefined.iter() {
        let distinct: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        for symbol in distinct {
            *usage.entry(symbol).or_default() += 1;
        }
    }

    let shared = usage
        .iter()
        .filter(|&(symbol, &count)| {
            (count > 1 || !options.module_grouping) && universe.contains(*symbol)
        })
        .map(|(symbol, _)| *symbol);
    let common = symbol_sort(shared.chain(options.always_include.iter().map(String::as_str)))?;

    let common_set: HashSet<&str> = common.iter().map(String::as_str).collect();
    let mut sections = Vec::new();
    for (module, symbols) in undefined.iter() {
        let own = symbol_sort(
            symbols
                .iter()
                .filter(|s| universe.contains(*s) && !common_set.contains(s.as_str())),
        )?;
        if !own.is_empty() {
            sections.push(ModuleSection {
                module: module.to_string(),
                symbols: own,
            });
        }
    }

    Ok(Whitelist {
        common,
        sections,
        grouped: options.module_grouping,
    })
}

impl Whitelist {
    /// Render the document as text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(SECTION_HEADER);
        out.push('\n');
        if self.grouped {
            out.push_str("# commonly used symbols\n");
        }
        push_symbols(&mut out, &self.common);
        for section in &self.sections {
            let _ = write!(out, "\n# required by {}\n", section.module);
            push_symbols(&mut out, &section.symbols);
        }
        out
    }
}

fn push_symbols(out: &mut String, symbols: &[String]) {
    for symbol in symbols {
        let _ = writeln!(out, "  {symbol}");
    }
}

/// Sorted symbols a module needs on its own: its references that are exported.
pub fn module_whitelist(symbols: &[String], universe: &BTreeSet<String>) -> Result<Vec<String>> {
    symbol_sort(symbols.iter().filter(|s| universe.contains(*s)))
}

/// Render a standalone whitelist for one module.
pub fn render_module_whitelist(symbols: &[String], universe: &BTreeSet<String>) -> Result<String> {
    let mut out = String::new();
    out.push_str(SECTION_HEADER);
    out.push('\n');
    push_symbols(&mut out, &module_whitelist(symbols, universe)?);
    Ok(out)
}

/// Path of the standalone whitelist for `module`: `<whitelist>_<module stem>`.
pub fn module_whitelist_path(whitelist: &Path, module: &str) -> PathBuf {
    let stem = Path::new(module)
        .file_stem()
        .map_or_else(|| module.to_string(), |s| s.to_string_lossy().into_owned());
    let mut name = whitelist.as_os_str().to_os_string();
    name.push("_");
    name.push(stem);
    PathBuf::from(name)
}

/// Where a whitelist document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Standard output.
    Stdout,
    /// A file, created or truncated.
    File(PathBuf),
}

impl Destination {
    fn label(&self) -> PathBuf {
        match self {
            Self::Stdout => PathBuf::from("<stdout>"),
            Self::File(path) => path.clone(),
        }
    }
}

/// Reject option combinations that cannot be written.
///
/// Per-module whitelists are named after the main whitelist file, so they
/// need a real path.
pub fn validate_destination(destination: &Destination, emit_module_whitelists: bool) -> Result<()> {
    if emit_module_whitelists && *destination == Destination::Stdout {
        return Err(Error::MissingWhitelistPath);
    }
    Ok(())
}

/// Render the whitelist and, if requested, every per-module whitelist.
///
/// Nothing is written here; the returned documents go to
/// [`write_documents`] once they are all rendered.
pub fn documents(
    whitelist: &Whitelist,
    undefined: &ModuleSymbols,
    universe: &BTreeSet<String>,
    destination: &Destination,
    emit_module_whitelists: bool,
) -> Result<Vec<(Destination, String)>> {
    validate_destination(destination, emit_module_whitelists)?;

    let mut docs = Vec::new();
    if let (true, Destination::File(base)) = (emit_module_whitelists, destination) {
        for (module, symbols) in undefined.iter() {
            docs.push((
                Destination::File(module_whitelist_path(base, module)),
                render_module_whitelist(symbols, universe)?,
            ));
        }
    }
    docs.push((destination.clone(), whitelist.render()));
    Ok(docs)
}

/// Write rendered documents in order.
pub fn write_documents(docs: &[(Destination, String)]) -> Result<()> {
    for (destination, contents) in docs {
        write_one(destination, contents).map_err(|source| Error::WhitelistWriteFailed {
            path: destination.label(),
            source,
        })?;
    }
    Ok(())
}

fn write_one(destination: &Destination, contents: &str) -> std::io::Result<()> {
    match destination {
        Destination::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(contents.as_bytes())?;
            out.flush()
        }
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)
        }
    }
}
