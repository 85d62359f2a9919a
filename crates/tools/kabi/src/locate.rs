//! Locating the kernel image and loadable modules under a directory.
//!
//! Classification is by file name only: `vmlinux` is the kernel image and
//! anything ending in `.ko` is a module.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File name of the kernel image.
pub const KERNEL_IMAGE_NAME: &str = "vmlinux";

/// File extension of loadable modules.
pub const MODULE_EXTENSION: &str = "ko";

/// Binaries found under a directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Binaries {
    /// The kernel image, if one was found.
    pub kernel_image: Option<PathBuf>,
    /// Loadable modules in discovery order.
    pub modules: Vec<PathBuf>,
    /// Entries below the root that could not be read and were skipped.
    pub unreadable: Vec<PathBuf>,
}

/// Walk `root` recursively and classify every regular file.
///
/// Directory entries are visited in file-name order so discovery order is
/// stable across filesystems. If several `vmlinux` files exist the last one
/// visited wins. An unreadable root is an error; unreadable entries below it
/// are recorded in [`Binaries::unreadable`] and the walk continues.
pub fn find_binaries(root: &Path) -> Result<Binaries> {
    if !root.is_dir() {
        return Err(Error::RootNotFound(root.to_path_buf()));
    }

    let mut binaries = Binaries::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() > 0 => {
                let path = err.path().unwrap_or(root).to_path_buf();
                binaries.unreadable.push(path);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let path = entry.path();
        if entry.file_name() == KERNEL_IMAGE_NAME {
            binaries.kernel_image = Some(path.to_path_buf());
        } else if path.extension().is_some_and(|ext| ext == MODULE_EXTENSION) {
            binaries.modules.push(path.to_path_buf());
        }
    }
    Ok(binaries)
}

/// Module identity used in reports: the base file name.
pub fn module_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
        .into_owned()
}

/// Shell-style patterns restricting which modules are analyzed.
#[derive(Debug, Default)]
pub struct ModuleFilter {
    patterns: Vec<glob::Pattern>,
}

impl ModuleFilter {
    /// Compile `patterns`. An empty list keeps every module.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p.as_ref()).map_err(|source| Error::InvalidModuleFilter {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns `true` if no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` if the module's base name matches any pattern.
    pub fn matches(&self, module: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let name = module_name(module);
        self.patterns.iter().any(|p| p.matches(&name))
    }

    /// Keep only matching modules, preserving order.
    pub fn apply(&self, modules: Vec<PathBuf>) -> Vec<PathBuf> {
        modules.into_iter().filter(|m| self.matches(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn classifies_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("vmlinux"));
        touch(&root.join("drivers/net/e1000.ko"));
        touch(&root.join("drivers/block/loop.ko"));
        touch(&root.join("System.map"));
        touch(&root.join("vmlinux.symvers"));
        fs::create_dir_all(root.join("fake.ko")).unwrap();

        let found = find_binaries(root).unwrap();
        assert_eq!(found.kernel_image, Some(root.join("vmlinux")));
        assert_eq!(
            found.modules,
            [
                root.join("drivers/block/loop.ko"),
                root.join("drivers/net/e1000.ko"),
            ]
        );
    }

    #[test]
    fn missing_kernel_image_is_none() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.ko"));
        let found = find_binaries(dir.path()).unwrap();
        assert!(found.kernel_image.is_none());
        assert_eq!(found.modules.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("vmlinux"));
        touch(&root.join("a/ok.ko"));
        touch(&root.join("locked/hidden.ko"));
        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let found = find_binaries(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let found = found.unwrap();
        assert_eq!(found.kernel_image, Some(root.join("vmlinux")));
        assert_eq!(found.modules, [root.join("a/ok.ko")]);
        assert_eq!(found.unreadable, [locked]);
    }

    #[test]
    fn missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_binaries(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::RootNotFound(_)));
    }

    #[test]
    fn module_name_strips_directories() {
        assert_eq!(module_name(Path::new("/lib/modules/x/virtio_net.ko")), "virtio_net.ko");
    }

    #[test]
    fn filter_matches_base_name() {
        let filter = ModuleFilter::new(&["virtio_*", "loop.ko"]).unwrap();
        let kept = filter.apply(vec![
            PathBuf::from("a/virtio_net.ko"),
            PathBuf::from("b/e1000.ko"),
            PathBuf::from("c/loop.ko"),
        ]);
        assert_eq!(kept, [PathBuf::from("a/virtio_net.ko"), PathBuf::from("c/loop.ko")]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = ModuleFilter::new::<&str>(&[]).unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(vec![PathBuf::from("x.ko")]).len(), 1);
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let err = ModuleFilter::new(&["[unclosed"]).unwrap_err();
        assert!(matches!(err, Error::InvalidModuleFilter { .. }));
    }
}
