//! Binary symbol inspection.
//!
//! The analysis never parses object files itself. It asks a
//! [`SymbolInspector`] for the textual symbol listing of a binary and parses
//! that. [`NmInspector`] drives `llvm-nm` (or any `nm` with the same flags)
//! as an external process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Default inspection program.
pub const DEFAULT_NM: &str = "llvm-nm";

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often a running inspector process is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of raw symbol listings for a binary.
///
/// Implementations are shared across extraction workers.
pub trait SymbolInspector: Sync {
    /// Listing of symbols the binary references but does not define,
    /// one per line as `<type> <name>`.
    fn list_undefined(&self, binary: &Path) -> Result<String>;

    /// Listing of symbols the binary defines, one per line as
    /// `<address> <type> <name>`.
    fn list_defined(&self, binary: &Path) -> Result<String>;
}

/// Inspector backed by an external `nm`-compatible program.
#[derive(Debug, Clone)]
pub struct NmInspector {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for NmInspector {
    fn default() -> Self {
        Self::new(DEFAULT_NM)
    }
}

impl NmInspector {
    /// Create an inspector running `program` with the default timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Set the per-invocation timeout. `None` waits forever.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The program this inspector runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, mode: &str, binary: &Path) -> Result<String> {
        let mut child = Command::new(&self.program)
            .arg(mode)
            .arg(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                failed(
                    binary,
                    format!("could not run {}", self.program.display()),
                    Some(e),
                )
            })?;

        // Pipes are drained on helper threads while the child is polled.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(failed(binary, "waiting for inspector".into(), Some(e))),
            }
            if let Some(limit) = self.timeout {
                if start.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(failed(
                        binary,
                        format!("{} timed out after {limit:?}", self.program.display()),
                        None,
                    ));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout)
            .map_err(|e| failed(binary, "reading inspector output".into(), Some(e)))?;
        let stderr = join_reader(stderr).unwrap_or_default();

        if !status.success() {
            let detail = String::from_utf8_lossy(&stderr);
            return Err(failed(
                binary,
                format!(
                    "{} {mode} exited with {status}: {}",
                    self.program.display(),
                    detail.trim()
                ),
                None,
            ));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl SymbolInspector for NmInspector {
    fn list_undefined(&self, binary: &Path) -> Result<String> {
        self.run("--undefined-only", binary)
    }

    fn list_defined(&self, binary: &Path) -> Result<String> {
        self.run("--defined-only", binary)
    }
}

fn failed(binary: &Path, reason: String, source: Option<std::io::Error>) -> Error {
    Error::InspectionFailed {
        binary: binary.to_path_buf(),
        reason,
        source,
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(
    handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> std::io::Result<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("output reader panicked"))),
        None => Ok(Vec::new()),
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-nm");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn passes_mode_flag_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let nm = NmInspector::new(script(dir.path(), r#"echo "$1 $2""#));
        let out = nm.list_undefined(Path::new("m.ko")).unwrap();
        assert_eq!(out.trim(), "--undefined-only m.ko");
        let out = nm.list_defined(Path::new("vmlinux")).unwrap();
        assert_eq!(out.trim(), "--defined-only vmlinux");
    }

    #[test]
    fn nonzero_exit_is_inspection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let nm = NmInspector::new(script(dir.path(), "echo 'bad file' >&2; exit 3"));
        let err = nm.list_undefined(Path::new("m.ko")).unwrap_err();
        match err {
            Error::InspectionFailed { reason, .. } => assert!(reason.contains("bad file")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_inspection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let nm = NmInspector::new(dir.path().join("does-not-exist"));
        let err = nm.list_defined(Path::new("vmlinux")).unwrap_err();
        assert!(matches!(err, Error::InspectionFailed { source: Some(_), .. }));
    }

    #[test]
    fn hung_inspector_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let nm = NmInspector::new(script(dir.path(), "exec sleep 5"))
            .with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let err = nm.list_undefined(Path::new("m.ko")).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(4));
        match err {
            Error::InspectionFailed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
