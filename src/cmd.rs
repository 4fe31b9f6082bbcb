//! Small helpers around external commands.
//!
//! Everything user-facing in syscribe is orchestration of system tools (`pactl`,
//! `ffmpeg`, optionally `whisper-cli`), so we centralize "is it installed?" probing
//! and captured invocation here.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;

use crate::error::{Error, Result};

/// Locate `program` on `PATH`, or fail with a [`Error::MissingDependency`].
///
/// A missing system tool is a setup problem, not a transient fault, so callers
/// should treat this error as fatal and never retry.
pub fn require_program(program: &str) -> Result<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in_path(program, &path_var).ok_or_else(|| Error::MissingDependency(program.to_string()))
}

/// Whether `program` resolves on `PATH`.
pub fn program_available(program: &str) -> bool {
    require_program(program).is_ok()
}

/// Search a `PATH`-style variable for an executable entry named `program`.
///
/// Split out from [`require_program`] so the lookup itself is testable without
/// mutating the process environment.
pub(crate) fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run a command to completion and capture stdout.
///
/// Returns `(success, stdout)`. Stderr is captured and discarded; callers translate a
/// failed status into their own diagnostics.
pub(crate) fn run_capture(program: &Path, args: &[&str]) -> anyhow::Result<(bool, String)> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {}", program.display()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok((output.status.success(), stdout))
}
