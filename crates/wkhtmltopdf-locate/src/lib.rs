//! # wkhtmltopdf-locate
//!
//! Find the [wkhtmltopdf](https://wkhtmltopdf.org/) executable on the host,
//! so callers get a clear "not installed" error before they try to spawn it.
//!
//! ## How it works
//!
//! On first call to [`locate_wkhtmltopdf`]:
//!
//! 1. If `WKHTMLTOPDF_PATH` is set and points to an existing file, use it.
//! 2. Otherwise search `PATH` for `wkhtmltopdf` (`wkhtmltopdf.exe` on
//!    Windows, via the `which` crate).
//!
//! The result is cached for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wkhtmltopdf_locate::{locate_wkhtmltopdf, wkhtmltopdf_version};
//!
//! let path = locate_wkhtmltopdf().expect("wkhtmltopdf is not installed");
//! let version = wkhtmltopdf_version(&path).expect("could not query version");
//! println!("{} ({})", path.display(), version);
//! ```
//!
//! ## Environment variable overrides
//!
//! - `WKHTMLTOPDF_PATH`: path to an existing wkhtmltopdf binary; skips the
//!   `PATH` search.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Executable name searched for on `PATH`.
pub const BINARY_NAME: &str = "wkhtmltopdf";

/// Environment variable holding an explicit path to the binary.
pub const PATH_ENV_VAR: &str = "WKHTMLTOPDF_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by wkhtmltopdf-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Neither the override nor `PATH` produced an executable.
    #[error(
        "wkhtmltopdf not found on PATH\n\
Install it from https://wkhtmltopdf.org/downloads.html or set \
WKHTMLTOPDF_PATH=/path/to/wkhtmltopdf."
    )]
    NotFound(#[source] which::Error),

    /// `WKHTMLTOPDF_PATH` is set but nothing exists at that path.
    #[error("WKHTMLTOPDF_PATH points to '{path}', which does not exist")]
    OverrideMissing { path: PathBuf },

    /// The binary could not be run with `--version`.
    #[error("Failed to query version of '{path}': {reason}")]
    Version { path: PathBuf, reason: String },
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if a wkhtmltopdf binary can be found.
pub fn is_wkhtmltopdf_available() -> bool {
    locate_wkhtmltopdf().is_ok()
}

/// Returns the path to the wkhtmltopdf binary.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; the lookup result is
/// cached after the first success. Failures are not cached, so installing
/// the binary while the process runs is picked up on the next call.
pub fn locate_wkhtmltopdf() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve(std::env::var_os(PATH_ENV_VAR))?;

    // Best-effort cache in the OnceLock (ignore race; both will succeed).
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Runs `<path> --version` and returns the reported version string,
/// e.g. `0.12.6 (with patched qt)`.
pub fn wkhtmltopdf_version(path: &Path) -> Result<String, LocateError> {
    command_version(path, &[] as &[&str])
}

/// Runs `<program> <args…> --version` and returns the reported version.
///
/// Use this for wrapper commands such as `xvfb-run -a wkhtmltopdf`, where
/// `--version` must reach the converter through the wrapper.
pub fn command_version<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<String, LocateError> {
    let output = Command::new(program)
        .args(args)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| LocateError::Version {
            path: program.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(LocateError::Version {
            path: program.to_path_buf(),
            reason: format!("exited with {}", output.status),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_version(&text).ok_or_else(|| LocateError::Version {
        path: program.to_path_buf(),
        reason: format!("unrecognised output {:?}", text.trim()),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve(override_path: Option<OsString>) -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Some(raw) = override_path.filter(|v| !v.is_empty()) {
        let p = PathBuf::from(raw);
        if p.is_file() {
            return Ok(p);
        }
        return Err(LocateError::OverrideMissing { path: p });
    }

    // 2. PATH search.
    which::which(BINARY_NAME).map_err(LocateError::NotFound)
}

/// Extracts the version from `wkhtmltopdf --version` output.
fn parse_version(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let version = line.strip_prefix(BINARY_NAME).unwrap_or(line).trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
