//! Error types for the edgequake-html2pdf library.
//!
//! A single [`Html2PdfError`] covers every failure mode. Variants fall into
//! four groups:
//!
//! * **Invalid input**: rejected before any subprocess is spawned
//!   (empty pathname, malformed option names, empty command).
//! * **Converter failure**: wkhtmltopdf exited non-zero and the failure did
//!   not match the configured "ignorable" marker. Carries the exit code, the
//!   exact argument vector and the captured diagnostics.
//! * **Template / temp-file failure**: rendering or materialising the HTML
//!   failed. Partially written temp files are already removed by then.
//! * **Output failure**: writing the final artifact failed.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-html2pdf library.
#[derive(Debug, Error)]
pub enum Html2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The caller passed something that can never succeed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Configuration could not be built or loaded.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Process errors ────────────────────────────────────────────────────
    /// The converter could not be started at all.
    #[error(
        "Failed to start '{program}': {source}\n\
Check that wkhtmltopdf is installed, or set WKHTMLTOPDF_CMD."
    )]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter exited with a non-zero status.
    #[error("{} exited with {}: {}", program_name(.args), display_code(.exit_code), trimmed(.stderr))]
    ProcessFailed {
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        /// The full argument vector, program first.
        args: Vec<String>,
        /// Captured standard error (empty when stderr was inherited).
        stderr: String,
        /// Whatever the converter wrote to standard output before failing.
        stdout: Vec<u8>,
    },

    // ── Template errors ───────────────────────────────────────────────────
    /// minijinja failed to load or render a template.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the temporary HTML file.
    #[error("Failed to write temporary HTML file: {0}")]
    TempFile(#[source] std::io::Error),

    /// Could not create the directory for, or write, the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Html2PdfError {
    /// `true` for a non-zero exit of the converter.
    pub fn is_process_failure(&self) -> bool {
        matches!(self, Html2PdfError::ProcessFailed { .. })
    }

    /// Exit code of a failed converter run, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Html2PdfError::ProcessFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn program_name(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or("converter")
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "a signal".to_string(),
    }
}

fn trimmed(text: &str) -> &str {
    text.trim()
}
