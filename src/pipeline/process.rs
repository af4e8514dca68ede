//! Process runner: spawn the converter and classify its outcome.
//!
//! The runner owns the child's standard output (always captured) and its
//! standard input (always null). Callers choose only the environment, the
//! stderr policy and the ignorable-failure marker through [`RunOptions`].
//!
//! `Command::output` drains stdout and stderr concurrently, so a converter
//! that writes a large PDF to stdout while also logging to stderr cannot
//! deadlock on a full pipe.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Html2PdfError;

/// Marker wkhtmltopdf prints when a linked resource could not be loaded.
pub const CONTENT_NOT_FOUND_MARKER: &str = "ContentNotFoundError";

/// Where the converter's standard error goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Capture stderr for error reports and the ignorable-failure check. (default)
    #[default]
    Capture,
    /// Pass stderr straight through to this process's stderr.
    ///
    /// Nothing is captured, so the ignorable-failure marker can never match.
    Inherit,
}

/// Per-invocation knobs for [`check_output`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// A non-zero exit whose stderr contains this text counts as success.
    pub ignore_marker: Option<String>,
    pub stderr: StderrMode,
}

/// Run `args[0]` with `args[1..]` and return everything it wrote to stdout.
///
/// # Errors
/// - [`Html2PdfError::InvalidInput`] for an empty argument vector
/// - [`Html2PdfError::Spawn`] if the program cannot be started
/// - [`Html2PdfError::ProcessFailed`] on a non-zero exit that does not match
///   `opts.ignore_marker`
pub fn check_output(args: &[String], opts: &RunOptions) -> Result<Vec<u8>, Html2PdfError> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Html2PdfError::InvalidInput("command line is empty".into()))?;

    debug!("Running: {}", args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .envs(&opts.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped());
    match opts.stderr {
        StderrMode::Capture => cmd.stderr(Stdio::piped()),
        StderrMode::Inherit => cmd.stderr(Stdio::inherit()),
    };

    let output = cmd.output().map_err(|source| Html2PdfError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        info!(
            "{} finished: {} bytes on stdout",
            program,
            output.stdout.len()
        );
        return Ok(output.stdout);
    }

    if let Some(marker) = opts.ignore_marker.as_deref() {
        if !marker.is_empty() && stderr.contains(marker) {
            warn!(
                "{} exited with {}; ignoring because stderr mentions {}",
                program, output.status, marker
            );
            return Ok(output.stdout);
        }
    }

    warn!("{} failed with {}", program, output.status);
    Err(Html2PdfError::ProcessFailed {
        exit_code: output.status.code(),
        args: args.to_vec(),
        stderr,
        stdout: output.stdout,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn success_returns_stdout_verbatim() {
        let out = check_output(&sh("printf '%%PDF-1.4'"), &RunOptions::default()).unwrap();
        assert_eq!(out, b"%PDF-1.4");
    }

    #[test]
    fn failure_carries_code_args_and_stderr() {
        let args = sh("echo boom >&2; exit 3");
        let err = check_output(&args, &RunOptions::default()).unwrap_err();
        match err {
            Html2PdfError::ProcessFailed {
                exit_code,
                args: attempted,
                stderr,
                ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(attempted, args);
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("expected ProcessFailed, got {other:?}"),
        }
    }

    #[test]
    fn matching_marker_downgrades_failure() {
        let opts = RunOptions {
            ignore_marker: Some(CONTENT_NOT_FOUND_MARKER.into()),
            ..RunOptions::default()
        };
        let out = check_output(
            &sh("printf partial; echo 'network error: ContentNotFoundError' >&2; exit 1"),
            &opts,
        )
        .unwrap();
        assert_eq!(out, b"partial");
    }

    #[test]
    fn other_failures_still_raise_with_marker_set() {
        let opts = RunOptions {
            ignore_marker: Some(CONTENT_NOT_FOUND_MARKER.into()),
            ..RunOptions::default()
        };
        let err = check_output(&sh("echo 'Unknown long argument --blaa' >&2; exit 1"), &opts)
            .unwrap_err();
        assert!(err.is_process_failure());
    }

    #[test]
    fn inherited_stderr_never_matches_marker() {
        let opts = RunOptions {
            ignore_marker: Some("anything".into()),
            stderr: StderrMode::Inherit,
            ..RunOptions::default()
        };
        let err = check_output(&sh("exit 2"), &opts).unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
    }

    #[test]
    fn env_overrides_reach_the_child() {
        let mut env = BTreeMap::new();
        env.insert("HTML2PDF_PROCESS_TEST".to_string(), "hello".to_string());
        let opts = RunOptions {
            env,
            ..RunOptions::default()
        };
        let out = check_output(&sh("printf \"$HTML2PDF_PROCESS_TEST\""), &opts).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn empty_command_is_invalid_input() {
        let err = check_output(&[], &RunOptions::default()).unwrap_err();
        assert!(matches!(err, Html2PdfError::InvalidInput(_)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = check_output(
            &["/nonexistent/html2pdf-converter".to_string()],
            &RunOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Html2PdfError::Spawn { .. }));
    }
}
