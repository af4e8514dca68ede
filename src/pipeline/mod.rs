//! Pipeline stages for HTML-to-PDF conversion.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the external converter installed.
//!
//! ## Data Flow
//!
//! ```text
//! template ──▶ materialize ──▶ rewrite ──▶ options ──▶ process
//! (minijinja)  (temp .html)   (file://)   (--flags)   (wkhtmltopdf)
//! ```
//!
//! 1. [`materialize`]: render a template with its context into a uniquely
//!    named temp file whose lifetime follows the `debug` flag
//! 2. [`rewrite`]: turn quoted `/static/…`-style references into
//!    `file://` URLs the converter can open
//! 3. [`options`]: merge defaults with caller options and render them
//!    as sorted `--kebab-case` flags
//! 4. [`process`]: spawn the converter, capture its output and classify
//!    the exit; the only stage that runs a subprocess

pub mod materialize;
pub mod options;
pub mod process;
pub mod rewrite;
