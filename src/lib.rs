//! # edgequake-html2pdf
//!
//! Render HTML templates to PDF by driving the `wkhtmltopdf` command-line
//! converter.
//!
//! ## Why shell out?
//!
//! Layout, pagination and fonts are the converter's job. This crate does the
//! plumbing around it: render a template to a temp file the converter can
//! read, point asset URLs at files on disk, turn an option map into flags,
//! run the process and report failures with the exact command line and
//! stderr that produced them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! template + context
//!  │
//!  ├─ 1. Render     minijinja, with MEDIA_URL / STATIC_URL / request injected
//!  ├─ 2. Rewrite    "/static/app.css" → "file:///srv/static/app.css"
//!  ├─ 3. Persist    wkhtmltopdf*.html temp file (kept when debug = true)
//!  ├─ 4. Command    <cmd> --encoding utf8 --quiet … page.html -
//!  └─ 5. Run        capture stdout → PDF bytes, or ProcessFailed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_html2pdf::{
//!     environment_from_dir, render_pdf_response, PdfConfig, PdfTemplateRequest,
//! };
//! use minijinja::context;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PdfConfig::from_env()?;
//!     let env = environment_from_dir("templates");
//!     let req = PdfTemplateRequest::new("invoice.html")
//!         .footer_template("footer.html")
//!         .filename("invoice.pdf");
//!     let response = render_pdf_response(&env, &req, &context! { number => 7 }, None, &config)?;
//!     assert!(response.body.starts_with(b"%PDF"));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `axum`  | off     | `impl IntoResponse for PdfResponse` |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-html2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod response;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AssetRoot, PdfConfig, PdfConfigBuilder, StderrMode, CONTENT_NOT_FOUND_MARKER};
pub use convert::{
    build_command_line, convert, convert_async, convert_to_file, render_html,
    render_pdf_from_template, render_pdf_from_template_async, render_pdf_response,
    render_pdf_response_async, ConversionRequest, Output, PdfTemplateRequest,
};
pub use error::Html2PdfError;
pub use pipeline::materialize::{render_to_temporary_file, RenderedDocument};
pub use pipeline::options::{merge_options, options_to_args, OptionMap, OptionValue};
pub use pipeline::process::{check_output, RunOptions};
pub use pipeline::rewrite::{make_absolute_paths, path_to_file_url};
pub use response::{content_disposition_filename, http_quote, Disposition, PdfResponse};
pub use templates::{environment_from_dir, new_environment};
