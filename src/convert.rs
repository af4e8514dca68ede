//! Conversion entry points.
//!
//! ## Sync core, async wrappers
//!
//! Every conversion is one blocking subprocess plus a few temp files, so the
//! core API is synchronous. Async callers use [`convert_async`] and
//! [`render_pdf_from_template_async`], which move owned inputs onto tokio's
//! blocking pool instead of stalling a runtime worker.
//!
//! ## Command line
//!
//! ```text
//! <command words…> <merged options…> <documents…> <output>
//! ```
//!
//! Options are the config defaults overlaid with the request's options, plus
//! `--encoding utf8` unless either mentions `encoding`. Output `-` means
//! stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Environment, Template, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PdfConfig;
use crate::error::Html2PdfError;
use crate::pipeline::materialize::{render_html_string, render_to_temporary_file, RenderedDocument};
use crate::pipeline::options::{merge_options, options_to_args, validate_options, OptionMap, OptionValue};
use crate::pipeline::process::check_output;
use crate::response::{Disposition, PdfResponse};

// ── Requests ─────────────────────────────────────────────────────────────

/// Where the converter writes the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Output {
    /// Standard output; the bytes come back from [`convert`]. (default)
    #[default]
    Stdout,
    /// A file written by the converter itself.
    File(PathBuf),
}

impl Output {
    /// The positional argument handed to the converter.
    pub fn as_arg(&self) -> String {
        match self {
            Output::Stdout => "-".to_string(),
            Output::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// One converter invocation: input documents, output, header/footer and
/// per-call options.
///
/// # Example
/// ```rust
/// use edgequake_html2pdf::{build_command_line, ConversionRequest, PdfConfig};
///
/// let request = ConversionRequest::new(["page.html"])
///     .footer("footer.html")
///     .option("orientation", "Landscape");
/// let args = build_command_line(&request, &PdfConfig::default()).unwrap();
/// assert_eq!(
///     args,
///     vec![
///         "wkhtmltopdf", "--encoding", "utf8", "--footer-html", "footer.html",
///         "--orientation", "Landscape", "--quiet", "page.html", "-",
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    /// File paths or URLs, in page order. Should not be empty; an empty
    /// list is passed through and rejected by the converter.
    pub documents: Vec<String>,
    pub output: Output,
    /// Sent as `--header-html` unless `options` already has `header_html`.
    pub header: Option<String>,
    /// Sent as `--footer-html` unless `options` already has `footer_html`.
    pub footer: Option<String>,
    pub options: OptionMap,
}

impl ConversionRequest {
    pub fn new<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn document(mut self, document: impl Into<String>) -> Self {
        self.documents.push(document.into());
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn options(mut self, options: OptionMap) -> Self {
        self.options.extend(options);
        self
    }
}

/// A template-to-PDF response: what to render and how to deliver it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfTemplateRequest {
    pub template: String,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    /// Download name; no `Content-Disposition` when `None`.
    pub filename: Option<String>,
    pub disposition: Disposition,
    pub options: OptionMap,
}

impl PdfTemplateRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    pub fn header_template(mut self, name: impl Into<String>) -> Self {
        self.header_template = Some(name.into());
        self
    }

    pub fn footer_template(mut self, name: impl Into<String>) -> Self {
        self.footer_template = Some(name.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Show in the browser instead of downloading.
    pub fn inline(mut self) -> Self {
        self.disposition = Disposition::Inline;
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

// ── Command line ─────────────────────────────────────────────────────────

/// Assemble the full argument vector for `request`, program first.
///
/// # Errors
/// [`Html2PdfError::InvalidInput`] for an empty command or a malformed
/// option name.
pub fn build_command_line(
    request: &ConversionRequest,
    config: &PdfConfig,
) -> Result<Vec<String>, Html2PdfError> {
    let mut args = config.command_words();
    if args.is_empty() {
        return Err(Html2PdfError::InvalidInput(
            "converter command is empty".into(),
        ));
    }
    validate_options(&request.options)?;

    let mut overrides = request.options.clone();
    if let Some(header) = &request.header {
        overrides
            .entry("header_html".into())
            .or_insert_with(|| OptionValue::Value(header.clone()));
    }
    if let Some(footer) = &request.footer {
        overrides
            .entry("footer_html".into())
            .or_insert_with(|| OptionValue::Value(footer.clone()));
    }

    let merged = merge_options(config.default_options.as_ref(), &overrides);
    args.extend(options_to_args(&merged));
    args.extend(request.documents.iter().cloned());
    args.push(request.output.as_arg());
    Ok(args)
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Run the converter for `request` and return what it wrote to stdout.
///
/// With [`Output::Stdout`] that is the PDF itself. With [`Output::File`] the
/// PDF is on disk and the returned bytes are usually empty.
///
/// # Errors
/// - [`Html2PdfError::InvalidInput`] before spawning, see [`build_command_line`]
/// - [`Html2PdfError::Spawn`] if the converter cannot be started
/// - [`Html2PdfError::ProcessFailed`] on a non-ignorable non-zero exit,
///   including an empty `documents` list
pub fn convert(request: &ConversionRequest, config: &PdfConfig) -> Result<Vec<u8>, Html2PdfError> {
    let args = build_command_line(request, config)?;
    info!(
        "Converting {} document(s) to {}",
        request.documents.len(),
        request.output.as_arg()
    );
    check_output(&args, &config.run_options())
}

/// Convert `request` straight into `path`, creating parent directories.
///
/// `request.output` is ignored. Returns the path written.
pub fn convert_to_file(
    request: &ConversionRequest,
    path: impl AsRef<Path>,
    config: &PdfConfig,
) -> Result<PathBuf, Html2PdfError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Html2PdfError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
    }

    let request = request.clone().output(Output::File(path.clone()));
    convert(&request, config)?;
    Ok(path)
}

/// Render `input` (and optional header/footer templates) to temp files and
/// convert them into one PDF.
///
/// Header and footer become `--header-html` / `--footer-html` unless
/// `options` sets those keys already. All temp files live until the
/// converter exits, then are removed unless `config.debug` is set.
pub fn render_pdf_from_template<S: Serialize + ?Sized>(
    input: &Template<'_, '_>,
    header: Option<&Template<'_, '_>>,
    footer: Option<&Template<'_, '_>>,
    context: &S,
    request: Option<&Value>,
    options: &OptionMap,
    config: &PdfConfig,
) -> Result<Vec<u8>, Html2PdfError> {
    let body = render_to_temporary_file(input, context, request, config)?;
    let header_doc = header
        .map(|t| render_to_temporary_file(t, context, request, config))
        .transpose()?;
    let footer_doc = footer
        .map(|t| render_to_temporary_file(t, context, request, config))
        .transpose()?;

    debug!("Rendered body to {}", body.path().display());

    let conversion = ConversionRequest {
        documents: vec![body.filename()],
        output: Output::Stdout,
        header: header_doc.as_ref().map(RenderedDocument::filename),
        footer: footer_doc.as_ref().map(RenderedDocument::filename),
        options: options.clone(),
    };
    convert(&conversion, config)
}

/// Render the templates named in `req` from `env` and wrap the PDF in a
/// [`PdfResponse`].
pub fn render_pdf_response<S: Serialize + ?Sized>(
    env: &Environment<'_>,
    req: &PdfTemplateRequest,
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Result<PdfResponse, Html2PdfError> {
    let body = render_named(env, req, context, request, config)?;
    Ok(PdfResponse::new(body)
        .with_filename(req.filename.clone())
        .with_disposition(req.disposition))
}

/// Render `template` to HTML exactly as the converter would see it.
pub fn render_html<S: Serialize + ?Sized>(
    template: &Template<'_, '_>,
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Result<String, Html2PdfError> {
    render_html_string(template, context, request, config)
}

fn render_named<S: Serialize + ?Sized>(
    env: &Environment<'_>,
    req: &PdfTemplateRequest,
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Result<Vec<u8>, Html2PdfError> {
    let input = env.get_template(&req.template)?;
    let header = req
        .header_template
        .as_deref()
        .map(|name| env.get_template(name))
        .transpose()?;
    let footer = req
        .footer_template
        .as_deref()
        .map(|name| env.get_template(name))
        .transpose()?;

    render_pdf_from_template(
        &input,
        header.as_ref(),
        footer.as_ref(),
        context,
        request,
        &req.options,
        config,
    )
}

// ── Async wrappers ───────────────────────────────────────────────────────

/// [`convert`] on tokio's blocking pool.
pub async fn convert_async(
    request: ConversionRequest,
    config: PdfConfig,
) -> Result<Vec<u8>, Html2PdfError> {
    tokio::task::spawn_blocking(move || convert(&request, &config))
        .await
        .map_err(|e| Html2PdfError::Internal(format!("conversion task failed: {e}")))?
}

/// Render the templates named in `req` and convert them on tokio's blocking
/// pool.
pub async fn render_pdf_from_template_async(
    env: Arc<Environment<'static>>,
    req: PdfTemplateRequest,
    context: Value,
    request: Option<Value>,
    config: PdfConfig,
) -> Result<Vec<u8>, Html2PdfError> {
    tokio::task::spawn_blocking(move || render_named(&env, &req, &context, request.as_ref(), &config))
        .await
        .map_err(|e| Html2PdfError::Internal(format!("render task failed: {e}")))?
}

/// [`render_pdf_response`] on tokio's blocking pool.
pub async fn render_pdf_response_async(
    env: Arc<Environment<'static>>,
    req: PdfTemplateRequest,
    context: Value,
    request: Option<Value>,
    config: PdfConfig,
) -> Result<PdfResponse, Html2PdfError> {
    let filename = req.filename.clone();
    let disposition = req.disposition;
    let body = render_pdf_from_template_async(env, req, context, request, config).await?;
    Ok(PdfResponse::new(body)
        .with_filename(filename)
        .with_disposition(disposition))
}
