//! Template materializer: render a template into a temp HTML file.
//!
//! wkhtmltopdf needs a path, so every rendered template is written to a
//! uniquely named `wkhtmltopdf*.html` file from [`tempfile`]. The returned
//! [`RenderedDocument`] owns that file:
//!
//! * `debug = false`: the file is deleted when the document is dropped.
//! * `debug = true`:  the file is kept on disk for inspection.
//!
//! If writing fails, the half-written file is deleted before the error is
//! returned.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use minijinja::value::{Value, ValueKind};
use minijinja::Template;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::PdfConfig;
use crate::error::Html2PdfError;
use crate::pipeline::rewrite::make_absolute_paths;

const TEMP_PREFIX: &str = "wkhtmltopdf";
const TEMP_SUFFIX: &str = ".html";

/// A rendered template on disk.
#[derive(Debug)]
pub enum RenderedDocument {
    /// Removed from disk when dropped.
    Transient(NamedTempFile),
    /// Left on disk after drop (debug mode).
    Retained { path: PathBuf, file: File },
}

impl RenderedDocument {
    pub fn path(&self) -> &Path {
        match self {
            RenderedDocument::Transient(tmp) => tmp.path(),
            RenderedDocument::Retained { path, .. } => path,
        }
    }

    /// Path as a string, as handed to the converter.
    pub fn filename(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    pub fn is_retained(&self) -> bool {
        matches!(self, RenderedDocument::Retained { .. })
    }

    /// Handle to the open file, positioned wherever the last read left it.
    pub fn file_mut(&mut self) -> &mut File {
        match self {
            RenderedDocument::Transient(tmp) => tmp.as_file_mut(),
            RenderedDocument::Retained { file, .. } => file,
        }
    }

    /// Read back the whole document.
    pub fn read_to_string(&mut self) -> Result<String, Html2PdfError> {
        use std::io::Read;

        let file = self.file_mut();
        file.seek(SeekFrom::Start(0)).map_err(Html2PdfError::TempFile)?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(Html2PdfError::TempFile)?;
        Ok(content)
    }
}

/// Render `template` with `context`, rewrite asset URLs and write the result
/// to a temp file.
///
/// The template sees, in increasing precedence:
/// 1. one variable per [`crate::AssetRoot`] with a `context_var`
///    (e.g. `MEDIA_URL`, `STATIC_URL`),
/// 2. `request`, when given,
/// 3. every top-level key of `context`.
pub fn render_to_temporary_file<S: Serialize + ?Sized>(
    template: &Template<'_, '_>,
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Result<RenderedDocument, Html2PdfError> {
    let html = render_html_string(template, context, request, config)?;
    write_temporary_file(&html, config.debug)
}

/// Render `template` to an HTML string with asset URLs rewritten.
pub fn render_html_string<S: Serialize + ?Sized>(
    template: &Template<'_, '_>,
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Result<String, Html2PdfError> {
    let ctx = build_context(context, request, config);
    let rendered = template.render(ctx)?;
    Ok(make_absolute_paths(&rendered, &config.asset_roots))
}

/// Write `content` as UTF-8 into a fresh temp file.
pub fn write_temporary_file(content: &str, debug: bool) -> Result<RenderedDocument, Html2PdfError> {
    let document = fill_temporary_file(debug, |tmp| {
        tmp.write_all(content.as_bytes())?;
        tmp.flush()
    })?;
    debug!("Rendered {} bytes to {}", content.len(), document.path().display());
    Ok(document)
}

/// Create a temp file and hand it to `fill`. When `fill` fails the file is
/// dropped, which closes and deletes it, so nothing is left behind.
fn fill_temporary_file<F>(debug: bool, fill: F) -> Result<RenderedDocument, Html2PdfError>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile()
        .map_err(Html2PdfError::TempFile)?;

    fill(&mut tmp).map_err(Html2PdfError::TempFile)?;

    if debug {
        let (file, path) = tmp.keep().map_err(|e| Html2PdfError::TempFile(e.error))?;
        debug!("Keeping {} (debug mode)", path.display());
        Ok(RenderedDocument::Retained { path, file })
    } else {
        Ok(RenderedDocument::Transient(tmp))
    }
}

fn build_context<S: Serialize + ?Sized>(
    context: &S,
    request: Option<&Value>,
    config: &PdfConfig,
) -> Value {
    let mut merged: BTreeMap<String, Value> = BTreeMap::new();

    for root in &config.asset_roots {
        if let Some(var) = &root.context_var {
            merged.insert(var.clone(), Value::from(root.url.clone()));
        }
    }
    if let Some(request) = request {
        merged.insert("request".into(), request.clone());
    }

    let user = Value::from_serialize(context);
    if user.kind() == ValueKind::Map {
        if let Ok(keys) = user.try_iter() {
            for key in keys {
                if let (Some(name), Ok(value)) = (key.as_str(), user.get_item(&key)) {
                    merged.insert(name.to_string(), value);
                }
            }
        }
    }

    Value::from_serialize(&merged)
}
