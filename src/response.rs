//! HTTP-deliverable PDF responses.
//!
//! [`PdfResponse`] is framework-neutral: status, content type, an optional
//! download filename and the body bytes. [`PdfResponse::headers`] gives the
//! header pairs for any server; with the `axum` feature it also implements
//! `IntoResponse`.
//!
//! Filenames are squeezed into a plain ASCII quoted-string. Browsers disagree
//! on everything else in `Content-Disposition`, so `;` and `"` are dropped,
//! backslashes are escaped and anything outside printable ASCII becomes `?`.

use serde::{Deserialize, Serialize};

/// Default `Content-Type` of a [`PdfResponse`].
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Whether the browser should download the PDF or show it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Save as a file. (default)
    #[default]
    Attachment,
    /// Display in the browser.
    Inline,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// A rendered PDF ready to send over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfResponse {
    pub status: u16,
    pub content_type: String,
    /// Download name; no `Content-Disposition` is sent when `None` or empty.
    pub filename: Option<String>,
    pub disposition: Disposition,
    pub body: Vec<u8>,
}

impl PdfResponse {
    /// A `200 OK` `application/pdf` response without a filename.
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: PDF_CONTENT_TYPE.to_string(),
            filename: None,
            disposition: Disposition::default(),
            body,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_filename(mut self, filename: Option<impl Into<String>>) -> Self {
        self.filename = filename.map(Into::into);
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// `Content-Disposition` header value, if a filename is set.
    pub fn content_disposition(&self) -> Option<String> {
        let name = self.filename.as_deref().filter(|n| !n.is_empty())?;
        Some(format!(
            "{}; filename={}",
            self.disposition.as_str(),
            content_disposition_filename(name)
        ))
    }

    /// Header pairs for this response, `Content-Type` first.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", self.content_type.clone())];
        if let Some(value) = self.content_disposition() {
            headers.push(("Content-Disposition", value));
        }
        headers
    }
}

/// Sanitise `filename` for a `Content-Disposition` header and quote it.
///
/// ```rust
/// use edgequake_html2pdf::content_disposition_filename;
///
/// assert_eq!(content_disposition_filename("4'5\".pdf"), "\"4'5.pdf\"");
/// assert_eq!(content_disposition_filename("♥.pdf"), "\"?.pdf\"");
/// ```
pub fn content_disposition_filename(filename: &str) -> String {
    let cleaned: String = filename.chars().filter(|c| *c != ';' && *c != '"').collect();
    http_quote(&cleaned)
}

/// Wrap `value` in double quotes as an ASCII-only HTTP quoted-string.
///
/// `\` and `"` are backslash-escaped; non-ASCII and control characters
/// become `?`.
pub fn http_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out.push('"');
    out
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for PdfResponse {
    fn into_response(self) -> axum::response::Response {
        use axum::body::Body;
        use axum::http::{header, HeaderValue, StatusCode};

        let disposition = self.content_disposition();
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        if let Some(value) = disposition.and_then(|d| HeaderValue::from_str(&d).ok()) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }

        response
    }
}
