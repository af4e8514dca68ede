//! Asset URL rewriting: make root-relative references loadable by wkhtmltopdf.
//!
//! wkhtmltopdf reads the rendered HTML from a temp file, outside any web
//! server, so `src="/static/logo.png"` resolves to nothing. Each configured
//! [`AssetRoot`] maps a public URL prefix to a directory on disk; every quoted
//! occurrence of the prefix is replaced with the matching `file://` URL.
//!
//! The pass is plain text substitution. It never parses the HTML and cannot
//! fail on malformed markup. Running it twice gives the same result as
//! running it once, because the rewritten values no longer begin with a
//! quoted URL prefix.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::config::AssetRoot;
use crate::error::Html2PdfError;

static RE_HAS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^:/]+://").unwrap());

/// `true` when `value` starts with `scheme://`.
pub fn has_scheme(value: &str) -> bool {
    RE_HAS_SCHEME.is_match(value)
}

/// Rewrite every quoted reference under each asset root's URL prefix into an
/// absolute `file://` URL.
///
/// Roots whose URL is empty or already absolute (`https://cdn…`) are skipped.
/// Roots are applied in order.
pub fn make_absolute_paths(content: &str, roots: &[AssetRoot]) -> String {
    let mut content = content.to_string();

    for root in roots {
        if root.url.is_empty() || has_scheme(&root.url) {
            continue;
        }

        let mut dir = root.root.to_string_lossy().into_owned();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        let base = match path_to_file_url(&dir, true) {
            Ok(base) => base,
            Err(e) => {
                debug!("Skipping asset root {:?}: {}", root.root, e);
                continue;
            }
        };

        let pattern = format!(r#"["']({}.*?)["']"#, regex::escape(&root.url));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                debug!("Skipping asset root {:?}: {}", root.root, e);
                continue;
            }
        };

        let mut occurrences: Vec<String> = re
            .captures_iter(&content)
            .map(|caps| caps[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if occurrences.is_empty() {
            continue;
        }

        // One pass over the input: a replacement may itself contain an
        // occurrence (root `/srv/static` with prefix `/static/`).
        occurrences.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = occurrences
            .iter()
            .map(|o| regex::escape(o))
            .collect::<Vec<_>>()
            .join("|");
        let any = match Regex::new(&alternation) {
            Ok(re) => re,
            Err(e) => {
                debug!("Skipping asset root {:?}: {}", root.root, e);
                continue;
            }
        };

        let prefix_len = root.url.len();
        content = any
            .replace_all(&content, |caps: &regex::Captures<'_>| {
                format!("{}{}", base, &caps[0][prefix_len..])
            })
            .into_owned();
    }

    content
}

/// Convert a filesystem path into a `file://` URL.
///
/// - Empty input is rejected.
/// - `.`/`..` segments and repeated separators are collapsed without
///   touching the filesystem; relative paths are resolved against the
///   current directory.
/// - Directories (a trailing separator, or an existing directory on disk)
///   keep exactly one trailing `/`; files never have one.
/// - Input that already looks like `scheme://…` is returned unchanged unless
///   `force_path` is set.
///
/// ```rust
/// use edgequake_html2pdf::path_to_file_url;
///
/// assert_eq!(path_to_file_url("/", false).unwrap(), "file:///");
/// assert_eq!(path_to_file_url("/foo//bar///baz/", false).unwrap(), "file:///foo/bar/baz/");
/// assert_eq!(path_to_file_url("/foo/bar/../baz/", false).unwrap(), "file:///foo/baz/");
/// assert_eq!(path_to_file_url("https://example.com/a", false).unwrap(), "https://example.com/a");
/// ```
pub fn path_to_file_url(pathname: &str, force_path: bool) -> Result<String, Html2PdfError> {
    if pathname.is_empty() {
        return Err(Html2PdfError::InvalidInput("pathname is empty".into()));
    }
    if !force_path && has_scheme(pathname) {
        return Ok(pathname.to_string());
    }

    let ends_with_sep = pathname.ends_with('/') || pathname.ends_with(std::path::MAIN_SEPARATOR);
    let path = Path::new(pathname);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).map_err(|e| {
            Html2PdfError::InvalidInput(format!("cannot resolve '{pathname}': {e}"))
        })?
    };
    let normalized = normalize_lexically(&absolute);
    let is_dir = ends_with_sep || normalized.is_dir();

    let url = if is_dir {
        Url::from_directory_path(&normalized)
    } else {
        Url::from_file_path(&normalized)
    };
    url.map(String::from).map_err(|()| {
        Html2PdfError::InvalidInput(format!(
            "'{pathname}' cannot be expressed as a file URL"
        ))
    })
}

/// Collapse `.` and `..` components; `..` never climbs above the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn roots() -> Vec<AssetRoot> {
        vec![
            AssetRoot::media("/tmp/media", "/media/"),
            AssetRoot::static_files("/tmp/static", "/static/"),
        ]
    }

    #[test]
    fn file_url_root() {
        assert_eq!(path_to_file_url("/", false).unwrap(), "file:///");
    }

    #[test]
    fn file_url_rejects_empty() {
        assert!(matches!(
            path_to_file_url("", false),
            Err(Html2PdfError::InvalidInput(_))
        ));
    }

    #[test]
    fn file_url_collapses_separators_and_dots() {
        assert_eq!(
            path_to_file_url("/foo//bar///baz/", false).unwrap(),
            "file:///foo/bar/baz/"
        );
        assert_eq!(
            path_to_file_url("/foo/bar/../baz/", false).unwrap(),
            "file:///foo/baz/"
        );
        assert_eq!(
            path_to_file_url("/foo/./bar/../../../baz", false).unwrap(),
            "file:///baz"
        );
    }

    #[test]
    fn file_url_keeps_slash_only_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        let as_dir = path_to_file_url(dir.path().to_str().unwrap(), false).unwrap();
        assert!(as_dir.ends_with('/'), "got: {as_dir}");
        assert!(!as_dir.ends_with("//"), "got: {as_dir}");

        let file = dir.path().join("page.html");
        std::fs::write(&file, "<html></html>").unwrap();
        let as_file = path_to_file_url(file.to_str().unwrap(), false).unwrap();
        assert!(as_file.ends_with("/page.html"), "got: {as_file}");
    }

    #[test]
    fn file_url_percent_encodes() {
        assert_eq!(
            path_to_file_url("/tmp/my file ♥.html", false).unwrap(),
            "file:///tmp/my%20file%20%E2%99%A5.html"
        );
    }

    #[test]
    fn file_url_passes_urls_through_unless_forced() {
        assert_eq!(
            path_to_file_url("http://localhost/a.css", false).unwrap(),
            "http://localhost/a.css"
        );
        let forced = path_to_file_url("http://localhost/a.css", true).unwrap();
        assert!(forced.starts_with("file:///"), "got: {forced}");
        assert!(forced.ends_with("/http:/localhost/a.css"), "got: {forced}");
    }

    #[test]
    fn root_path_containing_the_prefix_is_not_rewritten_twice() {
        let html = r#"<a href="/static/a">x</a><img src="/static/a.png">"#;
        let out = make_absolute_paths(html, &[AssetRoot::new("/srv/static", "/static/")]);
        assert_eq!(
            out,
            r#"<a href="file:///srv/static/a">x</a><img src="file:///srv/static/a.png">"#
        );
        assert_eq!(
            make_absolute_paths(&out, &[AssetRoot::new("/srv/static", "/static/")]),
            out
        );
    }

    #[test]
    fn rewrites_quoted_media_and_static_references() {
        let html = r#"<img src="/media/logo.png"><link href='/static/css/site.css'>"#;
        let out = make_absolute_paths(html, &roots());
        assert_eq!(
            out,
            r#"<img src="file:///tmp/media/logo.png"><link href='file:///tmp/static/css/site.css'>"#
        );
    }

    #[test]
    fn rewrites_every_copy_of_an_occurrence() {
        let html = r#"<a href="/static/x.pdf">/static/x.pdf</a><img src="/static/x.pdf">"#;
        let out = make_absolute_paths(html, &roots());
        assert_eq!(out.matches("file:///tmp/static/x.pdf").count(), 3);
        assert!(!out.contains("\"/static/"));
    }

    #[test]
    fn unquoted_and_foreign_references_are_untouched() {
        let html = "<p>see /static/x.png</p><img src=\"/other/y.png\">";
        assert_eq!(make_absolute_paths(html, &roots()), html);
    }

    #[test]
    fn absolute_and_empty_prefixes_are_skipped() {
        let roots = vec![
            AssetRoot::new("/srv/cdn", "https://cdn.example.com/"),
            AssetRoot::new("/srv/empty", ""),
        ];
        let html = r#"<img src="https://cdn.example.com/a.png"><img src="b.png">"#;
        assert_eq!(make_absolute_paths(html, &roots), html);
    }

    #[test]
    fn root_without_trailing_slash_is_normalized() {
        let roots = vec![AssetRoot::new("/srv/assets", "/assets/")];
        let out = make_absolute_paths(r#"<img src="/assets/a.png">"#, &roots);
        assert_eq!(out, r#"<img src="file:///srv/assets/a.png">"#);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let html = r#"<html><img src="/media/a b.png"><script src='/static/app.js'></script>"#;
        let once = make_absolute_paths(html, &roots());
        let twice = make_absolute_paths(&once, &roots());
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let html = "<div class=\"/static/unterminated><p>'/media/";
        let _ = make_absolute_paths(html, &roots());
    }
}
