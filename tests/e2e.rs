//! End-to-end integration tests for edgequake-html2pdf.
//!
//! Most tests drive the library against a small POSIX-shell stand-in for
//! wkhtmltopdf written into a temp dir. It parses the command line the way
//! the real converter does, echoes the argument vector and the input
//! documents into a fake PDF, and fails the same way on bad input.
//!
//! Tests against the real converter are gated behind `E2E_ENABLED`:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
#![cfg(unix)]

use edgequake_html2pdf::{
    convert, convert_to_file, new_environment, render_pdf_from_template,
    render_pdf_response, render_pdf_response_async, AssetRoot, ConversionRequest, Html2PdfError,
    OptionMap, PdfConfig, PdfTemplateRequest,
};
use minijinja::{context, Environment};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const FAKE_CONVERTER: &str = r#"#!/bin/sh
all="$*"
count=0
last=""
docs=""
while [ $# -gt 0 ]; do
  case "$1" in
    --blaa)
      echo "Unknown long argument --blaa" >&2
      exit 1 ;;
    --quiet|--verbose|--grayscale|--disable-javascript|--print-media-type|--enable-local-file-access)
      shift ;;
    --*)
      shift; shift ;;
    *)
      if [ -n "$last" ]; then docs="$docs $last"; fi
      last="$1"
      count=$((count + 1))
      shift ;;
  esac
done

if [ "$count" -lt 2 ]; then
  echo "You need to specify at least one input file, and exactly one output file" >&2
  exit 1
fi

case "$docs" in
  *missing*)
    printf '%%PDF-1.4 partial\n'
    echo "Exit with code 1 due to network error: ContentNotFoundError" >&2
    exit 1 ;;
esac

emit() {
  printf '%%PDF-1.4\n%s\n%s\n' "$all" "${FAKE_MARKER:-}"
  for f in $docs; do
    if [ -f "$f" ]; then cat "$f"; fi
  done
  printf '\n%%%%EOF\n'
}

if [ "$last" = "-" ]; then
  emit
else
  emit > "$last"
fi
"#;

/// A temp dir holding the fake converter; keep it alive for the test.
struct FakeConverter {
    dir: TempDir,
}

impl FakeConverter {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wkhtmltopdf.sh"), FAKE_CONVERTER).unwrap();
        Self { dir }
    }

    fn command(&self) -> String {
        format!("sh {}", self.dir.path().join("wkhtmltopdf.sh").display())
    }

    fn config(&self) -> PdfConfig {
        PdfConfig::builder()
            .command(self.command())
            .asset_root(AssetRoot::media("/tmp/media", "/media/"))
            .asset_root(AssetRoot::static_files("/tmp/static", "/static/"))
            .build()
            .unwrap()
    }
}

fn templates() -> Environment<'static> {
    let mut env = new_environment();
    env.add_template("sample.html", "<html><body><h1>{{ title }}</h1></body></html>")
        .unwrap();
    env.add_template(
        "footer.html",
        r#"<html><img src="{{ MEDIA_URL }}logo.png"> STATIC_URL = "{{ STATIC_URL }}" {{ request.path }}</html>"#,
    )
    .unwrap();
    env
}

fn body_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Rendered temp files named on the converter's command line.
fn rendered_paths(pdf: &str) -> Vec<PathBuf> {
    pdf.lines()
        .nth(1)
        .unwrap_or("")
        .split_whitespace()
        .filter(|w| w.ends_with(".html"))
        .filter(|w| {
            Path::new(w)
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("wkhtmltopdf"))
        })
        .map(PathBuf::from)
        .collect()
}

macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match wkhtmltopdf_locate::locate_wkhtmltopdf() {
            Ok(path) => path,
            Err(e) => {
                println!("SKIP: {e}");
                return;
            }
        }
    }};
}

// ── Fake converter ───────────────────────────────────────────────────────────

#[test]
fn test_template_renders_to_pdf_bytes() {
    let fake = FakeConverter::new();
    let env = templates();
    let tpl = env.get_template("sample.html").unwrap();

    let pdf = render_pdf_from_template(
        &tpl,
        None,
        None,
        &context! { title => "A test template." },
        None,
        &OptionMap::new(),
        &fake.config(),
    )
    .unwrap();

    assert!(pdf.starts_with(b"%PDF"));
    assert!(pdf.ends_with(b"%%EOF\n"));
    let text = body_text(&pdf);
    assert!(text.contains("<h1>A test template.</h1>"), "got: {text}");
    assert!(text.contains("--encoding utf8 --quiet"), "got: {text}");
}

#[test]
fn test_empty_documents_surface_as_process_failure() {
    let fake = FakeConverter::new();
    let err = convert(&ConversionRequest::default(), &fake.config()).unwrap_err();
    match err {
        Html2PdfError::ProcessFailed {
            exit_code,
            args,
            stderr,
            ..
        } => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(args.first().map(String::as_str), Some("sh"));
            assert_eq!(args.last().map(String::as_str), Some("-"));
            assert!(stderr.contains("at least one input file"), "got: {stderr}");
        }
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
}

#[test]
fn test_unknown_option_reports_exact_argv() {
    let fake = FakeConverter::new();
    let request = ConversionRequest::new(["page.html"]).option("blaa", true);
    let err = convert(&request, &fake.config()).unwrap_err();
    match err {
        Html2PdfError::ProcessFailed { args, stderr, .. } => {
            let expected: Vec<String> = fake
                .command()
                .split_whitespace()
                .map(str::to_string)
                .chain(
                    ["--blaa", "--encoding", "utf8", "--quiet", "page.html", "-"]
                        .map(str::to_string),
                )
                .collect();
            assert_eq!(args, expected);
            assert!(stderr.contains("--blaa"));
        }
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
}

#[test]
fn test_missing_content_is_ignored_only_when_configured() {
    let fake = FakeConverter::new();
    let request = ConversionRequest::new(["missing.html"]);

    let err = convert(&request, &fake.config()).unwrap_err();
    assert!(err.is_process_failure());

    let mut config = fake.config();
    config.ignore_marker = Some(edgequake_html2pdf::CONTENT_NOT_FOUND_MARKER.into());
    let pdf = convert(&request, &config).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4 partial"));
}

#[test]
fn test_extra_environment_reaches_converter() {
    let fake = FakeConverter::new();
    let mut config = fake.config();
    config.env.insert("FAKE_MARKER".into(), "marker-42".into());
    let pdf = convert(&ConversionRequest::new(["page.html"]), &config).unwrap();
    assert!(body_text(&pdf).contains("marker-42"));
}

#[test]
fn test_footer_response_carries_options_and_filename() {
    let fake = FakeConverter::new();
    let env = templates();
    let req = PdfTemplateRequest::new("sample.html")
        .footer_template("footer.html")
        .filename("output.pdf")
        .option("title", "Test PDF");
    let request = context! { path => "/invoices/7" };

    let response = render_pdf_response(
        &env,
        &req,
        &context! { title => "Heading" },
        Some(&request),
        &fake.config(),
    )
    .unwrap();

    assert_eq!(response.content_type, "application/pdf");
    assert_eq!(
        response.content_disposition().as_deref(),
        Some(r#"attachment; filename="output.pdf""#)
    );
    let text = body_text(&response.body);
    assert!(text.contains("--title Test PDF"), "got: {text}");
    assert!(text.contains("--footer-html "), "got: {text}");
    assert!(text.contains("<h1>Heading</h1>"), "got: {text}");
}

#[test]
fn test_footer_template_sees_context_processors() {
    let env = templates();
    let tpl = env.get_template("footer.html").unwrap();
    let fake = FakeConverter::new();
    let mut doc = edgequake_html2pdf::render_to_temporary_file(
        &tpl,
        &(),
        Some(&context! { path => "/invoices/7" }),
        &fake.config(),
    )
    .unwrap();
    let html = doc.read_to_string().unwrap();
    assert!(html.contains(r#"src="file:///tmp/media/logo.png""#), "got: {html}");
    assert!(html.contains(r#"STATIC_URL = "file:///tmp/static/""#), "got: {html}");
    assert!(html.contains("/invoices/7"), "got: {html}");
}

#[test]
fn test_debug_controls_temp_file_lifetime() {
    let fake = FakeConverter::new();
    let env = templates();
    let tpl = env.get_template("sample.html").unwrap();
    let footer = env.get_template("footer.html").unwrap();
    let ctx = context! { title => "Debug" };

    let pdf = render_pdf_from_template(
        &tpl,
        None,
        Some(&footer),
        &ctx,
        None,
        &OptionMap::new(),
        &fake.config(),
    )
    .unwrap();
    let paths = rendered_paths(&body_text(&pdf));
    assert_eq!(paths.len(), 2, "got: {paths:?}");
    assert!(paths.iter().all(|p| !p.exists()));

    let mut config = fake.config();
    config.debug = true;
    let pdf = render_pdf_from_template(
        &tpl,
        None,
        Some(&footer),
        &ctx,
        None,
        &OptionMap::new(),
        &config,
    )
    .unwrap();
    let paths = rendered_paths(&body_text(&pdf));
    assert_eq!(paths.len(), 2, "got: {paths:?}");
    for path in paths {
        assert!(path.is_file(), "{} should be kept", path.display());
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn test_convert_to_file_writes_pdf() {
    let fake = FakeConverter::new();
    let page = fake.dir.path().join("page.html");
    std::fs::write(&page, "<html><p>On disk</p></html>").unwrap();
    let target = fake.dir.path().join("out/report.pdf");

    let request = ConversionRequest::new([page.to_string_lossy()]);
    let written = convert_to_file(&request, &target, &fake.config()).unwrap();

    let bytes = std::fs::read(&written).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(body_text(&bytes).contains("<p>On disk</p>"));
}

#[tokio::test]
async fn test_async_response() {
    let fake = FakeConverter::new();
    let env = Arc::new(templates());
    let req = PdfTemplateRequest::new("sample.html").filename("♥.pdf").inline();

    let response = render_pdf_response_async(
        env,
        req,
        context! { title => "Async" },
        None,
        fake.config(),
    )
    .await
    .unwrap();

    assert!(response.body.starts_with(b"%PDF"));
    assert_eq!(
        response.content_disposition().as_deref(),
        Some(r#"inline; filename="?.pdf""#)
    );
}

#[test]
fn test_missing_converter_is_spawn_error() {
    let config = PdfConfig::builder()
        .command("/nonexistent/bin/wkhtmltopdf")
        .build()
        .unwrap();
    let err = convert(&ConversionRequest::new(["page.html"]), &config).unwrap_err();
    assert!(matches!(err, Html2PdfError::Spawn { .. }), "got: {err:?}");
}

// ── Real wkhtmltopdf ─────────────────────────────────────────────────────────

#[test]
fn test_real_converter_renders_template() {
    let binary = e2e_skip_unless_ready!();
    let config = PdfConfig::builder()
        .command(binary.to_string_lossy())
        .build()
        .unwrap();
    let env = templates();
    let tpl = env.get_template("sample.html").unwrap();

    let pdf = render_pdf_from_template(
        &tpl,
        None,
        None,
        &context! { title => "A test template." },
        None,
        &OptionMap::new(),
        &config,
    )
    .unwrap();
    assert!(pdf.starts_with(b"%PDF-"), "not a PDF");
}

#[test]
fn test_real_converter_rejects_empty_documents() {
    let binary = e2e_skip_unless_ready!();
    let config = PdfConfig::builder()
        .command(binary.to_string_lossy())
        .build()
        .unwrap();
    let err = convert(&ConversionRequest::default(), &config).unwrap_err();
    assert!(err.is_process_failure(), "got: {err:?}");
}

#[test]
fn test_real_converter_unknown_option() {
    let binary = e2e_skip_unless_ready!();
    let config = PdfConfig::builder()
        .command(binary.to_string_lossy())
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("page.html");
    std::fs::write(&page, "<html><body>x</body></html>").unwrap();

    let request = ConversionRequest::new([page.to_string_lossy()]).option("blaa", true);
    let err = convert(&request, &config).unwrap_err();
    assert!(err.to_string().contains("--blaa") || err.exit_code().is_some());
}
