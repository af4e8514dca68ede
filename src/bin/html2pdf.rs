//! CLI binary for edgequake-html2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `PdfConfig`
//! and writes the resulting PDF to a file or stdout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_html2pdf::{
    convert_async, convert_to_file, environment_from_dir, render_html,
    render_pdf_from_template_async, AssetRoot, ConversionRequest, OptionMap, OptionValue,
    PdfConfig, PdfTemplateRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a page (PDF on stdout)
  html2pdf convert page.html > page.pdf

  # Several documents into one file, with a footer
  html2pdf convert cover.html https://example.com/report -o report.pdf \
      --footer-html footer.html

  # Converter options: bare KEY is a flag, KEY=VALUE passes a value
  html2pdf -O page_size=A4 -O orientation=Landscape -O grayscale convert page.html -o out.pdf

  # Drop a default option (quiet and encoding are on by default)
  html2pdf --suppress quiet convert page.html -o out.pdf

  # Render a template with a JSON context
  html2pdf render invoice.html --template-dir templates --context invoice.json \
      --footer footer.html -o invoice.pdf

  # Preview the HTML the converter would see
  html2pdf --static-root ./static render invoice.html --template-dir templates --html

  # Check the converter installation
  html2pdf check

ENVIRONMENT VARIABLES:
  WKHTMLTOPDF_CMD          Converter command (may include a wrapper, e.g. "xvfb-run wkhtmltopdf")
  WKHTMLTOPDF_PATH         Explicit path to the wkhtmltopdf executable
  WKHTMLTOPDF_CMD_OPTIONS  JSON object of default options, e.g. {"quiet": true, "dpi": 300}
  WKHTMLTOPDF_ENV          JSON object of extra environment variables for the converter
  WKHTMLTOPDF_DEBUG        Keep rendered temp files (1, true, yes, on)
  WKHTMLTOPDF_IGNORE_404   Treat ContentNotFoundError failures as success
  MEDIA_ROOT / MEDIA_URL   Media asset root and its public URL prefix
  STATIC_ROOT / STATIC_URL Static asset root and its public URL prefix
  RUST_LOG                 Override the log filter
"#;

/// Render HTML templates and pages to PDF through wkhtmltopdf.
#[derive(Parser, Debug)]
#[command(
    name = "html2pdf",
    version,
    about = "Render HTML templates and pages to PDF through wkhtmltopdf",
    long_about = "Convert HTML files and URLs to PDF, or render minijinja templates to PDF, \
by driving the wkhtmltopdf command-line converter. Root-relative asset URLs are rewritten \
to file:// URLs so stylesheets and images load without a web server.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    converter: ConverterArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "HTML2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "HTML2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert HTML files or URLs into one PDF.
    Convert {
        /// Input documents (file paths or URLs), in page order.
        #[arg(required = true)]
        documents: Vec<String>,

        /// Write the PDF to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// HTML document repeated as the header of every page.
        #[arg(long)]
        header_html: Option<String>,

        /// HTML document repeated as the footer of every page.
        #[arg(long)]
        footer_html: Option<String>,
    },

    /// Render a template with a JSON context and convert it.
    Render {
        /// Template name, relative to --template-dir.
        template: String,

        /// Directory templates are loaded from.
        #[arg(long, default_value = ".")]
        template_dir: PathBuf,

        /// JSON file whose top-level object becomes the template context.
        #[arg(long)]
        context: Option<PathBuf>,

        /// Header template name.
        #[arg(long)]
        header: Option<String>,

        /// Footer template name.
        #[arg(long)]
        footer: Option<String>,

        /// Write the output to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the rendered HTML instead of a PDF.
        #[arg(long)]
        html: bool,
    },

    /// Locate the converter and print its version.
    Check,
}

#[derive(Args, Debug)]
struct ConverterArgs {
    /// Converter command line (whitespace-separated).
    #[arg(long, global = true, env = "WKHTMLTOPDF_CMD")]
    cmd: Option<String>,

    /// Converter option: KEY for a flag, KEY=VALUE for a value. Repeatable.
    #[arg(short = 'O', long = "option", value_name = "KEY[=VALUE]", global = true)]
    options: Vec<String>,

    /// Cancel a default option such as `quiet` or `encoding`. Repeatable.
    #[arg(long, value_name = "KEY", global = true)]
    suppress: Vec<String>,

    /// Directory served under --media-url.
    #[arg(long, global = true)]
    media_root: Option<PathBuf>,

    /// Public URL prefix of --media-root.
    #[arg(long, global = true, default_value = "/media/")]
    media_url: String,

    /// Directory served under --static-url.
    #[arg(long, global = true)]
    static_root: Option<PathBuf>,

    /// Public URL prefix of --static-root.
    #[arg(long, global = true, default_value = "/static/")]
    static_url: String,

    /// Keep rendered temp files on disk.
    #[arg(long, global = true)]
    debug: bool,

    /// Treat failures caused only by missing linked resources as success.
    #[arg(long, global = true)]
    ignore_missing: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless -v was given.
    let show_progress = !cli.quiet && !cli.verbose && !matches!(cli.command, Command::Check);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.converter)?;
    let options = parse_options(&cli.converter.options, &cli.converter.suppress)?;

    match cli.command {
        Command::Check => check(&config, cli.converter.cmd.is_some()),

        Command::Convert {
            documents,
            output,
            header_html,
            footer_html,
        } => {
            let mut request = ConversionRequest::new(documents).options(options);
            request.header = header_html;
            request.footer = footer_html;

            let spinner = spinner(show_progress, "Converting…");
            let started = Instant::now();
            let result = match output.clone() {
                Some(path) => tokio::task::spawn_blocking(move || {
                    convert_to_file(&request, &path, &config).map(|_| Vec::new())
                })
                .await
                .context("Conversion task panicked")?,
                None => convert_async(request, config).await,
            };
            finish(spinner, started, result.is_ok(), output.as_deref());
            let bytes = result.context("Conversion failed")?;
            if output.is_none() {
                write_stdout(&bytes)?;
            }
            Ok(())
        }

        Command::Render {
            template,
            template_dir,
            context,
            header,
            footer,
            output,
            html,
        } => {
            let ctx = load_context(context.as_deref())?;
            let env = Arc::new(environment_from_dir(&template_dir));

            if html {
                let tpl = env
                    .get_template(&template)
                    .with_context(|| format!("Failed to load template '{template}'"))?;
                let rendered =
                    render_html(&tpl, &ctx, None, &config).context("Failed to render template")?;
                return emit(rendered.as_bytes(), output.as_deref()).await;
            }

            let mut req = PdfTemplateRequest::new(&template);
            req.header_template = header;
            req.footer_template = footer;
            req.options = options;

            let spinner = spinner(show_progress, "Rendering…");
            let started = Instant::now();
            let result = render_pdf_from_template_async(env, req, ctx, None, config).await;
            finish(spinner, started, result.is_ok(), output.as_deref());
            let bytes = result.context("Rendering failed")?;
            emit(&bytes, output.as_deref()).await
        }
    }
}

/// Map CLI args onto the environment-derived `PdfConfig`.
fn build_config(args: &ConverterArgs) -> Result<PdfConfig> {
    let mut config = PdfConfig::from_env().context("Invalid configuration")?;

    if let Some(cmd) = &args.cmd {
        config.command = cmd.clone();
    }
    if config.command.trim().is_empty() {
        anyhow::bail!("Converter command must not be empty");
    }
    config.debug |= args.debug;
    if args.ignore_missing {
        config.ignore_marker = Some(edgequake_html2pdf::CONTENT_NOT_FOUND_MARKER.to_string());
    }
    if let Some(root) = &args.media_root {
        config.asset_roots.retain(|r| r.url != args.media_url);
        config
            .asset_roots
            .push(AssetRoot::media(root.clone(), args.media_url.clone()));
    }
    if let Some(root) = &args.static_root {
        config.asset_roots.retain(|r| r.url != args.static_url);
        config
            .asset_roots
            .push(AssetRoot::static_files(root.clone(), args.static_url.clone()));
    }

    Ok(config)
}

/// Parse `-O KEY[=VALUE]` and `--suppress KEY` into per-call options.
fn parse_options(options: &[String], suppress: &[String]) -> Result<OptionMap> {
    let mut map = OptionMap::new();
    for raw in options {
        let (key, value) = match raw.split_once('=') {
            Some((k, v)) => (k.trim(), OptionValue::Value(v.to_string())),
            None => (raw.trim(), OptionValue::Flag),
        };
        if key.is_empty() {
            anyhow::bail!("Invalid option '{raw}': expected KEY or KEY=VALUE");
        }
        map.insert(key.replace('-', "_"), value);
    }
    for key in suppress {
        map.insert(key.trim().replace('-', "_"), OptionValue::Suppressed);
    }
    Ok(map)
}

fn load_context(path: Option<&Path>) -> Result<minijinja::Value> {
    let json = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read context from {:?}", p))?;
            serde_json::from_str::<serde_json::Value>(&raw)
                .with_context(|| format!("Context file {:?} is not valid JSON", p))?
        }
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    if !json.is_object() {
        anyhow::bail!("Template context must be a JSON object");
    }
    Ok(minijinja::Value::from_serialize(&json))
}

fn check(config: &PdfConfig, explicit: bool) -> Result<()> {
    let (label, result) = converter_version(config, explicit)?;
    match result {
        Ok(version) => {
            println!("{} {}  {}", green("✔"), bold(&label), dim(&version));
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", red("✘"), label);
            Err(e).context("Converter check failed")
        }
    }
}

/// Query the converter's version. An explicit `--cmd` is run with all of
/// its words, so wrappers like `xvfb-run -a wkhtmltopdf` answer for the
/// converter they wrap.
fn converter_version(
    config: &PdfConfig,
    explicit: bool,
) -> Result<(String, Result<String, wkhtmltopdf_locate::LocateError>)> {
    if explicit {
        let words = config.command_words();
        let (program, args) = words.split_first().context("Converter command is empty")?;
        let result = wkhtmltopdf_locate::command_version(Path::new(program), args);
        Ok((words.join(" "), result))
    } else {
        let path = wkhtmltopdf_locate::locate_wkhtmltopdf().context("wkhtmltopdf not found")?;
        let result = wkhtmltopdf_locate::wkhtmltopdf_version(&path);
        Ok((path.display().to_string(), result))
    }
}

fn spinner(enabled: bool, message: &'static str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("wkhtmltopdf");
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    Some(bar)
}

fn finish(spinner: Option<ProgressBar>, started: Instant, ok: bool, output: Option<&Path>) {
    let Some(bar) = spinner else { return };
    bar.finish_and_clear();
    let elapsed = dim(&format!("{}ms", started.elapsed().as_millis()));
    if !ok {
        eprintln!("{} conversion failed  {elapsed}", red("✘"));
    } else if let Some(path) = output {
        eprintln!("{}  {elapsed}  →  {}", green("✔"), bold(&path.display().to_string()));
    } else {
        eprintln!("{}  {elapsed}", green("✔"));
    }
}

async fn emit(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            tokio::fs::write(path, bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", path))
        }
        None => write_stdout(bytes),
    }
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(bytes).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")
}
