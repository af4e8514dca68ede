//! Configuration for HTML-to-PDF conversion.
//!
//! Every knob the converter pipeline reads lives in [`PdfConfig`], built via
//! its [`PdfConfigBuilder`] or loaded from the environment with
//! [`PdfConfig::from_env`]. The config is passed explicitly into each call;
//! nothing is read from process-wide settings behind the caller's back.
//!
//! # Environment variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WKHTMLTOPDF_CMD` | `command` (falls back to the located binary) |
//! | `WKHTMLTOPDF_CMD_OPTIONS` | `default_options` (JSON object) |
//! | `WKHTMLTOPDF_ENV` | `env` (JSON object of strings) |
//! | `WKHTMLTOPDF_DEBUG` | `debug` (`1`, `true`, `yes`, `on`) |
//! | `WKHTMLTOPDF_IGNORE_404` | `ignore_marker` = `ContentNotFoundError` |
//! | `MEDIA_ROOT` + `MEDIA_URL` | media [`AssetRoot`] |
//! | `STATIC_ROOT` + `STATIC_URL` | static [`AssetRoot`] |

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Html2PdfError;
use crate::pipeline::options::{validate_options, OptionMap, OptionValue};
use crate::pipeline::process::RunOptions;

pub use crate::pipeline::process::{StderrMode, CONTENT_NOT_FOUND_MARKER};

/// Name of the converter when nothing better is known.
pub const DEFAULT_COMMAND: &str = "wkhtmltopdf";

/// A directory served under a public URL prefix.
///
/// Quoted references starting with `url` in rendered HTML are rewritten to
/// `file://` URLs under `root`. When `context_var` is set, templates also
/// see `url` under that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRoot {
    pub root: PathBuf,
    pub url: String,
    #[serde(default)]
    pub context_var: Option<String>,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
            context_var: None,
        }
    }

    /// User-uploaded files, exposed to templates as `MEDIA_URL`.
    pub fn media(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self::new(root, url).with_context_var("MEDIA_URL")
    }

    /// Bundled assets, exposed to templates as `STATIC_URL`.
    pub fn static_files(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self::new(root, url).with_context_var("STATIC_URL")
    }

    pub fn with_context_var(mut self, name: impl Into<String>) -> Self {
        self.context_var = Some(name.into());
        self
    }
}

/// Configuration for an HTML-to-PDF conversion.
///
/// Built via [`PdfConfig::builder()`], [`PdfConfig::from_env()`] or
/// [`PdfConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_html2pdf::{AssetRoot, PdfConfig};
///
/// let config = PdfConfig::builder()
///     .command("xvfb-run wkhtmltopdf")
///     .option("page_size", "A4")
///     .asset_root(AssetRoot::static_files("/srv/app/static", "/static/"))
///     .build()
///     .unwrap();
/// assert_eq!(config.command_words(), vec!["xvfb-run", "wkhtmltopdf"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Converter command line, split on whitespace. Default: `wkhtmltopdf`.
    ///
    /// Wrappers go here too, e.g. `xvfb-run -a wkhtmltopdf`.
    pub command: String,

    /// Options applied to every conversion before the caller's own.
    /// `None` means `{quiet: true}`.
    pub default_options: Option<OptionMap>,

    /// Extra environment variables for the converter process, layered over
    /// the inherited environment.
    pub env: BTreeMap<String, String>,

    /// Keep rendered temp files on disk after use. Default: false.
    pub debug: bool,

    /// Asset roots applied in order when rewriting rendered HTML.
    pub asset_roots: Vec<AssetRoot>,

    /// A failed run whose stderr contains this text is treated as success.
    /// Default: none.
    pub ignore_marker: Option<String>,

    /// Whether converter stderr is captured or passed through.
    pub stderr: StderrMode,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            default_options: None,
            env: BTreeMap::new(),
            debug: false,
            asset_roots: Vec::new(),
            ignore_marker: None,
            stderr: StderrMode::default(),
        }
    }
}

impl PdfConfig {
    /// Create a new builder for `PdfConfig`.
    pub fn builder() -> PdfConfigBuilder {
        PdfConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, Html2PdfError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Html2PdfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        builder = match get("WKHTMLTOPDF_CMD") {
            Some(cmd) => builder.command(cmd),
            None => builder.command(located_command()),
        };

        if let Some(raw) = get("WKHTMLTOPDF_CMD_OPTIONS") {
            let opts: OptionMap = serde_json::from_str(&raw).map_err(|e| {
                Html2PdfError::InvalidConfig(format!("WKHTMLTOPDF_CMD_OPTIONS: {e}"))
            })?;
            builder = builder.default_options(opts);
        }

        if let Some(raw) = get("WKHTMLTOPDF_ENV") {
            let env: BTreeMap<String, String> = serde_json::from_str(&raw)
                .map_err(|e| Html2PdfError::InvalidConfig(format!("WKHTMLTOPDF_ENV: {e}")))?;
            for (k, v) in env {
                builder = builder.env(k, v);
            }
        }

        builder = builder
            .debug(get("WKHTMLTOPDF_DEBUG").is_some_and(|v| is_truthy(&v)))
            .ignore_missing_content(get("WKHTMLTOPDF_IGNORE_404").is_some_and(|v| is_truthy(&v)));

        if let Some(root) = asset_root_from(&get, "MEDIA_ROOT", "MEDIA_URL", AssetRoot::media) {
            builder = builder.asset_root(root);
        }
        if let Some(root) = asset_root_from(&get, "STATIC_ROOT", "STATIC_URL", AssetRoot::static_files) {
            builder = builder.asset_root(root);
        }

        builder.build()
    }

    /// The converter command split into words, program first.
    pub fn command_words(&self) -> Vec<String> {
        self.command.split_whitespace().map(str::to_string).collect()
    }

    /// Process-runner settings derived from this config.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            env: self.env.clone(),
            ignore_marker: self.ignore_marker.clone(),
            stderr: self.stderr,
        }
    }
}

/// Builder for [`PdfConfig`].
#[derive(Debug)]
pub struct PdfConfigBuilder {
    config: PdfConfig,
}

impl PdfConfigBuilder {
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.config.command = command.into();
        self
    }

    /// Replace the default option set wholesale.
    pub fn default_options(mut self, options: OptionMap) -> Self {
        self.config.default_options = Some(options);
        self
    }

    /// Add one default option on top of `{quiet: true}` (or whatever
    /// defaults were set before).
    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.config
            .default_options
            .get_or_insert_with(crate::pipeline::options::default_options)
            .insert(name.into(), value.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn asset_root(mut self, root: AssetRoot) -> Self {
        self.config.asset_roots.push(root);
        self
    }

    pub fn ignore_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.ignore_marker = Some(marker.into());
        self
    }

    /// Treat runs that only failed on a missing linked resource as success.
    pub fn ignore_missing_content(mut self, v: bool) -> Self {
        self.config.ignore_marker = v.then(|| CONTENT_NOT_FOUND_MARKER.to_string());
        self
    }

    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.config.stderr = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PdfConfig, Html2PdfError> {
        let c = &self.config;
        if c.command.trim().is_empty() {
            return Err(Html2PdfError::InvalidConfig(
                "converter command must not be empty".into(),
            ));
        }
        if let Some(opts) = &c.default_options {
            validate_options(opts)
                .map_err(|e| Html2PdfError::InvalidConfig(format!("default options: {e}")))?;
        }
        if let Some(root) = c.asset_roots.iter().find(|r| r.root.as_os_str().is_empty()) {
            return Err(Html2PdfError::InvalidConfig(format!(
                "asset root for '{}' has an empty directory",
                root.url
            )));
        }
        Ok(self.config)
    }
}

fn located_command() -> String {
    match wkhtmltopdf_locate::locate_wkhtmltopdf() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(e) => {
            debug!("{e}; falling back to '{DEFAULT_COMMAND}'");
            DEFAULT_COMMAND.to_string()
        }
    }
}

fn asset_root_from<G>(
    get: &G,
    root_var: &str,
    url_var: &str,
    make: fn(PathBuf, String) -> AssetRoot,
) -> Option<AssetRoot>
where
    G: Fn(&str) -> Option<String>,
{
    match (get(root_var), get(url_var)) {
        (Some(root), Some(url)) => Some(make(PathBuf::from(root), url)),
        (Some(_), None) => {
            debug!("{root_var} is set without {url_var}; skipping");
            None
        }
        _ => None,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
