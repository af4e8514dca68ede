//! Command builder: turn an option mapping into wkhtmltopdf flags.
//!
//! Options are keyed by `snake_case` name and rendered as `--kebab-case`
//! flags. A [`BTreeMap`] keeps iteration sorted by name, so the same mapping
//! always produces the same command line.
//!
//! ```rust
//! use edgequake_html2pdf::{options_to_args, OptionMap, OptionValue};
//!
//! let mut opts = OptionMap::new();
//! opts.insert("page_size".into(), "A4".into());
//! opts.insert("disable_javascript".into(), true.into());
//! opts.insert("quiet".into(), OptionValue::Suppressed);
//!
//! assert_eq!(
//!     options_to_args(&opts),
//!     vec!["--disable-javascript", "--page-size", "A4"]
//! );
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Html2PdfError;

/// Option name → value, iterated in name order.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// Value of a single converter option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum OptionValue {
    /// Emit the flag alone, e.g. `--quiet`.
    Flag,
    /// Emit the flag followed by this value, e.g. `--dpi 300`.
    Value(String),
    /// Emit nothing. Used to cancel an option injected by the defaults.
    Suppressed,
}

impl OptionValue {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, OptionValue::Suppressed)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        if v {
            OptionValue::Flag
        } else {
            OptionValue::Suppressed
        }
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Value(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Value(v)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(OptionValue::Suppressed)
    }
}

macro_rules! option_value_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for OptionValue {
            fn from(v: $t) -> Self {
                OptionValue::Value(v.to_string())
            }
        })*
    };
}

option_value_from_number!(i32, i64, u16, u32, u64, usize, f32, f64);

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag => f.write_str("true"),
            OptionValue::Value(v) => f.write_str(v),
            OptionValue::Suppressed => f.write_str("<suppressed>"),
        }
    }
}

impl TryFrom<serde_json::Value> for OptionValue {
    type Error = String;

    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        match v {
            serde_json::Value::Bool(b) => Ok(b.into()),
            serde_json::Value::Null => Ok(OptionValue::Suppressed),
            serde_json::Value::String(s) => Ok(OptionValue::Value(s)),
            serde_json::Value::Number(n) => Ok(OptionValue::Value(n.to_string())),
            other => Err(format!(
                "option values must be a string, number, boolean or null, got {other}"
            )),
        }
    }
}

impl From<OptionValue> for serde_json::Value {
    fn from(v: OptionValue) -> Self {
        match v {
            OptionValue::Flag => serde_json::Value::Bool(true),
            OptionValue::Value(s) => serde_json::Value::String(s),
            OptionValue::Suppressed => serde_json::Value::Null,
        }
    }
}

/// Options applied when the configuration supplies none.
pub fn default_options() -> OptionMap {
    let mut opts = OptionMap::new();
    opts.insert("quiet".into(), OptionValue::Flag);
    opts
}

/// Layer caller `overrides` on top of `defaults`.
///
/// `defaults = None` means [`default_options`]. `encoding` is forced to
/// `utf8` unless either layer mentions it; an explicit
/// [`OptionValue::Suppressed`] encoding is left alone.
pub fn merge_options(defaults: Option<&OptionMap>, overrides: &OptionMap) -> OptionMap {
    let mut merged = defaults.cloned().unwrap_or_else(default_options);
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
        .entry("encoding".into())
        .or_insert_with(|| OptionValue::Value("utf8".into()));
    merged
}

/// Reject option names that cannot become a well-formed flag.
pub fn validate_options(options: &OptionMap) -> Result<(), Html2PdfError> {
    for name in options.keys() {
        if name.trim().is_empty() {
            return Err(Html2PdfError::InvalidInput(
                "option name must not be empty".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(Html2PdfError::InvalidInput(format!(
                "option '{name}' must be given without leading dashes"
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(Html2PdfError::InvalidInput(format!(
                "option '{name}' must not contain whitespace"
            )));
        }
    }
    Ok(())
}

/// Convert `options` into command-line arguments, sorted by option name.
pub fn options_to_args(options: &OptionMap) -> Vec<String> {
    let mut flags = Vec::with_capacity(options.len() * 2);
    for (name, value) in options {
        match value {
            OptionValue::Suppressed => continue,
            OptionValue::Flag => flags.push(flag_name(name)),
            OptionValue::Value(v) => {
                flags.push(flag_name(name));
                flags.push(v.clone());
            }
        }
    }
    flags
}

fn flag_name(name: &str) -> String {
    format!("--{}", name.replace('_', "-"))
}
