//! minijinja environment helpers.
//!
//! Templates named `*.html` are auto-escaped. The stock HTML escaper also
//! encodes `/` as `&#x2f;`, which would hide `{{ STATIC_URL }}`-style
//! prefixes from the asset rewriter, so environments built here use an
//! escaper that leaves `/` alone.

use std::path::Path;

use minijinja::{escape_formatter, AutoEscape, Environment, Error, Output, State, Value};

/// An empty environment with the HTML formatter installed.
pub fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_formatter(html_formatter);
    env
}

/// An environment that loads templates from `dir` on first use.
pub fn environment_from_dir(dir: impl AsRef<Path>) -> Environment<'static> {
    let mut env = new_environment();
    env.set_loader(minijinja::path_loader(dir));
    env
}

fn html_formatter(out: &mut Output<'_>, state: &State<'_, '_>, value: &Value) -> Result<(), Error> {
    let escapable = matches!(state.auto_escape(), AutoEscape::Html)
        && !value.is_safe()
        && !value.is_undefined()
        && !value.is_none();
    if !escapable {
        return escape_formatter(out, state, value);
    }

    let text = value.to_string();
    let mut last = 0;
    for (i, c) in text.char_indices() {
        let entity = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&#x27;",
            _ => continue,
        };
        out.write_str(&text[last..i])?;
        out.write_str(entity)?;
        last = i + c.len_utf8();
    }
    out.write_str(&text[last..])?;
    Ok(())
}
