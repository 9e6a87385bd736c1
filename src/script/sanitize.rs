//! Conversion of native values into inert JavaScript literal fragments.

use crate::error::SanitizeError;
use serde::Serialize;
use std::fmt::Write;

/// A value that may be passed as an argument to a script function.
///
/// The set is closed on purpose: anything that is not a string or null must
/// go through JSON (see [`ScriptArgument::json`]), so there is no way to hand
/// the builder an arbitrary native object.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArgument {
    String(String),
    Json(serde_json::Value),
    Null,
}

impl ScriptArgument {
    /// Convert any serializable value into a JSON argument.
    ///
    /// Fails for values JSON cannot represent, such as maps with non-string keys.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SanitizeError> {
        Ok(ScriptArgument::Json(serde_json::to_value(value)?))
    }
}

impl From<&str> for ScriptArgument {
    fn from(s: &str) -> Self {
        ScriptArgument::String(s.to_string())
    }
}

impl From<String> for ScriptArgument {
    fn from(s: String) -> Self {
        ScriptArgument::String(s)
    }
}

impl From<serde_json::Value> for ScriptArgument {
    fn from(v: serde_json::Value) -> Self {
        ScriptArgument::Json(v)
    }
}

impl From<bool> for ScriptArgument {
    fn from(b: bool) -> Self {
        ScriptArgument::Json(b.into())
    }
}

impl From<i64> for ScriptArgument {
    fn from(n: i64) -> Self {
        ScriptArgument::Json(n.into())
    }
}

impl From<f64> for ScriptArgument {
    fn from(n: f64) -> Self {
        // NaN and infinities have no JSON form and become null
        ScriptArgument::Json(n.into())
    }
}

impl<T: Into<ScriptArgument>> From<Option<T>> for ScriptArgument {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ScriptArgument::Null)
    }
}

/// Render one argument as a script fragment.
///
/// With `escape` set, strings come out single-quoted with every character
/// that could end the literal, open markup, or break the line emitted as a
/// `\uXXXX` escape. Without it the string is spliced in verbatim: only pass
/// `false` for static, trusted literals.
pub fn sanitize(arg: &ScriptArgument, escape: bool) -> Result<String, SanitizeError> {
    match arg {
        ScriptArgument::String(s) if escape => Ok(quote_string(s)),
        ScriptArgument::String(s) => Ok(s.clone()),
        ScriptArgument::Json(v) => json_fragment(v),
        ScriptArgument::Null => Ok("null".to_string()),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if needs_escape(c) {
            push_unicode_escape(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

fn needs_escape(c: char) -> bool {
    matches!(c, '&' | '<' | '>' | '"' | '\'' | '\\' | '`' | '\u{2028}' | '\u{2029}') || c.is_control()
}

fn push_unicode_escape(out: &mut String, c: char) {
    // Every escaped char is in the BMP, so one \uXXXX unit is enough
    let _ = write!(out, "\\u{:04x}", c as u32);
}

/// JSON with bare scalars allowed. Characters that are legal in JSON strings
/// but dangerous inside an HTML script element are re-encoded; they can only
/// appear inside string literals, so the value is unchanged.
fn json_fragment(value: &serde_json::Value) -> Result<String, SanitizeError> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => push_unicode_escape(&mut out, c),
            c => out.push(c),
        }
    }
    Ok(out)
}
