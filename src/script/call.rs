use super::sanitize::{sanitize, ScriptArgument};
use crate::{Error, Result};
use std::fmt;

/// A fully sanitized `name(arg1, arg2, ...)` expression.
///
/// Built once and consumed by value when handed to a web view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCall {
    javascript: String,
}

impl ScriptCall {
    /// Build a call expression from a function path and its arguments.
    ///
    /// Fails on the first argument that cannot be sanitized; no expression is
    /// produced for a partially sanitized argument list.
    pub fn build(function_name: &str, args: &[ScriptArgument], escape: bool) -> Result<Self> {
        if !is_function_path(function_name) {
            return Err(Error::InvalidFunctionName(function_name.to_string()));
        }

        let sanitized = args
            .iter()
            .map(|arg| sanitize(arg, escape))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if sanitized.len() != args.len() {
            debug_assert!(false, "script argument sanitization dropped arguments");
            return Err(Error::ArgumentCountMismatch {
                expected: args.len(),
                actual: sanitized.len(),
            });
        }

        Ok(Self {
            javascript: format!("{}({})", function_name, sanitized.join(", ")),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.javascript
    }

    pub fn into_string(self) -> String {
        self.javascript
    }
}

impl fmt::Display for ScriptCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.javascript)
    }
}

// Dotted identifier path such as `window.__rfox__.reader.setStyle`
fn is_function_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
                    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                }
                _ => false,
            }
        })
}
