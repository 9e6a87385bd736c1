//! HTML generation for reader pages.

use super::{ReadabilityResult, ReaderModeStyle};
use crate::script::{sanitize, ScriptArgument};
use crate::security::CspNonce;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use url::Url;

const TEMPLATE: &str = include_str!("template.html");

/// Inline stylesheet embedded in every reader page. The CSP allows exactly
/// this text through its hash.
pub const INLINE_STYLE: &str = include_str!("reader.css");

const PLACEHOLDER_PREFIX: &str = "%READER-";

/// CSP source expression for [`INLINE_STYLE`]: `sha256-<base64 digest>`
pub fn style_hash() -> String {
    format!("sha256-{}", STANDARD.encode(Sha256::digest(INLINE_STYLE.as_bytes())))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Replace `%READER-NAME%` placeholders in one pass, so substituted values
/// are never scanned for further placeholders. Unknown names are kept.
fn fill_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn title_script(title: &str, nonce: &CspNonce) -> Result<String> {
    let literal = sanitize(&ScriptArgument::from(title), true)?;
    let mut script = String::new();
    let _ = write!(script, "<script nonce=\"{}\">document.title = {};</script>", nonce, literal);
    Ok(script)
}

/// Only http(s) source links are rendered as clickable
fn source_link(url: &str) -> (String, String) {
    match Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {
            let domain = u.host_str().unwrap_or_default().to_string();
            (escape_html(u.as_str()), escape_html(&domain))
        }
        _ => ("#".to_string(), String::new()),
    }
}

/// Render a cached article with the given style. The nonce authorizes the
/// single inline script that sets the document title.
pub fn generate_reader_content(
    result: &ReadabilityResult,
    style: &ReaderModeStyle,
    nonce: &CspNonce,
) -> Result<String> {
    if result.content.trim().is_empty() {
        return Err(Error::ContentUnavailable(format!("empty reader entry for {}", result.url)));
    }

    let title_script = title_script(&result.title, nonce)?;
    let (href, domain) = source_link(&result.url);
    let dir = if result.dir == "rtl" { "rtl" } else { "ltr" };

    Ok(fill_template(TEMPLATE, |name| {
        let value = match name {
            "READER-DIR" => dir.to_string(),
            "READER-INLINE-STYLE" => INLINE_STYLE.to_string(),
            "READER-TITLE-SCRIPT" => title_script.clone(),
            "READER-STYLE" => style.body_classes(),
            "READER-URL" => href.clone(),
            "READER-DOMAIN" => domain.clone(),
            "READER-TITLE" => escape_html(&result.title),
            "READER-BYLINE" => escape_html(&result.byline),
            "READER-CONTENT" => result.content.clone(),
            _ => return None,
        };
        Some(value)
    }))
}
