use super::render::{generate_reader_content, style_hash};
use super::{ReaderModeCache, ReaderModeStyle};
use crate::internal::{InternalRequest, InternalResponse, InternalSchemeResponse, InternalUrl};
use crate::prefs::Preferences;
use crate::security::CspNonce;
use crate::{Error, Result};
use log::debug;
use std::sync::Arc;
use url::Url;

/// Serves `internal://local/readermode?url=<page>` from the reader cache.
///
/// Read-only: a miss is reported as [`Error::ContentUnavailable`] and the
/// cache is never populated from here.
pub struct ReaderModeHandler {
    cache: Arc<dyn ReaderModeCache>,
    prefs: Arc<dyn Preferences>,
    // `scheme://host`, the port is always the `:*` wildcard
    resource_host: String,
}

impl ReaderModeHandler {
    pub fn new(cache: Arc<dyn ReaderModeCache>, prefs: Arc<dyn Preferences>, resource_origin: &str) -> Self {
        Self {
            cache,
            prefs,
            resource_host: host_source(resource_origin),
        }
    }

    /// Policy for one response: images from anywhere, fonts and stylesheets
    /// from the resource origin plus the hashed inline style, and only the
    /// nonce-bearing title script.
    pub fn content_security_policy(&self, nonce: &CspNonce) -> String {
        format!(
            "default-src 'none'; img-src *; style-src {origin}:* '{hash}'; font-src {origin}:*; script-src 'nonce-{nonce}'",
            origin = self.resource_host,
            hash = style_hash(),
            nonce = nonce,
        )
    }

    fn style(&self) -> ReaderModeStyle {
        ReaderModeStyle::resolve(self.prefs.reader_mode_style().as_ref())
    }
}

/// CSP host-source without a port, so `:*` can be appended
fn host_source(origin: &str) -> String {
    match Url::parse(origin) {
        Ok(url) => match url.host_str() {
            Some(host) => format!("{}://{}", url.scheme(), host),
            None => url.scheme().to_string(),
        },
        Err(_) => origin.trim_end_matches('/').to_string(),
    }
}

impl InternalSchemeResponse for ReaderModeHandler {
    fn response(&self, request: &InternalRequest) -> Result<Option<InternalResponse>> {
        let Some(internal) = InternalUrl::new(&request.url) else {
            return Ok(None);
        };
        let Some(page_url) = internal.extracted_url_param() else {
            return Ok(None);
        };

        let result = self.cache.get(&page_url).map_err(|e| {
            debug!("Reader cache lookup for {} failed: {}", page_url, e);
            Error::ContentUnavailable(page_url.to_string())
        })?;

        let nonce = CspNonce::generate()?;
        let html = generate_reader_content(&result, &self.style(), &nonce)
            .map_err(|e| Error::ContentUnavailable(format!("{}: {}", page_url, e)))?;

        let mut response = InternalResponse::html(request.url.clone(), html.into_bytes());
        response.set_header("Content-Security-Policy", self.content_security_policy(&nonce));
        Ok(Some(response))
    }
}
