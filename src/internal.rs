//! The `internal://` scheme: URL helpers and the request router.
//!
//! Internal pages are generated by the application itself. They are never a
//! source of trusted messages (see [`crate::dispatch`]) and are served through
//! [`InternalSchemeHandler`], which routes by path to registered handlers.

use crate::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;
use url::Url;

pub const SCHEME: &str = "internal";
pub const HOST: &str = "local";

/// Well-known internal paths
pub mod paths {
    pub const READER_MODE: &str = "readermode";
    pub const SESSION_RESTORE: &str = "sessionrestore";
}

/// A URL known to belong to the internal scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalUrl {
    url: Url,
}

impl InternalUrl {
    pub fn new(url: &Url) -> Option<Self> {
        if Self::is_valid(url) {
            Some(Self { url: url.clone() })
        } else {
            None
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Url::parse(input).ok().as_ref().and_then(Self::new)
    }

    pub fn is_valid(url: &Url) -> bool {
        url.scheme() == SCHEME && url.host_str() == Some(HOST)
    }

    /// Internal reader-mode URL for `target`
    pub fn reader_mode(target: &Url) -> Url {
        let mut url = Self::base(paths::READER_MODE);
        url.query_pairs_mut().append_pair("url", target.as_str());
        url
    }

    fn base(path: &str) -> Url {
        let mut url = Url::parse(&format!("{}://{}/", SCHEME, HOST))
            .unwrap_or_else(|_| unreachable!("static internal base URL"));
        url.set_path(path);
        url
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path without the leading slash
    pub fn path(&self) -> &str {
        self.url.path().trim_start_matches('/')
    }

    pub fn is_session_restore(&self) -> bool {
        self.path() == paths::SESSION_RESTORE
    }

    pub fn is_reader_mode(&self) -> bool {
        self.path() == paths::READER_MODE
    }

    /// The embedded `url` query parameter, when present and absolute
    pub fn extracted_url_param(&self) -> Option<Url> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == "url")
            .and_then(|(_, v)| Url::parse(&v).ok())
    }
}

/// A request for an internal page
#[derive(Debug, Clone)]
pub struct InternalRequest {
    pub url: Url,
}

impl InternalRequest {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

/// A generated response: status, headers and body bytes
#[derive(Debug, Clone)]
pub struct InternalResponse {
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl InternalResponse {
    /// 200 response with an HTML content type
    pub fn html(url: Url, body: Vec<u8>) -> Self {
        Self {
            url,
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html; charset=utf-8".to_string())],
            body,
        }
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn failure(url: Url, status: u16, message: &str) -> Self {
        let body = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{status}</title></head><body><p>{message}</p></body></html>"
        );
        let mut response = Self::html(url, body.into_bytes());
        response.status = status;
        response.set_header("Content-Security-Policy", "default-src 'none'".to_string());
        response
    }
}

/// A handler for one internal path.
///
/// `Ok(None)` means the handler does not own the request. `Err` is a terminal
/// failure for this request; nothing is retried.
pub trait InternalSchemeResponse: Send + Sync {
    fn response(&self, request: &InternalRequest) -> Result<Option<InternalResponse>>;
}

/// Routes internal requests by path and turns every outcome into a response
#[derive(Default)]
pub struct InternalSchemeHandler {
    handlers: HashMap<String, Box<dyn InternalSchemeResponse>>,
}

impl InternalSchemeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: &str, handler: impl InternalSchemeResponse + 'static) -> Result<()> {
        if self.handlers.contains_key(path) {
            return Err(Error::ConfigError(format!("internal path {} registered twice", path)));
        }
        self.handlers.insert(path.to_string(), Box::new(handler));
        Ok(())
    }

    /// Answer a request. Unknown paths and unowned requests get 404, content
    /// misses get 404 with an explanation, any other failure gets 500.
    pub fn respond(&self, request: &InternalRequest) -> InternalResponse {
        let url = request.url.clone();
        let Some(internal) = InternalUrl::new(&url) else {
            return InternalResponse::failure(url, 404, "Not an internal page.");
        };

        let Some(handler) = self.handlers.get(internal.path()) else {
            debug!("No internal handler for {}", internal.path());
            return InternalResponse::failure(url, 404, "Not found.");
        };

        match handler.response(request) {
            Ok(Some(response)) => response,
            Ok(None) => InternalResponse::failure(url, 404, "Not found."),
            Err(e) if e.is_content_miss() => {
                debug!("Internal page unavailable: {}", e);
                InternalResponse::failure(url, 404, "This page is no longer available.")
            }
            Err(e) => {
                warn!("Internal page {} failed: {}", internal.path(), e);
                InternalResponse::failure(url, 500, "Something went wrong.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_mode_url_round_trips_target() {
        let target = Url::parse("https://example.com/a b?x=1&y=<2>#frag").unwrap();
        let reader = InternalUrl::reader_mode(&target);
        assert!(reader.as_str().starts_with("internal://local/readermode?url="));
        let internal = InternalUrl::new(&reader).unwrap();
        assert!(internal.is_reader_mode());
        assert_eq!(internal.extracted_url_param().unwrap(), target);
    }

    #[test]
    fn only_internal_scheme_and_host_are_valid() {
        assert!(InternalUrl::parse("internal://local/sessionrestore").unwrap().is_session_restore());
        assert!(InternalUrl::parse("internal://remote/readermode").is_none());
        assert!(InternalUrl::parse("https://local/readermode").is_none());
        assert!(InternalUrl::parse("not a url").is_none());
    }

    #[test]
    fn missing_url_param() {
        let internal = InternalUrl::parse("internal://local/readermode?other=1").unwrap();
        assert!(internal.extracted_url_param().is_none());
    }

    struct Fixed(Result<Option<InternalResponse>>);

    impl InternalSchemeResponse for Fixed {
        fn response(&self, request: &InternalRequest) -> Result<Option<InternalResponse>> {
            match &self.0 {
                Ok(Some(_)) => Ok(Some(InternalResponse::html(request.url.clone(), b"ok".to_vec()))),
                Ok(None) => Ok(None),
                Err(Error::ContentUnavailable(m)) => Err(Error::ContentUnavailable(m.clone())),
                Err(e) => Err(Error::Other(e.to_string())),
            }
        }
    }

    fn request(path: &str) -> InternalRequest {
        InternalRequest::new(Url::parse(&format!("internal://local/{}", path)).unwrap())
    }

    #[test]
    fn router_maps_outcomes_to_statuses() {
        let mut router = InternalSchemeHandler::new();
        let ok = InternalResponse::html(Url::parse("internal://local/ok").unwrap(), Vec::new());
        router.register("ok", Fixed(Ok(Some(ok)))).unwrap();
        router.register("none", Fixed(Ok(None))).unwrap();
        router.register("miss", Fixed(Err(Error::ContentUnavailable("gone".into())))).unwrap();
        router.register("boom", Fixed(Err(Error::Other("boom".into())))).unwrap();

        assert_eq!(router.respond(&request("ok")).status, 200);
        assert_eq!(router.respond(&request("none")).status, 404);
        assert_eq!(router.respond(&request("miss")).status, 404);
        assert_eq!(router.respond(&request("boom")).status, 500);
        assert_eq!(router.respond(&request("unknown")).status, 404);
        let external = InternalRequest::new(Url::parse("https://example.com/ok").unwrap());
        assert_eq!(router.respond(&external).status, 404);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut router = InternalSchemeHandler::new();
        router.register("none", Fixed(Ok(None))).unwrap();
        assert!(router.register("none", Fixed(Ok(None))).is_err());
    }
}
