//! Boundary to the external content-blocking engine.
//!
//! Rule evaluation lives in the blocking engine itself; this crate only asks
//! whether a sub-resource load should be blocked.

use url::Url;

/// Kind of sub-resource being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Subdocument,
    Script,
    Stylesheet,
    Image,
    Font,
    XmlHttpRequest,
    Media,
    Other,
}

/// One blocking query
#[derive(Debug, Clone, Copy)]
pub struct BlockRequest<'a> {
    pub request_url: &'a Url,
    pub source_url: &'a Url,
    pub resource_type: ResourceType,
}

/// Blocking engine interface
pub trait ContentBlocker: Send + Sync {
    fn should_block(&self, request: &BlockRequest<'_>) -> bool;
}

/// A blocker that never blocks (shields down)
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ContentBlocker for AllowAll {
    fn should_block(&self, _request: &BlockRequest<'_>) -> bool {
        false
    }
}
