//! Favicon URL reporting capability.
//!
//! The favicon script reports the icon links it finds in the document. The
//! handler validates them, drops links the content blocker would block, and
//! hands the rest to the favicon driver, which does the actual fetching.

use crate::blocking::{AllowAll, BlockRequest, ContentBlocker, ResourceType};
use crate::dispatch::{MessageContext, MessageHandler};
use crate::registry::ScriptDefinition;
use crate::webview::{InjectionTime, ScriptReply};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const SCRIPT_NAME: &str = "FaviconScript";

/// Installed at document start, main frame only, in the default client world
pub fn script_definition() -> ScriptDefinition {
    ScriptDefinition::new(SCRIPT_NAME).injection_time(InjectionTime::AtDocumentStart)
}

/// One `<link rel=icon>` found by the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconLink {
    pub href: Url,
    pub rel: String,
    pub sizes: Option<String>,
}

#[derive(Deserialize)]
struct RawLink {
    href: String,
    #[serde(default)]
    rel: String,
    #[serde(default)]
    sizes: Option<String>,
}

/// What the driver receives for one page
#[derive(Debug, Clone)]
pub struct FaviconUpdate {
    pub page_url: Url,
    pub icons: Vec<FaviconLink>,
    pub private_browsing: bool,
}

/// External favicon loader
pub trait FaviconDriver: Send {
    fn favicon_urls_updated(&mut self, update: FaviconUpdate);
}

/// Per-tab handler for the favicon script's channel
pub struct FaviconScriptHandler {
    driver: Box<dyn FaviconDriver>,
    blocker: Arc<dyn ContentBlocker>,
    private_browsing: bool,
}

impl FaviconScriptHandler {
    pub fn new(driver: impl FaviconDriver + 'static, private_browsing: bool) -> Self {
        Self {
            driver: Box::new(driver),
            blocker: Arc::new(AllowAll),
            private_browsing,
        }
    }

    pub fn with_blocker(mut self, blocker: Arc<dyn ContentBlocker>) -> Self {
        self.blocker = blocker;
        self
    }

    fn parse_links(&self, page_url: &Url, data: &Value) -> Vec<FaviconLink> {
        let Some(entries) = data.as_array() else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<RawLink>(entry.clone()).ok())
            .filter_map(|raw| {
                let href = page_url.join(&raw.href).ok()?;
                matches!(href.scheme(), "http" | "https" | "data").then_some(FaviconLink {
                    href,
                    rel: raw.rel,
                    sizes: raw.sizes,
                })
            })
            .filter(|link| !self.is_blocked(page_url, &link.href))
            .collect()
    }

    fn is_blocked(&self, page_url: &Url, href: &Url) -> bool {
        let blocked = self.blocker.should_block(&BlockRequest {
            request_url: href,
            source_url: page_url,
            resource_type: ResourceType::Image,
        });
        if blocked {
            debug!("Favicon {} blocked by content rules", href);
        }
        blocked
    }
}

impl MessageHandler for FaviconScriptHandler {
    fn handle(&mut self, context: &MessageContext<'_>, data: &Value) -> ScriptReply {
        let icons = self.parse_links(context.webview_url, data);
        self.driver.favicon_urls_updated(FaviconUpdate {
            page_url: context.webview_url.clone(),
            icons,
            private_browsing: self.private_browsing,
        });
        ScriptReply::empty()
    }
}
