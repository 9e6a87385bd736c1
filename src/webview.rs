//! The rendering-engine surface the bridge talks to.
//!
//! A [`WebView`] is owned by the UI thread and never leaves it. Backends
//! (the bundled Boa web view, or a platform engine binding) implement this
//! trait; everything else in the crate only sees plain data.

use serde_json::Value;
use url::Url;

/// Script execution context. Scripts in one world cannot see the globals of
/// another, so native helpers stay out of reach of page script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentWorld {
    /// The page's own world
    Page,
    /// The default isolated world for native-installed scripts
    DefaultClient,
    /// A dedicated isolated world
    Named(String),
}

/// When an installed script runs relative to document parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionTime {
    AtDocumentStart,
    AtDocumentEnd,
}

/// Frame a script is evaluated in, or a message was sent from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub url: Option<Url>,
    pub is_main_frame: bool,
}

impl FrameInfo {
    pub fn main(url: Option<Url>) -> Self {
        Self { url, is_main_frame: true }
    }
}

/// A script installed into every document the web view loads
#[derive(Debug, Clone)]
pub struct UserScript {
    pub source: String,
    pub injection_time: InjectionTime,
    pub main_frame_only: bool,
    pub world: ContentWorld,
}

/// An inbound message posted by script through a message channel
#[derive(Debug, Clone)]
pub struct ScriptMessage {
    /// Engine-assigned id used to route the reply back to the page
    pub reply_id: u64,
    pub channel: String,
    pub body: Value,
    pub frame: FrameInfo,
    pub world: ContentWorld,
    /// URL of the top-level document of the web view that received the message
    pub webview_url: Option<Url>,
}

/// Reply delivered to the page for every inbound message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptReply {
    pub value: Option<Value>,
    pub error: Option<String>,
}

impl ScriptReply {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Core trait for rendering-engine bindings
pub trait WebView {
    /// URL of the currently loaded top-level document
    fn url(&self) -> Option<Url>;

    /// Evaluate JavaScript in the given world and return its JSON-converted result
    fn evaluate_javascript(
        &mut self,
        javascript: &str,
        frame: Option<&FrameInfo>,
        world: &ContentWorld,
    ) -> std::result::Result<Value, String>;

    /// Install a user script for subsequent document loads
    fn add_user_script(&mut self, script: UserScript);

    /// Expose a message channel to scripts running in `world`
    fn add_message_channel(&mut self, channel: &str, world: &ContentWorld);

    /// Load a document. `page_script` runs in the page world between the
    /// document-start and document-end user scripts.
    fn load(&mut self, url: Url, page_script: &str) -> std::result::Result<(), String>;

    /// Take messages posted since the last call, in posting order
    fn take_messages(&mut self) -> Vec<ScriptMessage>;

    /// Resolve the page-side promise of a message
    fn reply(&mut self, reply_id: u64, reply: ScriptReply);
}
