//! Inbound message validation and routing.
//!
//! Each tab owns one [`TabMessageDispatcher`]. A message reaches its handler
//! only if it came from an ordinary web page, on a channel the registry
//! knows, from the world and frame scope the script was installed into, and
//! with the security token bound to that channel. Anything else is dropped.
//! Every message is answered, so the page-side promise always settles.

use crate::internal::InternalUrl;
use crate::registry::ScriptRegistry;
use crate::webview::{FrameInfo, ScriptMessage, ScriptReply};
use crate::{Error, Result};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Where a validated message came from
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub webview_url: &'a Url,
    pub frame: &'a FrameInfo,
}

/// A native capability reachable from one script's channel
pub trait MessageHandler: Send {
    /// Handle the `data` part of a validated message
    fn handle(&mut self, context: &MessageContext<'_>, data: &Value) -> ScriptReply;
}

/// Per-tab router from channel name to handler
pub struct TabMessageDispatcher {
    registry: Arc<ScriptRegistry>,
    handlers: HashMap<String, Box<dyn MessageHandler>>,
}

impl TabMessageDispatcher {
    pub fn new(registry: Arc<ScriptRegistry>) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Attach the handler for a registered script.
    ///
    /// Returns `Ok(false)` when the script is not registered (its source was
    /// absent), so the capability is simply off for this tab.
    pub fn add_handler(&mut self, script_name: &str, handler: impl MessageHandler + 'static) -> Result<bool> {
        let Some(binding) = self.registry.binding(script_name) else {
            debug!("Script {} not registered; handler not installed", script_name);
            return Ok(false);
        };
        if self.handlers.contains_key(binding.channel()) {
            return Err(Error::ConfigError(format!(
                "a handler for script {} is already installed on this tab",
                script_name
            )));
        }
        self.handlers.insert(binding.channel().to_string(), Box::new(handler));
        Ok(true)
    }

    /// Validate and route one message. Always returns a reply.
    pub fn on_message(&mut self, message: &ScriptMessage) -> ScriptReply {
        let registry = Arc::clone(&self.registry);
        let (webview_url, data) = match validate(&registry, message) {
            Ok(validated) => validated,
            Err(Error::ChannelMismatch(reason)) => {
                warn!("Dropped script message: {}", reason);
                return ScriptReply::empty();
            }
            Err(e) => {
                debug!("Ignored script message: {}", e);
                return ScriptReply::empty();
            }
        };

        match self.handlers.get_mut(&message.channel) {
            Some(handler) => {
                let context = MessageContext {
                    webview_url,
                    frame: &message.frame,
                };
                handler.handle(&context, data)
            }
            None => {
                debug!("No handler on this tab for channel of {}", script_name(&registry, message));
                ScriptReply::empty()
            }
        }
    }
}

static NULL: Value = Value::Null;

fn script_name<'r>(registry: &'r ScriptRegistry, message: &ScriptMessage) -> &'r str {
    registry
        .binding_for_channel(&message.channel)
        .map(|b| b.name())
        .unwrap_or("<unknown>")
}

// Origin policy first, then channel identity, then the token.
fn validate<'m>(
    registry: &ScriptRegistry,
    message: &'m ScriptMessage,
) -> Result<(&'m Url, &'m Value)> {
    let Some(webview_url) = message.webview_url.as_ref() else {
        return Err(Error::Other("message from a web view without a document".into()));
    };
    if let Some(internal) = InternalUrl::new(webview_url) {
        if internal.is_session_restore() {
            return Err(Error::Other("message from session restore page".into()));
        }
        return Err(Error::Other("message from internal page".into()));
    }
    if message.frame.url.as_ref().is_some_and(InternalUrl::is_valid) {
        return Err(Error::Other("message from internal frame".into()));
    }

    // Channel names embed the registry secret; never echo them back in errors.
    let Some(binding) = registry.binding_for_channel(&message.channel) else {
        return Err(Error::ChannelMismatch("unknown channel".into()));
    };
    if binding.world() != &message.world {
        return Err(Error::ChannelMismatch(format!("{} posted from {:?}", binding.name(), message.world)));
    }
    if binding.main_frame_only() && !message.frame.is_main_frame {
        return Err(Error::ChannelMismatch(format!("{} posted from a sub-frame", binding.name())));
    }

    let presented = message.body.get("securityToken").and_then(Value::as_str);
    match presented {
        Some(token) if binding.verify_token(token) => {}
        _ => return Err(Error::ChannelMismatch(format!("{} with missing or wrong token", binding.name()))),
    }

    let data = message.body.get("data").unwrap_or(&NULL);
    Ok((webview_url, data))
}
