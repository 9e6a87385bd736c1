//! Boa-backed web view: a pure-Rust script host with one JS context per
//! content world.
//!
//! It has no DOM or network. Each world gets a small harness providing
//! `window`, `document.title`, `location.href` and
//! `webkit.messageHandlers[<channel>].postMessage`, which queues the message
//! and returns a promise settled when the native reply arrives.

use crate::script::{sanitize, ScriptArgument};
use crate::webview::{ContentWorld, FrameInfo, InjectionTime, ScriptMessage, ScriptReply, UserScript, WebView};
use boa_engine::{Context, Source};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// Runtime limits applied to every context
#[derive(Debug, Clone, Copy)]
pub struct ScriptLimits {
    /// Maximum loop iterations before Boa throws (0 => disabled)
    pub loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub recursion_limit: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 1_000_000,
            recursion_limit: 1024,
        }
    }
}

#[derive(Deserialize)]
struct Posted {
    id: u64,
    channel: String,
    body: Value,
}

/// A [`WebView`] over Boa contexts
pub struct BoaWebView {
    limits: ScriptLimits,
    url: Option<Url>,
    worlds: HashMap<ContentWorld, Context>,
    user_scripts: Vec<UserScript>,
    channels: Vec<(String, ContentWorld)>,
    // reply id -> (world, page-side message id)
    pending: HashMap<u64, (ContentWorld, u64)>,
    next_reply_id: u64,
}

impl Default for BoaWebView {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

impl BoaWebView {
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            limits,
            url: None,
            worlds: HashMap::new(),
            user_scripts: Vec::new(),
            channels: Vec::new(),
            pending: HashMap::new(),
            next_reply_id: 1,
        }
    }

    fn harness(&self) -> String {
        let location = self.url.as_ref().map(|u| u.as_str()).unwrap_or("about:blank");
        let literal = sanitize(&ScriptArgument::from(location), true).unwrap_or_else(|_| "'about:blank'".to_string());
        include_str!("boa_harness.js").replace("__RFSHIELD_LOCATION__", &literal)
    }

    fn create_context(&self, world: &ContentWorld) -> Context {
        let mut ctx = Context::default();
        if self.limits.loop_iteration_limit > 0 {
            ctx.runtime_limits_mut()
                .set_loop_iteration_limit(self.limits.loop_iteration_limit);
        }
        if self.limits.recursion_limit < usize::MAX {
            ctx.runtime_limits_mut().set_recursion_limit(self.limits.recursion_limit);
        }

        if let Err(e) = ctx.eval(Source::from_bytes(self.harness().as_bytes())) {
            warn!("Harness failed in {:?}: {}", world, e);
        }
        for (channel, _) in self.channels.iter().filter(|(_, w)| w == world) {
            install_channel(&mut ctx, channel);
        }
        ctx
    }

    fn context(&mut self, world: &ContentWorld) -> &mut Context {
        if !self.worlds.contains_key(world) {
            let ctx = self.create_context(world);
            self.worlds.insert(world.clone(), ctx);
        }
        self.worlds
            .get_mut(world)
            .unwrap_or_else(|| unreachable!("context inserted above"))
    }

    fn run_user_scripts(&mut self, time: InjectionTime) {
        let scripts: Vec<UserScript> = self
            .user_scripts
            .iter()
            .filter(|s| s.injection_time == time)
            .cloned()
            .collect();
        for script in scripts {
            let ctx = self.context(&script.world);
            if let Err(e) = ctx.eval(Source::from_bytes(script.source.as_bytes())) {
                warn!("User script failed in {:?}: {}", script.world, e);
            }
            ctx.run_jobs();
        }
    }
}

fn install_channel(ctx: &mut Context, channel: &str) {
    let literal = match sanitize(&ScriptArgument::from(channel), true) {
        Ok(l) => l,
        Err(e) => {
            warn!("Unusable channel name: {}", e);
            return;
        }
    };
    if let Err(e) = ctx.eval(Source::from_bytes(format!("__rfshield.install({});", literal).as_bytes())) {
        warn!("Failed to install message channel: {}", e);
    }
}

fn eval_to_json(ctx: &mut Context, javascript: &str) -> std::result::Result<Value, String> {
    let value = ctx
        .eval(Source::from_bytes(javascript.as_bytes()))
        .map_err(|e| format!("Script thrown: {}", e))?;
    ctx.run_jobs();
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    value
        .to_json(ctx)
        .map_err(|e| format!("Result is not representable as JSON: {}", e))
}

impl WebView for BoaWebView {
    fn url(&self) -> Option<Url> {
        self.url.clone()
    }

    fn evaluate_javascript(
        &mut self,
        javascript: &str,
        frame: Option<&FrameInfo>,
        world: &ContentWorld,
    ) -> std::result::Result<Value, String> {
        if frame.is_some_and(|f| !f.is_main_frame) {
            return Err("Boa web view has no sub-frames".to_string());
        }
        eval_to_json(self.context(world), javascript)
    }

    fn add_user_script(&mut self, script: UserScript) {
        self.user_scripts.push(script);
    }

    fn add_message_channel(&mut self, channel: &str, world: &ContentWorld) {
        self.channels.push((channel.to_string(), world.clone()));
        if let Some(ctx) = self.worlds.get_mut(world) {
            install_channel(ctx, channel);
        }
    }

    fn load(&mut self, url: Url, page_script: &str) -> std::result::Result<(), String> {
        debug!("Loading {}", url);
        self.url = Some(url);
        // A new document starts with fresh globals in every world
        self.worlds.clear();
        self.pending.clear();

        self.run_user_scripts(InjectionTime::AtDocumentStart);
        let page = self.context(&ContentWorld::Page);
        if let Err(e) = page.eval(Source::from_bytes(page_script.as_bytes())) {
            warn!("Page script failed: {}", e);
        }
        page.run_jobs();
        self.run_user_scripts(InjectionTime::AtDocumentEnd);
        Ok(())
    }

    fn take_messages(&mut self) -> Vec<ScriptMessage> {
        let mut messages = Vec::new();
        let url = self.url.clone();
        let worlds: Vec<ContentWorld> = self.worlds.keys().cloned().collect();

        for world in worlds {
            let raw = match eval_to_json(self.context(&world), "__rfshield.drain()") {
                Ok(Value::String(raw)) => raw,
                Ok(_) | Err(_) => {
                    warn!("Message outbox unreadable in {:?}", world);
                    continue;
                }
            };
            let posted: Vec<Posted> = match serde_json::from_str(&raw) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Malformed message outbox in {:?}: {}", world, e);
                    continue;
                }
            };
            for p in posted {
                let reply_id = self.next_reply_id;
                self.next_reply_id += 1;
                self.pending.insert(reply_id, (world.clone(), p.id));
                messages.push(ScriptMessage {
                    reply_id,
                    channel: p.channel,
                    body: p.body,
                    frame: FrameInfo::main(url.clone()),
                    world: world.clone(),
                    webview_url: url.clone(),
                });
            }
        }
        messages
    }

    fn reply(&mut self, reply_id: u64, reply: ScriptReply) {
        let Some((world, id)) = self.pending.remove(&reply_id) else {
            return;
        };
        let value = reply.value.map(ScriptArgument::Json).unwrap_or(ScriptArgument::Null);
        let error = reply.error.map(ScriptArgument::String).unwrap_or(ScriptArgument::Null);
        let (Ok(value), Ok(error)) = (sanitize(&value, true), sanitize(&error, true)) else {
            warn!("Reply for message {} could not be encoded", reply_id);
            return;
        };
        let settle = format!("__rfshield.settle({}, {}, {});", id, value, error);
        if let Err(e) = eval_to_json(self.context(&world), &settle) {
            warn!("Failed to deliver reply: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worlds_do_not_share_globals() {
        let mut view = BoaWebView::default();
        view.evaluate_javascript("var secret = 42;", None, &ContentWorld::DefaultClient).unwrap();
        let isolated = view.evaluate_javascript("typeof secret", None, &ContentWorld::DefaultClient).unwrap();
        let page = view.evaluate_javascript("typeof secret", None, &ContentWorld::Page).unwrap();
        assert_eq!(isolated, json!("number"));
        assert_eq!(page, json!("undefined"));
    }

    #[test]
    fn evaluation_results_are_json() {
        let mut view = BoaWebView::default();
        let v = view
            .evaluate_javascript("({a: [1, 'two', null], b: true})", None, &ContentWorld::Page)
            .unwrap();
        assert_eq!(v, json!({"a": [1, "two", null], "b": true}));
        assert_eq!(view.evaluate_javascript("undefined", None, &ContentWorld::Page).unwrap(), Value::Null);
    }

    #[test]
    fn thrown_errors_are_reported() {
        let mut view = BoaWebView::default();
        let err = view.evaluate_javascript("throw new Error('nope')", None, &ContentWorld::Page).unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn posted_messages_are_drained_and_replies_settle() {
        let mut view = BoaWebView::default();
        view.add_message_channel("Echo_1", &ContentWorld::Page);
        view.load(
            Url::parse("https://example.com/").unwrap(),
            "var got = null; webkit.messageHandlers['Echo_1'].postMessage({x: 1}).then(function(v) { got = v; });",
        )
        .unwrap();

        assert_eq!(view.url().unwrap().as_str(), "https://example.com/");
        let messages = view.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "Echo_1");
        assert_eq!(messages[0].body, json!({"x": 1}));
        assert_eq!(messages[0].webview_url.as_ref().unwrap().as_str(), "https://example.com/");
        assert!(view.take_messages().is_empty());

        view.reply(messages[0].reply_id, ScriptReply { value: Some(json!("pong")), error: None });
        assert_eq!(view.evaluate_javascript("got", None, &ContentWorld::Page).unwrap(), json!("pong"));
    }

    #[test]
    fn channels_only_exist_in_their_world() {
        let mut view = BoaWebView::default();
        view.add_message_channel("Secret_1", &ContentWorld::DefaultClient);
        view.load(Url::parse("https://example.com/").unwrap(), "").unwrap();
        let page = view
            .evaluate_javascript("typeof webkit.messageHandlers['Secret_1']", None, &ContentWorld::Page)
            .unwrap();
        let client = view
            .evaluate_javascript("typeof webkit.messageHandlers['Secret_1']", None, &ContentWorld::DefaultClient)
            .unwrap();
        assert_eq!(page, json!("undefined"));
        assert_eq!(client, json!("object"));
    }

    #[test]
    fn user_scripts_run_in_injection_order() {
        let mut view = BoaWebView::default();
        view.add_user_script(UserScript {
            source: "var order = (typeof order === 'undefined' ? [] : order); order.push('end');".into(),
            injection_time: InjectionTime::AtDocumentEnd,
            main_frame_only: true,
            world: ContentWorld::Page,
        });
        view.add_user_script(UserScript {
            source: "var order = ['start'];".into(),
            injection_time: InjectionTime::AtDocumentStart,
            main_frame_only: true,
            world: ContentWorld::Page,
        });
        view.load(Url::parse("https://example.com/").unwrap(), "order.push('page');").unwrap();
        let order = view.evaluate_javascript("order", None, &ContentWorld::Page).unwrap();
        assert_eq!(order, json!(["start", "page", "end"]));
    }
}
