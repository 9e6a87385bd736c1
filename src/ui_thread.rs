use crate::dispatch::TabMessageDispatcher;
use crate::tab::Tab;
use crate::webview::{ContentWorld, FrameInfo, ScriptReply, WebView};
use crate::{Error, Result};
use log::{debug, error, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use url::Url;

/// Identifier of a tab on the UI thread
pub type TabId = u64;

type WebViewFactory = Box<dyn FnOnce() -> std::result::Result<Box<dyn WebView>, String> + Send>;

// Replies may make the page post again; stop dispatching after this many
// rounds and answer whatever is still queued with an empty reply.
const MAX_PUMP_ROUNDS: usize = 16;

/// One-shot completion guard.
///
/// The callback runs exactly once: `complete` consumes the guard. A guard
/// dropped without completing still answers with
/// [`Error::EngineUnavailable`], and trips a debug assertion unless the
/// thread is already unwinding.
pub(crate) struct Completion<T> {
    callback: Option<Box<dyn FnOnce(Result<T>) + Send>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(callback: impl FnOnce(Result<T>) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub(crate) fn complete(mut self, result: Result<T>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            error!("Completion dropped before the UI thread answered it");
            callback(Err(Error::EngineUnavailable("request dropped before completion".into())));
            debug_assert!(thread::panicking(), "completion dropped without being completed");
        }
    }
}

pub(crate) enum Command {
    OpenTab {
        factory: WebViewFactory,
        dispatcher: TabMessageDispatcher,
        resp: Sender<Result<TabId>>,
    },
    Load {
        tab: TabId,
        url: Url,
        page_script: String,
        completion: Completion<()>,
    },
    Evaluate {
        tab: TabId,
        javascript: String,
        frame: Option<FrameInfo>,
        world: ContentWorld,
        completion: Completion<Value>,
    },
    CloseTab {
        tab: TabId,
        completion: Completion<()>,
    },
    Shutdown,
}

impl Command {
    /// Answer a command that will never run
    pub(crate) fn fail(self, reason: &str) {
        let err = || Error::EngineUnavailable(reason.to_string());
        match self {
            Command::OpenTab { resp, .. } => {
                let _ = resp.send(Err(err()));
            }
            Command::Load { completion, .. } | Command::CloseTab { completion, .. } => completion.complete(Err(err())),
            Command::Evaluate { completion, .. } => completion.complete(Err(err())),
            Command::Shutdown => {}
        }
    }
}

struct TabState {
    webview: Box<dyn WebView>,
    dispatcher: TabMessageDispatcher,
}

impl TabState {
    fn new(mut webview: Box<dyn WebView>, dispatcher: TabMessageDispatcher) -> Self {
        for binding in dispatcher.registry().bindings() {
            webview.add_message_channel(binding.channel(), binding.world());
            webview.add_user_script(binding.user_script());
        }
        Self { webview, dispatcher }
    }

    fn pump_messages(&mut self) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let messages = self.webview.take_messages();
            if messages.is_empty() {
                return;
            }
            for message in messages {
                let reply = self.dispatcher.on_message(&message);
                self.webview.reply(message.reply_id, reply);
            }
        }
        let leftover = self.webview.take_messages();
        if !leftover.is_empty() {
            debug!(
                "Message pump stopped after {} rounds; {} message(s) answered empty",
                MAX_PUMP_ROUNDS,
                leftover.len()
            );
        }
        for message in leftover {
            self.webview.reply(message.reply_id, ScriptReply::empty());
        }
    }
}

/// The single thread that owns every web view.
///
/// All engine work (loads, script evaluation, message delivery) is queued
/// here and runs one command at a time, so evaluations never interleave and
/// web views never cross threads.
pub struct UiThread {
    cmd_tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl UiThread {
    pub fn spawn() -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name("rfshield-ui".to_string())
            .spawn(move || run(cmd_rx))
            .map_err(|e| Error::EngineUnavailable(format!("Failed to spawn UI thread: {}", e)))?;
        Ok(Self {
            cmd_tx,
            handle: Some(handle),
        })
    }

    /// Create a web view on the UI thread and install every registered script.
    ///
    /// Blocks until the web view exists. Do not call from a completion
    /// callback, which runs on the UI thread itself.
    pub fn open_tab<F, W>(&self, factory: F, dispatcher: TabMessageDispatcher) -> Result<Tab>
    where
        F: FnOnce() -> std::result::Result<W, String> + Send + 'static,
        W: WebView + 'static,
    {
        let (resp, resp_rx) = mpsc::channel();
        let factory: WebViewFactory = Box::new(move || factory().map(|w| Box::new(w) as Box<dyn WebView>));
        if let Err(mpsc::SendError(cmd)) = self.cmd_tx.send(Command::OpenTab {
            factory,
            dispatcher,
            resp,
        }) {
            cmd.fail("UI thread stopped");
        }
        let id = resp_rx
            .recv()
            .map_err(|e| Error::EngineUnavailable(format!("Open tab canceled: {}", e)))??;
        Ok(Tab::new(id, self.cmd_tx.clone()))
    }

    /// Stop the thread; queued commands fail with `EngineUnavailable`.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(cmd_rx: Receiver<Command>) {
    let mut tabs: HashMap<TabId, TabState> = HashMap::new();
    let mut next_id: TabId = 1;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::OpenTab {
                factory,
                dispatcher,
                resp,
            } => {
                let res = factory()
                    .map(|webview| {
                        let id = next_id;
                        next_id += 1;
                        tabs.insert(id, TabState::new(webview, dispatcher));
                        debug!("Opened tab {}", id);
                        id
                    })
                    .map_err(|e| Error::EngineUnavailable(format!("Failed to create web view: {}", e)));
                let _ = resp.send(res);
            }
            Command::Load {
                tab,
                url,
                page_script,
                completion,
            } => match tabs.get_mut(&tab) {
                Some(state) => {
                    let res = state
                        .webview
                        .load(url, &page_script)
                        .map_err(Error::ScriptError);
                    state.pump_messages();
                    completion.complete(res);
                }
                None => completion.complete(Err(closed(tab))),
            },
            Command::Evaluate {
                tab,
                javascript,
                frame,
                world,
                completion,
            } => match tabs.get_mut(&tab) {
                Some(state) => {
                    let res = state
                        .webview
                        .evaluate_javascript(&javascript, frame.as_ref(), &world)
                        .map_err(Error::ScriptError);
                    state.pump_messages();
                    completion.complete(res);
                }
                None => completion.complete(Err(closed(tab))),
            },
            Command::CloseTab { tab, completion } => {
                let res = tabs.remove(&tab).map(|_| ()).ok_or_else(|| closed(tab));
                completion.complete(res);
            }
            Command::Shutdown => break,
        }
    }

    while let Ok(cmd) = cmd_rx.try_recv() {
        cmd.fail("UI thread stopped");
    }
    info!("UI thread stopped with {} open tab(s)", tabs.len());
}

fn closed(tab: TabId) -> Error {
    Error::EngineUnavailable(format!("tab {} is closed", tab))
}
